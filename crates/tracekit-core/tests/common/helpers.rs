// Copyright 2026-Present Tracekit contributors
// SPDX-License-Identifier: Apache-2.0

//! Helper functions for integration tests

use super::mocks::ScriptedLoader;
use std::ops::Deref;
use std::sync::Arc;
use tracekit_core::{set_host_loader, Agent, AgentConfig};

/// Unloads the wrapped agent on drop so a failing assertion cannot leak the
/// singleton slot or the loader patch into the next test.
pub struct AgentGuard {
    agent: Agent,
}

impl AgentGuard {
    pub fn started() -> Self {
        Self {
            agent: Agent::new(AgentConfig::default()).expect("Failed to construct test agent"),
        }
    }
}

impl Deref for AgentGuard {
    type Target = Agent;

    fn deref(&self) -> &Agent {
        &self.agent
    }
}

impl Drop for AgentGuard {
    fn drop(&mut self) {
        self.agent.unload();
    }
}

/// Install a scripted host loader with a small default module set and return
/// it for inspection.
pub fn install_default_modules() -> Arc<ScriptedLoader> {
    let loader = ScriptedLoader::new(&[
        ("koa", "2.15.0"),
        ("express", "4.19.2"),
        ("redis", "4.6.13"),
        ("left-pad", "1.3.0"),
    ]);
    set_host_loader(loader.as_load_fn());
    loader
}
