// Copyright 2026-Present Tracekit contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use tracekit_core::{
    load, set_host_loader, Agent, AgentConfig, LoadError, LoadedModule, ModuleMetadata,
};

/// Module names the demo host loader serves, with canned versions.
const DEMO_MODULES: [(&str, &str); 3] = [
    ("express", "4.19.2"),
    ("redis", "4.6.13"),
    ("left-pad", "1.3.0"),
];

pub fn main() {
    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error reading tracekit configuration from environment: {e}");
            return;
        }
    };

    let env_filter = format!("tracekit={}", config.log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    // Standalone mode has no embedding host program, so the demo loader
    // stands in for the host's module loading entry point.
    set_host_loader(Arc::new(|name: &str| {
        for (module, version) in DEMO_MODULES {
            if module == name {
                return Ok(LoadedModule::new(
                    Arc::new(format!("{module} exports")),
                    ModuleMetadata {
                        version: Some(version.to_string()),
                        resolved_from: Some(format!("demo://{module}")),
                    },
                ));
            }
        }
        Err(LoadError::NotFound(name.to_string()))
    }));

    let agent = match Agent::new(config) {
        Ok(agent) => agent,
        Err(e) => {
            error!("Error constructing tracekit agent: {e}");
            return;
        }
    };

    agent.instrument(true);
    info!(
        instrumentations = agent.registered_instrumentations(),
        "instrumentation harness installed"
    );

    for (module, _) in DEMO_MODULES {
        match load(module) {
            Ok(loaded) => match agent.shim_for(loaded.exports()) {
                Some(shim) => info!(
                    module = shim.module_name(),
                    kind = shim.kind().as_tag(),
                    version = shim.version().unwrap_or("unknown"),
                    "module instrumented"
                ),
                None => debug!(module, "module loaded without instrumentation"),
            },
            Err(e) => error!("Error loading demo module: {e}"),
        }
    }

    agent.run_in_named_transaction("GET /demo", |tx| {
        info!(id = tx.id(), name = ?tx.name(), "demo transaction running");
    });

    agent.unload();
    info!("instrumentation harness removed");
}
