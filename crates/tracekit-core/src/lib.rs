// Copyright 2026-Present Tracekit contributors
// SPDX-License-Identifier: Apache-2.0

//! Instrumentation harness for the tracekit APM agent.
//!
//! The harness is how the agent attaches itself to a running program: it
//! decorates the program's global module load entry point, matches loads
//! against an instrumentation registry, hands plugin code shims for the
//! dependencies it instruments, and carries the active transaction across
//! each traced call chain. Everything downstream of that — aggregation,
//! sampling, the wire to a collector — lives elsewhere.
//!
//! Typical wiring:
//!
//! ```
//! use std::sync::Arc;
//! use tracekit_core::{
//!     load, set_host_loader, Agent, AgentConfig, InstrumentationDescriptor, LoadedModule,
//!     ModuleMetadata, ShimKind,
//! };
//!
//! set_host_loader(Arc::new(|name: &str| {
//!     Ok(LoadedModule::new(
//!         Arc::new(format!("{name} exports")),
//!         ModuleMetadata::default(),
//!     ))
//! }));
//!
//! let agent = Agent::new(AgentConfig::default()).unwrap();
//! agent.register_instrumentation(InstrumentationDescriptor::new(
//!     ShimKind::WebFramework,
//!     "koa",
//!     |_exports, module, _metadata| {
//!         tracing::debug!(module, "observed");
//!         Ok(())
//!     },
//! ));
//! agent.instrument(false);
//!
//! let koa = load("koa").unwrap();
//! let shim = agent.shim_for(koa.exports()).unwrap();
//! assert_eq!(shim.module_name(), "koa");
//!
//! agent.run_in_transaction(|tx| {
//!     assert_eq!(agent.current_transaction().as_ref(), Some(tx));
//! });
//!
//! agent.unload();
//! ```

pub mod agent;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod loader;
pub mod registry;
pub mod shim;

pub use agent::{Agent, AgentState};
pub use config::AgentConfig;
pub use context::{ContextManager, Transaction};
pub use error::{AgentError, HookError, LoadError};
pub use loader::{load, set_host_loader, LoadFn, LoadedModule, ModuleExports, ModuleMetadata};
pub use registry::{InstrumentationDescriptor, InstrumentationRegistry};
pub use shim::{instrumentation_debug_enabled, Shim, ShimKind};
