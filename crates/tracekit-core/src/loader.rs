// Copyright 2026-Present Tracekit contributors
// SPDX-License-Identifier: Apache-2.0

//! The process-wide module load entry point and its reversible interceptor.
//!
//! Host programs route every "load a dependency by name" request through
//! [`load`], backed by a single swappable slot. `Agent::instrument` wraps the
//! slot with a decorator that consults the instrumentation registry after
//! each successful load; `Agent::unload` restores the exact function
//! reference captured at install time. For names with no registered
//! instrumentation the wrapper is observationally identical to the original
//! loader.

use crate::error::{HookError, LoadError};
use crate::registry::{InstrumentationDescriptor, InstrumentationRegistry};
use crate::shim::{ModuleRecord, ShimLedger};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, RwLock};
use tracing::{debug, error};

/// The opaque exports object a host loader produces for a module.
pub type ModuleExports = Arc<dyn Any + Send + Sync>;

/// The global load function: name in, loaded module out.
pub type LoadFn = Arc<dyn Fn(&str) -> Result<LoadedModule, LoadError> + Send + Sync>;

/// Metadata resolved by the host loader alongside the exports object.
#[derive(Debug, Clone, Default)]
pub struct ModuleMetadata {
    /// Version of the module, when the loader can determine one.
    pub version: Option<String>,
    /// Where the module was resolved from (path, registry URL, ...).
    pub resolved_from: Option<String>,
}

/// A successfully loaded module: exports plus resolution metadata.
#[derive(Clone)]
pub struct LoadedModule {
    exports: ModuleExports,
    metadata: ModuleMetadata,
}

impl LoadedModule {
    pub fn new(exports: ModuleExports, metadata: ModuleMetadata) -> Self {
        Self { exports, metadata }
    }

    pub fn exports(&self) -> &ModuleExports {
        &self.exports
    }

    pub fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("metadata", &self.metadata)
            .finish()
    }
}

fn loader_slot() -> &'static RwLock<LoadFn> {
    static SLOT: OnceLock<RwLock<LoadFn>> = OnceLock::new();
    SLOT.get_or_init(|| {
        RwLock::new(Arc::new(|name: &str| Err(LoadError::NotFound(name.to_string()))) as LoadFn)
    })
}

/// Install the host program's real loader. Replaces whatever is currently in
/// the slot; the default loader fails every name with `LoadError::NotFound`.
pub fn set_host_loader(loader: LoadFn) {
    if let Ok(mut slot) = loader_slot().write() {
        *slot = loader;
    }
}

/// Load a module by name through the current global loader.
///
/// This is the single entry point the interceptor decorates; its signature
/// and results for uninstrumented names never change.
pub fn load(name: &str) -> Result<LoadedModule, LoadError> {
    let loader = current_loader();
    loader(name)
}

pub(crate) fn current_loader() -> LoadFn {
    loader_slot()
        .read()
        .map(|slot| Arc::clone(&slot))
        .unwrap_or_else(|poisoned| Arc::clone(&poisoned.into_inner()))
}

/// Swap the interception wrapper into the loader slot, returning the original
/// function reference so the caller can restore it verbatim later.
pub(crate) fn install(
    registry: Arc<InstrumentationRegistry>,
    ledger: Arc<ShimLedger>,
) -> LoadFn {
    let slot = loader_slot();
    let mut guard = match slot.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let original = Arc::clone(&guard);

    let delegate = Arc::clone(&original);
    let wrapper: LoadFn = Arc::new(move |name: &str| {
        let loaded = delegate(name)?;
        if let Some(descriptor) = registry.lookup(name) {
            if ledger.mark_instrumented(name) {
                dispatch_hook(&descriptor, &loaded, name, &ledger);
            }
        }
        Ok(loaded)
    });
    *guard = wrapper;
    original
}

/// Put back the exact loader reference captured at install time.
pub(crate) fn restore(original: LoadFn) {
    let slot = loader_slot();
    let mut guard = match slot.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = original;
}

/// Run one descriptor's `on_require`, containing failures so the triggering
/// load still completes. A panicking hook is downgraded to a `HookError`.
fn dispatch_hook(
    descriptor: &InstrumentationDescriptor,
    loaded: &LoadedModule,
    name: &str,
    ledger: &ShimLedger,
) {
    debug!(module = name, kind = descriptor.kind().as_tag(), "instrumenting module");

    let hook = descriptor.on_require();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        hook(loaded.exports(), name, loaded.metadata())
    }));

    let result = match outcome {
        Ok(result) => result,
        Err(payload) => Err(HookError::new(name, panic_message(payload.as_ref()))),
    };

    match result {
        Ok(()) => {
            ledger.record(
                loaded.exports(),
                ModuleRecord {
                    module_name: name.to_string(),
                    kind: descriptor.kind(),
                    version: loaded.metadata().version.clone(),
                },
            );
        }
        Err(hook_error) => match descriptor.on_error() {
            Some(on_error) => on_error(&hook_error),
            None => error!(module = name, "instrumentation hook failed: {hook_error}"),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "hook panicked".to_string()
    }
}
