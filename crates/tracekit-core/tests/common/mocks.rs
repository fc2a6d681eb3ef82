// Copyright 2026-Present Tracekit contributors
// SPDX-License-Identifier: Apache-2.0

//! Mock host loaders and instrumentation descriptors for integration tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracekit_core::{
    HookError, InstrumentationDescriptor, LoadError, LoadFn, LoadedModule, ModuleExports,
    ModuleMetadata, ShimKind,
};
use tracing::field::{Field, Visit};
use tracing::{span, Event, Metadata, Subscriber};

/// In-memory host loader with a fixed set of modules.
///
/// Exports objects are created once, so repeated loads of a name hand back
/// the same object identity, the way a caching host loader would. Every load
/// attempt is recorded.
pub struct ScriptedLoader {
    modules: HashMap<String, LoadedModule>,
    loads: Mutex<Vec<String>>,
}

impl ScriptedLoader {
    pub fn new(modules: &[(&str, &str)]) -> Arc<Self> {
        let modules = modules
            .iter()
            .map(|(name, version)| {
                let loaded = LoadedModule::new(
                    Arc::new(format!("{name} exports")) as ModuleExports,
                    ModuleMetadata {
                        version: Some(version.to_string()),
                        resolved_from: Some(format!("mock://{name}")),
                    },
                );
                (name.to_string(), loaded)
            })
            .collect();
        Arc::new(Self {
            modules,
            loads: Mutex::new(Vec::new()),
        })
    }

    /// A `LoadFn` backed by this loader, for `set_host_loader`.
    pub fn as_load_fn(self: &Arc<Self>) -> LoadFn {
        let loader = Arc::clone(self);
        Arc::new(move |name: &str| loader.load(name))
    }

    fn load(&self, name: &str) -> Result<LoadedModule, LoadError> {
        self.loads.lock().unwrap().push(name.to_string());
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(name.to_string()))
    }

    /// Exports object a load of `name` would produce.
    pub fn exports_of(&self, name: &str) -> ModuleExports {
        Arc::clone(self.modules[name].exports())
    }

    pub fn load_count(&self, name: &str) -> usize {
        self.loads
            .lock()
            .unwrap()
            .iter()
            .filter(|loaded| loaded.as_str() == name)
            .count()
    }
}

/// Shared log of `on_require` invocations: (module name, resolved version).
pub type HookLog = Arc<Mutex<Vec<(String, Option<String>)>>>;

/// Descriptor whose hook appends to `log` and succeeds.
pub fn recording_descriptor(kind: ShimKind, module_name: &str, log: &HookLog) -> InstrumentationDescriptor {
    let log = Arc::clone(log);
    InstrumentationDescriptor::new(kind, module_name, move |_exports, module, metadata| {
        log.lock()
            .unwrap()
            .push((module.to_string(), metadata.version.clone()));
        Ok(())
    })
}

/// Descriptor whose hook always fails with a `HookError`.
pub fn failing_descriptor(module_name: &str) -> InstrumentationDescriptor {
    InstrumentationDescriptor::new(ShimKind::Generic, module_name, |_exports, module, _metadata| {
        Err(HookError::new(module, "mock hook failure"))
    })
}

/// Descriptor whose hook panics outright.
pub fn panicking_descriptor(module_name: &str) -> InstrumentationDescriptor {
    InstrumentationDescriptor::new(ShimKind::Generic, module_name, |_exports, _module, _metadata| {
        panic!("mock hook panic")
    })
}

/// Subscriber counting tracing events per `module` field from one source
/// module (e.g., the catalog's attach logs).
///
/// Install around the loads under test with
/// `tracing::subscriber::with_default` and read the counts afterwards
/// through the shared handle returned by [`new`](Self::new).
pub struct ModuleEventCounter {
    target: &'static str,
    counts: Arc<Mutex<HashMap<String, usize>>>,
}

impl ModuleEventCounter {
    pub fn new(target: &'static str) -> (Self, Arc<Mutex<HashMap<String, usize>>>) {
        let counts = Arc::new(Mutex::new(HashMap::new()));
        (
            Self {
                target,
                counts: Arc::clone(&counts),
            },
            counts,
        )
    }
}

impl Subscriber for ModuleEventCounter {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.target().starts_with(self.target)
    }

    fn new_span(&self, _attrs: &span::Attributes<'_>) -> span::Id {
        span::Id::from_u64(1)
    }

    fn record(&self, _id: &span::Id, _record: &span::Record<'_>) {}

    fn record_follows_from(&self, _id: &span::Id, _follows: &span::Id) {}

    fn event(&self, event: &Event<'_>) {
        let mut visitor = ModuleFieldVisitor::default();
        event.record(&mut visitor);
        if let Some(module) = visitor.module {
            *self.counts.lock().unwrap().entry(module).or_insert(0) += 1;
        }
    }

    fn enter(&self, _id: &span::Id) {}

    fn exit(&self, _id: &span::Id) {}
}

#[derive(Default)]
struct ModuleFieldVisitor {
    module: Option<String>,
}

impl Visit for ModuleFieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "module" {
            self.module = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
}
