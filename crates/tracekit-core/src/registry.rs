// Copyright 2026-Present Tracekit contributors
// SPDX-License-Identifier: Apache-2.0

//! Registry mapping module names to instrumentation descriptors.

use crate::error::HookError;
use crate::loader::{ModuleExports, ModuleMetadata};
use crate::shim::ShimKind;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Hook invoked with the freshly loaded exports, the module name, and the
/// resolved metadata, before application code observes the module.
pub type OnRequireHook =
    Arc<dyn Fn(&ModuleExports, &str, &ModuleMetadata) -> Result<(), HookError> + Send + Sync>;

/// Optional per-descriptor error sink for contained hook failures.
pub type OnErrorHook = Arc<dyn Fn(&HookError) + Send + Sync>;

/// One pluggable instrumentation unit: what to do when a named dependency
/// loads.
#[derive(Clone)]
pub struct InstrumentationDescriptor {
    kind: ShimKind,
    module_name: String,
    on_require: OnRequireHook,
    on_error: Option<OnErrorHook>,
}

impl InstrumentationDescriptor {
    pub fn new(
        kind: ShimKind,
        module_name: impl Into<String>,
        on_require: impl Fn(&ModuleExports, &str, &ModuleMetadata) -> Result<(), HookError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            kind,
            module_name: module_name.into(),
            on_require: Arc::new(on_require),
            on_error: None,
        }
    }

    /// Route this descriptor's hook failures to `on_error` instead of the
    /// general log channel.
    pub fn with_on_error(mut self, on_error: impl Fn(&HookError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    pub fn kind(&self) -> ShimKind {
        self.kind
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub(crate) fn on_require(&self) -> &OnRequireHook {
        &self.on_require
    }

    pub(crate) fn on_error(&self) -> Option<&OnErrorHook> {
        self.on_error.as_ref()
    }
}

impl std::fmt::Debug for InstrumentationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentationDescriptor")
            .field("kind", &self.kind)
            .field("module_name", &self.module_name)
            .field("has_on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Module name → descriptor map consulted by the load interceptor.
///
/// Upsert semantics: registering twice under one name keeps the latest
/// descriptor. No effect on modules that already loaded; only future loads
/// are observed.
#[derive(Debug, Default)]
pub struct InstrumentationRegistry {
    entries: RwLock<HashMap<String, InstrumentationDescriptor>>,
}

impl InstrumentationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, descriptor: InstrumentationDescriptor) {
        if let Ok(mut entries) = self.entries.write() {
            let name = descriptor.module_name.clone();
            if entries.insert(name.clone(), descriptor).is_some() {
                // Last write wins; surfaced so accidental double
                // registration is visible in debug logs.
                debug!(module = %name, "replacing previously registered instrumentation");
            }
        }
    }

    pub fn lookup(&self, module_name: &str) -> Option<InstrumentationDescriptor> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(module_name).cloned())
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_descriptor(name: &str, kind: ShimKind) -> InstrumentationDescriptor {
        InstrumentationDescriptor::new(kind, name, |_, _, _| Ok(()))
    }

    #[test]
    fn test_register_then_lookup_round_trip() {
        let registry = InstrumentationRegistry::new();
        registry.register(noop_descriptor("test", ShimKind::WebFramework));

        let descriptor = registry.lookup("test").unwrap();
        assert_eq!(descriptor.module_name(), "test");
        assert_eq!(descriptor.kind(), ShimKind::WebFramework);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_miss_returns_none() {
        let registry = InstrumentationRegistry::new();
        assert!(registry.lookup("unregistered").is_none());
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = InstrumentationRegistry::new();
        registry.register(noop_descriptor("pg", ShimKind::Generic));
        registry.register(noop_descriptor("pg", ShimKind::Datastore));

        let descriptor = registry.lookup("pg").unwrap();
        assert_eq!(descriptor.kind(), ShimKind::Datastore);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clear_empties_registry() {
        let registry = InstrumentationRegistry::new();
        registry.register(noop_descriptor("koa", ShimKind::WebFramework));
        registry.register(noop_descriptor("redis", ShimKind::Datastore));
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.lookup("koa").is_none());
    }
}
