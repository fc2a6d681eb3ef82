// Copyright 2026-Present Tracekit contributors
// SPDX-License-Identifier: Apache-2.0

//! Built-in catalog of supported instrumentations.
//!
//! `Agent::instrument(true)` registers every entry here so all supported
//! dependencies are observed without ad hoc registration. The catalog hooks
//! only record and log what loaded; the real per-library instrumentation
//! logic plugs in through `register_instrumentation` and is out of scope for
//! the core.

use crate::registry::InstrumentationDescriptor;
use crate::shim::ShimKind;
use tracing::debug;

/// Module names the agent knows how to instrument, with their categories.
const SUPPORTED_MODULES: [(&str, ShimKind); 9] = [
    ("express", ShimKind::WebFramework),
    ("koa", ShimKind::WebFramework),
    ("fastify", ShimKind::WebFramework),
    ("pg", ShimKind::Datastore),
    ("mysql", ShimKind::Datastore),
    ("redis", ShimKind::Datastore),
    ("mongodb", ShimKind::Datastore),
    ("amqplib", ShimKind::MessageQueue),
    ("kafkajs", ShimKind::MessageQueue),
];

/// A fresh descriptor for every supported module.
pub fn descriptors() -> Vec<InstrumentationDescriptor> {
    SUPPORTED_MODULES
        .iter()
        .map(|(name, kind)| {
            InstrumentationDescriptor::new(*kind, *name, |_exports, module, metadata| {
                debug!(
                    module,
                    version = metadata.version.as_deref().unwrap_or("unknown"),
                    "catalog instrumentation attached"
                );
                Ok(())
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_names_are_unique() {
        let names: HashSet<_> = SUPPORTED_MODULES.iter().map(|(name, _)| name).collect();
        assert_eq!(names.len(), SUPPORTED_MODULES.len());
    }

    #[test]
    fn test_descriptors_cover_the_catalog() {
        let descriptors = descriptors();
        assert_eq!(descriptors.len(), SUPPORTED_MODULES.len());
        for ((name, kind), descriptor) in SUPPORTED_MODULES.iter().zip(&descriptors) {
            assert_eq!(descriptor.module_name(), *name);
            assert_eq!(descriptor.kind(), *kind);
        }
    }
}
