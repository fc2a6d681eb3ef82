// Copyright 2026-Present Tracekit contributors
// SPDX-License-Identifier: Apache-2.0

//! Shims: per-module wrapper handles produced for successfully instrumented
//! dependencies, plus the ledger that records which loaded objects were
//! matched and under which name.

use crate::agent::Agent;
use crate::loader::ModuleExports;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

static INSTRUMENTATION_DEBUG: AtomicBool = AtomicBool::new(false);

/// Whether verbose instrumentation diagnostics are enabled.
///
/// Toggled on by `Agent::instrument` and off by `Agent::unload`; consumed by
/// instrumentation plugins that want chattier logging while the agent is
/// attached.
pub fn instrumentation_debug_enabled() -> bool {
    INSTRUMENTATION_DEBUG.load(Ordering::Relaxed)
}

pub(crate) fn set_instrumentation_debug(enabled: bool) {
    INSTRUMENTATION_DEBUG.store(enabled, Ordering::Relaxed);
}

/// Category of an instrumented dependency.
///
/// A closed set: the capability surface attached to a shim is selected by
/// kind at instrumentation time rather than probed at runtime. String tags
/// (`"web-framework"`) map through [`from_tag`](Self::from_tag) at the
/// plugin boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShimKind {
    WebFramework,
    Datastore,
    MessageQueue,
    Generic,
}

impl ShimKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "web-framework" => ShimKind::WebFramework,
            "datastore" | "db" => ShimKind::Datastore,
            "message-queue" => ShimKind::MessageQueue,
            _ => ShimKind::Generic,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            ShimKind::WebFramework => "web-framework",
            ShimKind::Datastore => "datastore",
            ShimKind::MessageQueue => "message-queue",
            ShimKind::Generic => "generic",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ModuleRecord {
    pub(crate) module_name: String,
    pub(crate) kind: ShimKind,
    pub(crate) version: Option<String>,
}

/// Entry in the ledger: the record plus a weak handle to the exports object
/// it was taken from. The weak handle lets lookups tell a live match apart
/// from an unrelated allocation that landed on a recycled address.
#[derive(Debug)]
struct LedgerEntry {
    exports: Weak<dyn Any + Send + Sync>,
    record: ModuleRecord,
}

/// Records which exports objects the interceptor matched, keyed by object
/// identity. Shim lookups resolve from here, never from the object itself:
/// a module registered as "koa" yields a shim reporting "koa" even if its
/// exports carry no name.
#[derive(Debug, Default)]
pub(crate) struct ShimLedger {
    records: Mutex<HashMap<usize, LedgerEntry>>,
    instrumented: Mutex<HashSet<String>>,
}

fn identity_key(exports: &ModuleExports) -> usize {
    Arc::as_ptr(exports) as *const () as usize
}

impl ShimLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Mark `module_name` as instrumented. Returns false if it already was,
    /// so hooks fire exactly once per name per install.
    pub(crate) fn mark_instrumented(&self, module_name: &str) -> bool {
        self.instrumented
            .lock()
            .map(|mut seen| seen.insert(module_name.to_string()))
            .unwrap_or(false)
    }

    pub(crate) fn record(&self, exports: &ModuleExports, record: ModuleRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(
                identity_key(exports),
                LedgerEntry {
                    exports: Arc::downgrade(exports),
                    record,
                },
            );
        }
    }

    /// Resolve the queried object against the ledger.
    ///
    /// An address hit alone is not enough: once the host drops an exports
    /// object its address can be recycled for an arbitrary allocation, so a
    /// hit only counts when the recorded object is still alive and is the
    /// very object being queried. Entries whose exports died are dropped on
    /// the way through.
    pub(crate) fn lookup(&self, exports: &ModuleExports) -> Option<ModuleRecord> {
        let mut records = self.records.lock().ok()?;
        let key = identity_key(exports);
        let mut stale = false;
        let result = records.get(&key).and_then(|entry| match entry.exports.upgrade() {
            Some(live) if Arc::ptr_eq(&live, exports) => Some(entry.record.clone()),
            Some(_) => None,
            None => {
                stale = true;
                None
            }
        });
        if stale {
            records.remove(&key);
        }
        result
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
        if let Ok(mut seen) = self.instrumented.lock() {
            seen.clear();
        }
    }
}

/// Wrapper handle bound to one instrumented dependency.
///
/// Short-lived: instrumentation code asks for one when it needs to observe a
/// call into the dependency, uses it, and drops it. Holds a non-owning agent
/// handle. The full wrap-function/wrap-method surface lives in the shimmer
/// layer; the core exposes identity plus a minimal [`wrap`](Self::wrap)
/// capability.
#[derive(Debug, Clone)]
pub struct Shim {
    agent: Agent,
    module_name: String,
    kind: ShimKind,
    version: Option<String>,
}

impl Shim {
    pub(crate) fn new(agent: Agent, record: ModuleRecord) -> Self {
        Self {
            agent,
            module_name: record.module_name,
            kind: record.kind,
            version: record.version,
        }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn kind(&self) -> ShimKind {
        self.kind
    }

    /// Version resolved when the module was loaded, if the host loader
    /// reported one.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Run `f` attributed to the active transaction, with entry/exit debug
    /// logs naming this shim's module.
    pub fn wrap<R>(&self, label: &str, f: impl FnOnce() -> R) -> R {
        let transaction = self.agent.current_transaction().map(|tx| tx.id());
        debug!(
            module = %self.module_name,
            label,
            ?transaction,
            "entering wrapped call"
        );
        let result = f();
        debug!(module = %self.module_name, label, ?transaction, "wrapped call returned");
        result
    }
}

impl PartialEq for Shim {
    // Identity-relevant fields only: two shims for the same module under the
    // same agent are equal even when they are distinct instances.
    fn eq(&self, other: &Self) -> bool {
        self.agent.instance_id() == other.agent.instance_id()
            && self.module_name == other.module_name
            && self.kind == other.kind
    }
}

impl Eq for Shim {}
