// Copyright 2026-Present Tracekit contributors
// SPDX-License-Identifier: Apache-2.0

//! The agent lifecycle controller: the process-wide singleton coordinating
//! the instrumentation registry, load interceptor, shim ledger and
//! transaction context.

use crate::catalog;
use crate::config::AgentConfig;
use crate::context::{ContextManager, Transaction};
use crate::error::AgentError;
use crate::loader::{self, LoadFn, ModuleExports};
use crate::registry::{InstrumentationDescriptor, InstrumentationRegistry};
use crate::shim::{self, Shim, ShimLedger};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::{debug, info, warn};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide slot holding the instance id of the live agent, if any.
fn singleton_slot() -> &'static Mutex<Option<u64>> {
    static SLOT: OnceLock<Mutex<Option<u64>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

fn lock_slot() -> MutexGuard<'static, Option<u64>> {
    match singleton_slot().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Lifecycle state of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Stopped,
    Starting,
    Started,
    Stopping,
    Errored,
}

/// Handle to the process-wide agent.
///
/// Cheap to clone; all clones share one underlying instance. At most one
/// live instance exists per process: constructing a second fails with
/// [`AgentError::SingletonViolation`] until the first is unloaded or
/// dropped.
#[derive(Debug, Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

struct AgentInner {
    id: u64,
    config: AgentConfig,
    state: Mutex<AgentState>,
    registry: Arc<InstrumentationRegistry>,
    ledger: Arc<ShimLedger>,
    context: ContextManager,
    /// Original loader captured when the interceptor was installed.
    patch: Mutex<Option<LoadFn>>,
    /// Set once the instance is unloaded and detached from the singleton
    /// slot; lifecycle operations on a detached instance are refused.
    detached: AtomicBool,
}

impl std::fmt::Debug for AgentInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentInner")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("detached", &self.detached)
            .finish()
    }
}

impl Agent {
    /// Construct and start the agent.
    pub fn new(config: AgentConfig) -> Result<Self, AgentError> {
        Self::construct(config, true)
    }

    /// Construct the agent without starting it; [`start`](Self::start) moves
    /// it to `Started`.
    pub fn new_stopped(config: AgentConfig) -> Result<Self, AgentError> {
        Self::construct(config, false)
    }

    fn construct(config: AgentConfig, auto_start: bool) -> Result<Self, AgentError> {
        config.validate()?;

        let id = NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed);
        {
            let mut slot = lock_slot();
            if slot.is_some() {
                return Err(AgentError::SingletonViolation);
            }
            *slot = Some(id);
        }

        let agent = Self {
            inner: Arc::new(AgentInner {
                id,
                config,
                state: Mutex::new(if auto_start {
                    AgentState::Starting
                } else {
                    AgentState::Stopped
                }),
                registry: Arc::new(InstrumentationRegistry::new()),
                ledger: Arc::new(ShimLedger::new()),
                context: ContextManager::new(),
                patch: Mutex::new(None),
                detached: AtomicBool::new(false),
            }),
        };

        if auto_start {
            agent.set_state(AgentState::Started);
            info!(service = %agent.inner.config.service_name, "agent started");
        } else {
            debug!(service = %agent.inner.config.service_name, "agent constructed stopped");
        }
        Ok(agent)
    }

    /// Move a stopped agent to `Started`.
    pub fn start(&self) {
        if self.is_detached("start") {
            return;
        }
        self.set_state(AgentState::Started);
        info!(service = %self.inner.config.service_name, "agent started");
    }

    pub fn state(&self) -> AgentState {
        self.inner
            .state
            .lock()
            .map(|state| *state)
            .unwrap_or(AgentState::Errored)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    /// Install the module load interceptor and enable instrumentation
    /// diagnostics. With `full_instrumentation`, also register every
    /// catalog descriptor so all supported dependencies are observed.
    ///
    /// Idempotent with respect to the interceptor: a second call never
    /// double-wraps the loader.
    pub fn instrument(&self, full_instrumentation: bool) {
        if self.is_detached("instrument") {
            return;
        }

        if full_instrumentation {
            let descriptors = catalog::descriptors();
            debug!(count = descriptors.len(), "registering catalog instrumentations");
            for descriptor in descriptors {
                self.inner.registry.register(descriptor);
            }
        }

        let mut patch = lock_patch(&self.inner.patch);
        if patch.is_none() {
            let original = loader::install(
                Arc::clone(&self.inner.registry),
                Arc::clone(&self.inner.ledger),
            );
            *patch = Some(original);
            debug!("module load interceptor installed");
        }
        drop(patch);

        shim::set_instrumentation_debug(true);
    }

    /// Reverse every side effect of [`instrument`](Self::instrument) and
    /// release the singleton slot. Safe to call any number of times, with or
    /// without a prior `instrument`.
    pub fn unload(&self) {
        self.set_state(AgentState::Stopping);

        if let Some(original) = lock_patch(&self.inner.patch).take() {
            loader::restore(original);
            debug!("module load interceptor removed");
        }

        shim::set_instrumentation_debug(false);
        self.inner.registry.clear();
        self.inner.ledger.clear();
        self.inner.context.set_context(None);

        self.release_slot();
        self.inner.detached.store(true, Ordering::Release);
        self.set_state(AgentState::Stopped);
        info!(service = %self.inner.config.service_name, "agent unloaded");
    }

    /// Create a transaction and run `f` inside it, synchronously.
    ///
    /// The transaction is the active context for exactly the dynamic extent
    /// of `f`; the previous context is restored on return and on unwind.
    pub fn run_in_transaction<R>(&self, f: impl FnOnce(&Transaction) -> R) -> R {
        self.run_transaction_inner(None, f)
    }

    /// Like [`run_in_transaction`](Self::run_in_transaction) with a
    /// human-readable transaction name.
    pub fn run_in_named_transaction<R>(
        &self,
        name: impl Into<String>,
        f: impl FnOnce(&Transaction) -> R,
    ) -> R {
        self.run_transaction_inner(Some(name.into()), f)
    }

    fn run_transaction_inner<R>(
        &self,
        name: Option<String>,
        f: impl FnOnce(&Transaction) -> R,
    ) -> R {
        let transaction = Transaction::new(name);
        if self.inner.config.log_transactions {
            debug!(id = transaction.id(), name = ?transaction.name(), "transaction started");
        }
        let result = self
            .inner
            .context
            .run_in_context(Some(transaction.clone()), || f(&transaction));
        if self.inner.config.log_transactions {
            debug!(id = transaction.id(), "transaction ended");
        }
        result
    }

    /// The active transaction for this call chain, or `None` outside any
    /// traced scope. Never blocks.
    pub fn current_transaction(&self) -> Option<Transaction> {
        self.inner.context.get_context()
    }

    /// The context manager handle: read, overwrite, scoped swap-and-restore.
    pub fn context_manager(&self) -> &ContextManager {
        &self.inner.context
    }

    /// Insert or replace an instrumentation descriptor. Only future loads
    /// are observed; modules that already loaded are unaffected.
    pub fn register_instrumentation(&self, descriptor: InstrumentationDescriptor) {
        self.inner.registry.register(descriptor);
    }

    /// Shim for a previously instrumented exports object, or `None` if the
    /// interceptor never matched it.
    pub fn shim_for(&self, exports: &ModuleExports) -> Option<Shim> {
        self.inner
            .ledger
            .lookup(exports)
            .map(|record| Shim::new(self.clone(), record))
    }

    /// Number of registered instrumentations.
    pub fn registered_instrumentations(&self) -> usize {
        self.inner.registry.len()
    }

    pub(crate) fn instance_id(&self) -> u64 {
        self.inner.id
    }

    fn set_state(&self, state: AgentState) {
        if let Ok(mut guard) = self.inner.state.lock() {
            *guard = state;
        }
    }

    fn release_slot(&self) {
        let mut slot = lock_slot();
        if *slot == Some(self.inner.id) {
            *slot = None;
        }
    }

    fn is_detached(&self, operation: &str) -> bool {
        if self.inner.detached.load(Ordering::Acquire) {
            warn!(operation, "ignoring lifecycle call on an unloaded agent");
            self.set_state(AgentState::Errored);
            true
        } else {
            false
        }
    }
}

impl Drop for AgentInner {
    // Best-effort teardown for agents dropped without an explicit unload:
    // put the loader back, drop the diagnostics flag, free the slot.
    fn drop(&mut self) {
        if let Some(original) = lock_patch(&self.patch).take() {
            loader::restore(original);
            shim::set_instrumentation_debug(false);
        }
        let mut slot = lock_slot();
        if *slot == Some(self.id) {
            *slot = None;
        }
    }
}

fn lock_patch(patch: &Mutex<Option<LoadFn>>) -> MutexGuard<'_, Option<LoadFn>> {
    match patch.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
