// Copyright 2026-Present Tracekit contributors
// SPDX-License-Identifier: Apache-2.0

//! Transaction handles and the call-stack-scoped "current transaction" slot.
//!
//! The slot is scoped per thread so that concurrently executing call chains
//! never observe each other's transactions. Scoped entry points
//! (`run_in_context`, `Agent::run_in_transaction`) swap the slot for the
//! dynamic extent of their callback and restore the shadowed value on exit,
//! including exit by panic.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACTIVE_TRANSACTION: RefCell<Option<Transaction>> = const { RefCell::new(None) };
}

/// One logical unit of work (e.g., one incoming request).
///
/// Cheap to clone; equality is by transaction id. A transaction lives exactly
/// as long as the traced scope that created it keeps a handle to it.
#[derive(Debug, Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

#[derive(Debug)]
struct TransactionInner {
    id: u64,
    name: Option<String>,
}

impl Transaction {
    pub(crate) fn new(name: Option<String>) -> Self {
        Self {
            inner: Arc::new(TransactionInner {
                id: NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed),
                name,
            }),
        }
    }

    /// Process-unique transaction id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Optional human-readable name given at creation time.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Transaction {}

/// Handle to the ambient "current transaction" slot.
///
/// Exposes exactly three operations: read, overwrite, and scoped
/// swap-and-restore.
#[derive(Debug, Default, Clone)]
pub struct ContextManager {
    _private: (),
}

impl ContextManager {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }

    /// The active transaction for this call chain, or `None` outside any
    /// traced scope.
    pub fn get_context(&self) -> Option<Transaction> {
        ACTIVE_TRANSACTION.with(|slot| slot.borrow().clone())
    }

    /// Overwrite the active transaction slot.
    ///
    /// Prefer [`run_in_context`](Self::run_in_context); a bare overwrite has
    /// no restore discipline and is mainly useful for tests and teardown.
    pub fn set_context(&self, value: Option<Transaction>) {
        ACTIVE_TRANSACTION.with(|slot| *slot.borrow_mut() = value);
    }

    /// Run `f` with `value` installed as the active transaction, restoring
    /// the previous value when `f` returns or unwinds.
    pub fn run_in_context<R>(&self, value: Option<Transaction>, f: impl FnOnce() -> R) -> R {
        let _guard = RestoreGuard::enter(value);
        f()
    }
}

/// Swaps the slot on construction and puts the shadowed value back on drop,
/// so restoration also runs during unwinding.
struct RestoreGuard {
    previous: Option<Transaction>,
}

impl RestoreGuard {
    fn enter(value: Option<Transaction>) -> Self {
        let previous =
            ACTIVE_TRANSACTION.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), value));
        Self { previous }
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE_TRANSACTION.with(|slot| *slot.borrow_mut() = previous);
    }
}
