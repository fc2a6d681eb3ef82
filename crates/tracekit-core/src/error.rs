// Copyright 2026-Present Tracekit contributors
// SPDX-License-Identifier: Apache-2.0

/// Errors raised by the agent lifecycle surface.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("An agent is already registered for this process; unload it before constructing another")]
    SingletonViolation,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors produced by host module loaders.
///
/// The load interceptor passes these through untouched: a failing load looks
/// the same to application code whether the agent is installed or not.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Failed to load module {module}: {reason}")]
    Failed { module: String, reason: String },
}

/// Failure inside an instrumentation descriptor's `on_require` hook.
///
/// Contained at the interception boundary: routed to the descriptor's
/// `on_error` when present, otherwise logged, and the triggering load still
/// completes.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Instrumentation hook for {module} failed: {message}")]
pub struct HookError {
    module: String,
    message: String,
}

impl HookError {
    pub fn new(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Name of the module whose hook failed.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Human-readable failure description.
    pub fn message(&self) -> &str {
        &self.message
    }
}
