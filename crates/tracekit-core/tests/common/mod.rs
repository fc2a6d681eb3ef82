// Copyright 2026-Present Tracekit contributors
// SPDX-License-Identifier: Apache-2.0

//! Common test utilities, mocks, and helpers for integration tests

pub mod helpers;
pub mod mocks;
