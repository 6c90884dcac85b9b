// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`sa-keys-core`)
//!
//! HTTP surface that translates requests into application service calls.
//! No business logic lives here.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Axum router, handlers and shared [`api::AppState`] |
//! | [`extract`] | Form and JSON body extractors rejecting with `KeyOpsError` |
//! | [`error`] | `KeyOpsError` to HTTP status/body mapping |

pub mod api;
pub mod error;
pub mod extract;
