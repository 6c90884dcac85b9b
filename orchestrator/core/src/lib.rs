// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Service-account key rotation core.
//!
//! # Architecture
//!
//! - `domain`: value types, errors, config and the two upstream ports
//! - `application`: generator, publisher, reaper, batch coordinator, auditor
//! - `infrastructure`: GCP REST adapters and in-memory adapters
//! - `presentation`: HTTP API

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;
