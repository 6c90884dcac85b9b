// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Value objects, ports and result types for service-account key rotation.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types and interfaces with no knowledge of HTTP or Google APIs

pub mod config;
pub mod error;
pub mod identity;
pub mod key;
pub mod outcome;
pub mod principal;
pub mod secret;
pub mod secret_store;
