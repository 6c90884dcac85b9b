// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod gcp;
pub mod in_memory;

pub use gcp::{IamRestClient, SecretManagerRestClient};
pub use in_memory::{InMemoryIdentityService, InMemorySecretStore};
