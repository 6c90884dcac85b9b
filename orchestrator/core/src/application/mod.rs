// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod pool;
pub mod key_generator;
pub mod secret_publisher;
pub mod key_reaper;
pub mod rotation;
pub mod auditor;
pub mod finding_trigger;

// Re-export services for convenience
pub use auditor::SecretAuditor;
pub use finding_trigger::{FindingTrigger, PushEnvelope, TriggerDecision};
pub use key_generator::{GeneratedKey, KeyGenerator};
pub use key_reaper::{DeletionReport, KeyReaper};
pub use pool::WorkerPool;
pub use rotation::{BatchCoordinator, RotationRequest};
pub use secret_publisher::{PublishedSecret, SecretPublisher};
