// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background job scheduler for the sealed secrets controller.
//!
//! Periodic jobs run on a fixed interval and can also be triggered on demand.
//! Manual triggers coalesce: any number of requests made while a trigger is
//! already pending result in a single run. Run history is kept in memory and
//! backs the health report.

pub mod error;
pub mod health;
pub mod history;
pub mod job;
pub mod scheduler;
pub mod types;

pub use error::{JobError, Result};
pub use health::{HealthState, JobHealthStatus, JobsHealthStatus, LastRunInfo};
pub use history::RunHistory;
pub use job::{Job, JobContext};
pub use scheduler::JobScheduler;
pub use tokio_util::sync::CancellationToken;
pub use types::{JobOutput, JobRun, JobStatus, JobType, TriggerSource};
