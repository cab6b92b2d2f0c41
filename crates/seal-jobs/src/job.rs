// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::types::{JobOutput, TriggerSource};

/// Per-run state handed to [`Job::run`].
///
/// Every attempt of a run, retries included, shares the same `run_id`.
#[derive(Debug, Clone)]
pub struct JobContext {
	pub run_id: String,
	pub triggered_by: TriggerSource,
	/// Fires when the job is cancelled through the scheduler. Long-running
	/// work should check it between steps and return [`JobError::Cancelled`].
	pub cancellation_token: CancellationToken,
}

/// Unit of background work driven by the [`JobScheduler`](crate::JobScheduler).
#[async_trait]
pub trait Job: Send + Sync {
	/// Stable identifier used for triggering, cancelling and run history.
	fn id(&self) -> &str;
	fn name(&self) -> &str;
	fn description(&self) -> &str;

	/// Return `JobError::Failed { retryable: true, .. }` to have the
	/// scheduler retry the run with backoff.
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError>;
}
