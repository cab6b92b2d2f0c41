// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::error::{JobError, Result};
use crate::health::{determine_health_state, HealthState, JobHealthStatus, JobsHealthStatus};
use crate::history::RunHistory;
use crate::job::{Job, JobContext};
use crate::types::{JobRun, JobStatus, JobType, TriggerSource};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

const BASE_RETRY_DELAY_SECS: u64 = 1;
const MAX_RETRY_DELAY_SECS: u64 = 60;
const RETRY_FACTOR: f64 = 2.0;
const MAX_RETRIES: u32 = 3;

struct RegisteredJob {
	job: Arc<dyn Job>,
	job_type: JobType,
	cancellation_token: CancellationToken,
	trigger: Arc<Notify>,
}

pub struct JobScheduler {
	jobs: HashMap<String, RegisteredJob>,
	history: Arc<RunHistory>,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for JobScheduler {
	fn default() -> Self {
		Self::new()
	}
}

impl JobScheduler {
	pub fn new() -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			jobs: HashMap::new(),
			history: Arc::new(RunHistory::new()),
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
		}
	}

	pub fn register_periodic(&mut self, job: Arc<dyn Job>, interval: Duration) {
		self.register_periodic_with_delay(job, interval, interval);
	}

	/// Like [`register_periodic`](Self::register_periodic), but the first
	/// scheduled run happens `first_run_after` the scheduler starts instead of
	/// a full interval later.
	pub fn register_periodic_with_delay(
		&mut self,
		job: Arc<dyn Job>,
		interval: Duration,
		first_run_after: Duration,
	) {
		let id = job.id().to_string();
		self.jobs.insert(
			id,
			RegisteredJob {
				job,
				job_type: JobType::Periodic {
					interval,
					first_run_after,
				},
				cancellation_token: CancellationToken::new(),
				trigger: Arc::new(Notify::new()),
			},
		);
	}

	/// Spawn one loop per periodic job.
	///
	/// Each loop waits for the interval to elapse or a manual trigger,
	/// whichever comes first; a manual run restarts the interval. Cancelling
	/// a job ends its loop.
	#[instrument(skip(self))]
	pub async fn start(&self) -> Result<()> {
		let mut handles = self.handles.lock().await;

		for (job_id, registered) in &self.jobs {
			let JobType::Periodic {
				interval,
				first_run_after,
			} = registered.job_type;
			let job = Arc::clone(&registered.job);
			let history = Arc::clone(&self.history);
			let trigger = Arc::clone(&registered.trigger);
			let mut shutdown_rx = self.shutdown_tx.subscribe();
			let cancellation_token = registered.cancellation_token.clone();
			let job_id = job_id.clone();

			let handle = tokio::spawn(async move {
				let mut wait = first_run_after;
				loop {
					let triggered_by = tokio::select! {
						_ = tokio::time::sleep(wait) => TriggerSource::Schedule,
						_ = trigger.notified() => TriggerSource::Manual,
						_ = cancellation_token.cancelled() => {
							info!(job_id = %job_id, "Periodic job cancelled");
							break;
						}
						_ = shutdown_rx.recv() => {
							info!(job_id = %job_id, "Shutting down periodic job");
							break;
						}
					};
					wait = interval;
					let _ = run_job_with_retry(&job, &history, triggered_by, &cancellation_token).await;
				}
			});

			handles.push(handle);
		}

		info!(job_count = handles.len(), "Job scheduler started");
		Ok(())
	}

	/// Request an immediate run without waiting for it.
	///
	/// Requests made while one is already pending collapse into a single run.
	#[instrument(skip(self))]
	pub fn trigger_job(&self, job_id: &str) -> Result<()> {
		let registered = self
			.jobs
			.get(job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
		registered.trigger.notify_one();
		info!(job_id = %job_id, "Job triggered manually");
		Ok(())
	}

	/// Stop the job for good. A run waiting out a retry backoff ends as
	/// cancelled; a run in progress sees the token on its context.
	#[instrument(skip(self))]
	pub fn cancel_job(&self, job_id: &str) -> Result<()> {
		let registered = self
			.jobs
			.get(job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

		registered.cancellation_token.cancel();
		Ok(())
	}

	/// Stop issuing runs and wait for the job loops to exit. A run already in
	/// progress is allowed to finish.
	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(());

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}

		info!("Job scheduler shut down");
	}

	pub fn job_ids(&self) -> Vec<String> {
		self.jobs.keys().cloned().collect()
	}

	pub fn history(&self) -> &Arc<RunHistory> {
		&self.history
	}

	#[instrument(skip(self))]
	pub async fn job_status(&self, job_id: &str) -> Option<JobHealthStatus> {
		let registered = self.jobs.get(job_id)?;

		let last_run = self.history.get_last_run(job_id).await;
		let consecutive_failures = self.history.count_consecutive_failures(job_id).await;
		let status = determine_health_state(last_run.as_ref(), consecutive_failures);

		Some(JobHealthStatus {
			job_id: job_id.to_string(),
			name: registered.job.name().to_string(),
			status,
			last_run: last_run.map(Into::into),
			consecutive_failures,
		})
	}

	#[instrument(skip(self))]
	pub async fn health_status(&self) -> JobsHealthStatus {
		let mut jobs = Vec::new();
		let mut worst_state = HealthState::Healthy;

		for job_id in self.jobs.keys() {
			if let Some(status) = self.job_status(job_id).await {
				worst_state = worst_state.max(status.status);
				jobs.push(status);
			}
		}

		JobsHealthStatus {
			status: worst_state,
			jobs,
		}
	}
}

async fn run_job_with_retry(
	job: &Arc<dyn Job>,
	history: &RunHistory,
	triggered_by: TriggerSource,
	cancellation_token: &CancellationToken,
) -> Result<String> {
	let mut retry_count = 0u32;
	let run_id = uuid::Uuid::new_v4().to_string();

	history
		.record_run_start(&JobRun {
			id: run_id.clone(),
			job_id: job.id().to_string(),
			status: JobStatus::Running,
			started_at: Utc::now(),
			completed_at: None,
			duration_ms: None,
			error_message: None,
			retry_count,
			triggered_by,
			metadata: None,
		})
		.await;

	loop {
		let ctx = JobContext {
			run_id: run_id.clone(),
			triggered_by: if retry_count > 0 {
				TriggerSource::Retry
			} else {
				triggered_by
			},
			cancellation_token: cancellation_token.clone(),
		};

		match job.run(&ctx).await {
			Ok(output) => {
				history
					.record_run_complete(
						job.id(),
						&run_id,
						JobStatus::Succeeded,
						retry_count,
						None,
						output.metadata,
					)
					.await;
				info!(job_id = %job.id(), run_id = %run_id, message = %output.message, "Job completed successfully");
				return Ok(run_id);
			}
			Err(JobError::Cancelled) => {
				history
					.record_run_complete(job.id(), &run_id, JobStatus::Cancelled, retry_count, None, None)
					.await;
				info!(job_id = %job.id(), run_id = %run_id, "Job cancelled");
				return Err(JobError::Cancelled);
			}
			Err(JobError::Failed { message, retryable }) => {
				if retryable && retry_count < MAX_RETRIES {
					retry_count += 1;
					let delay_secs = calculate_backoff_delay(retry_count);
					warn!(
						job_id = %job.id(),
						run_id = %run_id,
						retry_count,
						delay_secs,
						error = %message,
						"Job failed, retrying"
					);
					tokio::select! {
						_ = tokio::time::sleep(Duration::from_secs(delay_secs)) => continue,
						_ = cancellation_token.cancelled() => {
							history
								.record_run_complete(
									job.id(),
									&run_id,
									JobStatus::Cancelled,
									retry_count,
									Some(message),
									None,
								)
								.await;
							info!(job_id = %job.id(), run_id = %run_id, "Job cancelled during retry backoff");
							return Err(JobError::Cancelled);
						}
					}
				}

				history
					.record_run_complete(
						job.id(),
						&run_id,
						JobStatus::Failed,
						retry_count,
						Some(message.clone()),
						None,
					)
					.await;
				warn!(job_id = %job.id(), run_id = %run_id, error = %message, "Job failed");
				return Err(JobError::Failed { message, retryable });
			}
			Err(e) => {
				let message = e.to_string();
				history
					.record_run_complete(
						job.id(),
						&run_id,
						JobStatus::Failed,
						retry_count,
						Some(message.clone()),
						None,
					)
					.await;
				warn!(job_id = %job.id(), run_id = %run_id, error = %message, "Job failed with error");
				return Err(e);
			}
		}
	}
}

pub(crate) fn calculate_backoff_delay(retry_count: u32) -> u64 {
	let delay = BASE_RETRY_DELAY_SECS as f64 * RETRY_FACTOR.powi(retry_count as i32 - 1);
	(delay as u64).min(MAX_RETRY_DELAY_SECS)
}
