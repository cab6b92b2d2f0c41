// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory record of recent job runs.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use tokio::sync::Mutex;

use crate::types::{JobRun, JobStatus};

/// Runs kept per job.
pub const MAX_RUNS_PER_JOB: usize = 32;

#[derive(Default)]
pub struct RunHistory {
	runs: Mutex<HashMap<String, VecDeque<JobRun>>>,
}

impl RunHistory {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn record_run_start(&self, run: &JobRun) {
		let mut runs = self.runs.lock().await;
		let entries = runs.entry(run.job_id.clone()).or_default();
		if entries.len() == MAX_RUNS_PER_JOB {
			entries.pop_front();
		}
		entries.push_back(run.clone());
	}

	pub async fn record_run_complete(
		&self,
		job_id: &str,
		run_id: &str,
		status: JobStatus,
		retry_count: u32,
		error_message: Option<String>,
		metadata: Option<serde_json::Value>,
	) {
		let mut runs = self.runs.lock().await;
		let Some(run) = runs
			.get_mut(job_id)
			.and_then(|entries| entries.iter_mut().rev().find(|r| r.id == run_id))
		else {
			return;
		};
		let now = Utc::now();
		run.status = status;
		run.retry_count = retry_count;
		run.completed_at = Some(now);
		run.duration_ms = Some((now - run.started_at).num_milliseconds());
		run.error_message = error_message;
		run.metadata = metadata;
	}

	pub async fn get_last_run(&self, job_id: &str) -> Option<JobRun> {
		let runs = self.runs.lock().await;
		runs.get(job_id).and_then(|entries| entries.back().cloned())
	}

	/// Failed runs since the most recent run that did not fail.
	pub async fn count_consecutive_failures(&self, job_id: &str) -> u32 {
		let runs = self.runs.lock().await;
		runs.get(job_id)
			.map(|entries| {
				entries
					.iter()
					.rev()
					.take_while(|r| r.status == JobStatus::Failed)
					.count() as u32
			})
			.unwrap_or(0)
	}

	pub async fn runs(&self, job_id: &str) -> Vec<JobRun> {
		let runs = self.runs.lock().await;
		runs.get(job_id)
			.map(|entries| entries.iter().cloned().collect())
			.unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::TriggerSource;

	fn started(id: &str) -> JobRun {
		JobRun {
			id: id.to_string(),
			job_id: "rotate".to_string(),
			status: JobStatus::Running,
			started_at: Utc::now(),
			completed_at: None,
			duration_ms: None,
			error_message: None,
			retry_count: 0,
			triggered_by: TriggerSource::Schedule,
			metadata: None,
		}
	}

	#[tokio::test]
	async fn counts_failures_since_last_success() {
		let history = RunHistory::new();
		for (id, status) in [
			("a", JobStatus::Failed),
			("b", JobStatus::Succeeded),
			("c", JobStatus::Failed),
			("d", JobStatus::Failed),
		] {
			history.record_run_start(&started(id)).await;
			history
				.record_run_complete("rotate", id, status, 0, None, None)
				.await;
		}

		assert_eq!(history.count_consecutive_failures("rotate").await, 2);
		assert_eq!(history.get_last_run("rotate").await.unwrap().id, "d");
		assert_eq!(history.count_consecutive_failures("other").await, 0);
	}

	#[tokio::test]
	async fn keeps_bounded_history() {
		let history = RunHistory::new();
		for i in 0..(MAX_RUNS_PER_JOB + 5) {
			history.record_run_start(&started(&i.to_string())).await;
		}
		let runs = history.runs("rotate").await;
		assert_eq!(runs.len(), MAX_RUNS_PER_JOB);
		assert_eq!(runs[0].id, "5");
	}
}
