// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic key rotation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use seal_jobs::{Job, JobContext, JobError, JobOutput};
use seal_keys::{KeyError, KeyPair, KeyRegistry, KeyResult};
use tracing::{info, instrument};

pub const KEY_ROTATION_JOB_ID: &str = "key-rotation";

/// Whether a key created at `created_at` has outlived `period` at `now`.
pub fn rotation_due(created_at: DateTime<Utc>, period: Duration, now: DateTime<Utc>) -> bool {
	chrono::Duration::from_std(period).is_ok_and(|period| now - created_at >= period)
}

/// Time left until a key created at `created_at` has outlived `period`.
pub fn rotation_delay(created_at: DateTime<Utc>, period: Duration, now: DateTime<Utc>) -> Duration {
	let elapsed = (now - created_at).to_std().unwrap_or(Duration::ZERO);
	period.saturating_sub(elapsed)
}

/// When the first scheduled rotation should happen, measured from the age of
/// the newest sealing key so that restarts do not postpone rotation.
pub async fn first_rotation_delay(registry: &KeyRegistry, period: Duration) -> Duration {
	match registry.latest().await {
		Ok(latest) => rotation_delay(latest.created_at(), period, Utc::now()),
		Err(_) => Duration::ZERO,
	}
}

/// Make sure a fresh key exists before the controller starts.
///
/// Generates a key when none is eligible for sealing or the newest one is
/// older than `period`. Returns the generated key, if any.
#[instrument(skip(registry))]
pub async fn init_key_rotation(
	registry: &KeyRegistry,
	period: Duration,
) -> KeyResult<Option<Arc<KeyPair>>> {
	match registry.latest().await {
		Ok(latest) if !rotation_due(latest.created_at(), period, Utc::now()) => {
			info!(key = %latest.name(), "latest key is current");
			Ok(None)
		}
		Ok(_) | Err(KeyError::NoKeys) => registry.generate().await.map(Some),
		Err(e) => Err(e),
	}
}

pub struct KeyRotationJob {
	registry: Arc<KeyRegistry>,
}

impl KeyRotationJob {
	pub fn new(registry: Arc<KeyRegistry>) -> Self {
		Self { registry }
	}
}

#[async_trait]
impl Job for KeyRotationJob {
	fn id(&self) -> &str {
		KEY_ROTATION_JOB_ID
	}

	fn name(&self) -> &str {
		"Key Rotation"
	}

	fn description(&self) -> &str {
		"Generate a new sealing key"
	}

	#[instrument(skip(self, ctx), fields(job_id = KEY_ROTATION_JOB_ID))]
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		let key = self.registry.generate().await.map_err(|e| JobError::Failed {
			retryable: matches!(e, KeyError::Store(_)),
			message: e.to_string(),
		})?;
		let keys = self.registry.len().await;

		info!(key = %key.name(), keys, "rotated sealing key");

		Ok(JobOutput {
			message: format!("Generated key {}", key.name()),
			metadata: Some(serde_json::json!({
				"key": key.name(),
				"keys": keys,
			})),
		})
	}
}
