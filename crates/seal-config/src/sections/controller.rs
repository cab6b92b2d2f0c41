// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reconciler worker configuration section.

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
	pub workers: usize,
	pub max_retries: u32,
	/// Namespace holding key records. Resolved from the pod environment when unset.
	pub namespace: Option<String>,
}

impl Default for WorkerConfig {
	fn default() -> Self {
		Self {
			workers: DEFAULT_WORKERS,
			max_retries: DEFAULT_MAX_RETRIES,
			namespace: None,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct WorkerConfigLayer {
	#[serde(default)]
	pub workers: Option<usize>,
	#[serde(default)]
	pub max_retries: Option<u32>,
	#[serde(default)]
	pub namespace: Option<String>,
}

impl WorkerConfigLayer {
	pub fn merge(&mut self, other: WorkerConfigLayer) {
		if other.workers.is_some() {
			self.workers = other.workers;
		}
		if other.max_retries.is_some() {
			self.max_retries = other.max_retries;
		}
		if other.namespace.is_some() {
			self.namespace = other.namespace;
		}
	}

	pub fn finalize(self) -> Result<WorkerConfig, ConfigError> {
		let workers = self.workers.unwrap_or(DEFAULT_WORKERS);
		if workers == 0 {
			return Err(ConfigError::InvalidValue {
				key: "controller.workers".to_string(),
				message: "at least one worker is required".to_string(),
			});
		}
		Ok(WorkerConfig {
			workers,
			max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
			namespace: self.namespace.filter(|ns| !ns.is_empty()),
		})
	}
}
