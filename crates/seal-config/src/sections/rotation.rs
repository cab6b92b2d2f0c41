// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key rotation configuration section.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Thirty days.
pub const DEFAULT_ROTATE_PERIOD_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq)]
pub struct RotationConfig {
	pub period_secs: u64,
}

impl RotationConfig {
	pub fn period(&self) -> Duration {
		Duration::from_secs(self.period_secs)
	}
}

impl Default for RotationConfig {
	fn default() -> Self {
		Self {
			period_secs: DEFAULT_ROTATE_PERIOD_SECS,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RotationConfigLayer {
	#[serde(default)]
	pub period_secs: Option<u64>,
}

impl RotationConfigLayer {
	pub fn merge(&mut self, other: RotationConfigLayer) {
		if other.period_secs.is_some() {
			self.period_secs = other.period_secs;
		}
	}

	pub fn finalize(self) -> Result<RotationConfig, ConfigError> {
		let period_secs = self.period_secs.unwrap_or(DEFAULT_ROTATE_PERIOD_SECS);
		if period_secs == 0 {
			return Err(ConfigError::InvalidValue {
				key: "rotation.period_secs".to_string(),
				message: "must be greater than zero".to_string(),
			});
		}
		Ok(RotationConfig { period_secs })
	}
}
