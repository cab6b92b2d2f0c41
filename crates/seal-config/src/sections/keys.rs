// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key generation configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_KEY_PREFIX: &str = "sealed-secrets-key";
pub const DEFAULT_KEY_SIZE: usize = 4096;
pub const MIN_KEY_SIZE: usize = 1024;
/// Ten years.
pub const DEFAULT_KEY_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

const MAX_SUBDOMAIN_LEN: usize = 253;

/// Treatment of key records marked as compromised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyBlacklistPolicy {
	#[default]
	Exclude,
	DecryptOnly,
}

impl std::str::FromStr for KeyBlacklistPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"exclude" => Ok(Self::Exclude),
			"decrypt_only" | "decrypt-only" => Ok(Self::DecryptOnly),
			other => Err(format!("unknown blacklist policy '{other}'")),
		}
	}
}

/// Key configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq)]
pub struct KeysConfig {
	/// Name prefix for key records, always ending in `-`.
	pub prefix: String,
	pub size_bits: usize,
	pub ttl_secs: u64,
	pub common_name: String,
	pub blacklist_policy: KeyBlacklistPolicy,
}

impl KeysConfig {
	pub fn ttl(&self) -> Duration {
		Duration::from_secs(self.ttl_secs)
	}
}

impl Default for KeysConfig {
	fn default() -> Self {
		Self {
			prefix: format!("{DEFAULT_KEY_PREFIX}-"),
			size_bits: DEFAULT_KEY_SIZE,
			ttl_secs: DEFAULT_KEY_TTL_SECS,
			common_name: String::new(),
			blacklist_policy: KeyBlacklistPolicy::default(),
		}
	}
}

/// Key configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct KeysConfigLayer {
	#[serde(default)]
	pub prefix: Option<String>,
	#[serde(default)]
	pub size_bits: Option<usize>,
	#[serde(default)]
	pub ttl_secs: Option<u64>,
	#[serde(default)]
	pub common_name: Option<String>,
	#[serde(default)]
	pub blacklist_policy: Option<KeyBlacklistPolicy>,
}

impl KeysConfigLayer {
	pub fn merge(&mut self, other: KeysConfigLayer) {
		if other.prefix.is_some() {
			self.prefix = other.prefix;
		}
		if other.size_bits.is_some() {
			self.size_bits = other.size_bits;
		}
		if other.ttl_secs.is_some() {
			self.ttl_secs = other.ttl_secs;
		}
		if other.common_name.is_some() {
			self.common_name = other.common_name;
		}
		if other.blacklist_policy.is_some() {
			self.blacklist_policy = other.blacklist_policy;
		}
	}

	pub fn finalize(self) -> Result<KeysConfig, ConfigError> {
		let prefix = validate_key_prefix(self.prefix.as_deref().unwrap_or(DEFAULT_KEY_PREFIX))?;

		let size_bits = self.size_bits.unwrap_or(DEFAULT_KEY_SIZE);
		if size_bits < MIN_KEY_SIZE {
			return Err(ConfigError::InvalidValue {
				key: "keys.size_bits".to_string(),
				message: format!("{size_bits} is below the minimum of {MIN_KEY_SIZE}"),
			});
		}

		let ttl_secs = self.ttl_secs.unwrap_or(DEFAULT_KEY_TTL_SECS);
		if ttl_secs == 0 {
			return Err(ConfigError::InvalidValue {
				key: "keys.ttl_secs".to_string(),
				message: "must be greater than zero".to_string(),
			});
		}

		Ok(KeysConfig {
			prefix,
			size_bits,
			ttl_secs,
			common_name: self.common_name.unwrap_or_default(),
			blacklist_policy: self.blacklist_policy.unwrap_or_default(),
		})
	}
}

fn is_dns1123_label(label: &str) -> bool {
	let bytes = label.as_bytes();
	!bytes.is_empty()
		&& bytes
			.iter()
			.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
		&& bytes[0].is_ascii_alphanumeric()
		&& bytes[bytes.len() - 1].is_ascii_alphanumeric()
}

/// Check a key name prefix and normalise it to end with `-`.
///
/// The prefix without its trailing `-` must be a DNS-1123 subdomain.
pub fn validate_key_prefix(prefix: &str) -> Result<String, ConfigError> {
	let stem = prefix.strip_suffix('-').unwrap_or(prefix);
	let valid = stem.len() < MAX_SUBDOMAIN_LEN && stem.split('.').all(is_dns1123_label);
	if !valid {
		return Err(ConfigError::InvalidValue {
			key: "keys.prefix".to_string(),
			message: format!(
				"'{prefix}' must consist of lower case alphanumeric characters, '-' or '.', \
				 and must start and end with an alphanumeric character"
			),
		});
	}
	Ok(format!("{stem}-"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_layer_finalize_defaults() {
		let config = KeysConfigLayer::default().finalize().unwrap();
		assert_eq!(config, KeysConfig::default());
		assert_eq!(config.prefix, "sealed-secrets-key-");
		assert_eq!(config.ttl(), Duration::from_secs(315_360_000));
	}

	#[test]
	fn test_prefix_gets_trailing_dash() {
		assert_eq!(validate_key_prefix("my-keys").unwrap(), "my-keys-");
		assert_eq!(validate_key_prefix("my-keys-").unwrap(), "my-keys-");
		assert_eq!(validate_key_prefix("a.b").unwrap(), "a.b-");
	}

	#[test]
	fn test_invalid_prefixes_rejected() {
		for prefix in ["", "-", "Keys", "under_score", "a..b", ".a", "a-.b", "sp ace"] {
			assert!(validate_key_prefix(prefix).is_err(), "{prefix:?} accepted");
		}
		assert!(validate_key_prefix(&"a".repeat(300)).is_err());
	}

	#[test]
	fn test_small_key_size_rejected() {
		let layer = KeysConfigLayer {
			size_bits: Some(512),
			..Default::default()
		};
		let err = layer.finalize().unwrap_err();
		assert!(err.to_string().contains("keys.size_bits"));
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = KeysConfigLayer {
			prefix: Some("old".to_string()),
			size_bits: Some(2048),
			..Default::default()
		};
		base.merge(KeysConfigLayer {
			prefix: Some("new".to_string()),
			blacklist_policy: Some(KeyBlacklistPolicy::DecryptOnly),
			..Default::default()
		});
		assert_eq!(base.prefix.as_deref(), Some("new"));
		assert_eq!(base.size_bits, Some(2048));
		assert_eq!(base.blacklist_policy, Some(KeyBlacklistPolicy::DecryptOnly));
	}

	#[test]
	fn test_deserialize_layer_partial() {
		let layer: KeysConfigLayer =
			toml::from_str("common_name = \"controller\"\nblacklist_policy = \"decrypt_only\"\n")
				.unwrap();
		assert_eq!(layer.common_name.as_deref(), Some("controller"));
		assert_eq!(layer.blacklist_policy, Some(KeyBlacklistPolicy::DecryptOnly));
		assert!(layer.prefix.is_none());
	}

	#[test]
	fn test_blacklist_policy_from_str() {
		assert_eq!(
			"EXCLUDE".parse::<KeyBlacklistPolicy>(),
			Ok(KeyBlacklistPolicy::Exclude)
		);
		assert_eq!(
			"decrypt-only".parse::<KeyBlacklistPolicy>(),
			Ok(KeyBlacklistPolicy::DecryptOnly)
		);
		assert!("ignore".parse::<KeyBlacklistPolicy>().is_err());
	}

	proptest! {
		#[test]
		fn valid_prefixes_normalise_idempotently(stem in "[a-z0-9]([a-z0-9-]{0,20}[a-z0-9])?") {
			let once = validate_key_prefix(&stem).unwrap();
			prop_assert!(once.ends_with('-'));
			prop_assert_eq!(validate_key_prefix(&once).unwrap(), once.clone());
		}
	}
}
