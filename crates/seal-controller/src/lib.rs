// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sealed secrets controller.
//!
//! This crate provides:
//! - The `SealedSecret` custom resource and the seal/unseal protocol over it
//! - A deduplicating, rate-limited work queue and the worker loop that drains it
//! - The reconciler that turns SealedSecrets into Secrets
//! - The watch-driven event source, periodic key rotation and the HTTP surface

pub mod api;
pub mod controller;
pub mod crd;
pub mod error;
pub mod informer;
pub mod queue;
pub mod reconciler;
pub mod resource;
pub mod rotation;
pub mod unseal;

pub use api::{router, AppState};
pub use controller::{Controller, ErrorHandler, DEFAULT_MAX_RETRIES};
pub use crd::{SealedSecret, SealedSecretSpec, SecretTemplate};
pub use error::{ReconcileError, ReconcileResult, UnsealError};
pub use informer::Informer;
pub use queue::WorkQueue;
pub use reconciler::{ObjectKey, Reconcile, ReconcileOutcome, Reconciler, SealedSecretLister};
pub use resource::{classify, KnownResource};
pub use rotation::{
	first_rotation_delay, init_key_rotation, rotation_delay, KeyRotationJob, KEY_ROTATION_JOB_ID,
};
pub use unseal::{decrypt, reseal, Unsealer};

use seal_config::{KeyBlacklistPolicy, KeysConfig};
use seal_keys::{BlacklistPolicy, KeySettings};

/// Key registry settings for keys stored in `namespace`.
pub fn key_settings(config: &KeysConfig, namespace: impl Into<String>) -> KeySettings {
	KeySettings {
		namespace: namespace.into(),
		prefix: config.prefix.clone(),
		key_size: config.size_bits,
		cert_ttl: config.ttl(),
		common_name: config.common_name.clone(),
		blacklist_policy: match config.blacklist_policy {
			KeyBlacklistPolicy::Exclude => BlacklistPolicy::Exclude,
			KeyBlacklistPolicy::DecryptOnly => BlacklistPolicy::DecryptOnly,
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn key_settings_follow_config() {
		let config = KeysConfig {
			blacklist_policy: KeyBlacklistPolicy::DecryptOnly,
			common_name: "sealer".to_string(),
			..Default::default()
		};

		let settings = key_settings(&config, "kube-system");
		assert_eq!(settings.namespace, "kube-system");
		assert_eq!(settings.prefix, "sealed-secrets-key-");
		assert_eq!(settings.key_size, 4096);
		assert_eq!(settings.cert_ttl, config.ttl());
		assert_eq!(settings.common_name, "sealer");
		assert_eq!(settings.blacklist_policy, BlacklistPolicy::DecryptOnly);
	}
}
