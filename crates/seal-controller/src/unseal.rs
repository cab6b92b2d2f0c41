// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Multi-key decryption and resealing.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use seal_keys::KeyRegistry;
use tracing::{debug, instrument};

use crate::crd::SealedSecret;
use crate::error::UnsealError;
use crate::resource::classify;

/// Decrypt `sealed` with whichever registered key opens it.
///
/// Keys are tried newest first. Errors that do not depend on the key, such
/// as malformed fields, are returned without trying further keys.
#[instrument(skip_all, fields(key = %sealed.key_string()))]
pub async fn decrypt(sealed: &SealedSecret, registry: &KeyRegistry) -> Result<Secret, UnsealError> {
	let keys = registry.all().await;
	for pair in keys.iter().rev() {
		match sealed.unseal(pair.private_key()) {
			Ok(secret) => {
				debug!(key_pair = %pair.name(), "unsealed");
				return Ok(secret);
			}
			Err(e) if e.is_key_mismatch() => continue,
			Err(e) => return Err(e),
		}
	}
	Err(UnsealError::DecryptExhausted {
		key: sealed.key_string(),
	})
}

/// Decrypt `sealed` and seal the result again under the latest key.
///
/// The output always carries fresh ciphertext, even when the input was
/// already sealed under the latest key.
#[instrument(skip_all, fields(key = %sealed.key_string()))]
pub async fn reseal(sealed: &SealedSecret, registry: &KeyRegistry) -> Result<SealedSecret, UnsealError> {
	let secret = decrypt(sealed, registry).await?;
	let latest = registry.latest().await?;
	let public_key = latest.certificate_public_key()?;

	let mut resealed = SealedSecret::seal(&public_key, &secret)?;
	resealed.metadata = sealed.metadata.clone();
	resealed.spec.template = sealed.spec.template.clone();
	debug!(key_pair = %latest.name(), "resealed");
	Ok(resealed)
}

/// Byte-level entry points used by the HTTP surface.
pub struct Unsealer {
	registry: Arc<KeyRegistry>,
}

impl Unsealer {
	pub fn new(registry: Arc<KeyRegistry>) -> Self {
		Self { registry }
	}

	pub fn registry(&self) -> &Arc<KeyRegistry> {
		&self.registry
	}

	/// Whether any registered key can open the payload.
	///
	/// Only input that does not decode to a SealedSecret is an error; a
	/// SealedSecret that cannot be opened for any reason reports `false`.
	pub async fn attempt_unseal(&self, bytes: &[u8]) -> Result<bool, UnsealError> {
		let sealed = classify(bytes)?.into_sealed_secret()?;
		match decrypt(&sealed, &self.registry).await {
			Ok(_) => Ok(true),
			Err(e) => {
				debug!(key = %sealed.key_string(), error = %e, "sealed secret cannot be unsealed");
				Ok(false)
			}
		}
	}

	/// Reseal the payload under the latest key and return it as JSON.
	pub async fn rotate(&self, bytes: &[u8]) -> Result<Vec<u8>, UnsealError> {
		let sealed = classify(bytes)?.into_sealed_secret()?;
		let resealed = reseal(&sealed, &self.registry).await?;
		Ok(serde_json::to_vec(&resealed)?)
	}
}
