// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The ordered, append-only set of key pairs used for decryption.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use seal_k8s::SecretsClient;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::cert::generate_private_key_and_cert;
use crate::error::{KeyError, KeyResult};
use crate::keypair::KeyPair;
use crate::record::{decode_key_record, is_compromised, key_record, key_selector, read_key_record};
use crate::COMPROMISED_ANNOTATION;

/// How records carrying the compromise annotation are treated on load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlacklistPolicy {
	/// Compromised keys are not loaded at all.
	#[default]
	Exclude,
	/// Compromised keys are loaded for decryption only and never become latest.
	DecryptOnly,
}

/// Settings for key generation and persistence.
#[derive(Debug, Clone)]
pub struct KeySettings {
	pub namespace: String,
	pub prefix: String,
	pub key_size: usize,
	pub cert_ttl: Duration,
	pub common_name: String,
	pub blacklist_policy: BlacklistPolicy,
}

/// Ordered collection of key pairs, oldest first.
///
/// Reads take a snapshot under a read lock, so a concurrent [`generate`]
/// is observed either fully or not at all.
///
/// [`generate`]: KeyRegistry::generate
pub struct KeyRegistry {
	client: Arc<dyn SecretsClient>,
	settings: KeySettings,
	keys: RwLock<Vec<Arc<KeyPair>>>,
}

impl KeyRegistry {
	/// Empty registry; nothing is read from the store.
	pub fn new(client: Arc<dyn SecretsClient>, settings: KeySettings) -> Self {
		Self {
			client,
			settings,
			keys: RwLock::new(Vec::new()),
		}
	}

	/// Build a registry from every persisted key record in the namespace.
	///
	/// Records are sorted by creation time before registration. Malformed
	/// records are skipped with a warning; compromised ones follow the
	/// configured [`BlacklistPolicy`].
	#[instrument(skip(client, settings), fields(namespace = %settings.namespace))]
	pub async fn load(client: Arc<dyn SecretsClient>, settings: KeySettings) -> KeyResult<Self> {
		let mut records = client
			.list_secrets(&settings.namespace, &key_selector())
			.await?;
		records.sort_by_key(|s| s.metadata.creation_timestamp.as_ref().map(|t| t.0));

		let registry = Self::new(client, settings);
		for record in &records {
			let decoded = match registry.settings.blacklist_policy {
				BlacklistPolicy::Exclude => read_key_record(record),
				BlacklistPolicy::DecryptOnly => decode_key_record(record),
			};
			match decoded {
				Ok(pair) => {
					if pair.is_blacklisted() {
						warn!(key = %pair.name(), "loading compromised key for decryption only");
					}
					registry.register_existing(pair).await;
				}
				Err(KeyError::Blacklisted { name }) => {
					warn!(key = %name, "skipping compromised key");
				}
				Err(e) => {
					warn!(error = %e, "skipping unreadable key record");
				}
			}
		}

		info!(count = registry.len().await, "loaded keys");
		Ok(registry)
	}

	pub fn settings(&self) -> &KeySettings {
		&self.settings
	}

	/// Insert a previously persisted key pair, keeping creation order.
	pub async fn register_existing(&self, pair: KeyPair) {
		let mut keys = self.keys.write().await;
		let pos = keys.partition_point(|k| k.created_at() <= pair.created_at());
		keys.insert(pos, Arc::new(pair));
	}

	/// Generate, persist and register a new key pair.
	///
	/// The in-memory sequence is only extended once the store has accepted
	/// the record.
	#[instrument(skip(self), fields(namespace = %self.settings.namespace))]
	pub async fn generate(&self) -> KeyResult<Arc<KeyPair>> {
		let bits = self.settings.key_size;
		let common_name = self.settings.common_name.clone();
		let ttl = self.settings.cert_ttl;
		let (private_key, certificate) = tokio::task::spawn_blocking(move || {
			generate_private_key_and_cert(bits, &common_name, ttl)
		})
		.await
		.map_err(|e| KeyError::Generation(format!("key generation task failed: {e}")))??;

		let unsaved = KeyPair::new("", Utc::now(), private_key, vec![certificate])?;
		let record = key_record(&self.settings.namespace, &self.settings.prefix, &unsaved)?;
		let stored = self
			.client
			.create_secret(&self.settings.namespace, &record)
			.await?;

		let name = stored
			.metadata
			.name
			.clone()
			.filter(|n| !n.is_empty())
			.ok_or_else(|| KeyError::MalformedRecord {
				name: self.settings.prefix.clone(),
				message: "store returned the key record without a name".to_string(),
			})?;
		let created_at = stored
			.metadata
			.creation_timestamp
			.as_ref()
			.map(|t| t.0)
			.unwrap_or_else(|| unsaved.created_at());
		let pair = Arc::new(KeyPair::new(
			name,
			created_at,
			unsaved.private_key().clone(),
			unsaved.certificates().to_vec(),
		)?);

		self.keys.write().await.push(Arc::clone(&pair));
		info!(key = %pair.name(), "generated new key");
		Ok(pair)
	}

	/// Newest key eligible for sealing.
	pub async fn latest(&self) -> KeyResult<Arc<KeyPair>> {
		self.keys
			.read()
			.await
			.iter()
			.rev()
			.find(|k| !k.is_blacklisted())
			.cloned()
			.ok_or(KeyError::NoKeys)
	}

	/// Snapshot of every decryption candidate, oldest first.
	pub async fn all(&self) -> Vec<Arc<KeyPair>> {
		self.keys.read().await.clone()
	}

	pub async fn len(&self) -> usize {
		self.keys.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.keys.read().await.is_empty()
	}

	/// Mark a persisted key record as compromised.
	///
	/// Future loads honour the marker; keys already in this registry stay
	/// until [`evict`](Self::evict) is called.
	#[instrument(skip(self), fields(namespace = %self.settings.namespace))]
	pub async fn mark_blacklisted(&self, name: &str) -> KeyResult<()> {
		let mut secret = self
			.client
			.get_secret(&self.settings.namespace, name)
			.await?;
		if is_compromised(&secret) {
			info!(key = %name, "key already blacklisted");
			return Ok(());
		}
		secret
			.metadata
			.annotations
			.get_or_insert_with(BTreeMap::new)
			.insert(COMPROMISED_ANNOTATION.to_string(), "true".to_string());
		self.client
			.update_secret(&self.settings.namespace, &secret)
			.await?;
		warn!(key = %name, "key marked as compromised");
		Ok(())
	}

	/// Drop a loaded key from the live sequence. Returns whether it was present.
	pub async fn evict(&self, name: &str) -> bool {
		let mut keys = self.keys.write().await;
		let before = keys.len();
		keys.retain(|k| k.name() != name);
		let removed = keys.len() != before;
		if removed {
			warn!(key = %name, "evicted key from registry");
		}
		removed
	}
}
