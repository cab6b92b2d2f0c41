// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Brings each Secret in line with its SealedSecret.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::ResourceExt;
use seal_k8s::SecretsClient;
use seal_keys::KeyRegistry;
use tracing::{debug, info, instrument};

use crate::crd::SealedSecret;
use crate::error::{ReconcileError, ReconcileResult};
use crate::unseal;

/// Namespaced name identifying one SealedSecret and its Secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
	pub namespace: String,
	pub name: String,
}

impl ObjectKey {
	pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			namespace: namespace.into(),
			name: name.into(),
		}
	}

	pub fn from_resource(ss: &SealedSecret) -> Self {
		Self::new(ss.namespace().unwrap_or_default(), ss.name_any())
	}

	/// Split a `namespace/name` key.
	pub fn parse(key: &str) -> Option<Self> {
		let (namespace, name) = key.split_once('/')?;
		if namespace.is_empty() || name.is_empty() || name.contains('/') {
			return None;
		}
		Some(Self::new(namespace, name))
	}
}

impl fmt::Display for ObjectKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.namespace, self.name)
	}
}

/// Read access to the locally cached SealedSecrets.
pub trait SealedSecretLister: Send + Sync {
	fn get(&self, key: &ObjectKey) -> Option<Arc<SealedSecret>>;
}

impl SealedSecretLister for Store<SealedSecret> {
	fn get(&self, key: &ObjectKey) -> Option<Arc<SealedSecret>> {
		Store::get(self, &ObjectRef::new(&key.name).within(&key.namespace))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
	Created,
	Updated,
	Unchanged,
	Deleted,
	AlreadyAbsent,
}

#[async_trait]
pub trait Reconcile: Send + Sync {
	async fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<ReconcileOutcome>;
}

pub struct Reconciler {
	lister: Arc<dyn SealedSecretLister>,
	secrets: Arc<dyn SecretsClient>,
	registry: Arc<KeyRegistry>,
}

impl Reconciler {
	pub fn new(
		lister: Arc<dyn SealedSecretLister>,
		secrets: Arc<dyn SecretsClient>,
		registry: Arc<KeyRegistry>,
	) -> Self {
		Self {
			lister,
			secrets,
			registry,
		}
	}

	async fn remove(&self, key: &ObjectKey) -> ReconcileResult<ReconcileOutcome> {
		match self.secrets.delete_secret(&key.namespace, &key.name).await {
			Ok(()) => {
				info!(key = %key, "deleted secret of removed sealed secret");
				Ok(ReconcileOutcome::Deleted)
			}
			Err(e) if e.is_not_found() => {
				debug!(key = %key, "secret already absent");
				Ok(ReconcileOutcome::AlreadyAbsent)
			}
			Err(e) => Err(ReconcileError::Store(e)),
		}
	}

	async fn update_existing(
		&self,
		key: &ObjectKey,
		desired: Secret,
	) -> ReconcileResult<ReconcileOutcome> {
		let existing = self
			.secrets
			.get_secret(&key.namespace, &key.name)
			.await
			.map_err(|source| ReconcileError::UpdateExisting {
				key: key.clone(),
				source,
			})?;

		let mut updated = existing.clone();
		updated.data = desired.data;
		if let Some(incoming) = desired.metadata.owner_references.filter(|o| !o.is_empty()) {
			let owners = updated.metadata.owner_references.get_or_insert_with(Vec::new);
			merge_owner_references(owners, &incoming);
		}

		if updated == existing {
			debug!(key = %key, "secret up to date");
			return Ok(ReconcileOutcome::Unchanged);
		}

		self.secrets
			.update_secret(&key.namespace, &updated)
			.await
			.map_err(|source| ReconcileError::UpdateExisting {
				key: key.clone(),
				source,
			})?;
		info!(key = %key, "updated secret");
		Ok(ReconcileOutcome::Updated)
	}
}

#[async_trait]
impl Reconcile for Reconciler {
	#[instrument(skip(self), fields(key = %key))]
	async fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<ReconcileOutcome> {
		let Some(sealed) = self.lister.get(key) else {
			return self.remove(key).await;
		};

		let secret = unseal::decrypt(&sealed, &self.registry).await?;

		match self.secrets.create_secret(&key.namespace, &secret).await {
			Ok(_) => {
				info!(key = %key, "created secret");
				Ok(ReconcileOutcome::Created)
			}
			Err(e) if e.is_already_exists() => self.update_existing(key, secret).await,
			Err(e) => Err(ReconcileError::Store(e)),
		}
	}
}

/// Add each incoming owner whose uid is not already present.
pub fn merge_owner_references(existing: &mut Vec<OwnerReference>, incoming: &[OwnerReference]) {
	for owner in incoming {
		if !existing.iter().any(|o| o.uid == owner.uid) {
			existing.push(owner.clone());
		}
	}
}
