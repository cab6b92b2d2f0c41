// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;

use crate::error::K8sError;

/// Trait for K8s Secret operations.
///
/// This abstraction allows for easy mocking in tests while providing
/// a clean interface for the operations needed by the key registry
/// (persisting and discovering key pairs) and the reconciler
/// (materializing decrypted Secrets).
#[async_trait]
pub trait SecretsClient: Send + Sync {
	/// Get a Secret by name.
	///
	/// Returns [`K8sError::SecretNotFound`] when the Secret does not exist.
	async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, K8sError>;

	/// List Secrets in a namespace matching the given label selector.
	async fn list_secrets(
		&self,
		namespace: &str,
		label_selector: &str,
	) -> Result<Vec<Secret>, K8sError>;

	/// Create a Secret. `metadata.generateName` is honoured when `metadata.name`
	/// is unset; the returned object carries the server-assigned name.
	///
	/// Returns [`K8sError::AlreadyExists`] on a name conflict.
	async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, K8sError>;

	/// Replace an existing Secret.
	async fn update_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, K8sError>;

	/// Delete a Secret by name.
	///
	/// Returns [`K8sError::SecretNotFound`] when the Secret does not exist.
	async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), K8sError>;
}
