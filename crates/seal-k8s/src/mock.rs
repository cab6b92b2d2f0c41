// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-memory Secret client for tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

use crate::client::SecretsClient;
use crate::error::K8sError;

/// Recorded call to the mock Secret client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockCall {
	Get { namespace: String, name: String },
	List { namespace: String, selector: String },
	Create { namespace: String, name: String },
	Update { namespace: String, name: String },
	Delete { namespace: String, name: String },
}

#[derive(Default)]
struct MockState {
	secrets: BTreeMap<(String, String), Secret>,
	sequence: u64,
	create_error: Option<String>,
	update_error: Option<String>,
	get_error: Option<String>,
	list_error: Option<String>,
	delete_error: Option<String>,
}

/// Mock Secret client backed by a map.
///
/// Clones share state. Created objects receive a uid, a resource version and
/// a strictly increasing creation timestamp; `generateName` is expanded with a
/// counter suffix.
#[derive(Clone)]
pub struct MockSecretsClient {
	state: Arc<Mutex<MockState>>,
	/// Track calls for verification.
	pub calls: Arc<Mutex<Vec<MockCall>>>,
	epoch: DateTime<Utc>,
}

impl Default for MockSecretsClient {
	fn default() -> Self {
		Self::new()
	}
}

impl MockSecretsClient {
	pub fn new() -> Self {
		Self {
			state: Arc::new(Mutex::new(MockState::default())),
			calls: Arc::new(Mutex::new(Vec::new())),
			epoch: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
		}
	}

	/// Seed a Secret directly, bypassing call recording.
	pub fn insert(&self, namespace: &str, mut secret: Secret) {
		let mut state = self.state.lock().unwrap();
		secret.metadata.namespace = Some(namespace.to_string());
		let name = secret.metadata.name.clone().unwrap_or_default();
		state.secrets.insert((namespace.to_string(), name), secret);
	}

	/// Current stored copy of a Secret.
	pub fn stored(&self, namespace: &str, name: &str) -> Option<Secret> {
		let state = self.state.lock().unwrap();
		state
			.secrets
			.get(&(namespace.to_string(), name.to_string()))
			.cloned()
	}

	/// Number of stored Secrets.
	pub fn len(&self) -> usize {
		self.state.lock().unwrap().secrets.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn calls(&self) -> Vec<MockCall> {
		self.calls.lock().unwrap().clone()
	}

	pub fn clear_calls(&self) {
		self.calls.lock().unwrap().clear();
	}

	pub fn set_create_error(&self, message: Option<&str>) {
		self.state.lock().unwrap().create_error = message.map(str::to_string);
	}

	pub fn set_update_error(&self, message: Option<&str>) {
		self.state.lock().unwrap().update_error = message.map(str::to_string);
	}

	pub fn set_get_error(&self, message: Option<&str>) {
		self.state.lock().unwrap().get_error = message.map(str::to_string);
	}

	pub fn set_list_error(&self, message: Option<&str>) {
		self.state.lock().unwrap().list_error = message.map(str::to_string);
	}

	pub fn set_delete_error(&self, message: Option<&str>) {
		self.state.lock().unwrap().delete_error = message.map(str::to_string);
	}

	fn record(&self, call: MockCall) {
		self.calls.lock().unwrap().push(call);
	}
}

fn injected(message: &Option<String>) -> Result<(), K8sError> {
	match message {
		Some(message) => Err(K8sError::ApiError {
			message: message.clone(),
		}),
		None => Ok(()),
	}
}

fn matches_selector(secret: &Secret, selector: &str) -> bool {
	let labels = secret.metadata.labels.clone().unwrap_or_default();
	selector
		.split(',')
		.map(str::trim)
		.filter(|term| !term.is_empty())
		.all(|term| match term.split_once('=') {
			Some((key, value)) => labels.get(key.trim()).map(String::as_str) == Some(value.trim()),
			None => labels.contains_key(term),
		})
}

#[async_trait]
impl SecretsClient for MockSecretsClient {
	async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, K8sError> {
		self.record(MockCall::Get {
			namespace: namespace.to_string(),
			name: name.to_string(),
		});
		let state = self.state.lock().unwrap();
		injected(&state.get_error)?;
		state
			.secrets
			.get(&(namespace.to_string(), name.to_string()))
			.cloned()
			.ok_or_else(|| K8sError::SecretNotFound {
				namespace: namespace.to_string(),
				name: name.to_string(),
			})
	}

	async fn list_secrets(
		&self,
		namespace: &str,
		label_selector: &str,
	) -> Result<Vec<Secret>, K8sError> {
		self.record(MockCall::List {
			namespace: namespace.to_string(),
			selector: label_selector.to_string(),
		});
		let state = self.state.lock().unwrap();
		injected(&state.list_error)?;
		Ok(state
			.secrets
			.iter()
			.filter(|((ns, _), secret)| ns == namespace && matches_selector(secret, label_selector))
			.map(|(_, secret)| secret.clone())
			.collect())
	}

	async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, K8sError> {
		let mut state = self.state.lock().unwrap();
		state.sequence += 1;
		let sequence = state.sequence;

		let name = match (&secret.metadata.name, &secret.metadata.generate_name) {
			(Some(name), _) => name.clone(),
			(None, Some(prefix)) => format!("{prefix}{sequence:05}"),
			(None, None) => {
				return Err(K8sError::InvalidObject {
					message: "secret has neither name nor generateName".into(),
				})
			}
		};

		drop(state);
		self.record(MockCall::Create {
			namespace: namespace.to_string(),
			name: name.clone(),
		});
		let mut state = self.state.lock().unwrap();
		injected(&state.create_error)?;

		let key = (namespace.to_string(), name.clone());
		if state.secrets.contains_key(&key) {
			return Err(K8sError::AlreadyExists {
				namespace: namespace.to_string(),
				name,
			});
		}

		let mut created = secret.clone();
		created.metadata.name = Some(name);
		created.metadata.namespace = Some(namespace.to_string());
		created.metadata.uid = Some(format!("uid-{sequence}"));
		created.metadata.resource_version = Some(sequence.to_string());
		created.metadata.creation_timestamp =
			Some(Time(self.epoch + Duration::seconds(sequence as i64)));
		state.secrets.insert(key, created.clone());
		Ok(created)
	}

	async fn update_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, K8sError> {
		let name = secret
			.metadata
			.name
			.clone()
			.ok_or_else(|| K8sError::InvalidObject {
				message: "secret has no metadata.name".into(),
			})?;
		self.record(MockCall::Update {
			namespace: namespace.to_string(),
			name: name.clone(),
		});

		let mut state = self.state.lock().unwrap();
		injected(&state.update_error)?;
		state.sequence += 1;
		let sequence = state.sequence;

		let key = (namespace.to_string(), name.clone());
		if !state.secrets.contains_key(&key) {
			return Err(K8sError::SecretNotFound {
				namespace: namespace.to_string(),
				name,
			});
		}

		let mut updated = secret.clone();
		updated.metadata.resource_version = Some(sequence.to_string());
		state.secrets.insert(key, updated.clone());
		Ok(updated)
	}

	async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), K8sError> {
		self.record(MockCall::Delete {
			namespace: namespace.to_string(),
			name: name.to_string(),
		});
		let mut state = self.state.lock().unwrap();
		injected(&state.delete_error)?;
		state
			.secrets
			.remove(&(namespace.to_string(), name.to_string()))
			.map(|_| ())
			.ok_or_else(|| K8sError::SecretNotFound {
				namespace: namespace.to_string(),
				name: name.to_string(),
			})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

	fn secret(name: Option<&str>, generate_name: Option<&str>) -> Secret {
		Secret {
			metadata: ObjectMeta {
				name: name.map(str::to_string),
				generate_name: generate_name.map(str::to_string),
				..Default::default()
			},
			..Default::default()
		}
	}

	#[tokio::test]
	async fn generate_name_assigns_unique_names() {
		let mock = MockSecretsClient::new();
		let a = mock
			.create_secret("ns", &secret(None, Some("key-")))
			.await
			.unwrap();
		let b = mock
			.create_secret("ns", &secret(None, Some("key-")))
			.await
			.unwrap();

		let a_name = a.metadata.name.unwrap();
		let b_name = b.metadata.name.unwrap();
		assert!(a_name.starts_with("key-"));
		assert_ne!(a_name, b_name);
		assert!(a.metadata.creation_timestamp.unwrap().0 < b.metadata.creation_timestamp.unwrap().0);
	}

	#[tokio::test]
	async fn create_conflict_reports_already_exists() {
		let mock = MockSecretsClient::new();
		mock.create_secret("ns", &secret(Some("foo"), None))
			.await
			.unwrap();
		let err = mock
			.create_secret("ns", &secret(Some("foo"), None))
			.await
			.unwrap_err();
		assert!(err.is_already_exists());
	}

	#[tokio::test]
	async fn delete_missing_reports_not_found() {
		let mock = MockSecretsClient::new();
		let err = mock.delete_secret("ns", "missing").await.unwrap_err();
		assert!(err.is_not_found());
		assert_eq!(
			mock.calls(),
			vec![MockCall::Delete {
				namespace: "ns".to_string(),
				name: "missing".to_string()
			}]
		);
	}

	#[tokio::test]
	async fn list_filters_by_label_selector() {
		let mock = MockSecretsClient::new();
		let mut labelled = secret(Some("a"), None);
		labelled.metadata.labels = Some(BTreeMap::from([(
			"seal.dev/sealed-secrets-key".to_string(),
			"active".to_string(),
		)]));
		mock.insert("ns", labelled);
		mock.insert("ns", secret(Some("b"), None));
		mock.insert("other", secret(Some("c"), None));

		let listed = mock
			.list_secrets("ns", "seal.dev/sealed-secrets-key=active")
			.await
			.unwrap();
		assert_eq!(listed.len(), 1);
		assert_eq!(listed[0].metadata.name.as_deref(), Some("a"));
	}

	#[tokio::test]
	async fn injected_errors_surface_as_api_errors() {
		let mock = MockSecretsClient::new();
		mock.set_create_error(Some("etcd unavailable"));
		let err = mock
			.create_secret("ns", &secret(Some("foo"), None))
			.await
			.unwrap_err();
		assert!(matches!(err, K8sError::ApiError { .. }));
		assert!(mock.is_empty());
	}

	#[tokio::test]
	async fn injected_errors_leave_state_untouched_until_cleared() {
		let mock = MockSecretsClient::new();
		mock.create_secret("ns", &secret(Some("foo"), None)).await.unwrap();

		mock.set_get_error(Some("timeout"));
		mock.set_list_error(Some("forbidden"));
		mock.set_update_error(Some("conflict"));
		mock.set_delete_error(Some("etcd unavailable"));

		let err = mock.get_secret("ns", "foo").await.unwrap_err();
		assert!(matches!(err, K8sError::ApiError { ref message } if message == "timeout"));
		let err = mock.list_secrets("ns", "").await.unwrap_err();
		assert!(matches!(err, K8sError::ApiError { ref message } if message == "forbidden"));

		let mut changed = mock.stored("ns", "foo").unwrap();
		changed.string_data = Some([("k".to_string(), "v".to_string())].into());
		let err = mock.update_secret("ns", &changed).await.unwrap_err();
		assert!(matches!(err, K8sError::ApiError { ref message } if message == "conflict"));
		assert!(mock.stored("ns", "foo").unwrap().string_data.is_none());

		let err = mock.delete_secret("ns", "foo").await.unwrap_err();
		assert!(matches!(err, K8sError::ApiError { ref message } if message == "etcd unavailable"));
		assert!(mock.stored("ns", "foo").is_some());

		mock.set_get_error(None);
		mock.set_list_error(None);
		mock.set_update_error(None);
		mock.set_delete_error(None);
		assert!(mock.get_secret("ns", "foo").await.is_ok());
		assert_eq!(mock.list_secrets("ns", "").await.unwrap().len(), 1);
		mock.update_secret("ns", &changed).await.unwrap();
		mock.delete_secret("ns", "foo").await.unwrap();
		assert!(mock.is_empty());
	}
}
