// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{
	api::{Api, DeleteParams, ListParams, PostParams},
	Client,
};
use tracing::{debug, instrument};

use crate::client::SecretsClient;
use crate::error::K8sError;

/// Production Secret client implementation using the kube crate.
#[derive(Clone)]
pub struct KubeSecretsClient {
	client: Client,
}

impl KubeSecretsClient {
	/// Create a new KubeSecretsClient that auto-discovers cluster configuration.
	///
	/// This will attempt to load config from:
	/// 1. In-cluster service account (when running in K8s)
	/// 2. KUBECONFIG environment variable
	/// 3. ~/.kube/config
	pub async fn new() -> Result<Self, K8sError> {
		let client = Client::try_default().await?;
		debug!("K8s client initialized");
		Ok(Self { client })
	}

	/// Wrap an already configured kube client.
	pub fn from_client(client: Client) -> Self {
		Self { client }
	}

	/// The underlying kube client, shared with the SealedSecret watcher.
	pub fn client(&self) -> Client {
		self.client.clone()
	}

	fn secrets(&self, namespace: &str) -> Api<Secret> {
		Api::namespaced(self.client.clone(), namespace)
	}
}

fn object_name(secret: &Secret) -> Result<&str, K8sError> {
	secret
		.metadata
		.name
		.as_deref()
		.ok_or_else(|| K8sError::InvalidObject {
			message: "secret has no metadata.name".into(),
		})
}

fn map_api_error(err: kube::Error, namespace: &str, name: &str) -> K8sError {
	match err {
		kube::Error::Api(ref resp) if resp.code == 404 => K8sError::SecretNotFound {
			namespace: namespace.into(),
			name: name.into(),
		},
		kube::Error::Api(ref resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
			K8sError::AlreadyExists {
				namespace: namespace.into(),
				name: name.into(),
			}
		}
		e => e.into(),
	}
}

#[async_trait]
impl SecretsClient for KubeSecretsClient {
	#[instrument(skip(self))]
	async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, K8sError> {
		self
			.secrets(namespace)
			.get(name)
			.await
			.map_err(|e| map_api_error(e, namespace, name))
	}

	#[instrument(skip(self))]
	async fn list_secrets(
		&self,
		namespace: &str,
		label_selector: &str,
	) -> Result<Vec<Secret>, K8sError> {
		let lp = ListParams::default().labels(label_selector);
		let list = self.secrets(namespace).list(&lp).await?;
		Ok(list.items)
	}

	#[instrument(skip(self, secret))]
	async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, K8sError> {
		let name = secret
			.metadata
			.name
			.clone()
			.or_else(|| secret.metadata.generate_name.clone())
			.unwrap_or_default();
		self
			.secrets(namespace)
			.create(&PostParams::default(), secret)
			.await
			.map_err(|e| map_api_error(e, namespace, &name))
	}

	#[instrument(skip(self, secret))]
	async fn update_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, K8sError> {
		let name = object_name(secret)?;
		self
			.secrets(namespace)
			.replace(name, &PostParams::default(), secret)
			.await
			.map_err(|e| map_api_error(e, namespace, name))
	}

	#[instrument(skip(self))]
	async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), K8sError> {
		match self
			.secrets(namespace)
			.delete(name, &DeleteParams::default())
			.await
		{
			Ok(_) => Ok(()),
			Err(e) => Err(map_api_error(e, namespace, name)),
		}
	}
}
