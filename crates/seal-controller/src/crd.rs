// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The SealedSecret custom resource.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::{CustomResource, Resource, ResourceExt};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::error::UnsealError;

/// Encrypted counterpart of a Secret.
///
/// Each value in `encryptedData` is sealed individually under the label
/// `namespace/name`, so ciphertext cannot be moved to another Secret.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
	group = "seal.dev",
	version = "v1alpha1",
	kind = "SealedSecret",
	namespaced,
	schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct SealedSecretSpec {
	/// Base64 ciphertext per Secret data key.
	#[serde(default)]
	pub encrypted_data: BTreeMap<String, String>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub template: Option<SecretTemplate>,
}

/// Metadata applied to the Secret when it is first created.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretTemplate {
	#[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
	pub type_: Option<String>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub labels: Option<BTreeMap<String, String>>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub annotations: Option<BTreeMap<String, String>>,
}

/// Label binding ciphertext to a particular Secret.
pub fn seal_label(namespace: &str, name: &str) -> String {
	format!("{namespace}/{name}")
}

fn identity(meta: &ObjectMeta) -> Result<(&str, &str), UnsealError> {
	let name = meta
		.name
		.as_deref()
		.ok_or_else(|| UnsealError::InvalidObject("metadata.name is required".to_string()))?;
	let namespace = meta
		.namespace
		.as_deref()
		.ok_or_else(|| UnsealError::InvalidObject("metadata.namespace is required".to_string()))?;
	Ok((namespace, name))
}

impl SealedSecret {
	/// Seal every data entry of `secret` under `public_key`.
	///
	/// `stringData` entries are sealed too and take precedence over `data`
	/// entries with the same key.
	pub fn seal(public_key: &RsaPublicKey, secret: &Secret) -> Result<Self, UnsealError> {
		let (namespace, name) = identity(&secret.metadata)?;
		let label = seal_label(namespace, name);

		let mut plaintext: BTreeMap<String, Vec<u8>> = secret
			.data
			.iter()
			.flatten()
			.map(|(k, v)| (k.clone(), v.0.clone()))
			.collect();
		for (k, v) in secret.string_data.iter().flatten() {
			plaintext.insert(k.clone(), v.clone().into_bytes());
		}

		let mut encrypted_data = BTreeMap::new();
		for (key, value) in plaintext {
			let ciphertext = seal_crypto::seal(public_key, &value, &label)?;
			encrypted_data.insert(key, STANDARD.encode(ciphertext));
		}

		let template = SecretTemplate {
			type_: secret.type_.clone(),
			labels: secret.metadata.labels.clone(),
			annotations: secret.metadata.annotations.clone(),
		};

		let mut sealed = SealedSecret::new(
			name,
			SealedSecretSpec {
				encrypted_data,
				template: (template != SecretTemplate::default()).then_some(template),
			},
		);
		sealed.metadata.namespace = Some(namespace.to_string());
		Ok(sealed)
	}

	/// Open every field with `private_key` and build the Secret it describes.
	///
	/// The Secret is owned by this SealedSecret when it carries a uid.
	pub fn unseal(&self, private_key: &RsaPrivateKey) -> Result<Secret, UnsealError> {
		let (namespace, name) = identity(&self.metadata)?;
		let label = seal_label(namespace, name);

		let mut data = BTreeMap::new();
		for (key, value) in &self.spec.encrypted_data {
			let ciphertext = STANDARD.decode(value).map_err(|e| UnsealError::InvalidField {
				field: key.clone(),
				message: e.to_string(),
			})?;
			let plaintext = seal_crypto::unseal(private_key, &ciphertext, &label)?;
			data.insert(key.clone(), ByteString(plaintext.to_vec()));
		}

		let template = self.spec.template.clone().unwrap_or_default();
		Ok(Secret {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				namespace: Some(namespace.to_string()),
				labels: template.labels,
				annotations: template.annotations,
				owner_references: self.controller_owner_ref(&()).map(|r| vec![r]),
				..Default::default()
			},
			type_: template.type_,
			data: Some(data),
			..Default::default()
		})
	}

	/// `namespace/name` of this resource.
	pub fn key_string(&self) -> String {
		seal_label(&self.namespace().unwrap_or_default(), &self.name_any())
	}
}
