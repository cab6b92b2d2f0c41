// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persisted layout of a key pair.
//!
//! Each key pair is stored as a `kubernetes.io/tls` Secret whose name is
//! generated from the configured prefix. `tls.key` holds the PKCS#1 PEM
//! private key and `tls.crt` the PEM certificate chain, leaf first.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use x509_cert::Certificate;

use crate::error::{KeyError, KeyResult};
use crate::keypair::KeyPair;
use crate::{COMPROMISED_ANNOTATION, KEY_LABEL, KEY_LABEL_ACTIVE};

pub const SECRET_TYPE_TLS: &str = "kubernetes.io/tls";
pub const TLS_KEY: &str = "tls.key";
pub const TLS_CERT: &str = "tls.crt";

/// Label selector matching every persisted key pair.
pub fn key_selector() -> String {
	format!("{KEY_LABEL}={KEY_LABEL_ACTIVE}")
}

/// Build the Secret that persists `pair`. The name is left to the API server
/// via `generateName`.
pub fn key_record(namespace: &str, prefix: &str, pair: &KeyPair) -> KeyResult<Secret> {
	let key_pem = pair
		.private_key()
		.to_pkcs1_pem(LineEnding::LF)
		.map_err(|e| KeyError::MalformedRecord {
			name: pair.name().to_string(),
			message: format!("encode private key: {e}"),
		})?;
	let cert_pem = pair.certificate_pem()?;

	let mut data = BTreeMap::new();
	data.insert(TLS_KEY.to_string(), ByteString(key_pem.as_bytes().to_vec()));
	data.insert(TLS_CERT.to_string(), ByteString(cert_pem.into_bytes()));

	Ok(Secret {
		metadata: ObjectMeta {
			generate_name: Some(prefix.to_string()),
			namespace: Some(namespace.to_string()),
			labels: Some(BTreeMap::from([(
				KEY_LABEL.to_string(),
				KEY_LABEL_ACTIVE.to_string(),
			)])),
			..Default::default()
		},
		type_: Some(SECRET_TYPE_TLS.to_string()),
		data: Some(data),
		..Default::default()
	})
}

/// Whether the record carries the compromise annotation.
pub fn is_compromised(secret: &Secret) -> bool {
	secret
		.metadata
		.annotations
		.as_ref()
		.is_some_and(|a| a.contains_key(COMPROMISED_ANNOTATION))
}

fn field<'a>(secret: &'a Secret, name: &str, key: &str) -> KeyResult<&'a [u8]> {
	secret
		.data
		.as_ref()
		.and_then(|d| d.get(key))
		.map(|b| b.0.as_slice())
		.ok_or_else(|| KeyError::MalformedRecord {
			name: name.to_string(),
			message: format!("missing {key}"),
		})
}

fn parse_private_key(name: &str, pem: &[u8]) -> KeyResult<RsaPrivateKey> {
	let pem = std::str::from_utf8(pem).map_err(|e| KeyError::MalformedRecord {
		name: name.to_string(),
		message: format!("{TLS_KEY} is not utf-8: {e}"),
	})?;
	RsaPrivateKey::from_pkcs1_pem(pem)
		.or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
		.map_err(|e| KeyError::MalformedRecord {
			name: name.to_string(),
			message: format!("parse private key: {e}"),
		})
}

/// Decode a stored record into a [`KeyPair`], compromised or not.
///
/// Creation time comes from the stored object's creation timestamp; a record
/// without one sorts as the oldest possible key.
pub fn decode_key_record(secret: &Secret) -> KeyResult<KeyPair> {
	let name = secret.metadata.name.clone().unwrap_or_default();

	let private_key = parse_private_key(&name, field(secret, &name, TLS_KEY)?)?;
	let certificates = Certificate::load_pem_chain(field(secret, &name, TLS_CERT)?).map_err(|e| {
		KeyError::MalformedRecord {
			name: name.clone(),
			message: format!("parse certificate chain: {e}"),
		}
	})?;

	let created_at = secret
		.metadata
		.creation_timestamp
		.as_ref()
		.map(|t| t.0)
		.unwrap_or(DateTime::<Utc>::MIN_UTC);

	Ok(KeyPair::new(name, created_at, private_key, certificates)?
		.with_blacklisted(is_compromised(secret)))
}

/// Decode a stored record, refusing compromised ones.
pub fn read_key_record(secret: &Secret) -> KeyResult<KeyPair> {
	if is_compromised(secret) {
		return Err(KeyError::Blacklisted {
			name: secret.metadata.name.clone().unwrap_or_default(),
		});
	}
	decode_key_record(secret)
}
