// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decoding of opaque resource payloads.

use k8s_openapi::api::core::v1::Secret;
use kube::core::TypeMeta;
use kube::Resource;

use crate::crd::SealedSecret;
use crate::error::UnsealError;

/// A decoded payload of one of the kinds this controller understands.
#[derive(Debug, Clone)]
pub enum KnownResource {
	SealedSecret(Box<SealedSecret>),
	Secret(Box<Secret>),
}

impl KnownResource {
	pub fn kind(&self) -> &'static str {
		match self {
			KnownResource::SealedSecret(_) => "SealedSecret",
			KnownResource::Secret(_) => "Secret",
		}
	}

	/// The SealedSecret, or [`UnsealError::UnexpectedResourceKind`] for anything else.
	pub fn into_sealed_secret(self) -> Result<SealedSecret, UnsealError> {
		match self {
			KnownResource::SealedSecret(ss) => Ok(*ss),
			other => Err(UnsealError::UnexpectedResourceKind {
				kind: other.kind().to_string(),
			}),
		}
	}
}

/// Decode a JSON payload by its `apiVersion` and `kind`.
pub fn classify(bytes: &[u8]) -> Result<KnownResource, UnsealError> {
	let meta: TypeMeta = serde_json::from_slice(bytes)?;

	if meta.api_version == SealedSecret::api_version(&()) && meta.kind == SealedSecret::kind(&()) {
		return Ok(KnownResource::SealedSecret(Box::new(serde_json::from_slice(bytes)?)));
	}
	if meta.api_version == Secret::api_version(&()) && meta.kind == Secret::kind(&()) {
		return Ok(KnownResource::Secret(Box::new(serde_json::from_slice(bytes)?)));
	}

	Err(UnsealError::UnexpectedResourceKind {
		kind: format!("{}/{}", meta.api_version, meta.kind),
	})
}
