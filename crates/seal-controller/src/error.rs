// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use seal_crypto::CryptoError;
use seal_k8s::K8sError;
use seal_keys::KeyError;
use thiserror::Error;

use crate::reconciler::ObjectKey;

/// Errors from opening, resealing or decoding sealed payloads.
#[derive(Debug, Error)]
pub enum UnsealError {
	#[error("no key could decrypt {key}")]
	DecryptExhausted { key: String },

	#[error("unexpected resource type: {kind}")]
	UnexpectedResourceKind { kind: String },

	#[error("failed to decode resource: {0}")]
	Decode(#[from] serde_json::Error),

	#[error("invalid field {field}: {message}")]
	InvalidField { field: String, message: String },

	#[error("invalid object: {0}")]
	InvalidObject(String),

	#[error(transparent)]
	Crypto(#[from] CryptoError),

	#[error(transparent)]
	Keys(#[from] KeyError),
}

impl UnsealError {
	/// Whether the error depends on the key that was tried.
	pub fn is_key_mismatch(&self) -> bool {
		matches!(self, UnsealError::Crypto(_))
	}
}

/// Errors from a single reconcile attempt.
#[derive(Debug, Error)]
pub enum ReconcileError {
	#[error(transparent)]
	Unseal(#[from] UnsealError),

	#[error(transparent)]
	Store(#[from] K8sError),

	#[error("failed to update existing secret {key}: {source}")]
	UpdateExisting {
		key: ObjectKey,
		#[source]
		source: K8sError,
	},
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
