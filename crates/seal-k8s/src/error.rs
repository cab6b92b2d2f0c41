// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Result type alias for K8s operations.
pub type K8sResult<T> = Result<T, K8sError>;

/// Errors that can occur during K8s operations.
#[derive(Error, Debug)]
pub enum K8sError {
	#[error("K8s API error: {message}")]
	ApiError { message: String },

	#[error("Secret not found: {namespace}/{name}")]
	SecretNotFound { namespace: String, name: String },

	#[error("Secret already exists: {namespace}/{name}")]
	AlreadyExists { namespace: String, name: String },

	#[error("Invalid object: {message}")]
	InvalidObject { message: String },
}

impl K8sError {
	/// Whether the API reported that the object does not exist.
	pub fn is_not_found(&self) -> bool {
		matches!(self, K8sError::SecretNotFound { .. })
	}

	/// Whether the API rejected a create because the object already exists.
	pub fn is_already_exists(&self) -> bool {
		matches!(self, K8sError::AlreadyExists { .. })
	}
}

impl From<kube::Error> for K8sError {
	fn from(err: kube::Error) -> Self {
		K8sError::ApiError {
			message: err.to_string(),
		}
	}
}
