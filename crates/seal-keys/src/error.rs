// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use seal_k8s::K8sError;
use thiserror::Error;

pub type KeyResult<T> = Result<T, KeyError>;

#[derive(Debug, Error)]
pub enum KeyError {
	#[error("key {name} is blacklisted")]
	Blacklisted { name: String },

	#[error("key generation failed: {0}")]
	Generation(String),

	#[error("key store error: {0}")]
	Store(#[from] K8sError),

	#[error("malformed key record {name}: {message}")]
	MalformedRecord { name: String, message: String },

	#[error("no usable key in registry")]
	NoKeys,
}
