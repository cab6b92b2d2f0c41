// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key registry for the sealed secrets controller.
//!
//! This crate owns the RSA key pairs used to open sealed secrets:
//! - [`KeyPair`]: a named, timestamped private key plus its self-signed certificate
//! - [`cert`]: key generation and certificate signing
//! - [`record`]: the Secret layout key pairs are persisted as
//! - [`KeyRegistry`]: the ordered, append-only set of loaded keys

pub mod cert;
pub mod error;
pub mod keypair;
pub mod record;
pub mod registry;

pub use error::{KeyError, KeyResult};
pub use keypair::KeyPair;
pub use registry::{BlacklistPolicy, KeyRegistry, KeySettings};

/// Label selecting Secrets that hold controller key pairs.
pub const KEY_LABEL: &str = "seal.dev/sealed-secrets-key";

/// Value of [`KEY_LABEL`] on key pairs eligible for loading.
pub const KEY_LABEL_ACTIVE: &str = "active";

/// Annotation marking a key pair as compromised.
pub const COMPROMISED_ANNOTATION: &str = "seal.dev/compromised";
