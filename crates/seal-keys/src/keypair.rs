// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use chrono::{DateTime, Utc};
use rsa::pkcs8::DecodePublicKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_cert::der::pem::LineEnding;
use x509_cert::der::{Encode, EncodePem};
use x509_cert::Certificate;

use crate::error::{KeyError, KeyResult};

/// A named, timestamped RSA key pair and its certificate chain.
///
/// The leaf certificate (first in the chain) is the one published to
/// clients for sealing.
#[derive(Clone)]
pub struct KeyPair {
	name: String,
	created_at: DateTime<Utc>,
	private_key: RsaPrivateKey,
	certificates: Vec<Certificate>,
	blacklisted: bool,
}

impl KeyPair {
	pub fn new(
		name: impl Into<String>,
		created_at: DateTime<Utc>,
		private_key: RsaPrivateKey,
		certificates: Vec<Certificate>,
	) -> KeyResult<Self> {
		let name = name.into();
		if certificates.is_empty() {
			return Err(KeyError::MalformedRecord {
				name,
				message: "certificate chain is empty".to_string(),
			});
		}
		Ok(Self {
			name,
			created_at,
			private_key,
			certificates,
			blacklisted: false,
		})
	}

	pub(crate) fn with_blacklisted(mut self, blacklisted: bool) -> Self {
		self.blacklisted = blacklisted;
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn created_at(&self) -> DateTime<Utc> {
		self.created_at
	}

	pub fn private_key(&self) -> &RsaPrivateKey {
		&self.private_key
	}

	pub fn public_key(&self) -> RsaPublicKey {
		self.private_key.to_public_key()
	}

	/// Leaf certificate.
	pub fn certificate(&self) -> &Certificate {
		&self.certificates[0]
	}

	pub fn certificates(&self) -> &[Certificate] {
		&self.certificates
	}

	/// Public key as published in the leaf certificate.
	pub fn certificate_public_key(&self) -> KeyResult<RsaPublicKey> {
		let spki = self
			.certificate()
			.tbs_certificate
			.subject_public_key_info
			.to_der()
			.map_err(|e| self.malformed(format!("encode subject public key: {e}")))?;
		RsaPublicKey::from_public_key_der(&spki)
			.map_err(|e| self.malformed(format!("decode subject public key: {e}")))
	}

	/// Concatenated PEM encoding of the certificate chain.
	pub fn certificate_pem(&self) -> KeyResult<String> {
		let mut out = String::new();
		for cert in &self.certificates {
			let pem = cert
				.to_pem(LineEnding::LF)
				.map_err(|e| self.malformed(format!("encode certificate: {e}")))?;
			out.push_str(&pem);
		}
		Ok(out)
	}

	/// Whether the key was loaded despite carrying the compromise marker.
	pub fn is_blacklisted(&self) -> bool {
		self.blacklisted
	}

	fn malformed(&self, message: String) -> KeyError {
		KeyError::MalformedRecord {
			name: self.name.clone(),
			message,
		}
	}
}

impl fmt::Debug for KeyPair {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("KeyPair")
			.field("name", &self.name)
			.field("created_at", &self.created_at)
			.field("private_key", &"[REDACTED]")
			.field("certificates", &self.certificates.len())
			.field("blacklisted", &self.blacklisted)
			.finish()
	}
}
