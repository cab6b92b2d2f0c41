// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! RSA key generation and self-signed certificates.

use std::str::FromStr;
use std::time::{Duration, SystemTime};

use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1v15::SigningKey;
use rsa::RsaPrivateKey;
use sha2::Sha256;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::{Time, Validity};
use x509_cert::Certificate;

use crate::error::{KeyError, KeyResult};

/// Smallest modulus accepted for generated keys.
pub const MIN_KEY_SIZE: usize = 1024;

/// Size in bytes of the random certificate serial number (128-bit space).
pub const SERIAL_NUMBER_SIZE: usize = 16;

/// Generate a new RSA private key. CPU-bound for large sizes; call from a
/// blocking context.
pub fn generate_private_key(bits: usize) -> KeyResult<RsaPrivateKey> {
	if bits < MIN_KEY_SIZE {
		return Err(KeyError::Generation(format!(
			"key size {bits} is below the minimum of {MIN_KEY_SIZE} bits"
		)));
	}
	RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| KeyError::Generation(e.to_string()))
}

/// Random positive serial number drawn from a 128-bit space.
pub fn random_serial_number() -> KeyResult<SerialNumber> {
	let mut bytes = [0u8; SERIAL_NUMBER_SIZE];
	OsRng.fill_bytes(&mut bytes);
	SerialNumber::new(&bytes).map_err(|e| KeyError::Generation(format!("serial number: {e}")))
}

fn subject_name(common_name: &str) -> KeyResult<Name> {
	if common_name.is_empty() {
		return Ok(Name::default());
	}
	Name::from_str(&format!("CN={common_name}"))
		.map_err(|e| KeyError::Generation(format!("invalid common name {common_name:?}: {e}")))
}

/// Sign a self-issued CA certificate for `key`, valid for `[now, now + ttl]`.
pub fn sign_certificate(
	key: &RsaPrivateKey,
	common_name: &str,
	ttl: Duration,
	now: SystemTime,
) -> KeyResult<Certificate> {
	let not_after = now
		.checked_add(ttl)
		.ok_or_else(|| KeyError::Generation("certificate validity overflows".to_string()))?;
	let validity = Validity {
		not_before: Time::try_from(now)
			.map_err(|e| KeyError::Generation(format!("not before: {e}")))?,
		not_after: Time::try_from(not_after)
			.map_err(|e| KeyError::Generation(format!("not after: {e}")))?,
	};

	let signer = SigningKey::<Sha256>::new(key.clone());
	let spki = SubjectPublicKeyInfoOwned::from_key(key.to_public_key())
		.map_err(|e| KeyError::Generation(format!("subject public key: {e}")))?;

	let builder = CertificateBuilder::new(
		Profile::Root,
		random_serial_number()?,
		validity,
		subject_name(common_name)?,
		spki,
		&signer,
	)
	.map_err(|e| KeyError::Generation(format!("certificate builder: {e}")))?;

	builder
		.build::<rsa::pkcs1v15::Signature>()
		.map_err(|e| KeyError::Generation(format!("certificate signing: {e}")))
}

/// Generate a private key and its self-signed certificate.
pub fn generate_private_key_and_cert(
	bits: usize,
	common_name: &str,
	ttl: Duration,
) -> KeyResult<(RsaPrivateKey, Certificate)> {
	let key = generate_private_key(bits)?;
	let cert = sign_certificate(&key, common_name, ttl, SystemTime::now())?;
	Ok((key, cert))
}
