// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Envelope encryption for sealed secret values.
//!
//! A fresh AES-256-GCM session key encrypts the payload; the session key is
//! wrapped with RSA-OAEP (SHA-256) under the recipient's public key. The OAEP
//! label binds a ciphertext to the object it was sealed for.
//!
//! Wire layout: `u16 BE wrapped-key length || wrapped key || AES-GCM ciphertext`.

pub mod error;

use aes_gcm::{
	aead::{Aead, KeyInit},
	Aes256Gcm, Key, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

pub use error::{CryptoError, CryptoResult};

/// Size of the AES-256 session key in bytes.
pub const SESSION_KEY_SIZE: usize = 32;

/// Size of AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

const LENGTH_PREFIX_SIZE: usize = 2;

/// Generate a random session key.
pub fn generate_session_key() -> Zeroizing<[u8; SESSION_KEY_SIZE]> {
	let mut key = Zeroizing::new([0u8; SESSION_KEY_SIZE]);
	OsRng.fill_bytes(key.as_mut());
	key
}

/// Seal `plaintext` for the holder of the private half of `public_key`.
pub fn seal(public_key: &RsaPublicKey, plaintext: &[u8], label: &str) -> CryptoResult<Vec<u8>> {
	let session_key = generate_session_key();

	let wrapped = public_key
		.encrypt(&mut OsRng, Oaep::new_with_label::<Sha256, _>(label), session_key.as_slice())
		.map_err(|e| CryptoError::Encryption(format!("session key wrap failed: {e}")))?;
	let wrapped_len = u16::try_from(wrapped.len())
		.map_err(|_| CryptoError::Encryption("wrapped session key too large".to_string()))?;

	// The session key is single-use so a fixed nonce is safe.
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(session_key.as_slice()));
	let nonce = Nonce::from_slice(&[0u8; NONCE_SIZE]);
	let body = cipher
		.encrypt(nonce, plaintext)
		.map_err(|e| CryptoError::Encryption(format!("payload encryption failed: {e}")))?;

	let mut out = Vec::with_capacity(LENGTH_PREFIX_SIZE + wrapped.len() + body.len());
	out.extend_from_slice(&wrapped_len.to_be_bytes());
	out.extend_from_slice(&wrapped);
	out.extend_from_slice(&body);
	Ok(out)
}

/// Open a ciphertext produced by [`seal`] with the matching private key and label.
pub fn unseal(
	private_key: &RsaPrivateKey,
	ciphertext: &[u8],
	label: &str,
) -> CryptoResult<Zeroizing<Vec<u8>>> {
	if ciphertext.len() < LENGTH_PREFIX_SIZE {
		return Err(CryptoError::Truncated);
	}
	let wrapped_len = u16::from_be_bytes([ciphertext[0], ciphertext[1]]) as usize;
	let rest = &ciphertext[LENGTH_PREFIX_SIZE..];
	if rest.len() < wrapped_len {
		return Err(CryptoError::Truncated);
	}
	let (wrapped, body) = rest.split_at(wrapped_len);

	let session_key = Zeroizing::new(
		private_key
			.decrypt(Oaep::new_with_label::<Sha256, _>(label), wrapped)
			.map_err(|e| CryptoError::Decryption(format!("session key unwrap failed: {e}")))?,
	);
	if session_key.len() != SESSION_KEY_SIZE {
		return Err(CryptoError::InvalidKeySize {
			expected: SESSION_KEY_SIZE,
			actual: session_key.len(),
		});
	}

	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(session_key.as_slice()));
	let nonce = Nonce::from_slice(&[0u8; NONCE_SIZE]);
	let plaintext = cipher
		.decrypt(nonce, body)
		.map_err(|e| CryptoError::Decryption(format!("payload decryption failed: {e}")))?;

	Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::sync::OnceLock;

	fn test_key() -> &'static RsaPrivateKey {
		static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
		KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).unwrap())
	}

	fn other_key() -> &'static RsaPrivateKey {
		static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
		KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).unwrap())
	}

	#[test]
	fn session_keys_are_unique() {
		let a = generate_session_key();
		let b = generate_session_key();
		assert_ne!(a.as_slice(), b.as_slice());
	}

	#[test]
	fn seal_unseal_roundtrip() {
		let key = test_key();
		let sealed = seal(&key.to_public_key(), b"super secret value", "ns/name").unwrap();
		let opened = unseal(key, &sealed, "ns/name").unwrap();
		assert_eq!(opened.as_slice(), b"super secret value");
	}

	#[test]
	fn wrong_key_fails() {
		let sealed = seal(&test_key().to_public_key(), b"secret", "ns/name").unwrap();
		assert!(unseal(other_key(), &sealed, "ns/name").is_err());
	}

	#[test]
	fn wrong_label_fails() {
		let key = test_key();
		let sealed = seal(&key.to_public_key(), b"secret", "ns/name").unwrap();
		let err = unseal(key, &sealed, "ns/other").unwrap_err();
		assert!(matches!(err, CryptoError::Decryption(_)));
	}

	#[test]
	fn truncated_input_is_rejected() {
		let key = test_key();
		assert!(matches!(unseal(key, &[0x01], "l"), Err(CryptoError::Truncated)));
		assert!(matches!(
			unseal(key, &[0x00, 0x80, 0x01, 0x02], "l"),
			Err(CryptoError::Truncated)
		));
	}

	#[test]
	fn tampered_body_fails() {
		let key = test_key();
		let mut sealed = seal(&key.to_public_key(), b"secret", "ns/name").unwrap();
		let last = sealed.len() - 1;
		sealed[last] ^= 0xFF;
		assert!(unseal(key, &sealed, "ns/name").is_err());
	}

	proptest! {
		#![proptest_config(ProptestConfig::with_cases(16))]

		#[test]
		fn prop_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..4096)) {
			let key = test_key();
			let sealed = seal(&key.to_public_key(), &plaintext, "ns/name").unwrap();
			let opened = unseal(key, &sealed, "ns/name").unwrap();
			prop_assert_eq!(plaintext.as_slice(), opened.as_slice());
		}

		#[test]
		fn prop_sealing_is_randomized(plaintext in proptest::collection::vec(any::<u8>(), 1..256)) {
			let public = test_key().to_public_key();
			let a = seal(&public, &plaintext, "ns/name").unwrap();
			let b = seal(&public, &plaintext, "ns/name").unwrap();
			prop_assert_ne!(a, b);
		}
	}
}
