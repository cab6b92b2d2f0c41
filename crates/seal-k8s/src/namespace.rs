// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Resolution of the namespace the controller runs in.

use std::path::Path;

/// Environment variable populated through the downward API.
pub const NAMESPACE_ENV: &str = "POD_NAMESPACE";

/// Namespace file mounted alongside the service account token.
pub const SERVICE_ACCOUNT_NAMESPACE_PATH: &str =
	"/var/run/secrets/kubernetes.io/serviceaccount/namespace";

pub const DEFAULT_NAMESPACE: &str = "default";

/// Resolve the controller namespace from `POD_NAMESPACE`, then the service
/// account namespace file, then `default`.
pub fn resolve_namespace() -> String {
	resolve_namespace_from(
		std::env::var(NAMESPACE_ENV).ok(),
		Path::new(SERVICE_ACCOUNT_NAMESPACE_PATH),
	)
}

pub fn resolve_namespace_from(env_value: Option<String>, namespace_file: &Path) -> String {
	if let Some(ns) = env_value.filter(|ns| !ns.is_empty()) {
		return ns;
	}

	if let Ok(data) = std::fs::read_to_string(namespace_file) {
		let ns = data.trim();
		if !ns.is_empty() {
			return ns.to_string();
		}
	}

	DEFAULT_NAMESPACE.to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn env_takes_precedence() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "from-file").unwrap();

		let ns = resolve_namespace_from(Some("from-env".to_string()), file.path());
		assert_eq!(ns, "from-env");
	}

	#[test]
	fn empty_env_falls_back_to_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "  kube-system  ").unwrap();

		let ns = resolve_namespace_from(Some(String::new()), file.path());
		assert_eq!(ns, "kube-system");
	}

	#[test]
	fn missing_file_falls_back_to_default() {
		let dir = tempfile::tempdir().unwrap();
		let ns = resolve_namespace_from(None, &dir.path().join("namespace"));
		assert_eq!(ns, DEFAULT_NAMESPACE);
	}

	#[test]
	fn blank_file_falls_back_to_default() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "   ").unwrap();

		let ns = resolve_namespace_from(None, file.path());
		assert_eq!(ns, DEFAULT_NAMESPACE);
	}
}
