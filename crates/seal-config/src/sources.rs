// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ControllerConfigLayer;
use crate::sections::{
	HttpConfigLayer, KeysConfigLayer, LoggingConfigLayer, RotationConfigLayer, WorkerConfigLayer,
};

/// Default location of the controller config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/seal/controller.toml";

/// Prefix shared by every environment variable the controller reads.
pub const ENV_PREFIX: &str = "SEAL_CONTROLLER_";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ControllerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ControllerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ControllerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ControllerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ControllerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ControllerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: SEAL_CONTROLLER_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ControllerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		load_from_env(&|name: &str| std::env::var(name).ok())
	}
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_var(lookup: Lookup<'_>, field: &str) -> Option<String> {
	lookup(&format!("{ENV_PREFIX}{field}")).filter(|s| !s.is_empty())
}

fn env_parse<T>(lookup: Lookup<'_>, field: &str) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
{
	match env_var(lookup, field) {
		Some(v) => v.parse().map(Some).map_err(|e| ConfigError::InvalidValue {
			key: format!("{ENV_PREFIX}{field}"),
			message: format!("invalid value '{v}': {e}"),
		}),
		None => Ok(None),
	}
}

pub(crate) fn load_from_env(lookup: Lookup<'_>) -> Result<ControllerConfigLayer, ConfigError> {
	Ok(ControllerConfigLayer {
		keys: Some(KeysConfigLayer {
			prefix: env_var(lookup, "KEY_PREFIX"),
			size_bits: env_parse(lookup, "KEY_SIZE")?,
			ttl_secs: env_parse(lookup, "KEY_TTL_SECS")?,
			// An explicitly empty CN is meaningful, so bypass the empty filter.
			common_name: lookup(&format!("{ENV_PREFIX}MY_CN")),
			blacklist_policy: env_parse(lookup, "BLACKLIST_POLICY")?,
		}),
		rotation: Some(RotationConfigLayer {
			period_secs: env_parse(lookup, "ROTATE_PERIOD_SECS")?,
		}),
		controller: Some(WorkerConfigLayer {
			workers: env_parse(lookup, "WORKERS")?,
			max_retries: env_parse(lookup, "MAX_RETRIES")?,
			namespace: env_var(lookup, "NAMESPACE"),
		}),
		http: Some(HttpConfigLayer {
			host: env_var(lookup, "HOST"),
			port: env_parse(lookup, "PORT")?,
		}),
		logging: Some(LoggingConfigLayer {
			level: env_var(lookup, "LOG_LEVEL"),
			format: env_parse(lookup, "LOG_FORMAT")?,
		}),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sections::{KeyBlacklistPolicy, LogFormat};
	use std::collections::HashMap;

	fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name| map.get(name).cloned()
	}

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.http.is_none());
		assert!(layer.keys.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let source = TomlSource::new("/nonexistent/controller.toml");
		let layer = source.load().unwrap();
		assert!(layer.http.is_none());
	}

	#[test]
	fn test_toml_source_parses_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("controller.toml");
		std::fs::write(
			&path,
			"[keys]\nprefix = \"custom\"\n\n[rotation]\nperiod_secs = 60\n",
		)
		.unwrap();

		let layer = TomlSource::new(&path).load().unwrap();
		assert_eq!(layer.keys.unwrap().prefix.as_deref(), Some("custom"));
		assert_eq!(layer.rotation.unwrap().period_secs, Some(60));
	}

	#[test]
	fn test_toml_source_reports_parse_errors() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("controller.toml");
		std::fs::write(&path, "[keys\n").unwrap();

		let err = TomlSource::new(&path).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn test_env_reads_prefixed_variables() {
		let lookup = lookup_from(&[
			("SEAL_CONTROLLER_KEY_SIZE", "2048"),
			("SEAL_CONTROLLER_MY_CN", "sealer"),
			("SEAL_CONTROLLER_BLACKLIST_POLICY", "decrypt_only"),
			("SEAL_CONTROLLER_ROTATE_PERIOD_SECS", "3600"),
			("SEAL_CONTROLLER_PORT", "9090"),
			("SEAL_CONTROLLER_LOG_FORMAT", "json"),
			("KEY_SIZE", "1"),
		]);
		let layer = load_from_env(&lookup).unwrap();

		let keys = layer.keys.unwrap();
		assert_eq!(keys.size_bits, Some(2048));
		assert_eq!(keys.common_name.as_deref(), Some("sealer"));
		assert_eq!(keys.blacklist_policy, Some(KeyBlacklistPolicy::DecryptOnly));
		assert!(keys.prefix.is_none());
		assert_eq!(layer.rotation.unwrap().period_secs, Some(3600));
		assert_eq!(layer.http.unwrap().port, Some(9090));
		assert_eq!(layer.logging.unwrap().format, Some(LogFormat::Json));
	}

	#[test]
	fn test_env_rejects_unparseable_numbers() {
		let lookup = lookup_from(&[("SEAL_CONTROLLER_WORKERS", "many")]);
		let err = load_from_env(&lookup).unwrap_err();
		assert!(err.to_string().contains("SEAL_CONTROLLER_WORKERS"));
	}
}
