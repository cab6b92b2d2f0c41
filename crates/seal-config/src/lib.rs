// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the sealed secrets controller.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`SEAL_CONTROLLER_*`)
//!
//! The resolved [`ControllerConfig`] is immutable; callers share it behind an `Arc`.
//!
//! # Usage
//!
//! ```ignore
//! use seal_config::load_config;
//!
//! let config = load_config()?;
//! println!("rotating keys every {:?}", config.rotation.period());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ControllerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved controller configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerConfig {
	pub keys: KeysConfig,
	pub rotation: RotationConfig,
	pub controller: WorkerConfig,
	pub http: HttpConfig,
	pub logging: LoggingConfig,
}

impl ControllerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`SEAL_CONTROLLER_*`)
/// 2. Config file (`/etc/seal/controller.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ControllerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ControllerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge the given sources in precedence order and resolve the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ControllerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ControllerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: ControllerConfigLayer) -> Result<ControllerConfig, ConfigError> {
	let keys = layer.keys.unwrap_or_default().finalize()?;
	let rotation = layer.rotation.unwrap_or_default().finalize()?;
	let controller = layer.controller.unwrap_or_default().finalize()?;
	let http = layer.http.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&keys, &rotation)?;

	info!(
		key_prefix = %keys.prefix,
		key_size = keys.size_bits,
		blacklist_policy = ?keys.blacklist_policy,
		rotate_period_secs = rotation.period_secs,
		workers = controller.workers,
		max_retries = controller.max_retries,
		host = %http.host,
		port = http.port,
		"Controller configuration loaded"
	);

	Ok(ControllerConfig {
		keys,
		rotation,
		controller,
		http,
		logging,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(keys: &KeysConfig, rotation: &RotationConfig) -> Result<(), ConfigError> {
	if rotation.period_secs > keys.ttl_secs {
		return Err(ConfigError::Validation(format!(
			"rotation period ({}s) exceeds certificate validity ({}s); keys would expire \
			 before they are replaced",
			rotation.period_secs, keys.ttl_secs
		)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	struct StaticSource(&'static str, Precedence);

	impl ConfigSource for StaticSource {
		fn name(&self) -> &'static str {
			"static"
		}

		fn precedence(&self) -> Precedence {
			self.1
		}

		fn load(&self) -> Result<ControllerConfigLayer, ConfigError> {
			Ok(toml::from_str(self.0).unwrap())
		}
	}

	#[test]
	fn test_defaults_resolve() {
		let config = load_from_sources(vec![Box::new(DefaultsSource)]).unwrap();
		assert_eq!(config, ControllerConfig::default());
		assert_eq!(config.socket_addr(), "0.0.0.0:8080");
	}

	#[test]
	fn test_higher_precedence_wins_regardless_of_order() {
		let config = load_from_sources(vec![
			Box::new(StaticSource("[http]\nport = 9000\n", Precedence::Environment)),
			Box::new(StaticSource(
				"[http]\nport = 7000\nhost = \"10.0.0.1\"\n",
				Precedence::ConfigFile,
			)),
		])
		.unwrap();
		assert_eq!(config.socket_addr(), "10.0.0.1:9000");
	}

	#[test]
	fn test_rotation_longer_than_ttl_rejected() {
		let err = load_from_sources(vec![Box::new(StaticSource(
			"[keys]\nttl_secs = 60\n\n[rotation]\nperiod_secs = 120\n",
			Precedence::ConfigFile,
		))])
		.unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn test_invalid_prefix_surfaces_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("controller.toml");
		std::fs::write(&path, "[keys]\nprefix = \"Bad_Prefix\"\n").unwrap();

		let err = load_from_sources(vec![Box::new(TomlSource::new(&path))]).unwrap_err();
		assert!(err.to_string().contains("keys.prefix"));
	}
}
