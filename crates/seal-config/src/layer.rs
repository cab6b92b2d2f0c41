// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration produced by each source.

use serde::Deserialize;

use crate::sections::{
	HttpConfigLayer, KeysConfigLayer, LoggingConfigLayer, RotationConfigLayer, WorkerConfigLayer,
};

/// One source's view of the configuration. Unset fields defer to lower
/// precedence sources.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfigLayer {
	#[serde(default)]
	pub keys: Option<KeysConfigLayer>,
	#[serde(default)]
	pub rotation: Option<RotationConfigLayer>,
	#[serde(default)]
	pub controller: Option<WorkerConfigLayer>,
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(b), Some(o)) => merge(b, o),
		(None, Some(o)) => *base = Some(o),
		(_, None) => {}
	}
}

impl ControllerConfigLayer {
	pub fn merge(&mut self, other: ControllerConfigLayer) {
		merge_section(&mut self.keys, other.keys, KeysConfigLayer::merge);
		merge_section(&mut self.rotation, other.rotation, RotationConfigLayer::merge);
		merge_section(&mut self.controller, other.controller, WorkerConfigLayer::merge);
		merge_section(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_keeps_lower_sections_when_overlay_is_empty() {
		let mut base = ControllerConfigLayer {
			http: Some(HttpConfigLayer {
				host: Some("127.0.0.1".to_string()),
				port: Some(9000),
			}),
			..Default::default()
		};
		base.merge(ControllerConfigLayer::default());
		assert_eq!(base.http.unwrap().port, Some(9000));
	}

	#[test]
	fn test_merge_overlays_fields_within_section() {
		let mut base = ControllerConfigLayer {
			http: Some(HttpConfigLayer {
				host: Some("127.0.0.1".to_string()),
				port: Some(9000),
			}),
			..Default::default()
		};
		base.merge(ControllerConfigLayer {
			http: Some(HttpConfigLayer {
				host: None,
				port: Some(8443),
			}),
			..Default::default()
		});
		let http = base.http.unwrap();
		assert_eq!(http.host.as_deref(), Some("127.0.0.1"));
		assert_eq!(http.port, Some(8443));
	}

	#[test]
	fn test_unknown_section_is_rejected() {
		let result: Result<ControllerConfigLayer, _> = toml::from_str("[database]\nurl = \"x\"\n");
		assert!(result.is_err());
	}
}
