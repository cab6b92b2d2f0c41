// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod controller;
mod http;
mod keys;
mod logging;
mod rotation;

pub use controller::{WorkerConfig, WorkerConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use keys::{validate_key_prefix, KeyBlacklistPolicy, KeysConfig, KeysConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use rotation::{RotationConfig, RotationConfigLayer};
