// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! K8s Secret client abstraction for the sealed secrets controller.
//!
//! This crate provides:
//! - A trait-based Secret client abstraction for testability
//! - Production implementation using the kube crate
//! - An in-memory mock used by the key registry and reconciler tests
//! - Namespace resolution for the controller's own namespace

mod client;
mod error;
mod kube_client;
mod mock;
mod namespace;

pub use client::SecretsClient;
pub use error::{K8sError, K8sResult};
pub use kube_client::KubeSecretsClient;
pub use mock::{MockCall, MockSecretsClient};
pub use namespace::{resolve_namespace, resolve_namespace_from, DEFAULT_NAMESPACE, NAMESPACE_ENV, SERVICE_ACCOUNT_NAMESPACE_PATH};

pub use k8s_openapi::api::core::v1::Secret;
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
pub use k8s_openapi::ByteString;
