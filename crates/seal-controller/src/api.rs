// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP surface: certificate download, verification, resealing and health.

use std::sync::Arc;

use axum::{
	body::Bytes,
	extract::State,
	http::{header, StatusCode},
	response::{IntoResponse, Response},
	routing::{get, post},
	Json, Router,
};
use seal_jobs::{HealthState, JobHealthStatus, JobScheduler};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::unseal::Unsealer;

#[derive(Clone)]
pub struct AppState {
	pub unsealer: Arc<Unsealer>,
	pub scheduler: Arc<JobScheduler>,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/v1/cert.pem", get(certificate))
		.route("/v1/verify", post(verify))
		.route("/v1/rotate", post(rotate))
		.route("/healthz", get(health))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// GET /v1/cert.pem - certificate chain of the latest sealing key.
async fn certificate(State(state): State<AppState>) -> Response {
	let pem = state
		.unsealer
		.registry()
		.latest()
		.await
		.and_then(|key| key.certificate_pem());
	match pem {
		Ok(pem) => ([(header::CONTENT_TYPE, "application/x-pem-file")], pem).into_response(),
		Err(e) => {
			warn!(error = %e, "no certificate to serve");
			(StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
		}
	}
}

/// POST /v1/verify - whether the posted SealedSecret can be decrypted.
async fn verify(State(state): State<AppState>, body: Bytes) -> Response {
	match state.unsealer.attempt_unseal(&body).await {
		Ok(true) => (StatusCode::OK, "OK").into_response(),
		Ok(false) => (StatusCode::CONFLICT, "cannot decrypt sealed secret").into_response(),
		Err(e) => {
			debug!(error = %e, "verify rejected input");
			(StatusCode::BAD_REQUEST, e.to_string()).into_response()
		}
	}
}

/// POST /v1/rotate - the posted SealedSecret resealed under the latest key.
async fn rotate(State(state): State<AppState>, body: Bytes) -> Response {
	match state.unsealer.rotate(&body).await {
		Ok(resealed) => ([(header::CONTENT_TYPE, "application/json")], resealed).into_response(),
		Err(e) => {
			debug!(error = %e, "rotate rejected input");
			(StatusCode::BAD_REQUEST, e.to_string()).into_response()
		}
	}
}

#[derive(Debug, Serialize)]
struct HealthResponse {
	status: HealthState,
	keys: usize,
	jobs: Vec<JobHealthStatus>,
}

/// GET /healthz - scheduler health and loaded key count.
async fn health(State(state): State<AppState>) -> Response {
	let jobs = state.scheduler.health_status().await;
	let keys = state.unsealer.registry().len().await;
	let status = if keys == 0 {
		HealthState::Unhealthy
	} else {
		jobs.status
	};
	let code = match status {
		HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
		_ => StatusCode::OK,
	};
	(
		code,
		Json(HealthResponse {
			status,
			keys,
			jobs: jobs.jobs,
		}),
	)
		.into_response()
}
