// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sealed secrets controller binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kube::Api;
use seal_config::{LogFormat, LoggingConfig};
use seal_controller::{
	first_rotation_delay, init_key_rotation, key_settings, router, AppState, Controller, Informer,
	KeyRotationJob, Reconciler, SealedSecret, Unsealer, WorkQueue, KEY_ROTATION_JOB_ID,
};
use seal_jobs::JobScheduler;
use seal_k8s::{resolve_namespace, KubeSecretsClient, SecretsClient};
use seal_keys::KeyRegistry;
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod version;

/// seal-controller - decrypts SealedSecrets into Secrets.
#[derive(Parser, Debug)]
#[command(
	name = "seal-controller",
	about = "Kubernetes controller for sealed secrets",
	version
)]
struct Args {
	/// Path to a TOML config file (defaults to /etc/seal/controller.toml)
	#[arg(long, env = "SEAL_CONTROLLER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
	/// Mark a key record as compromised
	Blacklist {
		/// Name of the key Secret
		name: String,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	let config = match &args.config {
		Some(path) => seal_config::load_config_with_file(path)?,
		None => seal_config::load_config()?,
	};
	init_tracing(&config.logging);

	let namespace = config
		.controller
		.namespace
		.clone()
		.unwrap_or_else(resolve_namespace);
	let settings = key_settings(&config.keys, &namespace);

	let kube_client = KubeSecretsClient::new().await?;
	let client = kube_client.client();
	let secrets: Arc<dyn SecretsClient> = Arc::new(kube_client);

	if let Some(Command::Blacklist { name }) = &args.command {
		KeyRegistry::new(Arc::clone(&secrets), settings)
			.mark_blacklisted(name)
			.await?;
		println!("key {name} marked as compromised; restart the controller to stop using it");
		return Ok(());
	}

	tracing::info!(
		namespace = %namespace,
		addr = %config.socket_addr(),
		workers = config.controller.workers,
		"starting seal-controller"
	);

	let registry = Arc::new(KeyRegistry::load(Arc::clone(&secrets), settings).await?);
	let period = config.rotation.period();
	init_key_rotation(&registry, period).await?;
	let first_rotation = first_rotation_delay(&registry, period).await;
	tracing::info!(next_rotation_secs = first_rotation.as_secs(), "key rotation scheduled");

	let mut scheduler = JobScheduler::new();
	scheduler.register_periodic_with_delay(
		Arc::new(KeyRotationJob::new(Arc::clone(&registry))),
		period,
		first_rotation,
	);
	let scheduler = Arc::new(scheduler);
	scheduler.start().await?;

	let rotate_on_signal = {
		let scheduler = Arc::clone(&scheduler);
		let mut usr1 = signal(SignalKind::user_defined1())?;
		tokio::spawn(async move {
			while usr1.recv().await.is_some() {
				tracing::info!("received SIGUSR1, rotating key");
				if let Err(e) = scheduler.trigger_job(KEY_ROTATION_JOB_ID) {
					tracing::error!(error = %e, "failed to trigger key rotation");
				}
			}
		})
	};

	let queue = Arc::new(WorkQueue::new());
	let informer = Informer::spawn(Api::<SealedSecret>::all(client), Arc::clone(&queue));

	tracing::info!("waiting for sealed secret cache to sync");
	let synced = tokio::select! {
		ready = informer.wait_until_ready() => Some(ready),
		_ = shutdown_signal() => None,
	};
	match synced {
		Some(ready) => ready?,
		None => {
			tracing::info!("received shutdown signal before cache sync");
			informer.shutdown().await;
			scheduler.shutdown().await;
			rotate_on_signal.abort();
			return Ok(());
		}
	}

	let reconciler = Arc::new(Reconciler::new(
		Arc::new(informer.store()),
		Arc::clone(&secrets),
		Arc::clone(&registry),
	));
	let controller = Arc::new(Controller::new(
		queue,
		reconciler,
		config.controller.max_retries,
	));
	controller.run(config.controller.workers).await;

	let app = router(AppState {
		unsealer: Arc::new(Unsealer::new(Arc::clone(&registry))),
		scheduler: Arc::clone(&scheduler),
	});
	let addr = config.socket_addr();
	let listener = tokio::net::TcpListener::bind(&addr).await?;
	tracing::info!("listening on {}", addr);

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = shutdown_signal() => {
			tracing::info!("Received shutdown signal");
		}
	}

	informer.shutdown().await;
	controller.shutdown().await;
	scheduler.shutdown().await;
	rotate_on_signal.abort();

	tracing::info!("seal-controller shutdown complete");
	Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
	let registry = tracing_subscriber::registry().with(filter);
	match logging.format {
		LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
		LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}

async fn shutdown_signal() {
	let terminate = async {
		match signal(SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(e) => {
				tracing::warn!(error = %e, "cannot listen for SIGTERM");
				std::future::pending::<()>().await;
			}
		}
	};

	tokio::select! {
		_ = tokio::signal::ctrl_c() => {}
		_ = terminate => {}
	}
}
