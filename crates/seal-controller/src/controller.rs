// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Worker loop draining the work queue into the reconciler.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::ReconcileError;
use crate::queue::WorkQueue;
use crate::reconciler::{ObjectKey, Reconcile};

/// Retry ceiling for a failing work item.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Receives work items that exhausted their retries.
pub type ErrorHandler = Arc<dyn Fn(&ObjectKey, &ReconcileError) + Send + Sync>;

fn log_dropped(key: &ObjectKey, err: &ReconcileError) {
	error!(key = %key, error = %err, "dropping sealed secret after repeated failures");
}

pub struct Controller {
	queue: Arc<WorkQueue<ObjectKey>>,
	reconciler: Arc<dyn Reconcile>,
	max_retries: u32,
	on_error: ErrorHandler,
	workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
	pub fn new(
		queue: Arc<WorkQueue<ObjectKey>>,
		reconciler: Arc<dyn Reconcile>,
		max_retries: u32,
	) -> Self {
		Self {
			queue,
			reconciler,
			max_retries,
			on_error: Arc::new(log_dropped),
			workers: Mutex::new(Vec::new()),
		}
	}

	pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
		self.on_error = handler;
		self
	}

	pub fn queue(&self) -> &Arc<WorkQueue<ObjectKey>> {
		&self.queue
	}

	/// Take one key off the queue and reconcile it.
	///
	/// Returns `false` once the queue is shut down and empty.
	pub async fn process_next_item(&self) -> bool {
		let Some(key) = self.queue.get().await else {
			return false;
		};

		match self.reconciler.reconcile(&key).await {
			Ok(outcome) => {
				debug!(key = %key, ?outcome, "reconciled");
				self.queue.forget(&key);
			}
			Err(err) => {
				let retries = self.queue.num_requeues(&key);
				if retries < self.max_retries {
					warn!(key = %key, retries, error = %err, "reconcile failed, requeueing");
					self.queue.add_rate_limited(key.clone());
				} else {
					self.queue.forget(&key);
					(self.on_error)(&key, &err);
				}
			}
		}

		self.queue.done(&key);
		true
	}

	/// Spawn `workers` tasks draining the queue.
	pub async fn run(self: &Arc<Self>, workers: usize) {
		let mut handles = self.workers.lock().await;
		for worker in 0..workers.max(1) {
			let controller = Arc::clone(self);
			handles.push(tokio::spawn(async move {
				debug!(worker, "worker started");
				while controller.process_next_item().await {}
				debug!(worker, "worker stopped");
			}));
		}
		info!(workers = handles.len(), "controller workers running");
	}

	/// Shut the queue down and wait for in-flight reconciles to finish.
	pub async fn shutdown(&self) {
		self.queue.shut_down();
		let handles = std::mem::take(&mut *self.workers.lock().await);
		for handle in handles {
			if let Err(e) = handle.await {
				error!(error = %e, "controller worker panicked");
			}
		}
		info!("controller stopped");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::{ReconcileResult, UnsealError};
	use crate::reconciler::ReconcileOutcome;
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::time::Duration;

	/// Fails the first `failures` attempts, then succeeds.
	struct Flaky {
		attempts: AtomicU32,
		failures: u32,
	}

	impl Flaky {
		fn new(failures: u32) -> Arc<Self> {
			Arc::new(Self {
				attempts: AtomicU32::new(0),
				failures,
			})
		}

		fn attempts(&self) -> u32 {
			self.attempts.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl Reconcile for Flaky {
		async fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<ReconcileOutcome> {
			let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
			if attempt < self.failures {
				return Err(UnsealError::DecryptExhausted {
					key: key.to_string(),
				}
				.into());
			}
			Ok(ReconcileOutcome::Created)
		}
	}

	fn controller(reconciler: Arc<Flaky>, dropped: Arc<AtomicU32>) -> Arc<Controller> {
		let handler: ErrorHandler = Arc::new(move |_: &ObjectKey, _: &ReconcileError| {
			dropped.fetch_add(1, Ordering::SeqCst);
		});
		Arc::new(
			Controller::new(Arc::new(WorkQueue::new()), reconciler, DEFAULT_MAX_RETRIES)
				.with_error_handler(handler),
		)
	}

	#[tokio::test(start_paused = true)]
	async fn failing_item_is_attempted_six_times_then_dropped() {
		let reconciler = Flaky::new(u32::MAX);
		let dropped = Arc::new(AtomicU32::new(0));
		let controller = controller(Arc::clone(&reconciler), Arc::clone(&dropped));
		let key = ObjectKey::new("prod", "db");

		controller.queue().add(key.clone());
		controller.run(1).await;
		tokio::time::sleep(Duration::from_secs(60)).await;

		assert_eq!(reconciler.attempts(), 6);
		assert_eq!(dropped.load(Ordering::SeqCst), 1);
		assert_eq!(controller.queue().num_requeues(&key), 0);

		tokio::time::sleep(Duration::from_secs(3600)).await;
		assert_eq!(reconciler.attempts(), 6);

		controller.shutdown().await;
	}

	#[tokio::test(start_paused = true)]
	async fn success_clears_backoff() {
		let reconciler = Flaky::new(2);
		let dropped = Arc::new(AtomicU32::new(0));
		let controller = controller(Arc::clone(&reconciler), Arc::clone(&dropped));
		let key = ObjectKey::new("prod", "db");

		controller.queue().add(key.clone());
		controller.run(2).await;
		tokio::time::sleep(Duration::from_secs(1)).await;

		assert_eq!(reconciler.attempts(), 3);
		assert_eq!(dropped.load(Ordering::SeqCst), 0);
		assert_eq!(controller.queue().num_requeues(&key), 0);

		controller.shutdown().await;
	}

	#[tokio::test]
	async fn duplicate_adds_reconcile_once() {
		let reconciler = Flaky::new(0);
		let controller = controller(Arc::clone(&reconciler), Arc::new(AtomicU32::new(0)));
		let key = ObjectKey::new("prod", "db");

		for _ in 0..5 {
			controller.queue().add(key.clone());
		}
		assert!(controller.process_next_item().await);
		assert!(controller.queue().is_empty());
		assert_eq!(reconciler.attempts(), 1);
	}

	#[tokio::test]
	async fn shutdown_stops_idle_workers() {
		let controller = controller(Flaky::new(0), Arc::new(AtomicU32::new(0)));
		controller.run(3).await;
		tokio::time::timeout(Duration::from_secs(5), controller.shutdown())
			.await
			.unwrap();
		assert!(!controller.process_next_item().await);
	}
}
