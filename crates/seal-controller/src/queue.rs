// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deduplicating, rate-limited work queue.
//!
//! A key is handed to at most one worker at a time. Adding a key that is
//! already queued is a no-op; adding a key that is being processed marks it
//! dirty so it is queued again once the worker calls [`WorkQueue::done`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;

/// Delay before the first retry of a failing key.
pub const BASE_DELAY: Duration = Duration::from_millis(5);
/// Upper bound on the per-key retry delay.
pub const MAX_DELAY: Duration = Duration::from_secs(1000);

struct State<K> {
	queue: VecDeque<K>,
	dirty: HashSet<K>,
	processing: HashSet<K>,
	failures: HashMap<K, u32>,
	shutting_down: bool,
}

pub struct WorkQueue<K> {
	state: Mutex<State<K>>,
	notify: Notify,
	base_delay: Duration,
	max_delay: Duration,
}

impl<K> Default for WorkQueue<K>
where
	K: Clone + Eq + Hash + Send + 'static,
{
	fn default() -> Self {
		Self::new()
	}
}

impl<K> WorkQueue<K>
where
	K: Clone + Eq + Hash + Send + 'static,
{
	pub fn new() -> Self {
		Self::with_backoff(BASE_DELAY, MAX_DELAY)
	}

	pub fn with_backoff(base_delay: Duration, max_delay: Duration) -> Self {
		Self {
			state: Mutex::new(State {
				queue: VecDeque::new(),
				dirty: HashSet::new(),
				processing: HashSet::new(),
				failures: HashMap::new(),
				shutting_down: false,
			}),
			notify: Notify::new(),
			base_delay,
			max_delay,
		}
	}

	fn lock(&self) -> MutexGuard<'_, State<K>> {
		self.state.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Queue a key for processing. Ignored after shutdown.
	pub fn add(&self, key: K) {
		let mut state = self.lock();
		if state.shutting_down || state.dirty.contains(&key) {
			return;
		}
		state.dirty.insert(key.clone());
		if state.processing.contains(&key) {
			return;
		}
		state.queue.push_back(key);
		drop(state);
		self.notify.notify_one();
	}

	/// Wait for the next key.
	///
	/// Returns `None` once the queue is shut down and drained.
	pub async fn get(&self) -> Option<K> {
		loop {
			let notified = self.notify.notified();
			tokio::pin!(notified);
			notified.as_mut().enable();
			{
				let mut state = self.lock();
				if let Some(key) = state.queue.pop_front() {
					state.dirty.remove(&key);
					state.processing.insert(key.clone());
					let more = !state.queue.is_empty();
					drop(state);
					if more {
						// Pass the wakeup on so idle workers pick up the rest.
						self.notify.notify_one();
					}
					return Some(key);
				}
				if state.shutting_down {
					return None;
				}
			}
			notified.await;
		}
	}

	/// Mark a key as processed. A key re-added meanwhile is queued again.
	pub fn done(&self, key: &K) {
		let mut state = self.lock();
		state.processing.remove(key);
		if state.dirty.contains(key) {
			state.queue.push_back(key.clone());
			drop(state);
			self.notify.notify_one();
		}
	}

	/// Queue a key after `delay`.
	pub fn add_after(self: &Arc<Self>, key: K, delay: Duration) {
		if self.is_shutting_down() {
			return;
		}
		if delay.is_zero() {
			self.add(key);
			return;
		}
		let queue = Arc::clone(self);
		tokio::spawn(async move {
			tokio::time::sleep(delay).await;
			queue.add(key);
		});
	}

	/// Queue a key after its exponential failure delay and count the failure.
	pub fn add_rate_limited(self: &Arc<Self>, key: K) {
		let delay = self.next_delay(&key);
		self.add_after(key, delay);
	}

	fn next_delay(&self, key: &K) -> Duration {
		let mut state = self.lock();
		let failures = state.failures.entry(key.clone()).or_insert(0);
		let exponent = *failures;
		*failures += 1;
		backoff(self.base_delay, self.max_delay, exponent)
	}

	/// Clear the failure count for a key.
	pub fn forget(&self, key: &K) {
		self.lock().failures.remove(key);
	}

	/// Number of rate-limited requeues recorded for a key.
	pub fn num_requeues(&self, key: &K) -> u32 {
		self.lock().failures.get(key).copied().unwrap_or(0)
	}

	/// Stop accepting keys and wake every blocked [`get`](Self::get).
	pub fn shut_down(&self) {
		self.lock().shutting_down = true;
		self.notify.notify_waiters();
	}

	pub fn is_shutting_down(&self) -> bool {
		self.lock().shutting_down
	}

	/// Number of keys waiting to be handed out.
	pub fn len(&self) -> usize {
		self.lock().queue.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

fn backoff(base: Duration, max: Duration, exponent: u32) -> Duration {
	let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
	base.checked_mul(factor).map_or(max, |d| d.min(max))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_doubles_and_caps() {
		assert_eq!(backoff(BASE_DELAY, MAX_DELAY, 0), Duration::from_millis(5));
		assert_eq!(backoff(BASE_DELAY, MAX_DELAY, 1), Duration::from_millis(10));
		assert_eq!(backoff(BASE_DELAY, MAX_DELAY, 4), Duration::from_millis(80));
		assert_eq!(backoff(BASE_DELAY, MAX_DELAY, 30), MAX_DELAY);
		assert_eq!(backoff(BASE_DELAY, MAX_DELAY, 200), MAX_DELAY);
	}

	#[tokio::test]
	async fn duplicate_adds_are_collapsed() {
		let queue = WorkQueue::new();
		queue.add("a");
		queue.add("a");
		queue.add("b");
		assert_eq!(queue.len(), 2);

		assert_eq!(queue.get().await, Some("a"));
		assert_eq!(queue.get().await, Some("b"));
		assert!(queue.is_empty());
	}

	#[tokio::test]
	async fn key_added_while_processing_is_requeued_on_done() {
		let queue = WorkQueue::new();
		queue.add("a");
		let key = queue.get().await.unwrap();

		queue.add("a");
		// Not handed out while still in flight.
		assert!(queue.is_empty());

		queue.done(&key);
		assert_eq!(queue.len(), 1);
		assert_eq!(queue.get().await, Some("a"));
	}

	#[tokio::test]
	async fn done_without_readd_leaves_queue_empty() {
		let queue = WorkQueue::new();
		queue.add("a");
		let key = queue.get().await.unwrap();
		queue.done(&key);
		assert!(queue.is_empty());
	}

	#[tokio::test]
	async fn shutdown_wakes_blocked_getters() {
		let queue = Arc::new(WorkQueue::<&str>::new());
		let waiters: Vec<_> = (0..3)
			.map(|_| {
				let q = Arc::clone(&queue);
				tokio::spawn(async move { q.get().await })
			})
			.collect();
		tokio::task::yield_now().await;

		queue.shut_down();
		for waiter in waiters {
			assert_eq!(waiter.await.unwrap(), None);
		}
	}

	#[tokio::test]
	async fn queued_keys_drain_after_shutdown_and_adds_are_ignored() {
		let queue = WorkQueue::new();
		queue.add("a");
		queue.shut_down();
		queue.add("b");

		assert_eq!(queue.get().await, Some("a"));
		assert_eq!(queue.get().await, None);
	}

	#[tokio::test(start_paused = true)]
	async fn rate_limited_adds_back_off_exponentially() {
		let queue = Arc::new(WorkQueue::new());

		queue.add_rate_limited("a");
		assert_eq!(queue.num_requeues(&"a"), 1);
		assert!(queue.is_empty());
		tokio::time::sleep(Duration::from_millis(6)).await;
		assert_eq!(queue.get().await, Some("a"));
		queue.done(&"a");

		queue.add_rate_limited("a");
		tokio::time::sleep(Duration::from_millis(6)).await;
		assert!(queue.is_empty());
		tokio::time::sleep(Duration::from_millis(5)).await;
		assert_eq!(queue.len(), 1);

		queue.forget(&"a");
		assert_eq!(queue.num_requeues(&"a"), 0);
	}

	#[tokio::test]
	async fn waiting_worker_receives_later_add() {
		let queue = Arc::new(WorkQueue::new());
		let q = Arc::clone(&queue);
		let waiter = tokio::spawn(async move { q.get().await });
		tokio::task::yield_now().await;

		queue.add("late");
		assert_eq!(waiter.await.unwrap(), Some("late"));
	}
}
