// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Watches SealedSecrets, keeps a local cache and feeds the work queue.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::reflector::{self, Store};
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::Api;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::crd::SealedSecret;
use crate::queue::WorkQueue;
use crate::reconciler::ObjectKey;

/// Turns watch events into work items.
///
/// Objects delivered during a (re)list only reach the cache at `InitDone`,
/// so their keys are held back until then. The keys cached before the
/// relist are remembered at `Init`; any of them missing from the new listing
/// was deleted while the watch was down and is enqueued at `InitDone` too.
///
/// Must observe each event after it has been applied to `cache`.
#[derive(Debug, Default)]
pub struct EventKeys {
	relist: Option<Relist>,
}

#[derive(Debug, Default)]
struct Relist {
	cached: BTreeSet<ObjectKey>,
	listed: BTreeSet<ObjectKey>,
}

impl EventKeys {
	pub fn observe(
		&mut self,
		event: &Event<SealedSecret>,
		cache: &Store<SealedSecret>,
	) -> Vec<ObjectKey> {
		match event {
			Event::Apply(ss) | Event::Delete(ss) => vec![ObjectKey::from_resource(ss)],
			Event::Init => {
				let cached = cache.state().iter().map(|ss| ObjectKey::from_resource(ss)).collect();
				self.relist = Some(Relist {
					cached,
					listed: BTreeSet::new(),
				});
				Vec::new()
			}
			Event::InitApply(ss) => {
				let key = ObjectKey::from_resource(ss);
				match self.relist.as_mut() {
					Some(relist) => {
						relist.listed.insert(key);
						Vec::new()
					}
					None => vec![key],
				}
			}
			Event::InitDone => {
				let Some(Relist { cached, mut listed }) = self.relist.take() else {
					return Vec::new();
				};
				let vanished = cached.difference(&listed).count();
				if vanished > 0 {
					info!(vanished, "sealed secrets deleted while the watch was down");
				}
				listed.extend(cached);
				listed.into_iter().collect()
			}
		}
	}
}

pub struct Informer {
	store: Store<SealedSecret>,
	cancel: CancellationToken,
	handle: JoinHandle<()>,
}

impl Informer {
	/// Start watching `api` and enqueue a key for every add, update and delete.
	///
	/// Keys are enqueued only once the object they name is visible in
	/// [`store`](Self::store).
	pub fn spawn(api: Api<SealedSecret>, queue: Arc<WorkQueue<ObjectKey>>) -> Self {
		let (store, writer) = reflector::store();
		let cancel = CancellationToken::new();
		let token = cancel.clone();
		let cache = store.clone();

		let handle = tokio::spawn(async move {
			let events = watcher::watcher(api, watcher::Config::default())
				.default_backoff()
				.reflect(writer);
			futures::pin_mut!(events);
			let mut keys = EventKeys::default();

			loop {
				tokio::select! {
					_ = token.cancelled() => break,
					next = events.next() => match next {
						Some(Ok(event)) => {
							for key in keys.observe(&event, &cache) {
								debug!(key = %key, "sealed secret changed");
								queue.add(key);
							}
						}
						Some(Err(e)) => warn!(error = %e, "sealed secret watch error"),
						None => {
							error!("sealed secret watch stream ended");
							break;
						}
					},
				}
			}
			info!("informer stopped");
		});

		Self {
			store,
			cancel,
			handle,
		}
	}

	/// Local view of every watched SealedSecret.
	pub fn store(&self) -> Store<SealedSecret> {
		self.store.clone()
	}

	/// Wait for the initial listing to land in the store.
	pub async fn wait_until_ready(&self) -> Result<(), reflector::store::WriterDropped> {
		self.store.wait_until_ready().await
	}

	pub async fn shutdown(self) {
		self.cancel.cancel();
		if let Err(e) = self.handle.await {
			error!(error = %e, "informer task panicked");
		}
	}
}
