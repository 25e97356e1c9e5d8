use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Counts admitted units of work and the passes currently executing them.
///
/// Producers [`admit`](WorkGate::admit) a unit when they hand it to a
/// consumer, [`discard`](WorkGate::discard) units that were dropped before
/// being picked up, and the consumer holds a [`PassGuard`] while it works on
/// one. The gate is idle once every admitted unit has been retired.
#[derive(Debug, Clone, Default)]
pub struct WorkGate {
	outstanding: Arc<AtomicUsize>,
	active: Arc<AtomicUsize>,
	notify: Arc<Notify>,
}

impl WorkGate {
	pub fn new() -> Self {
		Self::default()
	}

	/// Admits one unit of work.
	pub fn admit(&self) {
		self.outstanding.fetch_add(1, Ordering::SeqCst);
	}

	/// Retires `count` admitted units that will never be executed.
	pub fn discard(&self, count: usize) {
		if count == 0 {
			return;
		}
		let prev = self.outstanding.fetch_sub(count, Ordering::SeqCst);
		debug_assert!(prev >= count, "work gate outstanding underflow");
		self.notify.notify_waiters();
	}

	/// Marks one admitted unit as executing until the guard drops.
	///
	/// The guard retires the unit even if the pass is aborted.
	pub fn begin(&self) -> PassGuard {
		self.active.fetch_add(1, Ordering::SeqCst);
		PassGuard { gate: self.clone() }
	}

	/// Returns true while a pass is executing.
	pub fn is_active(&self) -> bool {
		self.active.load(Ordering::SeqCst) > 0
	}

	/// Returns the number of admitted units not yet retired.
	pub fn outstanding(&self) -> usize {
		self.outstanding.load(Ordering::SeqCst)
	}

	/// Waits until no admitted work remains.
	pub async fn wait_idle(&self) {
		loop {
			// Register interest before checking to avoid a lost wakeup.
			let notified = self.notify.notified();
			if self.outstanding() == 0 {
				return;
			}
			notified.await;
		}
	}
}

/// Guard tracking an executing pass.
#[derive(Debug)]
pub struct PassGuard {
	gate: WorkGate,
}

impl Drop for PassGuard {
	fn drop(&mut self) {
		let prev = self.gate.active.fetch_sub(1, Ordering::SeqCst);
		debug_assert!(prev > 0, "work gate active underflow");
		let prev = self.gate.outstanding.fetch_sub(1, Ordering::SeqCst);
		debug_assert!(prev > 0, "work gate outstanding underflow");
		self.gate.notify.notify_waiters();
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[tokio::test]
	async fn idle_when_nothing_admitted() {
		let gate = WorkGate::new();
		tokio::time::timeout(Duration::from_millis(10), gate.wait_idle())
			.await
			.expect("empty gate is idle");
	}

	#[tokio::test]
	async fn guard_retires_its_unit() {
		let gate = WorkGate::new();
		gate.admit();
		gate.admit();
		let guard = gate.begin();
		assert!(gate.is_active());
		assert_eq!(gate.outstanding(), 2);
		drop(guard);
		assert!(!gate.is_active());
		assert_eq!(gate.outstanding(), 1);
		gate.discard(1);
		assert_eq!(gate.outstanding(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn wait_idle_wakes_when_last_pass_finishes() {
		let gate = WorkGate::new();
		gate.admit();
		let worker = gate.clone();
		let task = tokio::spawn(async move {
			let _pass = worker.begin();
			tokio::time::sleep(Duration::from_millis(30)).await;
		});

		gate.wait_idle().await;
		assert_eq!(gate.outstanding(), 0);
		task.await.unwrap();
	}

	#[tokio::test]
	async fn aborted_pass_still_retires() {
		let gate = WorkGate::new();
		gate.admit();
		let worker = gate.clone();
		let task = tokio::spawn(async move {
			let _pass = worker.begin();
			std::future::pending::<()>().await;
		});
		tokio::task::yield_now().await;
		task.abort();
		let _ = task.await;
		assert_eq!(gate.outstanding(), 0);
		assert!(!gate.is_active());
	}
}
