use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use nextedit_worker::{TaskClass, spawn};
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::task::AbortOnDropHandle;

use super::{SelectionChangeEvent, SelectionHandler, StateSnapshot};
use crate::error::HandlerError;

#[derive(Default)]
struct TypingState {
	typing: bool,
	last_change: Option<Instant>,
	epoch: u64,
	quiet_timer: Option<AbortOnDropHandle<()>>,
}

/// Tracks whether recent document edits mean the user is typing.
///
/// Every edit raises the flag and restarts a quiet timer; the flag drops once
/// the timer runs out without another edit.
#[derive(Clone)]
pub struct TypingSessionTracker {
	state: Arc<Mutex<TypingState>>,
	quiet: Duration,
}

impl TypingSessionTracker {
	pub fn new(quiet: Duration) -> Self {
		Self {
			state: Arc::new(Mutex::new(TypingState::default())),
			quiet,
		}
	}

	/// Records an edit. Must be called from within a tokio runtime.
	pub fn document_edited(&self) {
		let mut state = self.state.lock();
		state.typing = true;
		state.last_change = Some(Instant::now());
		state.epoch += 1;

		let epoch = state.epoch;
		let quiet = self.quiet;
		let weak: Weak<Mutex<TypingState>> = Arc::downgrade(&self.state);
		// Replacing the handle aborts the previous timer.
		state.quiet_timer = Some(AbortOnDropHandle::new(spawn(TaskClass::Background, async move {
			tokio::time::sleep(quiet).await;
			let Some(state) = weak.upgrade() else {
				return;
			};
			let mut state = state.lock();
			if state.epoch == epoch {
				state.typing = false;
				tracing::trace!(epoch, "typing.session_ended");
			}
		})));
	}

	pub fn is_typing(&self) -> bool {
		self.state.lock().typing
	}

	pub fn last_change(&self) -> Option<Instant> {
		self.state.lock().last_change
	}
}

/// Keeps the chain alive while the user is typing.
pub struct TypingSessionHandler;

#[async_trait]
impl SelectionHandler for TypingSessionHandler {
	async fn handle(&self, _event: &SelectionChangeEvent, snapshot: &StateSnapshot) -> Result<bool, HandlerError> {
		Ok(snapshot.is_typing_session)
	}
}
