use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

/// Outcome from enqueueing a mailbox message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxSendOutcome {
	/// Message was appended to the backlog.
	Enqueued,
	/// Message replaced every queued message.
	Coalesced {
		/// Number of queued messages dropped by the replacement.
		replaced: usize,
	},
}

/// Mailbox send error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxSendError {
	/// Mailbox is closed.
	Closed,
}

struct Envelope<T> {
	msg: T,
	not_before: Option<Instant>,
}

struct MailboxState<T> {
	queue: VecDeque<Envelope<T>>,
	closed: bool,
}

struct MailboxInner<T> {
	state: Mutex<MailboxState<T>>,
	notify_recv: Notify,
}

/// Multi-producer mailbox sender.
pub struct MailboxSender<T> {
	inner: Arc<MailboxInner<T>>,
}

/// Mailbox receiver.
pub struct MailboxReceiver<T> {
	inner: Arc<MailboxInner<T>>,
}

/// Unbounded FIFO mailbox with latest-wins replacement.
///
/// [`MailboxSender::send`] appends to the backlog. [`MailboxSender::send_latest`]
/// drops the whole backlog and leaves a single message that the receiver
/// will not take before its deadline. A replacement arriving while the
/// receiver waits for that deadline supersedes the held message.
pub struct Mailbox<T> {
	inner: Arc<MailboxInner<T>>,
}

impl<T> Clone for MailboxSender<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> Default for Mailbox<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> Mailbox<T> {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(MailboxInner {
				state: Mutex::new(MailboxState {
					queue: VecDeque::new(),
					closed: false,
				}),
				notify_recv: Notify::new(),
			}),
		}
	}

	/// Returns a sender handle.
	pub fn sender(&self) -> MailboxSender<T> {
		MailboxSender {
			inner: Arc::clone(&self.inner),
		}
	}

	/// Returns the receiver handle.
	pub fn receiver(&self) -> MailboxReceiver<T> {
		MailboxReceiver {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> MailboxSender<T> {
	/// Requests mailbox closure. The receiver drains held messages, ignoring
	/// their deadlines, then returns `None`.
	pub async fn close(&self) {
		let mut state = self.inner.state.lock().await;
		state.closed = true;
		drop(state);
		self.inner.notify_recv.notify_one();
	}

	/// Appends a message to the backlog.
	pub async fn send(&self, msg: T) -> Result<MailboxSendOutcome, MailboxSendError> {
		let mut state = self.inner.state.lock().await;
		if state.closed {
			return Err(MailboxSendError::Closed);
		}
		state.queue.push_back(Envelope { msg, not_before: None });
		drop(state);
		self.inner.notify_recv.notify_one();
		Ok(MailboxSendOutcome::Enqueued)
	}

	/// Replaces the backlog with `msg`, deliverable no earlier than `not_before`.
	pub async fn send_latest(&self, msg: T, not_before: Instant) -> Result<MailboxSendOutcome, MailboxSendError> {
		let mut state = self.inner.state.lock().await;
		if state.closed {
			return Err(MailboxSendError::Closed);
		}
		let replaced = state.queue.len();
		state.queue.clear();
		state.queue.push_back(Envelope {
			msg,
			not_before: Some(not_before),
		});
		drop(state);
		self.inner.notify_recv.notify_one();
		if replaced == 0 {
			Ok(MailboxSendOutcome::Enqueued)
		} else {
			Ok(MailboxSendOutcome::Coalesced { replaced })
		}
	}
}

impl<T> MailboxReceiver<T> {
	/// Receives one message. Returns `None` once the mailbox is closed and drained.
	pub async fn recv(&self) -> Option<T> {
		loop {
			let notified = self.inner.notify_recv.notified();
			let mut state = self.inner.state.lock().await;
			let due = match state.queue.front() {
				Some(envelope) => match envelope.not_before {
					Some(deadline) if !state.closed && deadline > Instant::now() => Some(deadline),
					_ => None,
				},
				None if state.closed => return None,
				None => {
					drop(state);
					notified.await;
					continue;
				}
			};

			match due {
				None => {
					let envelope = state.queue.pop_front()?;
					return Some(envelope.msg);
				}
				Some(deadline) => {
					drop(state);
					tokio::select! {
						_ = notified => {}
						_ = tokio::time::sleep_until(deadline) => {}
					}
				}
			}
		}
	}
}
