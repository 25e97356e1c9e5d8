//! Worker primitives for the next-edit arbiter.
//!
//! * [`spawn`] tags every task with a [`TaskClass`] for tracing.
//! * [`Mailbox`] is the single-consumer queue behind the dispatcher actor. It
//!   keeps a FIFO backlog and supports latest-wins replacement with a
//!   not-before deadline, which is how debounce windows are expressed.
//! * [`FencingClock`] hands out monotonically increasing sequence numbers so
//!   racing async calls can be committed in issue order.
//! * [`WorkGate`] counts admitted work and exposes an idle wait.

mod class;
mod gate;
mod mailbox;
mod spawn;
mod token;

pub use class::TaskClass;
pub use gate::{PassGuard, WorkGate};
pub use mailbox::{Mailbox, MailboxReceiver, MailboxSendError, MailboxSendOutcome, MailboxSender};
pub use spawn::spawn;
pub use token::FencingClock;

/// Extracts the panic message from a [`tokio::task::JoinError`].
///
/// Returns `None` when the task was cancelled rather than panicking.
pub fn join_error_panic_message(err: tokio::task::JoinError) -> Option<String> {
	let payload = err.try_into_panic().ok()?;
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		return Some((*msg).to_string());
	}
	if let Some(msg) = payload.downcast_ref::<String>() {
		return Some(msg.clone());
	}
	Some("non-string panic payload".to_string())
}

#[cfg(test)]
mod panic_tests;
