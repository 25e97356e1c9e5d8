//! Selection-change arbitration.
//!
//! [`EventDispatcher`] owns a one-task actor fed by a [`Mailbox`]. Events that
//! arrive inside the debounce window of the last accepted event replace the
//! whole backlog and are held until the window closes; other events join the
//! FIFO backlog. The actor runs one pass at a time: it captures a
//! [`StateSnapshot`], then asks registered handlers in priority order whether
//! they claim the event. The first claim ends the pass. A fallback handler at
//! the lowest priority tears the chain down when nobody else claims it.
//!
//! Each handler runs in its own task so a panic is contained to that handler.
//! The whole pass is bounded by the processing timeout; on expiry the running
//! handler is aborted and the event abandoned.

mod event;
mod fallback;
mod handler;
mod typing;

use std::sync::Arc;
use std::time::Duration;

use nextedit_worker::{
	Mailbox, MailboxReceiver, MailboxSendError, MailboxSendOutcome, MailboxSender, TaskClass, WorkGate,
	join_error_panic_message, spawn,
};
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tokio_util::task::AbortOnDropHandle;

pub use self::event::{ChainStateProbe, NoChainState, SelectionChangeEvent, StateSnapshot};
pub use self::fallback::FallbackHandler;
pub use self::handler::{HandlerPriority, ListenerHandle, SelectionHandler, handler_fn};
use self::handler::{HandlerRegistry, Registration};
pub use self::typing::{TypingSessionHandler, TypingSessionTracker};
use crate::config::ArbiterConfig;
use crate::error::HandlerError;

/// What happened to an event handed to [`EventDispatcher::handle_selection_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
	/// Nothing else was pending; the event is processed next.
	Accepted,
	/// Appended behind a running pass or earlier backlog.
	Queued,
	/// Inside the debounce window with nothing pending; held until the window closes.
	Deferred,
	/// Inside the debounce window; replaced pending events.
	Coalesced,
	/// The dispatcher was shut down.
	Closed,
}

/// Counters describing dispatcher activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
	/// Processing passes started.
	pub passes: u64,
	/// Pending events dropped by debounce replacement.
	pub coalesced: u64,
	/// Events queued behind other work.
	pub queued: u64,
	/// Passes abandoned at the processing timeout.
	pub timeouts: u64,
	/// Handler errors and panics.
	pub handler_faults: u64,
	/// Passes claimed by a fallback-priority handler.
	pub fallbacks: u64,
}

/// How a single pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PassOutcome {
	Claimed { handler: Arc<str>, priority: HandlerPriority },
	Unclaimed,
}

/// State shared between the dispatcher handle and its actor.
struct Pipeline {
	processing_timeout: Duration,
	registry: Arc<RwLock<HandlerRegistry>>,
	typing: TypingSessionTracker,
	probe: Arc<dyn ChainStateProbe>,
	gate: WorkGate,
	stats: Mutex<DispatchStats>,
}

struct Shared {
	pipeline: Arc<Pipeline>,
	tx: MailboxSender<SelectionChangeEvent>,
	debounce: Duration,
	last_event_at: Mutex<Option<Instant>>,
	actor: Mutex<Option<AbortOnDropHandle<()>>>,
}

/// Serializes selection-change processing for one session.
#[derive(Clone)]
pub struct EventDispatcher {
	shared: Arc<Shared>,
}

impl EventDispatcher {
	/// Starts the dispatcher actor. Must be called from within a tokio runtime.
	pub fn spawn(config: &ArbiterConfig, probe: Arc<dyn ChainStateProbe>) -> Self {
		let pipeline = Arc::new(Pipeline {
			processing_timeout: config.processing_timeout(),
			registry: Arc::new(RwLock::new(HandlerRegistry::default())),
			typing: TypingSessionTracker::new(config.typing_session_timeout()),
			probe,
			gate: WorkGate::new(),
			stats: Mutex::new(DispatchStats::default()),
		});

		let mailbox = Mailbox::new();
		let actor = spawn(TaskClass::Interactive, run_actor(Arc::clone(&pipeline), mailbox.receiver()));
		tracing::debug!(
			debounce_ms = config.debounce_ms,
			timeout_ms = config.processing_timeout_ms,
			"dispatch.started"
		);

		Self {
			shared: Arc::new(Shared {
				pipeline,
				tx: mailbox.sender(),
				debounce: config.debounce(),
				last_event_at: Mutex::new(None),
				actor: Mutex::new(Some(AbortOnDropHandle::new(actor))),
			}),
		}
	}

	/// Registers `handler` under `id`, replacing any handler with the same id.
	pub fn register_listener(
		&self,
		id: impl Into<Arc<str>>,
		priority: HandlerPriority,
		handler: Arc<dyn SelectionHandler>,
	) -> ListenerHandle {
		let id = id.into();
		let registry = &self.shared.pipeline.registry;
		let (token, replaced) = registry.write().register(Arc::clone(&id), priority, handler);
		tracing::debug!(handler = %id, priority = priority.as_str(), replaced, "dispatch.register");
		ListenerHandle::new(id, token, Arc::downgrade(registry))
	}

	/// Registered handler ids in dispatch order.
	pub fn listeners(&self) -> Vec<(Arc<str>, HandlerPriority)> {
		self.shared.pipeline.registry.read().ids()
	}

	/// Records a document edit for typing-session tracking.
	pub fn on_document_edited(&self) {
		self.shared.pipeline.typing.document_edited();
	}

	pub fn typing(&self) -> &TypingSessionTracker {
		&self.shared.pipeline.typing
	}

	/// Hands a selection change to the actor.
	///
	/// Events within the debounce window of the last accepted event replace
	/// everything pending. The window is measured from accepted events only,
	/// so a burst cannot extend it indefinitely.
	pub async fn handle_selection_change(&self, event: SelectionChangeEvent) -> DispatchOutcome {
		let shared = &self.shared;
		let gate = &shared.pipeline.gate;
		let now = Instant::now();

		let hold_until = {
			let mut last = shared.last_event_at.lock();
			match *last {
				Some(prev) if now.saturating_duration_since(prev) < shared.debounce => Some(prev + shared.debounce),
				_ => {
					*last = Some(now);
					None
				}
			}
		};

		let busy = gate.outstanding() > 0;
		gate.admit();
		let sent = match hold_until {
			Some(deadline) => shared.tx.send_latest(event, deadline).await,
			None => shared.tx.send(event).await,
		};

		match (sent, hold_until) {
			(Err(MailboxSendError::Closed), _) => {
				gate.discard(1);
				tracing::debug!("dispatch.closed");
				DispatchOutcome::Closed
			}
			(Ok(MailboxSendOutcome::Coalesced { replaced }), _) => {
				gate.discard(replaced);
				shared.pipeline.stats.lock().coalesced += replaced as u64;
				tracing::trace!(replaced, "dispatch.coalesced");
				DispatchOutcome::Coalesced
			}
			(Ok(MailboxSendOutcome::Enqueued), Some(_)) => {
				tracing::trace!("dispatch.deferred");
				DispatchOutcome::Deferred
			}
			(Ok(MailboxSendOutcome::Enqueued), None) if busy => {
				shared.pipeline.stats.lock().queued += 1;
				tracing::trace!("dispatch.queued");
				DispatchOutcome::Queued
			}
			(Ok(MailboxSendOutcome::Enqueued), None) => DispatchOutcome::Accepted,
		}
	}

	/// True while a pass is running.
	pub fn is_processing(&self) -> bool {
		self.shared.pipeline.gate.is_active()
	}

	pub fn stats(&self) -> DispatchStats {
		*self.shared.pipeline.stats.lock()
	}

	/// Waits until every accepted event has been processed or dropped.
	pub async fn idle(&self) {
		self.shared.pipeline.gate.wait_idle().await;
	}

	/// Stops accepting events, drains what is pending and joins the actor.
	pub async fn shutdown(&self) {
		self.shared.tx.close().await;
		let actor = self.shared.actor.lock().take();
		if let Some(actor) = actor
			&& let Err(err) = actor.await
		{
			match join_error_panic_message(err) {
				Some(msg) => tracing::error!(panic = %msg, "dispatch.actor_panicked"),
				None => tracing::debug!("dispatch.actor_cancelled"),
			}
		}
		tracing::debug!("dispatch.stopped");
	}
}

async fn run_actor(pipeline: Arc<Pipeline>, rx: MailboxReceiver<SelectionChangeEvent>) {
	while let Some(event) = rx.recv().await {
		let _pass = pipeline.gate.begin();
		pipeline.process_with_timeout(event).await;
	}
}

impl Pipeline {
	async fn process_with_timeout(&self, event: SelectionChangeEvent) {
		let document = event.document.clone();
		let started = Instant::now();
		self.stats.lock().passes += 1;

		match tokio::time::timeout(self.processing_timeout, self.process_event(event)).await {
			Ok(PassOutcome::Claimed { handler, priority }) => {
				if priority == HandlerPriority::Fallback {
					self.stats.lock().fallbacks += 1;
				}
				tracing::trace!(
					document = %document,
					handler = %handler,
					elapsed_ms = started.elapsed().as_millis() as u64,
					"dispatch.pass"
				);
			}
			Ok(PassOutcome::Unclaimed) => {
				tracing::debug!(document = %document, "dispatch.unclaimed");
			}
			Err(_) => {
				self.stats.lock().timeouts += 1;
				tracing::error!(
					document = %document,
					timeout_ms = self.processing_timeout.as_millis() as u64,
					"dispatch.timeout"
				);
			}
		}
	}

	async fn process_event(&self, event: SelectionChangeEvent) -> PassOutcome {
		let snapshot = Arc::new(self.capture_snapshot(&event));
		let event = Arc::new(event);
		let handlers = self.registry.read().ordered();

		for registration in handlers {
			match run_handler(&registration, &event, &snapshot).await {
				Ok(true) => {
					return PassOutcome::Claimed {
						handler: registration.id,
						priority: registration.priority,
					};
				}
				Ok(false) => {}
				Err(HandlerError::Panicked(msg)) => {
					self.stats.lock().handler_faults += 1;
					tracing::error!(handler = %registration.id, panic = %msg, "dispatch.handler_panicked");
				}
				Err(err) => {
					self.stats.lock().handler_faults += 1;
					tracing::warn!(handler = %registration.id, error = %err, "dispatch.handler_failed");
				}
			}
		}
		PassOutcome::Unclaimed
	}

	fn capture_snapshot(&self, event: &SelectionChangeEvent) -> StateSnapshot {
		StateSnapshot {
			suggestion_window_accepted: self.probe.suggestion_window_accepted(),
			jump_in_progress: self.probe.jump_in_progress(),
			jump_just_accepted: self.probe.jump_just_accepted(),
			last_document_change: self.typing.last_change(),
			is_typing_session: self.typing.is_typing(),
			document: event.document.clone(),
			cursor: event.cursor(),
		}
	}
}

async fn run_handler(
	registration: &Registration,
	event: &Arc<SelectionChangeEvent>,
	snapshot: &Arc<StateSnapshot>,
) -> Result<bool, HandlerError> {
	let handler = Arc::clone(&registration.handler);
	let event = Arc::clone(event);
	let snapshot = Arc::clone(snapshot);
	// Dropping the handle (pass timeout) aborts the handler task.
	let task = AbortOnDropHandle::new(spawn(TaskClass::Interactive, async move {
		handler.handle(&event, &snapshot).await
	}));

	match task.await {
		Ok(result) => result,
		Err(err) => Err(HandlerError::Panicked(
			join_error_panic_message(err).unwrap_or_else(|| "handler task cancelled".to_string()),
		)),
	}
}

#[cfg(test)]
mod tests;
