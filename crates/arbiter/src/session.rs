//! Session-scoped wiring of the arbitration components.

use std::sync::Arc;

use async_trait::async_trait;
use nextedit_primitives::{DocumentId, Position};

use crate::config::ArbiterConfig;
use crate::dispatch::{
	ChainStateProbe, DispatchOutcome, EventDispatcher, FallbackHandler, HandlerPriority, ListenerHandle,
	SelectionChangeEvent, SelectionHandler, StateSnapshot, TypingSessionHandler,
};
use crate::error::HandlerError;
use crate::ghost::{GhostTextCorrelator, GhostTextHandler};
use crate::host::{EditableRegionCalculator, HostEditor, PrefetchQueue, SuggestionEngine, SuggestionWindow};
use crate::jump::JumpCoordinator;
use crate::reservation::KeyReservationArbiter;

/// Dispatcher ids of the built-in handlers.
pub mod handler_ids {
	pub const SUGGESTION_WINDOW: &str = "suggestion-window-accepted";
	pub const GHOST_TEXT: &str = "ghost-text";
	pub const TYPING_SESSION: &str = "typing-session";
	pub const FALLBACK: &str = "fallback";
	pub use crate::jump::JUMP_HANDLER_ID as JUMP;
}

/// External collaborators a session talks to.
#[derive(Clone)]
pub struct SessionDeps {
	pub host: Arc<dyn HostEditor>,
	pub engine: Arc<dyn SuggestionEngine>,
	pub regions: Arc<dyn EditableRegionCalculator>,
	pub prefetch: Arc<dyn PrefetchQueue>,
	pub window: Arc<dyn SuggestionWindow>,
}

struct SessionProbe {
	window: Arc<dyn SuggestionWindow>,
	jump: Arc<JumpCoordinator>,
}

impl ChainStateProbe for SessionProbe {
	fn suggestion_window_accepted(&self) -> bool {
		self.window.has_accepted()
	}

	fn jump_in_progress(&self) -> bool {
		self.jump.jump_in_progress()
	}

	fn jump_just_accepted(&self) -> bool {
		self.jump.jump_just_accepted()
	}
}

/// Claims the cursor move caused by accepting from the suggestion window.
struct SuggestionWindowHandler;

#[async_trait]
impl SelectionHandler for SuggestionWindowHandler {
	async fn handle(&self, _event: &SelectionChangeEvent, snapshot: &StateSnapshot) -> Result<bool, HandlerError> {
		Ok(snapshot.suggestion_window_accepted)
	}
}

/// One edit session: the dispatcher and the components voting in it.
pub struct EditSession {
	config: ArbiterConfig,
	dispatcher: EventDispatcher,
	jump: Arc<JumpCoordinator>,
	ghost: Arc<GhostTextCorrelator>,
	reservation: Arc<KeyReservationArbiter>,
	listeners: Vec<ListenerHandle>,
}

impl EditSession {
	/// Builds the session and registers the built-in handlers.
	///
	/// Must be called from within a tokio runtime.
	pub fn start(config: ArbiterConfig, deps: SessionDeps) -> Self {
		let jump = Arc::new(JumpCoordinator::new(
			Arc::clone(&deps.host),
			Arc::clone(&deps.engine),
			config.jump_indicator_flag.as_str(),
			config.jump_accept_grace(),
		));
		let ghost = Arc::new(GhostTextCorrelator::new(deps.host.clone()));
		let reservation = Arc::new(KeyReservationArbiter::new(deps.host.clone(), config.exclusivity_flag.as_str()));

		let probe = Arc::new(SessionProbe {
			window: Arc::clone(&deps.window),
			jump: Arc::clone(&jump),
		});
		let dispatcher = EventDispatcher::spawn(&config, probe);

		let fallback = FallbackHandler::new(
			deps.engine,
			deps.regions,
			deps.prefetch,
			config.editable_region_strategy,
			config.full_file_diff,
		);
		let listeners = vec![
			dispatcher.register_listener(
				handler_ids::SUGGESTION_WINDOW,
				HandlerPriority::Critical,
				Arc::new(SuggestionWindowHandler),
			),
			dispatcher.register_listener(
				handler_ids::GHOST_TEXT,
				HandlerPriority::High,
				Arc::new(GhostTextHandler::new(Arc::clone(&ghost))),
			),
			dispatcher.register_listener(
				handler_ids::TYPING_SESSION,
				HandlerPriority::Normal,
				Arc::new(TypingSessionHandler),
			),
			dispatcher.register_listener(handler_ids::FALLBACK, HandlerPriority::Fallback, Arc::new(fallback)),
		];
		jump.attach(&dispatcher);

		tracing::info!(
			debounce_ms = config.debounce_ms,
			full_file_diff = config.full_file_diff,
			"session.started"
		);
		Self {
			config,
			dispatcher,
			jump,
			ghost,
			reservation,
			listeners,
		}
	}

	/// Routes a host selection change.
	///
	/// A visible jump is rejected first if the cursor left both of its
	/// positions; the event is then handed to the dispatcher.
	pub async fn on_selection_change(&self, event: SelectionChangeEvent) -> DispatchOutcome {
		if let Some(cursor) = event.cursor() {
			self.jump.observe_cursor(&event.document, cursor).await;
		}
		self.dispatcher.handle_selection_change(event).await
	}

	/// Routes a host document edit.
	pub fn on_document_edited(&self) {
		self.dispatcher.on_document_edited();
	}

	/// Records the ghost text just shown so its acceptance is recognised.
	pub async fn expect_ghost_text(&self, document: DocumentId, text: &str, start: Position) -> bool {
		match self.ghost.set_expected_acceptance(document, text, start).await {
			Ok(()) => true,
			Err(err) => {
				tracing::warn!(error = %err, "session.ghost_expectation_failed");
				false
			}
		}
	}

	pub fn config(&self) -> &ArbiterConfig {
		&self.config
	}

	pub fn dispatcher(&self) -> &EventDispatcher {
		&self.dispatcher
	}

	pub fn jump(&self) -> &Arc<JumpCoordinator> {
		&self.jump
	}

	pub fn ghost(&self) -> &Arc<GhostTextCorrelator> {
		&self.ghost
	}

	pub fn reservation(&self) -> &Arc<KeyReservationArbiter> {
		&self.reservation
	}

	/// Ids of the built-in handlers registered at start.
	pub fn builtin_handlers(&self) -> impl Iterator<Item = &str> {
		self.listeners.iter().map(ListenerHandle::id)
	}

	/// Drains pending events and stops the dispatcher.
	pub async fn shutdown(&self) {
		self.dispatcher.shutdown().await;
		tracing::info!(stats = ?self.dispatcher.stats(), "session.stopped");
	}
}
