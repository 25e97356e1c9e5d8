//! Cross-viewport jump prompts.
//!
//! When the next suggested edit lies away from the cursor, the session offers a
//! jump instead of showing the edit in place. [`JumpCoordinator::suggest_jump`]
//! skips the prompt if the document already holds the suggested text, draws an
//! indicator at the target (clamped to the viewport edge when the target is
//! off screen) and binds transient accept/reject keys.
//!
//! State machine: `Idle -> Suggested -> {Accepted | Rejected | Superseded} -> Idle`.
//! A selection change while a jump is suggested, or shortly after one was
//! accepted, is claimed by the coordinator's dispatcher handler so the chain
//! survives the programmatic cursor move.

mod placement;

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use nextedit_primitives::{DocumentId, Position, TextRange};
use nextedit_worker::{TaskClass, spawn};
use parking_lot::Mutex;
use tokio_util::task::AbortOnDropHandle;

pub use self::placement::{IndicatorPlacement, place_indicator};
use crate::dispatch::{EventDispatcher, HandlerPriority, ListenerHandle, SelectionChangeEvent, SelectionHandler, StateSnapshot};
use crate::error::HandlerError;
use crate::host::{BindingId, CompletionAfterJump, HostEditor, IndicatorId, RevealMode, SuggestionEngine, TransientCommand};

/// Dispatcher id of the jump handler.
pub const JUMP_HANDLER_ID: &str = "jump";

/// A jump offered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpSuggestion {
	pub document: DocumentId,
	/// Cursor position when the jump was offered.
	pub current: Position,
	pub target: Position,
	/// Text the edit would produce at the target, used for deduplication.
	pub completion: Option<String>,
}

/// Coarse jump state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpPhase {
	Idle,
	/// An indicator is being rendered.
	Rendering,
	Suggested,
}

struct Visible {
	suggestion: JumpSuggestion,
	indicator: IndicatorId,
	bindings: Vec<BindingId>,
}

#[derive(Default)]
struct JumpState {
	visible: Option<Visible>,
	rendering: bool,
	generation: u64,
	just_accepted: bool,
	accept_epoch: u64,
	grace_timer: Option<AbortOnDropHandle<()>>,
	completion_after_jump: Option<CompletionAfterJump>,
}

/// Offers, accepts and rejects jump suggestions for one session.
pub struct JumpCoordinator {
	host: Arc<dyn HostEditor>,
	engine: Arc<dyn SuggestionEngine>,
	indicator_flag: Arc<str>,
	accept_grace: Duration,
	state: Arc<Mutex<JumpState>>,
	listener: OnceLock<ListenerHandle>,
}

impl JumpCoordinator {
	pub fn new(
		host: Arc<dyn HostEditor>,
		engine: Arc<dyn SuggestionEngine>,
		indicator_flag: impl Into<Arc<str>>,
		accept_grace: Duration,
	) -> Self {
		Self {
			host,
			engine,
			indicator_flag: indicator_flag.into(),
			accept_grace,
			state: Arc::new(Mutex::new(JumpState::default())),
			listener: OnceLock::new(),
		}
	}

	/// Registers the jump handler with `dispatcher`. Later calls are no-ops.
	pub fn attach(&self, dispatcher: &EventDispatcher) {
		self.listener.get_or_init(|| {
			let handler = Arc::new(JumpHandler);
			dispatcher.register_listener(JUMP_HANDLER_ID, HandlerPriority::High, handler)
		});
	}

	pub fn phase(&self) -> JumpPhase {
		let state = self.state.lock();
		if state.visible.is_some() {
			JumpPhase::Suggested
		} else if state.rendering {
			JumpPhase::Rendering
		} else {
			JumpPhase::Idle
		}
	}

	/// True while a jump is being rendered or awaits a decision.
	pub fn jump_in_progress(&self) -> bool {
		let state = self.state.lock();
		state.rendering || state.visible.is_some()
	}

	/// True within the grace window after an accept.
	pub fn jump_just_accepted(&self) -> bool {
		self.state.lock().just_accepted
	}

	pub fn current_suggestion(&self) -> Option<JumpSuggestion> {
		self.state.lock().visible.as_ref().map(|visible| visible.suggestion.clone())
	}

	/// Queues a completion to present once the next jump is accepted.
	pub fn set_completion_after_jump(&self, completion: CompletionAfterJump) {
		self.state.lock().completion_after_jump = Some(completion);
	}

	/// Offers a jump from `current` to `target` in the active document.
	///
	/// Returns false when no prompt was shown: the document already contains
	/// `completion` at the target, there is no active document, or rendering
	/// failed.
	pub async fn suggest_jump(&self, current: Position, target: Position, completion: Option<&str>) -> bool {
		let Some(document) = self.host.active_document().await else {
			tracing::debug!("jump.no_active_document");
			return false;
		};

		if let Some(text) = completion
			&& self.content_matches(&document, target.line, text).await
		{
			tracing::debug!(document = %document, line = target.line, "jump.duplicate");
			return false;
		}

		let (generation, previous) = {
			let mut state = self.state.lock();
			state.generation += 1;
			state.rendering = true;
			(state.generation, state.visible.take())
		};
		if let Some(previous) = previous {
			tracing::debug!(document = %previous.suggestion.document, "jump.superseded");
			self.dismiss(previous, false).await;
		}

		let viewport = match self.host.visible_lines(&document).await {
			Ok(viewport) => viewport,
			Err(err) => {
				tracing::warn!(document = %document, error = %err, "jump.viewport_read_failed");
				None
			}
		};
		let placement = place_indicator(target.line, viewport);

		let indicator = match self.host.show_jump_indicator(&document, placement.line(), target).await {
			Ok(indicator) => indicator,
			Err(err) => {
				tracing::warn!(document = %document, error = %err, "jump.render_failed");
				self.finish_rendering(generation);
				return false;
			}
		};

		if placement.needs_reveal()
			&& let Err(err) = self.host.reveal(&document, TextRange::point(target), RevealMode::Minimal).await
		{
			tracing::warn!(document = %document, error = %err, "jump.reveal_failed");
		}

		let mut bindings = Vec::with_capacity(2);
		for command in [TransientCommand::AcceptJump, TransientCommand::RejectJump] {
			match self.host.bind_transient(command).await {
				Ok(binding) => bindings.push(binding),
				Err(err) => {
					tracing::warn!(error = %err, ?command, "jump.bind_failed");
					self.release(indicator, &bindings, false).await;
					self.finish_rendering(generation);
					return false;
				}
			}
		}
		if let Err(err) = self.host.set_context_flag(&self.indicator_flag, true).await {
			tracing::warn!(flag = %self.indicator_flag, error = %err, "jump.flag_failed");
		}

		let visible = Visible {
			suggestion: JumpSuggestion {
				document: document.clone(),
				current,
				target,
				completion: completion.map(str::to_string),
			},
			indicator,
			bindings,
		};

		let stale = {
			let mut state = self.state.lock();
			if state.generation == generation {
				state.rendering = false;
				state.visible = Some(visible);
				None
			} else {
				Some(visible)
			}
		};
		if let Some(stale) = stale {
			tracing::debug!(document = %document, "jump.render_overtaken");
			self.dismiss(stale, false).await;
			return false;
		}

		tracing::debug!(
			document = %document,
			target_line = target.line,
			indicator_line = placement.line(),
			?placement,
			"jump.suggested"
		);
		true
	}

	/// Moves the cursor to the suggested target.
	///
	/// Returns false when no jump is suggested.
	pub async fn accept_jump(&self) -> bool {
		let (visible, completion, epoch) = {
			let mut state = self.state.lock();
			let Some(visible) = state.visible.take() else {
				return false;
			};
			state.generation += 1;
			state.just_accepted = true;
			state.accept_epoch += 1;
			(visible, state.completion_after_jump.take(), state.accept_epoch)
		};
		self.schedule_grace_reset(epoch);

		let document = visible.suggestion.document.clone();
		let target = visible.suggestion.target;
		if let Err(err) = self.host.set_cursor(&document, target).await {
			tracing::warn!(document = %document, error = %err, "jump.move_failed");
		}
		if let Err(err) = self.host.reveal(&document, TextRange::point(target), RevealMode::Center).await {
			tracing::warn!(document = %document, error = %err, "jump.reveal_failed");
		}
		self.dismiss(visible, true).await;

		if let Err(err) = self.host.trigger_inline_suggest().await {
			tracing::warn!(error = %err, "jump.trigger_failed");
		}
		if let Some(completion) = completion
			&& let Err(err) = self.engine.show_after_jump(completion).await
		{
			tracing::warn!(error = %err, "jump.show_after_jump_failed");
		}

		tracing::debug!(document = %document, line = target.line, "jump.accepted");
		true
	}

	/// Dismisses the suggested jump and tears the chain down.
	///
	/// Returns false when no jump is suggested.
	pub async fn reject_jump(&self) -> bool {
		let visible = {
			let mut state = self.state.lock();
			let Some(visible) = state.visible.take() else {
				return false;
			};
			state.generation += 1;
			state.completion_after_jump = None;
			visible
		};
		let document = visible.suggestion.document.clone();
		self.dismiss(visible, true).await;

		if let Err(err) = self.engine.delete_chain().await {
			tracing::warn!(error = %err, "jump.delete_chain_failed");
		}
		tracing::debug!(document = %document, "jump.rejected");
		true
	}

	/// Rejects the suggested jump when the cursor in its document moves
	/// somewhere other than the starting or target position.
	///
	/// Returns true if the jump was rejected.
	pub async fn observe_cursor(&self, document: &DocumentId, position: Position) -> bool {
		let moved_away = {
			let state = self.state.lock();
			state.visible.as_ref().is_some_and(|visible| {
				let suggestion = &visible.suggestion;
				&suggestion.document == document && position != suggestion.current && position != suggestion.target
			})
		};
		if !moved_away {
			return false;
		}
		tracing::debug!(document = %document, line = position.line, "jump.cursor_moved_away");
		self.reject_jump().await
	}

	async fn content_matches(&self, document: &DocumentId, line: u32, text: &str) -> bool {
		let expected: Vec<&str> = text.split('\n').collect();
		let line_count = match self.host.line_count(document).await {
			Ok(count) => count as usize,
			Err(err) => {
				tracing::warn!(document = %document, error = %err, "jump.line_count_failed");
				return false;
			}
		};
		if line as usize + expected.len() > line_count {
			return false;
		}

		for (line, want) in (line..).zip(expected) {
			match self.host.line_text(document, line).await {
				Ok(actual) if actual == want => {}
				Ok(_) => return false,
				Err(err) => {
					tracing::warn!(document = %document, line, error = %err, "jump.line_read_failed");
					return false;
				}
			}
		}
		true
	}

	fn finish_rendering(&self, generation: u64) {
		let mut state = self.state.lock();
		if state.generation == generation {
			state.rendering = false;
		}
	}

	async fn dismiss(&self, visible: Visible, lower_flag: bool) {
		self.release(visible.indicator, &visible.bindings, lower_flag).await;
	}

	async fn release(&self, indicator: IndicatorId, bindings: &[BindingId], lower_flag: bool) {
		if let Err(err) = self.host.clear_indicator(indicator).await {
			tracing::warn!(error = %err, "jump.clear_failed");
		}
		for &binding in bindings {
			if let Err(err) = self.host.unbind(binding).await {
				tracing::warn!(error = %err, "jump.unbind_failed");
			}
		}
		if lower_flag && let Err(err) = self.host.set_context_flag(&self.indicator_flag, false).await {
			tracing::warn!(flag = %self.indicator_flag, error = %err, "jump.flag_failed");
		}
	}

	fn schedule_grace_reset(&self, epoch: u64) {
		let weak: Weak<Mutex<JumpState>> = Arc::downgrade(&self.state);
		let grace = self.accept_grace;
		let timer = spawn(TaskClass::Background, async move {
			tokio::time::sleep(grace).await;
			let Some(state) = weak.upgrade() else {
				return;
			};
			let mut state = state.lock();
			if state.accept_epoch == epoch {
				state.just_accepted = false;
				tracing::trace!(epoch, "jump.grace_elapsed");
			}
		});
		self.state.lock().grace_timer = Some(AbortOnDropHandle::new(timer));
	}
}

/// Claims selection changes while a jump is visible or was just accepted.
struct JumpHandler;

#[async_trait]
impl SelectionHandler for JumpHandler {
	async fn handle(&self, _event: &SelectionChangeEvent, snapshot: &StateSnapshot) -> Result<bool, HandlerError> {
		Ok(snapshot.jump_in_progress || snapshot.jump_just_accepted)
	}
}

#[cfg(test)]
mod tests;
