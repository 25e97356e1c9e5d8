use nextedit_primitives::{DocumentId, Position, Selection};
use tokio::time::Instant;

/// A selection change reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChangeEvent {
	/// Document whose selections changed.
	pub document: DocumentId,
	/// Selections after the change, primary first.
	pub selections: Vec<Selection>,
}

impl SelectionChangeEvent {
	pub fn new(document: impl Into<DocumentId>, selections: Vec<Selection>) -> Self {
		Self {
			document: document.into(),
			selections,
		}
	}

	/// Single collapsed cursor at `position`.
	pub fn cursor_at(document: impl Into<DocumentId>, position: Position) -> Self {
		Self::new(document, vec![Selection::cursor(position)])
	}

	pub fn primary(&self) -> Option<&Selection> {
		self.selections.first()
	}

	/// Active end of the primary selection.
	pub fn cursor(&self) -> Option<Position> {
		self.primary().map(|sel| sel.active)
	}

	/// Anchor of the primary selection.
	pub fn anchor(&self) -> Option<Position> {
		self.primary().map(|sel| sel.anchor)
	}
}

/// Chain state captured once at the start of a processing pass.
///
/// Handlers vote on this snapshot rather than live state, so a handler's own
/// side effects cannot change what later handlers see in the same pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
	/// The suggestion window's own accept caused this move.
	pub suggestion_window_accepted: bool,
	/// A jump suggestion is visible.
	pub jump_in_progress: bool,
	/// A jump was accepted within the grace window.
	pub jump_just_accepted: bool,
	/// When the document was last edited.
	pub last_document_change: Option<Instant>,
	/// An edit happened within the typing quiet period.
	pub is_typing_session: bool,
	pub document: DocumentId,
	/// Active end of the primary selection.
	pub cursor: Option<Position>,
}

/// Live chain state read when a snapshot is captured.
pub trait ChainStateProbe: Send + Sync {
	fn suggestion_window_accepted(&self) -> bool;
	fn jump_in_progress(&self) -> bool;
	fn jump_just_accepted(&self) -> bool;
}

/// Probe for a dispatcher with no presenter or jump coordinator attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChainState;

impl ChainStateProbe for NoChainState {
	fn suggestion_window_accepted(&self) -> bool {
		false
	}

	fn jump_in_progress(&self) -> bool {
		false
	}

	fn jump_just_accepted(&self) -> bool {
		false
	}
}
