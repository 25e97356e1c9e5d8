//! Capability traits for the host editor and the external collaborators.
//!
//! Each trait covers one category of host functionality so components can
//! depend on exactly what they call:
//!
//! - [`DocumentAccess`] - content, line and version reads
//! - [`ViewportAccess`] - active document, visible lines, reveal
//! - [`CursorAccess`] - programmatic cursor moves
//! - [`DecorationAccess`] - the transient jump indicator
//! - [`BindingAccess`] - transient accept/reject key bindings
//! - [`ContextAccess`] - boolean context flags gating key bindings
//! - [`SuggestTrigger`] - re-requesting inline suggestions
//!
//! [`HostEditor`] bundles all of them and is blanket-implemented.
//!
//! The collaborators outside the host are [`SuggestionEngine`],
//! [`EditableRegionCalculator`], [`PrefetchQueue`] and [`SuggestionWindow`].

use async_trait::async_trait;
use nextedit_primitives::{DocumentId, DocumentVersion, LineSpan, Position, TextRange};
use serde::{Deserialize, Serialize};

use crate::error::HostResult;

/// Document content reads.
#[async_trait]
pub trait DocumentAccess: Send + Sync {
	/// Returns the document's current version.
	async fn version(&self, document: &DocumentId) -> HostResult<DocumentVersion>;
	/// Returns the number of lines in the document.
	async fn line_count(&self, document: &DocumentId) -> HostResult<u32>;
	/// Returns the text of one line without its terminator.
	async fn line_text(&self, document: &DocumentId, line: u32) -> HostResult<String>;
	/// Returns the text covered by `range`, lines joined with `\n`.
	async fn text_in_range(&self, document: &DocumentId, range: TextRange) -> HostResult<String>;
}

/// How a revealed range should be positioned in the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealMode {
	/// Scroll as little as possible.
	Minimal,
	/// Put the range in the middle of the viewport.
	Center,
}

/// Viewport queries and scrolling.
#[async_trait]
pub trait ViewportAccess: Send + Sync {
	/// Returns the document in the focused editor, if any.
	async fn active_document(&self) -> Option<DocumentId>;
	/// Returns the span of lines currently visible, if the editor has a viewport.
	async fn visible_lines(&self, document: &DocumentId) -> HostResult<Option<LineSpan>>;
	/// Scrolls so that `range` is visible.
	async fn reveal(&self, document: &DocumentId, range: TextRange, mode: RevealMode) -> HostResult<()>;
}

/// Programmatic cursor moves.
#[async_trait]
pub trait CursorAccess: Send + Sync {
	/// Collapses the selection to `position`.
	async fn set_cursor(&self, document: &DocumentId, position: Position) -> HostResult<()>;
}

/// Handle to a rendered indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorId(pub u64);

/// Transient decoration rendering.
#[async_trait]
pub trait DecorationAccess: Send + Sync {
	/// Renders the jump indicator on `line` pointing at `target`.
	async fn show_jump_indicator(&self, document: &DocumentId, line: u32, target: Position) -> HostResult<IndicatorId>;
	/// Removes a previously rendered indicator.
	async fn clear_indicator(&self, indicator: IndicatorId) -> HostResult<()>;
}

/// Commands that transient bindings route back to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientCommand {
	/// Accept the visible jump suggestion.
	AcceptJump,
	/// Dismiss the visible jump suggestion.
	RejectJump,
}

/// Handle to a registered transient binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingId(pub u64);

/// Transient key-binding registration.
///
/// The host routes the bound key to the matching session call
/// (for example [`crate::JumpCoordinator::accept_jump`]).
#[async_trait]
pub trait BindingAccess: Send + Sync {
	/// Registers a binding for `command`.
	async fn bind_transient(&self, command: TransientCommand) -> HostResult<BindingId>;
	/// Disposes a binding.
	async fn unbind(&self, binding: BindingId) -> HostResult<()>;
}

/// Boolean context keys consulted by host key-binding predicates.
#[async_trait]
pub trait ContextAccess: Send + Sync {
	/// Sets context key `key` to `value`.
	async fn set_context_flag(&self, key: &str, value: bool) -> HostResult<()>;
}

/// Re-requests inline suggestions at the cursor.
#[async_trait]
pub trait SuggestTrigger: Send + Sync {
	async fn trigger_inline_suggest(&self) -> HostResult<()>;
}

/// Everything the session needs from the host editor.
pub trait HostEditor:
	DocumentAccess + ViewportAccess + CursorAccess + DecorationAccess + BindingAccess + ContextAccess + SuggestTrigger
{
}

impl<T> HostEditor for T where
	T: DocumentAccess + ViewportAccess + CursorAccess + DecorationAccess + BindingAccess + ContextAccess + SuggestTrigger
{
}

/// Completion shown once an accepted jump lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionAfterJump {
	/// Completion text to present.
	pub completion: String,
	/// Range the completion replaces.
	pub range: TextRange,
}

/// The multi-step suggestion pipeline.
#[async_trait]
pub trait SuggestionEngine: Send + Sync {
	/// Invalidates the in-flight edit chain.
	async fn delete_chain(&self) -> HostResult<()>;
	/// Presents a completion queued by [`crate::JumpCoordinator::set_completion_after_jump`].
	async fn show_after_jump(&self, completion: CompletionAfterJump) -> HostResult<()>;
}

/// Strategy used to pick the next editable region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionStrategy {
	/// Fixed window around the cursor.
	#[default]
	Static,
	/// Window that follows recent edits.
	Sliding,
}

/// Parameters for an editable-region request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRequest {
	pub document: DocumentId,
	/// Anchor of the primary selection.
	pub cursor: Position,
}

/// A document region eligible for the next suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditableRegion {
	pub document: DocumentId,
	pub range: TextRange,
}

/// Computes where the next suggestion may edit.
#[async_trait]
pub trait EditableRegionCalculator: Send + Sync {
	async fn next_editable_region(&self, strategy: RegionStrategy, request: &RegionRequest) -> HostResult<Vec<EditableRegion>>;
}

/// Background queue of regions awaiting suggestion generation.
#[async_trait]
pub trait PrefetchQueue: Send + Sync {
	async fn enqueue_unprocessed(&self, region: EditableRegion) -> HostResult<()>;
}

/// State published by the suggestion-window presenter.
pub trait SuggestionWindow: Send + Sync {
	/// True while the cursor move following a window accept is pending.
	fn has_accepted(&self) -> bool;
}
