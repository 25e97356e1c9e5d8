//! In-memory host and collaborators.
//!
//! [`MemoryHost`] implements every host and collaborator trait over plain
//! in-memory documents and records each side-effecting call as a [`HostCall`].
//! Failures can be injected per [`FailPoint`], and context-flag updates can be
//! held open so tests (and the replay tool) control completion order.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use nextedit_primitives::{DocumentId, DocumentVersion, LineSpan, Position, TextRange};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::{HostError, HostResult};
use crate::host::{
	BindingAccess, BindingId, CompletionAfterJump, ContextAccess, CursorAccess, DecorationAccess, DocumentAccess,
	EditableRegion, EditableRegionCalculator, IndicatorId, PrefetchQueue, RegionRequest, RegionStrategy, RevealMode,
	SuggestTrigger, SuggestionEngine, SuggestionWindow, TransientCommand, ViewportAccess,
};

/// A side-effecting call observed by [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum HostCall {
	SetContextFlag { key: String, value: bool },
	ShowJumpIndicator { document: DocumentId, line: u32, target: Position },
	ClearIndicator { indicator: IndicatorId },
	Reveal { document: DocumentId, range: TextRange, mode: RevealMode },
	SetCursor { document: DocumentId, position: Position },
	BindTransient { command: TransientCommand },
	Unbind { binding: BindingId },
	TriggerInlineSuggest,
	DeleteChain,
	ShowAfterJump { completion: CompletionAfterJump },
	NextEditableRegion { strategy: RegionStrategy, request: RegionRequest },
	EnqueueUnprocessed { region: EditableRegion },
}

/// Calls that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
	ContextFlag,
	ShowIndicator,
	Reveal,
	ReadText,
	Version,
	DeleteChain,
	EditableRegion,
}

struct MemoryDocument {
	lines: Vec<String>,
	version: DocumentVersion,
}

impl MemoryDocument {
	fn new(text: &str) -> Self {
		Self {
			lines: text.split('\n').map(str::to_string).collect(),
			version: 1,
		}
	}

	fn char_to_byte(line: &str, character: u32) -> Option<usize> {
		let character = character as usize;
		if character == line.chars().count() {
			return Some(line.len());
		}
		line.char_indices().nth(character).map(|(idx, _)| idx)
	}

	fn text(&self) -> String {
		self.lines.join("\n")
	}

	fn offset(&self, pos: Position) -> Option<usize> {
		let line = self.lines.get(pos.line as usize)?;
		let column = Self::char_to_byte(line, pos.character)?;
		let preceding: usize = self.lines[..pos.line as usize].iter().map(|l| l.len() + 1).sum();
		Some(preceding + column)
	}

	fn slice(&self, range: TextRange) -> Option<String> {
		let start = self.offset(range.start)?;
		let end = self.offset(range.end)?;
		if start > end {
			return None;
		}
		Some(self.text()[start..end].to_string())
	}

	fn replace(&mut self, range: TextRange, replacement: &str) -> Option<()> {
		let start = self.offset(range.start)?;
		let end = self.offset(range.end)?;
		if start > end {
			return None;
		}
		let mut text = self.text();
		text.replace_range(start..end, replacement);
		self.lines = text.split('\n').map(str::to_string).collect();
		self.version += 1;
		Some(())
	}
}

struct HeldFlag {
	key: String,
	value: bool,
	release: oneshot::Sender<HostResult<()>>,
}

#[derive(Default)]
struct HostState {
	documents: HashMap<DocumentId, MemoryDocument>,
	active: Option<DocumentId>,
	viewport: Option<LineSpan>,
	cursor: Option<(DocumentId, Position)>,
	flags: HashMap<String, bool>,
	regions: Vec<EditableRegion>,
	failures: HashSet<FailPoint>,
	hold_flags: bool,
	held: Vec<Option<HeldFlag>>,
	calls: Vec<HostCall>,
}

/// In-memory [`crate::HostEditor`] plus every collaborator trait.
#[derive(Default)]
pub struct MemoryHost {
	state: Mutex<HostState>,
	next_handle: AtomicU64,
	window_accepted: AtomicBool,
}

impl MemoryHost {
	pub fn new() -> Self {
		Self::default()
	}

	/// Opens (or replaces) a document. The first opened document becomes active.
	pub fn open_document(&self, document: impl Into<DocumentId>, text: &str) {
		let document = document.into();
		let mut state = self.state.lock();
		if state.active.is_none() {
			state.active = Some(document.clone());
		}
		state.documents.insert(document, MemoryDocument::new(text));
	}

	/// Replaces `range` with `text` and bumps the version.
	pub fn edit(&self, document: &DocumentId, range: TextRange, text: &str) -> HostResult<DocumentVersion> {
		let mut state = self.state.lock();
		let doc = state
			.documents
			.get_mut(document)
			.ok_or_else(|| HostError::UnknownDocument(document.to_string()))?;
		doc.replace(range, text).ok_or(HostError::InvalidRange)?;
		Ok(doc.version)
	}

	/// Inserts `text` at `position` and bumps the version.
	pub fn insert(&self, document: &DocumentId, position: Position, text: &str) -> HostResult<DocumentVersion> {
		self.edit(document, TextRange::point(position), text)
	}

	pub fn document_text(&self, document: &DocumentId) -> Option<String> {
		self.state.lock().documents.get(document).map(MemoryDocument::text)
	}

	pub fn set_active(&self, document: impl Into<DocumentId>) {
		self.state.lock().active = Some(document.into());
	}

	pub fn set_viewport(&self, viewport: Option<LineSpan>) {
		self.state.lock().viewport = viewport;
	}

	/// Last cursor set through [`CursorAccess`].
	pub fn cursor(&self) -> Option<(DocumentId, Position)> {
		self.state.lock().cursor.clone()
	}

	/// Current value of a context flag, if it was ever set successfully.
	pub fn flag(&self, key: &str) -> Option<bool> {
		self.state.lock().flags.get(key).copied()
	}

	/// Regions returned by the editable-region calculator.
	pub fn set_regions(&self, regions: Vec<EditableRegion>) {
		self.state.lock().regions = regions;
	}

	pub fn set_window_accepted(&self, accepted: bool) {
		self.window_accepted.store(accepted, Ordering::SeqCst);
	}

	pub fn fail(&self, point: FailPoint) {
		self.state.lock().failures.insert(point);
	}

	pub fn recover(&self, point: FailPoint) {
		self.state.lock().failures.remove(&point);
	}

	/// While enabled, context-flag calls wait for [`MemoryHost::complete_flag_call`].
	pub fn hold_context_flags(&self, hold: bool) {
		self.state.lock().hold_flags = hold;
	}

	/// Number of held flag calls issued so far, completed or not.
	pub fn held_flag_calls(&self) -> usize {
		self.state.lock().held.len()
	}

	/// Completes the `index`-th held flag call (in issue order).
	///
	/// Returns false if there is no such call or it was already completed.
	pub fn complete_flag_call(&self, index: usize, result: HostResult<()>) -> bool {
		let held = {
			let mut state = self.state.lock();
			state.held.get_mut(index).and_then(Option::take)
		};
		let Some(held) = held else {
			return false;
		};
		if result.is_ok() {
			self.state.lock().flags.insert(held.key, held.value);
		}
		held.release.send(result).is_ok()
	}

	pub fn calls(&self) -> Vec<HostCall> {
		self.state.lock().calls.clone()
	}

	pub fn take_calls(&self) -> Vec<HostCall> {
		std::mem::take(&mut self.state.lock().calls)
	}

	fn record(&self, call: HostCall) {
		self.state.lock().calls.push(call);
	}

	fn check(&self, point: FailPoint) -> HostResult<()> {
		if self.state.lock().failures.contains(&point) {
			Err(HostError::Unavailable)
		} else {
			Ok(())
		}
	}

	fn next_handle(&self) -> u64 {
		self.next_handle.fetch_add(1, Ordering::SeqCst) + 1
	}

	fn with_document<T>(&self, document: &DocumentId, f: impl FnOnce(&MemoryDocument) -> HostResult<T>) -> HostResult<T> {
		let state = self.state.lock();
		let doc = state
			.documents
			.get(document)
			.ok_or_else(|| HostError::UnknownDocument(document.to_string()))?;
		f(doc)
	}
}

#[async_trait]
impl DocumentAccess for MemoryHost {
	async fn version(&self, document: &DocumentId) -> HostResult<DocumentVersion> {
		self.check(FailPoint::Version)?;
		self.with_document(document, |doc| Ok(doc.version))
	}

	async fn line_count(&self, document: &DocumentId) -> HostResult<u32> {
		self.check(FailPoint::ReadText)?;
		self.with_document(document, |doc| Ok(u32::try_from(doc.lines.len()).unwrap_or(u32::MAX)))
	}

	async fn line_text(&self, document: &DocumentId, line: u32) -> HostResult<String> {
		self.check(FailPoint::ReadText)?;
		self.with_document(document, |doc| doc.lines.get(line as usize).cloned().ok_or(HostError::InvalidRange))
	}

	async fn text_in_range(&self, document: &DocumentId, range: TextRange) -> HostResult<String> {
		self.check(FailPoint::ReadText)?;
		self.with_document(document, |doc| doc.slice(range).ok_or(HostError::InvalidRange))
	}
}

#[async_trait]
impl ViewportAccess for MemoryHost {
	async fn active_document(&self) -> Option<DocumentId> {
		self.state.lock().active.clone()
	}

	async fn visible_lines(&self, _document: &DocumentId) -> HostResult<Option<LineSpan>> {
		Ok(self.state.lock().viewport)
	}

	async fn reveal(&self, document: &DocumentId, range: TextRange, mode: RevealMode) -> HostResult<()> {
		self.record(HostCall::Reveal {
			document: document.clone(),
			range,
			mode,
		});
		self.check(FailPoint::Reveal)
	}
}

#[async_trait]
impl CursorAccess for MemoryHost {
	async fn set_cursor(&self, document: &DocumentId, position: Position) -> HostResult<()> {
		self.record(HostCall::SetCursor {
			document: document.clone(),
			position,
		});
		self.state.lock().cursor = Some((document.clone(), position));
		Ok(())
	}
}

#[async_trait]
impl DecorationAccess for MemoryHost {
	async fn show_jump_indicator(&self, document: &DocumentId, line: u32, target: Position) -> HostResult<IndicatorId> {
		self.check(FailPoint::ShowIndicator)?;
		self.record(HostCall::ShowJumpIndicator {
			document: document.clone(),
			line,
			target,
		});
		Ok(IndicatorId(self.next_handle()))
	}

	async fn clear_indicator(&self, indicator: IndicatorId) -> HostResult<()> {
		self.record(HostCall::ClearIndicator { indicator });
		Ok(())
	}
}

#[async_trait]
impl BindingAccess for MemoryHost {
	async fn bind_transient(&self, command: TransientCommand) -> HostResult<BindingId> {
		self.record(HostCall::BindTransient { command });
		Ok(BindingId(self.next_handle()))
	}

	async fn unbind(&self, binding: BindingId) -> HostResult<()> {
		self.record(HostCall::Unbind { binding });
		Ok(())
	}
}

#[async_trait]
impl ContextAccess for MemoryHost {
	async fn set_context_flag(&self, key: &str, value: bool) -> HostResult<()> {
		let pending = {
			let mut state = self.state.lock();
			state.calls.push(HostCall::SetContextFlag {
				key: key.to_string(),
				value,
			});
			if state.failures.contains(&FailPoint::ContextFlag) {
				return Err(HostError::Unavailable);
			}
			if state.hold_flags {
				let (release, pending) = oneshot::channel();
				state.held.push(Some(HeldFlag {
					key: key.to_string(),
					value,
					release,
				}));
				Some(pending)
			} else {
				state.flags.insert(key.to_string(), value);
				None
			}
		};

		match pending {
			Some(pending) => pending.await.unwrap_or(Err(HostError::Unavailable)),
			None => Ok(()),
		}
	}
}

#[async_trait]
impl SuggestTrigger for MemoryHost {
	async fn trigger_inline_suggest(&self) -> HostResult<()> {
		self.record(HostCall::TriggerInlineSuggest);
		Ok(())
	}
}

#[async_trait]
impl SuggestionEngine for MemoryHost {
	async fn delete_chain(&self) -> HostResult<()> {
		self.record(HostCall::DeleteChain);
		self.check(FailPoint::DeleteChain)
	}

	async fn show_after_jump(&self, completion: CompletionAfterJump) -> HostResult<()> {
		self.record(HostCall::ShowAfterJump { completion });
		Ok(())
	}
}

#[async_trait]
impl EditableRegionCalculator for MemoryHost {
	async fn next_editable_region(&self, strategy: RegionStrategy, request: &RegionRequest) -> HostResult<Vec<EditableRegion>> {
		self.record(HostCall::NextEditableRegion {
			strategy,
			request: request.clone(),
		});
		self.check(FailPoint::EditableRegion)?;
		Ok(self.state.lock().regions.clone())
	}
}

#[async_trait]
impl PrefetchQueue for MemoryHost {
	async fn enqueue_unprocessed(&self, region: EditableRegion) -> HostResult<()> {
		self.record(HostCall::EnqueueUnprocessed { region });
		Ok(())
	}
}

impl SuggestionWindow for MemoryHost {
	fn has_accepted(&self) -> bool {
		self.window_accepted.load(Ordering::SeqCst)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn range_reads_span_lines() {
		let host = MemoryHost::new();
		let doc = DocumentId::from("file:///a.rs");
		host.open_document(doc.clone(), "fn main() {\n    body\n}");
		let text = host
			.text_in_range(&doc, TextRange::new(Position::new(0, 3), Position::new(1, 8)))
			.await
			.unwrap();
		assert_eq!(text, "main() {\n    body");
		assert_eq!(host.line_count(&doc).await.unwrap(), 3);
	}

	#[tokio::test]
	async fn insert_bumps_version() {
		let host = MemoryHost::new();
		let doc = DocumentId::from("file:///a.rs");
		host.open_document(doc.clone(), "let x;");
		assert_eq!(host.version(&doc).await.unwrap(), 1);
		let version = host.insert(&doc, Position::new(0, 5), " = 1").unwrap();
		assert_eq!(version, 2);
		assert_eq!(host.document_text(&doc).unwrap(), "let x = 1;");
	}

	#[tokio::test]
	async fn out_of_bounds_range_is_invalid() {
		let host = MemoryHost::new();
		let doc = DocumentId::from("file:///a.rs");
		host.open_document(doc.clone(), "short");
		let err = host
			.text_in_range(&doc, TextRange::new(Position::new(0, 0), Position::new(0, 99)))
			.await
			.unwrap_err();
		assert_eq!(err, HostError::InvalidRange);
	}

	#[tokio::test]
	async fn held_flag_completes_on_release() {
		let host = std::sync::Arc::new(MemoryHost::new());
		host.hold_context_flags(true);
		let caller = std::sync::Arc::clone(&host);
		let call = tokio::spawn(async move { caller.set_context_flag("k", true).await });
		tokio::task::yield_now().await;
		assert_eq!(host.held_flag_calls(), 1);
		assert_eq!(host.flag("k"), None);
		assert!(host.complete_flag_call(0, Ok(())));
		assert_eq!(call.await.unwrap(), Ok(()));
		assert_eq!(host.flag("k"), Some(true));
		assert!(!host.complete_flag_call(0, Ok(())));
	}
}
