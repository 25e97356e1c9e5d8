//! Detects cursor moves caused by accepting inline ghost text.
//!
//! When a suggestion is shown, the session records where its text starts and
//! derives where the cursor lands once the text is inserted. A later selection
//! change counts as an acceptance only if it lands exactly there, the document
//! has changed since, and the document now holds the suggested text at that
//! spot. A match consumes the expectation.

use std::sync::Arc;

use async_trait::async_trait;
use nextedit_primitives::{DocumentId, DocumentVersion, Position, TextRange};
use parking_lot::Mutex;

use crate::dispatch::{SelectionChangeEvent, SelectionHandler, StateSnapshot};
use crate::error::{HandlerError, HostResult};
use crate::host::DocumentAccess;

/// Where the cursor should land if a suggestion is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedAcceptance {
	pub document: DocumentId,
	/// Version when the suggestion was shown.
	pub version: DocumentVersion,
	pub text: String,
	pub start: Position,
	/// Cursor position after inserting `text` at `start`.
	pub end: Position,
}

impl ExpectedAcceptance {
	pub fn new(document: DocumentId, version: DocumentVersion, text: impl Into<String>, start: Position) -> Self {
		let text = text.into();
		let end = start.advanced_by(&text);
		Self {
			document,
			version,
			text,
			start,
			end,
		}
	}

	pub fn range(&self) -> TextRange {
		TextRange::new(self.start, self.end)
	}
}

#[derive(Default)]
struct Slot {
	expected: Option<ExpectedAcceptance>,
	generation: u64,
}

/// Single-slot correlator between shown ghost text and cursor moves.
pub struct GhostTextCorrelator {
	documents: Arc<dyn DocumentAccess>,
	slot: Mutex<Slot>,
}

impl GhostTextCorrelator {
	pub fn new(documents: Arc<dyn DocumentAccess>) -> Self {
		Self {
			documents,
			slot: Mutex::new(Slot::default()),
		}
	}

	/// Records the suggestion shown at `start`, replacing any earlier one.
	///
	/// The document version is read from the host at call time.
	pub async fn set_expected_acceptance(&self, document: DocumentId, text: impl Into<String>, start: Position) -> HostResult<()> {
		let version = self.documents.version(&document).await?;
		self.expect(ExpectedAcceptance::new(document, version, text, start));
		Ok(())
	}

	/// Records a prepared expectation, replacing any earlier one.
	pub fn expect(&self, expected: ExpectedAcceptance) {
		tracing::trace!(
			document = %expected.document,
			version = expected.version,
			end_line = expected.end.line,
			end_character = expected.end.character,
			"ghost.expect"
		);
		let mut slot = self.slot.lock();
		slot.generation += 1;
		slot.expected = Some(expected);
	}

	pub fn expected(&self) -> Option<ExpectedAcceptance> {
		self.slot.lock().expected.clone()
	}

	pub fn clear(&self) {
		self.slot.lock().expected = None;
	}

	/// Returns true when the cursor landing at `position` is the acceptance of
	/// the recorded suggestion. Only a match clears the expectation.
	pub async fn check_acceptance(&self, document: &DocumentId, position: Position) -> bool {
		let (expected, generation) = {
			let slot = self.slot.lock();
			match &slot.expected {
				Some(expected) => (expected.clone(), slot.generation),
				None => return false,
			}
		};

		if &expected.document != document || position != expected.end {
			return false;
		}

		match self.documents.version(document).await {
			Ok(version) if version > expected.version => {}
			Ok(_) => return false,
			Err(err) => {
				tracing::warn!(document = %document, error = %err, "ghost.version_read_failed");
				return false;
			}
		}

		let inserted = match self.documents.text_in_range(document, expected.range()).await {
			Ok(text) => text,
			Err(err) => {
				tracing::warn!(document = %document, error = %err, "ghost.text_read_failed");
				return false;
			}
		};
		if inserted != expected.text {
			tracing::trace!(document = %document, "ghost.text_mismatch");
			return false;
		}

		let mut slot = self.slot.lock();
		if slot.generation == generation {
			slot.expected = None;
		}
		tracing::debug!(document = %document, "ghost.accepted");
		true
	}
}

/// Claims selection changes that match the recorded ghost text.
pub struct GhostTextHandler {
	correlator: Arc<GhostTextCorrelator>,
}

impl GhostTextHandler {
	pub fn new(correlator: Arc<GhostTextCorrelator>) -> Self {
		Self { correlator }
	}
}

#[async_trait]
impl SelectionHandler for GhostTextHandler {
	async fn handle(&self, _event: &SelectionChangeEvent, snapshot: &StateSnapshot) -> Result<bool, HandlerError> {
		let Some(cursor) = snapshot.cursor else {
			return Ok(false);
		};
		Ok(self.correlator.check_acceptance(&snapshot.document, cursor).await)
	}
}
