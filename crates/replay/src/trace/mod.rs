//! Trace format and replay driver.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use nextedit_arbiter::host::EditableRegion;
use nextedit_arbiter::testing::{HostCall, MemoryHost};
use nextedit_arbiter::{ArbiterConfig, DispatchOutcome, EditSession, SelectionChangeEvent, SessionDeps};
use nextedit_primitives::{DocumentId, LineSpan, Position, Selection, TextRange};
use serde::Deserialize;

/// One recorded host notification or session command.
///
/// Steps that take an optional `document` default to the document most
/// recently opened with `set_document`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
	/// Opens or replaces a document and makes it active.
	SetDocument {
		document: DocumentId,
		text: String,
		#[serde(default)]
		viewport: Option<LineSpan>,
	},
	/// Cursor moved (a collapsed selection) or a selection changed.
	Select {
		#[serde(default)]
		document: Option<DocumentId>,
		active: Position,
		#[serde(default)]
		anchor: Option<Position>,
	},
	/// Text replaced by the user.
	Edit {
		#[serde(default)]
		document: Option<DocumentId>,
		range: TextRange,
		text: String,
	},
	/// Real-time pause.
	AdvanceMs { ms: u64 },
	SuggestJump {
		from: Position,
		to: Position,
		#[serde(default)]
		completion: Option<String>,
	},
	AcceptJump,
	RejectJump,
	/// Ghost text shown at `at`.
	ExpectGhost {
		#[serde(default)]
		document: Option<DocumentId>,
		text: String,
		at: Position,
	},
	Reserve,
	Free,
	/// Regions the editable-region calculator hands out from now on.
	SetRegions { regions: Vec<EditableRegion> },
	/// Whether the suggestion window reports its own accept.
	WindowAccepted { accepted: bool },
}

/// Reads a JSON array of steps.
pub fn load(path: &Path) -> anyhow::Result<Vec<Step>> {
	let text = std::fs::read_to_string(path)?;
	parse(&text)
}

pub fn parse(text: &str) -> anyhow::Result<Vec<Step>> {
	serde_json::from_str(text).context("malformed trace")
}

/// Drives one session through a trace.
pub struct Replayer {
	host: Arc<MemoryHost>,
	session: EditSession,
	active: Option<DocumentId>,
}

impl Replayer {
	pub fn new(config: ArbiterConfig) -> Self {
		let host = Arc::new(MemoryHost::new());
		let session = EditSession::start(
			config,
			SessionDeps {
				host: host.clone(),
				engine: host.clone(),
				regions: host.clone(),
				prefetch: host.clone(),
				window: host.clone(),
			},
		);
		Self {
			host,
			session,
			active: None,
		}
	}

	pub async fn run(&mut self, steps: &[Step]) -> anyhow::Result<()> {
		if let Err(err) = self.session.reservation().reset().await {
			tracing::warn!(error = %err, "replay.reset_failed");
		}
		for (index, step) in steps.iter().enumerate() {
			self.apply(step).await.with_context(|| format!("step {index}"))?;
		}
		Ok(())
	}

	async fn apply(&mut self, step: &Step) -> anyhow::Result<()> {
		tracing::debug!(?step, "replay.step");
		match step {
			Step::SetDocument {
				document,
				text,
				viewport,
			} => {
				self.host.open_document(document.clone(), text);
				self.host.set_active(document.clone());
				self.host.set_viewport(*viewport);
				self.active = Some(document.clone());
			}
			Step::Select {
				document,
				active,
				anchor,
			} => {
				let document = self.document(document.as_ref())?;
				let event = match anchor {
					Some(anchor) => SelectionChangeEvent::new(document, vec![Selection::new(*anchor, *active)]),
					None => SelectionChangeEvent::cursor_at(document, *active),
				};
				let outcome = self.session.on_selection_change(event).await;
				if outcome == DispatchOutcome::Closed {
					bail!("session closed");
				}
				tracing::debug!(?outcome, "replay.select");
			}
			Step::Edit { document, range, text } => {
				let document = self.document(document.as_ref())?;
				self.host.edit(&document, *range, text)?;
				self.session.on_document_edited();
			}
			Step::AdvanceMs { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
			Step::SuggestJump { from, to, completion } => {
				let shown = self.session.jump().suggest_jump(*from, *to, completion.as_deref()).await;
				tracing::info!(shown, "replay.suggest_jump");
			}
			Step::AcceptJump => {
				self.session.jump().accept_jump().await;
			}
			Step::RejectJump => {
				self.session.jump().reject_jump().await;
			}
			Step::ExpectGhost { document, text, at } => {
				let document = self.document(document.as_ref())?;
				self.session.expect_ghost_text(document, text, *at).await;
			}
			Step::Reserve => {
				if let Err(err) = self.session.reservation().reserve().await {
					tracing::warn!(error = %err, "replay.reserve_failed");
				}
			}
			Step::Free => {
				if let Err(err) = self.session.reservation().free().await {
					tracing::warn!(error = %err, "replay.free_failed");
				}
			}
			Step::SetRegions { regions } => self.host.set_regions(regions.clone()),
			Step::WindowAccepted { accepted } => self.host.set_window_accepted(*accepted),
		}
		Ok(())
	}

	fn document(&self, explicit: Option<&DocumentId>) -> anyhow::Result<DocumentId> {
		match explicit.or(self.active.as_ref()) {
			Some(document) => Ok(document.clone()),
			None => bail!("no document open; add a set_document step first"),
		}
	}

	/// Drains pending events, stops the session and returns the call log.
	pub async fn finish(self) -> Vec<HostCall> {
		self.session.dispatcher().idle().await;
		self.session.shutdown().await;
		self.host.take_calls()
	}
}

pub fn write_json_lines(calls: &[HostCall], out: &mut impl Write) -> anyhow::Result<()> {
	for call in calls {
		serde_json::to_writer(&mut *out, call)?;
		out.write_all(b"\n")?;
	}
	Ok(())
}
