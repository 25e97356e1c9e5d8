use serde::{Deserialize, Serialize};

/// Position in line/character coordinates.
///
/// Ordering is document order: line first, then character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
	/// Zero-based line index.
	pub line: u32,
	/// Zero-based character offset in the line.
	pub character: u32,
}

impl Position {
	/// Creates a new position.
	pub const fn new(line: u32, character: u32) -> Self {
		Self { line, character }
	}

	/// Returns the position reached after inserting `text` at `self`.
	///
	/// Multi-line text ends on the last inserted line at the length of the
	/// final segment. Single-line text extends the current column.
	pub fn advanced_by(self, text: &str) -> Self {
		let mut segments = text.split('\n');
		let first = segments.next().unwrap_or_default();
		let mut extra_lines = 0u32;
		let mut last = first;
		for segment in segments {
			extra_lines = extra_lines.saturating_add(1);
			last = segment;
		}

		if extra_lines == 0 {
			Self::new(self.line, self.character.saturating_add(char_len(first)))
		} else {
			Self::new(self.line.saturating_add(extra_lines), char_len(last))
		}
	}
}

fn char_len(segment: &str) -> u32 {
	u32::try_from(segment.chars().count()).unwrap_or(u32::MAX)
}

/// Range with start and end positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextRange {
	/// Start position (inclusive).
	pub start: Position,
	/// End position (exclusive).
	pub end: Position,
}

impl TextRange {
	/// Creates a new range.
	pub const fn new(start: Position, end: Position) -> Self {
		Self { start, end }
	}

	/// Creates a zero-length range at a position.
	pub const fn point(pos: Position) -> Self {
		Self { start: pos, end: pos }
	}
}
