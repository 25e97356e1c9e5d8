use serde::{Deserialize, Serialize};

use crate::Position;

/// A selection with a fixed anchor and a moving active end.
///
/// The active end is where the cursor is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Selection {
	/// The fixed end of the selection.
	pub anchor: Position,
	/// The moving end of the selection (cursor position).
	pub active: Position,
}

impl Selection {
	/// Creates a selection from anchor to active.
	pub const fn new(anchor: Position, active: Position) -> Self {
		Self { anchor, active }
	}

	/// Creates a collapsed selection (cursor) at `pos`.
	pub const fn cursor(pos: Position) -> Self {
		Self::new(pos, pos)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cursor_collapses_both_ends() {
		let sel = Selection::cursor(Position::new(1, 1));
		assert_eq!(sel.anchor, sel.active);
		assert_eq!(sel, Selection::new(Position::new(1, 1), Position::new(1, 1)));
	}
}
