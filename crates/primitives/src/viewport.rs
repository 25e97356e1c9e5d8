use serde::{Deserialize, Serialize};

/// Inclusive span of visible lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineSpan {
	/// First visible line.
	pub first: u32,
	/// Last visible line.
	pub last: u32,
}

impl LineSpan {
	/// Creates a span; the bounds are swapped if given out of order.
	pub fn new(first: u32, last: u32) -> Self {
		if first <= last { Self { first, last } } else { Self { first: last, last: first } }
	}

	/// Returns true when `line` is within the span.
	pub fn contains(&self, line: u32) -> bool {
		self.first <= line && line <= self.last
	}
}
