use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic sequence clock used to fence racing async operations.
///
/// Each operation captures [`FencingClock::advance`] before it suspends and
/// checks [`FencingClock::is_current`] after it resumes. Only the most recently
/// issued operation may commit.
#[derive(Debug, Default, Clone)]
pub struct FencingClock {
	latest: Arc<AtomicU64>,
}

impl FencingClock {
	/// Creates a clock whose first issued sequence is 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Issues the next sequence number.
	pub fn advance(&self) -> u64 {
		self.latest.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}

	/// Returns the most recently issued sequence number (0 before any issue).
	pub fn latest(&self) -> u64 {
		self.latest.load(Ordering::Acquire)
	}

	/// Returns true when `seq` is still the most recently issued sequence.
	pub fn is_current(&self, seq: u64) -> bool {
		self.latest() == seq
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sequences_start_at_one_and_increase() {
		let clock = FencingClock::new();
		assert_eq!(clock.latest(), 0);
		assert_eq!(clock.advance(), 1);
		assert_eq!(clock.advance(), 2);
		assert_eq!(clock.latest(), 2);
	}

	#[test]
	fn only_latest_is_current() {
		let clock = FencingClock::new();
		let first = clock.advance();
		assert!(clock.is_current(first));
		let second = clock.advance();
		assert!(!clock.is_current(first));
		assert!(clock.is_current(second));
	}

	#[test]
	fn clones_share_the_sequence() {
		let clock = FencingClock::new();
		let other = clock.clone();
		let seq = clock.advance();
		assert!(other.is_current(seq));
		assert_eq!(other.advance(), seq + 1);
	}
}
