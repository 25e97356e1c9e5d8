//! Exclusive reservation of the suggestion window's key binding.
//!
//! The binding is enabled through a host context flag. Show and hide paths
//! call [`KeyReservationArbiter::reserve`] and [`KeyReservationArbiter::free`]
//! without coordinating with each other, so flag updates can complete out of
//! order. Every call that reaches the host takes a sequence number from a
//! [`FencingClock`] before suspending; on resume only the latest sequence
//! commits its state and older completions are discarded.
//!
//! A call is skipped when its target is already committed, or when it is the
//! latest *requested* state and a call towards it is still in flight.

use std::sync::Arc;

use nextedit_worker::FencingClock;
use parking_lot::Mutex;

use crate::error::ReservationError;
use crate::host::ContextAccess;

/// Whether the guarded key binding is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReservationState {
	#[default]
	Free,
	Reserved,
}

impl ReservationState {
	pub const fn is_reserved(self) -> bool {
		matches!(self, Self::Reserved)
	}

	const fn as_str(self) -> &'static str {
		match self {
			Self::Free => "free",
			Self::Reserved => "reserved",
		}
	}
}

/// Result of a reserve/free call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationOutcome {
	/// The requested state was already current or pending; nothing was sent.
	Unchanged,
	/// The host accepted the update and it was committed.
	Committed { sequence: u64 },
	/// The host accepted the update but a newer call superseded it.
	Superseded { sequence: u64 },
}

#[derive(Debug, Default)]
struct Slots {
	committed: ReservationState,
	requested: ReservationState,
	in_flight: usize,
}

impl Slots {
	/// The target is already held, or a call towards it is still pending.
	fn settled_on(&self, target: ReservationState) -> bool {
		self.requested == target && (self.committed == target || self.in_flight > 0)
	}
}

/// Free/Reserved state machine for one session's exclusivity flag.
pub struct KeyReservationArbiter {
	host: Arc<dyn ContextAccess>,
	flag: Arc<str>,
	clock: FencingClock,
	// Never held across a host call.
	slots: Mutex<Slots>,
}

impl KeyReservationArbiter {
	pub fn new(host: Arc<dyn ContextAccess>, flag: impl Into<Arc<str>>) -> Self {
		Self {
			host,
			flag: flag.into(),
			clock: FencingClock::new(),
			slots: Mutex::new(Slots::default()),
		}
	}

	/// Claims the binding.
	pub async fn reserve(&self) -> Result<ReservationOutcome, ReservationError> {
		self.transition(ReservationState::Reserved).await
	}

	/// Releases the binding.
	pub async fn free(&self) -> Result<ReservationOutcome, ReservationError> {
		self.transition(ReservationState::Free).await
	}

	/// Forces the host flag off regardless of the recorded state.
	pub async fn reset(&self) -> Result<ReservationOutcome, ReservationError> {
		let sequence = {
			let mut slots = self.slots.lock();
			slots.requested = ReservationState::Free;
			slots.in_flight += 1;
			self.clock.advance()
		};
		tracing::debug!(flag = %self.flag, sequence, "reservation.reset");
		self.complete(ReservationState::Free, sequence).await
	}

	/// Last committed state.
	pub fn state(&self) -> ReservationState {
		self.slots.lock().committed
	}

	/// Sequence number of the most recent call that reached the host.
	pub fn latest_sequence(&self) -> u64 {
		self.clock.latest()
	}

	async fn transition(&self, target: ReservationState) -> Result<ReservationOutcome, ReservationError> {
		let sequence = {
			let mut slots = self.slots.lock();
			if slots.settled_on(target) {
				tracing::trace!(flag = %self.flag, state = target.as_str(), "reservation.unchanged");
				return Ok(ReservationOutcome::Unchanged);
			}
			slots.requested = target;
			slots.in_flight += 1;
			self.clock.advance()
		};
		tracing::trace!(flag = %self.flag, state = target.as_str(), sequence, "reservation.request");
		self.complete(target, sequence).await
	}

	async fn complete(&self, target: ReservationState, sequence: u64) -> Result<ReservationOutcome, ReservationError> {
		let result = self.host.set_context_flag(&self.flag, target.is_reserved()).await;

		let mut slots = self.slots.lock();
		slots.in_flight = slots.in_flight.saturating_sub(1);
		match result {
			Ok(()) if self.clock.is_current(sequence) => {
				slots.committed = target;
				tracing::debug!(flag = %self.flag, state = target.as_str(), sequence, "reservation.commit");
				Ok(ReservationOutcome::Committed { sequence })
			}
			Ok(()) => {
				tracing::debug!(
					flag = %self.flag,
					sequence,
					latest = self.clock.latest(),
					"reservation.superseded"
				);
				Ok(ReservationOutcome::Superseded { sequence })
			}
			Err(source) => {
				slots.committed = ReservationState::Free;
				if self.clock.is_current(sequence) || slots.in_flight == 0 {
					slots.requested = ReservationState::Free;
				}
				tracing::warn!(flag = %self.flag, sequence, error = %source, "reservation.failed");
				Err(ReservationError { sequence, source })
			}
		}
	}
}
