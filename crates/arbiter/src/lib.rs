//! Arbitration between host editor notifications and a next-edit suggestion chain.
//!
//! A host editor reports selection changes and document edits. Some of those
//! are caused by the suggestion machinery itself (accepting ghost text,
//! following a jump prompt, the suggestion window's own accept) or by ordinary
//! typing; any other move means the user walked away and the chain must be
//! torn down. This crate decides which is which.
//!
//! * [`EventDispatcher`] debounces and serializes selection changes and asks
//!   prioritized [`SelectionHandler`]s to claim them.
//! * [`KeyReservationArbiter`] guards the suggestion window's key binding with
//!   a fencing counter.
//! * [`JumpCoordinator`] offers cross-viewport jumps.
//! * [`GhostTextCorrelator`] recognises accepted inline suggestions.
//! * [`EditSession`] wires them together for one session.

#![cfg_attr(test, allow(unused_crate_dependencies))]

/// Session configuration.
pub mod config;
/// Selection-change dispatch.
pub mod dispatch;
/// Error types.
pub mod error;
/// Ghost-text acceptance detection.
pub mod ghost;
/// Host editor and collaborator traits.
pub mod host;
/// Jump prompts.
pub mod jump;
/// Key binding reservation.
pub mod reservation;
/// Session wiring.
pub mod session;
/// In-memory host for tests and trace replay.
pub mod testing;

pub use config::ArbiterConfig;
pub use dispatch::{
	ChainStateProbe, DispatchOutcome, DispatchStats, EventDispatcher, FallbackHandler, HandlerPriority, ListenerHandle,
	NoChainState, SelectionChangeEvent, SelectionHandler, StateSnapshot, TypingSessionTracker, handler_fn,
};
pub use error::{ConfigError, HandlerError, HostError, HostResult, ReservationError};
pub use ghost::{ExpectedAcceptance, GhostTextCorrelator};
pub use host::HostEditor;
pub use jump::{JumpCoordinator, JumpPhase, JumpSuggestion};
pub use reservation::{KeyReservationArbiter, ReservationOutcome, ReservationState};
pub use session::{EditSession, SessionDeps};
