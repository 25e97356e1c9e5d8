//! Error types for host calls, handlers, reservations and configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by the host editor or an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
	/// The host could not service the call (editor closed, extension shutting down).
	#[error("host unavailable")]
	Unavailable,

	/// A requested position or range does not exist in the document.
	#[error("range outside document bounds")]
	InvalidRange,

	/// The document is not open in the host.
	#[error("unknown document: {0}")]
	UnknownDocument(String),

	/// The host refused the call.
	#[error("host rejected call: {0}")]
	Rejected(String),
}

/// Fault raised while a dispatcher handler ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
	/// A host call made by the handler failed.
	#[error(transparent)]
	Host(#[from] HostError),

	/// A collaborator returned an unusable result.
	#[error("collaborator fault: {0}")]
	Collaborator(String),

	/// The handler panicked.
	#[error("handler panicked: {0}")]
	Panicked(String),
}

/// A reserve or free call whose host flag update failed.
///
/// The arbiter has already fallen back to `Free` when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("key reservation #{sequence} failed: {source}")]
pub struct ReservationError {
	/// Sequence number captured by the failing call.
	pub sequence: u64,
	/// The underlying host failure.
	pub source: HostError,
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or field types.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// A value parsed but is not usable.
	#[error("invalid configuration: {0}")]
	Invalid(String),
}

/// Result type for host calls.
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
