//! Session configuration.
//!
//! Every key is optional; missing keys take the defaults below.
//!
//! ```toml
//! debounce_ms = 50
//! processing_timeout_ms = 500
//! typing_session_timeout_ms = 2000
//! jump_accept_grace_ms = 100
//! full_file_diff = false
//! editable_region_strategy = "static"
//! exclusivity_flag = "nextEditWindowActive"
//! jump_indicator_flag = "jumpDecorationVisible"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::host::RegionStrategy;

fn default_debounce_ms() -> u64 {
	50
}

fn default_processing_timeout_ms() -> u64 {
	500
}

fn default_typing_session_timeout_ms() -> u64 {
	2000
}

fn default_jump_accept_grace_ms() -> u64 {
	100
}

fn default_exclusivity_flag() -> String {
	"nextEditWindowActive".to_string()
}

fn default_jump_indicator_flag() -> String {
	"jumpDecorationVisible".to_string()
}

/// Tunables for one edit session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArbiterConfig {
	/// Selection events closer than this to the last accepted event are coalesced.
	#[serde(default = "default_debounce_ms")]
	pub debounce_ms: u64,
	/// Upper bound on one processing pass.
	#[serde(default = "default_processing_timeout_ms")]
	pub processing_timeout_ms: u64,
	/// Quiet period after the last edit before typing is considered over.
	#[serde(default = "default_typing_session_timeout_ms")]
	pub typing_session_timeout_ms: u64,
	/// How long an accepted jump keeps claiming selection events.
	#[serde(default = "default_jump_accept_grace_ms")]
	pub jump_accept_grace_ms: u64,
	/// The session diffs whole documents; the fallback skips prefetching.
	#[serde(default)]
	pub full_file_diff: bool,
	/// Strategy passed to the editable-region calculator.
	#[serde(default)]
	pub editable_region_strategy: RegionStrategy,
	/// Host context key guarded by the key reservation arbiter.
	#[serde(default = "default_exclusivity_flag")]
	pub exclusivity_flag: String,
	/// Host context key that enables the jump accept/reject bindings.
	#[serde(default = "default_jump_indicator_flag")]
	pub jump_indicator_flag: String,
}

impl Default for ArbiterConfig {
	fn default() -> Self {
		Self {
			debounce_ms: default_debounce_ms(),
			processing_timeout_ms: default_processing_timeout_ms(),
			typing_session_timeout_ms: default_typing_session_timeout_ms(),
			jump_accept_grace_ms: default_jump_accept_grace_ms(),
			full_file_diff: false,
			editable_region_strategy: RegionStrategy::default(),
			exclusivity_flag: default_exclusivity_flag(),
			jump_indicator_flag: default_jump_indicator_flag(),
		}
	}
}

impl ArbiterConfig {
	/// Parses and validates configuration from TOML text.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads configuration from a file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
			path: path.to_path_buf(),
			error: e,
		})?;
		Self::from_toml_str(&content)
	}

	/// Rejects values that would stall or disable the session.
	///
	/// A zero debounce is allowed and turns coalescing off.
	pub fn validate(&self) -> Result<()> {
		if self.processing_timeout_ms == 0 {
			return Err(ConfigError::Invalid("processing_timeout_ms must be > 0".into()));
		}
		if self.typing_session_timeout_ms == 0 {
			return Err(ConfigError::Invalid("typing_session_timeout_ms must be > 0".into()));
		}
		if self.jump_accept_grace_ms == 0 {
			return Err(ConfigError::Invalid("jump_accept_grace_ms must be > 0".into()));
		}
		if self.exclusivity_flag.trim().is_empty() {
			return Err(ConfigError::Invalid("exclusivity_flag must not be empty".into()));
		}
		if self.jump_indicator_flag.trim().is_empty() {
			return Err(ConfigError::Invalid("jump_indicator_flag must not be empty".into()));
		}
		Ok(())
	}

	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}

	pub fn processing_timeout(&self) -> Duration {
		Duration::from_millis(self.processing_timeout_ms)
	}

	pub fn typing_session_timeout(&self) -> Duration {
		Duration::from_millis(self.typing_session_timeout_ms)
	}

	pub fn jump_accept_grace(&self) -> Duration {
		Duration::from_millis(self.jump_accept_grace_ms)
	}
}
