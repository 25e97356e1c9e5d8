use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Stable identity of an open document, typically its URI.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Arc<str>);

impl DocumentId {
	/// Creates an identifier from any string-like value.
	pub fn new(id: impl Into<Arc<str>>) -> Self {
		Self(id.into())
	}

	/// Returns the identifier as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for DocumentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for DocumentId {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for DocumentId {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

/// Monotonic document version. Every content change bumps it.
pub type DocumentVersion = u64;
