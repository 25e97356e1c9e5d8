//! Document coordinates, selections and viewport spans.
//!
//! Every position handed across the host seam is expressed in these types.
//! Columns count Unicode scalar values within a line.

#![cfg_attr(test, allow(unused_crate_dependencies))]

/// Document identity and version stamps.
pub mod document;
/// Line/character positions and ranges.
pub mod position;
/// Anchor/active cursor selections.
pub mod selection;
/// Visible line spans.
pub mod viewport;

pub use document::{DocumentId, DocumentVersion};
pub use position::{Position, TextRange};
pub use selection::Selection;
pub use viewport::LineSpan;
