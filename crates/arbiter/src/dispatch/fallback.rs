use std::sync::Arc;

use async_trait::async_trait;

use super::{SelectionChangeEvent, SelectionHandler, StateSnapshot};
use crate::error::HandlerError;
use crate::host::{EditableRegionCalculator, PrefetchQueue, RegionRequest, RegionStrategy, SuggestionEngine};

/// Tears the chain down when no other handler claimed the move.
///
/// Unless the session diffs whole files, the first editable region around the
/// primary anchor is handed to the prefetch queue so the next suggestion is
/// ready sooner.
pub struct FallbackHandler {
	engine: Arc<dyn SuggestionEngine>,
	regions: Arc<dyn EditableRegionCalculator>,
	prefetch: Arc<dyn PrefetchQueue>,
	strategy: RegionStrategy,
	full_file_diff: bool,
}

impl FallbackHandler {
	pub fn new(
		engine: Arc<dyn SuggestionEngine>,
		regions: Arc<dyn EditableRegionCalculator>,
		prefetch: Arc<dyn PrefetchQueue>,
		strategy: RegionStrategy,
		full_file_diff: bool,
	) -> Self {
		Self {
			engine,
			regions,
			prefetch,
			strategy,
			full_file_diff,
		}
	}
}

#[async_trait]
impl SelectionHandler for FallbackHandler {
	async fn handle(&self, event: &SelectionChangeEvent, _snapshot: &StateSnapshot) -> Result<bool, HandlerError> {
		self.engine.delete_chain().await?;
		tracing::debug!(document = %event.document, "fallback.chain_deleted");

		if self.full_file_diff {
			return Ok(true);
		}
		let Some(cursor) = event.anchor() else {
			return Ok(true);
		};

		let request = RegionRequest {
			document: event.document.clone(),
			cursor,
		};
		let regions = self.regions.next_editable_region(self.strategy, &request).await?;
		if let Some(region) = regions.into_iter().next() {
			tracing::trace!(document = %region.document, line = region.range.start.line, "fallback.prefetch");
			self.prefetch.enqueue_unprocessed(region).await?;
		}
		Ok(true)
	}
}
