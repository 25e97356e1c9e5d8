use nextedit_primitives::LineSpan;

/// Where the jump indicator is drawn relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorPlacement {
	/// The target line is visible; the indicator sits on it.
	InView { line: u32 },
	/// The target is above the viewport; the indicator sits on the top visible line.
	ClampedTop { line: u32 },
	/// The target is below the viewport; the indicator sits on the bottom visible line.
	ClampedBottom { line: u32 },
	/// The host reported no viewport; the indicator sits on the target line.
	NoViewport { line: u32 },
}

impl IndicatorPlacement {
	pub const fn line(self) -> u32 {
		match self {
			Self::InView { line } | Self::ClampedTop { line } | Self::ClampedBottom { line } | Self::NoViewport { line } => line,
		}
	}

	/// True when the target must be scrolled into view.
	pub const fn needs_reveal(self) -> bool {
		!matches!(self, Self::InView { .. })
	}
}

/// Chooses the indicator line for a jump to `target_line`.
pub fn place_indicator(target_line: u32, viewport: Option<LineSpan>) -> IndicatorPlacement {
	let Some(viewport) = viewport else {
		return IndicatorPlacement::NoViewport { line: target_line };
	};
	if target_line < viewport.first {
		IndicatorPlacement::ClampedTop { line: viewport.first }
	} else if target_line > viewport.last {
		IndicatorPlacement::ClampedBottom { line: viewport.last }
	} else {
		IndicatorPlacement::InView { line: target_line }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn target_below_clamps_to_bottom_line() {
		let placement = place_indicator(300, Some(LineSpan::new(40, 90)));
		assert_eq!(placement, IndicatorPlacement::ClampedBottom { line: 90 });
		assert!(placement.needs_reveal());
	}

	#[test]
	fn target_above_clamps_to_top_line() {
		assert_eq!(
			place_indicator(3, Some(LineSpan::new(40, 90))),
			IndicatorPlacement::ClampedTop { line: 40 }
		);
	}

	#[test]
	fn target_in_view_stays_put() {
		for line in [40, 65, 90] {
			let placement = place_indicator(line, Some(LineSpan::new(40, 90)));
			assert_eq!(placement, IndicatorPlacement::InView { line });
			assert!(!placement.needs_reveal());
		}
	}

	#[test]
	fn missing_viewport_uses_target() {
		assert_eq!(place_indicator(12, None).line(), 12);
		assert!(place_indicator(12, None).needs_reveal());
	}
}
