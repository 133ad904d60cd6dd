//! Default tuning values for the recognizers.
//!
//! These are the usual desktop settings fallbacks; hosts with their own
//! settings systems override them through the per-recognizer configs.

/// Movement in pixels past which a click or long-press gives up.
pub const DEFAULT_CANCEL_THRESHOLD_PX: f32 = 8.0;

/// Maximum pause between consecutive clicks of a multi-click gesture.
pub const DEFAULT_NEXT_CLICK_TIMEOUT_MS: u64 = 250;

pub const DEFAULT_LONG_PRESS_DURATION_MS: u64 = 500;

/// Displacement that has to accumulate before a pan starts.
pub const DEFAULT_PAN_BEGIN_THRESHOLD_PX: f32 = 16.0;

/// Button number reported for touch points.
pub const PRIMARY_BUTTON: u32 = 1;
