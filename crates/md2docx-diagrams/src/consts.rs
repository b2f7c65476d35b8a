//! Internal constants for diagram rendering.

use std::time::Duration;

/// Default DPI for diagram rasterization (192 = 2x for high-density displays).
pub const DEFAULT_DPI: u32 = 192;

/// Standard display DPI (96 = CSS reference pixel).
pub const STANDARD_DPI: u32 = 96;

/// Default completion window for one backend call (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How often a pending backend call checks for cancellation.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Public Kroki instance used when no URL is configured.
pub const DEFAULT_KROKI_URL: &str = "https://kroki.io";
