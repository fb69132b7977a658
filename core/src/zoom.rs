//! Shared "zoom" viewer links: `/<dongle_id>/<start_ms>/<end_ms>`.
//!
//! These are always viewable without login.

/// Time window encoded in a zoom link, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomRange {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl ZoomRange {
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let mut segments = path.split('/').skip(1);
        let dongle = segments.next()?;
        let start = segments.next()?;
        let end = segments.next()?;
        if dongle.is_empty() {
            return None;
        }

        let start_ms = start.parse::<u64>().ok()?;
        let end_ms = end.parse::<u64>().ok()?;
        (start_ms < end_ms).then_some(Self { start_ms, end_ms })
    }

    #[must_use]
    pub fn duration_ms(self) -> u64 {
        self.end_ms - self.start_ms
    }
}

#[must_use]
pub fn is_zoom_path(path: &str) -> bool {
    ZoomRange::parse(path).is_some()
}
