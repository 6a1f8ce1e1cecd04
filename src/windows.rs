//! Validity Windows

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors constructing a validity window.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    /// The window ends before it starts.
    #[error("window ends at {ends_at} before it starts at {starts_at}")]
    EndsBeforeStart {
        /// Window start
        starts_at: Timestamp,

        /// Window end
        ends_at: Timestamp,
    },
}

/// Where a point in time falls relative to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    /// `now` is before the start.
    NotYetActive,

    /// `now` is inside the window.
    Active,

    /// `now` is after the end.
    Expired,
}

/// A time window `[starts_at, ends_at]`, open-ended when `ends_at` is `None`.
///
/// Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct ValidityWindow {
    starts_at: Timestamp,
    ends_at: Option<Timestamp>,
}

impl ValidityWindow {
    /// Create a window.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::EndsBeforeStart`] when `ends_at` precedes `starts_at`.
    pub fn new(starts_at: Timestamp, ends_at: Option<Timestamp>) -> Result<Self, WindowError> {
        match ends_at {
            Some(ends_at) if ends_at < starts_at => {
                Err(WindowError::EndsBeforeStart { starts_at, ends_at })
            }
            _ => Ok(Self { starts_at, ends_at }),
        }
    }

    /// A window that opened at `starts_at` and never closes.
    #[must_use]
    pub const fn open_from(starts_at: Timestamp) -> Self {
        Self {
            starts_at,
            ends_at: None,
        }
    }

    /// Window start.
    #[must_use]
    pub const fn starts_at(&self) -> Timestamp {
        self.starts_at
    }

    /// Window end, if bounded.
    #[must_use]
    pub const fn ends_at(&self) -> Option<Timestamp> {
        self.ends_at
    }

    /// Classify `now` against the window.
    #[must_use]
    pub fn status(&self, now: Timestamp) -> WindowStatus {
        if now < self.starts_at {
            WindowStatus::NotYetActive
        } else if self.ends_at.is_some_and(|ends_at| now > ends_at) {
            WindowStatus::Expired
        } else {
            WindowStatus::Active
        }
    }

    /// Whether `now` falls inside the window.
    #[must_use]
    pub fn contains(&self, now: Timestamp) -> bool {
        self.status(now) == WindowStatus::Active
    }
}

#[derive(Deserialize)]
struct RawWindow {
    starts_at: Timestamp,
    #[serde(default)]
    ends_at: Option<Timestamp>,
}

impl TryFrom<RawWindow> for ValidityWindow {
    type Error = WindowError;

    fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
        Self::new(raw.starts_at, raw.ends_at)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn classifies_points_in_time() -> TestResult {
        let window = ValidityWindow::new(
            "2026-03-01T00:00:00Z".parse()?,
            Some("2026-03-31T23:59:59Z".parse()?),
        )?;

        assert_eq!(
            window.status("2026-02-28T12:00:00Z".parse()?),
            WindowStatus::NotYetActive
        );
        assert_eq!(window.status("2026-03-01T00:00:00Z".parse()?), WindowStatus::Active);
        assert_eq!(window.status("2026-03-31T23:59:59Z".parse()?), WindowStatus::Active);
        assert_eq!(window.status("2026-04-01T00:00:00Z".parse()?), WindowStatus::Expired);

        Ok(())
    }

    #[test]
    fn open_window_never_expires() -> TestResult {
        let window = ValidityWindow::open_from("2020-01-01T00:00:00Z".parse()?);

        assert!(window.contains("2099-01-01T00:00:00Z".parse()?));

        Ok(())
    }

    #[test]
    fn rejects_inverted_window() -> TestResult {
        let result = ValidityWindow::new(
            "2026-03-31T00:00:00Z".parse()?,
            Some("2026-03-01T00:00:00Z".parse()?),
        );

        assert!(matches!(result, Err(WindowError::EndsBeforeStart { .. })));

        Ok(())
    }
}
