//! Paged-source state machine.
//!
//! 상태는 AtPage(n) 과 Exhausted 두 가지뿐이며, Exhausted 는 되돌릴 수 없다.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a paged source controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PagerState {
    /// 1-based page currently rendered
    AtPage(u32),
    Exhausted,
}

/// Why a pager stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExhaustionReason {
    /// next control disabled or missing
    ControlUnavailable,
    /// derived total page count reached
    TotalReached,
    /// page transition left the content container empty
    EmptyAfterTransition,
}

impl PagerState {
    pub const fn first() -> Self {
        Self::AtPage(1)
    }

    pub fn page(&self) -> Option<u32> {
        match self {
            Self::AtPage(n) => Some(*n),
            Self::Exhausted => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }

    /// AtPage(n) → AtPage(n+1); Exhausted stays Exhausted
    #[must_use]
    pub fn advance(self) -> Self {
        match self {
            Self::AtPage(n) => Self::AtPage(n.saturating_add(1)),
            Self::Exhausted => Self::Exhausted,
        }
    }

    /// Next state given a known total page count
    #[must_use]
    pub fn advance_within(self, total_pages: u32) -> Self {
        match self.advance() {
            Self::AtPage(n) if n <= total_pages => Self::AtPage(n),
            _ => Self::Exhausted,
        }
    }
}

impl fmt::Display for PagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtPage(n) => write!(f, "page {}", n),
            Self::Exhausted => f.write_str("exhausted"),
        }
    }
}

impl fmt::Display for ExhaustionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ControlUnavailable => "next control unavailable",
            Self::TotalReached => "total page count reached",
            Self::EmptyAfterTransition => "empty page after transition",
        };
        f.write_str(text)
    }
}
