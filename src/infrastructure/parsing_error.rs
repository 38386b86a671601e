//! Extraction error types
//!
//! Site-level failures are classified so the run loop can tell a recoverable
//! per-site problem from a fatal session problem.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Container not found on {site} (tried: {})", selectors.join(", "))]
    ContainerMissing { site: String, selectors: Vec<String> },

    #[error("No records extracted from {site} (page {page})")]
    NoRecords { site: String, page: u32 },

    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Interaction '{action}' failed: {reason}")]
    Interaction { action: String, reason: String },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Browser session lifecycle failure: {reason}")]
    SessionLifecycle { reason: String },

    #[error("Workbook {path} could not be read: {reason}")]
    Workbook { path: String, reason: String },
}

impl ExtractionError {
    pub fn container_missing(site: &str, selectors: &[String]) -> Self {
        Self::ContainerMissing {
            site: site.to_string(),
            selectors: selectors.to_vec(),
        }
    }

    pub fn no_records(site: &str, page: u32) -> Self {
        Self::NoRecords {
            site: site.to_string(),
            page,
        }
    }

    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn interaction(action: &str, reason: impl ToString) -> Self {
        Self::Interaction {
            action: action.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn navigation(url: &str, reason: impl ToString) -> Self {
        Self::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn session(reason: impl ToString) -> Self {
        Self::SessionLifecycle {
            reason: reason.to_string(),
        }
    }

    pub fn workbook(path: &str, reason: impl ToString) -> Self {
        Self::Workbook {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Recoverable errors are confined to one step, page or site
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ContainerMissing { .. } => true,
            Self::NoRecords { .. } => true,
            Self::InvalidSelector { .. } => false,
            Self::Interaction { .. } => true,
            Self::Navigation { .. } => true,
            Self::SessionLifecycle { .. } => false,
            Self::Workbook { .. } => true,
        }
    }

    /// Only a broken browser session stops the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionLifecycle { .. })
    }
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Outcome of a single click/expand dispatched into the page
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InteractionError {
    /// The element was detached by a DOM replacement between lookup and action
    #[error("stale element reference")]
    Stale,

    #[error("element not found")]
    NotFound,

    #[error("script error: {0}")]
    Script(String),
}

impl InteractionError {
    /// Stale and missing elements are worth one re-lookup
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Stale | Self::NotFound)
    }
}

impl From<InteractionError> for ExtractionError {
    fn from(err: InteractionError) -> Self {
        Self::interaction("click", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_session_failures_are_fatal() {
        assert!(ExtractionError::session("launch failed").is_fatal());
        assert!(!ExtractionError::navigation("https://x", "timeout").is_fatal());
        assert!(!ExtractionError::no_records("kia", 1).is_fatal());
        assert!(ExtractionError::container_missing("kgta", &[".faq_list".into()]).is_recoverable());
    }

    #[test]
    fn test_container_missing_message_lists_selectors() {
        let err = ExtractionError::container_missing("kgta", &[".faq_list".into(), "dl".into()]);
        assert_eq!(err.to_string(), "Container not found on kgta (tried: .faq_list, dl)");
    }
}
