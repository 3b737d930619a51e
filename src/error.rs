use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("browser init error: {0}")]
    BrowserInit(String),

    #[error("navigation error: {0}")]
    Navigation(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("javascript error: {0}")]
    JavaScript(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("page load stalled for key {0}")]
    Stall(String),

    #[error("file I/O error: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("retry budget exhausted for key {key}: {attempts} attempts")]
    RetryBudget { key: String, attempts: u32 },
}

impl ScraperError {
    /// Failures the controller recovers from by re-navigating and
    /// retrying the same key.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScraperError::Navigation(_)
                | ScraperError::ElementNotFound(_)
                | ScraperError::JavaScript(_)
                | ScraperError::Timeout(_)
                | ScraperError::Stall(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ScraperError::Stall("P1-00001".into()).is_retryable());
        assert!(ScraperError::ElementNotFound("input".into()).is_retryable());
        assert!(!ScraperError::BrowserInit("no chrome".into()).is_retryable());
        assert!(!ScraperError::RetryBudget {
            key: "P1-00001".into(),
            attempts: 25
        }
        .is_retryable());
    }
}
