use std::time::Duration;

use crate::domain::platform::host_user_agent;

/// One `<img>` element found in the page, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Absolute source URL, or the raw attribute value when it could not be
    /// resolved. Empty when the element has no `src`.
    pub source: String,
}

/// Configuration for the page client
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    /// Upper bound on a single image load. `None` waits forever.
    pub load_timeout: Option<Duration>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: host_user_agent().to_string(),
            load_timeout: Some(Duration::from_secs(30)),
        }
    }
}
