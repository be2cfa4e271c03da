//! Robots.txt caching implementation
//!
//! Cached rules expire after 24 hours so changes made by the site owner are
//! picked up during long harvests.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};

/// Robots.txt rules for one origin, with the time they were fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub content: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Creates a new CachedRobots instance stamped with the current time
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the cached robots.txt is older than 24 hours
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }

    /// Checks if a URL is allowed according to the cached robots.txt
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to check
    /// * `user_agent` - The crawler's product token
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        self.content.is_allowed(url, user_agent)
    }
}
