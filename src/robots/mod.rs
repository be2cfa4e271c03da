//! Robots.txt handling module
//!
//! This module fetches, parses and caches robots.txt files per origin so the
//! HTTP transport can refuse references a site asks crawlers to avoid.

mod cache;
mod parser;

pub use cache::CachedRobots;
pub use parser::ParsedRobots;

use crate::url::origin_key;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use url::Url;

/// Robots.txt rules shared by every fetcher worker
///
/// Each origin's robots.txt is fetched on first use and refreshed once the
/// cached copy is a day old.
#[derive(Debug)]
pub struct RobotsCache {
    /// Product token matched against `User-agent` lines
    agent: String,
    entries: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether `url` may be fetched, fetching robots.txt if needed
    pub async fn is_allowed(&self, client: &Client, url: &Url) -> bool {
        let Some(origin) = origin_key(url) else {
            return true;
        };

        if let Some(cached) = self.lookup(&origin) {
            return cached.is_allowed(url.as_str(), &self.agent);
        }

        tracing::debug!("Fetching robots.txt for {}", origin);
        let robots = fetch_robots(client, url).await;
        let allowed = robots.is_allowed(url.as_str(), &self.agent);
        self.lock().insert(origin, CachedRobots::new(robots));
        allowed
    }

    /// Number of origins with cached rules
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lookup(&self, origin: &str) -> Option<CachedRobots> {
        self.lock()
            .get(origin)
            .filter(|cached| !cached.is_stale())
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedRobots>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Fetches robots.txt for the origin of `url`
///
/// A missing, unreachable or undecodable robots.txt allows everything.
pub async fn fetch_robots(client: &Client, url: &Url) -> ParsedRobots {
    let mut robots_url = url.clone();
    robots_url.set_path("/robots.txt");
    robots_url.set_query(None);
    robots_url.set_fragment(None);

    let response = match client.get(robots_url.as_str()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("Could not fetch {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::debug!("No robots.txt at {} ({})", robots_url, response.status());
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            tracing::debug!("Unreadable robots.txt at {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
