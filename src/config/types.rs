use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub adapter: AdapterConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Pipeline engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Number of fetcher workers (concurrent transport calls)
    pub fetcher_concurrency: usize,

    /// Number of extractor workers
    pub extractor_concurrency: usize,

    /// Maximum number of pending tasks in the queue
    pub queue_capacity: usize,

    /// Capacity of the fetcher → extractor handoff (defaults to extractor concurrency)
    #[serde(default)]
    pub handoff_capacity: Option<usize>,

    /// Retries after the first failed attempt for transient fetch errors
    #[serde(default = "default_per_task_retries")]
    pub per_task_retries: u32,

    /// Timeout for one fetch attempt and for one extraction (milliseconds)
    #[serde(default = "default_per_task_timeout_ms")]
    pub per_task_timeout_ms: u64,

    /// Delay before the first retry; doubles on every further retry (milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound for the retry delay (milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// How long an extractor waits for queue capacity before admitting
    /// discovered tasks over capacity (milliseconds)
    #[serde(default = "default_discovered_overflow_wait_ms")]
    pub discovered_overflow_wait_ms: u64,

    /// Time granted to in-flight tasks after cancellation (milliseconds)
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Abort the run on the first sink error instead of logging it
    #[serde(default)]
    pub sink_errors_fatal: bool,

    /// Check robots.txt before fetching
    #[serde(default = "default_true")]
    pub respect_robots: bool,
}

fn default_per_task_retries() -> u32 {
    3
}

fn default_per_task_timeout_ms() -> u64 {
    30_000
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_discovered_overflow_wait_ms() -> u64 {
    250
}

fn default_grace_period_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

impl EngineConfig {
    /// Creates an engine configuration with the given pool sizes and queue
    /// capacity; everything else takes its default value
    pub fn new(fetcher_concurrency: usize, extractor_concurrency: usize, queue_capacity: usize) -> Self {
        Self {
            fetcher_concurrency,
            extractor_concurrency,
            queue_capacity,
            handoff_capacity: None,
            per_task_retries: default_per_task_retries(),
            per_task_timeout_ms: default_per_task_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            discovered_overflow_wait_ms: default_discovered_overflow_wait_ms(),
            grace_period_ms: default_grace_period_ms(),
            sink_errors_fatal: false,
            respect_robots: true,
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.per_task_retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_task_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.retry_backoff_ms = base.as_millis() as u64;
        self.max_backoff_ms = max.as_millis() as u64;
        self
    }

    pub fn with_handoff_capacity(mut self, capacity: usize) -> Self {
        self.handoff_capacity = Some(capacity);
        self
    }

    pub fn with_overflow_wait(mut self, wait: Duration) -> Self {
        self.discovered_overflow_wait_ms = wait.as_millis() as u64;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period_ms = grace.as_millis() as u64;
        self
    }

    pub fn with_sink_errors_fatal(mut self, fatal: bool) -> Self {
        self.sink_errors_fatal = fatal;
        self
    }

    pub fn handoff_capacity(&self) -> usize {
        self.handoff_capacity.unwrap_or(self.extractor_concurrency)
    }

    pub fn per_task_timeout(&self) -> Duration {
        Duration::from_millis(self.per_task_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn discovered_overflow_wait(&self) -> Duration {
        Duration::from_millis(self.discovered_overflow_wait_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the harvester
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the harvester
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the harvester
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for harvester-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the user agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Where the harvest starts
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogConfig {
    /// Explicit discovery pages to seed
    #[serde(default)]
    pub root_tasks: Vec<String>,

    /// Listing page URL template containing `{page}`; enables page enumeration
    #[serde(default)]
    pub listing_url: Option<String>,

    /// Number of the listing page that carries the pagination
    #[serde(default)]
    pub first_page: u32,

    /// Upper bound on enumerated listing pages; pagination claiming more
    /// pages than this is truncated
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_max_pages() -> u32 {
    1_000
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root_tasks: Vec::new(),
            listing_url: None,
            first_page: 0,
            max_pages: default_max_pages(),
        }
    }
}

impl CatalogConfig {
    /// Returns the listing page URL for `page`, if a template is configured
    pub fn listing_page(&self, page: u32) -> Option<String> {
        self.listing_url
            .as_ref()
            .map(|template| template.replace("{page}", &page.to_string()))
    }
}

/// CSS selector rules for the bundled site adapter
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AdapterConfig {
    /// Item links on a listing page
    #[serde(default)]
    pub item_links: Option<String>,

    /// Pagination links on a listing page
    #[serde(default)]
    pub pagination: Option<String>,

    /// Query parameter carrying the page number in pagination links
    #[serde(default = "default_page_param")]
    pub page_param: String,

    /// Marker of a multi-item (composite) page
    #[serde(default)]
    pub composite: Option<String>,

    /// Child links on a composite page
    #[serde(default)]
    pub composite_links: Option<String>,

    /// Field whose value identifies a record
    #[serde(default)]
    pub identity_field: Option<String>,

    /// Record fields
    #[serde(default)]
    pub fields: Vec<FieldConfig>,

    /// Literal values added to every record
    #[serde(default)]
    pub constants: BTreeMap<String, String>,
}

fn default_page_param() -> String {
    "page".to_string()
}

/// One record field extracted by selector
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FieldConfig {
    /// Field name in the emitted record
    pub name: String,

    /// CSS selector of the element holding the value
    pub selector: String,

    /// Read this attribute instead of the element text
    #[serde(default)]
    pub attr: Option<String>,

    /// How the raw value is interpreted
    #[serde(default)]
    pub kind: FieldKind,

    /// A page missing this field is an extraction error
    #[serde(default)]
    pub required: bool,

    /// Value used when the selector matches nothing
    #[serde(default)]
    pub default: Option<String>,
}

/// Interpretation of a field's raw value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Print every record as JSON on stdout
    #[serde(default = "default_true")]
    pub console: bool,

    /// Path to the SQLite database file
    #[serde(default)]
    pub database_path: Option<String>,

    /// Path to the markdown run report
    #[serde(default)]
    pub summary_path: Option<String>,

    /// Number of records buffered before a database write
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    25
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            console: true,
            database_path: None,
            summary_path: None,
            batch_size: default_batch_size(),
        }
    }
}
