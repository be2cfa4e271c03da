//! Listing page enumeration for catalog seeding

use crate::adapter::SiteAdapter;
use crate::config::CatalogConfig;
use crate::crawler::task::Task;
use crate::crawler::transport::{FetchError, Transport};
use std::time::Duration;

/// Builds one discovery task per listing page of the catalog
///
/// Fetches the first listing page, reads the last page number from its
/// pagination and seeds `first_page..=last`, truncated to `max_pages`
/// pages. When the page count cannot be determined only the first page is
/// seeded.
pub async fn enumerate_catalog_pages(
    transport: &dyn Transport,
    adapter: &dyn SiteAdapter,
    catalog: &CatalogConfig,
    timeout: Duration,
) -> Vec<Task> {
    let first_page = catalog.first_page;
    let Some(first_url) = catalog.listing_page(first_page) else {
        return Vec::new();
    };

    let fetched = match tokio::time::timeout(timeout, transport.fetch(&first_url)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout),
    };

    let last_page = match fetched {
        Ok(document) => adapter.page_count(&document),
        Err(e) => {
            tracing::warn!("Could not fetch listing page {}: {}", first_url, e);
            None
        }
    };

    let Some(last_page) = last_page else {
        tracing::warn!(
            "Could not determine page count from {}, seeding the first page only",
            first_url
        );
        return vec![Task::discovery(first_url)];
    };

    let limit = first_page.saturating_add(catalog.max_pages.max(1) - 1);
    let last_page = last_page.max(first_page);
    if last_page > limit {
        tracing::warn!(
            "Pagination on {} claims {} pages, enumerating the first {} only",
            first_url,
            last_page - first_page + 1,
            catalog.max_pages
        );
    }
    let last_page = last_page.min(limit);

    tracing::info!(
        "Catalog has listing pages {}..={} ({} pages)",
        first_page,
        last_page,
        last_page - first_page + 1
    );

    (first_page..=last_page)
        .filter_map(|page| catalog.listing_page(page))
        .map(Task::discovery)
        .collect()
}
