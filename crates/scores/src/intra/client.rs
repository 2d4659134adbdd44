//! 42 Intra API HTTP client
//!
//! Drives paginated collection fetches under rate-limit pressure.
//! A pure producer of rows: no side effects beyond outbound calls.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use ureq::http::HeaderMap;
use ureq::Agent;
use url::Url;

use super::TokenManager;
use crate::error::SyncError;

/// Default rows per page for collection endpoints (upstream maximum).
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Retry bounds for rate-limited page fetches.
///
/// A 429 retries the same page after the server's Retry-After hint, or
/// after `fallback_delay_secs * attempt` when the hint is absent.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub fallback_delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            fallback_delay_secs: 2,
        }
    }
}

impl RetryPolicy {
    fn fallback_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.fallback_delay_secs * attempt as u64)
    }
}

/// Server-reported totals observed on a page response.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageTotals {
    /// Explicit total-page count (`x-total-pages`)
    pub total_pages: Option<u32>,
    /// Total-item count (`x-total`), converted via ceil division
    pub total_items: Option<u64>,
}

/// Transient traversal state for one paginated fetch.
///
/// Total resolution priority: explicit page count, then item count
/// divided by page size, then inferred termination (a short page is
/// the last, but only when no total was reported). An empty page is
/// always terminal. `max_pages` caps expensive global scans.
#[derive(Debug)]
pub struct PageCursor {
    page_size: u32,
    max_pages: Option<u32>,
    next_page: u32,
    pages_fetched: u32,
    total_pages: Option<u32>,
    reported_total_pages: Option<u32>,
    done: bool,
}

impl PageCursor {
    pub fn new(page_size: u32, max_pages: Option<u32>) -> Self {
        Self {
            page_size: page_size.max(1),
            max_pages,
            next_page: 1,
            pages_fetched: 0,
            total_pages: None,
            reported_total_pages: None,
            done: false,
        }
    }

    /// Next 1-indexed page to request, or None when the traversal is done.
    pub fn next_page(&mut self) -> Option<u32> {
        if self.done {
            return None;
        }
        if let Some(max) = self.max_pages {
            if self.pages_fetched >= max {
                self.done = true;
                return None;
            }
        }
        if let Some(total) = self.total_pages {
            if self.next_page > total {
                self.done = true;
                return None;
            }
        }
        Some(self.next_page)
    }

    /// Record a fetched page: row count plus any server-reported totals.
    pub fn observe(&mut self, rows: usize, totals: PageTotals) {
        self.pages_fetched += 1;
        self.next_page += 1;

        if self.total_pages.is_none() {
            if let Some(total_pages) = totals.total_pages {
                self.total_pages = Some(total_pages);
                self.reported_total_pages = Some(total_pages);
            } else if let Some(total_items) = totals.total_items {
                let derived = total_items.div_ceil(self.page_size as u64) as u32;
                self.total_pages = Some(derived);
                self.reported_total_pages = Some(derived);
            }
        }

        // An empty page always terminates. A short page is only treated
        // as the last when the server never reported a total; a reported
        // total outranks inference and the walk continues to it.
        if rows == 0 || (self.total_pages.is_none() && (rows as u32) < self.page_size) {
            self.done = true;
        }
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn reported_total_pages(&self) -> Option<u32> {
        self.reported_total_pages
    }
}

/// Result of a full paginated traversal.
#[derive(Debug)]
pub struct FetchResult {
    /// Rows in page order (page 1 before page 2, and so on)
    pub rows: Vec<Value>,
    pub pages_fetched: u32,
    pub reported_total_pages: Option<u32>,
}

/// HTTP client for the 42 Intra API.
pub struct IntraClient {
    agent: Agent,
    base_url: String,
    auth: Arc<TokenManager>,
    retry: RetryPolicy,
}

impl IntraClient {
    pub fn new(auth: Arc<TokenManager>, base_url: impl Into<String>) -> Self {
        Self {
            agent: super::build_agent(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy (tests use short budgets).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch every page of a collection endpoint.
    ///
    /// Appends `page` and `per_page` to `params` on each request and
    /// walks a 1-indexed page counter until the cursor terminates.
    /// `token_override` bypasses the token manager for this traversal.
    pub fn fetch_all(
        &self,
        path: &str,
        params: &[(String, String)],
        page_size: u32,
        max_pages: Option<u32>,
        token_override: Option<&str>,
    ) -> Result<FetchResult, SyncError> {
        let token = self.bearer(token_override)?;
        let mut cursor = PageCursor::new(page_size, max_pages);
        let mut rows: Vec<Value> = Vec::new();

        while let Some(page) = cursor.next_page() {
            let mut url = self.endpoint_url(path)?;
            {
                let mut query = url.query_pairs_mut();
                for (key, value) in params {
                    query.append_pair(key, value);
                }
                query.append_pair("page", &page.to_string());
                query.append_pair("per_page", &page_size.to_string());
            }

            let (page_rows, totals) = self.fetch_page_with_retry(&url, &token)?;
            log::debug!(
                "fetched page {} of {} ({} rows)",
                page,
                path,
                page_rows.len()
            );
            cursor.observe(page_rows.len(), totals);
            rows.extend(page_rows);
        }

        Ok(FetchResult {
            rows,
            pages_fetched: cursor.pages_fetched(),
            reported_total_pages: cursor.reported_total_pages(),
        })
    }

    /// Single authorized GET returning the raw JSON payload.
    ///
    /// Used by the raw-fetch proxy; responses land in the audit table
    /// rather than the structured score table.
    pub fn get_json(&self, endpoint: &str, token_override: Option<&str>) -> Result<Value, SyncError> {
        let token = self.bearer(token_override)?;
        let url = self.endpoint_url(endpoint)?;

        let mut response = self
            .agent
            .get(url.as_str())
            .header("Authorization", &format!("Bearer {}", token))
            .call()
            .map_err(|e| SyncError::fetch(None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(SyncError::fetch(Some(status.as_u16()), body));
        }

        response
            .body_mut()
            .read_json()
            .map_err(|e| SyncError::fetch(None, format!("invalid response payload: {}", e)))
    }

    fn bearer(&self, token_override: Option<&str>) -> Result<String, SyncError> {
        match token_override {
            Some(token) => Ok(token.to_string()),
            None => self.auth.ensure_token(),
        }
    }

    fn endpoint_url(&self, path: &str) -> Result<Url, SyncError> {
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| SyncError::validation(format!("invalid endpoint '{}': {}", path, e)))
    }

    /// Fetch one page, retrying the same page on 429 within the retry
    /// budget. Any other non-2xx aborts with the upstream status and body.
    fn fetch_page_with_retry(
        &self,
        url: &Url,
        token: &str,
    ) -> Result<(Vec<Value>, PageTotals), SyncError> {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let mut response = self
                .agent
                .get(url.as_str())
                .header("Authorization", &format!("Bearer {}", token))
                .call()
                .map_err(|e| SyncError::fetch(None, e.to_string()))?;

            let status = response.status();
            if status.as_u16() == 429 {
                if attempt >= self.retry.max_attempts {
                    return Err(SyncError::fetch(
                        Some(429),
                        format!("rate limited; gave up after {} attempts", attempt),
                    ));
                }
                let delay = retry_after(response.headers())
                    .unwrap_or_else(|| self.retry.fallback_delay(attempt));
                log::debug!(
                    "rate limited on {}; retrying in {:?} (attempt {})",
                    url.path(),
                    delay,
                    attempt
                );
                std::thread::sleep(delay);
                continue;
            }

            if !status.is_success() {
                let body = response.body_mut().read_to_string().unwrap_or_default();
                return Err(SyncError::fetch(Some(status.as_u16()), body));
            }

            let totals = PageTotals {
                total_pages: header_u32(response.headers(), "x-total-pages"),
                total_items: header_u64(response.headers(), "x-total"),
            };

            let rows: Vec<Value> = response
                .body_mut()
                .read_json()
                .map_err(|e| SyncError::fetch(None, format!("invalid page payload: {}", e)))?;

            return Ok((rows, totals));
        }
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_u64(headers, "retry-after").map(Duration::from_secs)
}

fn header_u32(headers: &HeaderMap, name: &str) -> Option<u32> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_explicit_total_pages() {
        let mut cursor = PageCursor::new(100, None);

        assert_eq!(cursor.next_page(), Some(1));
        cursor.observe(
            100,
            PageTotals {
                total_pages: Some(3),
                total_items: None,
            },
        );

        assert_eq!(cursor.next_page(), Some(2));
        cursor.observe(100, PageTotals::default());

        assert_eq!(cursor.next_page(), Some(3));
        cursor.observe(100, PageTotals::default());

        // Page 4 is never requested even though page 3 was full.
        assert_eq!(cursor.next_page(), None);
        assert_eq!(cursor.pages_fetched(), 3);
        assert_eq!(cursor.reported_total_pages(), Some(3));
    }

    #[test]
    fn test_cursor_total_pages_wins_over_total_items() {
        let mut cursor = PageCursor::new(100, None);
        cursor.next_page();
        cursor.observe(
            100,
            PageTotals {
                total_pages: Some(2),
                total_items: Some(100_000),
            },
        );
        assert_eq!(cursor.reported_total_pages(), Some(2));
    }

    #[test]
    fn test_cursor_derives_total_from_item_count() {
        let mut cursor = PageCursor::new(100, None);
        cursor.next_page();
        cursor.observe(
            100,
            PageTotals {
                total_pages: None,
                total_items: Some(237),
            },
        );
        // ceil(237 / 100) = 3
        assert_eq!(cursor.reported_total_pages(), Some(3));

        assert_eq!(cursor.next_page(), Some(2));
        cursor.observe(100, PageTotals::default());
        assert_eq!(cursor.next_page(), Some(3));
        cursor.observe(37, PageTotals::default());
        assert_eq!(cursor.next_page(), None);
    }

    #[test]
    fn test_cursor_reported_total_outranks_short_page() {
        let mut cursor = PageCursor::new(100, None);

        // Server says 3 pages but under-fills each one.
        cursor.next_page();
        cursor.observe(
            80,
            PageTotals {
                total_pages: Some(3),
                total_items: None,
            },
        );
        assert_eq!(cursor.next_page(), Some(2));
        cursor.observe(80, PageTotals::default());
        assert_eq!(cursor.next_page(), Some(3));
        cursor.observe(80, PageTotals::default());

        assert_eq!(cursor.next_page(), None);
        assert_eq!(cursor.pages_fetched(), 3);
    }

    #[test]
    fn test_cursor_empty_page_is_terminal_despite_total() {
        let mut cursor = PageCursor::new(100, None);
        cursor.next_page();
        cursor.observe(
            0,
            PageTotals {
                total_pages: Some(5),
                total_items: None,
            },
        );
        assert_eq!(cursor.next_page(), None);
        assert_eq!(cursor.pages_fetched(), 1);
    }

    #[test]
    fn test_cursor_infers_termination_from_short_page() {
        let mut cursor = PageCursor::new(100, None);
        cursor.next_page();
        cursor.observe(100, PageTotals::default());
        assert_eq!(cursor.next_page(), Some(2));
        cursor.observe(42, PageTotals::default());
        assert_eq!(cursor.next_page(), None);
        assert_eq!(cursor.reported_total_pages(), None);
        assert_eq!(cursor.pages_fetched(), 2);
    }

    #[test]
    fn test_cursor_stops_on_empty_page() {
        let mut cursor = PageCursor::new(100, None);
        cursor.next_page();
        cursor.observe(0, PageTotals::default());
        assert_eq!(cursor.next_page(), None);
        assert_eq!(cursor.pages_fetched(), 1);
    }

    #[test]
    fn test_cursor_respects_max_pages() {
        let mut cursor = PageCursor::new(100, Some(2));
        cursor.next_page();
        cursor.observe(
            100,
            PageTotals {
                total_pages: Some(50),
                total_items: None,
            },
        );
        assert_eq!(cursor.next_page(), Some(2));
        cursor.observe(100, PageTotals::default());
        assert_eq!(cursor.next_page(), None);
        assert_eq!(cursor.pages_fetched(), 2);
    }

    #[test]
    fn test_retry_policy_fallback_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.fallback_delay(1), Duration::from_secs(2));
        assert_eq!(policy.fallback_delay(3), Duration::from_secs(6));
    }
}
