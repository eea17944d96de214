//! Page metadata enrichment
//!
//! Fetches each bookmarked page over plain HTTP and pulls title, description
//! and keyword tags out of the `<head>`. Fetches run concurrently, bounded by a
//! semaphore; results are applied back in input order. Per-record failures are
//! logged and leave that record's metadata as it was.

use crate::error::Result;
use crate::schema::BookmarkRecord;
use futures::future::join_all;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

/// Keyword tags kept per page, to keep prompts small.
pub const TAG_TRIM_LIMIT: usize = 20;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36";

/// Which records to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichMode {
    /// Refetch every record
    All,
    /// Only records with no title, description or tags yet
    OnlyMissing,
}

/// Configuration for metadata enrichment
#[derive(Debug, Clone)]
pub struct MetadataConfig {
    pub timeout_ms: u64,
    pub workers: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 8000,
            workers: 12,
        }
    }
}

/// Fields found on one page; `None` means "not present, keep what we had".
#[derive(Debug, Default, PartialEq)]
struct PageMetadata {
    title: Option<String>,
    description: Option<String>,
    tags: Option<Vec<String>>,
}

/// Fetch metadata for `records` in place. Returns how many records were
/// updated from a fetched HTML page.
pub async fn enrich_with_metadata(
    records: &mut [BookmarkRecord],
    mode: EnrichMode,
    config: &MetadataConfig,
) -> Result<usize> {
    let client = Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .timeout(Duration::from_millis(config.timeout_ms))
        .build()?;
    let semaphore = Semaphore::new(config.workers.max(1));

    let targets: Vec<(usize, String)> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| !should_skip(r, mode))
        .map(|(i, r)| (i, r.url.clone()))
        .collect();

    debug!(
        "Fetching metadata for {} of {} bookmarks ({} parallel)",
        targets.len(),
        records.len(),
        config.workers.max(1)
    );

    let fetched = join_all(targets.iter().map(|(_, url)| {
        let client = &client;
        let semaphore = &semaphore;
        async move {
            let _permit = semaphore.acquire().await.ok()?;
            fetch_metadata(client, url).await
        }
    }))
    .await;

    let mut updated = 0;
    for ((idx, _), page) in targets.iter().zip(fetched) {
        if let Some(page) = page {
            apply(&mut records[*idx], page);
            updated += 1;
        }
    }

    info!("Fetched metadata for {}/{} bookmarks", updated, targets.len());
    Ok(updated)
}

fn should_skip(record: &BookmarkRecord, mode: EnrichMode) -> bool {
    match mode {
        EnrichMode::All => false,
        EnrichMode::OnlyMissing => !record.metadata.is_empty(),
    }
}

fn apply(record: &mut BookmarkRecord, page: PageMetadata) {
    if let Some(title) = page.title {
        record.metadata.title = title;
    }
    if let Some(description) = page.description {
        record.metadata.description = description;
    }
    if let Some(tags) = page.tags {
        record.metadata.tags = tags;
    }
}

async fn fetch_metadata(client: &Client, url: &str) -> Option<PageMetadata> {
    let response = fetch_with_fallback(client, url).await?;

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    if !content_type.contains("text/html") {
        debug!("Skipping non-HTML content for {} (content-type={})", url, content_type);
        return None;
    }

    match response.text().await {
        Ok(html) => Some(extract_metadata(&html, url)),
        Err(e) => {
            warn!("Failed to read body for {}: {}", url, e);
            None
        }
    }
}

/// GET `url`; on 401/403/407 try the site root once instead.
async fn fetch_with_fallback(client: &Client, url: &str) -> Option<reqwest::Response> {
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            warn!("Failed to fetch metadata for {}: {}", url, e);
            return None;
        }
    };

    let status = response.status();
    if status.is_success() {
        return Some(response);
    }

    if matches!(status.as_u16(), 401 | 403 | 407) {
        if let Some(root) = root_url(url) {
            debug!(
                "Permission error ({}) for {}; retrying with root {}",
                status, url, root
            );
            match client.get(&root).send().await {
                Ok(r) if r.status().is_success() => return Some(r),
                Ok(r) => debug!("Fallback request to {} failed: HTTP {}", root, r.status()),
                Err(e) => debug!("Fallback request to {} failed: {}", root, e),
            }
        }
    }

    debug!("HTTP {} for {}", status, url);
    None
}

/// `scheme://host[:port]/` for `url`, if that differs from `url` itself.
fn root_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str()?;
    let mut root = parsed.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    (root != parsed).then(|| root.to_string())
}

fn extract_metadata(html: &str, url: &str) -> PageMetadata {
    let doc = Html::parse_document(html);

    let title = select_attr(&doc, "meta[property='og:title']", "content")
        .or_else(|| select_attr(&doc, "meta[name='twitter:title']", "content"))
        .or_else(|| select_text(&doc, "title"));

    let description = select_attr(&doc, "meta[property='og:description']", "content")
        .or_else(|| select_attr(&doc, "meta[name='description']", "content"))
        .or_else(|| select_attr(&doc, "meta[name='twitter:description']", "content"));

    let tags = raw_attr(&doc, "meta[name='keywords']", "content").map(|content| {
        let mut tags: Vec<String> = content
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
        if tags.len() > TAG_TRIM_LIMIT {
            debug!("Trimming {} tags to {} for {}", tags.len(), TAG_TRIM_LIMIT, url);
            tags.truncate(TAG_TRIM_LIMIT);
        }
        tags
    });

    PageMetadata {
        title,
        description,
        tags,
    }
}

fn select_text(doc: &Html, sel: &str) -> Option<String> {
    let selector = Selector::parse(sel).ok()?;
    doc.select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn select_attr(doc: &Html, sel: &str, attr: &str) -> Option<String> {
    raw_attr(doc, sel, attr)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn raw_attr(doc: &Html, sel: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(sel).ok()?;
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page(title: &str, desc: &str, keywords: &str) -> String {
        let mut html = String::from("<html><head>");
        if !title.is_empty() {
            html.push_str(&format!("<title>{title}</title>"));
        }
        if !desc.is_empty() {
            html.push_str(&format!(r#"<meta name="description" content="{desc}" />"#));
        }
        if !keywords.is_empty() {
            html.push_str(&format!(r#"<meta name="keywords" content="{keywords}" />"#));
        }
        html.push_str("</head><body></body></html>");
        html
    }

    async fn serve_html(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
            .mount(server)
            .await;
    }

    #[test]
    fn test_extract_metadata_prefers_open_graph() {
        let html = r#"<html><head>
            <title>Plain</title>
            <meta property="og:title" content=" OG Title ">
            <meta name="twitter:description" content="Tweet desc">
            <meta name="keywords" content="a, b,, c">
        </head></html>"#;
        let meta = extract_metadata(html, "https://x.example");
        assert_eq!(meta.title.as_deref(), Some("OG Title"));
        assert_eq!(meta.description.as_deref(), Some("Tweet desc"));
        assert_eq!(meta.tags, Some(vec!["a".into(), "b".into(), "c".into()]));
    }

    #[test]
    fn test_extract_metadata_caps_tags() {
        let keywords: Vec<String> = (0..30).map(|i| format!("k{i}")).collect();
        let html = page("T", "", &keywords.join(","));
        let meta = extract_metadata(&html, "https://x.example");
        let tags = meta.tags.unwrap();
        assert_eq!(tags.len(), TAG_TRIM_LIMIT);
        assert_eq!(tags[0], "k0");
    }

    #[test]
    fn test_root_url() {
        assert_eq!(
            root_url("https://a.example/private/page?x=1"),
            Some("https://a.example/".to_string())
        );
        assert_eq!(root_url("https://a.example/"), None);
        assert_eq!(root_url("javascript:void(0)"), None);
    }

    #[tokio::test]
    async fn test_enrich_only_missing() {
        let server = MockServer::start().await;
        serve_html(&server, "/alpha", page("Alpha Title", "Alpha Desc", "alpha,one")).await;
        serve_html(&server, "/beta", page("Beta Title", "Beta Desc", "beta,two")).await;

        let mut alpha = BookmarkRecord::new("Alpha", format!("{}/alpha", server.uri()), "Root");
        alpha.metadata.title = "Existing".to_string();
        let beta = BookmarkRecord::new("Beta", format!("{}/beta", server.uri()), "Root");
        let mut records = vec![alpha, beta];

        let updated = enrich_with_metadata(
            &mut records,
            EnrichMode::OnlyMissing,
            &MetadataConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(updated, 1);
        assert_eq!(records[0].metadata.title, "Existing");
        assert!(records[0].metadata.tags.is_empty());
        assert_eq!(records[1].metadata.title, "Beta Title");
        assert!(records[1].metadata.tags.contains(&"two".to_string()));
    }

    #[tokio::test]
    async fn test_enrich_all_preserves_order() {
        let server = MockServer::start().await;
        let mut records = Vec::new();
        for i in 0..8 {
            let route = format!("/p{i}");
            serve_html(&server, &route, page(&format!("Page {i}"), "", "")).await;
            records.push(BookmarkRecord::new(
                format!("P{i}"),
                format!("{}{route}", server.uri()),
                "",
            ));
        }
        records[3].metadata.title = "stale".to_string();

        let config = MetadataConfig {
            timeout_ms: 5000,
            workers: 3,
        };
        let updated = enrich_with_metadata(&mut records, EnrichMode::All, &config)
            .await
            .unwrap();

        assert_eq!(updated, 8);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.metadata.title, format!("Page {i}"));
            assert_eq!(record.title_before, format!("P{i}"));
        }
    }

    #[tokio::test]
    async fn test_enrich_falls_back_to_root_on_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/private"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        serve_html(&server, "/", page("Site Root", "Root desc", "")).await;

        let mut records = vec![BookmarkRecord::new(
            "Private",
            format!("{}/private", server.uri()),
            "",
        )];
        enrich_with_metadata(&mut records, EnrichMode::All, &MetadataConfig::default())
            .await
            .unwrap();

        assert_eq!(records[0].metadata.title, "Site Root");
        assert_eq!(records[0].metadata.description, "Root desc");
    }

    #[tokio::test]
    async fn test_enrich_swallows_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4", "application/pdf"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut records = vec![
            BookmarkRecord::new("Pdf", format!("{}/pdf", server.uri()), ""),
            BookmarkRecord::new("Gone", format!("{}/gone", server.uri()), ""),
            BookmarkRecord::new("Bad", "not a url", ""),
        ];
        let updated =
            enrich_with_metadata(&mut records, EnrichMode::All, &MetadataConfig::default())
                .await
                .unwrap();

        assert_eq!(updated, 0);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.metadata.is_empty()));
        assert_eq!(records[2].title_before, "Bad");
    }
}
