use std::collections::HashSet;

use url::Url;

use crate::config::Config;
use crate::error::AnalyzeError;
use crate::extract::{domain_of, extract_page};
use crate::models::{ImageCandidate, SourcePage};
use crate::pipeline::Progress;

// ── Constants ────────────────────────────────────────────────────────────────

const USER_AGENT: &str = "episode-scout-api/1.0";

// ── Fetch errors ─────────────────────────────────────────────────────────────

/// Why a single fetch came up empty. Fatal for the seed page, skippable for
/// source pages.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0}")]
    Request(String),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("content type {0:?} is not HTML")]
    NotHtml(String),
}

// ── Crawl outcome ────────────────────────────────────────────────────────────

/// Accumulated output of one crawl: the seed page plus every source page that
/// fetched and parsed cleanly, with images already deduplicated.
#[derive(Debug)]
pub struct CrawlOutcome {
    pub episode_title: String,
    pub episode_text: String,
    pub sources: Vec<SourcePage>,
    pub images: Vec<ImageCandidate>,
}

// ── Seed URL validation ──────────────────────────────────────────────────────

pub fn validate_seed_url(url: &str) -> Result<Url, AnalyzeError> {
    let parsed = Url::parse(url.trim())
        .map_err(|_| AnalyzeError::InvalidUrl("not a valid URL".to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(AnalyzeError::InvalidUrl(
            "only http and https URLs are supported".to_string(),
        ));
    }
    if parsed.host_str().is_none() {
        return Err(AnalyzeError::InvalidUrl("URL has no host".to_string()));
    }
    Ok(parsed)
}

// ── HTTP fetch ───────────────────────────────────────────────────────────────

pub fn build_client(cfg: &Config) -> Result<reqwest::Client, AnalyzeError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
            .parse()
            .unwrap(),
    );
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        "en-US,en;q=0.9".parse().unwrap(),
    );

    reqwest::ClientBuilder::new()
        .connect_timeout(cfg.connect_timeout)
        .timeout(cfg.fetch_timeout)
        .redirect(reqwest::redirect::Policy::limited(10))
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
        .map_err(|e| AnalyzeError::Config(format!("could not build HTTP client: {}", e)))
}

pub fn is_html_content_type(content_type: &str) -> bool {
    let lower = content_type.to_lowercase();
    lower.contains("text/html") || lower.contains("application/xhtml+xml")
}

async fn fetch_html(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Request(format!("timed out: {}", e))
        } else if e.is_connect() {
            FetchError::Request(format!("connection failed: {}", e))
        } else {
            FetchError::Request(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !is_html_content_type(&content_type) {
        return Err(FetchError::NotHtml(content_type));
    }

    response
        .text()
        .await
        .map_err(|e| FetchError::Request(e.to_string()))
}

// ── Crawl orchestrator ───────────────────────────────────────────────────────

/// Fetch the seed page, then walk its outbound links one at a time. The seed
/// fetch is fatal on any failure; each source link is independently skippable.
pub async fn crawl(
    seed_url: &Url,
    cfg: &Config,
    progress: &Progress,
) -> Result<CrawlOutcome, AnalyzeError> {
    let seed_domain = domain_of(seed_url)
        .ok_or_else(|| AnalyzeError::InvalidUrl("URL has no host".to_string()))?;
    let client = build_client(cfg)?;

    progress.send("Fetching episode page");
    let html = fetch_html(&client, seed_url.as_str())
        .await
        .map_err(|e| AnalyzeError::SeedFetch(e.to_string()))?;

    let seed = extract_page(&html, seed_url.as_str(), &seed_domain, cfg.seed_text_cap, cfg);
    tracing::info!(
        url = %seed_url,
        links = seed.links.len(),
        images = seed.images.len(),
        "extracted episode page"
    );

    let mut images = seed.images;
    let mut sources: Vec<SourcePage> = Vec::new();
    let total = seed.links.len().min(cfg.max_sources);

    for (i, link) in seed.links.iter().take(cfg.max_sources).enumerate() {
        progress.send(format!("Reading source {} of {}: {}", i + 1, total, link));
        tokio::time::sleep(cfg.crawl_delay).await;

        match fetch_html(&client, link).await {
            Ok(html) => {
                let page = extract_page(&html, link, &seed_domain, cfg.source_text_cap, cfg);
                tracing::info!(url = %link, images = page.images.len(), "extracted source page");
                images.extend(page.images);
                sources.push(SourcePage {
                    url: link.clone(),
                    title: page.title,
                    text: page.text,
                });
            }
            Err(e) => {
                tracing::warn!(url = %link, error = %e, "skipping source page");
            }
        }
    }

    Ok(CrawlOutcome {
        episode_title: seed.title,
        episode_text: seed.text,
        sources,
        images: dedupe_images(images),
    })
}

// ── Deduplication ────────────────────────────────────────────────────────────

/// Collapse to one candidate per unique URL, first occurrence wins.
pub fn dedupe_images(images: Vec<ImageCandidate>) -> Vec<ImageCandidate> {
    let mut seen: HashSet<String> = HashSet::new();
    images
        .into_iter()
        .filter(|img| seen.insert(img.url.clone()))
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url: &str, page: &str) -> ImageCandidate {
        ImageCandidate {
            url: url.to_string(),
            alt: None,
            caption: None,
            context: None,
            source_page_url: page.to_string(),
            source_page_title: "t".to_string(),
        }
    }

    #[test]
    fn dedupe_keeps_first_seen_metadata() {
        let deduped = dedupe_images(vec![
            candidate("https://a.org/1.jpg", "https://seed.com/ep"),
            candidate("https://b.org/2.jpg", "https://seed.com/ep"),
            candidate("https://a.org/1.jpg", "https://later.org/page"),
        ]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].url, "https://a.org/1.jpg");
        assert_eq!(deduped[0].source_page_url, "https://seed.com/ep");
        assert_eq!(deduped[1].url, "https://b.org/2.jpg");
    }

    #[test]
    fn dedupe_is_idempotent() {
        let once = dedupe_images(vec![
            candidate("https://a.org/1.jpg", "p"),
            candidate("https://a.org/1.jpg", "q"),
            candidate("https://b.org/2.jpg", "p"),
        ]);
        let urls: Vec<String> = once.iter().map(|i| i.url.clone()).collect();
        let twice = dedupe_images(once);
        let urls_twice: Vec<String> = twice.iter().map(|i| i.url.clone()).collect();
        assert_eq!(urls, urls_twice);

        let unique: HashSet<&String> = urls.iter().collect();
        assert_eq!(unique.len(), urls.len());
    }

    #[test]
    fn seed_url_validation() {
        assert!(validate_seed_url("https://podcast.example.com/ep/1").is_ok());
        assert!(validate_seed_url("http://podcast.example.com/ep/1").is_ok());
        assert!(matches!(
            validate_seed_url("ftp://podcast.example.com/ep/1"),
            Err(AnalyzeError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_seed_url("not a url"),
            Err(AnalyzeError::InvalidUrl(_))
        ));
    }

    #[test]
    fn html_content_type_gate() {
        assert!(is_html_content_type("text/html; charset=utf-8"));
        assert!(is_html_content_type("application/xhtml+xml"));
        assert!(!is_html_content_type("application/json"));
        assert!(!is_html_content_type("image/jpeg"));
        assert!(!is_html_content_type(""));
    }

    // ── Crawl loop against a local listener ─────────────────────────────────

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::pipeline::Progress;

    struct TestServer {
        base: String,
        hits: Arc<AtomicUsize>,
    }

    /// Minimal HTTP server: known paths get a 200 with the given content
    /// type and body, everything else a 404.
    async fn spawn_server(routes: Vec<(String, String, String)>) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_inner = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                hits_inner.fetch_add(1, Ordering::SeqCst);
                let routes = routes.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let response = match routes.iter().find(|(p, _, _)| *p == path) {
                        Some((_, content_type, body)) => format!(
                            "HTTP/1.1 200 OK\r\ncontent-type: {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                            content_type,
                            body.len(),
                            body
                        ),
                        None => "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                            .to_string(),
                    };
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        TestServer {
            base: format!("http://{}", addr),
            hits,
        }
    }

    fn fast_cfg() -> Config {
        Config {
            crawl_delay: Duration::from_millis(1),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn failed_seed_fetch_aborts_before_any_source_crawl() {
        let server = spawn_server(vec![]).await;
        let seed = Url::parse(&format!("{}/missing", server.base)).unwrap();

        let err = crawl(&seed, &fast_cfg(), &Progress::none()).await.unwrap_err();
        assert!(matches!(err, AnalyzeError::SeedFetch(_)));
        // Only the seed was requested; no source crawling happened.
        assert_eq!(server.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_html_source_is_skipped_without_aborting() {
        let sources = spawn_server(vec![
            (
                "/bio".to_string(),
                "text/html; charset=utf-8".to_string(),
                r#"<html><head><title>Bio | Site</title></head><body><article>
                    <h1>Jane Doe</h1><p>Bio text.</p><img src="/jane.jpg" alt="Jane">
                </article></body></html>"#
                    .to_string(),
            ),
            (
                "/data.json".to_string(),
                "application/json".to_string(),
                r#"{"a":1}"#.to_string(),
            ),
        ])
        .await;

        let seed_html = format!(
            r#"<html><body><main><p>Episode notes.</p>
                <a href="{base}/data.json">data</a>
                <a href="{base}/bio">bio</a>
            </main></body></html>"#,
            base = sources.base
        );
        let seed_server =
            spawn_server(vec![("/episode".to_string(), "text/html".to_string(), seed_html)]).await;

        // Serve the seed as "localhost" so links to the 127.0.0.1 source
        // server count as off-domain.
        let seed_base = seed_server.base.replace("127.0.0.1", "localhost");
        let seed = Url::parse(&format!("{}/episode", seed_base)).unwrap();

        let outcome = crawl(&seed, &fast_cfg(), &Progress::none()).await.unwrap();
        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(outcome.sources[0].title, "Jane Doe");
        assert!(outcome.images.iter().any(|i| i.url.ends_with("/jane.jpg")));
        // Both links were attempted; the JSON one contributed nothing.
        assert_eq!(sources.hits.load(Ordering::SeqCst), 2);
    }
}
