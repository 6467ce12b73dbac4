//! Best-effort page metadata extraction.
//!
//! The extractor fetches the target page once and pulls a handful of fields out of the
//! HTML. Nothing here can fail the caller: every error degrades to an empty
//! [`PageMetadata`].

use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
const H2_SEPARATOR: &str = " | ";
const USER_AGENT: &str = concat!("llmtxt/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    pub h1: String,
    pub h2: String,
}

impl PageMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.description.is_empty()
            && self.h1.is_empty()
            && self.h2.is_empty()
    }
}

/// Source of page metadata for the generation pipeline.
///
/// Implementations return a value, never an error: a page that cannot be fetched or
/// parsed yields `PageMetadata::default()`.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn extract(&self, url: &Url) -> PageMetadata;
}

#[derive(Debug, Clone)]
pub struct PageMetadataExtractor {
    client: reqwest::Client,
}

impl PageMetadataExtractor {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(USER_AGENT)
            .build()
            .context("build metadata http client")?;
        Ok(Self { client })
    }

    async fn fetch_html(&self, url: &Url) -> anyhow::Result<String> {
        let resp = self
            .client
            .get(url.clone())
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("GET {url} returned {status}");
        }

        let (text, truncated) = read_text_limited(resp, MAX_BODY_BYTES).await?;
        if truncated {
            tracing::debug!(url = %url, limit = MAX_BODY_BYTES, "page body truncated");
        }
        Ok(text)
    }
}

#[async_trait]
impl MetadataSource for PageMetadataExtractor {
    async fn extract(&self, url: &Url) -> PageMetadata {
        match self.fetch_html(url).await {
            Ok(html) => parse_metadata(&html),
            Err(err) => {
                tracing::warn!(url = %url, error = %format!("{err:#}"), "page metadata unavailable");
                PageMetadata::default()
            }
        }
    }
}

async fn read_text_limited(
    mut resp: reqwest::Response,
    limit: usize,
) -> anyhow::Result<(String, bool)> {
    let mut out: Vec<u8> = Vec::new();
    let mut truncated = false;

    while let Some(chunk) = resp.chunk().await.context("read response chunk")? {
        if out.len() + chunk.len() > limit {
            let remaining = limit.saturating_sub(out.len());
            out.extend_from_slice(&chunk[..remaining]);
            truncated = true;
            break;
        }
        out.extend_from_slice(&chunk);
    }

    Ok((String::from_utf8_lossy(&out).into_owned(), truncated))
}

pub fn parse_metadata(html: &str) -> PageMetadata {
    let document = Html::parse_document(html);

    let title = select_all_text(&document, "title")
        .concat()
        .trim()
        .to_owned();

    let description = selector("meta[name=\"description\"]")
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .and_then(|el| el.value().attr("content"))
                .map(|content| content.trim().to_owned())
        })
        .unwrap_or_default();

    let h1 = select_all_text(&document, "h1")
        .into_iter()
        .next()
        .map(|text| text.trim().to_owned())
        .unwrap_or_default();

    let h2 = select_all_text(&document, "h2")
        .iter()
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(H2_SEPARATOR);

    PageMetadata {
        title,
        description,
        h1,
        h2,
    }
}

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(err) => {
            tracing::error!(css, error = ?err, "invalid css selector");
            None
        }
    }
}

fn select_all_text(document: &Html, css: &str) -> Vec<String> {
    let Some(sel) = selector(css) else {
        return Vec::new();
    };
    document
        .select(&sel)
        .map(|el| el.text().collect::<String>())
        .collect()
}
