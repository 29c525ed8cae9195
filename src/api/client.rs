use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;
use reqwest::Client;
use thiserror::Error;
use url::Url;

use super::models::{FetchConfig, ImageRef};

static HTML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment pattern"));

static IMG_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b(?:[^>"']|"[^"]*"|'[^']*')*>"#).expect("valid img pattern")
});

static BASE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<base\b(?:[^>"']|"[^"]*"|'[^']*')*>"#).expect("valid base pattern")
});

/// One `name` or `name=value` pair; quoted values are consumed whole.
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("valid attribute pattern")
});

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid entity pattern")
});

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Server returned status {0}")]
    Status(u16),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Fetches the page and its images the way an anonymous browser request
/// would: no cookies, no referer.
#[derive(Clone)]
pub struct PageClient {
    config: FetchConfig,
    http: Client,
}

impl PageClient {
    pub fn new(config: FetchConfig) -> Self {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .referer(false)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default HTTP client");
                Client::new()
            });

        Self { config, http }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Returns the document URL after redirects together with the body.
    pub async fn fetch_page(&self, page_url: &str) -> Result<(Url, String)> {
        let url = parse_url(page_url)?;
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }
        let document_url = response.url().clone();
        Ok((document_url, response.text().await?))
    }

    /// Snapshot of the page's images at call time.
    pub async fn discover(&self, page_url: &str) -> Result<Vec<ImageRef>> {
        let (document_url, html) = self.fetch_page(page_url).await?;
        Ok(extract_images(&html, &document_url))
    }

    /// Load the full body of one image.
    pub async fn fetch_image(&self, source: &str) -> Result<Bytes> {
        if source.is_empty() {
            return Err(ApiError::InvalidUrl("image has no source".to_string()));
        }
        let url = parse_url(source)?;
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }
        Ok(response.bytes().await?)
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", raw, e)))
}

/// Pull every `<img>` source out of `html`, resolved against the document's
/// `<base href>` if it has one, else against `page_url`.
pub fn extract_images(html: &str, page_url: &Url) -> Vec<ImageRef> {
    let html = HTML_COMMENT.replace_all(html, "");

    let base = BASE_TAG
        .find(&html)
        .and_then(|tag| attribute(tag.as_str(), "href"))
        .and_then(|href| page_url.join(&href).ok())
        .unwrap_or_else(|| page_url.clone());

    IMG_TAG
        .find_iter(&html)
        .map(|tag| {
            let source = match attribute(tag.as_str(), "src") {
                Some(src) if !src.is_empty() => base
                    .join(&src)
                    .map(|url| url.to_string())
                    .unwrap_or(src),
                _ => String::new(),
            };
            ImageRef { source }
        })
        .collect()
}

/// Value of the first attribute called `name` in `tag`.
fn attribute(tag: &str, name: &str) -> Option<String> {
    ATTRIBUTE
        .captures_iter(tag)
        .find(|caps| caps[1].eq_ignore_ascii_case(name))
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            decode_entities(value.trim())
        })
}

fn decode_entities(value: &str) -> String {
    ENTITY
        .replace_all(value, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                    .and_then(|code| code.ok())
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}
