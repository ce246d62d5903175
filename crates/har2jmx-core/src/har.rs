//! HAR (HTTP Archive) model and loading.
//!
//! The model mirrors the subset of the HAR 1.2 format the converter reads,
//! plus the Chromium extensions `_fromCache` and `_webSocketMessages`.
//! Every field a browser may omit is defaulted so that an imperfect capture
//! still loads; the converter then falls back to empty values.

use std::path::Path;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use tokio::fs;

use crate::Error;

/// Identifier given to the page manufactured when a capture has none.
pub const SYNTHETIC_PAGE_ID: &str = "PAGE_00";

/// Top level structure for a HAR file.
#[derive(Debug, Clone, Deserialize)]
pub struct HarArchive {
    pub log: HarLog,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarLog {
    #[serde(default)]
    pub pages: Vec<HarPage>,
    #[serde(default)]
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPage {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub started_date_time: DateTime<FixedOffset>,
}

/// One recorded request/response pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    pub started_date_time: DateTime<FixedOffset>,
    /// Total elapsed time in milliseconds
    #[serde(default)]
    pub time: f64,
    pub request: HarRequest,
    #[serde(default)]
    pub response: HarResponse,
    #[serde(default)]
    pub timings: HarTimings,
    #[serde(default)]
    pub pageref: Option<String>,
    /// Set by Chromium when the browser served the response from its cache
    #[serde(default, rename = "_fromCache")]
    pub from_cache: Option<serde_json::Value>,
    #[serde(default, rename = "_webSocketMessages")]
    pub web_socket_messages: Vec<HarWebSocketMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<HarHeader>,
    #[serde(default)]
    pub cookies: Vec<HarCookie>,
    #[serde(default)]
    pub query_string: Vec<HarQueryParam>,
    #[serde(default)]
    pub post_data: Option<HarPostData>,
    #[serde(default)]
    pub body_size: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarResponse {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: Vec<HarHeader>,
    #[serde(default)]
    pub cookies: Vec<HarCookie>,
    #[serde(default)]
    pub content: HarContent,
    #[serde(default, rename = "redirectURL")]
    pub redirect_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarContent {
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarTimings {
    #[serde(default)]
    pub connect: f64,
    #[serde(default)]
    pub wait: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HarHeader {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarCookie {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarQueryParam {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPostData {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub params: Vec<HarPostParam>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPostParam {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// A frame recorded on a WebSocket connection.
#[derive(Debug, Clone, Deserialize)]
pub struct HarWebSocketMessage {
    /// `send` or `receive`
    #[serde(rename = "type")]
    pub kind: String,
    /// Seconds since the epoch
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub opcode: i64,
    #[serde(default)]
    pub data: String,
}

impl HarArchive {
    /// Load a HAR from a local path or an HTTP/HTTPS URL.
    pub async fn from_file_or_url(location: &str) -> crate::Result<Self> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return Self::from_url(location).await;
        }
        Self::from_file(location).await
    }

    /// Load a HAR file from disk.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        Self::parse(&content).map_err(|e| {
            Error::har(format!("Failed to parse HAR {}: {}", path.display(), e))
        })
    }

    /// Fetch a HAR over HTTP.
    pub async fn from_url(url: &str) -> crate::Result<Self> {
        let response = reqwest::get(url)
            .await
            .map_err(|e| Error::har(format!("Failed to fetch HAR from {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::har(format!(
                "Failed to fetch HAR from {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let content = response
            .text()
            .await
            .map_err(|e| Error::har(format!("Failed to read response from {}: {}", url, e)))?;

        Self::parse(&content)
            .map_err(|e| Error::har(format!("Failed to parse HAR from {}: {}", url, e)))
    }

    /// Parse HAR JSON text.
    pub fn parse(content: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn entries(&self) -> &[HarEntry] {
        &self.log.entries
    }

    /// Whether the capture recorded any page.
    pub fn has_pages(&self) -> bool {
        !self.log.pages.is_empty()
    }

    /// The recorded pages, or a single page built from the first entry when
    /// the capture has none.
    pub fn pages_or_synthetic(&self) -> crate::Result<Vec<HarPage>> {
        if self.has_pages() {
            return Ok(self.log.pages.clone());
        }
        let first = self.log.entries.first().ok_or(Error::EmptyArchive)?;
        Ok(vec![HarPage {
            id: SYNTHETIC_PAGE_ID.to_string(),
            title: first.request.url.clone(),
            started_date_time: first.started_date_time,
        }])
    }
}

impl HarEntry {
    pub fn is_from_cache(&self) -> bool {
        matches!(&self.from_cache, Some(v) if !v.is_null())
    }

    /// Start time in milliseconds since the epoch.
    pub fn started_ms(&self) -> i64 {
        self.started_date_time.timestamp_millis()
    }
}

impl HarPage {
    pub fn started_ms(&self) -> i64 {
        self.started_date_time.timestamp_millis()
    }
}

impl HarRequest {
    /// POST, PUT and PATCH carry their parameters in the body.
    pub fn has_body_method(&self) -> bool {
        is_body_method(&self.method)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn post_mime_type(&self) -> &str {
        self.post_data
            .as_ref()
            .map(|p| p.mime_type.as_str())
            .unwrap_or("")
    }

    pub fn post_text(&self) -> &str {
        self.post_data
            .as_ref()
            .and_then(|p| p.text.as_deref())
            .unwrap_or("")
    }
}

pub fn is_body_method(method: &str) -> bool {
    ["POST", "PUT", "PATCH"]
        .iter()
        .any(|m| m.eq_ignore_ascii_case(method))
}

/// First header with the given name, compared case-insensitively.
pub fn find_header<'a>(headers: &'a [HarHeader], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}
