//! Response body classification for the recorded results log.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;

use crate::har::{find_header, HarHeader};

pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Subtypes that are text regardless of the other rules.
const TEXT_SUBTYPES: &[&str] = &[
    "css",
    "html",
    "csv",
    "richtext",
    "x-www-form-urlencoded",
    "javascript",
    "x-javascript",
    "json",
    "xml",
    "xhtml",
    "xhtml+xml",
    "atom+xml",
    "postscript",
    "base64",
    "problem+json",
];

/// Extensions whose content is binary even when the MIME type says text.
static BINARY_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "bmp", "gif", "ico", "jpg", "jpeg", "png", "swf", "eot", "otf", "ttf", "mp3", "mp4",
        "avi", "mkv", "wav", "woff", "woff2", "docx", "doc", "odt", "pptx", "xlsx", "xls",
        "vsdx", "pdf",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Text,
    Bin,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Bin => "bin",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a MIME type denotes textual content.
pub fn is_text(mime_type: &str) -> bool {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    let Some((major, subtype)) = essence.split_once('/') else {
        return false;
    };
    if major.is_empty() {
        return false;
    }
    let subtype = subtype.to_ascii_lowercase();

    let mut text = major.eq_ignore_ascii_case("text")
        || ["-xml", "+xml", "-json", "+json"]
            .iter()
            .any(|s| subtype.contains(s));
    if ["gzip", "zip", "compressed"].iter().any(|s| subtype.contains(s))
        || subtype == "octet-stream"
    {
        text = false;
    }
    text || TEXT_SUBTYPES.contains(&subtype.as_str())
}

/// Data type of a response: its MIME classification, overridden to binary
/// when the URL path ends in a known binary extension.
pub fn resolve_data_type(mime_type: &str, url_path: &str) -> DataType {
    if !is_text(mime_type) {
        return DataType::Bin;
    }
    let extension = url_path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if BINARY_EXTENSIONS.contains(extension.as_str()) {
        DataType::Bin
    } else {
        DataType::Text
    }
}

/// Charset declared by the `Content-Type` response header.
pub fn charset(headers: &[HarHeader]) -> String {
    find_header(headers, "Content-Type")
        .and_then(|ct| ct.split_once("charset="))
        .map(|(_, cs)| cs.split(';').next().unwrap_or("").trim().trim_matches('"'))
        .filter(|cs| !cs.is_empty())
        .unwrap_or(DEFAULT_CHARSET)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &str, value: &str) -> HarHeader {
        HarHeader {
            name: name.into(),
            value: value.into(),
        }
    }

    #[test]
    fn test_is_text() {
        assert!(is_text("text/html; charset=UTF-8"));
        assert!(is_text("application/xml;charset=UTF-8"));
        assert!(is_text("application/vnd.api+json"));
        assert!(is_text("application/x-javascript"));
        assert!(!is_text("image/png"));
        assert!(!is_text("application/octet-stream"));
        assert!(!is_text("application/x-gzip"));
        assert!(!is_text(""));
        assert!(!is_text("/json"));
    }

    #[test]
    fn test_compression_overrides_suffix_rules() {
        assert!(!is_text("application/gzip+json"));
        assert!(!is_text("text/x-gzip"));
    }

    #[test]
    fn test_extension_overrides_text_mime() {
        assert!(is_text("application/xml;charset=UTF-8"));
        assert_eq!(
            resolve_data_type("application/xml;charset=UTF-8", "/report.pdf"),
            DataType::Bin
        );
        assert_eq!(resolve_data_type("text/plain", "/logo.PNG"), DataType::Bin);
        assert_eq!(resolve_data_type("text/html", "/index.html"), DataType::Text);
        assert_eq!(resolve_data_type("image/svg", "/logo.svg"), DataType::Bin);
        assert_eq!(resolve_data_type("application/json", "/api/items"), DataType::Text);
    }

    #[test]
    fn test_charset() {
        assert_eq!(
            charset(&[header("content-type", "text/html;charset=ISO-8859-1")]),
            "ISO-8859-1"
        );
        assert_eq!(charset(&[header("Content-Type", "text/html")]), "UTF-8");
        assert_eq!(charset(&[]), "UTF-8");
    }
}
