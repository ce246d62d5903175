//! `multipart/form-data` body decoding.
//!
//! A HAR stores request bodies as text, so uploaded file contents cannot be
//! recovered. File parts keep only their field name, file name and declared
//! content type.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartPart {
    Value {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        /// Empty when the part declares no content type
        content_type: String,
    },
}

impl MultipartPart {
    pub fn name(&self) -> &str {
        match self {
            MultipartPart::Value { name, .. } | MultipartPart::File { name, .. } => name,
        }
    }
}

/// The boundary token of a `multipart/form-data; boundary=...` content type.
pub fn boundary_from_content_type(content_type: &str) -> Option<&str> {
    let (_, after) = content_type.split_once("boundary=")?;
    let boundary = after.split(';').next().unwrap_or("").trim().trim_matches('"');
    (!boundary.is_empty()).then_some(boundary)
}

/// Split a raw multipart body into its parts, in body order.
pub fn parse(body: &str, boundary: &str) -> Vec<MultipartPart> {
    let delimiter = format!("--{}", boundary);
    body.split(delimiter.as_str())
        .filter_map(parse_segment)
        .collect()
}

fn parse_segment(segment: &str) -> Option<MultipartPart> {
    let segment = segment.trim_start_matches(['\r', '\n']);
    if segment.trim().is_empty() || segment.starts_with("--") {
        return None;
    }

    let (head, payload) = split_head(segment);
    let mut disposition = None;
    let mut content_type = String::new();
    for line in head.lines() {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case("Content-Disposition") {
                disposition = Some(value.trim());
            } else if key.trim().eq_ignore_ascii_case("Content-Type") {
                content_type = value.trim().to_string();
            }
        }
    }

    let disposition = disposition.unwrap_or("");
    let Some(name) = disposition_param(disposition, "name") else {
        log::debug!("Skipping multipart segment without a field name");
        return None;
    };

    match disposition_param(disposition, "filename") {
        Some(filename) => Some(MultipartPart::File {
            name,
            filename,
            content_type,
        }),
        None => {
            let value = payload
                .trim()
                .split(['\r', '\n'])
                .next()
                .unwrap_or("")
                .to_string();
            Some(MultipartPart::Value { name, value })
        }
    }
}

/// Header block and payload, split on the first blank line. A segment with
/// no blank line is all header and has an empty payload.
fn split_head(segment: &str) -> (&str, &str) {
    let crlf = segment.find("\r\n\r\n").map(|i| (i, 4));
    let lf = segment.find("\n\n").map(|i| (i, 2));
    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };
    match split {
        Some((index, len)) => (&segment[..index], &segment[index + len..]),
        None => (segment, ""),
    }
}

fn disposition_param(disposition: &str, key: &str) -> Option<String> {
    split_unquoted(disposition, ';').into_iter().find_map(|attr| {
        let (k, v) = attr.split_once('=')?;
        if !k.trim().eq_ignore_ascii_case(key) {
            return None;
        }
        let v = v.trim();
        let v = v
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(v);
        Some(v.to_string())
    })
}

/// Split on `separator` outside double quotes.
fn split_unquoted(text: &str, separator: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == separator && !in_quotes {
            pieces.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    pieces.push(&text[start..]);
    pieces
}
