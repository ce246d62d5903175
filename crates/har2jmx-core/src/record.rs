//! Flat log of recorded samples, one per accepted exchange, in capture order.
//!
//! The log is what a results viewer shows after a recording session: status,
//! timings, headers and the decoded response body of every request.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    classify::{self, DataType},
    config,
    filter::{Decision, ExchangeFilter},
    har::{HarArchive, HarEntry, HarHeader, HarRequest},
    multipart::{self, MultipartPart},
    sampler::{self, multipart_parts},
    websocket::WebSocketDelegate,
};

const FILE_CONTENT_PLACEHOLDER: &str = "<actual file content, not shown here>";

/// One row of the recorded results log.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub label: String,
    /// Elapsed time (ms)
    pub elapsed_ms: i64,
    /// Time to first byte (ms)
    pub latency_ms: i64,
    pub connect_ms: i64,
    /// Start time, ms since the epoch
    pub timestamp_ms: i64,
    pub success: bool,
    pub code: String,
    pub message: String,
    pub data_type: DataType,
    pub charset: String,
    pub bytes: i64,
    pub sent_bytes: i64,
    pub method: String,
    /// Query string for body-less methods, body rendition otherwise
    pub query: String,
    pub redirect: Option<String>,
    pub url: String,
    pub request_headers: String,
    pub response_headers: String,
    pub cookies: String,
    /// Present only for text responses that could be decoded
    pub response_data: Option<String>,
}

impl SampleRecord {
    pub fn from_entry(entry: &HarEntry, number: u32) -> crate::Result<Self> {
        let request = &entry.request;
        let response = &entry.response;
        let url = sampler::parse_url(&request.url)?;
        let data_type = classify::resolve_data_type(&response.content.mime_type, url.path());

        let query = if request.has_body_method() {
            body_rendition(request)
        } else if request.query_string.is_empty() {
            String::new()
        } else {
            url.query().unwrap_or("").to_string()
        };

        Ok(Self {
            label: sampler::label(number, &url),
            elapsed_ms: entry.time.round() as i64,
            latency_ms: entry.timings.wait.round() as i64,
            connect_ms: entry.timings.connect.round() as i64,
            timestamp_ms: entry.started_ms(),
            success: response.status < 400,
            code: response.status.to_string(),
            message: response.status_text.clone(),
            data_type,
            charset: classify::charset(&response.headers),
            bytes: response.content.size,
            sent_bytes: request.body_size,
            method: request.method.to_uppercase(),
            query,
            redirect: Some(response.redirect_url.clone()).filter(|r| !r.is_empty()),
            url: request.url.clone(),
            request_headers: header_block(&request.headers),
            response_headers: header_block(&response.headers),
            cookies: request
                .cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
            response_data: (data_type == DataType::Text)
                .then(|| decode_body(entry))
                .flatten(),
        })
    }
}

/// Records for every accepted exchange of the capture, numbered from
/// `start_number`. WebSocket exchanges are expanded by the delegate.
pub fn build_records(
    archive: &HarArchive,
    filter: &ExchangeFilter,
    delegate: Option<&dyn WebSocketDelegate>,
    start_number: u32,
) -> crate::Result<Vec<SampleRecord>> {
    let mut records = Vec::new();
    let mut number = config::clamp_start_number("action_start_number", start_number);

    for entry in archive.entries() {
        match (filter.decide_entry(entry), delegate) {
            (Decision::Keep, _) => {
                records.push(SampleRecord::from_entry(entry, number)?);
                number += 1;
            }
            (Decision::Delegate, Some(delegate)) => {
                let url = sampler::parse_url(&entry.request.url)?;
                let label = sampler::label(number, &url);
                let delegated = delegate.records(entry, &label, number + 1)?;
                records.extend(delegated.items);
                number = delegated.next_number + 1;
            }
            _ => {}
        }
    }

    log::info!("Recorded results contain {} sample(s)", records.len());
    Ok(records)
}

/// `Name: value` lines, each terminated by a newline.
pub fn header_block(headers: &[HarHeader]) -> String {
    headers
        .iter()
        .map(|h| format!("{}: {}\n", h.name, h.value))
        .collect()
}

fn body_rendition(request: &HarRequest) -> String {
    let mime_type = request.post_mime_type();
    let essence = mime_type.split(';').next().unwrap_or("").trim();

    if essence.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        let params = request
            .post_data
            .as_ref()
            .map(|p| p.params.as_slice())
            .unwrap_or(&[]);
        if params.is_empty() {
            return request.post_text().to_string();
        }
        return params
            .iter()
            .map(|p| format!("{}={}", p.name, p.value.as_deref().unwrap_or("")))
            .collect::<Vec<_>>()
            .join("&");
    }

    if essence.eq_ignore_ascii_case("multipart/form-data") {
        let boundary = multipart::boundary_from_content_type(mime_type).unwrap_or("");
        let mut text = String::new();
        for part in multipart_parts(request) {
            text.push_str(&format!("--{}\n", boundary));
            match part {
                MultipartPart::Value { name, value } => {
                    text.push_str(&format!(
                        "Content-Disposition: form-data; name=\"{}\"\n\n{}\n",
                        name, value
                    ));
                }
                MultipartPart::File {
                    name,
                    filename,
                    content_type,
                } => {
                    text.push_str(&format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\nContent-Type: {}\n\n{}\n",
                        name, filename, content_type, FILE_CONTENT_PLACEHOLDER
                    ));
                }
            }
        }
        if !text.is_empty() {
            text.push_str(&format!("--{}--\n", boundary));
        }
        return text;
    }

    request.post_text().to_string()
}

fn decode_body(entry: &HarEntry) -> Option<String> {
    let content = &entry.response.content;
    let text = content.text.as_deref()?;
    match content.encoding.as_deref() {
        None => Some(text.to_string()),
        Some(encoding) if encoding.eq_ignore_ascii_case("base64") => match STANDARD.decode(text) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                log::debug!("Can't decode base64 body of {}: {}", entry.request.url, e);
                None
            }
        },
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(entries: &str) -> HarArchive {
        match HarArchive::parse(&format!(r#"{{"log":{{"entries":[{}]}}}}"#, entries)) {
            Ok(archive) => archive,
            Err(e) => panic!("bad test HAR: {}", e),
        }
    }

    const PAGE: &str = r#"{"startedDateTime":"2024-05-07T07:56:40.513Z","time":118.6,
        "request":{"method":"GET","url":"https://example.com/search?q=rust",
                   "headers":[{"name":"Accept","value":"text/html"},{"name":"Cookie","value":"a=1"}],
                   "cookies":[{"name":"a","value":"1"},{"name":"b","value":"2"}],
                   "queryString":[{"name":"q","value":"rust"}],"bodySize":0},
        "response":{"status":200,"statusText":"OK",
                    "headers":[{"name":"Content-Type","value":"text/html;charset=ISO-8859-1"}],
                    "content":{"size":15,"mimeType":"text/html","text":"PGgxPmhpPC9oMT4=","encoding":"base64"}},
        "timings":{"wait":80.2,"connect":12}}"#;

    #[test]
    fn test_record_from_entry() -> crate::Result<()> {
        let a = archive(PAGE);
        let record = SampleRecord::from_entry(&a.entries()[0], 7)?;
        assert_eq!(record.label, "007 /search");
        assert_eq!(record.elapsed_ms, 119);
        assert_eq!(record.latency_ms, 80);
        assert_eq!(record.connect_ms, 12);
        assert_eq!(record.timestamp_ms, 1_715_068_600_513);
        assert!(record.success);
        assert_eq!(record.code, "200");
        assert_eq!(record.data_type, DataType::Text);
        assert_eq!(record.charset, "ISO-8859-1");
        assert_eq!(record.query, "q=rust");
        assert_eq!(record.cookies, "a=1; b=2");
        assert_eq!(record.request_headers, "Accept: text/html\nCookie: a=1\n");
        assert_eq!(record.response_data.as_deref(), Some("<h1>hi</h1>"));
        assert_eq!(record.redirect, None);
        Ok(())
    }

    #[test]
    fn test_binary_and_failed_responses() -> crate::Result<()> {
        let a = archive(
            r#"{"startedDateTime":"2024-05-07T07:56:40.513Z",
                "request":{"method":"GET","url":"https://example.com/report.pdf"},
                "response":{"status":404,"statusText":"Not Found","redirectURL":"/missing",
                            "content":{"mimeType":"application/xml;charset=UTF-8","text":"<x/>"}}}"#,
        );
        let record = SampleRecord::from_entry(&a.entries()[0], 1)?;
        assert!(!record.success);
        assert_eq!(record.data_type, DataType::Bin);
        assert_eq!(record.response_data, None);
        assert_eq!(record.redirect.as_deref(), Some("/missing"));
        Ok(())
    }

    #[test]
    fn test_post_bodies() -> crate::Result<()> {
        let a = archive(
            r#"{"startedDateTime":"2024-05-07T07:56:40.513Z",
                "request":{"method":"POST","url":"https://example.com/login",
                           "postData":{"mimeType":"application/x-www-form-urlencoded",
                                       "params":[{"name":"user","value":"bob"},{"name":"pwd","value":"x"}]}}},
               {"startedDateTime":"2024-05-07T07:56:41.513Z",
                "request":{"method":"POST","url":"https://example.com/upload",
                           "postData":{"mimeType":"multipart/form-data; boundary=B",
                                       "text":"--B\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"a.pdf\"\r\nContent-Type: application/pdf\r\n\r\nxx\r\n--B--\r\n"}}}"#,
        );
        let form = SampleRecord::from_entry(&a.entries()[0], 1)?;
        assert_eq!(form.query, "user=bob&pwd=x");
        let upload = SampleRecord::from_entry(&a.entries()[1], 2)?;
        assert!(upload.query.contains("filename=\"a.pdf\""));
        assert!(upload.query.contains(FILE_CONTENT_PLACEHOLDER));
        assert!(!upload.query.contains("xx"));
        Ok(())
    }

    #[test]
    fn test_build_records_skips_dropped_exchanges() -> crate::Result<()> {
        let a = archive(&format!(
            r#"{page},
               {{"startedDateTime":"2024-05-07T07:56:41.000Z","_fromCache":"disk",
                 "request":{{"method":"GET","url":"https://example.com/a.css"}}}},
               {{"startedDateTime":"2024-05-07T07:56:41.100Z",
                 "request":{{"method":"GET","url":"data:image/png;base64,AAAA"}}}},
               {{"startedDateTime":"2024-05-07T07:56:42.000Z",
                 "request":{{"method":"GET","url":"https://example.com/next"}}}}"#,
            page = PAGE
        ));
        let filter = ExchangeFilter::new(None, None, false)?;
        let records = build_records(&a, &filter, None, 1)?;
        let labels: Vec<_> = records.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["001 /search", "002 /next"]);
        Ok(())
    }
}
