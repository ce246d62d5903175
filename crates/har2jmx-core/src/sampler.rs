//! Mapping of one accepted exchange to an HTTP action descriptor.

use url::{form_urlencoded, Url};

use crate::{
    har::{HarArchive, HarEntry, HarHeader, HarRequest},
    multipart::{self, MultipartPart},
    Error,
};

const CACHE_HEADERS: &[&str] = &["If-Modified-Since", "If-None-Match", "If-Last-Modified"];
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Scheme, host and port every sampler inherits unless it overrides them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn from_url(url: &Url) -> Self {
        Self {
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap_or("").to_string(),
            port: port_or_default(url),
        }
    }

    /// Defaults of a capture, taken from its first exchange.
    pub fn from_archive(archive: &HarArchive) -> crate::Result<Self> {
        match archive.entries().first() {
            Some(entry) => Ok(Self::from_url(&parse_url(&entry.request.url)?)),
            None => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
    /// Ask the replaying tool to percent-encode the value
    pub encode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub filename: String,
    pub content_type: String,
    pub field_name: String,
}

/// Everything the script needs to replay one HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub label: String,
    pub method: String,
    pub path: String,
    /// Empty when equal to the capture default
    pub scheme: String,
    /// Empty when equal to the capture default
    pub host: String,
    /// Empty when equal to the capture default
    pub port: String,
    pub content_encoding: String,
    pub params: Vec<Parameter>,
    /// `params` holds a single unnamed parameter with the verbatim body
    pub raw_body: bool,
    pub multipart: bool,
    pub files: Vec<FileUpload>,
    pub headers: Vec<HarHeader>,
}

/// Builds [`ActionDescriptor`]s against fixed capture defaults.
#[derive(Debug, Clone)]
pub struct SamplerBuilder {
    endpoint: Endpoint,
    remove_cookie: bool,
    remove_cache_headers: bool,
}

impl SamplerBuilder {
    pub fn new(endpoint: Endpoint, remove_cookie: bool, remove_cache_headers: bool) -> Self {
        Self {
            endpoint,
            remove_cookie,
            remove_cache_headers,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn build(&self, entry: &HarEntry, number: u32) -> crate::Result<ActionDescriptor> {
        let request = &entry.request;
        let url = parse_url(&request.url)?;
        let method = request.method.to_uppercase();
        let body_method = request.has_body_method();

        let mut path = url.path().to_string();
        if body_method {
            if let Some(query) = url.query() {
                path.push('?');
                path.push_str(query);
            }
        }

        let host = url.host_str().unwrap_or("");
        let port = port_or_default(&url);
        let content_encoding = if body_method
            && request
                .header("Content-Type")
                .is_some_and(|ct| ct.eq_ignore_ascii_case("application/json"))
        {
            "UTF-8".to_string()
        } else {
            String::new()
        };

        let mut action = ActionDescriptor {
            label: label(number, &url),
            method,
            path,
            scheme: differing(url.scheme(), &self.endpoint.scheme),
            host: differing(host, &self.endpoint.host),
            port: if port == self.endpoint.port {
                String::new()
            } else {
                port.to_string()
            },
            content_encoding,
            params: Vec::new(),
            raw_body: false,
            multipart: false,
            files: Vec::new(),
            headers: project_headers(
                &request.headers,
                self.remove_cookie,
                self.remove_cache_headers,
            ),
        };

        if body_method {
            fill_body(&mut action, request);
        } else {
            action.params = query_params(request, &url);
        }
        Ok(action)
    }
}

fn fill_body(action: &mut ActionDescriptor, request: &HarRequest) {
    let mime_type = request.post_mime_type();
    let essence = mime_type.split(';').next().unwrap_or("").trim();

    if essence.eq_ignore_ascii_case(FORM_URLENCODED) {
        action.params = form_params(request);
    }

    if mime_type.to_ascii_lowercase().contains(MULTIPART_FORM_DATA) {
        action.multipart = true;
        for part in multipart_parts(request) {
            match part {
                MultipartPart::Value { name, value } => action.params.push(Parameter {
                    name,
                    value,
                    encode: false,
                }),
                MultipartPart::File {
                    name,
                    filename,
                    content_type,
                } => action.files.push(FileUpload {
                    filename,
                    content_type,
                    field_name: name,
                }),
            }
        }
        return;
    }

    if action.params.is_empty() {
        action.raw_body = true;
        action.params.push(Parameter {
            name: String::new(),
            value: request.post_text().to_string(),
            encode: false,
        });
    }
}

fn form_params(request: &HarRequest) -> Vec<Parameter> {
    let recorded = request
        .post_data
        .as_ref()
        .map(|p| p.params.as_slice())
        .unwrap_or(&[]);
    if !recorded.is_empty() {
        return recorded
            .iter()
            .map(|p| encoded_param(&p.name, p.value.as_deref().unwrap_or("")))
            .collect();
    }
    form_urlencoded::parse(request.post_text().as_bytes())
        .map(|(name, value)| encoded_param(&name, &value))
        .collect()
}

/// Parts of a multipart body; the recorded `params` are used when the body
/// text is missing.
pub fn multipart_parts(request: &HarRequest) -> Vec<MultipartPart> {
    let parsed = multipart::boundary_from_content_type(request.post_mime_type())
        .map(|boundary| multipart::parse(request.post_text(), boundary))
        .unwrap_or_default();
    if !parsed.is_empty() {
        return parsed;
    }
    let recorded = request
        .post_data
        .as_ref()
        .map(|p| p.params.as_slice())
        .unwrap_or(&[]);
    recorded
        .iter()
        .map(|p| match &p.file_name {
            Some(filename) => MultipartPart::File {
                name: p.name.clone(),
                filename: filename.clone(),
                content_type: p.content_type.clone().unwrap_or_default(),
            },
            None => MultipartPart::Value {
                name: p.name.clone(),
                value: p.value.clone().unwrap_or_default(),
            },
        })
        .collect()
}

fn query_params(request: &HarRequest, url: &Url) -> Vec<Parameter> {
    if !request.query_string.is_empty() {
        return request
            .query_string
            .iter()
            .map(|q| encoded_param(&q.name, &q.value))
            .collect();
    }
    url.query_pairs()
        .map(|(name, value)| encoded_param(&name, &value))
        .collect()
}

fn encoded_param(name: &str, value: &str) -> Parameter {
    Parameter {
        name: name.to_string(),
        value: value.to_string(),
        encode: needs_encoding(value),
    }
}

/// Values with a space, `=`, `/` or `+` must be percent-encoded on replay.
pub fn needs_encoding(value: &str) -> bool {
    value.contains([' ', '=', '/', '+'])
}

/// Request headers worth replaying, in recorded order.
pub fn project_headers(
    headers: &[HarHeader],
    remove_cookie: bool,
    remove_cache_headers: bool,
) -> Vec<HarHeader> {
    headers
        .iter()
        .filter(|h| {
            let name = h.name.as_str();
            !(name.starts_with(':')
                || name.eq_ignore_ascii_case("Content-Length")
                || (remove_cookie && name.eq_ignore_ascii_case("Cookie"))
                || (remove_cache_headers
                    && CACHE_HEADERS.iter().any(|c| c.eq_ignore_ascii_case(name))))
        })
        .cloned()
        .collect()
}

/// `NNN /path` label shared by samplers and recorded samples.
pub fn label(number: u32, url: &Url) -> String {
    format!("{:03} {}", number, url.path())
}

pub fn parse_url(raw: &str) -> crate::Result<Url> {
    Url::parse(raw).map_err(|e| Error::url(raw, e))
}

/// Explicit port, else 80 for `http`/`ws` and 443 for everything else.
pub fn port_or_default(url: &Url) -> u16 {
    url.port_or_known_default().unwrap_or(match url.scheme() {
        "http" | "ws" => 80,
        _ => 443,
    })
}

fn differing(value: &str, default: &str) -> String {
    if value.eq_ignore_ascii_case(default) {
        String::new()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::har::HarArchive;

    fn entry(request_json: &str) -> HarEntry {
        let json = format!(
            r#"{{"log":{{"entries":[{{"startedDateTime":"2024-05-07T07:56:40.513Z","request":{}}}]}}}}"#,
            request_json
        );
        match HarArchive::parse(&json) {
            Ok(archive) => archive.log.entries[0].clone(),
            Err(e) => panic!("bad test HAR: {}", e),
        }
    }

    fn header(name: &str, value: &str) -> HarHeader {
        HarHeader {
            name: name.into(),
            value: value.into(),
        }
    }

    fn builder() -> SamplerBuilder {
        let endpoint = Endpoint {
            scheme: "https".into(),
            host: "example.com".into(),
            port: 443,
        };
        SamplerBuilder::new(endpoint, true, true)
    }

    #[test]
    fn test_header_projection() {
        let headers = vec![
            header("Accept", "text/html"),
            header("Cookie", "x=1"),
            header("Content-Length", "10"),
            header("If-None-Match", "\"abc\""),
            header(":method", "GET"),
            header("User-Agent", "test"),
        ];
        let projected = project_headers(&headers, true, true);
        assert_eq!(
            projected,
            vec![header("Accept", "text/html"), header("User-Agent", "test")]
        );

        let kept = project_headers(&headers, false, false);
        let names: Vec<_> = kept.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Accept", "Cookie", "If-None-Match", "User-Agent"]);
    }

    #[test]
    fn test_get_with_query_params() -> crate::Result<()> {
        let e = entry(
            r#"{"method":"GET","url":"https://example.com/search?q=a b&page=2",
                "queryString":[{"name":"q","value":"a b"},{"name":"page","value":"2"},{"name":"r","value":"/x"}]}"#,
        );
        let action = builder().build(&e, 3)?;
        assert_eq!(action.label, "003 /search");
        assert_eq!(action.path, "/search");
        assert_eq!(action.method, "GET");
        assert_eq!(action.host, "");
        assert_eq!(action.port, "");
        assert_eq!(action.scheme, "");
        assert!(!action.raw_body);
        let flags: Vec<_> = action.params.iter().map(|p| p.encode).collect();
        assert_eq!(flags, vec![true, false, true]);
        Ok(())
    }

    #[test]
    fn test_overrides_only_when_different() -> crate::Result<()> {
        let e = entry(r#"{"method":"GET","url":"http://cdn.example.org:8080/a.js"}"#);
        let action = builder().build(&e, 1)?;
        assert_eq!(action.scheme, "http");
        assert_eq!(action.host, "cdn.example.org");
        assert_eq!(action.port, "8080");
        Ok(())
    }

    #[test]
    fn test_form_post_keeps_query_on_path() -> crate::Result<()> {
        let e = entry(
            r#"{"method":"POST","url":"https://example.com/login?next=1",
                "headers":[{"name":"Content-Type","value":"application/x-www-form-urlencoded"}],
                "postData":{"mimeType":"application/x-www-form-urlencoded; charset=UTF-8",
                            "text":"user=bob&pwd=a%2Bb"}}"#,
        );
        let action = builder().build(&e, 2)?;
        assert_eq!(action.path, "/login?next=1");
        assert!(!action.raw_body);
        assert!(!action.multipart);
        assert_eq!(action.params.len(), 2);
        assert_eq!(action.params[1].value, "a+b");
        assert!(action.params[1].encode);
        Ok(())
    }

    #[test]
    fn test_json_post_is_raw_body() -> crate::Result<()> {
        let e = entry(
            r#"{"method":"POST","url":"https://example.com/api/items",
                "headers":[{"name":"Content-Type","value":"application/json"}],
                "postData":{"mimeType":"application/json","text":"{\"id\":1}"}}"#,
        );
        let action = builder().build(&e, 4)?;
        assert!(action.raw_body);
        assert_eq!(action.content_encoding, "UTF-8");
        assert_eq!(
            action.params,
            vec![Parameter {
                name: String::new(),
                value: "{\"id\":1}".into(),
                encode: false,
            }]
        );
        Ok(())
    }

    #[test]
    fn test_multipart_post() -> crate::Result<()> {
        let e = entry(
            r#"{"method":"POST","url":"https://example.com/upload",
                "postData":{"mimeType":"multipart/form-data; boundary=XyZ",
                "text":"--XyZ\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nmy / doc\r\n--XyZ\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"a.pdf\"\r\nContent-Type: application/pdf\r\n\r\n\r\n--XyZ--\r\n"}}"#,
        );
        let action = builder().build(&e, 5)?;
        assert!(action.multipart);
        assert!(!action.raw_body);
        assert_eq!(
            action.params,
            vec![Parameter {
                name: "title".into(),
                value: "my / doc".into(),
                encode: false,
            }]
        );
        assert_eq!(
            action.files,
            vec![FileUpload {
                filename: "a.pdf".into(),
                content_type: "application/pdf".into(),
                field_name: "doc".into(),
            }]
        );
        Ok(())
    }

    #[test]
    fn test_invalid_url_is_fatal() {
        let e = entry(r#"{"method":"GET","url":"not a url"}"#);
        assert!(matches!(builder().build(&e, 1), Err(Error::Url { .. })));
    }

    #[test]
    fn test_needs_encoding() {
        assert!(needs_encoding("a b"));
        assert!(needs_encoding("a=b"));
        assert!(needs_encoding("a+b"));
        assert!(!needs_encoding("plain"));
    }
}
