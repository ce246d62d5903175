//! WebSocket connections recorded by Chromium (`_webSocketMessages`).
//!
//! The segmenter does not know how a connection is replayed; it hands the
//! exchange to a [`WebSocketDelegate`] and only relies on the numbering
//! contract: the caller numbers the connection `n` and passes `n + 1`, the
//! delegate numbers its `k` messages from there and returns `n + 1 + k`, and
//! the caller resumes at `n + 2 + k`.

use url::Url;

use crate::{
    classify::{DataType, DEFAULT_CHARSET},
    har::HarEntry,
    record::{header_block, SampleRecord},
    sampler::{self, Endpoint},
    tree::Node,
};

const CONNECT_TIMEOUT_MS: &str = "20000";
const READ_TIMEOUT_MS: &str = "6000";
const NORMAL_CLOSURE: &str = "1000";
const PLUGIN_PACKAGE: &str = "eu.luminis.jmeter.wssampler";

/// Items produced for one connection and the number following the last
/// message.
#[derive(Debug, Clone)]
pub struct Delegated<T> {
    pub items: Vec<T>,
    pub next_number: u32,
}

pub trait WebSocketDelegate {
    /// Script sub-tree replaying the connection.
    fn script(
        &self,
        entry: &HarEntry,
        label: &str,
        endpoint: &Endpoint,
        first_message_number: u32,
    ) -> crate::Result<Delegated<Node>>;

    /// Recorded samples of the connection.
    fn records(
        &self,
        entry: &HarEntry,
        label: &str,
        first_message_number: u32,
    ) -> crate::Result<Delegated<SampleRecord>>;
}

/// Replays connections with the open / single write / single read / close
/// samplers of the JMeter WebSocket Samplers plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct HarWebSocketDelegate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Send,
    Receive,
}

impl Direction {
    fn from_kind(kind: &str) -> Self {
        if kind.eq_ignore_ascii_case("send") {
            Direction::Send
        } else {
            Direction::Receive
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Direction::Send => "write",
            Direction::Receive => "read",
        }
    }
}

fn payload_type(opcode: i64) -> &'static str {
    if opcode == 2 {
        "Binary"
    } else {
        "Text"
    }
}

fn sampler_node(class: &str, label: &str) -> Node {
    Node::element(class)
        .attr("guiclass", format!("{}.{}Gui", PLUGIN_PACKAGE, class))
        .attr("testclass", format!("{}.{}", PLUGIN_PACKAGE, class))
        .attr("testname", label)
        .attr("enabled", "true")
}

fn string_prop(name: &str, value: impl Into<String>) -> Node {
    Node::element("stringProp").attr("name", name).text(value)
}

fn bool_prop(name: &str, value: bool) -> Node {
    Node::element("boolProp")
        .attr("name", name)
        .text(value.to_string())
}

/// Connection-less properties shared by samplers reusing the open connection.
fn reuse_connection_props(tls: bool) -> Vec<Node> {
    vec![
        bool_prop("TLS", tls),
        string_prop("server", ""),
        string_prop("port", "80"),
        string_prop("path", ""),
        string_prop("connectTimeout", CONNECT_TIMEOUT_MS),
        bool_prop("createNewConnection", false),
    ]
}

fn message_label(number: u32, direction: &str, url: &Url) -> String {
    format!("{:03} {} {}", number, direction, url.path())
}

impl WebSocketDelegate for HarWebSocketDelegate {
    fn script(
        &self,
        entry: &HarEntry,
        label: &str,
        endpoint: &Endpoint,
        first_message_number: u32,
    ) -> crate::Result<Delegated<Node>> {
        let url = sampler::parse_url(&entry.request.url)?;
        let tls = url.scheme().eq_ignore_ascii_case("wss");
        let host = url.host_str().unwrap_or("");
        let server = if host.eq_ignore_ascii_case(&endpoint.host) {
            "${V_HOST}".to_string()
        } else {
            host.to_string()
        };
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        let mut items = vec![
            sampler_node("OpenWebSocketSampler", label).children([
                bool_prop("TLS", tls),
                string_prop("server", server),
                string_prop("port", sampler::port_or_default(&url).to_string()),
                string_prop("path", path),
                string_prop("connectTimeout", CONNECT_TIMEOUT_MS),
                string_prop("readTimeout", READ_TIMEOUT_MS),
            ]),
            Node::element("hashTree"),
        ];

        let mut number = first_message_number;
        for message in &entry.web_socket_messages {
            let direction = Direction::from_kind(&message.kind);
            let label = message_label(number, direction.verb(), &url);
            let node = match direction {
                Direction::Send => sampler_node("SingleWriteWebSocketSampler", &label)
                    .children(reuse_connection_props(tls))
                    .children([
                        string_prop("payloadType", payload_type(message.opcode)),
                        string_prop("requestData", message.data.clone()),
                        bool_prop("loadDataFromFile", false),
                        string_prop("dataFile", ""),
                    ]),
                Direction::Receive => sampler_node("SingleReadWebSocketSampler", &label)
                    .children(reuse_connection_props(tls))
                    .children([
                        string_prop("dataType", payload_type(message.opcode)),
                        string_prop("readTimeout", READ_TIMEOUT_MS),
                        bool_prop("optional", false),
                    ]),
            };
            items.push(node);
            items.push(Node::element("hashTree"));
            number += 1;
        }

        items.push(
            sampler_node("CloseWebSocketSampler", &message_label(number, "close", &url)).children([
                string_prop("statusCode", NORMAL_CLOSURE),
                string_prop("readTimeout", READ_TIMEOUT_MS),
            ]),
        );
        items.push(Node::element("hashTree"));

        Ok(Delegated {
            items,
            next_number: number,
        })
    }

    fn records(
        &self,
        entry: &HarEntry,
        label: &str,
        first_message_number: u32,
    ) -> crate::Result<Delegated<SampleRecord>> {
        let url = sampler::parse_url(&entry.request.url)?;
        let response = &entry.response;
        let base = SampleRecord {
            label: label.to_string(),
            elapsed_ms: entry.timings.wait.round() as i64,
            latency_ms: entry.timings.wait.round() as i64,
            connect_ms: entry.timings.connect.round() as i64,
            timestamp_ms: entry.started_ms(),
            success: response.status < 400,
            code: response.status.to_string(),
            message: response.status_text.clone(),
            data_type: DataType::Text,
            charset: DEFAULT_CHARSET.to_string(),
            bytes: 0,
            sent_bytes: 0,
            method: entry.request.method.to_uppercase(),
            query: String::new(),
            redirect: None,
            url: entry.request.url.clone(),
            request_headers: header_block(&entry.request.headers),
            response_headers: header_block(&response.headers),
            cookies: String::new(),
            response_data: None,
        };

        let mut items = vec![base.clone()];
        let mut number = first_message_number;
        for message in &entry.web_socket_messages {
            let direction = Direction::from_kind(&message.kind);
            let data_type = if message.opcode == 2 {
                DataType::Bin
            } else {
                DataType::Text
            };
            let size = i64::try_from(message.data.len()).unwrap_or(i64::MAX);
            let timestamp_ms = (message.time * 1000.0).round() as i64;
            let mut record = SampleRecord {
                label: message_label(number, direction.verb(), &url),
                elapsed_ms: 0,
                latency_ms: 0,
                connect_ms: 0,
                timestamp_ms,
                success: true,
                code: String::new(),
                message: String::new(),
                data_type,
                request_headers: String::new(),
                response_headers: String::new(),
                ..base.clone()
            };
            match direction {
                Direction::Send => {
                    record.sent_bytes = size;
                    record.query = message.data.clone();
                }
                Direction::Receive => {
                    record.bytes = size;
                    record.response_data =
                        (data_type == DataType::Text).then(|| message.data.clone());
                }
            }
            items.push(record);
            number += 1;
        }

        let closed_at = items.last().map(|r| r.timestamp_ms).unwrap_or(base.timestamp_ms);
        items.push(SampleRecord {
            label: message_label(number, "close", &url),
            elapsed_ms: 0,
            latency_ms: 0,
            connect_ms: 0,
            timestamp_ms: closed_at,
            success: true,
            code: NORMAL_CLOSURE.to_string(),
            message: "Normal closure".to_string(),
            request_headers: String::new(),
            response_headers: String::new(),
            ..base
        });

        Ok(Delegated {
            items,
            next_number: number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::har::HarArchive;

    fn socket_entry() -> HarEntry {
        let json = r#"{"log":{"entries":[{"startedDateTime":"2024-05-07T07:56:40.000Z",
            "request":{"method":"GET","url":"wss://example.com/live?room=1"},
            "response":{"status":101,"statusText":"Switching Protocols"},
            "_webSocketMessages":[
                {"type":"send","time":1715068601.25,"opcode":1,"data":"{\"join\":1}"},
                {"type":"receive","time":1715068601.5,"opcode":1,"data":"welcome"},
                {"type":"receive","time":1715068602.0,"opcode":2,"data":"AAEC"}
            ]}]}}"#;
        match HarArchive::parse(json) {
            Ok(archive) => archive.log.entries[0].clone(),
            Err(e) => panic!("bad test HAR: {}", e),
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint {
            scheme: "https".into(),
            host: "example.com".into(),
            port: 443,
        }
    }

    #[test]
    fn test_script_numbering_contract() -> crate::Result<()> {
        let entry = socket_entry();
        let delegated = HarWebSocketDelegate.script(&entry, "010 /live", &endpoint(), 11)?;
        // open + 3 messages + close, each followed by a hashTree
        assert_eq!(delegated.items.len(), 10);
        assert_eq!(delegated.next_number, 14);

        let labels: Vec<_> = delegated
            .items
            .iter()
            .filter_map(|n| n.get_attr("testname"))
            .collect();
        assert_eq!(
            labels,
            vec![
                "010 /live",
                "011 write /live",
                "012 read /live",
                "013 read /live",
                "014 close /live"
            ]
        );

        let open = &delegated.items[0];
        let server = open
            .find_all("stringProp")
            .into_iter()
            .find(|n| n.get_attr("name") == Some("server"))
            .map(|n| n.text_content());
        assert_eq!(server.as_deref(), Some("${V_HOST}"));
        Ok(())
    }

    #[test]
    fn test_records() -> crate::Result<()> {
        let entry = socket_entry();
        let delegated = HarWebSocketDelegate.records(&entry, "001 /live", 2)?;
        assert_eq!(delegated.next_number, 5);
        assert_eq!(delegated.items.len(), 5);
        assert_eq!(delegated.items[0].code, "101");
        assert_eq!(delegated.items[1].query, "{\"join\":1}");
        assert_eq!(delegated.items[1].timestamp_ms, 1_715_068_601_250);
        assert_eq!(delegated.items[2].response_data.as_deref(), Some("welcome"));
        assert_eq!(delegated.items[3].data_type, DataType::Bin);
        assert_eq!(delegated.items[3].response_data, None);
        assert_eq!(delegated.items[4].label, "005 close /live");
        Ok(())
    }
}
