//! JMeter `.jmx` script and `testResults` trees.

use super::ScriptTreeBuilder;
use crate::{
    record::SampleRecord,
    sampler::{ActionDescriptor, Endpoint, FileUpload, Parameter},
    segment::{Script, ScriptItem, Step, TransactionGroup},
    tree::Node,
};

const JMETER_VERSION: &str = "5.6.3";
const THREAD_GROUP_NAME: &str = "Thead Group HAR Imported";
const PAUSE_NAME: &str = "Flow Control Action PAUSE";
const RESULT_TREE_COMMENT: &str = "For The Recording XML File Created";
const RECORDER_HOST_NAME: &str = "browser";

fn hash_tree() -> Node {
    Node::element("hashTree")
}

fn prop(kind: &str, name: &str, value: impl Into<String>) -> Node {
    Node::element(kind).attr("name", name).text(value)
}

fn string_prop(name: &str, value: impl Into<String>) -> Node {
    prop("stringProp", name, value)
}

fn bool_prop(name: &str, value: bool) -> Node {
    prop("boolProp", name, value.to_string())
}

fn int_prop(name: &str, value: i64) -> Node {
    prop("intProp", name, value.to_string())
}

fn collection_prop(name: &str) -> Node {
    Node::element("collectionProp").attr("name", name)
}

/// Test element with its GUI class, test class and name.
fn test_element(tag: &str, guiclass: &str, testclass: &str, testname: &str, enabled: bool) -> Node {
    Node::element(tag)
        .attr("guiclass", guiclass)
        .attr("testclass", testclass)
        .attr("testname", testname)
        .attr("enabled", enabled.to_string())
}

/// `elementProp`; the `enabled` flag is written only for GUI-backed elements.
fn element_prop(
    name: &str,
    element_type: &str,
    gui: Option<(&str, &str)>,
    testname: Option<&str>,
) -> Node {
    let mut node = Node::element("elementProp")
        .attr("name", name)
        .attr("elementType", element_type);
    if let Some((guiclass, testclass)) = gui {
        node = node.attr("guiclass", guiclass).attr("testclass", testclass);
    }
    if let Some(testname) = testname {
        node = node.attr("testname", testname);
    }
    if gui.is_some() {
        node = node.attr("enabled", "true");
    }
    node
}

fn arguments_prop(testname: Option<&str>, arguments: Vec<Node>) -> Node {
    element_prop(
        "HTTPsampler.Arguments",
        "Arguments",
        Some(("HTTPArgumentsPanel", "Arguments")),
        testname,
    )
    .child(collection_prop("Arguments.arguments").children(arguments))
}

/// Builds JMeter documents.
#[derive(Debug, Clone, Default)]
pub struct JmeterTreeBuilder {
    /// Results file a disabled recorder points its View Results Tree at
    pub record_out: Option<String>,
    pub add_result_tree_record: bool,
}

impl JmeterTreeBuilder {
    pub fn new(record_out: Option<String>, add_result_tree_record: bool) -> Self {
        Self {
            record_out,
            add_result_tree_record,
        }
    }

    fn test_plan(&self) -> Node {
        let comment = format!(
            "This test plan was created by har2jmx Version {}",
            env!("CARGO_PKG_VERSION")
        );
        test_element("TestPlan", "TestPlanGui", "TestPlan", "Test Plan", true).children([
            bool_prop("TestPlan.functional_mode", false),
            bool_prop("TestPlan.tearDown_on_shutdown", false),
            bool_prop("TestPlan.serialize_threadgroups", false),
            element_prop(
                "TestPlan.user_defined_variables",
                "Arguments",
                Some(("ArgumentsPanel", "Arguments")),
                Some("User Defined Variables"),
            )
            .child(collection_prop("Arguments.arguments")),
            string_prop("TestPlan.comments", comment),
            string_prop("TestPlan.user_define_classpath", ""),
        ])
    }

    fn thread_group(&self) -> Node {
        test_element(
            "ThreadGroup",
            "ThreadGroupGui",
            "ThreadGroup",
            THREAD_GROUP_NAME,
            true,
        )
        .children([
            string_prop("ThreadGroup.num_threads", "1"),
            string_prop("ThreadGroup.ramp_time", "1"),
            element_prop(
                "ThreadGroup.main_controller",
                "LoopController",
                Some(("LoopControlPanel", "LoopController")),
                Some(""),
            )
            .children([
                string_prop("LoopController.loops", "1"),
                bool_prop("LoopController.continue_forever", false),
            ]),
            string_prop("ThreadGroup.on_sample_error", "continue"),
            bool_prop("ThreadGroup.delayedStart", false),
            bool_prop("ThreadGroup.scheduler", false),
            string_prop("ThreadGroup.duration", ""),
            string_prop("ThreadGroup.delay", ""),
            bool_prop("ThreadGroup.same_user_on_next_iteration", true),
        ])
    }

    fn user_defined_variables(&self, endpoint: &Endpoint) -> Node {
        let variables = [
            ("V_SCHEME", endpoint.scheme.clone()),
            ("V_HOST", endpoint.host.clone()),
            ("V_PORT", endpoint.port.to_string()),
        ]
        .into_iter()
        .map(|(name, value)| {
            element_prop(name, "Argument", None, None).children([
                string_prop("Argument.name", name),
                string_prop("Argument.value", value),
                string_prop("Argument.metadata", "="),
            ])
        });
        test_element(
            "Arguments",
            "ArgumentsPanel",
            "Arguments",
            "User Defined Variables",
            true,
        )
        .child(collection_prop("Arguments.arguments").children(variables))
    }

    fn request_defaults(&self) -> Node {
        test_element(
            "ConfigTestElement",
            "HttpDefaultsGui",
            "ConfigTestElement",
            "HTTP Request Defaults",
            true,
        )
        .children([
            arguments_prop(Some("User Defined Variables"), Vec::new()),
            string_prop("HTTPSampler.domain", "${V_HOST}"),
            string_prop("HTTPSampler.port", "${V_PORT}"),
            string_prop("HTTPSampler.protocol", "${V_SCHEME}"),
            string_prop("HTTPSampler.contentEncoding", ""),
            string_prop("HTTPSampler.path", ""),
            string_prop("HTTPSampler.concurrentPool", "6"),
            string_prop("HTTPSampler.connect_timeout", ""),
            string_prop("HTTPSampler.response_timeout", ""),
        ])
    }

    fn cookie_manager(&self) -> Node {
        test_element(
            "CookieManager",
            "CookiePanel",
            "CookieManager",
            "HTTP Cookie Manager",
            true,
        )
        .children([
            collection_prop("CookieManager.cookies"),
            bool_prop("CookieManager.clearEachIteration", true),
            bool_prop("CookieManager.controlledByThreadGroup", false),
        ])
    }

    fn cache_manager(&self) -> Node {
        test_element(
            "CacheManager",
            "CacheManagerGui",
            "CacheManager",
            "HTTP Cache Manager",
            true,
        )
        .children([
            bool_prop("clearEachIteration", true),
            bool_prop("useExpires", true),
            bool_prop("CacheManager.controlledByThread", false),
        ])
    }

    fn pause(&self, duration_ms: i64) -> Node {
        test_element("TestAction", "TestActionGui", "TestAction", PAUSE_NAME, true).children([
            int_prop("ActionProcessor.action", 1),
            int_prop("ActionProcessor.target", 0),
            string_prop("ActionProcessor.duration", duration_ms.to_string()),
        ])
    }

    fn transaction_controller(&self, group: &TransactionGroup) -> [Node; 2] {
        let controller = test_element(
            "TransactionController",
            "TransactionControllerGui",
            "TransactionController",
            &group.name,
            true,
        )
        .children([
            bool_prop("TransactionController.parent", false),
            bool_prop("TransactionController.includeTimers", false),
        ]);
        let steps = group.steps.iter().flat_map(|step| match step {
            Step::Http(action) => vec![
                self.http_sampler(action),
                hash_tree().children([self.header_manager(action), hash_tree()]),
            ],
            Step::WebSocket { nodes, .. } => nodes.clone(),
        });
        [controller, hash_tree().children(steps)]
    }

    fn http_sampler(&self, action: &ActionDescriptor) -> Node {
        let mut sampler = test_element(
            "HTTPSamplerProxy",
            "HttpTestSampleGui",
            "HTTPSamplerProxy",
            &action.label,
            true,
        )
        .children([
            string_prop("HTTPSampler.domain", action.host.clone()),
            string_prop("HTTPSampler.port", action.port.clone()),
            string_prop("HTTPSampler.protocol", action.scheme.clone()),
            string_prop("HTTPSampler.contentEncoding", action.content_encoding.clone()),
            string_prop("HTTPSampler.path", action.path.clone()),
            string_prop("HTTPSampler.method", action.method.clone()),
            bool_prop("HTTPSampler.follow_redirects", false),
            bool_prop("HTTPSampler.auto_redirects", false),
            bool_prop("HTTPSampler.use_keepalive", true),
            bool_prop("HTTPSampler.DO_MULTIPART_POST", action.multipart),
            string_prop("HTTPSampler.embedded_url_re", ""),
            string_prop("HTTPSampler.connect_timeout", ""),
            string_prop("HTTPSampler.response_timeout", ""),
            bool_prop("HTTPSampler.postBodyRaw", action.raw_body),
        ]);

        let arguments = action
            .params
            .iter()
            .map(|p| http_argument(p, action.raw_body))
            .collect();
        sampler = sampler.child(arguments_prop(None, arguments));
        if !action.files.is_empty() {
            sampler = sampler.child(file_args(&action.files));
        }
        sampler
    }

    fn header_manager(&self, action: &ActionDescriptor) -> Node {
        let headers = action.headers.iter().map(|h| {
            element_prop(&h.name, "Header", None, None).children([
                string_prop("Header.name", h.name.clone()),
                string_prop("Header.value", h.value.clone()),
            ])
        });
        test_element(
            "HeaderManager",
            "HeaderPanel",
            "HeaderManager",
            "HTTP Header Manager",
            true,
        )
        .child(collection_prop("HeaderManager.headers").children(headers))
    }

    /// Disabled HTTP(S) recorder whose View Results Tree opens the results
    /// file.
    fn recorder(&self, record_out: &str) -> [Node; 2] {
        let recorder = test_element(
            "ProxyControl",
            "ProxyControlGui",
            "ProxyControl",
            "HTTP(S) Test Script Recorder",
            false,
        )
        .children([
            string_prop("ProxyControlGui.port", "8888"),
            collection_prop("ProxyControlGui.exclude_list"),
            collection_prop("ProxyControlGui.include_list"),
            bool_prop("ProxyControlGui.capture_http_headers", true),
            int_prop("ProxyControlGui.grouping_mode", 0),
            bool_prop("ProxyControlGui.add_assertion", false),
            string_prop("ProxyControlGui.sampler_type_name", ""),
            bool_prop("ProxyControlGui.sampler_redirect_automatically", false),
            bool_prop("ProxyControlGui.sampler_follow_redirects", true),
            bool_prop("ProxyControlGui.use_keepalive", true),
            bool_prop("ProxyControlGui.detect_graphql_request", true),
            bool_prop("ProxyControlGui.sampler_download_images", false),
            int_prop("ProxyControlGui.proxy_http_sampler_naming_mode", 0),
            string_prop("ProxyControlGui.default_encoding", ""),
            string_prop("ProxyControlGui.proxy_prefix_http_sampler_name", ""),
            string_prop("ProxyControlGui.proxy_pause_http_sampler", ""),
            bool_prop("ProxyControlGui.notify_child_sl_filtered", false),
            bool_prop("ProxyControlGui.regex_match", false),
            string_prop("ProxyControlGui.content_type_include", ""),
            string_prop("ProxyControlGui.content_type_exclude", ""),
        ]);
        let view_results_tree = test_element(
            "ResultCollector",
            "ViewResultsFullVisualizer",
            "ResultCollector",
            "View Results Tree",
            true,
        )
        .children([
            bool_prop("ResultCollector.error_logging", false),
            string_prop("filename", record_out),
            string_prop("TestPlan.comments", RESULT_TREE_COMMENT),
        ]);
        [recorder, hash_tree().children([view_results_tree, hash_tree()])]
    }

    fn http_sample(&self, record: &SampleRecord) -> Node {
        let java_string = |tag: &str, text: &str| {
            Node::element(tag)
                .attr("class", "java.lang.String")
                .text(text)
        };

        let mut sample = Node::element("httpSample")
            .attr("t", record.elapsed_ms.to_string())
            .attr("it", "0")
            .attr("lt", record.latency_ms.to_string())
            .attr("ct", record.connect_ms.to_string())
            .attr("ts", record.timestamp_ms.to_string())
            .attr("s", record.success.to_string())
            .attr("lb", &record.label)
            .attr("rc", &record.code)
            .attr("rm", &record.message)
            .attr("dt", record.data_type.as_str())
            .attr("de", &record.charset)
            .attr("by", record.bytes.to_string())
            .attr("sby", record.sent_bytes.to_string())
            .attr("sc", "1")
            .attr("ec", if record.success { "0" } else { "1" })
            .attr("ng", "0")
            .attr("na", "0")
            .attr("hn", RECORDER_HOST_NAME)
            .children([
                java_string("requestHeader", &record.request_headers),
                java_string("responseHeader", &record.response_headers),
                java_string("responseFile", ""),
                java_string("cookies", &record.cookies),
                java_string("method", &record.method),
                java_string("queryString", &record.query),
            ]);
        if let Some(redirect) = &record.redirect {
            sample = sample.child(java_string("redirectLocation", redirect));
        }
        sample.children([
            Node::element("java.net.URL").text(record.url.clone()),
            java_string("responseData", record.response_data.as_deref().unwrap_or("")),
        ])
    }
}

fn http_argument(param: &Parameter, raw_body: bool) -> Node {
    let argument = element_prop(&param.name, "HTTPArgument", None, None).children([
        bool_prop("HTTPArgument.always_encode", param.encode),
        string_prop("Argument.name", param.name.clone()),
        string_prop("Argument.value", param.value.clone()),
        string_prop("Argument.metadata", "="),
    ]);
    if raw_body {
        argument
    } else {
        argument.child(bool_prop("HTTPArgument.use_equals", true))
    }
}

fn file_args(files: &[FileUpload]) -> Node {
    let files = files.iter().map(|file| {
        element_prop(&file.filename, "HTTPFileArg", None, None).children([
            string_prop("File.mimetype", file.content_type.clone()),
            string_prop("File.path", file.filename.clone()),
            string_prop("File.paramname", file.field_name.clone()),
        ])
    });
    element_prop("HTTPsampler.Files", "HTTPFileArgs", None, None)
        .child(collection_prop("HTTPFileArgs.files").children(files))
}

impl ScriptTreeBuilder for JmeterTreeBuilder {
    fn build_script(&self, script: &Script) -> crate::Result<Node> {
        let mut thread_group_tree = hash_tree().children([
            self.user_defined_variables(&script.endpoint),
            hash_tree(),
            self.request_defaults(),
            hash_tree(),
            self.cookie_manager(),
            hash_tree(),
            self.cache_manager(),
            hash_tree(),
        ]);
        for item in &script.items {
            thread_group_tree = match item {
                ScriptItem::Pause { duration_ms } => {
                    thread_group_tree.children([self.pause(*duration_ms), hash_tree()])
                }
                ScriptItem::Group(group) => {
                    thread_group_tree.children(self.transaction_controller(group))
                }
            };
        }

        let mut test_plan_tree = hash_tree().children([self.thread_group(), thread_group_tree]);
        let record_out = self.record_out.as_deref().filter(|r| !r.is_empty());
        if let (true, Some(record_out)) = (self.add_result_tree_record, record_out) {
            test_plan_tree = test_plan_tree.children(self.recorder(record_out));
        }

        Ok(Node::element("jmeterTestPlan")
            .attr("version", "1.2")
            .attr("properties", "5.0")
            .attr("jmeter", JMETER_VERSION)
            .child(hash_tree().children([self.test_plan(), test_plan_tree])))
    }

    fn build_results(&self, records: &[SampleRecord]) -> crate::Result<Node> {
        Ok(Node::element("testResults")
            .attr("version", "1.2")
            .children(records.iter().map(|r| self.http_sample(r))))
    }
}
