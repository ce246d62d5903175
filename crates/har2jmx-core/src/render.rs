//! XML rendering of [`Node`] trees through Tera templates.

// Internal imports (std, crate)
use std::collections::HashMap;
use std::path::Path;

use crate::{error::Result, tree::Node, Error};

// External imports (alphabetized)
use serde::Serialize;
use serde_json::Value as JsonValue;
use tera::{Context, Tera};
use tokio::fs;

const DOCUMENT_TEMPLATE: &str = "document.xml";

/// Element as seen by the templates. An element whose children are all text
/// is rendered inline with `text`.
#[derive(Debug, Serialize)]
struct ElementView<'a> {
    name: &'a str,
    attrs: Vec<AttrView<'a>>,
    text: Option<String>,
    children: Vec<ElementView<'a>>,
}

#[derive(Debug, Serialize)]
struct AttrView<'a> {
    name: &'a str,
    value: &'a str,
}

impl<'a> ElementView<'a> {
    fn from_node(node: &'a Node) -> Option<Self> {
        let Node::Element {
            name,
            attrs,
            children,
        } = node
        else {
            return None;
        };
        let elements: Vec<_> = children.iter().filter_map(Self::from_node).collect();
        let text = elements
            .is_empty()
            .then(|| node.text_content())
            .filter(|t| !t.is_empty());
        Some(Self {
            name,
            attrs: attrs
                .iter()
                .map(|(name, value)| AttrView { name, value })
                .collect(),
            text,
            children: elements,
        })
    }
}

/// Renders trees as indented XML documents
#[derive(Debug, Clone)]
pub struct XmlRenderer {
    tera: Tera,
}

impl XmlRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.register_filter("xml_escape", xml_escape_filter);
        tera.add_raw_templates(vec![
            ("macros.tera", include_str!("../templates/macros.tera")),
            (
                DOCUMENT_TEMPLATE,
                include_str!("../templates/document.xml.tera"),
            ),
        ])?;
        Ok(Self { tera })
    }

    pub fn render(&self, root: &Node) -> Result<String> {
        let view = ElementView::from_node(root)
            .ok_or_else(|| Error::template("The document root must be an element"))?;
        let mut context = Context::new();
        context.insert("root", &view);
        log::debug!("Rendering <{}> document", view.name);
        self.tera.render(DOCUMENT_TEMPLATE, &context).map_err(|e| {
            log::error!("Failed to render XML document: {}", e);
            Error::from(e)
        })
    }

    /// Render and write a document, creating parent directories as needed.
    pub async fn write<P: AsRef<Path>>(&self, root: &Node, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = self.render(root)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }
}

fn xml_escape_filter(value: &JsonValue, _args: &HashMap<String, JsonValue>) -> tera::Result<JsonValue> {
    let raw = match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    };
    Ok(JsonValue::String(xml_escape(&raw)))
}

/// Escape markup characters and drop characters XML 1.0 cannot carry.
pub fn xml_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\t' | '\n' | '\r' => escaped.push(c),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => escaped.push(c),
        }
    }
    escaped
}
