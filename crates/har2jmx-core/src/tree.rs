//! A small attributed tree, built by value and rendered by [`crate::render`].

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element {
        name: String,
        attrs: Vec<(String, String)>,
        children: Vec<Node>,
    },
    Text(String),
}

impl Node {
    pub fn element(name: impl Into<String>) -> Self {
        Node::Element {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Node::Element { attrs, .. } = &mut self {
            attrs.push((key.into(), value.into()));
        }
        self
    }

    pub fn child(mut self, node: Node) -> Self {
        if let Node::Element { children, .. } = &mut self {
            children.push(node);
        }
        self
    }

    pub fn children(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        if let Node::Element { children, .. } = &mut self {
            children.extend(nodes);
        }
        self
    }

    /// Append a text child; empty text adds nothing.
    pub fn text(self, text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return self;
        }
        self.child(Node::Text(text))
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Element { name, .. } => Some(name),
            Node::Text(_) => None,
        }
    }

    pub fn get_attr(&self, key: &str) -> Option<&str> {
        match self {
            Node::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            Node::Text(_) => None,
        }
    }

    pub fn child_nodes(&self) -> &[Node] {
        match self {
            Node::Element { children, .. } => children,
            Node::Text(_) => &[],
        }
    }

    /// Concatenated text of the direct text children.
    pub fn text_content(&self) -> String {
        self.child_nodes()
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element { .. } => None,
            })
            .collect()
    }

    /// Depth-first search for elements with the given name.
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Node> {
        let mut found = Vec::new();
        self.collect(name, &mut found);
        found
    }

    fn collect<'a>(&'a self, name: &str, found: &mut Vec<&'a Node>) {
        if self.name() == Some(name) {
            found.push(self);
        }
        for child in self.child_nodes() {
            child.collect(name, found);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let node = Node::element("stringProp")
            .attr("name", "HTTPSampler.path")
            .text("/login")
            .text("");
        assert_eq!(node.name(), Some("stringProp"));
        assert_eq!(node.get_attr("name"), Some("HTTPSampler.path"));
        assert_eq!(node.text_content(), "/login");
        assert_eq!(node.child_nodes().len(), 1);
    }

    #[test]
    fn test_find_all() {
        let tree = Node::element("root")
            .child(Node::element("a").child(Node::element("b")))
            .child(Node::element("b"));
        assert_eq!(tree.find_all("b").len(), 2);
        assert!(Node::Text("x".into()).attr("k", "v").get_attr("k").is_none());
    }
}
