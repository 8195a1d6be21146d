//! Owned, index-based HTML document tree.
//!
//! html5ever parses into a reference-counted DOM which is immediately copied
//! into a flat arena. Nodes are addressed by [`NodeId`]; detaching a node
//! unlinks it from its parent but leaves it in the arena.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

// Children of these are serialized verbatim. html5ever parses with scripting
// enabled, so <noscript> content is raw text as well.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    html: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Doctype(String),
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, contents: String },
    Element(ElementData),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub struct DocumentTree {
    nodes: Vec<Node>,
}

impl DocumentTree {
    /// Parses HTML. Malformed markup is error-recovered by html5ever, so this
    /// never fails.
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        let mut tree = DocumentTree { nodes: Vec::new() };
        tree.import(dom.document.clone());
        tree
    }

    // Pre-order walk with an explicit stack; nesting depth is unbounded in
    // real documents.
    fn import(&mut self, document: Handle) {
        let mut stack: Vec<(Handle, Option<NodeId>)> = vec![(document, None)];
        while let Some((handle, parent)) = stack.pop() {
            let id = self.push(import_kind(&handle.data), parent);

            for child in handle.children.borrow().iter().rev() {
                stack.push((child.clone(), Some(id)));
            }

            // <template> content lives in a separate fragment; fold it back in
            // ahead of the regular children so it survives serialization.
            if let NodeData::Element {
                ref template_contents,
                ..
            } = handle.data
            {
                if let Some(contents) = template_contents.borrow().as_ref() {
                    for child in contents.children.borrow().iter().rev() {
                        stack.push((child.clone(), Some(id)));
                    }
                }
            }
        }
    }

    fn push(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            kind,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Attached nodes below the root, in document order.
    pub fn descendants(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        order
    }

    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.descendants()
            .into_iter()
            .filter(move |id| self.element_name(*id) == Some(name))
    }

    pub fn find_first(&self, name: &str) -> Option<NodeId> {
        self.elements_named(name).next()
    }

    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(data) => Some(data.name.as_str()),
            _ => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(data) => data
                .attrs
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element(data) = &mut self.nodes[id.0].kind {
            match data
                .attrs
                .iter_mut()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
            {
                Some((_, existing)) => *existing = value.to_string(),
                None => data.attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current.0];
            if let NodeKind::Text(contents) = &node.kind {
                text.push_str(contents);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        text
    }

    pub fn create_element(&mut self, name: &str, attrs: &[(&str, &str)]) -> NodeId {
        self.push(
            NodeKind::Element(ElementData {
                name: name.to_string(),
                attrs: attrs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                html: true,
            }),
            None,
        )
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != id);
        }
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            current = parent;
        }
        current == self.root()
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        let mut work: Vec<Step> = self.nodes[0]
            .children
            .iter()
            .rev()
            .map(|child| Step::Enter(*child, false))
            .collect();

        while let Some(step) = work.pop() {
            let (id, raw_text) = match step {
                Step::Enter(id, raw_text) => (id, raw_text),
                Step::Close(name) => {
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                    continue;
                }
            };
            let node = &self.nodes[id.0];
            match &node.kind {
                NodeKind::Document => {
                    work.extend(node.children.iter().rev().map(|c| Step::Enter(*c, false)));
                }
                NodeKind::Doctype(name) => {
                    out.push_str("<!DOCTYPE ");
                    out.push_str(name);
                    out.push('>');
                }
                NodeKind::Text(contents) => {
                    if raw_text {
                        out.push_str(contents);
                    } else {
                        escape_into(contents, false, &mut out);
                    }
                }
                NodeKind::Comment(contents) => {
                    out.push_str("<!--");
                    out.push_str(contents);
                    out.push_str("-->");
                }
                NodeKind::ProcessingInstruction { target, contents } => {
                    out.push_str("<?");
                    out.push_str(target);
                    out.push(' ');
                    out.push_str(contents);
                    out.push('>');
                }
                NodeKind::Element(data) => {
                    out.push('<');
                    out.push_str(&data.name);
                    for (key, value) in &data.attrs {
                        out.push(' ');
                        out.push_str(key);
                        out.push_str("=\"");
                        escape_into(value, true, &mut out);
                        out.push('"');
                    }
                    out.push('>');

                    if data.html && VOID_ELEMENTS.contains(&data.name.as_str()) {
                        continue;
                    }

                    let raw = data.html && RAW_TEXT_ELEMENTS.contains(&data.name.as_str());
                    work.push(Step::Close(&data.name));
                    work.extend(node.children.iter().rev().map(|c| Step::Enter(*c, raw)));
                }
            }
        }
        out
    }
}

enum Step<'a> {
    Enter(NodeId, bool),
    Close(&'a str),
}

fn import_kind(data: &NodeData) -> NodeKind {
    match data {
        NodeData::Document => NodeKind::Document,
        NodeData::Doctype { name, .. } => NodeKind::Doctype(name.to_string()),
        NodeData::Text { contents } => NodeKind::Text(contents.borrow().to_string()),
        NodeData::Comment { contents } => NodeKind::Comment(contents.to_string()),
        NodeData::ProcessingInstruction { target, contents } => NodeKind::ProcessingInstruction {
            target: target.to_string(),
            contents: contents.to_string(),
        },
        NodeData::Element { name, attrs, .. } => NodeKind::Element(ElementData {
            name: name.local.to_string(),
            attrs: attrs
                .borrow()
                .iter()
                .map(|attr| {
                    let key = match attr.name.prefix {
                        Some(ref prefix) => format!("{}:{}", prefix, attr.name.local),
                        None => attr.name.local.to_string(),
                    };
                    (key, attr.value.to_string())
                })
                .collect(),
            html: &*name.ns == HTML_NAMESPACE,
        }),
    }
}

fn escape_into(text: &str, attr_mode: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{00A0}' => out.push_str("&nbsp;"),
            '"' if attr_mode => out.push_str("&quot;"),
            '<' if !attr_mode => out.push_str("&lt;"),
            '>' if !attr_mode => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}
