//! A small read-only XML tree for SVG markup, built with quick-xml.
//!
//! Nodes live in one arena and refer to each other by index, in document
//! order, so index 0 is always the root element.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone)]
pub enum Child {
    Element(usize),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    /// Local name without any namespace prefix.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Child>,
    pub parent: Option<usize>,
    /// Carries a namespace prefix other than `svg`.
    pub foreign: bool,
}

impl Node {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id").map(str::trim).filter(|id| !id.is_empty())
    }

    /// `href` or `xlink:href`.
    pub fn href(&self) -> Option<&str> {
        self.attr("xlink:href").or_else(|| self.attr("href"))
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DomError(pub String);

impl std::fmt::Display for DomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

const INVALID: &str = "The data supplied is not a valid SVG document.";

impl Document {
    pub fn parse(data: &str) -> Result<Document, DomError> {
        let mut reader = Reader::from_str(data);
        reader.config_mut().trim_text(false);

        let mut nodes: Vec<Node> = Vec::new();
        let mut stack: Vec<usize> = Vec::new();
        let mut finished = false;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| DomError(format!("{} ({})", INVALID, e)))?;
            match event {
                Event::Start(e) => {
                    if finished {
                        continue;
                    }
                    let idx = push_node(&mut nodes, &stack, &e)?;
                    stack.push(idx);
                }
                Event::Empty(e) => {
                    if finished {
                        continue;
                    }
                    push_node(&mut nodes, &stack, &e)?;
                    if stack.is_empty() {
                        finished = true;
                    }
                }
                Event::End(_) => {
                    stack.pop();
                    if stack.is_empty() && !nodes.is_empty() {
                        finished = true;
                    }
                }
                Event::Text(t) => {
                    if let Some(&parent) = stack.last() {
                        let text = t
                            .unescape()
                            .map_err(|e| DomError(format!("{} ({})", INVALID, e)))?;
                        push_text(&mut nodes[parent], &text);
                    }
                }
                Event::CData(c) => {
                    if let Some(&parent) = stack.last() {
                        let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                        push_text(&mut nodes[parent], &text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if nodes.is_empty() {
            let trimmed = data.trim();
            if trimmed.ends_with(".svg") && !trimmed.contains('<') {
                return Err(DomError(format!(
                    "{}  It looks like you've supplied a filename instead; read the file first.",
                    INVALID
                )));
            }
            return Err(DomError(INVALID.to_string()));
        }
        Ok(Document { nodes })
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Element children of `idx`, in order.
    pub fn element_children(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes[idx].children.iter().filter_map(|c| match c {
            Child::Element(i) => Some(*i),
            Child::Text(_) => None,
        })
    }

    /// All text below `idx`, concatenated.
    pub fn text_content(&self, idx: usize) -> String {
        let mut out = String::new();
        for child in &self.nodes[idx].children {
            match child {
                Child::Text(t) => out.push_str(t),
                Child::Element(i) => out.push_str(&self.text_content(*i)),
            }
        }
        out
    }

    /// The first element in document order whose id is `id`.
    pub fn find_by_id(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id() == Some(id))
    }

    /// Whether `ancestor` contains `idx`.
    pub fn is_ancestor(&self, ancestor: usize, idx: usize) -> bool {
        let mut current = self.nodes[idx].parent;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.nodes[p].parent;
        }
        false
    }
}

fn push_node(nodes: &mut Vec<Node>, stack: &[usize], e: &BytesStart) -> Result<usize, DomError> {
    let qualified = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let (prefix, local) = match qualified.split_once(':') {
        Some((p, l)) => (Some(p.to_string()), l.to_string()),
        None => (None, qualified.clone()),
    };

    let mut attributes = Vec::new();
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|err| DomError(format!("{} ({})", INVALID, err)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        attributes.push((key, value));
    }

    let parent = stack.last().copied();
    let idx = nodes.len();
    nodes.push(Node {
        name: local,
        attributes,
        children: Vec::new(),
        parent,
        foreign: prefix.map_or(false, |p| p != "svg"),
    });
    if let Some(p) = parent {
        nodes[p].children.push(Child::Element(idx));
    }
    Ok(idx)
}

fn push_text(node: &mut Node, text: &str) {
    if let Some(Child::Text(last)) = node.children.last_mut() {
        last.push_str(text);
    } else {
        node.children.push(Child::Text(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_shape() {
        let doc = Document::parse(r#"<svg width="10"><g id="a"><rect/></g>text<circle r="1"/></svg>"#).unwrap();
        assert_eq!(doc.node(0).name, "svg");
        let kids: Vec<usize> = doc.element_children(0).collect();
        assert_eq!(kids.len(), 2);
        assert_eq!(doc.node(kids[0]).name, "g");
        assert_eq!(doc.find_by_id("a"), Some(kids[0]));
        assert!(doc.is_ancestor(0, 2));
        assert_eq!(doc.node(kids[1]).attr("r"), Some("1"));
    }

    #[test]
    fn test_text_and_entities() {
        let doc = Document::parse("<svg><text>a &amp; <tspan>b</tspan></text></svg>").unwrap();
        assert_eq!(doc.text_content(1), "a & b");
    }

    #[test]
    fn test_prefixes() {
        let doc = Document::parse(r#"<svg:svg xmlns:svg="x"><svg:rect/><foo:bar/></svg:svg>"#).unwrap();
        assert_eq!(doc.node(0).name, "svg");
        assert!(!doc.node(1).foreign);
        assert!(doc.node(2).foreign);
    }

    #[test]
    fn test_invalid_document() {
        assert!(Document::parse("").is_err());
        assert!(Document::parse("drawing.svg").is_err());
        assert!(Document::parse("<svg><g></svg>").is_err());
    }
}
