use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, TreeSink};
use html5ever::{parse_document, Attribute, LocalName, Namespace, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use std::rc::Rc;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// An owned, mutable HTML document.
///
/// All mutation goes through `&mut self`, so the tree has a single writer
/// for the whole pipeline.
pub struct HtmlDocument {
    dom: RcDom,
    synthetic: Vec<Handle>,
}

impl HtmlDocument {
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
        Self {
            dom,
            synthetic: Vec::new(),
        }
    }

    /// Every element named `tag`, in document order.
    pub fn elements(&self, tag: &str) -> Vec<Handle> {
        let mut found = Vec::new();
        collect_elements(&self.dom.document, tag, &mut found);
        found
    }

    /// True for elements this document inserted itself rather than parsed.
    pub fn is_synthetic(&self, node: &Handle) -> bool {
        self.synthetic.iter().any(|s| Rc::ptr_eq(s, node))
    }

    pub fn attr(node: &Handle, name: &str) -> Option<String> {
        match node.data {
            NodeData::Element { ref attrs, .. } => attrs
                .borrow()
                .iter()
                .find(|a| a.name.local.as_ref() == name)
                .map(|a| a.value.to_string()),
            _ => None,
        }
    }

    /// Replace the value of `name` on `node`, adding the attribute if absent.
    pub fn set_attr(&mut self, node: &Handle, name: &str, value: &str) {
        if let NodeData::Element { ref attrs, .. } = node.data {
            let mut attrs = attrs.borrow_mut();
            match attrs.iter_mut().find(|a| a.name.local.as_ref() == name) {
                Some(attr) => attr.value = StrTendril::from(value),
                None => attrs.push(attribute(name, value)),
            }
        }
    }

    /// Concatenated text children of `node`.
    pub fn text_content(node: &Handle) -> String {
        let mut text = String::new();
        for child in node.children.borrow().iter() {
            if let NodeData::Text { ref contents } = child.data {
                text.push_str(&contents.borrow());
            }
        }
        text
    }

    pub fn remove(&mut self, node: &Handle) {
        self.dom.remove_from_parent(node);
    }

    /// The `<head>` element, creating it (and `<html>`) when missing.
    pub fn ensure_head(&mut self) -> Handle {
        if let Some(head) = self.elements("head").into_iter().next() {
            return head;
        }

        let html = match self.elements("html").into_iter().next() {
            Some(html) => html,
            None => {
                let html = self.create_element("html", &[]);
                let document = self.dom.document.clone();
                self.dom.append(&document, NodeOrText::AppendNode(html.clone()));
                html
            }
        };

        let head = self.create_element("head", &[]);
        let first_child = html.children.borrow().first().cloned();
        match first_child {
            Some(first) => self
                .dom
                .append_before_sibling(&first, NodeOrText::AppendNode(head.clone())),
            None => self.dom.append(&html, NodeOrText::AppendNode(head.clone())),
        }
        head
    }

    /// Append `<link rel="stylesheet" href=...>` to `<head>` and mark it as
    /// synthetic.
    pub fn append_stylesheet_link(&mut self, href: &str) -> Handle {
        let head = self.ensure_head();
        let link = self.create_element("link", &[("rel", "stylesheet"), ("href", href)]);
        self.dom.append(&head, NodeOrText::AppendNode(link.clone()));
        self.synthetic.push(link.clone());
        link
    }

    pub fn serialize(&self) -> std::io::Result<String> {
        let mut bytes = Vec::new();
        let document: SerializableHandle = self.dom.document.clone().into();
        serialize(
            &mut bytes,
            &document,
            SerializeOpts {
                traversal_scope: TraversalScope::ChildrenOnly(None),
                ..Default::default()
            },
        )?;
        String::from_utf8(bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    fn create_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Handle {
        let name = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(tag));
        let attrs = attrs.iter().map(|(n, v)| attribute(n, v)).collect();
        self.dom.create_element(name, attrs, ElementFlags::default())
    }
}

fn attribute(name: &str, value: &str) -> Attribute {
    Attribute {
        name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
        value: StrTendril::from(value),
    }
}

fn collect_elements(handle: &Handle, tag: &str, found: &mut Vec<Handle>) {
    if let NodeData::Element { ref name, .. } = handle.data {
        if name.local.as_ref() == tag {
            found.push(handle.clone());
        }
    }
    for child in handle.children.borrow().iter() {
        collect_elements(child, tag, found);
    }
}
