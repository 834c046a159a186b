use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ExtractError;

/// One element of a parsed TEI document.
///
/// Mirrors the shape the renderer walks: leading text before the first
/// child, children in document order, and each child's trailing text
/// (`tail`) as it appears between siblings. Tag names are namespace-local
/// ("biblStruct", not "tei:biblStruct"); attribute keys keep their prefix
/// ("xml:id") since that is how TEI spells them.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub tail: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given tag name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// All nested elements (excluding self), depth-first, document order.
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack: Vec<&Element> = Vec::with_capacity(self.children.len());
        stack.extend(self.children.iter().rev());
        Descendants { stack }
    }

    pub fn descendants_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.descendants().filter(move |el| el.name == name)
    }

    /// All text content of this subtree, in document order.
    pub fn inner_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            child.collect_text(out);
            out.push_str(&child.tail);
        }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<&'a Element> {
        let el = self.stack.pop()?;
        self.stack.extend(el.children.iter().rev());
        Some(el)
    }
}

/// Parse a whole XML document into its root element.
///
/// Anything quick-xml rejects, plus unclosed elements and multiple roots,
/// surfaces as `MalformedInput`. Comments, processing instructions, and
/// the XML declaration are dropped.
pub fn parse(xml: &str) -> Result<Element, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(element_from(&e)?),
            Ok(Event::Empty(e)) => {
                let el = element_from(&e)?;
                attach(&mut stack, &mut root, el)?;
            }
            Ok(Event::End(_)) => {
                // Mismatched names are already an Err from read_event
                let el = stack
                    .pop()
                    .ok_or_else(|| ExtractError::MalformedInput("unexpected closing tag".into()))?;
                attach(&mut stack, &mut root, el)?;
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| ExtractError::MalformedInput(e.to_string()))?;
                append_text(&mut stack, &text);
            }
            Ok(Event::CData(t)) => {
                append_text(&mut stack, &String::from_utf8_lossy(&t));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ExtractError::MalformedInput(e.to_string())),
        }
    }

    if !stack.is_empty() {
        return Err(ExtractError::MalformedInput(format!(
            "unclosed element <{}>",
            stack[stack.len() - 1].name
        )));
    }
    root.ok_or_else(|| ExtractError::MalformedInput("no root element".into()))
}

fn element_from(e: &BytesStart) -> Result<Element, ExtractError> {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| ExtractError::MalformedInput(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| ExtractError::MalformedInput(e.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(Element {
        name,
        attrs,
        ..Element::default()
    })
}

fn attach(
    stack: &mut Vec<Element>,
    root: &mut Option<Element>,
    el: Element,
) -> Result<(), ExtractError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(el);
    } else if root.is_none() {
        *root = Some(el);
    } else {
        return Err(ExtractError::MalformedInput("multiple root elements".into()));
    }
    Ok(())
}

fn append_text(stack: &mut [Element], text: &str) {
    // Text before the root element (whitespace, doctype leftovers) is dropped
    if let Some(top) = stack.last_mut() {
        match top.children.last_mut() {
            Some(last) => last.tail.push_str(text),
            None => top.text.push_str(text),
        }
    }
}

// ── Tests ──
