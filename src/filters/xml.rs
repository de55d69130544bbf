//! Minimal owned XML tree over quick-xml events.
//!
//! The DASH engine needs to prune and rewrite an MPD while carrying every
//! element and attribute it does not understand through to the output, so
//! the tree keeps names, attributes and children verbatim rather than
//! deserializing into a fixed schema.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

use super::FilterError;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replace an attribute value, appending the attribute when absent.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        if let Some((_, v)) = self.attributes.iter_mut().find(|(k, _)| k == name) {
            *v = value.to_string();
            return;
        }
        self.attributes.push((name.to_string(), value.to_string()));
    }

    /// Concatenated text content of this element.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn set_text(&mut self, value: &str) {
        self.children = vec![Node::Text(value.to_string())];
    }

    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter_map(move |node| match node {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    pub fn first_element_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }
}

/// A parsed document: the root element plus whether the input carried an
/// XML declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub decl: bool,
    pub root: Element,
}

pub fn parse(xml: &str) -> Result<Document, FilterError> {
    let parse_err = |e: &dyn std::fmt::Display| FilterError::ParseManifest(e.to_string());

    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut buf = Vec::new();

    let mut decl = false;
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| parse_err(&e))?;
        match event {
            Event::Decl(_) => decl = true,
            Event::Start(ref e) => {
                stack.push(read_element(e).map_err(|e| parse_err(&e))?);
            }
            Event::Empty(ref e) => {
                let element = read_element(e).map_err(|e| parse_err(&e))?;
                attach(&mut stack, &mut root, Node::Element(element));
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| FilterError::ParseManifest("unbalanced element".to_string()))?;
                attach(&mut stack, &mut root, Node::Element(element));
            }
            Event::Text(ref t) => {
                let text = t.unescape().map_err(|e| parse_err(&e))?;
                if !text.trim().is_empty() {
                    attach(&mut stack, &mut root, Node::Text(text.into_owned()));
                }
            }
            Event::CData(ref c) => {
                let text = String::from_utf8_lossy(c).into_owned();
                attach(&mut stack, &mut root, Node::CData(text));
            }
            Event::Comment(ref t) => {
                let text = t.unescape().map_err(|e| parse_err(&e))?;
                attach(&mut stack, &mut root, Node::Comment(text.into_owned()));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(FilterError::ParseManifest("unclosed element".to_string()));
    }

    let root = root.ok_or_else(|| FilterError::ParseManifest("empty document".to_string()))?;
    Ok(Document { decl, root })
}

fn read_element(start: &BytesStart<'_>) -> Result<Element, quick_xml::Error> {
    let mut element = Element::new(&String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        element.attributes.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            attr.unescape_value()?.into_owned(),
        ));
    }
    Ok(element)
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if let Node::Element(element) = node {
                root.get_or_insert(element);
            }
            // text or comments outside the root are dropped
        }
    }
}

pub fn serialize(doc: &Document) -> Result<String, FilterError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    if doc.decl {
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(serialize_err)?;
    }
    write_element(&mut writer, &doc.root)?;

    String::from_utf8(writer.into_inner().into_inner()).map_err(serialize_err)
}

fn serialize_err(e: impl std::fmt::Display) -> FilterError {
    FilterError::Serialize(e.to_string())
}

fn write_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    element: &Element,
) -> Result<(), FilterError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(serialize_err);
    }

    writer.write_event(Event::Start(start)).map_err(serialize_err)?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => writer
                .write_event(Event::Text(BytesText::new(t)))
                .map_err(serialize_err)?,
            Node::CData(t) => writer
                .write_event(Event::CData(BytesCData::new(t.as_str())))
                .map_err(serialize_err)?,
            Node::Comment(t) => writer
                .write_event(Event::Comment(BytesText::new(t)))
                .map_err(serialize_err)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(serialize_err)
}
