//! Reading the export document into memory
//!
//! The export is a flat list of sibling elements under one root. Every
//! direct child of the root becomes a [`Node`]; anything nested deeper
//! (metadata entries, workout events) is skipped.

use crate::error::{MeltError, Result};
use crate::melt::types::Node;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// The parsed export: the root tag and its children in document order
#[derive(Debug, Clone)]
pub struct ExportDocument {
    pub root_tag: String,
    pub nodes: Vec<Node>,
}

impl ExportDocument {
    /// Parse an export file from disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse an export held in memory
    pub fn parse_str(xml: &str) -> Result<Self> {
        Self::from_reader(xml.as_bytes())
    }

    /// Parse an export from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut reader = Reader::from_reader(reader);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut root_tag: Option<String> = None;
        let mut nodes = Vec::new();
        let mut depth = 0usize;

        loop {
            let position = reader.buffer_position() as u64;
            match reader
                .read_event_into(&mut buf)
                .map_err(|e| parse_error(position, e))?
            {
                Event::Start(ref e) => {
                    match depth {
                        0 => root_tag = Some(open_root(e, root_tag.is_some(), position)?),
                        1 => nodes.push(read_node(e, position)?),
                        _ => {}
                    }
                    depth += 1;
                }
                Event::Empty(ref e) => match depth {
                    0 => root_tag = Some(open_root(e, root_tag.is_some(), position)?),
                    1 => nodes.push(read_node(e, position)?),
                    _ => {}
                },
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => break,
                // Declarations, doctype, comments and text carry no node data
                _ => {}
            }
            buf.clear();
        }

        if depth > 0 {
            return Err(MeltError::UnexpectedEof(depth));
        }
        let root_tag = root_tag.ok_or(MeltError::MissingRoot)?;

        Ok(ExportDocument { root_tag, nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn open_root(e: &BytesStart, seen_root: bool, position: u64) -> Result<String> {
    let tag = utf8(e.name().as_ref(), position)?;
    if seen_root {
        return Err(MeltError::Parse {
            position,
            message: format!("second root element <{}>", tag),
        });
    }
    Ok(tag)
}

fn read_node(e: &BytesStart, position: u64) -> Result<Node> {
    let mut node = Node::new(utf8(e.name().as_ref(), position)?);
    for attr in e.attributes() {
        let attr = attr.map_err(|e| parse_error(position, e))?;
        let key = utf8(attr.key.as_ref(), position)?;
        let value = attr
            .unescape_value()
            .map_err(|e| parse_error(position, e))?
            .into_owned();
        node.attributes.insert(key, value);
    }
    Ok(node)
}

fn utf8(bytes: &[u8], position: u64) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| parse_error(position, e))
}

fn parse_error(position: u64, err: impl std::fmt::Display) -> MeltError {
    MeltError::Parse {
        position,
        message: err.to_string(),
    }
}
