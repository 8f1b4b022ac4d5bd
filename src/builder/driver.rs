//! Parser driver: turns an XML event stream into a builder-node tree.
//!
//! Events are consumed in document order under a roving cursor. Locale
//! pruning and `IGNORE_CDATA` propagation happen at element open, info
//! trees are spliced when a top-level element closes, and whitespace-only
//! text is dropped. The input is read in 32 KiB chunks with a cooperative
//! cancellation check before each read.

use std::io::{self, BufReader, Read};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::builder::CompileFlags;
use crate::builder::node::{BuilderNode, NodeFlags};
use crate::common::cancel::Cancellable;
use crate::error::{Error, Result};

const CHUNK_SIZE: usize = 32 * 1024;

/// A reader that checks a cancellation token before each chunk.
struct ChunkReader<R> {
    inner: R,
    cancel: Cancellable,
}

impl<R: Read> Read for ChunkReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::other("operation cancelled"));
        }
        let limit = buf.len().min(CHUNK_SIZE);
        self.inner.read(&mut buf[..limit])
    }
}

/// Grows a tree of builder nodes under a cursor stack.
///
/// `stack[0]` is the synthetic root; the top of the stack is the element
/// currently open.
struct TreeBuilder<'a> {
    flags: CompileFlags,
    locales: &'a [String],
    info: Option<&'a BuilderNode>,
    stack: Vec<BuilderNode>,
}

impl<'a> TreeBuilder<'a> {
    fn new(flags: CompileFlags, locales: &'a [String], info: Option<&'a BuilderNode>) -> Self {
        Self {
            flags,
            locales,
            info,
            stack: vec![BuilderNode::new("")],
        }
    }

    fn start_element(&mut self, element: &str, attrs: &[(String, String)]) {
        let mut node = BuilderNode::new(element);

        // parent subtree is being ignored
        let parent = self.stack.last().expect("cursor stack never empties");
        if parent.has_flag(NodeFlags::IGNORE_CDATA) {
            node.add_flag(NodeFlags::IGNORE_CDATA);
        }

        // prune locales the process does not accept
        if !node.has_flag(NodeFlags::IGNORE_CDATA)
            && self.flags.contains(CompileFlags::NATIVE_LANGS)
        {
            for (name, value) in attrs {
                if name == "xml:lang" && !self.locales.iter().any(|l| l == value) {
                    node.add_flag(NodeFlags::IGNORE_CDATA);
                }
            }
        }

        if !node.has_flag(NodeFlags::IGNORE_CDATA) {
            for (name, value) in attrs {
                node.add_attribute(name.clone(), value.clone());
            }
        }
        self.stack.push(node);
    }

    fn end_element(&mut self) -> Result<()> {
        if self.stack.len() < 2 {
            return Err(Error::InvalidData("Mismatched XML".to_string()));
        }
        let mut node = self.stack.pop().expect("checked above");

        // splice the import's info tree into each top-level element so it
        // can be queried later
        if self.stack.len() == 1
            && let Some(info) = self.info
        {
            log::debug!("adding info to top-level node <{}>", node.element());
            node.add_child(info.clone());
        }

        self.stack
            .last_mut()
            .expect("checked above")
            .add_child(node);
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        if self.stack.len() < 2 {
            // between top-level elements; only whitespace is legal here
            if text.bytes().all(is_xml_space) {
                return Ok(());
            }
            return Err(Error::InvalidData("text outside root element".to_string()));
        }
        let node = self.stack.last_mut().expect("checked above");
        if node.has_flag(NodeFlags::IGNORE_CDATA) {
            return Ok(());
        }
        if text.bytes().all(is_xml_space) {
            return Ok(());
        }
        if self.flags.contains(CompileFlags::LITERAL_TEXT) {
            node.add_flag(NodeFlags::LITERAL_TEXT);
        }
        node.set_text(text);
        Ok(())
    }

    fn finish(mut self) -> Result<BuilderNode> {
        // more opening than closing
        if self.stack.len() != 1 {
            return Err(Error::InvalidData("Mismatched XML".to_string()));
        }
        Ok(self.stack.pop().expect("root always present"))
    }
}

fn is_xml_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

/// Parse one import stream into a synthetic root node.
pub(crate) fn parse_stream<R: Read>(
    stream: R,
    flags: CompileFlags,
    locales: &[String],
    info: Option<&BuilderNode>,
    cancel: &Cancellable,
) -> Result<BuilderNode> {
    let chunked = ChunkReader {
        inner: stream,
        cancel: cancel.clone(),
    };
    let mut reader = Reader::from_reader(BufReader::with_capacity(CHUNK_SIZE, chunked));
    let mut tree = TreeBuilder::new(flags, locales, info);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let (element, attrs) = decode_start(e, &reader)?;
                tree.start_element(&element, &attrs);
            },
            Ok(Event::Empty(ref e)) => {
                let (element, attrs) = decode_start(e, &reader)?;
                tree.start_element(&element, &attrs);
                tree.end_element()?;
            },
            Ok(Event::End(_)) => tree.end_element()?,
            Ok(Event::Text(ref t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| xml_error(&reader, &e.to_string()))?;
                tree.text(&text)?;
            },
            Ok(Event::CData(ref t)) => {
                let text = String::from_utf8_lossy(t);
                tree.text(&text)?;
            },
            Ok(Event::Eof) => break,
            // declarations, comments, processing instructions, doctypes
            Ok(_) => {},
            Err(e) => {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                return Err(match e {
                    quick_xml::Error::Io(io_err) => {
                        Error::Io(io::Error::new(io_err.kind(), io_err.to_string()))
                    },
                    other => xml_error(&reader, &other.to_string()),
                });
            },
        }
        buf.clear();
    }

    tree.finish()
}

fn decode_start<R>(
    event: &BytesStart<'_>,
    reader: &Reader<R>,
) -> Result<(String, Vec<(String, String)>)> {
    let element = String::from_utf8_lossy(event.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in event.attributes() {
        let attr = attr.map_err(|e| xml_error(reader, &e.to_string()))?;
        let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| xml_error(reader, &e.to_string()))?
            .into_owned();
        attrs.push((name, value));
    }
    Ok((element, attrs))
}

fn xml_error<R>(reader: &Reader<R>, message: &str) -> Error {
    Error::Xml {
        position: reader.buffer_position() as u64,
        message: message.to_string(),
    }
}
