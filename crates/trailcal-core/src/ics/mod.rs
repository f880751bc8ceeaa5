//! iCalendar (RFC 5545) codec.
//!
//! The codec works on an untyped tree: every `BEGIN`/`END` block becomes a
//! [`CalendarObject`] whose properties are either decoded text or the list of
//! nested blocks sharing one tag. Property parameters stay part of the
//! property name (`DTSTART;TZID=America/Los_Angeles`), which is all the
//! pipeline needs to round-trip a feed.
//!
//! Serialization sorts properties by name, so the output only depends on the
//! tree contents and never on the order properties were inserted in.

pub mod text;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use self::text::{decode, encode};

/// Tag of the top-level calendar block.
pub const CALENDAR_TAG: &str = "VCALENDAR";

/// Tag of an event block.
pub const EVENT_TAG: &str = "VEVENT";

/// Line terminator used when serializing.
pub const LINE_END: &str = "\r\n";

/// Result type for codec operations.
pub type FormatResult<T> = Result<T, FormatError>;

/// Malformed iCalendar input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// A line is neither a continuation nor `name:value`.
    #[error("line {line_number}: invalid line {line:?}")]
    InvalidLine { line_number: usize, line: String },

    /// A continuation line with no property to continue.
    #[error("line {line_number}: unexpected line continuation")]
    UnexpectedContinuation { line_number: usize },

    /// `END` with no open block.
    #[error("line {line_number}: unexpected END:{tag}")]
    UnexpectedEnd { line_number: usize, tag: String },

    /// `END` closing a different block than the innermost open one.
    #[error("line {line_number}: END:{found} does not close BEGIN:{expected}")]
    MismatchedEnd {
        line_number: usize,
        expected: String,
        found: String,
    },

    /// The input ended with a block still open.
    #[error("unbalanced BEGIN/END: BEGIN:{open} is never closed")]
    Unbalanced { open: String },

    /// A block tag collides with a text property of the same name.
    #[error("line {line_number}: parent cannot collect {tag}")]
    PropertyConflict { line_number: usize, tag: String },

    /// The requested root block is absent.
    #[error("no {tag} block found")]
    MissingRoot { tag: String },

    /// The requested root block appears more than once.
    #[error("expected exactly one {tag} block, found {count}")]
    DuplicateRoot { tag: String, count: usize },
}

/// The value stored under one property name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Property {
    /// A decoded (unfolded, unescaped) text value.
    Text(String),
    /// Nested blocks of one tag, in document order.
    Components(Vec<CalendarObject>),
}

/// One block of a parsed calendar: the calendar itself, an event, an alarm...
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarObject {
    /// Block tag, e.g. `VCALENDAR` or `VEVENT`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Properties keyed by name. Ordered so serialization is deterministic.
    pub properties: BTreeMap<String, Property>,
}

impl CalendarObject {
    /// Creates an empty block with the given tag.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Builder method to set a text property.
    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_text(name, value);
        self
    }

    /// Builder method to set the nested blocks stored under `tag`.
    pub fn with_components(mut self, tag: impl Into<String>, children: Vec<CalendarObject>) -> Self {
        self.properties
            .insert(tag.into(), Property::Components(children));
        self
    }

    /// Returns the text value of a property, if it is set and is text.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.properties.get(name) {
            Some(Property::Text(value)) => Some(value),
            _ => None,
        }
    }

    /// Sets a text property, replacing whatever was stored under `name`.
    pub fn set_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties
            .insert(name.into(), Property::Text(value.into()));
    }

    /// Removes a property.
    pub fn remove(&mut self, name: &str) -> Option<Property> {
        self.properties.remove(name)
    }

    /// Returns the nested blocks stored under `tag` (empty if there are none).
    pub fn components(&self, tag: &str) -> &[CalendarObject] {
        match self.properties.get(tag) {
            Some(Property::Components(children)) => children,
            _ => &[],
        }
    }

    /// Returns the events of a calendar block.
    pub fn events(&self) -> &[CalendarObject] {
        self.components(EVENT_TAG)
    }

    /// Appends a nested block to the list for its tag.
    ///
    /// Fails if a text property already uses the tag as its name.
    fn push_component(&mut self, child: CalendarObject) -> Result<(), CalendarObject> {
        match self
            .properties
            .entry(child.kind.clone())
            .or_insert_with(|| Property::Components(Vec::new()))
        {
            Property::Components(children) => {
                children.push(child);
                Ok(())
            }
            Property::Text(_) => Err(child),
        }
    }

    /// Decodes every text property of this block in place.
    fn decode_text(&mut self) {
        for value in self.properties.values_mut() {
            if let Property::Text(raw) = value {
                *raw = decode(raw);
            }
        }
    }

    /// Serializes this block as iCalendar text.
    pub fn to_ics(&self) -> String {
        serialize(self)
    }
}

impl fmt::Display for CalendarObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serialize(self))
    }
}

/// An open block on the parser stack.
///
/// `last_key` is parse-time bookkeeping for continuation lines and never
/// ends up in the tree.
#[derive(Debug)]
struct Frame {
    object: CalendarObject,
    last_key: Option<String>,
}

impl Frame {
    fn new(kind: impl Into<String>) -> Self {
        Self {
            object: CalendarObject::new(kind),
            last_key: None,
        }
    }
}

/// Stack-based line parser.
#[derive(Debug)]
struct Parser {
    stack: Vec<Frame>,
}

impl Parser {
    fn new() -> Self {
        // Implicit root frame collecting the top-level blocks.
        Self {
            stack: vec![Frame::new("")],
        }
    }

    fn innermost(&mut self) -> &mut Frame {
        // The root frame is never popped.
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn feed(&mut self, line_number: usize, line: &str) -> FormatResult<()> {
        if line.starts_with(' ') {
            return self.continue_value(line_number, line);
        }
        if line.is_empty() {
            return Ok(());
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| FormatError::InvalidLine {
                line_number,
                line: line.to_string(),
            })?;

        match name {
            "BEGIN" => {
                trace!(line_number, tag = value, "Opening block");
                self.stack.push(Frame::new(value));
            }
            "END" => self.close(line_number, value)?,
            _ => {
                let frame = self.innermost();
                frame.object.set_text(name, value);
                frame.last_key = Some(name.to_string());
            }
        }
        Ok(())
    }

    /// Appends a continuation line to the last property seen on the
    /// innermost block. The separator is kept so unfolding can remove it.
    fn continue_value(&mut self, line_number: usize, line: &str) -> FormatResult<()> {
        let Frame { object, last_key } = self.innermost();
        let value = match last_key
            .as_deref()
            .and_then(|key| object.properties.get_mut(key))
        {
            Some(Property::Text(value)) => value,
            _ => return Err(FormatError::UnexpectedContinuation { line_number }),
        };

        value.push_str(LINE_END);
        value.push_str(line);
        Ok(())
    }

    fn close(&mut self, line_number: usize, tag: &str) -> FormatResult<()> {
        if self.stack.len() == 1 {
            return Err(FormatError::UnexpectedEnd {
                line_number,
                tag: tag.to_string(),
            });
        }

        let open = &self.innermost().object.kind;
        if open != tag {
            return Err(FormatError::MismatchedEnd {
                line_number,
                expected: open.clone(),
                found: tag.to_string(),
            });
        }

        let Some(Frame { mut object, .. }) = self.stack.pop() else {
            return Err(FormatError::UnexpectedEnd {
                line_number,
                tag: tag.to_string(),
            });
        };
        object.decode_text();
        trace!(line_number, tag, "Closed block");

        let parent = self.innermost();
        parent.last_key = None;
        parent
            .object
            .push_component(object)
            .map_err(|child| FormatError::PropertyConflict {
                line_number,
                tag: child.kind,
            })
    }

    fn finish(mut self, root_tag: &str) -> FormatResult<CalendarObject> {
        if self.stack.len() != 1 {
            return Err(FormatError::Unbalanced {
                open: self.innermost().object.kind.clone(),
            });
        }

        let mut root = self.innermost().object.properties.remove(root_tag);
        match root.as_mut() {
            Some(Property::Components(blocks)) if blocks.len() == 1 => blocks
                .pop()
                .ok_or_else(|| FormatError::MissingRoot {
                    tag: root_tag.to_string(),
                }),
            Some(Property::Components(blocks)) if !blocks.is_empty() => {
                Err(FormatError::DuplicateRoot {
                    tag: root_tag.to_string(),
                    count: blocks.len(),
                })
            }
            _ => Err(FormatError::MissingRoot {
                tag: root_tag.to_string(),
            }),
        }
    }
}

/// Splits on `\r\n`, `\n` or `\r`.
fn lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = Some(text);
    std::iter::from_fn(move || {
        let current = rest?;
        match current.find(['\r', '\n']) {
            Some(pos) => {
                let skip = if current[pos..].starts_with(LINE_END) { 2 } else { 1 };
                rest = Some(&current[pos + skip..]);
                Some(&current[..pos])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

/// Parses a calendar document with a single `VCALENDAR` root.
pub fn parse(text: &str) -> FormatResult<CalendarObject> {
    parse_as(text, CALENDAR_TAG)
}

/// Parses a document whose single top-level block has the given tag.
///
/// Use `parse_as(text, EVENT_TAG)` to decode a standalone event.
pub fn parse_as(text: &str, root_tag: &str) -> FormatResult<CalendarObject> {
    let mut parser = Parser::new();
    for (index, line) in lines(text).enumerate() {
        parser.feed(index + 1, line)?;
    }
    parser.finish(root_tag)
}

/// Serializes a block and everything nested in it.
///
/// Text properties come first, then nested blocks, each group sorted by
/// property name.
pub fn serialize(object: &CalendarObject) -> String {
    let mut out = String::new();
    write_object(&mut out, object);
    out
}

fn write_object(out: &mut String, object: &CalendarObject) {
    out.push_str("BEGIN:");
    out.push_str(&object.kind);
    out.push_str(LINE_END);

    for (name, value) in &object.properties {
        if let Property::Text(text) = value {
            out.push_str(name);
            out.push(':');
            out.push_str(&encode(name, text));
            out.push_str(LINE_END);
        }
    }

    for value in object.properties.values() {
        if let Property::Components(children) = value {
            for child in children {
                write_object(out, child);
            }
        }
    }

    out.push_str("END:");
    out.push_str(&object.kind);
    out.push_str(LINE_END);
}
