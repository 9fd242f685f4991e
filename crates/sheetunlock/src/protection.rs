//! Protection element removal
//!
//! Worksheet and workbook parts are rewritten by streaming their events through
//! a [`quick_xml`] reader/writer pair and dropping the protection elements on the
//! way. Elements are matched by resolved namespace, so prefixed documents such as
//! `<x:worksheet xmlns:x="...">` are handled the same as the default-namespace form
//! Excel writes.
//!
//! A part is only written back after the whole document parsed cleanly. A part
//! that fails to parse keeps its original bytes.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use quick_xml::writer::Writer;

use crate::error::{Error, Result};
use crate::options::UnlockOptions;

/// SpreadsheetML main namespace
pub const SPREADSHEETML_NS: &[u8] = b"http://schemas.openxmlformats.org/spreadsheetml/2006/main";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Which SpreadsheetML elements to drop from a part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementFilter<'a> {
    /// Local element name
    pub local_name: &'a str,
    /// Required value of the `algorithmName` attribute, if any
    pub algorithm: Option<&'a str>,
    /// Maximum number of elements to drop
    pub limit: Option<usize>,
}

impl<'a> ElementFilter<'a> {
    /// `sheetProtection` elements hashed with `algorithm`.
    ///
    /// Entries using any other algorithm, or none, are left in place.
    pub fn sheet_protection(algorithm: &'a str) -> Self {
        Self {
            local_name: "sheetProtection",
            algorithm: Some(algorithm),
            limit: None,
        }
    }

    /// The single `workbookProtection` element
    pub fn workbook_protection() -> Self {
        Self {
            local_name: "workbookProtection",
            algorithm: None,
            limit: Some(1),
        }
    }

    fn matches(&self, ns: &ResolveResult<'_>, e: &BytesStart<'_>) -> Result<bool> {
        if e.local_name().as_ref() != self.local_name.as_bytes() {
            return Ok(false);
        }
        if !matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == SPREADSHEETML_NS) {
            return Ok(false);
        }
        let Some(algorithm) = self.algorithm else {
            return Ok(true);
        };
        for attr in e.attributes() {
            let attr = attr?;
            if attr.key.as_ref() == b"algorithmName" {
                return Ok(attr.unescape_value()? == algorithm);
            }
        }
        Ok(false)
    }

    fn has_capacity(&self, removed: usize) -> bool {
        self.limit.map_or(true, |max| removed < max)
    }
}

/// A rewritten XML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripped {
    /// Serialized document
    pub xml: Vec<u8>,
    /// Number of elements dropped
    pub removed: usize,
}

/// Remove every element selected by `filter` from `xml`.
///
/// The XML declaration is kept (a standard UTF-8 one is added when missing).
/// With `pretty` the output is re-indented. Whitespace-only text is dropped
/// only where it sits beside element children, so leaf content such as
/// `<t> </t>` is kept and an empty `<v></v>` never gains text. Text inside
/// `xml:space="preserve"` elements is never touched.
pub fn strip_elements(xml: &[u8], filter: &ElementFilter<'_>, pretty: bool) -> Result<Stripped> {
    let xml = xml.strip_prefix(UTF8_BOM).unwrap_or(xml);
    let mut reader = NsReader::from_reader(xml);
    let mut out = Output::new(xml.len(), pretty);

    let mut buf = Vec::new();
    let mut open: Vec<OpenElement> = Vec::new();
    // Depth inside an element being dropped
    let mut skipping = 0usize;
    let mut removed = 0usize;
    let mut seen_decl = false;
    let mut seen_root = false;

    loop {
        buf.clear();
        let (ns, event) = reader.read_resolved_event_into(&mut buf)?;
        check_well_formed(&ns, &event)?;

        if skipping > 0 {
            match event {
                Event::Start(_) => skipping += 1,
                Event::End(_) => skipping -= 1,
                Event::Eof => {
                    return Err(Error::Malformed(format!(
                        "unclosed <{}> element",
                        filter.local_name
                    )))
                }
                _ => {}
            }
            continue;
        }

        if !seen_decl && !matches!(event, Event::Decl(_) | Event::Eof) {
            if is_blank(&event) {
                continue;
            }
            out.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
            seen_decl = true;
        }

        match event {
            Event::Eof => break,
            Event::Decl(e) => {
                seen_decl = true;
                out.write(Event::Decl(e))?;
            }
            Event::Start(e) => {
                if let Some(parent) = open.last_mut() {
                    parent.has_children = true;
                }
                if filter.has_capacity(removed) && filter.matches(&ns, &e)? {
                    log::debug!("Dropping <{}> element", filter.local_name);
                    removed += 1;
                    skipping = 1;
                    out.blank = None;
                } else {
                    let inherited = open.last().map_or(false, |parent| parent.preserve);
                    open.push(OpenElement {
                        preserve: preserves_space(&e, inherited)?,
                        has_children: false,
                    });
                    seen_root = true;
                    out.start(e)?;
                }
            }
            Event::Empty(e) => {
                if let Some(parent) = open.last_mut() {
                    parent.has_children = true;
                }
                if filter.has_capacity(removed) && filter.matches(&ns, &e)? {
                    log::debug!("Dropping <{}/> element", filter.local_name);
                    removed += 1;
                    out.blank = None;
                } else {
                    seen_root = true;
                    out.flush(false)?;
                    out.write(Event::Empty(e))?;
                }
            }
            Event::End(e) => {
                let has_children = open.pop().map_or(false, |element| element.has_children);
                out.end(e, has_children)?;
            }
            Event::Text(e) => {
                let blank = e.iter().all(u8::is_ascii_whitespace);
                match open.last() {
                    _ if !pretty => out.write(Event::Text(e))?,
                    None if blank => {}
                    Some(element) if blank && !element.preserve => {
                        if !element.has_children {
                            out.blank = Some(e.into_owned());
                        }
                    }
                    _ => {
                        out.flush(true)?;
                        out.write(Event::Text(e))?;
                    }
                }
            }
            other => {
                out.flush(true)?;
                out.write(other)?;
            }
        }
    }

    if !open.is_empty() {
        return Err(Error::Malformed(format!(
            "{} element(s) left unclosed",
            open.len()
        )));
    }
    if !seen_root {
        return Err(Error::Malformed("no root element".into()));
    }

    Ok(Stripped {
        xml: out.writer.into_inner(),
        removed,
    })
}

/// An element whose end tag has not been read yet
struct OpenElement {
    /// Under `xml:space="preserve"`
    preserve: bool,
    /// Element children seen so far, dropped ones included
    has_children: bool,
}

/// Writer side of [`strip_elements`].
///
/// In pretty mode a start tag is held until the next event shows whether the
/// element is empty, and whitespace-only text is held until it is known
/// whether it sits beside element children.
struct Output {
    writer: Writer<Vec<u8>>,
    pretty: bool,
    start: Option<BytesStart<'static>>,
    blank: Option<BytesText<'static>>,
}

impl Output {
    fn new(capacity: usize, pretty: bool) -> Self {
        let writer = if pretty {
            Writer::new_with_indent(Vec::with_capacity(capacity), b' ', 2)
        } else {
            Writer::new(Vec::with_capacity(capacity))
        };
        Self {
            writer,
            pretty,
            start: None,
            blank: None,
        }
    }

    fn write(&mut self, event: Event<'_>) -> Result<()> {
        self.writer.write_event(event)?;
        Ok(())
    }

    /// Write the held start tag, then the held text if `keep_blank`
    fn flush(&mut self, keep_blank: bool) -> Result<()> {
        if let Some(start) = self.start.take() {
            self.writer.write_event(Event::Start(start))?;
        }
        if let Some(text) = self.blank.take() {
            if keep_blank {
                self.writer.write_event(Event::Text(text))?;
            }
        }
        Ok(())
    }

    fn start(&mut self, e: BytesStart<'_>) -> Result<()> {
        self.flush(false)?;
        if self.pretty {
            self.start = Some(e.into_owned());
            Ok(())
        } else {
            self.write(Event::Start(e))
        }
    }

    fn end(&mut self, e: BytesEnd<'_>, has_children: bool) -> Result<()> {
        if self.blank.is_none() {
            if let Some(start) = self.start.take() {
                return self.write(Event::Empty(start));
            }
        }
        self.flush(!has_children)?;
        self.write(Event::End(e))
    }
}

/// Reject input quick-xml reads leniently: unbound element prefixes and
/// undefined entity references.
fn check_well_formed(ns: &ResolveResult<'_>, event: &Event<'_>) -> Result<()> {
    match event {
        Event::Start(e) | Event::Empty(e) => {
            if let ResolveResult::Unknown(prefix) = ns {
                return Err(Error::Malformed(format!(
                    "unbound namespace prefix `{}`",
                    String::from_utf8_lossy(prefix)
                )));
            }
            for attr in e.attributes() {
                attr?.unescape_value()?;
            }
        }
        Event::Text(e) => {
            e.unescape()?;
        }
        _ => {}
    }
    Ok(())
}

fn is_blank(event: &Event<'_>) -> bool {
    matches!(event, Event::Text(e) if e.iter().all(u8::is_ascii_whitespace))
}

fn preserves_space(e: &BytesStart<'_>, inherited: bool) -> Result<bool> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"xml:space" {
            return Ok(attr.value.as_ref() == b"preserve");
        }
    }
    Ok(inherited)
}

/// What happened to one XML part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartOutcome {
    /// Part was parsed and written back
    Rewritten {
        /// Protection elements dropped
        removed: usize,
    },
    /// Part failed to parse and was left byte-for-byte untouched
    Skipped,
}

impl PartOutcome {
    /// Protection elements dropped from the part
    pub fn removed(&self) -> usize {
        match self {
            PartOutcome::Rewritten { removed } => *removed,
            PartOutcome::Skipped => 0,
        }
    }
}

/// Rewrite the part at `path` in place without the elements selected by `filter`.
///
/// Parse failures are logged and reported as [`PartOutcome::Skipped`]; IO
/// failures are returned.
pub fn strip_part(path: &Path, filter: &ElementFilter<'_>, pretty: bool) -> Result<PartOutcome> {
    let original = fs::read(path)?;
    match strip_elements(&original, filter, pretty) {
        Ok(stripped) => {
            fs::write(path, &stripped.xml)?;
            Ok(PartOutcome::Rewritten {
                removed: stripped.removed,
            })
        }
        Err(e) if e.is_parse() => {
            log::warn!("Leaving unparseable part {} as is: {e}", path.display());
            Ok(PartOutcome::Skipped)
        }
        Err(e) => Err(e),
    }
}

/// Summary of the worksheet pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorksheetSummary {
    /// Worksheet parts found
    pub scanned: usize,
    /// Parts left untouched because they did not parse
    pub skipped: usize,
    /// `sheetProtection` elements dropped across all parts
    pub removed: usize,
}

/// Worksheet parts (`sheet<N>.xml`) present in `dir`, ordered by `N`.
///
/// A missing directory yields no parts.
pub fn find_worksheet_parts(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut parts = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(index) = entry.file_name().to_str().and_then(worksheet_index) {
            parts.push((index, entry.path()));
        }
    }
    parts.sort();
    Ok(parts.into_iter().map(|(_, path)| path).collect())
}

/// `N` of a `sheet<N>.xml` file name
fn worksheet_index(name: &str) -> Option<u64> {
    let digits = name.strip_prefix("sheet")?.strip_suffix(".xml")?;
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    digits.parse().ok()
}

/// Drop matching `sheetProtection` elements from every worksheet part in `dir`
pub fn strip_worksheets(dir: &Path, options: &UnlockOptions) -> Result<WorksheetSummary> {
    let filter = ElementFilter::sheet_protection(&options.sheet_algorithm);
    let mut summary = WorksheetSummary::default();

    for path in find_worksheet_parts(dir)? {
        summary.scanned += 1;
        match strip_part(&path, &filter, options.pretty_print)? {
            PartOutcome::Rewritten { removed } => {
                if removed > 0 {
                    log::debug!(
                        "Removed {removed} sheet protection element(s) from {}",
                        path.display()
                    );
                }
                summary.removed += removed;
            }
            PartOutcome::Skipped => summary.skipped += 1,
        }
    }

    Ok(summary)
}

/// Drop the `workbookProtection` element from the workbook part.
///
/// Returns `None` when the part does not exist.
pub fn strip_workbook(path: &Path, options: &UnlockOptions) -> Result<Option<PartOutcome>> {
    if !path.is_file() {
        log::debug!("No workbook part at {}", path.display());
        return Ok(None);
    }
    let outcome = strip_part(path, &ElementFilter::workbook_protection(), options.pretty_print)?;
    Ok(Some(outcome))
}
