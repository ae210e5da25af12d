use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use clap::ValueEnum;
use log::{debug, warn};
use lopdf::{content::Content, Dictionary, Object, ObjectId, Stream};
use thiserror::Error;

use crate::model::{Block, Document, Line, Page, Span};

/// Kerning adjustment in a `TJ` array (thousandths of an em) treated as a word gap.
const TJ_SPACE_THRESHOLD: f32 = 200.0;
const DEFAULT_FONT_SIZE: f32 = 12.0;
/// Bound on nested Form XObjects and on the page tree walk for resources.
const MAX_NESTING: usize = 16;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Text extraction error: {0}")]
    Text(#[from] pdf_extract::OutputError),

    #[error("Invalid layout JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Text extraction panicked: {0}")]
    Panic(String),
}

/// Engine used to turn PDF bytes into pages of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Content streams first, plain text when they yield nothing.
    Auto,
    /// Walk page content streams with lopdf.
    Content,
    /// Plain text from pdf-extract, one span per line.
    Text,
}

/// Loads a layout from disk. `.json` files hold an already extracted layout;
/// anything else is read as a PDF.
pub fn load_path(path: &Path, backend: Backend) -> Result<Document, LayoutError> {
    let bytes = std::fs::read(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("json"));

    if is_json {
        from_json(&bytes)
    } else {
        from_pdf_bytes(&bytes, backend)
    }
}

pub fn from_json(bytes: &[u8]) -> Result<Document, LayoutError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn from_pdf_bytes(bytes: &[u8], backend: Backend) -> Result<Document, LayoutError> {
    match backend {
        Backend::Content => Ok(from_content_streams(&lopdf::Document::load_mem(bytes)?)),
        Backend::Text => from_plain_text(bytes),
        Backend::Auto => {
            match lopdf::Document::load_mem(bytes) {
                Ok(pdf) => {
                    let doc = from_content_streams(&pdf);
                    if doc.has_text() {
                        return Ok(doc);
                    }
                    debug!("Content streams yielded no text, falling back to pdf-extract");
                }
                Err(e) => warn!("lopdf could not load document, falling back to pdf-extract: {}", e),
            }
            from_plain_text(bytes)
        }
    }
}

/// Groups text-showing operators into blocks (`BT`..`ET`) and lines (baseline moves).
/// Form XObjects drawn with `Do` are walked in place.
pub fn from_content_streams(pdf: &lopdf::Document) -> Document {
    let mut pages = Vec::new();

    for (&page_no, &page_id) in pdf.get_pages().iter() {
        let content = pdf
            .get_page_content(page_id)
            .and_then(|data| Content::decode(&data));

        match content {
            Ok(content) => {
                let mut builder = PageBuilder::new();
                walk_content(pdf, &mut builder, &content, page_resources(pdf, page_id), 0);
                let page = builder.finish();
                debug!("Page {}: {} blocks", page_no, page.blocks.len());
                pages.push(page);
            }
            Err(e) => {
                warn!("Could not decode content of page {}: {}", page_no, e);
                pages.push(Page::default());
            }
        }
    }

    Document { pages }
}

fn walk_content(
    pdf: &lopdf::Document,
    builder: &mut PageBuilder,
    content: &Content,
    resources: Option<&Dictionary>,
    depth: usize,
) {
    for op in &content.operations {
        if op.operator == "Do" && depth < MAX_NESTING {
            let form = match op.operands.first() {
                Some(Object::Name(name)) => form_xobject(pdf, resources, name),
                _ => None,
            };
            if let Some(form) = form {
                let data = form
                    .decompressed_content()
                    .unwrap_or_else(|_| form.content.clone());
                match Content::decode(&data) {
                    Ok(inner) => {
                        let inner_resources = form
                            .dict
                            .get(b"Resources")
                            .ok()
                            .and_then(|o| resolve(pdf, o))
                            .and_then(|o| o.as_dict().ok())
                            .or(resources);
                        builder.end_block();
                        walk_content(pdf, builder, &inner, inner_resources, depth + 1);
                    }
                    Err(e) => warn!("Could not decode form XObject: {}", e),
                }
                continue;
            }
        }
        builder.apply(&op.operator, &op.operands);
    }
}

fn resolve<'a>(pdf: &'a lopdf::Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => pdf.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Resources of the page, inherited from the page tree when absent.
fn page_resources(pdf: &lopdf::Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = pdf.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_NESTING {
        let resources = node
            .get(b"Resources")
            .ok()
            .and_then(|o| resolve(pdf, o))
            .and_then(|o| o.as_dict().ok());
        if resources.is_some() {
            return resources;
        }
        node = node
            .get(b"Parent")
            .ok()
            .and_then(|o| resolve(pdf, o))
            .and_then(|o| o.as_dict().ok())?;
    }
    None
}

fn form_xobject<'a>(
    pdf: &'a lopdf::Document,
    resources: Option<&'a Dictionary>,
    name: &[u8],
) -> Option<&'a Stream> {
    let xobjects = resources?
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve(pdf, o))?
        .as_dict()
        .ok()?;
    let stream = resolve(pdf, xobjects.get(name).ok()?)?.as_stream().ok()?;
    match stream.dict.get(b"Subtype") {
        Ok(Object::Name(subtype)) if subtype == b"Form" => Some(stream),
        _ => None,
    }
}

/// pdf-extract panics on some malformed documents; the panic becomes an error
/// for this document only.
pub fn from_plain_text(bytes: &[u8]) -> Result<Document, LayoutError> {
    let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    }));

    match extracted {
        Ok(text) => Ok(pages_from_text(&text?)),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(LayoutError::Panic(message))
        }
    }
}

fn pages_from_text(text: &str) -> Document {
    let mut chunks: Vec<&str> = if text.contains('\x0C') {
        text.split('\x0C').collect()
    } else {
        text.split("\n\n\n").collect()
    };
    if chunks.len() > 1 && chunks.last().map_or(false, |c| c.trim().is_empty()) {
        chunks.pop();
    }

    let pages = chunks
        .into_iter()
        .map(|chunk| {
            let mut builder = PageBuilder::new();
            for line in chunk.lines() {
                if line.trim().is_empty() {
                    builder.end_block();
                } else {
                    builder.lines.push(Line::from_text(line));
                }
            }
            builder.finish()
        })
        .collect();

    Document { pages }
}

struct PageBuilder {
    blocks: Vec<Block>,
    lines: Vec<Line>,
    spans: Vec<Span>,
    font_name: String,
    font_size: f32,
    baseline: f32,
    in_text: bool,
}

impl PageBuilder {
    fn new() -> Self {
        PageBuilder {
            blocks: Vec::new(),
            lines: Vec::new(),
            spans: Vec::new(),
            font_name: String::new(),
            font_size: DEFAULT_FONT_SIZE,
            baseline: 0.0,
            in_text: false,
        }
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "BT" => {
                self.end_block();
                self.in_text = true;
                self.baseline = 0.0;
            }
            "ET" => {
                self.end_block();
                self.in_text = false;
            }
            "Tf" => {
                if operands.len() == 2 {
                    if let Object::Name(name) = &operands[0] {
                        self.font_name = String::from_utf8_lossy(name).to_string();
                    }
                    if let Some(size) = as_number(&operands[1]) {
                        self.font_size = size;
                    }
                }
            }
            "Td" | "TD" => {
                let ty = operands.get(1).and_then(as_number).unwrap_or(0.0);
                if ty != 0.0 {
                    self.break_line();
                    self.baseline += ty;
                }
            }
            "Tm" => {
                if let Some(f) = operands.get(5).and_then(as_number) {
                    if (f - self.baseline).abs() > f32::EPSILON {
                        self.break_line();
                    }
                    self.baseline = f;
                }
            }
            "T*" => self.break_line(),
            "Tj" => {
                if let Some(text) = operands.first().and_then(decode_string) {
                    self.show(text);
                }
            }
            "'" => {
                self.break_line();
                if let Some(text) = operands.first().and_then(decode_string) {
                    self.show(text);
                }
            }
            "\"" => {
                self.break_line();
                if let Some(text) = operands.get(2).and_then(decode_string) {
                    self.show(text);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    self.show(decode_array(items));
                }
            }
            "Do" if !self.in_text => {
                self.end_block();
                let name = match operands.first() {
                    Some(Object::Name(name)) => String::from_utf8_lossy(name).to_string(),
                    _ => String::new(),
                };
                self.blocks.push(Block::Other(serde_json::json!({ "xobject": name })));
            }
            _ => {}
        }
    }

    fn show(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        self.spans.push(Span {
            text,
            size: self.font_size,
            font: self.font_name.clone(),
        });
    }

    fn break_line(&mut self) {
        if !self.spans.is_empty() {
            self.lines.push(Line {
                spans: mem::take(&mut self.spans),
            });
        }
    }

    fn end_block(&mut self) {
        self.break_line();
        if !self.lines.is_empty() {
            self.blocks.push(Block::Text {
                lines: mem::take(&mut self.lines),
            });
        }
    }

    fn finish(mut self) -> Page {
        self.end_block();
        Page {
            blocks: self.blocks,
        }
    }
}

fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Real(r) => Some(*r as f32),
        Object::Integer(i) => Some(*i as f32),
        _ => None,
    }
}

fn decode_array(items: &[Object]) -> String {
    let mut combined = String::new();
    for item in items {
        match item {
            Object::String(..) => {
                if let Some(s) = decode_string(item) {
                    combined.push_str(&s);
                }
            }
            _ => {
                let gap = as_number(item).map_or(false, |n| -n > TJ_SPACE_THRESHOLD);
                if gap && !combined.is_empty() && !combined.ends_with(char::is_whitespace) {
                    combined.push(' ');
                }
            }
        }
    }
    combined
}

/// UTF-16BE when the string carries a byte order mark, UTF-8 when valid,
/// otherwise one char per byte.
fn decode_string(obj: &Object) -> Option<String> {
    let bytes = match obj {
        Object::String(bytes, _) => bytes,
        _ => return None,
    };

    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => Some(s.to_string()),
        Err(_) => Some(bytes.iter().map(|&b| b as char).collect()),
    }
}
