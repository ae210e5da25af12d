use std::collections::HashSet;

use log::debug;

use crate::functions;
use crate::model::{Block, Document, Heading, HeadingLevel, Line, Outline};

/// `(page index, normalized text)` pairs already emitted for one document.
#[derive(Debug, Default)]
pub struct SeenLines {
    keys: HashSet<(usize, String)>,
}

impl SeenLines {
    /// Records the pair and returns `true` if it had not been seen before.
    pub fn insert(&mut self, page_index: usize, text: &str) -> bool {
        self.keys.insert((page_index, text.to_string()))
    }
}

/// Accumulates the outline of a single document. Build a fresh one per
/// document; nothing here is shared across documents.
#[derive(Debug, Default)]
pub struct OutlineBuilder {
    headings: Vec<Heading>,
    title_candidates: Vec<String>,
    seen: SeenLines,
}

impl OutlineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_block(&mut self, page_index: usize, block: &Block) {
        match block {
            Block::Text { lines } => {
                for line in lines {
                    self.push_line(page_index, line);
                }
            }
            Block::Other(_) => {}
        }
    }

    /// Returns the heading emitted for this line, if it survived filtering.
    pub fn push_line(&mut self, page_index: usize, line: &Line) -> Option<&Heading> {
        let text = functions::clean_text(&line.raw_text());

        if !functions::is_heading_length(&text) {
            return None;
        }
        if !functions::has_letter(&text) {
            return None;
        }
        if !self.seen.insert(page_index, &text) {
            debug!("Skipping repeated line on page {}: {:?}", page_index + 1, text);
            return None;
        }

        let level = functions::detect_heading(&text);
        if page_index == 0 && matches!(level, HeadingLevel::H1 | HeadingLevel::H2) {
            self.title_candidates.push(text.clone());
        }

        self.headings.push(Heading {
            level,
            text,
            page: page_index + 1,
        });
        self.headings.last()
    }

    pub fn finish(self) -> Outline {
        Outline {
            title: functions::compose_title(&self.title_candidates),
            outline: self.headings,
        }
    }
}

pub fn extract_title_and_headings(doc: &Document) -> Outline {
    let mut builder = OutlineBuilder::new();
    for (page_index, page) in doc.pages.iter().enumerate() {
        for block in &page.blocks {
            builder.push_block(page_index, block);
        }
    }
    builder.finish()
}
