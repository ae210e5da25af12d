use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// A run of text sharing one font on a single line.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Span {
    pub text: String,
    #[serde(default)]
    pub size: f32,
    #[serde(default)]
    pub font: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    pub fn from_text(text: &str) -> Self {
        Line {
            spans: vec![Span {
                text: text.to_string(),
                ..Span::default()
            }],
        }
    }

    /// Span texts in order, separated by a single space.
    pub fn raw_text(&self) -> String {
        self.spans
            .iter()
            .map(|span| span.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Blocks with a `lines` array carry text; anything else (images, drawings)
/// is kept opaque and skipped by the outline walk.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Block {
    Text { lines: Vec<Line> },
    Other(serde_json::Value),
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value.get("lines") {
            // A malformed line inside a text block is an error, not an image.
            Some(lines) if !lines.is_null() => {
                let lines = Vec::<Line>::deserialize(lines).map_err(de::Error::custom)?;
                Ok(Block::Text { lines })
            }
            _ => Ok(Block::Other(value)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Page {
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Page {
    pub fn span_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|block| match block {
                Block::Text { lines } => lines.iter().map(|l| l.spans.len()).sum(),
                Block::Other(_) => 0,
            })
            .sum()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Document {
    pub pages: Vec<Page>,
}

impl Document {
    pub fn has_text(&self) -> bool {
        self.pages.iter().any(|page| page.span_count() > 0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: HeadingLevel,
    pub text: String,
    /// 1-based page number.
    pub page: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Outline {
    pub title: String,
    pub outline: Vec<Heading>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_text_joins_spans_with_space() {
        let line = Line {
            spans: vec![
                Span { text: "Getting".into(), ..Span::default() },
                Span { text: "Started".into(), ..Span::default() },
            ],
        };
        assert_eq!(line.raw_text(), "Getting Started");
    }

    #[test]
    fn test_block_without_lines_is_other() {
        let page: Page = serde_json::from_value(json!({
            "blocks": [
                {"type": 1, "bbox": [0, 0, 10, 10], "image": "..."},
                {"type": 0, "lines": [{"spans": [{"text": "INTRO", "size": 18.0, "font": "Helvetica-Bold"}]}]}
            ]
        }))
        .unwrap();

        assert!(matches!(page.blocks[0], Block::Other(_)));
        match &page.blocks[1] {
            Block::Text { lines } => {
                assert_eq!(lines[0].spans[0].text, "INTRO");
                assert_eq!(lines[0].spans[0].font, "Helvetica-Bold");
            }
            other => panic!("expected text block, got {:?}", other),
        }
        assert_eq!(page.span_count(), 1);
    }

    #[test]
    fn test_span_attributes_default_when_absent() {
        let line: Line = serde_json::from_value(json!({"spans": [{"text": "Scope"}]})).unwrap();
        assert_eq!(line.spans[0].size, 0.0);
        assert!(line.spans[0].font.is_empty());
    }

    #[test]
    fn test_line_without_spans_is_rejected() {
        let result: Result<Line, _> = serde_json::from_value(json!({"bbox": [0, 0, 1, 1]}));
        assert!(result.is_err());
    }

    #[test]
    fn test_text_block_with_malformed_line_is_rejected() {
        let result: Result<Block, _> =
            serde_json::from_value(json!({"lines": [{"spans": [{"text": "ok"}]}, {"dir": [1, 0]}]}));
        assert!(result.is_err());
    }

    #[test]
    fn test_non_text_block_round_trips_as_null() {
        let page = Page { blocks: vec![Block::Other(serde_json::Value::Null)] };
        let text = serde_json::to_string(&page).unwrap();
        let back: Page = serde_json::from_str(&text).unwrap();
        assert_eq!(back, page);
    }

    #[test]
    fn test_outline_serializes_to_contract() {
        let outline = Outline {
            title: "ABSTRACT".into(),
            outline: vec![Heading {
                level: HeadingLevel::H1,
                text: "ABSTRACT".into(),
                page: 1,
            }],
        };
        assert_eq!(
            serde_json::to_value(&outline).unwrap(),
            json!({"title": "ABSTRACT", "outline": [{"level": "H1", "text": "ABSTRACT", "page": 1}]})
        );
    }
}
