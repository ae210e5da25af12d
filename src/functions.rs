use crate::model::HeadingLevel;
use crate::{LETTER, TITLECASE, WHITESPACE_RUN};

pub const MIN_HEADING_CHARS: usize = 4;
pub const MAX_HEADING_CHARS: usize = 50;
pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const TITLE_SEPARATOR: &str = " | ";
pub const MAX_TITLE_PARTS: usize = 2;

/// Same character set as `WHITESPACE_RUN`.
pub fn is_separator(c: char) -> bool {
    c.is_whitespace() || ('\x1C'..='\x1F').contains(&c)
}

/// Trims the line and collapses every whitespace run to one space.
pub fn clean_text(raw: &str) -> String {
    WHITESPACE_RUN
        .replace_all(raw.trim_matches(is_separator), " ")
        .into_owned()
}

pub fn word_count(text: &str) -> usize {
    text.split(is_separator).filter(|w| !w.is_empty()).count()
}

/// True when any character is in a Unicode letter category, in any script.
pub fn has_letter(text: &str) -> bool {
    LETTER.is_match(text)
}

/// Length is counted in characters, not bytes.
pub fn is_heading_length(text: &str) -> bool {
    let len = text.chars().count();
    (MIN_HEADING_CHARS..=MAX_HEADING_CHARS).contains(&len)
}

/// At least one cased character, and every cased character is uppercase.
/// Titlecase letters count as cased but not uppercase.
pub fn is_upper(text: &str) -> bool {
    let mut has_cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased && !TITLECASE.is_match(text)
}

pub fn detect_heading(text: &str) -> HeadingLevel {
    let words = word_count(text);

    if words <= 3 && is_upper(text) {
        HeadingLevel::H1
    } else if words <= 7 {
        HeadingLevel::H2
    } else {
        HeadingLevel::H3
    }
}

/// Joins the first two candidates, or falls back to a placeholder.
pub fn compose_title<S: AsRef<str>>(candidates: &[S]) -> String {
    if candidates.is_empty() {
        return UNKNOWN_TITLE.to_string();
    }

    candidates
        .iter()
        .take(MAX_TITLE_PARTS)
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join(TITLE_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  1.  Intro\t\tduction \n"), "1. Intro duction");
        assert_eq!(clean_text("Scope\u{00A0}\u{2003}of Work"), "Scope of Work");
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text(" \t\n "), "");
    }

    #[test]
    fn test_information_separators_are_whitespace() {
        assert_eq!(clean_text("\x1FScope\x1Cof\x1D\x1EWork\x1F"), "Scope of Work");
        assert_eq!(word_count("ONE\x1CTWO\x1FTHREE FOUR"), 4);
        assert_eq!(detect_heading("ONE\x1CTWO\x1FTHREE FOUR"), HeadingLevel::H2);
        assert!(is_separator('\u{3000}'));
        assert!(!is_separator('\x1B'));
    }

    #[test]
    fn test_clean_text_is_idempotent() {
        let samples = [
            "",
            "ABSTRACT",
            "  leading and trailing  ",
            "tabs\tand\nnewlines\r\nmixed",
            "\u{3000}全角\u{3000}スペース",
            "a  b   c    d",
            "\x1Cseparated\x1Dby\x1E\x1Fcontrols",
        ];
        for s in samples {
            let once = clean_text(s);
            assert_eq!(clean_text(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_has_letter() {
        assert!(has_letter("Chapter 1"));
        assert!(has_letter("1.2 é"));
        assert!(has_letter("概要"));
        assert!(has_letter("Ωμέγα"));
        assert!(!has_letter("12 - 34"));
        assert!(!has_letter("•••"));
        assert!(!has_letter(""));
    }

    #[test]
    fn test_heading_length_bounds() {
        assert!(!is_heading_length("abc"));
        assert!(is_heading_length("abcd"));
        assert!(is_heading_length(&"x".repeat(50)));
        assert!(!is_heading_length(&"x".repeat(51)));
        // four characters, twelve bytes
        assert!(is_heading_length("日本語版"));
    }

    #[test]
    fn test_is_upper() {
        assert!(is_upper("INTRO"));
        assert!(is_upper("PART 2: SCOPE"));
        assert!(!is_upper("Intro"));
        assert!(!is_upper("1234"));
        assert!(!is_upper("ǅEMAL"));
    }

    #[test]
    fn test_detect_heading_examples() {
        assert_eq!(detect_heading("INTRO"), HeadingLevel::H1);
        assert_eq!(detect_heading("Getting Started Guide"), HeadingLevel::H2);
        assert_eq!(
            detect_heading("An Overview Of The System Architecture"),
            HeadingLevel::H2
        );
        assert_eq!(
            detect_heading("This Is A Much Longer Heading With Eight Words"),
            HeadingLevel::H3
        );
    }

    #[test]
    fn test_detect_heading_uppercase_needs_three_words_or_fewer() {
        assert_eq!(detect_heading("TABLE OF CONTENTS"), HeadingLevel::H1);
        assert_eq!(detect_heading("TERMS AND CONDITIONS APPLY"), HeadingLevel::H2);
    }

    #[test]
    fn test_detect_heading_uncased_letters_are_not_uppercase() {
        // Letters without case (CJK) pass the letter filter but never the casing test.
        assert!(has_letter("目次"));
        assert_eq!(detect_heading("目次"), HeadingLevel::H2);
    }

    #[test]
    fn test_compose_title() {
        let none: [&str; 0] = [];
        assert_eq!(compose_title(&none), "Unknown Title");
        assert_eq!(compose_title(&["Overview"]), "Overview");
        assert_eq!(
            compose_title(&["Overview", "Introduction", "Chapter 1"]),
            "Overview | Introduction"
        );
    }
}
