use crate::models::Chapter;
use regex::Regex;
use std::sync::OnceLock;

/// Trimmed lines at or above this many characters are body text, never headings.
pub const MAX_HEADING_CHARS: usize = 50;

/// Which heading matcher classified a line. Variants are listed in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingKind {
    /// `第十二章`, `第3节`, `第一卷` ...
    CjkOrdinal,
    /// `第 12. Title`, `3、Title`, `7 Title`
    NumberedLine,
    /// `Chapter 4`, any case
    EnglishChapter,
    /// `CHAPTER 4`. Never returned by `classify_line`: the case-insensitive
    /// `EnglishChapter` matcher runs first and accepts the same lines.
    EnglishChapterUpper,
    /// `卷三`
    CjkVolume,
    /// `三、Title`
    CjkNumeralLine,
}

const HEADING_PATTERNS: &[(HeadingKind, &str)] = &[
    (
        HeadingKind::CjkOrdinal,
        r"^第[一二三四五六七八九十百千万零0-9]+[章节回卷部篇集]",
    ),
    (HeadingKind::NumberedLine, r"^第?\s*[0-9]+[、.\s]\s*.+"),
    (HeadingKind::EnglishChapter, r"(?i)^Chapter\s+[0-9]+"),
    (HeadingKind::EnglishChapterUpper, r"^CHAPTER\s+[0-9]+"),
    (HeadingKind::CjkVolume, r"^卷[一二三四五六七八九十百千万零0-9]+"),
    (HeadingKind::CjkNumeralLine, r"^[一二三四五六七八九十]+[、.]\s*.+"),
];

fn heading_matchers() -> &'static [(HeadingKind, Regex)] {
    static MATCHERS: OnceLock<Vec<(HeadingKind, Regex)>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        HEADING_PATTERNS
            .iter()
            .map(|(kind, pattern)| {
                (*kind, Regex::new(pattern).expect("heading patterns are valid"))
            })
            .collect()
    })
}

/// Split raw text on `\n` or `\r\n`. An empty document is a single empty line.
pub fn split_lines(raw_text: &str) -> Vec<String> {
    raw_text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

fn trim_heading(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

/// Classify a single line, returning the first matcher that accepts it.
pub fn classify_line(line: &str) -> Option<HeadingKind> {
    let trimmed = trim_heading(line);
    let length = trimmed.chars().count();
    if length == 0 || length >= MAX_HEADING_CHARS {
        return None;
    }

    heading_matchers()
        .iter()
        .find(|(_, regex)| regex.is_match(trimmed))
        .map(|(kind, _)| *kind)
}

/// Single forward scan, so chapters come out ascending by line index.
pub fn parse_chapters<S: AsRef<str>>(lines: &[S]) -> Vec<Chapter> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(line_index, line)| {
            let line = line.as_ref();
            classify_line(line).map(|_| Chapter {
                title: trim_heading(line).to_string(),
                line_index,
            })
        })
        .collect()
}

pub fn segment(raw_text: &str) -> Vec<Chapter> {
    parse_chapters(&split_lines(raw_text))
}
