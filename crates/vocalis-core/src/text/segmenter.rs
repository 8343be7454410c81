//! Deterministic text segmentation into bounded-length chunks
//!
//! Text is cut into top-level units chosen by the strategy, then units are
//! greedily packed into chunks of at most `max_length` characters. A unit that
//! is too long on its own falls through a ladder of finer splits:
//! clause delimiters, then word boundaries, then hard character slicing.
//! Lengths are counted in Unicode scalar values, never bytes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Top-level unit used when splitting text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Blank-line separated paragraphs
    Paragraph,
    /// Sentences ending in `.`, `!` or `?` followed by whitespace
    #[default]
    Sentence,
    /// Whitespace separated words
    Word,
    /// Every N characters, regardless of content
    Fixed,
}

impl ChunkStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStrategy::Paragraph => "paragraph",
            ChunkStrategy::Sentence => "sentence",
            ChunkStrategy::Word => "word",
            ChunkStrategy::Fixed => "fixed",
        }
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paragraph" => Ok(ChunkStrategy::Paragraph),
            "sentence" => Ok(ChunkStrategy::Sentence),
            "word" => Ok(ChunkStrategy::Word),
            "fixed" => Ok(ChunkStrategy::Fixed),
            other => Err(Error::Validation(format!(
                "streaming_strategy must be one of: sentence, paragraph, fixed, word (got '{}')",
                other
            ))),
        }
    }
}

const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];
const CLAUSE_PUNCTUATION: [char; 3] = [',', ';', ':'];
const CLAUSE_DASHES: [&str; 2] = [" - ", " — "];
const CLAUSE_CONJUNCTIONS: [&str; 3] = [" and ", " or ", " but "];

const WORD_SEPARATOR: &str = " ";
const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Split `text` into ordered chunks of at most `max_length` characters.
///
/// Text that already fits is returned as a single chunk, untouched. Empty or
/// whitespace-only input yields no chunks. A `max_length` of zero is treated
/// as one.
pub fn split(text: &str, max_length: usize, strategy: ChunkStrategy) -> Vec<String> {
    let max_length = max_length.max(1);

    if text.trim().is_empty() {
        return Vec::new();
    }
    if char_len(text) <= max_length {
        return vec![text.to_string()];
    }

    match strategy {
        ChunkStrategy::Paragraph => split_paragraphs(text, max_length),
        ChunkStrategy::Sentence => split_sentences(text, max_length),
        ChunkStrategy::Word => split_words(text, max_length),
        ChunkStrategy::Fixed => split_fixed(text, max_length),
    }
}

fn split_paragraphs(text: &str, max_length: usize) -> Vec<String> {
    pack(
        paragraph_units(text),
        max_length,
        PARAGRAPH_SEPARATOR,
        split_sentences,
    )
}

fn split_sentences(text: &str, max_length: usize) -> Vec<String> {
    pack(sentence_units(text), max_length, WORD_SEPARATOR, split_clauses)
}

fn split_clauses(text: &str, max_length: usize) -> Vec<String> {
    pack(clause_units(text), max_length, WORD_SEPARATOR, split_words)
}

fn split_words(text: &str, max_length: usize) -> Vec<String> {
    pack(
        text.split_whitespace(),
        max_length,
        WORD_SEPARATOR,
        slice_chars,
    )
}

fn split_fixed(text: &str, max_length: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_length)
        .map(|window| window.iter().collect::<String>().trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

/// Last rung of the ladder: cut into `max_length` character windows.
fn slice_chars(unit: &str, max_length: usize) -> Vec<String> {
    let chars: Vec<char> = unit.chars().collect();
    chars
        .chunks(max_length)
        .map(|window| window.iter().collect::<String>())
        .filter(|piece| !piece.trim().is_empty())
        .collect()
}

/// Greedily pack units into chunks no longer than `max_length`.
///
/// A unit that cannot fit even on its own closes the current chunk and is
/// handed to `oversize`, whose pieces are emitted as standalone chunks.
fn pack<'a, I, F>(units: I, max_length: usize, separator: &str, oversize: F) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
    F: Fn(&str, usize) -> Vec<String>,
{
    let separator_len = char_len(separator);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for unit in units {
        let unit = unit.trim();
        if unit.is_empty() {
            continue;
        }
        let unit_len = char_len(unit);

        let joined_len = if current.is_empty() {
            unit_len
        } else {
            current_len + separator_len + unit_len
        };

        if joined_len <= max_length {
            if !current.is_empty() {
                current.push_str(separator);
            }
            current.push_str(unit);
            current_len = joined_len;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if unit_len > max_length {
            chunks.extend(oversize(unit, max_length));
        } else {
            current.push_str(unit);
            current_len = unit_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks.retain(|chunk| !chunk.trim().is_empty());
    chunks
}

/// Paragraphs are separated by a line containing only whitespace.
fn paragraph_units(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        if line.trim().is_empty() {
            if let Some(s) = start.take() {
                units.push(&text[s..end]);
            }
        } else {
            if start.is_none() {
                start = Some(line_start);
            }
            end = offset;
        }
    }
    if let Some(s) = start {
        units.push(&text[s..end]);
    }

    units
}

/// Sentences end after a terminator that is followed by whitespace.
fn sentence_units(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if !SENTENCE_TERMINATORS.contains(&ch) {
            continue;
        }
        if let Some(&(next_idx, next)) = chars.peek() {
            if next.is_whitespace() {
                units.push(&text[start..next_idx]);
                start = next_idx;
            }
        }
    }
    units.push(&text[start..]);

    units
}

/// Clause boundaries, leftmost match first.
///
/// Punctuation and dashes stay with the clause they close; conjunctions open
/// the clause that follows them, so no text is lost at a cut.
fn clause_units(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut start = 0;
    let mut resume = 0;

    for (idx, ch) in text.char_indices() {
        if idx < resume {
            continue;
        }
        let rest = &text[idx..];

        let cut = if CLAUSE_PUNCTUATION.contains(&ch)
            && rest[ch.len_utf8()..]
                .chars()
                .next()
                .is_some_and(char::is_whitespace)
        {
            Some((idx + ch.len_utf8(), idx + ch.len_utf8()))
        } else if let Some(dash) = CLAUSE_DASHES.iter().find(|d| rest.starts_with(**d)) {
            // Keep " -" on the left; the trailing space becomes the separator
            let dash_end = idx + dash.len() - 1;
            Some((dash_end, dash_end))
        } else if CLAUSE_CONJUNCTIONS.iter().any(|c| rest.starts_with(*c)) {
            Some((idx, idx + 1))
        } else {
            None
        };

        if let Some((left_end, next_start)) = cut {
            if left_end > start {
                units.push(&text[start..left_end]);
            }
            start = next_start;
            resume = next_start.max(idx + ch.len_utf8());
        }
    }
    units.push(&text[start..]);

    units
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ChunkStrategy; 4] = [
        ChunkStrategy::Paragraph,
        ChunkStrategy::Sentence,
        ChunkStrategy::Word,
        ChunkStrategy::Fixed,
    ];

    fn strip_whitespace(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    fn assert_well_formed(text: &str, max_length: usize, strategy: ChunkStrategy) {
        let chunks = split(text, max_length, strategy);
        assert!(!chunks.is_empty(), "{strategy}: no chunks");
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= max_length,
                "{strategy}: chunk {:?} exceeds {}",
                chunk,
                max_length
            );
            assert!(!chunk.trim().is_empty(), "{strategy}: empty chunk");
        }
        assert_eq!(
            strip_whitespace(&chunks.join(" ")),
            strip_whitespace(text),
            "{strategy}: text not preserved"
        );
    }

    #[test]
    fn test_short_text_single_chunk() {
        for strategy in ALL {
            assert_eq!(split("Hello there.", 50, strategy), vec!["Hello there."]);
        }
    }

    #[test]
    fn test_sentence_scenario() {
        assert_eq!(
            split("Hello. World.", 6, ChunkStrategy::Sentence),
            vec!["Hello.", "World."]
        );
    }

    #[test]
    fn test_sentences_packed_greedily() {
        let text = "One. Two. Three. Four.";
        assert_eq!(
            split(text, 10, ChunkStrategy::Sentence),
            vec!["One. Two.", "Three.", "Four."]
        );
    }

    #[test]
    fn test_sentence_requires_trailing_whitespace() {
        let text = "Version 1.5 is out! Get it now? Yes.";
        assert_eq!(
            split(text, 20, ChunkStrategy::Sentence),
            vec!["Version 1.5 is out!", "Get it now? Yes."]
        );
    }

    #[test]
    fn test_long_sentence_falls_back_to_clauses() {
        let text = "The quick brown fox jumps, the lazy dog sleeps; everyone watches";
        assert_eq!(
            split(text, 30, ChunkStrategy::Sentence),
            vec![
                "The quick brown fox jumps,",
                "the lazy dog sleeps;",
                "everyone watches"
            ]
        );
    }

    #[test]
    fn test_conjunction_opens_next_clause() {
        let text = "apples are red and bananas are yellow";
        assert_eq!(
            split(text, 20, ChunkStrategy::Sentence),
            vec!["apples are red", "and bananas are", "yellow"]
        );
    }

    #[test]
    fn test_dash_stays_on_left() {
        let text = "this is one thing - that is another";
        assert_eq!(
            split(text, 20, ChunkStrategy::Sentence),
            vec!["this is one thing -", "that is another"]
        );
    }

    #[test]
    fn test_clause_without_delimiters_falls_back_to_words() {
        let text = "alpha beta gamma delta epsilon zeta";
        assert_eq!(
            split(text, 12, ChunkStrategy::Sentence),
            vec!["alpha beta", "gamma delta", "epsilon zeta"]
        );
    }

    #[test]
    fn test_paragraph_strategy() {
        let text = "First paragraph here.\n\nSecond one.\n   \nThird paragraph is here.";
        assert_eq!(
            split(text, 40, ChunkStrategy::Paragraph),
            vec![
                "First paragraph here.\n\nSecond one.",
                "Third paragraph is here."
            ]
        );
    }

    #[test]
    fn test_oversize_paragraph_uses_sentences() {
        let text = "Short.\n\nA much longer paragraph. It has two sentences.";
        assert_eq!(
            split(text, 25, ChunkStrategy::Paragraph),
            vec!["Short.", "A much longer paragraph.", "It has two sentences."]
        );
    }

    #[test]
    fn test_single_newline_is_not_a_paragraph_break() {
        assert_eq!(
            paragraph_units("line one\nline two\n\nnext"),
            vec!["line one\nline two\n", "next"]
        );
    }

    #[test]
    fn test_word_strategy() {
        assert_eq!(
            split("aa bb cc dd ee", 5, ChunkStrategy::Word),
            vec!["aa bb", "cc dd", "ee"]
        );
    }

    #[test]
    fn test_word_strategy_slices_long_words() {
        assert_eq!(
            split("hi abcdefghij yo", 4, ChunkStrategy::Word),
            vec!["hi", "abcd", "efgh", "ij", "yo"]
        );
    }

    #[test]
    fn test_fixed_strategy() {
        assert_eq!(
            split("abcdefghij", 4, ChunkStrategy::Fixed),
            vec!["abcd", "efgh", "ij"]
        );
        assert_eq!(
            split("abc    defg", 4, ChunkStrategy::Fixed),
            vec!["abc", "d", "efg"]
        );
    }

    #[test]
    fn test_pathological_unit_terminates() {
        let text = "x".repeat(10_000);
        for strategy in ALL {
            let chunks = split(&text, 280, strategy);
            assert_eq!(chunks.len(), 36);
            assert!(chunks.iter().all(|c| c.chars().count() <= 280));
            assert_eq!(chunks.concat(), text);
        }
    }

    #[test]
    fn test_multibyte_lengths_are_characters() {
        let text = "ééééé ééééé ééééé";
        let chunks = split(text, 11, ChunkStrategy::Word);
        assert_eq!(chunks, vec!["ééééé ééééé", "ééééé"]);

        let sliced = split(&"日本語".repeat(10), 7, ChunkStrategy::Sentence);
        assert!(sliced.iter().all(|c| c.chars().count() <= 7));
        assert_eq!(sliced.concat(), "日本語".repeat(10));
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        for strategy in ALL {
            assert!(split("", 10, strategy).is_empty());
            assert!(split("   \n\t ", 10, strategy).is_empty());
        }
    }

    #[test]
    fn test_properties_hold_for_mixed_text() {
        let text = "Dr. Smith arrived late; nobody minded. The meeting, however, ran long \
                    and everyone was tired — especially the interns!\n\n\
                    Next paragraph: a list of items, some short, some considerably longer \
                    than the others, and one supercalifragilisticexpialidocious word. Done?";
        for strategy in ALL {
            for max_length in [1, 5, 17, 40, 80, 500] {
                assert_well_formed(text, max_length, strategy);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "a, b; c: d - e and f or g but h. ".repeat(20);
        for strategy in ALL {
            assert_eq!(split(&text, 13, strategy), split(&text, 13, strategy));
        }
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("word".parse::<ChunkStrategy>().unwrap(), ChunkStrategy::Word);
        assert!("sentences".parse::<ChunkStrategy>().is_err());
        assert_eq!(ChunkStrategy::Paragraph.to_string(), "paragraph");
    }
}
