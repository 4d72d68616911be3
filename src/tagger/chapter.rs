// WHY: Chapter structure drives everything downstream - quotes scan within
// paragraphs, suspensions consult sentences. Headings come from a fixed
// vocabulary; sentence breaking is UAX#29 with line-wrap suppression.

use regex_automata::meta::Regex;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use super::{rclass, require, TagError};
use crate::region::{Book, Region};

/// Add chapter.part tags: "PART 1." / "BOOK II." headings. Informational
/// only; they never advance the chapter count.
pub(crate) fn tagger_chapter_part(book: &mut Book, pattern: &Regex) {
    if book.has_attempted(rclass::CHAPTER_PART) {
        return;
    }
    book.declare(rclass::CHAPTER_PART);
    let matches: Vec<_> = pattern.find_iter(book.content()).collect();
    for (i, m) in matches.into_iter().enumerate() {
        book.append_trimmed(rclass::CHAPTER_PART, m.start(), m.end(), Some(i as u32 + 1));
    }
}

/// Add chapter.title tags: heading-vocabulary lines, numbered in document
/// order. Chapter text following title N shares its ordinal.
pub(crate) fn tagger_chapter_title(book: &mut Book, pattern: &Regex) {
    if book.has_attempted(rclass::CHAPTER_TITLE) {
        return;
    }
    book.declare(rclass::CHAPTER_TITLE);
    let matches: Vec<_> = pattern.find_iter(book.content()).collect();
    for (i, m) in matches.into_iter().enumerate() {
        book.append_trimmed(rclass::CHAPTER_TITLE, m.start(), m.end(), Some(i as u32 + 1));
    }
}

/// Add chapter.text tags: everything between one heading/metadata boundary
/// and the next. Front matter before the first heading is chapter zero.
pub(crate) fn tagger_chapter_text(book: &mut Book) {
    if book.has_attempted(rclass::CHAPTER_TEXT) {
        return;
    }
    book.declare(rclass::CHAPTER_TEXT);

    // Anything that must not be part of a chapter, in document order.
    let mut headings: Vec<(Region, bool)> = Vec::new();
    for rc in [rclass::METADATA_TITLE, rclass::METADATA_AUTHOR, rclass::CHAPTER_PART] {
        headings.extend(book.regions(rc).iter().map(|r| (*r, false)));
    }
    headings.extend(book.regions(rclass::CHAPTER_TITLE).iter().map(|r| (*r, true)));
    let len = book.content().len();
    headings.push((Region::new(len, len), false));
    headings.sort_by(|a, b| Region::document_order(&a.0, &b.0));

    let mut last_b = 0;
    let mut chapter_num = 0u32;
    for (heading, is_title) in headings {
        book.append_trimmed(rclass::CHAPTER_TEXT, last_b, heading.start, Some(chapter_num));
        if is_title {
            // Text takes the ordinal of the title that introduced it.
            chapter_num = heading.rvalue.unwrap_or(chapter_num);
        }
        last_b = heading.end;
    }
    debug!(
        book = %book.name,
        chapters = book.regions(rclass::CHAPTER_TEXT).len(),
        "chapter text derived"
    );
}

/// Add chapter.paragraph tags: blank-line-delimited spans inside each
/// chapter text, 1-based per chapter.
pub(crate) fn tagger_chapter_paragraph(book: &mut Book) -> Result<(), TagError> {
    if book.has_attempted(rclass::CHAPTER_PARAGRAPH) {
        return Ok(());
    }
    require(book, rclass::CHAPTER_TEXT, rclass::CHAPTER_PARAGRAPH)?;
    book.declare(rclass::CHAPTER_PARAGRAPH);

    let chapters: Vec<Region> = book.regions(rclass::CHAPTER_TEXT).to_vec();
    for ch in chapters {
        let splits: Vec<usize> = book.content()[ch.start..ch.end]
            .match_indices("\n\n")
            .map(|(i, _)| ch.start + i)
            .collect();
        let mut last_b = ch.start;
        let mut i = 1u32;
        for b in splits {
            if book.append_trimmed(rclass::CHAPTER_PARAGRAPH, last_b, b, Some(i)) {
                i += 1;
            }
            last_b = b;
        }
        book.append_trimmed(rclass::CHAPTER_PARAGRAPH, last_b, ch.end, Some(i));
    }
    Ok(())
}

/// Add chapter.sentence tags: UAX#29 sentence spans inside each chapter,
/// 1-based per chapter and continuing across paragraph boundaries.
pub(crate) fn tagger_chapter_sentence(
    book: &mut Book,
    abbreviations: &[String],
) -> Result<(), TagError> {
    if book.has_attempted(rclass::CHAPTER_SENTENCE) {
        return Ok(());
    }
    require(book, rclass::CHAPTER_TEXT, rclass::CHAPTER_SENTENCE)?;
    book.declare(rclass::CHAPTER_SENTENCE);

    let shadow = unwrap_line_breaks(book.content());
    let breaks = sentence_breaks(&shadow, abbreviations);

    let chapters: Vec<Region> = book.regions(rclass::CHAPTER_TEXT).to_vec();
    for ch in chapters {
        let mut last_b = ch.start;
        let mut i = 1u32;
        let from = breaks.partition_point(|&b| b <= ch.start);
        for &b in &breaks[from..] {
            if b > ch.end {
                break;
            }
            if book.append_trimmed(rclass::CHAPTER_SENTENCE, last_b, b, Some(i)) {
                i += 1;
            }
            last_b = b;
        }
        book.append_trimmed(rclass::CHAPTER_SENTENCE, last_b, ch.end, Some(i));
    }
    Ok(())
}

/// Copy of the content with intra-paragraph line wraps turned into spaces,
/// so the sentence segmenter never breaks at the end of a wrapped line.
/// Byte-for-byte the same length, so offsets into it are offsets into the
/// original content.
fn unwrap_line_breaks(content: &str) -> String {
    let bytes = content.as_bytes();
    let mut out = String::with_capacity(content.len());
    for (i, ch) in content.char_indices() {
        if ch == '\n' && bytes.get(i + 1) != Some(&b'\n') {
            out.push(' ');
        } else {
            out.push(ch);
        }
    }
    out
}

/// All sentence-break offsets in the text, minus breaks sitting right after
/// a known abbreviation ("asked Mr. Jaggers" is one sentence).
fn sentence_breaks(shadow: &str, abbreviations: &[String]) -> Vec<usize> {
    shadow
        .split_sentence_bound_indices()
        .map(|(off, seg)| off + seg.len())
        .filter(|&b| !abbreviation_precedes(shadow, b, abbreviations))
        .collect()
}

fn abbreviation_precedes(text: &str, pos: usize, abbreviations: &[String]) -> bool {
    let before = text[..pos].trim_end();
    abbreviations.iter().any(|abbr| {
        before.ends_with(abbr.as_str()) && {
            let head = &before[..before.len() - abbr.len()];
            head.chars().next_back().map_or(true, |c| !c.is_alphanumeric())
        }
    })
}

#[cfg(test)]
mod tests {
    use crate::region::Book;
    use crate::tagger::{rclass, Tagger};

    fn tagged(text: &str) -> Book {
        let tagger = Tagger::with_default_rules().unwrap();
        let mut book = Book::new("test", text);
        tagger.tag_metadata(&mut book).unwrap();
        tagger.tag_chapter(&mut book).unwrap();
        book
    }

    fn class_texts(book: &Book, rclass: &str) -> Vec<(String, Option<u32>)> {
        book.regions(rclass)
            .iter()
            .map(|r| (book.text_at(r).to_string(), r.rvalue))
            .collect()
    }

    #[test]
    fn test_headings_split_chapters() {
        let book = tagged(
            "Initial text is the zero'th chapter.\n\n\
             INTRODUCTION.\n\n\
             The introduction has some chapter text.\nIt's not very exciting.\n\n\
             CHAPTER I. The first chapter\n\n\
             The first chapter has some text.\n\n\
             CHAPTER II. The second, empty, chapter\n\n\
             CHAPTER III. The third, chapter\n\n\
             ...has some text too, which goes to the very end.",
        );
        assert_eq!(
            class_texts(&book, rclass::CHAPTER_TITLE),
            vec![
                ("INTRODUCTION.".to_string(), Some(1)),
                ("CHAPTER I. The first chapter".to_string(), Some(2)),
                ("CHAPTER II. The second, empty, chapter".to_string(), Some(3)),
                ("CHAPTER III. The third, chapter".to_string(), Some(4)),
            ]
        );
        assert_eq!(
            class_texts(&book, rclass::CHAPTER_TEXT),
            vec![
                ("Initial text is the zero'th chapter.".to_string(), Some(0)),
                (
                    "The introduction has some chapter text.\nIt's not very exciting."
                        .to_string(),
                    Some(1)
                ),
                ("The first chapter has some text.".to_string(), Some(2)),
                (
                    "...has some text too, which goes to the very end.".to_string(),
                    Some(4)
                ),
            ]
        );
    }

    #[test]
    fn test_metadata_excluded_from_chapter_zero() {
        let book = tagged(
            "Fly Fishing\nJ R Hartley\n\n\
             Initial text is the zero'th chapter, but not including title.\n\n\
             INTRODUCTION.\n\n\
             The introduction has some chapter text.",
        );
        assert_eq!(
            class_texts(&book, rclass::CHAPTER_TEXT)[0].0,
            "Initial text is the zero'th chapter, but not including title."
        );
    }

    #[test]
    fn test_no_headings_is_one_unnumbered_chapter() {
        let book = tagged("Here is some text, without any preamble\nIt's not very exciting.");
        assert_eq!(
            class_texts(&book, rclass::CHAPTER_TEXT),
            vec![(
                "Here is some text, without any preamble\nIt's not very exciting."
                    .to_string(),
                Some(0)
            )]
        );
        assert!(book.regions(rclass::CHAPTER_TITLE).is_empty());
    }

    #[test]
    fn test_paragraph_and_sentence_counts_reset_per_chapter() {
        let book = tagged(
            "Initial text is the zero'th chapter. Second sentence.\n\n\
             INTRODUCTION.\n\n\
             First chapter, first sentence. Second sentence. Third sentence.\n\n\
             Second paragraph, fourth sentence. Fifth!\n\n\
             CHAPTER I. The first chapter\n\n\
             First chapter, first sentence. Second sentence. Third.\n\n\
             Second paragraph, fourth sentence. Fifth!",
        );
        let paragraphs = class_texts(&book, rclass::CHAPTER_PARAGRAPH);
        assert_eq!(
            paragraphs
                .iter()
                .map(|(_, v)| v.unwrap())
                .collect::<Vec<_>>(),
            vec![1, 1, 2, 1, 2]
        );
        let sentences = class_texts(&book, rclass::CHAPTER_SENTENCE);
        assert_eq!(
            sentences
                .iter()
                .map(|(_, v)| v.unwrap())
                .collect::<Vec<_>>(),
            vec![1, 2, 1, 2, 3, 4, 5, 1, 2, 3, 4, 5]
        );
        assert_eq!(sentences[3].0, "Second sentence.");
        assert_eq!(sentences[6].0, "Fifth!");
    }

    #[test]
    fn test_part_headings_do_not_advance_chapter_numbers() {
        let book = tagged(
            "Initial text is the zero'th chapter. Second sentence.\n\n\
             BOOK 1.\n\n\
             CHAPTER I. The first chapter in Book 1\n\n\
             The text in chapter 1.\n\n\
             CHAPTER II. The second chapter\n\n\
             The text in chapter 2.\n\n\
             BOOK 2.\n\n\
             Some introductory text at start of the book.\n\n\
             CHAPTER I. The first chapter in Book 2\n\n\
             First chapter. Note that the chapter numbers carry on from previous book",
        );
        assert_eq!(
            class_texts(&book, rclass::CHAPTER_PART),
            vec![
                ("BOOK 1.".to_string(), Some(1)),
                ("BOOK 2.".to_string(), Some(2)),
            ]
        );
        let texts = class_texts(&book, rclass::CHAPTER_TEXT);
        assert_eq!(
            texts.iter().map(|(_, v)| v.unwrap()).collect::<Vec<_>>(),
            vec![0, 1, 2, 2, 3]
        );
        assert_eq!(
            texts[3].0,
            "Some introductory text at start of the book."
        );
    }

    #[test]
    fn test_line_wraps_do_not_break_sentences() {
        let book = tagged(
            "modest-looking little shop-window, containing a few newspapers, some\n\
             Rather yellow packets of stationery, and two or three books of ballads.\n\
             Above the door was painted in very small, dingy letters, the words,\n\
             \"James Oliver, News Agent.\"",
        );
        let sentences = class_texts(&book, rclass::CHAPTER_SENTENCE);
        assert_eq!(sentences.len(), 2);
        assert!(sentences[0].0.ends_with("books of ballads."));
        assert!(sentences[1].0.starts_with("Above the door"));
    }

    #[test]
    fn test_abbreviations_do_not_break_sentences() {
        let book = tagged("\u{201C}And on what evidence, Pip,\u{201D} asked Mr. Jaggers, very coolly.");
        let sentences = class_texts(&book, rclass::CHAPTER_SENTENCE);
        assert_eq!(sentences.len(), 1);
    }
}
