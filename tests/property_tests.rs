// Structural invariants that must hold for arbitrary input text, not just
// well-behaved books.

use proptest::prelude::*;

use quire::tagger::rclass;
use quire::{Book, Region, Tagger};

fn block() -> BoxedStrategy<String> {
    prop_oneof![
        1 => Just("CHAPTER I. A heading.".to_string()).boxed(),
        1 => Just("INTRODUCTION.".to_string()).boxed(),
        8 => "[a-zA-Z \"'\u{201C}\u{201D}\u{2018}\u{2019},.!?;:-]{1,80}".boxed(),
    ]
    .boxed()
}

fn book_text() -> impl Strategy<Value = String> {
    prop::collection::vec(block(), 1..6).prop_map(|blocks| blocks.join("\n\n"))
}

fn tagged(text: &str) -> Book {
    let tagger = Tagger::with_default_rules().expect("default rules compile");
    let mut book = Book::new("prop", text);
    tagger.tag(&mut book).expect("tagging succeeds");
    book
}

fn within<'a>(regions: &'a [Region], outer: &Region) -> impl Iterator<Item = &'a Region> + 'a {
    let (start, end) = (outer.start, outer.end);
    regions.iter().filter(move |r| r.start >= start && r.end <= end)
}

proptest! {
    /// quote.quote and quote.nonquote partition each chapter's text, with
    /// nothing but trimmed whitespace between consecutive regions.
    #[test]
    fn quote_and_nonquote_partition_each_chapter(text in book_text()) {
        let book = tagged(&text);
        for ch in book.regions(rclass::CHAPTER_TEXT) {
            let mut covered: Vec<(usize, usize)> =
                within(book.regions(rclass::QUOTE_QUOTE), ch)
                    .chain(within(book.regions(rclass::QUOTE_NONQUOTE), ch))
                    .map(|r| (r.start, r.end))
                    .collect();
            covered.sort_unstable();
            let mut cursor = ch.start;
            for (start, end) in covered {
                prop_assert!(start >= cursor, "overlap at {start}");
                prop_assert!(
                    book.content()[cursor..start].trim().is_empty(),
                    "uncovered text {:?}",
                    &book.content()[cursor..start]
                );
                cursor = end;
            }
            prop_assert!(book.content()[cursor..ch.end].trim().is_empty());
        }
    }

    /// Every embedded quote sits inside exactly one committed quote.
    #[test]
    fn embedded_quotes_nest_inside_quotes(text in book_text()) {
        let book = tagged(&text);
        let quotes = book.regions(rclass::QUOTE_QUOTE);
        for e in book.regions(rclass::QUOTE_EMBEDDED) {
            let containers = quotes
                .iter()
                .filter(|q| q.start < e.start && e.end <= q.end)
                .count();
            prop_assert_eq!(containers, 1, "embedded {:?} in {} quotes", e, containers);
        }
    }

    /// Suspensions are whole nonquote regions, never fragments.
    #[test]
    fn suspensions_are_nonquote_regions(text in book_text()) {
        let book = tagged(&text);
        let nonquotes = book.regions(rclass::QUOTE_NONQUOTE);
        for rclass in [rclass::SUSPENSION_SHORT, rclass::SUSPENSION_LONG] {
            for s in book.regions(rclass) {
                prop_assert!(
                    nonquotes.iter().any(|n| n.start == s.start && n.end == s.end),
                    "suspension {:?} is not a nonquote",
                    s
                );
            }
        }
    }

    /// Tagging an already-tagged book changes nothing.
    #[test]
    fn tagging_twice_is_identical(text in book_text()) {
        let tagger = Tagger::with_default_rules().expect("default rules compile");
        let mut book = Book::new("prop", text);
        tagger.tag(&mut book).expect("first pass");
        let first = book.flatten();
        tagger.tag(&mut book).expect("second pass");
        prop_assert_eq!(book.flatten(), first);
    }

    /// Title ordinals count up from one; paragraph and sentence ordinals
    /// restart at one inside every chapter.
    #[test]
    fn ordinals_count_as_documented(text in book_text()) {
        let book = tagged(&text);
        for (i, title) in book.regions(rclass::CHAPTER_TITLE).iter().enumerate() {
            prop_assert_eq!(title.rvalue, Some(i as u32 + 1));
        }
        let texts = book.regions(rclass::CHAPTER_TEXT);
        for pair in texts.windows(2) {
            prop_assert!(pair[0].rvalue <= pair[1].rvalue);
        }
        for rclass in [rclass::CHAPTER_PARAGRAPH, rclass::CHAPTER_SENTENCE] {
            for ch in texts {
                for (i, r) in within(book.regions(rclass), ch).enumerate() {
                    prop_assert_eq!(r.rvalue, Some(i as u32 + 1));
                }
            }
        }
    }

    /// Every region produced by any tagger is trimmed and non-empty.
    #[test]
    fn regions_are_trimmed_and_non_empty(text in book_text()) {
        let book = tagged(&text);
        for rclass in book.region_classes() {
            for r in book.regions(rclass) {
                prop_assert!(r.start < r.end);
                let t = book.text_at(r);
                prop_assert_eq!(t, t.trim(), "untrimmed {} region", rclass);
            }
        }
    }
}
