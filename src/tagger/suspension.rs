// WHY: A suspension is a narrator interjection splitting one quotation, so a
// nonquote only qualifies when it sits mid-paragraph, opens in lower case and
// holds no sentence break. Sentence ends are consumed by a single forward
// cursor shared across all nonquotes, never rescanned.

use std::collections::HashSet;

use tracing::debug;

use super::{rclass, require, TagConfig, TagError};
use crate::region::{Book, Region};
use crate::tokenizer::types_from_string;

/// Add quote.suspension.short / quote.suspension.long tags.
pub(crate) fn tagger_quote_suspension(book: &mut Book, config: &TagConfig) -> Result<(), TagError> {
    if book.has_attempted(rclass::SUSPENSION_SHORT) || book.has_attempted(rclass::SUSPENSION_LONG) {
        return Ok(());
    }
    require(book, rclass::QUOTE_NONQUOTE, rclass::SUSPENSION_SHORT)?;
    require(book, rclass::CHAPTER_SENTENCE, rclass::SUSPENSION_SHORT)?;
    require(book, rclass::CHAPTER_PARAGRAPH, rclass::SUSPENSION_SHORT)?;
    book.declare(rclass::SUSPENSION_SHORT);
    book.declare(rclass::SUSPENSION_LONG);

    let sentences: Vec<Region> = book.regions(rclass::CHAPTER_SENTENCE).to_vec();
    let paragraph_starts: HashSet<usize> = book
        .regions(rclass::CHAPTER_PARAGRAPH)
        .iter()
        .map(|r| r.start)
        .collect();
    let nonquotes: Vec<Region> = book.regions(rclass::QUOTE_NONQUOTE).to_vec();

    let mut short: Vec<Region> = Vec::new();
    let mut long: Vec<Region> = Vec::new();
    let content = book.content();
    // Forward cursor over sentence-final character positions. The opening
    // sentence of the book is skipped: nothing quotable precedes it.
    let mut sent_idx = 0usize;
    let mut cursor = 0usize;

    'nonquote: for r in &nonquotes {
        if paragraph_starts.contains(&r.start) {
            // Leads its paragraph, so it cannot sit between two quotes.
            continue;
        }
        let first_alnum = content[r.start..r.end].chars().find(|c| c.is_alphanumeric());
        if first_alnum.map_or(false, char::is_uppercase) {
            // A capitalized start reads as a fresh sentence, not a reporting
            // clause.
            continue;
        }
        // Advance the cursor past this region, bailing if a sentence ends
        // strictly inside it.
        while cursor < r.end {
            if cursor > r.start {
                continue 'nonquote;
            }
            sent_idx += 1;
            cursor = match sentences.get(sent_idx) {
                Some(s) => s.end - last_char_len(content, s.end),
                None => content.len(),
            };
        }

        match types_from_string(book.text_at(r)).count() {
            0 => {} // pure punctuation
            n if n >= config.long_suspension_words => long.push(*r),
            _ => short.push(*r),
        }
    }
    debug!(
        book = %book.name,
        short = short.len(),
        long = long.len(),
        "suspensions classified"
    );

    book.set_regions(rclass::SUSPENSION_SHORT, short);
    book.set_regions(rclass::SUSPENSION_LONG, long);
    Ok(())
}

/// Byte length of the character ending at `pos` (a char boundary).
fn last_char_len(content: &str, pos: usize) -> usize {
    content[..pos].chars().next_back().map_or(1, char::len_utf8)
}
