// WHY: Quote detection is a state machine over word-boundary tokens, one
// chapter at a time. At most one outer and one embedded quote are ever open;
// an unclosed quote survives a paragraph break only when the next paragraph
// signals continuation, and survives the end of the book only when the
// candidate still looks like a quote.

use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use super::{rclass, require, TagConfig, TagError};
use crate::region::{regions_invert, Book, Region};
use crate::tokenizer::is_word_part;

/// An opening mark we are waiting to close: the awaited closing mark, the
/// offset of the opening mark, and the word count when it opened.
struct OpenMark {
    close: char,
    start: usize,
    words_before: usize,
}

/// Add quote.quote and quote.embedded tags.
pub(crate) fn tagger_quote_quote(book: &mut Book, config: &TagConfig) -> Result<(), TagError> {
    let do_quote = !book.has_attempted(rclass::QUOTE_QUOTE);
    let do_embedded = !book.has_attempted(rclass::QUOTE_EMBEDDED);
    if !do_quote && !do_embedded {
        return Ok(());
    }
    require(book, rclass::CHAPTER_PARAGRAPH, rclass::QUOTE_QUOTE)?;
    book.declare(rclass::QUOTE_QUOTE);
    book.declare(rclass::QUOTE_EMBEDDED);

    let chapters: Vec<Region> = book.regions(rclass::CHAPTER_TEXT).to_vec();
    let paragraphs: Vec<Region> = book.regions(rclass::CHAPTER_PARAGRAPH).to_vec();
    let mut quotes: Vec<(usize, usize)> = Vec::new();
    let mut embedded_spans: Vec<(usize, usize)> = Vec::new();

    let content = book.content();
    for ch in &chapters {
        let lo = paragraphs.partition_point(|p| p.start < ch.start);
        let hi = paragraphs.partition_point(|p| p.start < ch.end);
        let paras = &paragraphs[lo..hi];
        let at_book_end = hi == paragraphs.len();

        let mut outer: Option<OpenMark> = None;
        let mut inner: Option<OpenMark> = None;
        // Embedded candidates are held back until their outer quote commits,
        // so an abandoned outer never leaves an orphaned embedded region.
        let mut pending: Vec<(usize, usize)> = Vec::new();
        let mut words = 0usize;

        for (pi, para) in paras.iter().enumerate() {
            let text = &content[para.start..para.end];
            let mut in_word = false;
            for (off, seg) in text.split_word_bound_indices() {
                if is_word_part(text, off, seg, &[]) {
                    if !in_word {
                        words += 1;
                        in_word = true;
                    }
                    continue;
                }
                in_word = false;
                let mark = match single_char(seg) {
                    Some(c) => c,
                    None => continue,
                };
                let seg_start = para.start + off;
                let seg_end = seg_start + seg.len();

                if let Some(q) = inner.take_if(|q| q.close == mark) {
                    if is_quote(content, q.start, seg_end, mark, true, words - q.words_before, config) {
                        pending.push((q.start, seg_end));
                    }
                    continue;
                }
                if let Some(q) = outer.take_if(|q| q.close == mark) {
                    // Closing the outer quote abandons any still-open
                    // embedded candidate.
                    inner = None;
                    if is_quote(content, q.start, seg_end, mark, true, words - q.words_before, config) {
                        quotes.push((q.start, seg_end));
                        embedded_spans.append(&mut pending);
                    } else {
                        pending.clear();
                    }
                    continue;
                }
                if let Some(close) = closing_mark(config, mark) {
                    match &outer {
                        None => {
                            outer = Some(OpenMark { close, start: seg_start, words_before: words });
                        }
                        Some(o) if close != o.close => {
                            // One level of nesting only: a deeper opening mark
                            // replaces the embedded candidate, it never stacks.
                            inner = Some(OpenMark { close, start: seg_start, words_before: words });
                        }
                        // An opener awaiting the same closing mark as the open
                        // quote is unreadable as nesting; skip it.
                        Some(_) => {}
                    }
                }
            }

            if let Some(next) = paras.get(pi + 1) {
                // Embedded quotes never cross a paragraph break.
                inner = None;
                if outer.is_some() && !continues_quote(content, next.start, config) {
                    outer = None;
                    pending.clear();
                }
            }
        }

        // An open quote at the end of a chapter is abandoned, except at the
        // very end of the book, where open-ended quotations are plausible.
        if at_book_end {
            if let (Some(last), Some(o)) = (paras.last(), outer) {
                if is_quote(content, o.start, last.end, o.close, false, words - o.words_before, config) {
                    quotes.push((o.start, last.end));
                    embedded_spans.append(&mut pending);
                    if let Some(q) = inner {
                        if is_quote(content, q.start, last.end, q.close, false, words - q.words_before, config)
                        {
                            embedded_spans.push((q.start, last.end));
                        }
                    }
                }
            }
        }
    }
    debug!(
        book = %book.name,
        quotes = quotes.len(),
        embedded = embedded_spans.len(),
        "quote scan complete"
    );

    if do_quote {
        for (start, end) in quotes {
            book.append_trimmed(rclass::QUOTE_QUOTE, start, end, None);
        }
    }
    if do_embedded {
        for (start, end) in embedded_spans {
            book.append_trimmed(rclass::QUOTE_EMBEDDED, start, end, None);
        }
    }
    Ok(())
}

/// Add quote.nonquote tags: within each chapter, everything that is neither a
/// quote nor a gap between paragraphs.
pub(crate) fn tagger_quote_nonquote(book: &mut Book) -> Result<(), TagError> {
    if book.has_attempted(rclass::QUOTE_NONQUOTE) {
        return Ok(());
    }
    require(book, rclass::QUOTE_QUOTE, rclass::QUOTE_NONQUOTE)?;
    require(book, rclass::CHAPTER_PARAGRAPH, rclass::QUOTE_NONQUOTE)?;
    book.declare(rclass::QUOTE_NONQUOTE);

    let chapters: Vec<Region> = book.regions(rclass::CHAPTER_TEXT).to_vec();
    let quotes: Vec<Region> = book.regions(rclass::QUOTE_QUOTE).to_vec();
    let paragraphs: Vec<Region> = book.regions(rclass::CHAPTER_PARAGRAPH).to_vec();

    let mut gaps: Vec<(usize, usize)> = Vec::new();
    for ch in &chapters {
        let paras = {
            let lo = paragraphs.partition_point(|p| p.start < ch.start);
            let hi = paragraphs.partition_point(|p| p.start < ch.end);
            &paragraphs[lo..hi]
        };
        let qs = {
            let lo = quotes.partition_point(|q| q.start < ch.start);
            let hi = quotes.partition_point(|q| q.start < ch.end);
            &quotes[lo..hi]
        };
        // Mask out the quotes, the gaps between paragraphs, and everything
        // before the chapter; what remains of the chapter is nonquote.
        let mut blocked: Vec<Region> = Vec::with_capacity(qs.len() + paras.len() + 1);
        blocked.push(Region::new(0, ch.start));
        blocked.extend_from_slice(qs);
        blocked.extend(
            regions_invert(paras, None)
                .into_iter()
                .map(|(b, e)| Region::new(b, e)),
        );
        blocked.sort_by(Region::document_order);
        gaps.extend(regions_invert(&blocked, Some(ch.end)));
    }

    for (start, end) in gaps {
        book.append_trimmed(rclass::QUOTE_NONQUOTE, start, end, None);
    }
    Ok(())
}

fn single_char(seg: &str) -> Option<char> {
    let mut chars = seg.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn closing_mark(config: &TagConfig, mark: char) -> Option<char> {
    config
        .quote_pairs
        .iter()
        .find(|&&(open, _)| open == mark)
        .map(|&(_, close)| close)
}

/// Does the paragraph starting at `para_start` continue a quotation left open
/// by the previous paragraph? Yes when it leads with an opening mark, or when
/// its line is indented far enough to read as a quotation block.
fn continues_quote(content: &str, para_start: usize, config: &TagConfig) -> bool {
    let leads_with_mark = content[para_start..]
        .chars()
        .next()
        .map_or(false, |c| config.quote_pairs.iter().any(|&(open, _)| open == c));
    if leads_with_mark {
        return true;
    }
    // Paragraph regions are whitespace-trimmed, so the indentation sits just
    // before the region start.
    let mut spaces = 0;
    for c in content[..para_start].chars().rev() {
        match c {
            ' ' => spaces += 1,
            '\n' => return spaces >= config.continuation_indent,
            _ => return false,
        }
    }
    spaces >= config.continuation_indent
}

/// Marks whose closer doubles as an apostrophe; too noisy to accept a
/// candidate on word count alone.
const APOSTROPHE_CLOSERS: &[char] = &['\u{2019}', '\''];
/// Punctuation welded to an opening mark from the left.
const ATTACHED_BEFORE_OPEN: &[char] = &['(', ',', ':', ';'];
/// Punctuation welded to a closing mark from the left.
const ATTACHED_BEFORE_CLOSE: &[char] = &[',', '?', '.', '!', '-', ';', '_'];

/// Decide whether a candidate span is a real quotation. `closed` is false
/// when the span ran to the end of the book without its closing mark, in
/// which case only the open-side clauses apply.
fn is_quote(
    content: &str,
    start: usize,
    end: usize,
    close: char,
    closed: bool,
    word_count: usize,
    config: &TagConfig,
) -> bool {
    // Long enough, unless closed by an apostrophe look-alike: a stray
    // grammatical apostrophe (o'clock) can leave a plausible-length span.
    if word_count >= config.min_quote_words && !APOSTROPHE_CLOSERS.contains(&close) {
        return true;
    }

    // Attached punctuation immediately before the opening mark (he said,"...).
    // Only the dash clause tolerates whitespace between it and the mark.
    let before_open = chars_before(content, start, 4);
    if before_open.trim_end().ends_with("--")
        || before_open.chars().next_back().map_or(false, |c| ATTACHED_BEFORE_OPEN.contains(&c))
    {
        return true;
    }
    // A dash straight after the opening mark ("--quoted).
    let open_len = content[start..].chars().next().map_or(0, char::len_utf8);
    if chars_after(content, start + open_len, 5).trim_start().starts_with("--") {
        return true;
    }

    if closed {
        // Attached punctuation immediately before the closing mark ("That,");
        // again only the dash clause is whitespace-tolerant.
        let close_start = end - close.len_utf8();
        let before_close = chars_before(content, close_start, 5);
        if before_close.trim_end().ends_with("--")
            || before_close
                .chars()
                .next_back()
                .map_or(false, |c| ATTACHED_BEFORE_CLOSE.contains(&c))
        {
            return true;
        }
        // A dash straight after the closing mark ("Because"--).
        if chars_after(content, end, 5).trim_start().starts_with("--") {
            return true;
        }
    }
    false
}

/// Up to `n` characters of `content` ending at `pos`.
fn chars_before(content: &str, pos: usize, n: usize) -> &str {
    let mut start = pos;
    for _ in 0..n {
        match content[..start].chars().next_back() {
            Some(c) => start -= c.len_utf8(),
            None => break,
        }
    }
    &content[start..pos]
}

/// Up to `n` characters of `content` starting at `pos`.
fn chars_after(content: &str, pos: usize, n: usize) -> &str {
    let mut end = pos;
    for c in content[pos..].chars().take(n) {
        end += c.len_utf8();
    }
    &content[pos..end]
}
