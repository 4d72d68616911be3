// WHY: UAX#29 word boundaries alone mishandle literary text - hyphenated
// compounds, trailing possessives and elisions ('tis) must stay one token.
// This module layers those domain rules on top of unicode-segmentation and
// normalizes tokens into lower-cased ASCII "types" for matching.

use unicode_segmentation::{UWordBoundIndices, UnicodeSegmentation};

/// Hyphen characters that join words when flanked by alphanumerics
/// (HYPHEN-MINUS and U+2010 HYPHEN, per the note in UAX#29).
const HYPHEN_WORD_PARTS: &[char] = &['\u{2D}', '\u{2010}'];

/// Apostrophes the standard keeps inside words but not at the edges.
const APOSTROPHE_WORD_PARTS: &[char] = &['\'', '\u{2019}'];

/// Words where a leading apostrophe marks an elision and belongs to the word.
const ELISION_WORDS: &[&str] = &["tis", "twas", "twill", "twould", "em"];

/// Normalize a raw token into a type: lower-case, fold to plain ASCII, strip
/// one surrounding underscore from each end (`_connoisseur_` -> `connoisseur`).
pub fn normalize_type(token: &str) -> String {
    let folded = deunicode::deunicode(&token.to_lowercase());
    let t = folded.strip_prefix('_').unwrap_or(&folded);
    let t = t.strip_suffix('_').unwrap_or(t);
    t.to_string()
}

/// Whether a word-boundary segment continues a token rather than breaking it.
///
/// `off` is the segment's byte offset into `text`; `additional` holds extra
/// single-char word parts (the query parser passes `*` for wildcards).
pub(crate) fn is_word_part(text: &str, off: usize, seg: &str, additional: &[char]) -> bool {
    if seg.chars().any(char::is_alphanumeric) {
        return true;
    }

    let mut chars = seg.chars();
    let c = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return false,
    };

    if additional.contains(&c) {
        return true;
    }

    let before = text[..off].chars().next_back();
    let after_off = off + seg.len();

    if HYPHEN_WORD_PARTS.contains(&c) {
        // In: over-the-top, 22-skidoo. Out: over-, handled--
        let wordy = |ch: Option<char>| {
            ch.map(|ch| ch.is_alphanumeric() || additional.contains(&ch))
                .unwrap_or(false)
        };
        return wordy(before) && wordy(text[after_off..].chars().next());
    }

    if APOSTROPHE_WORD_PARTS.contains(&c) {
        // Trailing possessive: 3 days' work. An open-quote never follows `s`.
        if before == Some('s') {
            return true;
        }
        return elision_follows(&text[after_off..]);
    }

    false
}

/// Does `rest` begin with a whitelisted elision word followed by a non-word
/// character? (`'tis ` yes, `'twmade-up-word` no.)
fn elision_follows(rest: &str) -> bool {
    for word in ELISION_WORDS {
        if let Some(candidate) = rest.get(..word.len()) {
            if candidate.eq_ignore_ascii_case(word) {
                if let Some(next) = rest[word.len()..].chars().next() {
                    if !next.is_alphanumeric() && next != '_' {
                        return true;
                    }
                }
            }
        }
    }
    false
}

/// Lazy stream of `(type, start, end)` tuples over a text. Single forward
/// pass; start/end are byte offsets into the original text (plus any caller
/// offset), so the original-case substring is always recoverable.
pub struct Types<'a> {
    text: &'a str,
    offset: usize,
    additional: &'a [char],
    segments: UWordBoundIndices<'a>,
    word_start: Option<usize>,
}

impl<'a> Types<'a> {
    fn new(text: &'a str, offset: usize, additional: &'a [char]) -> Self {
        Types {
            text,
            offset,
            additional,
            segments: text.split_word_bound_indices(),
            word_start: None,
        }
    }

    fn token(&self, start: usize, end: usize) -> (String, usize, usize) {
        (
            normalize_type(&self.text[start..end]),
            start + self.offset,
            end + self.offset,
        )
    }
}

impl<'a> Iterator for Types<'a> {
    type Item = (String, usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.segments.next() {
                Some((off, seg)) => {
                    if is_word_part(self.text, off, seg, self.additional) {
                        self.word_start.get_or_insert(off);
                    } else if let Some(start) = self.word_start.take() {
                        return Some(self.token(start, off));
                    }
                }
                None => {
                    return self
                        .word_start
                        .take()
                        .map(|start| self.token(start, self.text.len()));
                }
            }
        }
    }
}

/// Extract `(type, start, end)` tuples from a text. Never fails: any UTF-8
/// input tokenizes, possibly to nothing.
pub fn types_from_string(text: &str) -> Types<'_> {
    Types::new(text, 0, &[])
}

/// As [`types_from_string`], adding `offset` to every start/end. Used when
/// tokenizing a region sliced out of a larger book.
pub fn types_from_string_at(text: &str, offset: usize) -> Types<'_> {
    Types::new(text, offset, &[])
}

/// Turn a concordance query into a list of SQL LIKE expressions: `*` is kept
/// as part of a type and converted to `%`, literal LIKE metacharacters are
/// escaped.
pub fn parse_query(query: &str) -> Vec<String> {
    const WILDCARDS: &[char] = &['*'];
    Types::new(query, 0, WILDCARDS)
        .map(|(t, _, _)| {
            t.replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
                .replace('*', "%")
        })
        .collect()
}
