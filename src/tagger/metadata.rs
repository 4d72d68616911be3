// WHY: Books imported from plain text may carry a two-line title/author
// header; tagging it keeps those lines out of chapter zero's front matter.

use regex_automata::meta::Regex;
use tracing::debug;

use super::rclass;
use crate::region::Book;

/// Add metadata.title / metadata.author regions when the book opens with two
/// non-empty lines followed by a blank line. Anything else is ignored - a
/// missing header is normal, not an error.
pub(crate) fn tagger_metadata(book: &mut Book, pattern: &Regex) {
    let mut caps = pattern.create_captures();
    pattern.captures(book.content(), &mut caps);
    if !caps.is_match() {
        return;
    }
    let title = caps.get_group(1).expect("group 1 always present on match");
    let author = caps.get_group(2).expect("group 2 always present on match");

    if !book.has_attempted(rclass::METADATA_TITLE) {
        book.append_trimmed(rclass::METADATA_TITLE, title.start, title.end, None);
    }
    if !book.has_attempted(rclass::METADATA_AUTHOR) {
        book.append_trimmed(rclass::METADATA_AUTHOR, author.start, author.end, None);
    }
    debug!(book = %book.name, "metadata header detected");
}
