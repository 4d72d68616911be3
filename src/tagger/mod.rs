// WHY: Fixed-order tagging pipeline over a Book - each stage derives one
// family of region classes and is a no-op when its classes were already
// attempted, so partially pre-tagged books can be completed incrementally.

use regex_automata::meta::Regex;
use thiserror::Error;
use tracing::debug;

use crate::region::Book;

pub mod chapter;
pub mod metadata;
pub mod quote;
pub mod suspension;

/// Region class names produced by the pipeline.
pub mod rclass {
    pub const METADATA_TITLE: &str = "metadata.title";
    pub const METADATA_AUTHOR: &str = "metadata.author";
    pub const CHAPTER_PART: &str = "chapter.part";
    pub const CHAPTER_TITLE: &str = "chapter.title";
    pub const CHAPTER_TEXT: &str = "chapter.text";
    pub const CHAPTER_PARAGRAPH: &str = "chapter.paragraph";
    pub const CHAPTER_SENTENCE: &str = "chapter.sentence";
    pub const QUOTE_QUOTE: &str = "quote.quote";
    pub const QUOTE_EMBEDDED: &str = "quote.embedded";
    pub const QUOTE_NONQUOTE: &str = "quote.nonquote";
    pub const SUSPENSION_SHORT: &str = "quote.suspension.short";
    pub const SUSPENSION_LONG: &str = "quote.suspension.long";
}

#[derive(Debug, Error)]
pub enum TagError {
    /// A tagger was invoked before the regions it scans within were derived.
    /// Continuing would silently produce wrong offsets, so this is fatal.
    #[error("{tagger} requires {dependency} regions to be tagged first")]
    MissingDependency {
        tagger: &'static str,
        dependency: &'static str,
    },
    #[error("invalid tagging pattern: {0}")]
    Pattern(#[from] regex_automata::meta::BuildError),
}

pub(crate) fn require(
    book: &Book,
    dependency: &'static str,
    tagger: &'static str,
) -> Result<(), TagError> {
    if book.has_attempted(dependency) {
        Ok(())
    } else {
        Err(TagError::MissingDependency { tagger, dependency })
    }
}

/// Tunable tables for the pipeline. Owned immutably by [`Tagger`], so one
/// tagger instance can tag any number of books concurrently.
#[derive(Debug, Clone)]
pub struct TagConfig {
    /// Heading words for part breaks ("PART 1.", "BOOK II.").
    pub part_words: Vec<String>,
    /// Heading words that open a numbered chapter.
    pub chapter_words: Vec<String>,
    /// Open/close quote mark pairs, scanned in the quote state machine.
    pub quote_pairs: Vec<(char, char)>,
    /// Word tokens needed for a candidate quote to pass on length alone.
    pub min_quote_words: usize,
    /// Leading spaces that mark a continued quotation paragraph.
    pub continuation_indent: usize,
    /// Word tokens at which a suspension counts as long rather than short.
    pub long_suspension_words: usize,
    /// Abbreviations that suppress a sentence break after their period.
    pub title_abbreviations: Vec<String>,
}

impl Default for TagConfig {
    fn default() -> Self {
        let words = |ws: &[&str]| ws.iter().map(|w| w.to_string()).collect();
        Self {
            part_words: words(&["PART", "BOOK"]),
            // BOOK headings are part breaks, not numbered chapters, so they
            // live in part_words rather than here.
            chapter_words: words(&[
                "APPENDIX",
                "INTRODUCTION",
                "PREFACE",
                "CHAPTER",
                "CONCLUSION",
                "PROLOGUE",
                "PRELUDE",
                "MORAL",
            ]),
            quote_pairs: vec![
                ('\u{201C}', '\u{201D}'), // English double
                ('\u{2018}', '\u{2019}'), // English single
                ('"', '"'),               // Double universal
                ('\'', '\''),             // Single universal
            ],
            min_quote_words: 5,
            continuation_indent: 3,
            long_suspension_words: 5,
            title_abbreviations: words(&[
                "Mr.", "Mrs.", "Ms.", "Dr.", "Prof.", "Rev.", "Capt.", "Col.",
                "Sgt.", "St.", "Mme.", "Mlle.", "Sr.", "Jr.",
            ]),
        }
    }
}

/// The region-tagging pipeline: metadata, chapters, quotes, suspensions, in
/// that fixed order. Compiles its heading patterns once at construction.
///
/// Tagging is a pure synchronous transformation of one [`Book`]; a `Tagger`
/// holds no mutable state and is safe to share across threads.
pub struct Tagger {
    config: TagConfig,
    part_pattern: Regex,
    title_pattern: Regex,
    metadata_pattern: Regex,
}

impl Tagger {
    pub fn new(config: TagConfig) -> Result<Self, TagError> {
        let part_pattern = Regex::new(&format!(
            r"(?m)^(?:{}) [0-9IVXLC]+\..*",
            config.part_words.join("|")
        ))?;
        let title_pattern = Regex::new(&format!(
            r"(?m)^(?:{})\s?[0-9IVXLC]*\..*",
            config.chapter_words.join("|")
        ))?;
        // Two non-empty lines then a blank line at the very start of the book.
        let metadata_pattern = Regex::new(r"\A(.+)\n(.+)\n\n")?;
        Ok(Self {
            config,
            part_pattern,
            title_pattern,
            metadata_pattern,
        })
    }

    pub fn with_default_rules() -> Result<Self, TagError> {
        Self::new(TagConfig::default())
    }

    pub fn config(&self) -> &TagConfig {
        &self.config
    }

    /// Add any missing region classes to `book`. Either the book comes back
    /// fully tagged or a contract violation is reported; malformed text never
    /// errors, it just tags fewer regions.
    pub fn tag(&self, book: &mut Book) -> Result<(), TagError> {
        self.tag_metadata(book)?;
        self.tag_chapter(book)?;
        self.tag_quote(book)?;
        self.tag_suspension(book)?;
        debug!(
            book = %book.name,
            classes = book.region_classes().count(),
            "tagging complete"
        );
        Ok(())
    }

    /// Detect the optional two-line title/author header.
    pub fn tag_metadata(&self, book: &mut Book) -> Result<(), TagError> {
        metadata::tagger_metadata(book, &self.metadata_pattern);
        Ok(())
    }

    /// Derive chapter.part/title/text/paragraph/sentence regions.
    pub fn tag_chapter(&self, book: &mut Book) -> Result<(), TagError> {
        chapter::tagger_chapter_part(book, &self.part_pattern);
        chapter::tagger_chapter_title(book, &self.title_pattern);
        chapter::tagger_chapter_text(book);
        chapter::tagger_chapter_paragraph(book)?;
        chapter::tagger_chapter_sentence(book, &self.config.title_abbreviations)?;
        Ok(())
    }

    /// Run the quote state machine, then derive nonquote regions by interval
    /// inversion within each chapter.
    pub fn tag_quote(&self, book: &mut Book) -> Result<(), TagError> {
        quote::tagger_quote_quote(book, &self.config)?;
        quote::tagger_quote_nonquote(book)?;
        Ok(())
    }

    /// Classify nonquote regions sitting between two quotes as suspensions.
    pub fn tag_suspension(&self, book: &mut Book) -> Result<(), TagError> {
        suspension::tagger_quote_suspension(book, &self.config)
    }
}
