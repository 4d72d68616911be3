// WHY: Shared region model for all taggers - offsets, ordering and the TSV
// interchange format live here so taggers only deal in (start, end) pairs

use std::collections::BTreeMap;
use thiserror::Error;

/// A half-open byte-offset interval `[start, end)` into a book's content,
/// optionally carrying an ordinal (chapter number, paragraph-in-chapter, ...).
///
/// Offsets are byte offsets and always fall on UTF-8 character boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: usize,
    pub end: usize,
    pub rvalue: Option<u32>,
}

impl Region {
    pub fn new(start: usize, end: usize) -> Self {
        Region { start, end, rvalue: None }
    }

    pub fn with_value(start: usize, end: usize, rvalue: u32) -> Self {
        Region { start, end, rvalue: Some(rvalue) }
    }

    /// Document ordering: start ascending, ties broken by end descending so
    /// outer spans sort before inner spans starting at the same point.
    pub fn document_order(a: &Region, b: &Region) -> std::cmp::Ordering {
        a.start.cmp(&b.start).then(b.end.cmp(&a.end))
    }
}

/// A book under tagging: immutable content plus per-class region lists.
///
/// A region class counts as *attempted* once its key exists in the map, even
/// with zero regions. Taggers skip classes that were already attempted, which
/// makes the pipeline idempotent and lets callers supply pre-tagged regions
/// recovered from storage.
#[derive(Debug, Clone)]
pub struct Book {
    pub name: String,
    content: String,
    regions: BTreeMap<String, Vec<Region>>,
}

impl Book {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Book {
            name: name.into(),
            content: content.into(),
            regions: BTreeMap::new(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Regions of one class, in document order. Empty slice when the class
    /// was never attempted.
    pub fn regions(&self, rclass: &str) -> &[Region] {
        self.regions.get(rclass).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn region_classes(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    pub fn has_attempted(&self, rclass: &str) -> bool {
        self.regions.contains_key(rclass)
    }

    /// Mark a class as attempted without adding any regions.
    pub fn declare(&mut self, rclass: &str) {
        self.regions.entry(rclass.to_string()).or_default();
    }

    /// Replace a class's regions wholesale, restoring document order.
    pub fn set_regions(&mut self, rclass: &str, mut regions: Vec<Region>) {
        regions.sort_by(Region::document_order);
        self.regions.insert(rclass.to_string(), regions);
    }

    /// The text a region covers.
    pub fn text_at(&self, region: &Region) -> &str {
        &self.content[region.start..region.end]
    }

    /// Shrink `[start, end)` until neither end touches whitespace, then append
    /// it to `rclass` if anything is left. Returns true iff a region was added.
    ///
    /// Empty-after-trimming regions are silently dropped: producers never emit
    /// whitespace-only spans, so consumers never need to check.
    pub fn append_trimmed(
        &mut self,
        rclass: &str,
        start: usize,
        end: usize,
        rvalue: Option<u32>,
    ) -> bool {
        self.declare(rclass);
        let (start, end) = match trim_span(&self.content, start, end) {
            Some(span) => span,
            None => return false,
        };
        self.regions
            .get_mut(rclass)
            .expect("declared above")
            .push(Region { start, end, rvalue });
        true
    }

    /// Flatten all region classes to a single sorted tuple stream, suitable
    /// for diffing and re-import. Sorted by (start, -end, class).
    pub fn flatten(&self) -> Vec<FlatRegion> {
        let mut out = Vec::new();
        for (rclass, regions) in &self.regions {
            for r in regions {
                out.push(FlatRegion {
                    rclass: rclass.clone(),
                    start: r.start,
                    end: r.end,
                    rvalue: r.rvalue,
                    preview: preview_snippet(self.text_at(r)),
                });
            }
        }
        out.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(b.end.cmp(&a.end))
                .then(a.rclass.cmp(&b.rclass))
        });
        out
    }

    /// Reverse of [`Book::flatten`]: rebuild per-class region lists from a
    /// flattened stream. Previously attempted classes are replaced.
    ///
    /// Spans that do not fit this book's content (out of bounds, inverted, or
    /// off a UTF-8 character boundary) are rejected up front, so stale or
    /// mismatched TSV data errors out instead of panicking in [`Book::text_at`].
    pub fn apply_flat(
        &mut self,
        flat: impl IntoIterator<Item = FlatRegion>,
    ) -> Result<(), FlatParseError> {
        let mut grouped: BTreeMap<String, Vec<Region>> = BTreeMap::new();
        for f in flat {
            if f.start > f.end
                || f.end > self.content.len()
                || !self.content.is_char_boundary(f.start)
                || !self.content.is_char_boundary(f.end)
            {
                return Err(FlatParseError::InvalidSpan {
                    rclass: f.rclass,
                    start: f.start,
                    end: f.end,
                });
            }
            grouped.entry(f.rclass).or_default().push(Region {
                start: f.start,
                end: f.end,
                rvalue: f.rvalue,
            });
        }
        for (rclass, regions) in grouped {
            self.set_regions(&rclass, regions);
        }
        Ok(())
    }
}

/// Shrink a span until there is no whitespace at either end; None when
/// nothing non-whitespace remains.
fn trim_span(content: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    if start >= end || end > content.len() {
        return None;
    }
    let slice = &content[start..end];
    let from_start = slice.len() - slice.trim_start().len();
    let from_end = slice.len() - slice.trim_end().len();
    let start = start + from_start;
    let end = end - from_end;
    if start < end {
        Some((start, end))
    } else {
        None
    }
}

/// Given regions in document order, return the gaps between them. With
/// `full_length` the extremities (before the first region, after the last)
/// are included; without it they are ignored. Empty gaps are skipped.
pub fn regions_invert(regions: &[Region], full_length: Option<usize>) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut last_end: Option<usize> = None;
    for r in regions {
        match last_end {
            None => {
                if full_length.is_some() && r.start > 0 {
                    out.push((0, r.start));
                }
            }
            Some(last) => {
                if r.start > last {
                    out.push((last, r.start));
                }
            }
        }
        // Overlapping inputs are legal (a multi-paragraph quote overlaps the
        // paragraph gap regions), so the frontier only ever moves forward.
        last_end = Some(last_end.map_or(r.end, |l| l.max(r.end)));
    }
    if let Some(full) = full_length {
        let last = last_end.unwrap_or(0);
        if full > last {
            out.push((last, full));
        }
    }
    out
}

/// One line of the flattened interchange stream:
/// `class <TAB> start <TAB> end <TAB> rvalue-or-empty <TAB> preview`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRegion {
    pub rclass: String,
    pub start: usize,
    pub end: usize,
    pub rvalue: Option<u32>,
    pub preview: String,
}

#[derive(Debug, Error)]
pub enum FlatParseError {
    #[error("flattened region line has {0} fields, expected at least 4")]
    MissingFields(usize),
    #[error("invalid {field} in flattened region line: {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("{rclass} span [{start}, {end}) does not fit the book content")]
    InvalidSpan {
        rclass: String,
        start: usize,
        end: usize,
    },
}

impl FlatRegion {
    pub fn to_tsv_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            self.rclass,
            self.start,
            self.end,
            self.rvalue.map(|v| v.to_string()).unwrap_or_default(),
            self.preview,
        )
    }

    /// Parse a TSV line back into a region tuple. The preview column is
    /// informational and optional; only the first four fields are required.
    pub fn from_tsv_line(line: &str) -> Result<Self, FlatParseError> {
        let mut fields = line.splitn(5, '\t');
        let rclass = fields.next().unwrap_or("");
        let start = fields.next();
        let end = fields.next();
        let rvalue = fields.next();
        let preview = fields.next().unwrap_or("");
        let (start, end, rvalue) = match (start, end, rvalue) {
            (Some(s), Some(e), Some(v)) => (s, e, v),
            _ => {
                let n = line.split('\t').count();
                return Err(FlatParseError::MissingFields(n));
            }
        };
        let parse = |field: &'static str, value: &str| {
            value.parse::<usize>().map_err(|_| FlatParseError::InvalidField {
                field,
                value: value.to_string(),
            })
        };
        Ok(FlatRegion {
            rclass: rclass.to_string(),
            start: parse("start", start)?,
            end: parse("end", end)?,
            rvalue: if rvalue.is_empty() {
                None
            } else {
                Some(rvalue.parse::<u32>().map_err(|_| FlatParseError::InvalidField {
                    field: "rvalue",
                    value: rvalue.to_string(),
                })?)
            },
            preview: preview.to_string(),
        })
    }
}

/// Human preview for flattened output: abbreviated to the first and last 20
/// characters once a region gets long, with line breaks kept out of the TSV.
fn preview_snippet(text: &str) -> String {
    let escaped: String = text
        .chars()
        .flat_map(|c| match c {
            '\n' => "\\n".chars().collect::<Vec<_>>(),
            '\r' => "\\r".chars().collect(),
            '\t' => "\\t".chars().collect(),
            c => vec![c],
        })
        .collect();
    let count = escaped.chars().count();
    if count < 40 {
        return escaped;
    }
    let head: String = escaped.chars().take(20).collect();
    let tail_skip = count - 20;
    let tail: String = escaped.chars().skip(tail_skip).collect();
    format!("{head}...{tail}")
}
