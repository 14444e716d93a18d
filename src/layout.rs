//! Derives the reusable header and footer fragments of a post page from an
//! existing page on the site (the "template page").
//!
//! The template is split at two text anchors: the section marker, which opens
//! the article area, and the related marker, which closes the "related
//! articles" list. Both anchors are searched for literally. When an anchor
//! occurs more than once, the first usable occurrence wins and a warning is
//! logged; the split is still well-defined, but the template probably isn't
//! the page its author thought it was.

use serde::Deserialize;
use std::fmt;
use tracing::warn;

/// The default section marker, which opens the article area.
pub const SECTION_MARKER: &str = r#"<section class="about">"#;

/// The default related marker, which closes the related-articles list and the
/// wrappers around it.
pub const RELATED_MARKER: &str =
    "</ul>\n            </div>\n        </div>\n    </section>";

/// Re-opens the article area at the end of the header.
const SECTION_OPEN: &str =
    "<section class=\"about\">\n        <div class=\"about-content\">";

/// Opens the related-articles list at the start of the footer.
const RELATED_OPEN: &str = "\n            <div class=\"article-body\">\n                <h3>Related articles</h3>\n                <ul>\n";

/// The anchors used to split a template page.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Markers {
    /// Opens the article area. Everything before it becomes the header.
    pub section_marker: String,

    /// Closes the related-articles list. Everything from it onward becomes
    /// the footer.
    pub related_marker: String,
}

impl Default for Markers {
    fn default() -> Self {
        Markers {
            section_marker: SECTION_MARKER.to_owned(),
            related_marker: RELATED_MARKER.to_owned(),
        }
    }
}

/// The header and footer fragments of a post page.
#[derive(Clone, Debug, PartialEq)]
pub struct PageLayout {
    /// Everything up to and including the re-opened article wrapper.
    pub header: String,

    /// The related-articles opener followed by the rest of the template.
    pub footer: String,
}

/// Splits `template` into a [`PageLayout`] using the default [`Markers`].
pub fn extract_layout(template: &str) -> Result<PageLayout> {
    extract_layout_with(template, &Markers::default())
}

/// Splits `template` into a [`PageLayout`] using `markers`.
pub fn extract_layout_with(template: &str, markers: &Markers) -> Result<PageLayout> {
    let section_marker = markers.section_marker.as_str();
    let related_marker = markers.related_marker.as_str();

    let section_at = find_first(template, section_marker)
        .ok_or(Error::MissingMarker(MarkerKind::Section))?;

    // The related list lives inside the article area, so only occurrences
    // after the section marker are usable.
    let search_from = section_at + section_marker.len();
    let related_at = match find_first(&template[search_from..], related_marker) {
        Some(offset) => search_from + offset,
        None if template.contains(related_marker) => return Err(Error::Misordered),
        None => return Err(Error::MissingMarker(MarkerKind::Related)),
    };

    let mut header = String::with_capacity(section_at + SECTION_OPEN.len());
    header.push_str(&template[..section_at]);
    header.push_str(SECTION_OPEN);

    let mut footer =
        String::with_capacity(RELATED_OPEN.len() + template.len() - related_at);
    footer.push_str(RELATED_OPEN);
    // The footer starts at the related marker rather than after it, so the
    // page gets the closing tags for the wrappers the header opens.
    footer.push_str(&template[related_at..]);

    Ok(PageLayout { header, footer })
}

fn find_first(haystack: &str, marker: &str) -> Option<usize> {
    if marker.is_empty() {
        return None;
    }
    let first = haystack.find(marker)?;
    let occurrences = haystack.matches(marker).count();
    if occurrences > 1 {
        warn!(
            marker,
            occurrences, "template marker is ambiguous; splitting at the first occurrence"
        );
    }
    Some(first)
}

/// Identifies one of the two anchors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MarkerKind {
    Section,
    Related,
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MarkerKind::Section => f.write_str("section"),
            MarkerKind::Related => f.write_str("related-articles"),
        }
    }
}

/// The result of a fallible layout extraction.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a template page that can't be split.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// Returned when a marker doesn't occur in the template at all.
    MissingMarker(MarkerKind),

    /// Returned when the related marker only occurs before the section
    /// marker.
    Misordered,
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingMarker(kind) => {
                write!(f, "Template is missing the {} marker", kind)
            }
            Error::Misordered => write!(
                f,
                "Template's related-articles marker precedes its section marker"
            ),
        }
    }
}

impl std::error::Error for Error {}
