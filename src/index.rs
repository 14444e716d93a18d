//! Maintains the post index: a JSON array of post summaries, newest first,
//! that the site's listing page renders.

use crate::post::GeneratedPost;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Serializer, Value};
use std::fmt;
use tracing::warn;

/// One summary in the post index.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PostIndexEntry {
    pub title: String,

    /// Path of the post page relative to the site root, e.g.
    /// `blog/5-tips.html`.
    pub href: String,

    pub category: String,
    pub excerpt: String,
}

impl PostIndexEntry {
    /// Builds the summary for `post`, whose page lives at `href`.
    pub fn new(post: &GeneratedPost, href: &str) -> PostIndexEntry {
        PostIndexEntry {
            title: post.title.clone(),
            href: href.to_owned(),
            category: post.category.clone(),
            excerpt: post.excerpt.clone(),
        }
    }
}

/// Parses the existing index. A missing, unparseable, or non-array document
/// counts as an empty index. Entries are kept as raw JSON so that fields this
/// tool doesn't know about survive the rewrite.
pub fn parse(existing: Option<&str>) -> Vec<Value> {
    let text = match existing {
        Some(text) => text,
        None => return Vec::new(),
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            warn!("post index is not a JSON array; starting a new index");
            Vec::new()
        }
        Err(err) => {
            warn!(error = %err, "post index is not valid JSON; starting a new index");
            Vec::new()
        }
    }
}

/// Returns the new index text with `entry` inserted at the front of the
/// `existing` index.
pub fn prepend(existing: Option<&str>, entry: &PostIndexEntry) -> Result<String> {
    let mut entries = parse(existing);
    entries.insert(0, serde_json::to_value(entry)?);
    to_string(&entries)
}

/// Serializes with four-space indentation.
fn to_string(entries: &[Value]) -> Result<String> {
    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    entries.serialize(&mut serializer)?;
    // `serde_json` only emits valid UTF-8.
    String::from_utf8(buf).map_err(|e| Error(e.to_string()))
}

/// The result of a fallible index operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to serialize the index.
#[derive(Debug)]
pub struct Error(String);

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Serializing post index: {}", self.0)
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    /// Converts [`serde_json::Error`]s into [`Error`]. This allows us to use
    /// the `?` operator.
    fn from(err: serde_json::Error) -> Error {
        Error(err.to_string())
    }
}
