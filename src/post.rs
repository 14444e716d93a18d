//! Defines [`GeneratedPost`], the structured record returned by the
//! text-generation backend, and the logic for parsing it out of the
//! backend's raw response text.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// The fields every response must carry.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "title",
    "description",
    "content_html",
    "category",
    "excerpt",
    "slug",
];

/// The fields a response may carry. Absent values default to the empty
/// string.
pub const OPTIONAL_FIELDS: [&str; 2] = ["social_poster_text", "social_caption"];

/// Meta descriptions longer than this get truncated by search engines.
pub const DESCRIPTION_LIMIT: usize = 160;

/// A blog post as produced by the text-generation backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GeneratedPost {
    pub title: String,
    pub description: String,

    /// Body markup. This is trusted and inserted into the page verbatim.
    pub content_html: String,

    pub category: String,
    pub excerpt: String,

    /// The file stem and URL segment for the post. See
    /// [`GeneratedPost::normalize_slug`].
    pub slug: String,

    pub social_poster_text: String,
    pub social_caption: String,
}

impl GeneratedPost {
    /// Parses a post out of the backend's response text. The response may be
    /// a bare JSON object or one wrapped in a fenced code block.
    pub fn from_response(text: &str) -> Result<GeneratedPost> {
        let object = match serde_json::from_str::<Value>(strip_fence(text))? {
            Value::Object(object) => object,
            _ => return Err(Error::NotAnObject),
        };

        Ok(GeneratedPost {
            title: required(&object, "title")?,
            description: required(&object, "description")?,
            content_html: required(&object, "content_html")?,
            category: required(&object, "category")?,
            excerpt: required(&object, "excerpt")?,
            slug: required(&object, "slug")?,
            social_poster_text: optional(&object, "social_poster_text")?,
            social_caption: optional(&object, "social_caption")?,
        })
    }

    /// Makes `slug` URL-safe. Falls back to the slugified title if nothing
    /// survives.
    pub fn normalize_slug(&mut self) {
        let slug = slug::slugify(&self.slug);
        self.slug = match slug.is_empty() {
            true => slug::slugify(&self.title),
            false => slug,
        };
    }
}

fn required(object: &Map<String, Value>, field: &'static str) -> Result<String> {
    match object.get(field) {
        None | Some(Value::Null) => Err(Error::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(Error::NotAString(field)),
    }
}

fn optional(object: &Map<String, Value>, field: &'static str) -> Result<String> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(Error::NotAString(field)),
    }
}

/// Strips a fenced code block (e.g., ```` ```json ... ``` ````) if the
/// response has one. Text before the opening fence and after the closing
/// fence is dropped, and the fence may sit on a single line.
fn strip_fence(text: &str) -> &str {
    const FENCE: &str = "```";
    let trimmed = text.trim();

    // A bare object may itself contain fences inside its string values.
    if trimmed.starts_with('{') {
        return trimmed;
    }
    let open = match trimmed.find(FENCE) {
        Some(i) => i + FENCE.len(),
        None => return trimmed,
    };

    // Skip the info string (e.g., `json`), which runs up to the first
    // character that can't be part of a language name.
    let rest = &trimmed[open..];
    let body_start = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    let body = &rest[body_start..];
    match body.rfind(FENCE) {
        Some(body_stop) => body[..body_stop].trim(),
        None => body.trim(),
    }
}

/// The result of a fallible response-parsing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a response that doesn't match the [`GeneratedPost`] shape.
#[derive(Debug)]
pub enum Error {
    /// Returned when the response isn't valid JSON.
    Json(serde_json::Error),

    /// Returned when the response is JSON but not an object.
    NotAnObject,

    /// Returned when a required field is absent or null.
    MissingField(&'static str),

    /// Returned when a field is present but isn't a string.
    NotAString(&'static str),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Json(err) => write!(f, "Response is not valid JSON: {}", err),
            Error::NotAnObject => write!(f, "Response is not a JSON object"),
            Error::MissingField(field) => {
                write!(f, "Response is missing required field `{}`", field)
            }
            Error::NotAString(field) => {
                write!(f, "Response field `{}` is not a string", field)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    /// Converts [`serde_json::Error`]s into [`Error`]. This allows us to use
    /// the `?` operator.
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}
