//! Requests a [`GeneratedPost`] from a text-generation backend. The
//! [`Generator`] trait is the seam; [`Gemini`] is the backend the binary
//! uses.

use crate::post::{self, GeneratedPost, OPTIONAL_FIELDS, REQUIRED_FIELDS};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Produces a [`GeneratedPost`] from free-text instructions.
pub trait Generator {
    fn request_post(&self, instructions: &str) -> Result<GeneratedPost>;
}

/// Appends the output-format requirements to the user's `instructions`.
pub fn build_prompt(instructions: &str, categories: &[String]) -> String {
    let categories = categories
        .iter()
        .map(|c| format!("'{}'", c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!("Use these instructions: {}\n\n", instructions.trim());
    prompt.push_str("Format the output as a JSON object with these keys:\n");
    for field in REQUIRED_FIELDS.iter().chain(OPTIONAL_FIELDS.iter()) {
        let description = match *field {
            "title" => "String (SEO-friendly title)".to_owned(),
            "description" => format!(
                "String (SEO meta description, max {} chars, includes call to action)",
                post::DESCRIPTION_LIMIT
            ),
            "content_html" => "String (The HTML content to go inside .article-body. Use <h2> for subheadings, <p> for paragraphs, and <ul>/<li> for lists.)".to_owned(),
            "category" => format!("String (One of: {})", categories),
            "excerpt" => "String (A 1-2 sentence summary for the blog card)".to_owned(),
            "slug" => "String (SEO-friendly URL slug)".to_owned(),
            "social_poster_text" => "String (Text for social media poster)".to_owned(),
            "social_caption" => "String (Caption for social media including relevant hashtags)".to_owned(),
            _ => "String".to_owned(),
        };
        prompt.push_str(&format!("- {}: {}\n", field, description));
    }
    prompt.push_str("\nReturn ONLY the JSON.\n");
    prompt
}

/// Talks to the Gemini `generateContent` REST endpoint.
pub struct Gemini {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    categories: Vec<String>,
}

impl Gemini {
    /// Constructs a new backend. `timeout` bounds the whole request.
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: &str,
        categories: &[String],
        timeout: Duration,
    ) -> Result<Gemini> {
        Ok(Gemini {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
            api_key: api_key.to_owned(),
            categories: categories.to_vec(),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

impl Generator for Gemini {
    fn request_post(&self, instructions: &str) -> Result<GeneratedPost> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(instructions, &self.categories),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        info!(model = %self.model, "requesting post from text-generation backend");
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response_text(&body)?;
        debug!(bytes = text.len(), "received response text");
        GeneratedPost::from_response(&text).map_err(|err| Error::Malformed { err, text })
    }
}

/// Pulls the generated text out of a `generateContent` response body.
fn response_text(body: &str) -> Result<String> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| Error::Protocol(e.to_string()))?;
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    match text.trim().is_empty() {
        true => Err(Error::EmptyResponse),
        false => Ok(text),
    }
}

/// Replays a response saved from an earlier run instead of calling a
/// backend.
pub struct Recorded {
    pub text: String,
}

impl Generator for Recorded {
    fn request_post(&self, _instructions: &str) -> Result<GeneratedPost> {
        GeneratedPost::from_response(&self.text).map_err(|err| Error::Malformed {
            err,
            text: self.text.clone(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// The result of a fallible generation request.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failed generation request.
#[derive(Debug)]
pub enum Error {
    /// Returned when the backend can't be reached or the request times out.
    Transport(reqwest::Error),

    /// Returned when the backend answers with a non-success status.
    Status { status: u16, body: String },

    /// Returned when the backend's envelope can't be decoded.
    Protocol(String),

    /// Returned when the backend answers without any text.
    EmptyResponse,

    /// Returned when the generated text isn't a valid post.
    Malformed { err: post::Error, text: String },
}

impl Error {
    /// Reports whether the backend answered but its text wasn't a usable
    /// post.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::Malformed { .. })
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Transport(err) => write!(f, "Requesting post: {}", err),
            Error::Status { status, body } => {
                write!(f, "Backend returned status {}: {}", status, body)
            }
            Error::Protocol(err) => write!(f, "Decoding backend response: {}", err),
            Error::EmptyResponse => write!(f, "Backend returned no text"),
            Error::Malformed { err, .. } => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(err) => Some(err),
            Error::Malformed { err, .. } => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    /// Converts [`reqwest::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator for fallible HTTP operations.
    fn from(err: reqwest::Error) -> Error {
        Error::Transport(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn categories() -> Vec<String> {
        vec!["Coffee Shops".to_owned(), "Seasonal Sales".to_owned()]
    }

    #[test]
    fn test_prompt_names_every_field_and_category() {
        let prompt = build_prompt("Write about stamp cards.\n", &categories());
        assert!(prompt.starts_with("Use these instructions: Write about stamp cards.\n"));
        for field in REQUIRED_FIELDS.iter().chain(OPTIONAL_FIELDS.iter()) {
            assert!(prompt.contains(&format!("- {}: ", field)), "{}", field);
        }
        assert!(prompt.contains("One of: 'Coffee Shops', 'Seasonal Sales'"));
        assert!(prompt.ends_with("Return ONLY the JSON.\n"));
    }

    #[test]
    fn test_request_body_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "hi".to_owned(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };
        assert_eq!(
            serde_json::json!({
                "contents": [{"parts": [{"text": "hi"}]}],
                "generationConfig": {"responseMimeType": "application/json"}
            }),
            serde_json::to_value(&request).unwrap()
        );
    }

    #[test]
    fn test_response_text_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#;
        assert_eq!("{\"a\":1}", response_text(body).unwrap());
    }

    #[test]
    fn test_response_without_candidates() {
        assert!(matches!(
            response_text(r#"{"candidates":[]}"#),
            Err(Error::EmptyResponse)
        ));
        assert!(matches!(
            response_text(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#),
            Err(Error::EmptyResponse)
        ));
        assert!(matches!(response_text("<html>"), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_recorded_response() {
        let recorded = Recorded {
            text: r#"{"title":"t","description":"d","content_html":"c","category":"k","excerpt":"e","slug":"s"}"#.to_owned(),
        };
        assert_eq!("t", recorded.request_post("ignored").unwrap().title);

        let broken = Recorded {
            text: "not json".to_owned(),
        };
        let err = broken.request_post("ignored").unwrap_err();
        assert!(err.is_malformed());
    }
}
