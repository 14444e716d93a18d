//! Exports the [`publish`] function which stitches together the high-level
//! steps of a run: checking inputs, splitting the template page
//! ([`crate::layout`]), requesting the post ([`crate::generate`]), and
//! writing the page, index, and sitemap ([`crate::write`]).

use crate::config::{Config, API_KEY_VARIABLE};
use crate::exit_codes;
use crate::generate::{self, Gemini, Generator, Recorded};
use crate::journal;
use crate::layout::{self, extract_layout_with};
use crate::write::{self, OnCollision, Staged, WriteResult, Writer};
use chrono::NaiveDate;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Per-run switches that aren't part of the project file.
#[derive(Clone, Debug)]
pub struct Options {
    pub on_collision: OnCollision,

    /// Stage everything but write nothing.
    pub dry_run: bool,
}

/// What a successful run did.
#[derive(Debug)]
pub enum Outcome {
    /// Every artifact was written (the sitemap may have been skipped).
    Written(WriteResult),

    /// Nothing was written; these are the planned contents.
    DryRun(Staged),
}

/// Builds the backend for a run. With `response`, a saved response is
/// replayed and no credential is needed. Otherwise the credential must be
/// configured.
pub fn backend(config: &Config, response: Option<&Path>) -> Result<Box<dyn Generator>> {
    if let Some(path) = response {
        let text = read_input(path, "response")?;
        return Ok(Box::new(Recorded { text }));
    }
    let api_key = require_api_key(config.api_key.as_deref())?;
    Ok(Box::new(Gemini::new(
        &config.endpoint,
        &config.model,
        api_key,
        &config.categories,
        config.timeout,
    )?))
}

/// Checks the backend credential. Blank values count as absent. `main`
/// calls this before loading any configuration from disk.
pub fn require_api_key(api_key: Option<&str>) -> Result<&str> {
    match api_key {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(Error::Precondition(format!("{} is not set", API_KEY_VARIABLE))),
    }
}

/// Generates one post with `generator` and splices it into the site
/// described by `config`. Inputs are checked and the template is split
/// before the backend is called, so a broken site costs no request.
pub fn publish(
    config: &Config,
    generator: &dyn Generator,
    options: &Options,
    today: NaiveDate,
) -> Result<Outcome> {
    match journal::pending(&config.site_root) {
        Ok(Some(Some(journal))) => warn!(
            slug = %journal.slug,
            started = %journal.started,
            "an earlier run did not finish writing; check {:?}",
            journal.artifacts
        ),
        Ok(Some(None)) => warn!("an earlier run did not finish writing"),
        Ok(None) => {}
        Err(err) => warn!(error = %err, "can't read journal"),
    }

    let instructions = read_input(&config.instructions_file, "instructions")?;
    let template = read_input(&config.template_file, "template")?;

    let layout = extract_layout_with(&template, &config.markers)?;
    info!(template = %config.template_file.display(), "extracted page layout");

    let post = generator.request_post(&instructions)?;
    info!(title = %post.title, slug = %post.slug, "received post");

    let writer = Writer {
        config,
        on_collision: options.on_collision,
    };
    let staged = writer.stage(&layout, &post, today)?;
    if options.dry_run {
        return Ok(Outcome::DryRun(staged));
    }

    let result = writer.commit(&staged);
    match result.is_complete() {
        true => Ok(Outcome::Written(result)),
        false => Err(Error::Incomplete(result)),
    }
}

fn read_input(path: &Path, kind: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        Error::Precondition(format!("reading {} file `{}`: {}", kind, path.display(), e))
    })
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for a run. Each variant names the stage that failed.
#[derive(Debug)]
pub enum Error {
    /// Returned when a required input is missing. Nothing has been requested
    /// or written.
    Precondition(String),

    /// Returned when the backend fails or its response isn't a valid post.
    /// Nothing has been written.
    Generation(generate::Error),

    /// Returned when the template can't be split. Nothing has been requested
    /// or written.
    Layout(layout::Error),

    /// Returned when the artifacts can't be staged. Nothing has been written.
    Write(write::Error),

    /// Returned when some artifacts were written and others failed.
    Incomplete(WriteResult),
}

impl Error {
    /// The process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Precondition(_) => exit_codes::PRECONDITION_FAILURE,
            Error::Generation(err) if err.is_malformed() => exit_codes::MALFORMED_RESPONSE,
            Error::Generation(_) => exit_codes::GENERATION_FAILURE,
            Error::Layout(_) => exit_codes::LAYOUT_FAILURE,
            Error::Write(_) | Error::Incomplete(_) => exit_codes::WRITE_FAILURE,
        }
    }
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Precondition(err) => write!(f, "Checking inputs: {}", err),
            Error::Generation(err) => write!(f, "Generating post: {}", err),
            Error::Layout(err) => write!(f, "Extracting layout: {}", err),
            Error::Write(err) => write!(f, "Staging artifacts: {}", err),
            Error::Incomplete(result) => {
                write!(f, "Writing artifacts: some artifacts failed\n{}", result)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Generation(err) => Some(err),
            Error::Layout(err) => Some(err),
            Error::Write(err) => Some(err),
            Error::Precondition(_) | Error::Incomplete(_) => None,
        }
    }
}

impl From<generate::Error> for Error {
    /// Converts [`generate::Error`]s into [`Error`]. This allows us to use
    /// the `?` operator.
    fn from(err: generate::Error) -> Error {
        Error::Generation(err)
    }
}

impl From<layout::Error> for Error {
    /// Converts [`layout::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: layout::Error) -> Error {
        Error::Layout(err)
    }
}

impl From<write::Error> for Error {
    /// Converts [`write::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: write::Error) -> Error {
        Error::Write(err)
    }
}
