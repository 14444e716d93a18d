//! The artifact writer: turns a [`PageLayout`] and a [`GeneratedPost`] into
//! a new post page, an updated post index, and an updated sitemap.
//!
//! Writing happens in two phases. [`Writer::stage`] computes the full new
//! contents of all three files without touching the disk (beyond reading the
//! current index and sitemap). [`Writer::commit`] then writes them in order,
//! page first, and reports what happened to each in a [`WriteResult`].
//! Nothing is rolled back; a journal file marks a commit that didn't finish.

use crate::config::Config;
use crate::index::{self, PostIndexEntry};
use crate::journal::{self, Journal};
use crate::layout::PageLayout;
use crate::page;
use crate::post::{GeneratedPost, DESCRIPTION_LIMIT};
use crate::sitemap::{self, SitemapEntry};
use crate::util::{read_optional, write_atomic};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// What to do when a page for the post's slug already exists.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OnCollision {
    /// Replace the existing page.
    Overwrite,

    /// Refuse to write anything.
    Reject,

    /// Append `-2`, `-3`, ... to the slug until it's free.
    Suffix,
}

impl Default for OnCollision {
    fn default() -> Self {
        OnCollision::Overwrite
    }
}

impl std::str::FromStr for OnCollision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "overwrite" => Ok(OnCollision::Overwrite),
            "reject" => Ok(OnCollision::Reject),
            "suffix" => Ok(OnCollision::Suffix),
            other => Err(format!("unknown collision policy `{}`", other)),
        }
    }
}

/// Writes post pages and keeps the index and sitemap in step with them.
pub struct Writer<'a> {
    pub config: &'a Config,
    pub on_collision: OnCollision,
}

/// A file's complete new contents.
#[derive(Clone, Debug, PartialEq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub contents: String,
}

/// The planned sitemap change.
#[derive(Clone, Debug, PartialEq)]
pub enum SitemapPlan {
    Write(StagedFile),

    /// The sitemap can't be updated; the reason is reported but the other
    /// artifacts are still written.
    Skip(String),
}

/// The new contents of all three artifacts.
#[derive(Clone, Debug)]
pub struct Staged {
    /// The post as written, with its final slug.
    pub post: GeneratedPost,
    pub page: StagedFile,
    pub index: StagedFile,
    pub sitemap: SitemapPlan,
}

impl Staged {
    fn paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.page.path.clone(), self.index.path.clone()];
        if let SitemapPlan::Write(file) = &self.sitemap {
            paths.push(file.path.clone());
        }
        paths
    }
}

impl Writer<'_> {
    /// Stages and commits `post`. See [`Writer::stage`] and
    /// [`Writer::commit`].
    pub fn write_post(
        &self,
        layout: &PageLayout,
        post: &GeneratedPost,
        today: NaiveDate,
    ) -> Result<WriteResult> {
        let staged = self.stage(layout, post, today)?;
        Ok(self.commit(&staged))
    }

    /// Computes the new page, index, and sitemap contents. Nothing is
    /// written.
    pub fn stage(
        &self,
        layout: &PageLayout,
        post: &GeneratedPost,
        today: NaiveDate,
    ) -> Result<Staged> {
        let mut post = post.clone();
        post.normalize_slug();
        if post.slug.is_empty() {
            return Err(Error::EmptySlug);
        }
        self.check_fields(&post);
        post.slug = self.resolve_slug(&post.slug)?;

        let page = StagedFile {
            path: self.config.post_path(&post.slug),
            contents: page::assemble(layout, &post, &self.config.site_name),
        };

        let href = self.config.post_href(&post.slug);
        let existing_index = match read_optional(&self.config.index_file) {
            Ok(existing) => existing,
            Err(err) => {
                warn!(
                    path = %self.config.index_file.display(),
                    error = %err,
                    "can't read post index; starting a new index"
                );
                None
            }
        };
        let index = StagedFile {
            path: self.config.index_file.clone(),
            contents: index::prepend(
                existing_index.as_deref(),
                &PostIndexEntry::new(&post, &href),
            )?,
        };

        let entry = SitemapEntry {
            loc: self
                .config
                .post_url(&post.slug)
                .map_err(|e| Error::Url(e.to_string()))?,
            lastmod: today,
            priority: self.config.sitemap_priority,
        };
        let sitemap = self.stage_sitemap(&entry);

        Ok(Staged {
            post,
            page,
            index,
            sitemap,
        })
    }

    fn stage_sitemap(&self, entry: &SitemapEntry) -> SitemapPlan {
        let path = &self.config.sitemap_file;
        match read_optional(path) {
            Ok(Some(text)) => match sitemap::insert(&text, entry) {
                Some(contents) => SitemapPlan::Write(StagedFile {
                    path: path.clone(),
                    contents,
                }),
                None => SitemapPlan::Skip(format!(
                    "`{}` has no closing {} tag",
                    path.display(),
                    sitemap::CLOSING_TAG
                )),
            },
            Ok(None) => SitemapPlan::Skip(format!("`{}` does not exist", path.display())),
            Err(err) => SitemapPlan::Skip(format!("reading `{}`: {}", path.display(), err)),
        }
    }

    fn check_fields(&self, post: &GeneratedPost) {
        let length = post.description.chars().count();
        if length > DESCRIPTION_LIMIT {
            warn!(length, limit = DESCRIPTION_LIMIT, "description is longer than recommended");
        }
        if !self.config.categories.iter().any(|c| *c == post.category) {
            warn!(category = %post.category, "category is not one of the configured categories");
        }
    }

    /// Applies the collision policy to `slug`.
    fn resolve_slug(&self, slug: &str) -> Result<String> {
        let path = self.config.post_path(slug);
        if !path.exists() {
            return Ok(slug.to_owned());
        }
        match self.on_collision {
            OnCollision::Overwrite => {
                warn!(path = %path.display(), "overwriting existing post page");
                Ok(slug.to_owned())
            }
            OnCollision::Reject => Err(Error::SlugTaken(path)),
            OnCollision::Suffix => {
                let mut n = 2;
                loop {
                    let candidate = format!("{}-{}", slug, n);
                    if !self.config.post_path(&candidate).exists() {
                        info!(slug, chosen = %candidate, "slug is taken; using a suffixed slug");
                        return Ok(candidate);
                    }
                    n += 1;
                }
            }
        }
    }

    /// Writes the staged files: page, then index, then sitemap. A page or
    /// index failure skips the remaining steps; a sitemap failure only affects
    /// the sitemap.
    pub fn commit(&self, staged: &Staged) -> WriteResult {
        let site_root = &self.config.site_root;
        let journal = Journal {
            slug: staged.post.slug.clone(),
            started: Local::now(),
            artifacts: staged.paths(),
        };
        if let Err(err) = journal::begin(site_root, &journal) {
            warn!(error = %err, "can't write journal; continuing without one");
        }

        let page = write_step(&staged.page);
        let index = match page {
            Status::Written(_) => write_step(&staged.index),
            _ => Status::skipped_after_failure(),
        };
        let sitemap = match (&index, &staged.sitemap) {
            (Status::Written(_), SitemapPlan::Write(file)) => write_step(file),
            (Status::Written(_), SitemapPlan::Skip(reason)) => {
                warn!(reason = %reason, "skipping sitemap update");
                Status::Skipped(reason.clone())
            }
            _ => Status::skipped_after_failure(),
        };

        let result = WriteResult {
            slug: staged.post.slug.clone(),
            page,
            index,
            sitemap,
        };
        if result.is_complete() {
            if let Err(err) = journal::finish(site_root) {
                warn!(error = %err, "can't remove journal");
            }
        } else {
            warn!(
                journal = %journal::path(site_root).display(),
                "commit incomplete; journal left in place"
            );
        }
        result
    }
}

fn write_step(file: &StagedFile) -> Status {
    match write_atomic(&file.path, &file.contents) {
        Ok(()) => {
            info!(path = %file.path.display(), "wrote artifact");
            Status::Written(file.path.clone())
        }
        Err(err) => {
            warn!(path = %file.path.display(), error = %err, "failed to write artifact");
            Status::Failed(format!("writing `{}`: {}", file.path.display(), err))
        }
    }
}

/// What happened to one artifact.
#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    Written(PathBuf),
    Skipped(String),
    Failed(String),
}

impl Status {
    fn skipped_after_failure() -> Status {
        Status::Skipped("earlier step failed".to_owned())
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Status::Failed(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Status::Written(path) => write!(f, "updated {}", path.display()),
            Status::Skipped(reason) => write!(f, "skipped ({})", reason),
            Status::Failed(reason) => write!(f, "FAILED ({})", reason),
        }
    }
}

/// Reports what happened to each artifact.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteResult {
    /// The slug the post was written under.
    pub slug: String,
    pub page: Status,
    pub index: Status,
    pub sitemap: Status,
}

impl WriteResult {
    /// True when no artifact failed. A skipped sitemap still counts as
    /// complete.
    pub fn is_complete(&self) -> bool {
        !(self.page.is_failed() || self.index.is_failed() || self.sitemap.is_failed())
    }
}

impl fmt::Display for WriteResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "page:    {}", self.page)?;
        writeln!(f, "index:   {}", self.index)?;
        write!(f, "sitemap: {}", self.sitemap)
    }
}

/// The result of a fallible staging operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to stage the artifacts. Nothing has been written
/// when one of these is returned.
#[derive(Debug)]
pub enum Error {
    /// Returned when nothing URL-safe survives of the slug or the title.
    EmptySlug,

    /// Returned when a page already exists for the slug and the policy is
    /// [`OnCollision::Reject`].
    SlugTaken(PathBuf),

    /// Returned when the post URL can't be built from the site URL.
    Url(String),

    /// Returned when the post index can't be serialized.
    Index(index::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::EmptySlug => write!(f, "Post has no usable slug"),
            Error::SlugTaken(path) => {
                write!(f, "A post page already exists at `{}`", path.display())
            }
            Error::Url(err) => write!(f, "Building post URL: {}", err),
            Error::Index(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Index(err) => Some(err),
            _ => None,
        }
    }
}

impl From<index::Error> for Error {
    /// Converts [`index::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: index::Error) -> Error {
        Error::Index(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::Value;
    use std::fs;

    const SITEMAP: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset>\n  <url>\n    <loc>https://stampcircle.com/</loc>\n  </url>\n</urlset>\n";

    fn layout() -> PageLayout {
        PageLayout {
            header: "<html><head><title>Old</title></head><body><section class=\"about\">".to_owned(),
            footer: "</section></body></html>".to_owned(),
        }
    }

    fn post() -> GeneratedPost {
        GeneratedPost {
            title: "5 Tips".to_owned(),
            description: "Grow repeat customers.".to_owned(),
            content_html: "<h2>Tip</h2><p>Use stamp cards.</p>".to_owned(),
            category: "Business Strategy".to_owned(),
            excerpt: "Five tips.".to_owned(),
            slug: "5-tips".to_owned(),
            ..GeneratedPost::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn site() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sitemap.xml"), SITEMAP).unwrap();
        let config = Config::from_directory(dir.path()).unwrap();
        (dir, config)
    }

    fn index_entries(config: &Config) -> Vec<Value> {
        match serde_json::from_str(&fs::read_to_string(&config.index_file).unwrap()).unwrap() {
            Value::Array(entries) => entries,
            other => panic!("wanted an array, got {}", other),
        }
    }

    #[test]
    fn test_writes_all_three_artifacts() -> Result<()> {
        let (dir, config) = site();
        let writer = Writer {
            config: &config,
            on_collision: OnCollision::Overwrite,
        };
        let result = writer.write_post(&layout(), &post(), today())?;

        assert!(result.is_complete());
        assert_eq!(Status::Written(dir.path().join("blog/5-tips.html")), result.page);
        assert_eq!(Status::Written(config.index_file.clone()), result.index);
        assert_eq!(Status::Written(config.sitemap_file.clone()), result.sitemap);

        let page = fs::read_to_string(dir.path().join("blog/5-tips.html")).unwrap();
        assert!(page.contains("<title>5 Tips | StampCircle</title>"));

        let entries = index_entries(&config);
        assert_eq!(1, entries.len());
        assert_eq!("blog/5-tips.html", entries[0]["href"]);

        let sitemap = fs::read_to_string(&config.sitemap_file).unwrap();
        assert!(sitemap.contains(
            "    <loc>https://stampcircle.com/blog/5-tips.html</loc>\n    <lastmod>2026-10-16</lastmod>"
        ));
        assert!(!journal::path(dir.path()).exists());
        Ok(())
    }

    #[test]
    fn test_stage_writes_nothing() -> Result<()> {
        let (dir, config) = site();
        let writer = Writer {
            config: &config,
            on_collision: OnCollision::Overwrite,
        };
        let staged = writer.stage(&layout(), &post(), today())?;
        assert_eq!(dir.path().join("blog/5-tips.html"), staged.page.path);
        assert!(!staged.page.path.exists());
        assert!(!config.index_file.exists());
        assert_eq!(SITEMAP, fs::read_to_string(&config.sitemap_file).unwrap());
        Ok(())
    }

    #[test]
    fn test_reject_collision() {
        let (dir, config) = site();
        fs::create_dir_all(dir.path().join("blog")).unwrap();
        fs::write(dir.path().join("blog/5-tips.html"), "old").unwrap();

        let writer = Writer {
            config: &config,
            on_collision: OnCollision::Reject,
        };
        match writer.write_post(&layout(), &post(), today()) {
            Err(Error::SlugTaken(path)) => assert_eq!(dir.path().join("blog/5-tips.html"), path),
            other => panic!("wanted SlugTaken, got {:?}", other),
        }
        assert_eq!("old", fs::read_to_string(dir.path().join("blog/5-tips.html")).unwrap());
        assert!(!config.index_file.exists());
        assert_eq!(SITEMAP, fs::read_to_string(&config.sitemap_file).unwrap());
    }

    #[test]
    fn test_suffix_collision_is_used_everywhere() -> Result<()> {
        let (dir, config) = site();
        fs::create_dir_all(dir.path().join("blog")).unwrap();
        fs::write(dir.path().join("blog/5-tips.html"), "old").unwrap();
        fs::write(dir.path().join("blog/5-tips-2.html"), "older").unwrap();

        let writer = Writer {
            config: &config,
            on_collision: OnCollision::Suffix,
        };
        let result = writer.write_post(&layout(), &post(), today())?;
        assert_eq!("5-tips-3", result.slug);
        assert_eq!(Status::Written(dir.path().join("blog/5-tips-3.html")), result.page);
        assert_eq!("old", fs::read_to_string(dir.path().join("blog/5-tips.html")).unwrap());
        assert_eq!("blog/5-tips-3.html", index_entries(&config)[0]["href"]);
        assert!(fs::read_to_string(&config.sitemap_file)
            .unwrap()
            .contains("<loc>https://stampcircle.com/blog/5-tips-3.html</loc>"));
        Ok(())
    }

    #[test]
    fn test_overwrite_collision() -> Result<()> {
        let (dir, config) = site();
        fs::create_dir_all(dir.path().join("blog")).unwrap();
        fs::write(dir.path().join("blog/5-tips.html"), "old").unwrap();

        let writer = Writer {
            config: &config,
            on_collision: OnCollision::Overwrite,
        };
        let result = writer.write_post(&layout(), &post(), today())?;
        assert!(result.is_complete());
        assert_ne!("old", fs::read_to_string(dir.path().join("blog/5-tips.html")).unwrap());
        Ok(())
    }

    #[test]
    fn test_sitemap_without_closing_tag_is_skipped() -> Result<()> {
        let (_dir, config) = site();
        fs::write(&config.sitemap_file, "<urlset>").unwrap();
        let writer = Writer {
            config: &config,
            on_collision: OnCollision::Overwrite,
        };
        let result = writer.write_post(&layout(), &post(), today())?;
        assert!(result.is_complete());
        assert!(matches!(result.sitemap, Status::Skipped(_)));
        assert_eq!("<urlset>", fs::read_to_string(&config.sitemap_file).unwrap());
        assert_eq!(1, index_entries(&config).len());
        Ok(())
    }

    #[test]
    fn test_index_failure_skips_sitemap_and_keeps_journal() -> Result<()> {
        let (dir, config) = site();
        // A directory where the index file should be makes the rename fail.
        fs::create_dir_all(&config.index_file).unwrap();

        let writer = Writer {
            config: &config,
            on_collision: OnCollision::Overwrite,
        };
        let result = writer.write_post(&layout(), &post(), today())?;
        assert!(!result.is_complete());
        assert!(matches!(result.page, Status::Written(_)));
        assert!(result.index.is_failed());
        assert_eq!(Status::Skipped("earlier step failed".to_owned()), result.sitemap);
        assert_eq!(SITEMAP, fs::read_to_string(&config.sitemap_file).unwrap());

        let journal = journal::pending(dir.path()).unwrap().unwrap().unwrap();
        assert_eq!("5-tips", journal.slug);
        assert_eq!(3, journal.artifacts.len());
        Ok(())
    }

    #[test]
    fn test_empty_slug_falls_back_to_title() -> Result<()> {
        let (_dir, config) = site();
        let writer = Writer {
            config: &config,
            on_collision: OnCollision::Overwrite,
        };
        let mut post = post();
        post.slug = "???".to_owned();
        let staged = writer.stage(&layout(), &post, today())?;
        assert_eq!("5-tips", staged.post.slug);

        post.title = "!!!".to_owned();
        assert!(matches!(
            writer.stage(&layout(), &post, today()),
            Err(Error::EmptySlug)
        ));
        Ok(())
    }

    #[test]
    fn test_on_collision_from_str() {
        assert_eq!(Ok(OnCollision::Suffix), "suffix".parse());
        assert!("clobber".parse::<OnCollision>().is_err());
    }
}
