//! Loads the project configuration from a `postsplice.yaml` file. All paths
//! in the file are relative to the directory that contains it, which is also
//! the site root.

use crate::layout::Markers;
use crate::util::open;
use crate::write::OnCollision;
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// The name of the project file searched for by [`Config::from_directory`].
pub const PROJECT_FILE: &str = "postsplice.yaml";

/// The environment variable holding the backend credential.
pub const API_KEY_VARIABLE: &str = "GEMINI_API_KEY";

const DEFAULT_SITE_URL: &str = "https://stampcircle.com/";

const DEFAULT_CATEGORIES: [&str; 6] = [
    "Customer Loyalty",
    "Business Strategy",
    "Coffee Shops",
    "Seasonal Sales",
    "Loyalty Programs",
    "Customer Retention",
];

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Project {
    site_name: String,
    site_url: Option<Url>,
    blog_directory: String,
    index_file: PathBuf,
    sitemap_file: PathBuf,
    template_file: PathBuf,
    instructions_file: PathBuf,
    categories: Vec<String>,
    sitemap_priority: f32,
    model: String,
    endpoint: String,
    timeout_seconds: u64,
    on_collision: OnCollision,
    layout: Markers,
}

impl Default for Project {
    fn default() -> Self {
        Project {
            site_name: "StampCircle".to_owned(),
            site_url: None,
            blog_directory: "blog".to_owned(),
            index_file: PathBuf::from("blogs.json"),
            sitemap_file: PathBuf::from("sitemap.xml"),
            template_file: PathBuf::from("blog/template.html"),
            instructions_file: PathBuf::from("prompt.txt"),
            categories: DEFAULT_CATEGORIES.iter().map(|c| (*c).to_owned()).collect(),
            sitemap_priority: crate::sitemap::DEFAULT_PRIORITY,
            model: "gemini-2.5-flash".to_owned(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_owned(),
            timeout_seconds: 120,
            on_collision: OnCollision::default(),
            layout: Markers::default(),
        }
    }
}

/// Everything a run needs, with paths resolved against the site root.
#[derive(Clone, Debug)]
pub struct Config {
    /// The directory containing the project file (or the starting directory
    /// if there isn't one).
    pub site_root: PathBuf,

    /// Appended to page titles, e.g. `5 Tips | StampCircle`.
    pub site_name: String,

    /// The public base URL of the site. Always ends in a slash.
    pub site_url: Url,

    /// The blog directory relative to the site root, as used in index hrefs
    /// and sitemap URLs (e.g. `blog`).
    pub blog_directory: String,

    /// Where new post pages are written.
    pub blog_output_directory: PathBuf,

    pub index_file: PathBuf,
    pub sitemap_file: PathBuf,
    pub template_file: PathBuf,
    pub instructions_file: PathBuf,

    /// The categories the backend is asked to choose from.
    pub categories: Vec<String>,

    pub sitemap_priority: f32,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub on_collision: OnCollision,
    pub markers: Markers,

    /// The backend credential. Only required when a backend is called.
    pub api_key: Option<String>,
}

impl Config {
    /// Searches `dir` and then each of its ancestors for a project file. If
    /// none is found, the default configuration is rooted at `dir`.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let mut current = Some(dir);
        while let Some(candidate) = current {
            let path = candidate.join(PROJECT_FILE);
            if path.exists() {
                return Config::from_project_file(&path)
                    .map_err(|e| anyhow!("Loading configuration: {}", e));
            }
            current = candidate.parent();
        }
        debug!(dir = %dir.display(), "no project file found; using defaults");
        Config::from_project(dir, Project::default())
    }

    /// Loads the project file at `path`.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        match path.parent() {
            None => Err(anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )),
            Some(site_root) => Config::from_project(site_root, project),
        }
    }

    fn from_project(site_root: &Path, project: Project) -> Result<Config> {
        let site_url = match project.site_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_SITE_URL)?,
        };
        let blog_directory = project.blog_directory.trim_matches('/').to_owned();
        Ok(Config {
            site_root: site_root.to_owned(),
            site_name: project.site_name,
            site_url: with_trailing_slash(site_url),
            blog_output_directory: site_root.join(&blog_directory),
            blog_directory,
            index_file: site_root.join(project.index_file),
            sitemap_file: site_root.join(project.sitemap_file),
            template_file: site_root.join(project.template_file),
            instructions_file: site_root.join(project.instructions_file),
            categories: project.categories,
            sitemap_priority: project.sitemap_priority,
            model: project.model,
            endpoint: project.endpoint,
            timeout: Duration::from_secs(project.timeout_seconds),
            on_collision: project.on_collision,
            markers: project.layout,
            api_key: None,
        })
    }

    /// Sets the backend credential. Empty values count as absent.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Config {
        self.api_key = api_key.filter(|key| !key.trim().is_empty());
        self
    }

    /// The site-relative path of the page for `slug`, e.g. `blog/5-tips.html`.
    pub fn post_href(&self, slug: &str) -> String {
        match self.blog_directory.is_empty() {
            true => format!("{}.html", slug),
            false => format!("{}/{}.html", self.blog_directory, slug),
        }
    }

    /// The absolute URL of the page for `slug`.
    pub fn post_url(&self, slug: &str) -> Result<Url> {
        Ok(self.site_url.join(&self.post_href(slug))?)
    }

    /// The file the page for `slug` is written to.
    pub fn post_path(&self, slug: &str) -> PathBuf {
        self.blog_output_directory.join(format!("{}.html", slug))
    }
}

// NOTE: `Url::join` treats the last path segment as a file name unless the
// base ends in a slash, so `https://example.org/site` would lose `site`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
