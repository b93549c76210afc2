//! Loads the project configuration from `blog.yaml`.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::feed::DEFAULT_FEED_SIZE;
use crate::markdown::RenderOptions;
use crate::write::DEFAULT_PREFETCH;

/// The name of the project file.
pub const PROJECT_FILE: &str = "blog.yaml";

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Project {
    title: String,
    description: String,
    author: String,
    site_url: Url,
    sources: PathBuf,
    output: PathBuf,
    static_dir: String,
    feed_size: usize,
    prefetch: usize,
    templates: Option<PathBuf>,
    markdown: RenderOptions,
}

impl Default for Project {
    fn default() -> Self {
        Project {
            title: String::from("Blog"),
            description: String::new(),
            author: String::new(),
            site_url: Url::parse("https://example.com/")
                .unwrap_or_else(|_| unreachable!("default site url parses")),
            sources: PathBuf::from("sources"),
            output: PathBuf::from("."),
            static_dir: String::from("static"),
            feed_size: DEFAULT_FEED_SIZE,
            prefetch: DEFAULT_PREFETCH,
            templates: None,
            markdown: RenderOptions::default(),
        }
    }
}

/// The resolved configuration of a build. Paths are absolute or relative to
/// the working directory, never to the project file.
#[derive(Clone, Debug)]
pub struct Config {
    pub title: String,
    pub description: String,
    pub author: String,

    /// The public root of the site. Always ends in `/`.
    pub site_url: Url,
    pub sources_directory: PathBuf,
    pub output_directory: PathBuf,

    /// The name of the per-post asset directory.
    pub static_dir: String,
    pub feed_size: usize,
    pub prefetch: usize,

    /// A directory of templates replacing the built-in ones.
    pub templates_directory: Option<PathBuf>,
    pub render: RenderOptions,
}

impl Config {
    /// Finds [`PROJECT_FILE`] in `dir` or the closest ancestor holding one.
    /// Without a project file the defaults apply, rooted at `dir`.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        match dir.ancestors().map(|d| d.join(PROJECT_FILE)).find(|p| p.is_file()) {
            Some(path) => Config::from_project_file(&path)
                .with_context(|| format!("Loading configuration `{}`", path.display())),
            None => Ok(Config::from_project(Project::default(), dir)),
        }
    }

    pub fn from_project_file(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Opening project file `{}`", path.display()))?;
        let project: Project = serde_yaml::from_str(&contents)?;
        if project.site_url.cannot_be_a_base() {
            return Err(anyhow!("`site_url` must be a hierarchical URL, got `{}`", project.site_url));
        }
        match path.parent() {
            None => Err(anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )),
            Some(project_root) => Ok(Config::from_project(project, project_root)),
        }
    }

    fn from_project(project: Project, project_root: &Path) -> Config {
        let mut site_url = project.site_url;
        if !site_url.path().ends_with('/') {
            site_url.set_path(&format!("{}/", site_url.path()));
        }
        Config {
            title: project.title,
            description: project.description,
            author: project.author,
            site_url,
            sources_directory: project_root.join(project.sources),
            output_directory: project_root.join(project.output),
            static_dir: project.static_dir,
            feed_size: project.feed_size,
            prefetch: project.prefetch,
            templates_directory: project.templates.map(|dir| project_root.join(dir)),
            render: project.markdown,
        }
    }
}
