//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output site: reading the posts ([`crate::parser`]),
//! writing the index, post and tag page sources ([`crate::write`]), copying
//! each post's static assets into the static output directory, and generating
//! the RSS feed.

use crate::config::Config;
use crate::feed::{write_feed, Error as FeedError, FeedConfig};
use crate::parser::{read_corpus, Error as ParseError};
use crate::post::Corpus;
use crate::transform::{TransformOptions, Transformer};
use crate::write::{Error as WriteError, Templates, Writer};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// The name of the feed file under the output root.
pub const FEED_FILE: &str = "rss.xml";

/// Builds the site from a [`Config`] object. This calls into
/// [`read_corpus`], the [`Writer`] page methods and [`write_feed`] which do
/// the heavy-lifting. Anomalies met while transforming post bodies are logged
/// and never fail the build.
pub fn build_site(config: &Config) -> Result<()> {
    // collect all posts
    let corpus = read_corpus(&config.sources_directory, &config.static_dir)?;
    info!(posts = corpus.posts.len(), "read posts");

    let templates = match &config.templates_directory {
        Some(dir) => Templates::from_directory(dir)?,
        None => Templates::builtin()?,
    };

    // Blow away the generated output directories so we don't have any
    // collisions. The output root itself is left alone: it usually holds the
    // rest of the site.
    let pages = config.output_directory.join("pages");
    rmdir(&pages.join("posts"))?;
    rmdir(&pages.join("tags"))?;
    rmdir(&config.output_directory.join("static").join("posts"))?;

    let mut options = TransformOptions::new(&config.site_url, &config.static_dir)?;
    options.render = config.render.clone();
    let transformer = Transformer::new(options);

    let writer = Writer {
        templates: &templates,
        transformer: &transformer,
        output_directory: &config.output_directory,
        title: &config.title,
        description: &config.description,
        prefetch: config.prefetch,
    };
    writer.write_index_page(&corpus)?;
    for id in corpus.posts.keys() {
        for anomaly in writer.write_post_page(&corpus, id)? {
            warn!(post = %id, "{}", anomaly);
        }
    }
    for tag in corpus.tags.keys() {
        writer.write_tag_page(&corpus, tag)?;
    }

    copy_static_assets(&corpus, &config.output_directory, &config.static_dir)?;

    // create the feed
    let feed_path = config.output_directory.join(FEED_FILE);
    write_feed(
        &FeedConfig {
            title: &config.title,
            description: &config.description,
            author: &config.author,
            site_url: &config.site_url,
            size: config.feed_size,
        },
        &corpus,
        BufWriter::new(File::create(&feed_path)?),
    )?;

    Ok(())
}

/// Copies `<folder>/<static_dir>/` of every post with static content to
/// `<output_directory>/static/posts/<url>/`, keeping the directory layout.
pub fn copy_static_assets(corpus: &Corpus, output_directory: &Path, static_dir: &str) -> Result<()> {
    for post in corpus.posts.values() {
        if !post.attributes.has_static_content {
            continue;
        }
        info!(post = %post.id(), "copying static content");
        let src = post.attributes.folder.join(static_dir);
        let dst = output_directory.join("static").join("posts").join(post.url());
        for entry in WalkDir::new(&src) {
            let entry = entry.map_err(|err| Error::Copy {
                path: src.clone(),
                err: err.into(),
            })?;
            let relative = match entry.path().strip_prefix(&src) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            let target = dst.join(relative);
            let copy = || {
                if entry.file_type().is_dir() {
                    std::fs::create_dir_all(&target)
                } else {
                    std::fs::copy(entry.path(), &target).map(|_| ())
                }
            };
            copy().map_err(|err| Error::Copy {
                path: entry.path().to_owned(),
                err,
            })?;
        }
    }
    Ok(())
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during parsing, writing,
/// cleaning output directories, copying static assets, and other I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned for errors reading the posts.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Returned for errors writing page sources to disk.
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Returned for errors writing the feed.
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// Returned for I/O problems while cleaning output directories.
    #[error("Cleaning directory '{}': {err}", .path.display())]
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned for I/O problems while copying static assets.
    #[error("Copying static content '{}': {err}", .path.display())]
    Copy { path: PathBuf, err: std::io::Error },

    /// Returned when the posts URL can't be derived from the site URL.
    #[error("invalid site url: {0}")]
    InvalidSiteUrl(#[from] url::ParseError),

    /// Returned for other I/O errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn rmdir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::post::test::post;
    use tempfile::TempDir;

    #[test]
    fn test_rmdir_missing_directory() -> Result<()> {
        let tmp = TempDir::new()?;
        rmdir(&tmp.path().join("nope"))?;

        let dir = tmp.path().join("pages").join("posts");
        std::fs::create_dir_all(dir.join("a"))?;
        std::fs::write(dir.join("a").join("index.js"), "")?;
        rmdir(&dir)?;
        assert!(!dir.exists());
        assert!(tmp.path().join("pages").is_dir());
        Ok(())
    }

    #[test]
    fn test_copy_static_assets() -> Result<()> {
        let sources = TempDir::new()?;
        let output = TempDir::new()?;

        let mut with_static = post("withStatic", "with-static", "2020-01-01", &[]);
        with_static.attributes.folder = sources.path().join("with-static");
        with_static.attributes.has_static_content = true;
        let assets = with_static.attributes.folder.join("__STATIC__");
        std::fs::create_dir_all(assets.join("img"))?;
        std::fs::write(assets.join("style.css"), "p {}")?;
        std::fs::write(assets.join("img").join("cat.png"), [1u8, 2, 3])?;

        let mut without = post("without", "without", "2020-01-02", &[]);
        without.attributes.folder = sources.path().join("without");

        let corpus = Corpus::new(vec![with_static, without])?;
        copy_static_assets(&corpus, output.path(), "__STATIC__")?;

        let dst = output.path().join("static").join("posts").join("with-static");
        assert_eq!("p {}", std::fs::read_to_string(dst.join("style.css"))?);
        assert_eq!(vec![1u8, 2, 3], std::fs::read(dst.join("img").join("cat.png"))?);
        assert!(!output.path().join("static").join("posts").join("without").exists());
        Ok(())
    }

    #[test]
    fn test_copy_missing_static_directory() -> Result<()> {
        let output = TempDir::new()?;
        let mut broken = post("broken", "broken", "2020-01-01", &[]);
        broken.attributes.folder = output.path().join("gone");
        broken.attributes.has_static_content = true;

        let corpus = Corpus::new(vec![broken])?;
        match copy_static_assets(&corpus, output.path(), "static") {
            Err(Error::Copy { path, .. }) => assert_eq!(output.path().join("gone").join("static"), path),
            other => panic!("expected a copy error, got {:?}", other),
        }
        Ok(())
    }
}
