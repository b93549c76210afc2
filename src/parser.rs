//! Reads posts from the source directory into a [`Corpus`]. Each post lives
//! in its own directory as `post.md`, optionally next to a static asset
//! directory:
//!
//! ```text
//! sources/
//! ├── 2018-react-hooks/
//! │   ├── post.md
//! │   └── static/
//! │       └── img/diagram.png
//! └── 2019-rust-intro/
//!     └── post.md
//! ```

use std::collections::HashSet;
use std::fs::read_dir;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::warn;

use crate::post::{headline_id, Attributes, Corpus, Headline, Post};
use crate::rewrite::{in_ranges, raw_text_ranges};
use crate::transform::{extract_code, Node};

/// The name of the post source file inside a post directory.
pub const POST_FILE: &str = "post.md";

/// Reads every post directory under `source_directory` and indexes the
/// result. Directories are visited in name order; hidden entries and plain
/// files are ignored. `static_dir` names the per-post asset directory.
///
/// Each `post.md` is structured as follows:
///
/// 1. Initial frontmatter fence (`---`)
/// 2. YAML frontmatter with fields `id`, `url`, `title`, `date`, `author`,
///    and optionally `excerpt`, `tags`, `css`
/// 3. Terminal frontmatter fence (`---`)
/// 4. Post body
///
/// For example:
///
/// ```md
/// ---
/// id: hello
/// url: hello-world
/// title: Hello, world!
/// excerpt: The first post
/// date: 2021-04-16
/// author: david
/// tags: [greet]
/// ---
/// # Hello
///
/// World
/// ```
pub fn read_corpus(source_directory: &Path, static_dir: &str) -> Result<Corpus> {
    let mut entries = Vec::new();
    for result in read_dir(source_directory)? {
        let entry = result?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_dir() {
            entries.push(entry.path());
        }
    }
    entries.sort();

    let posts = entries
        .iter()
        .map(|folder| read_post(folder, static_dir))
        .collect::<Result<Vec<Post>>>()?;
    Corpus::new(posts)
}

/// Reads the post in `folder`, annotating any error with the folder path.
pub fn read_post(folder: &Path, static_dir: &str) -> Result<Post> {
    match _read_post(folder, static_dir) {
        Ok(post) => Ok(post),
        Err(e) => Err(Error::Annotated(
            format!("reading post `{}`", folder.display()),
            Box::new(e),
        )),
    }
}

fn _read_post(folder: &Path, static_dir: &str) -> Result<Post> {
    let path = folder.join(POST_FILE);
    if !path.is_file() {
        return Err(Error::MissingPostFile(path));
    }
    let contents = std::fs::read_to_string(&path)?;
    let (yaml, body) = split_frontmatter(&contents)?;
    let frontmatter: Frontmatter = serde_yaml::from_str(yaml)?;
    let date = parse_date(&frontmatter.date)
        .ok_or_else(|| Error::InvalidDate(frontmatter.date.clone()))?;

    let mut seen = HashSet::new();
    let mut tags = Vec::with_capacity(frontmatter.tags.len());
    for tag in frontmatter.tags {
        if seen.insert(tag.clone()) {
            tags.push(tag);
        } else {
            warn!(post = %frontmatter.id, tag = %tag, "dropping duplicate tag");
        }
    }

    Ok(Post {
        attributes: Attributes {
            headlines: headlines(body),
            id: frontmatter.id,
            url: frontmatter.url,
            title: frontmatter.title,
            excerpt: frontmatter.excerpt,
            date,
            author: frontmatter.author,
            tags,
            css: frontmatter.css,
            folder: folder.to_owned(),
            has_static_content: folder.join(static_dir).is_dir(),
        },
        body: body.to_owned(),
    })
}

/// Splits a post file into its YAML frontmatter and its body. The body
/// starts on the line after the terminal fence.
fn split_frontmatter(input: &str) -> Result<(&str, &str)> {
    const FENCE: &str = "---";
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let rest = input
        .strip_prefix(FENCE)
        .ok_or(Error::FrontmatterMissingStartFence)?;
    let yaml_stop = rest
        .find("\n---")
        .ok_or(Error::FrontmatterMissingEndFence)?;
    let after_fence = &rest[yaml_stop + 1 + FENCE.len()..];
    let body = match after_fence.find('\n') {
        Some(i) => &after_fence[i + 1..],
        None => "",
    };
    Ok((&rest[..yaml_stop], body))
}

/// Normalizes a frontmatter date. Accepts `YYYY-MM-DD`, RFC 3339, and
/// `YYYY-MM-DD HH:MM:SS`; the time of day is discarded.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|d| d.date())
        })
}

/// Collects the Markdown headings of `body`. Lines inside fenced code are
/// not headings.
fn headlines(body: &str) -> Vec<Headline> {
    static RE_HEADLINE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^(#+) *(.*?)[ \t]*$").unwrap());

    let mut anomalies = Vec::new();
    extract_code(body, &mut anomalies)
        .iter()
        .filter_map(|node| match node {
            Node::Source(text) => Some(text),
            _ => None,
        })
        .flat_map(|text| {
            let raw = raw_text_ranges(text);
            RE_HEADLINE
                .captures_iter(text)
                .filter(|caps| !caps[2].is_empty())
                .filter(|caps| !in_ranges(&raw, caps.get(0).map_or(0, |m| m.start())))
                .map(|caps| Headline {
                    level: caps[1].len(),
                    text: caps[2].to_owned(),
                    id: headline_id(&caps[2]),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

#[derive(Deserialize)]
struct Frontmatter {
    id: String,
    url: String,
    title: String,

    #[serde(default)]
    excerpt: String,

    /// Parsed by [`parse_date`] once the whole frontmatter decoded.
    date: String,
    author: String,

    #[serde(default)]
    tags: Vec<String>,

    #[serde(default)]
    css: Option<String>,
}

/// Represents the result of a [`Post`]-read operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error reading posts from the source directory.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a post directory has no `post.md`.
    #[error("missing post file `{}`", .0.display())]
    MissingPostFile(PathBuf),

    /// Returned when a post source file is missing its starting frontmatter
    /// fence (`---`).
    #[error("post must begin with `---`")]
    FrontmatterMissingStartFence,

    /// Returned when a post source file is missing its terminal frontmatter
    /// fence.
    #[error("missing closing `---`")]
    FrontmatterMissingEndFence,

    /// Returned when the frontmatter isn't valid YAML or lacks a required
    /// field.
    #[error(transparent)]
    DeserializeYaml(#[from] serde_yaml::Error),

    /// Returned when the `date` field can't be normalized.
    #[error("invalid date `{0}`, expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Returned when two posts share an id.
    #[error("duplicate post id `{0}`")]
    DuplicateId(String),

    /// Returned when two posts share a url.
    #[error("url `{url}` is used by both `{first}` and `{second}`")]
    DuplicateUrl {
        url: String,
        first: String,
        second: String,
    },

    /// Returned for other I/O errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An error with an annotation.
    #[error("{0}: {1}")]
    Annotated(String, Box<Error>),
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    const SIMPLE: &str = "---
id: simple
url: simple-post
title: Simple
excerpt: \"A \\\"quoted\\\" excerpt\"
date: 2018-05-03
author: david
tags: [react, js, react]
---
# Intro

```bash
# not a heading
```

##Details
";

    fn write_post(root: &Path, dir: &str, contents: &str) -> PathBuf {
        let folder = root.join(dir);
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join(POST_FILE), contents).unwrap();
        folder
    }

    #[test]
    fn test_read_post() -> Result<()> {
        let tmp = TempDir::new()?;
        let folder = write_post(tmp.path(), "simple", SIMPLE);
        std::fs::create_dir(folder.join("static"))?;

        let post = read_post(&folder, "static")?;
        assert_eq!("simple", post.attributes.id);
        assert_eq!("simple-post", post.attributes.url);
        assert_eq!("A \"quoted\" excerpt", post.attributes.excerpt);
        assert_eq!(NaiveDate::from_ymd_opt(2018, 5, 3).unwrap(), post.attributes.date);
        assert_eq!(vec!["react", "js"], post.attributes.tags);
        assert!(post.attributes.has_static_content);
        assert!(post.body.starts_with("# Intro\n"));
        assert_eq!(
            vec![
                Headline {
                    level: 1,
                    text: "Intro".to_owned(),
                    id: "intro".to_owned(),
                },
                Headline {
                    level: 2,
                    text: "Details".to_owned(),
                    id: "details".to_owned(),
                },
            ],
            post.attributes.headlines
        );
        Ok(())
    }

    #[test]
    fn test_read_corpus_skips_hidden_and_files() -> Result<()> {
        let tmp = TempDir::new()?;
        write_post(tmp.path(), "simple", SIMPLE);
        std::fs::write(tmp.path().join(".DS_Store"), "")?;
        std::fs::write(tmp.path().join("notes.txt"), "")?;

        let corpus = read_corpus(tmp.path(), "static")?;
        assert_eq!(1, corpus.posts.len());
        assert!(!corpus.posts["simple"].attributes.has_static_content);
        Ok(())
    }

    #[test]
    fn test_missing_post_file() -> Result<()> {
        let tmp = TempDir::new()?;
        std::fs::create_dir(tmp.path().join("empty"))?;
        match read_corpus(tmp.path(), "static") {
            Err(Error::Annotated(_, inner)) => {
                assert!(matches!(*inner, Error::MissingPostFile(_)))
            }
            other => panic!("unexpected result: {:?}", other.map(|c| c.posts.len())),
        }
        Ok(())
    }

    #[test]
    fn test_missing_required_field() -> Result<()> {
        let tmp = TempDir::new()?;
        let folder = write_post(tmp.path(), "broken", "---\nid: broken\n---\nbody\n");
        let err = read_post(&folder, "static").unwrap_err();
        assert!(err.to_string().contains("broken"));
        Ok(())
    }

    #[test]
    fn test_split_frontmatter() -> Result<()> {
        let (yaml, body) = split_frontmatter("---\na: b\n---\nbody\n")?;
        assert_eq!("\na: b", yaml);
        assert_eq!("body\n", body);
        assert!(matches!(
            split_frontmatter("a: b\n---\n"),
            Err(Error::FrontmatterMissingStartFence)
        ));
        assert!(matches!(
            split_frontmatter("---\na: b\n"),
            Err(Error::FrontmatterMissingEndFence)
        ));
        Ok(())
    }

    #[test]
    fn test_parse_date() {
        let wanted = NaiveDate::from_ymd_opt(2017, 2, 9);
        assert_eq!(wanted, parse_date("2017-02-09"));
        assert_eq!(wanted, parse_date("2017-02-09T12:30:00+01:00"));
        assert_eq!(wanted, parse_date("2017-02-09 12:30:00"));
        assert_eq!(None, parse_date("February 9th"));
    }

    #[test]
    fn test_headlines_skip_script_and_style() {
        let body = "# Intro\n<style>\n#main { color: red }\n</style>\n\n## Usage\n<script>\n#!/usr/bin/env node\n</script>\n";
        let found: Vec<_> = headlines(body)
            .into_iter()
            .map(|headline| (headline.level, headline.text))
            .collect();
        assert_eq!(vec![(1, "Intro".to_owned()), (2, "Usage".to_owned())], found);
    }
}
