//! Defines the [`Post`] and [`Corpus`] types. A [`Corpus`] is built once per
//! build by [`crate::parser::read_corpus`] and is read-only afterwards: every
//! emitter and every [`crate::transform::Transformer`] call borrows it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;

use crate::parser::Error;

/// The anchor id of a heading with the given text.
pub fn headline_id(text: &str) -> String {
    slug::slugify(text)
}

/// A heading found in a post body. Headlines are derived from the source
/// text, never authored in the front matter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Headline {
    /// The number of `#` characters.
    pub level: usize,

    /// The heading text as written in the source.
    pub text: String,

    /// The anchor id. The renderer gives the rendered heading the same id.
    pub id: String,
}

/// The front matter of a post plus the attributes derived while reading it.
/// Serializes to the `data` object embedded in post page sources.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Attributes {
    pub id: String,
    pub url: String,
    pub title: String,
    pub excerpt: String,

    /// Serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub author: String,
    pub tags: Vec<String>,

    /// A stylesheet, relative to the post's static directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    pub headlines: Vec<Headline>,

    /// The post's source directory.
    #[serde(skip)]
    pub folder: PathBuf,

    #[serde(rename = "hasStaticContent")]
    pub has_static_content: bool,
}

/// A single blog post: its attributes and its raw body.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    pub attributes: Attributes,

    /// The body in the Markdown/HTML dialect, front matter stripped.
    pub body: String,
}

impl Post {
    pub fn id(&self) -> &str {
        &self.attributes.id
    }

    pub fn url(&self) -> &str {
        &self.attributes.url
    }
}

/// Every post of a build plus the derived indices.
#[derive(Clone, Debug, Default)]
pub struct Corpus {
    /// Posts keyed by id.
    pub posts: BTreeMap<String, Post>,

    /// Post ids keyed by url.
    pub posts_by_url: BTreeMap<String, String>,

    /// Post ids keyed by tag, in the order the posts were read.
    pub tags: BTreeMap<String, Vec<String>>,

    /// Post ids keyed by author id.
    pub authors: BTreeMap<String, BTreeSet<String>>,
}

impl Corpus {
    /// Indexes `posts`. Fails with [`Error::DuplicateId`] or
    /// [`Error::DuplicateUrl`] when two posts share an id or a url.
    pub fn new(posts: impl IntoIterator<Item = Post>) -> Result<Corpus, Error> {
        let mut corpus = Corpus::default();
        for post in posts {
            let id = post.attributes.id.clone();
            if corpus.posts.contains_key(&id) {
                return Err(Error::DuplicateId(id));
            }
            if let Some(other) = corpus.posts_by_url.get(&post.attributes.url) {
                return Err(Error::DuplicateUrl {
                    url: post.attributes.url.clone(),
                    first: other.clone(),
                    second: id,
                });
            }

            corpus
                .posts_by_url
                .insert(post.attributes.url.clone(), id.clone());
            for tag in &post.attributes.tags {
                let ids = corpus.tags.entry(tag.clone()).or_default();
                if !ids.contains(&id) {
                    ids.push(id.clone());
                }
            }
            corpus
                .authors
                .entry(post.attributes.author.clone())
                .or_default()
                .insert(id.clone());
            corpus.posts.insert(id, post);
        }
        Ok(corpus)
    }

    pub fn post(&self, id: &str) -> Option<&Post> {
        self.posts.get(id)
    }

    pub fn post_by_url(&self, url: &str) -> Option<&Post> {
        self.posts_by_url.get(url).and_then(|id| self.post(id))
    }

    /// Resolves `ids` to posts, most recent first. Posts sharing a date are
    /// ordered by id so output is stable. Unknown ids are skipped.
    pub fn posts_by_date<'a, I>(&'a self, ids: I) -> Vec<&'a Post>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut posts: Vec<&Post> =
            ids.into_iter().filter_map(|id| self.post(id)).collect();
        posts.sort_by(|a, b| {
            b.attributes
                .date
                .cmp(&a.attributes.date)
                .then_with(|| a.attributes.id.cmp(&b.attributes.id))
        });
        posts
    }

    /// Every post, most recent first.
    pub fn all_by_date(&self) -> Vec<&Post> {
        self.posts_by_date(self.posts.keys())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Builds a post with just enough attributes for tests.
    pub(crate) fn post(id: &str, url: &str, date: &str, tags: &[&str]) -> Post {
        Post {
            attributes: Attributes {
                id: id.to_owned(),
                url: url.to_owned(),
                title: format!("Title of {}", id),
                excerpt: format!("Excerpt of {}", id),
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                author: "david".to_owned(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                css: None,
                headlines: Vec::new(),
                folder: PathBuf::from(format!("sources/{}", id)),
                has_static_content: false,
            },
            body: String::new(),
        }
    }

    #[test]
    fn test_indices() -> Result<(), Error> {
        let corpus = Corpus::new(vec![
            post("first", "first-post", "2018-01-02", &["react", "js"]),
            post("second", "second-post", "2019-03-04", &["js"]),
        ])?;

        assert_eq!(Some("first"), corpus.posts_by_url.get("first-post").map(|s| s.as_str()));
        assert_eq!(vec!["first", "second"], corpus.tags["js"]);
        assert_eq!(vec!["first"], corpus.tags["react"]);
        assert_eq!(2, corpus.authors["david"].len());
        assert_eq!("second", corpus.post_by_url("second-post").unwrap().id());
        Ok(())
    }

    #[test]
    fn test_duplicate_id() {
        let result = Corpus::new(vec![
            post("same", "a", "2018-01-02", &[]),
            post("same", "b", "2018-01-02", &[]),
        ]);
        assert!(matches!(result, Err(Error::DuplicateId(id)) if id == "same"));
    }

    #[test]
    fn test_duplicate_url() {
        let result = Corpus::new(vec![
            post("a", "same", "2018-01-02", &[]),
            post("b", "same", "2018-01-02", &[]),
        ]);
        assert!(matches!(result, Err(Error::DuplicateUrl { .. })));
    }

    #[test]
    fn test_posts_by_date() -> Result<(), Error> {
        let corpus = Corpus::new(vec![
            post("old", "old", "2015-06-01", &[]),
            post("b", "b", "2020-01-01", &[]),
            post("a", "a", "2020-01-01", &[]),
        ])?;
        let ids: Vec<&str> = corpus.all_by_date().iter().map(|p| p.id()).collect();
        assert_eq!(vec!["a", "b", "old"], ids);
        Ok(())
    }

    #[test]
    fn test_headline_id() {
        assert_eq!("don-t-panic", headline_id("Don't panic"));
        assert_eq!("hooks-and-state", headline_id("Hooks & State"));
    }
}
