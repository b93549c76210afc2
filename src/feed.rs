//! Support for creating an RSS 2.0 feed from the most recent posts.

use std::io::Write;

use chrono::{DateTime, NaiveDate, Utc};
use rss::extension::dublincore::DublinCoreExtensionBuilder;
use rss::validation::{Validate, ValidationError};
use rss::{CategoryBuilder, Channel, ChannelBuilder, GuidBuilder, Item, ItemBuilder};
use tracing::info;
use url::Url;

use crate::post::{Corpus, Post};

/// The generator named in the feed.
pub const GENERATOR: &str = concat!("posthaste ", env!("CARGO_PKG_VERSION"));

/// The number of posts in the feed by default.
pub const DEFAULT_FEED_SIZE: usize = 20;

/// Bundled configuration for creating a feed.
pub struct FeedConfig<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub author: &'a str,

    /// The site root. Post permalinks are `{site_url}posts/{url}`.
    pub site_url: &'a Url,

    /// The number of posts in the feed.
    pub size: usize,
}

/// Creates a feed of the most recent posts in `corpus` and writes it to `w`.
/// The feed is validated before anything is written.
pub fn write_feed<W: Write>(config: &FeedConfig, corpus: &Corpus, w: W) -> Result<()> {
    info!("creating rss");
    let channel = channel(config, corpus, Utc::now())?;
    channel.validate()?;
    channel.write_to(w)?;
    Ok(())
}

fn channel(config: &FeedConfig, corpus: &Corpus, now: DateTime<Utc>) -> Result<Channel> {
    let items = corpus
        .all_by_date()
        .into_iter()
        .take(config.size)
        .map(|post| item(config.site_url, post))
        .collect::<Result<Vec<Item>>>()?;

    let mut channel = ChannelBuilder::default()
        .title(config.title)
        .link(config.site_url.to_string())
        .description(config.description)
        .generator(GENERATOR.to_owned())
        .last_build_date(now.to_rfc2822())
        .items(items)
        .build();
    if !config.author.is_empty() {
        channel.set_dublin_core_ext(
            DublinCoreExtensionBuilder::default()
                .creators(vec![config.author.to_owned()])
                .build(),
        );
    }
    Ok(channel)
}

fn item(site_url: &Url, post: &Post) -> Result<Item> {
    let link = site_url
        .join(&format!("posts/{}", post.url()))
        .map_err(|err| Error::InvalidLink {
            url: post.url().to_owned(),
            err,
        })?
        .to_string();

    Ok(ItemBuilder::default()
        .title(Some(post.attributes.title.clone()))
        .description(Some(post.attributes.excerpt.clone()))
        .link(Some(link.clone()))
        .guid(Some(GuidBuilder::default().permalink(true).value(link).build()))
        .categories(
            post.attributes
                .tags
                .iter()
                .map(|tag| CategoryBuilder::default().name(tag.as_str()).build())
                .collect::<Vec<_>>(),
        )
        .dublin_core_ext(Some(
            DublinCoreExtensionBuilder::default()
                .creators(vec![capitalize(&post.attributes.author)])
                .build(),
        ))
        .pub_date(Some(pub_date(post.attributes.date)))
        .build())
}

/// Formats `date` at midnight UTC as RFC 2822.
fn pub_date(date: NaiveDate) -> String {
    date.and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
        .to_rfc2822()
}

/// Upper-cases the first character of `s`.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when there is a generic I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Returned when the feed can't be serialized.
    #[error("writing rss: {0}")]
    Rss(#[from] rss::Error),

    /// Returned when the feed isn't valid RSS.
    #[error("rss validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Returned when a post url can't be joined onto the site url.
    #[error("invalid permalink for `{url}`: {err}")]
    InvalidLink { url: String, err: url::ParseError },
}
