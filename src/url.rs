use url::{ParseError, Url};

/// A link from one post page to another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostLink {
    /// The target post's url.
    pub url: String,
    pub fragment: Option<String>,
}

impl PostLink {
    /// The site route of the target post page, e.g. `/posts/other-post`.
    pub fn route(&self, posts_route: &str) -> String {
        match &self.fragment {
            Some(fragment) => format!("{}/{}#{}", posts_route, self.url, fragment),
            None => format!("{}/{}", posts_route, self.url),
        }
    }
}

/// Recognizes relative links from a post page to a sibling post page
/// (`../other-post/`).
pub struct LinkConverter<'a> {
    posts_root: &'a Url,
    base: Url,
}

impl<'a> LinkConverter<'a> {
    /// Constructs a new `LinkConverter`
    ///
    /// # Arguments
    ///
    /// * `posts_root` - the URL of the post pages directory.
    /// * `post_url` - the url of the post whose links will be converted.
    pub fn new(posts_root: &'a Url, post_url: &str) -> Result<LinkConverter<'a>> {
        Ok(LinkConverter {
            posts_root,
            base: posts_root.join(&format!("{}/", post_url))?,
        })
    }

    /// Returns the target of `href` if it climbs out of the current post
    /// page into exactly one sibling post page. Absolute URLs, asset paths
    /// and anything resolving outside the posts directory yield `None`.
    pub fn convert(&self, href: &str) -> Option<PostLink> {
        if !href.starts_with("../") {
            return None;
        }
        match Url::parse(href) {
            Err(ParseError::RelativeUrlWithoutBase) => {}
            _ => return None,
        }

        let absolute = self.base.join(href).ok()?;
        let fragment = absolute.fragment().map(str::to_owned);
        let mut target = absolute;
        target.set_fragment(None);
        target.set_query(None);

        let relative = self.posts_root.make_relative(&target)?;
        let url = relative.trim_end_matches('/');
        if url.is_empty()
            || relative.starts_with("../")
            || url.contains(['/', '.'])
        {
            return None;
        }
        Some(PostLink {
            url: url.to_owned(),
            fragment: fragment.filter(|f| !f.is_empty()),
        })
    }
}

type Result<T> = std::result::Result<T, ParseError>;
