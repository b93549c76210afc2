//! The post body transformer. Turns the Markdown/HTML dialect of a post body
//! into markup that can be embedded in a component page source.
//!
//! The body is split once into [`Node`]s. Fenced code becomes a
//! [`Node::Code`] that the source passes skip. The source is then rendered
//! as one Markdown document in which every fence is stood in for by an
//! opaque placeholder line, so reference links and lists spanning a fence
//! render as they would around the fence itself. Code samples never see the
//! attribute or link rewrites. The passes run in a fixed order:
//!
//! 1. extract fenced code ([`extract_code`])
//! 2. put a space after heading markers
//! 3. point `./static/` references at the post's published asset directory
//! 4. normalize `class`/`style` attribute names and quotes
//! 5. render Markdown
//! 6. serialize inline `style` attributes as style objects
//! 7. self-close void elements
//! 8. turn relative links to sibling posts into post links
//! 9. render the code nodes in place of their placeholders
//! 10. catch `class` attributes the renderer and highlighter introduced
//! 11. escape braces inside `<code>`
//! 12. inline `<script>` bodies
//! 13. inline `<style>` bodies
//! 14. append `index.html` to iframe directory URLs
//!
//! Malformed input never fails a transform. Shapes the passes can't make
//! sense of are reported as [`Anomaly`] values next to the best-effort
//! output.

use std::io;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::markdown::{Markdown, RenderOptions};
use crate::post::Corpus;
use crate::rewrite::{self, AssetRewriter};
use crate::url::LinkConverter;

/// A span of a post body before rendering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// Markdown source.
    Source(String),

    /// A fenced code block, verbatim and including its fences.
    Code(Fence),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fence {
    /// The 1-based line of the opening fence within the body.
    pub line: usize,

    pub raw: String,
}

/// Something in a post body that a pass expected to recognize but couldn't.
/// The output is still produced; anomalies only describe where it may be
/// off.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Anomaly {
    #[error("code fence opened on line {line} is never closed")]
    UnterminatedFence { line: usize },

    #[error("body references `./{dir}/` but the post has no `{dir}` directory")]
    MissingStaticContent { dir: String },

    #[error("unquoted `{name}` attribute `{value}` left as is")]
    UnquotedAttribute { name: String, value: String },

    #[error("dropping malformed style declaration `{0}`")]
    MalformedDeclaration(String),

    #[error("unknown code language `{0}`, detecting instead")]
    UnknownLanguage(String),

    #[error("highlighting failed: {0}")]
    Highlight(String),

    #[error("link to unknown post `{0}`")]
    UnknownPostLink(String),

    #[error("`<{0}>` element is never closed")]
    UnclosedElement(String),
}

/// The result of transforming one post body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transformed {
    pub markup: String,
    pub anomalies: Vec<Anomaly>,
}

/// Settings shared by every transform of a build.
#[derive(Clone, Debug)]
pub struct TransformOptions {
    /// The name of the per-post asset directory (`static`).
    pub static_dir: String,

    /// The site route prefix of post pages (`/posts`).
    pub posts_route: String,

    /// The public URL of the post pages directory. Relative links are
    /// resolved against it.
    pub posts_url: Url,

    pub render: RenderOptions,
}

impl TransformOptions {
    /// Options for a site published at `site_url`.
    pub fn new(
        site_url: &Url,
        static_dir: &str,
    ) -> std::result::Result<TransformOptions, url::ParseError> {
        Ok(TransformOptions {
            static_dir: static_dir.to_owned(),
            posts_route: String::from("/posts"),
            posts_url: site_url.join("posts/")?,
            render: RenderOptions::default(),
        })
    }
}

/// Transforms post bodies. Holds the loaded syntax definitions, so build one
/// per build and reuse it for every post.
pub struct Transformer {
    options: TransformOptions,
    markdown: Markdown,
    assets: AssetRewriter,
}

impl Transformer {
    pub fn new(options: TransformOptions) -> Transformer {
        Transformer {
            markdown: Markdown::new(options.render.clone()),
            assets: AssetRewriter::new(&options.static_dir),
            options,
        }
    }

    /// Transforms the body of `post_id`. Fails only when the post isn't in
    /// `corpus`.
    pub fn transform(&self, corpus: &Corpus, post_id: &str) -> Result<Transformed> {
        let post = corpus
            .post(post_id)
            .ok_or_else(|| Error::UnknownPost(post_id.to_owned()))?;
        let mut anomalies = Vec::new();

        let mut nodes = extract_code(&post.body, &mut anomalies);

        for_each_source(&mut nodes, rewrite::space_headings);

        if !post.attributes.has_static_content
            && nodes
                .iter()
                .any(|n| matches!(n, Node::Source(s) if self.assets.is_match(s)))
        {
            anomalies.push(Anomaly::MissingStaticContent {
                dir: self.options.static_dir.clone(),
            });
        }
        for_each_source(&mut nodes, |s| self.assets.rewrite(s, post.url()));

        for_each_source(&mut nodes, |s| rewrite::quote_attributes(s, &mut anomalies));

        let (source, fences) = placeholders(nodes);
        let markup = self.markdown.render(&source, &mut anomalies)?;

        let markup = rewrite::style_objects(&markup, &mut anomalies);
        let markup = rewrite::close_void_elements(&markup);

        let links = LinkConverter::new(&self.options.posts_url, post.url())?;
        let markup = rewrite::post_links(
            &markup,
            &links,
            corpus,
            &self.options.posts_route,
            &mut anomalies,
        );

        let document = self.restore_code(&markup, &fences, &mut anomalies)?;

        let document = rewrite::class_names(&document);
        let document = rewrite::escape_code_braces(&document);
        let document = rewrite::inline_scripts(&document, &mut anomalies);
        let document = rewrite::inline_styles(&document, &mut anomalies);
        let document = rewrite::iframe_index(&document);

        Ok(Transformed {
            markup: document,
            anomalies,
        })
    }
}

fn for_each_source(nodes: &mut [Node], mut f: impl FnMut(&str) -> String) {
    for node in nodes {
        if let Node::Source(text) = node {
            *text = f(text);
        }
    }
}

/// Joins `nodes` into one Markdown source in which each fence is replaced
/// by a [`placeholder`] line indented like the fence, so it stays inside an
/// enclosing list item. Returns the source and the fences in placeholder
/// order.
fn placeholders(nodes: Vec<Node>) -> (String, Vec<Fence>) {
    let mut source = String::new();
    let mut fences = Vec::new();
    for node in nodes {
        match node {
            Node::Source(text) => source.push_str(&text),
            Node::Code(fence) => {
                if !source.is_empty() && !source.ends_with('\n') {
                    source.push('\n');
                }
                let indent = fence.raw.len() - fence.raw.trim_start_matches(' ').len();
                source.push_str(&fence.raw[..indent]);
                source.push_str(&placeholder(fences.len()));
                source.push('\n');
                fences.push(fence);
            }
        }
    }
    (source, fences)
}

/// An HTML comment, which Markdown passes through as a block of its own and
/// which none of the markup passes touch.
fn placeholder(index: usize) -> String {
    format!("<!--posthaste:code:{}-->", index)
}

impl Transformer {
    /// Replaces each placeholder line in `markup` with its rendered fence.
    fn restore_code(
        &self,
        markup: &str,
        fences: &[Fence],
        anomalies: &mut Vec<Anomaly>,
    ) -> Result<String> {
        static RE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"[ \t]*<!--posthaste:code:(\d+)-->\n?").unwrap()
        });

        let mut document = String::with_capacity(markup.len());
        let mut last = 0;
        for caps in RE_PLACEHOLDER.captures_iter(markup) {
            let fence = match caps[1].parse::<usize>().ok().and_then(|i| fences.get(i)) {
                Some(fence) => fence,
                None => continue,
            };
            let m = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            document.push_str(&markup[last..m.start()]);
            document.push_str(&self.markdown.render(&fence.raw, anomalies)?);
            last = m.end();
        }
        document.push_str(&markup[last..]);
        Ok(document)
    }
}

/// Splits `body` into [`Node::Source`] and [`Node::Code`] nodes. A fence
/// opens on a line indented by at most three spaces that starts with at
/// least three backticks, and closes on a line with at least as many
/// backticks and nothing else. An unclosed fence runs to the end of the
/// body.
pub fn extract_code(body: &str, anomalies: &mut Vec<Anomaly>) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut source = String::new();
    let mut open: Option<(usize, Fence)> = None;

    for (i, line) in body.split_inclusive('\n').enumerate() {
        let closes = match open.as_mut() {
            Some((ticks, fence)) => {
                fence.raw.push_str(line);
                closes_fence(line, *ticks)
            }
            None => {
                match opens_fence(line) {
                    Some(ticks) => {
                        if !source.is_empty() {
                            nodes.push(Node::Source(std::mem::take(&mut source)));
                        }
                        open = Some((
                            ticks,
                            Fence {
                                line: i + 1,
                                raw: line.to_owned(),
                            },
                        ));
                    }
                    None => source.push_str(line),
                }
                false
            }
        };
        if closes {
            if let Some((_, fence)) = open.take() {
                nodes.push(Node::Code(fence));
            }
        }
    }

    if let Some((_, fence)) = open {
        anomalies.push(Anomaly::UnterminatedFence { line: fence.line });
        nodes.push(Node::Code(fence));
    }
    if !source.is_empty() {
        nodes.push(Node::Source(source));
    }
    nodes
}

/// Returns the number of backticks when `line` opens a fence.
fn opens_fence(line: &str) -> Option<usize> {
    let rest = strip_indent(line)?;
    let ticks = rest.len() - rest.trim_start_matches('`').len();
    if ticks < 3 || rest[ticks..].contains('`') {
        return None;
    }
    Some(ticks)
}

fn closes_fence(line: &str, ticks: usize) -> bool {
    match strip_indent(line) {
        Some(rest) => {
            let closing = rest.len() - rest.trim_start_matches('`').len();
            closing >= ticks && rest[closing..].trim().is_empty()
        }
        None => false,
    }
}

/// Strips up to three leading spaces. Lines indented further are indented
/// code, not fences.
fn strip_indent(line: &str) -> Option<&str> {
    let rest = line.trim_start_matches(' ');
    match line.len() - rest.len() {
        0..=3 => Some(rest),
        _ => None,
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the requested post isn't part of the corpus.
    #[error("no post with id `{0}`")]
    UnknownPost(String),

    /// Returned when the post url can't be used to resolve relative links.
    #[error("resolving links of post: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Returned when the renderer fails to write.
    #[error("rendering markdown: {0}")]
    Render(#[from] io::Error),
}
