//! Templates and writes the page sources: the index page, one page per post
//! and one page per tag. Every page is a [`gtmpl`] template rendered against
//! a [`Value::Object`]; the built-in templates can be replaced by a theme
//! directory holding files with the same names.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gtmpl::{Context, Template, Value};
use tracing::info;

use crate::post::Corpus;
use crate::tag::{identifier, Tag};
use crate::transform::{self, Anomaly, Transformer};

pub const INDEX_TEMPLATE: &str = "index.js.tmpl";
pub const POST_TEMPLATE: &str = "post.js.tmpl";
pub const TAG_TEMPLATE: &str = "tag.js.tmpl";

/// The number of list entries that prefetch their post page by default.
pub const DEFAULT_PREFETCH: usize = 5;

/// The parsed page templates.
pub struct Templates {
    pub index: Template,
    pub post: Template,
    pub tag: Template,
}

impl Templates {
    /// The templates compiled into the binary.
    pub fn builtin() -> Result<Templates> {
        Ok(Templates {
            index: parse_template(include_str!("../templates/index.js.tmpl"))?,
            post: parse_template(include_str!("../templates/post.js.tmpl"))?,
            tag: parse_template(include_str!("../templates/tag.js.tmpl"))?,
        })
    }

    /// Loads [`INDEX_TEMPLATE`], [`POST_TEMPLATE`] and [`TAG_TEMPLATE`] from
    /// `dir`.
    pub fn from_directory(dir: &Path) -> Result<Templates> {
        Ok(Templates {
            index: load_template(&dir.join(INDEX_TEMPLATE))?,
            post: load_template(&dir.join(POST_TEMPLATE))?,
            tag: load_template(&dir.join(TAG_TEMPLATE))?,
        })
    }
}

fn parse_template(contents: &str) -> Result<Template> {
    let mut template = Template::default();
    template.parse(contents).map_err(Error::Template)?;
    Ok(template)
}

fn load_template(path: &Path) -> Result<Template> {
    let annotate = |e: Error| Error::Annotated(format!("loading template `{}`", path.display()), Box::new(e));
    let contents = fs::read_to_string(path).map_err(|e| annotate(e.into()))?;
    parse_template(&contents).map_err(annotate)
}

/// Responsible for templating and writing page sources to disk.
pub struct Writer<'a> {
    pub templates: &'a Templates,

    /// Transforms post bodies for post pages.
    pub transformer: &'a Transformer,

    /// The output root. Pages are written under `{output_directory}/pages`.
    pub output_directory: &'a Path,

    /// The site title, used as the index page title.
    pub title: &'a str,

    /// The site description, used as the index page summary.
    pub description: &'a str,

    /// The number of list entries that prefetch their post page.
    pub prefetch: usize,
}

impl Writer<'_> {
    /// Writes `pages/index.js`, listing every post.
    pub fn write_index_page(&self, corpus: &Corpus) -> Result<PathBuf> {
        info!("creating index");
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(attribute(self.title)));
        m.insert(
            "summary".to_owned(),
            Value::String(attribute(self.description)),
        );
        m.insert(
            "list".to_owned(),
            Value::String(post_list(corpus, corpus.posts.keys(), self.prefetch)),
        );

        let path = self.output_directory.join("pages").join("index.js");
        self.write_page(&self.templates.index, Value::Object(m), &path)?;
        Ok(path)
    }

    /// Transforms the body of `post_id` and writes it wrapped in the post
    /// template to `pages/posts/{url}/index.js`. Returns the anomalies the
    /// transform met.
    pub fn write_post_page(&self, corpus: &Corpus, post_id: &str) -> Result<Vec<Anomaly>> {
        let post = corpus
            .post(post_id)
            .ok_or_else(|| transform::Error::UnknownPost(post_id.to_owned()))?;
        info!(post = %post_id, "creating component for post");
        let transformed = self.transformer.transform(corpus, post_id)?;

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("id".to_owned(), Value::String(attribute(post.id())));
        m.insert(
            "component".to_owned(),
            Value::String(post_component(post.id())),
        );
        m.insert(
            "data".to_owned(),
            Value::String(serde_json::to_string(&post.attributes)?),
        );
        m.insert(
            "stylesheet".to_owned(),
            match &post.attributes.css {
                Some(css) => Value::String(attribute(&format!(
                    "../static/posts/{}/{}",
                    post.url(),
                    css
                ))),
                None => Value::Nil,
            },
        );
        m.insert("body".to_owned(), Value::String(transformed.markup));

        let path = self
            .output_directory
            .join("pages")
            .join("posts")
            .join(post.url())
            .join("index.js");
        self.write_page(&self.templates.post, Value::Object(m), &path)?;
        Ok(transformed.anomalies)
    }

    /// Writes the page of `tag` to `pages/tags/{slug}.js`.
    pub fn write_tag_page(&self, corpus: &Corpus, tag: &str) -> Result<PathBuf> {
        let ids = corpus.tags.get(tag).map(Vec::as_slice).unwrap_or_default();
        let tag = Tag::new(tag);
        info!(tag = %tag.name, "creating component for tag");

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("tag".to_owned(), Value::from(&tag));
        m.insert("title".to_owned(), Value::String(attribute(&tag.name)));
        m.insert(
            "sentence".to_owned(),
            Value::String(jsx_text(&tagged_sentence(ids.len(), &tag.name))),
        );
        m.insert(
            "list".to_owned(),
            Value::String(post_list(corpus, ids, self.prefetch)),
        );

        let path = self
            .output_directory
            .join("pages")
            .join("tags")
            .join(format!("{}.js", tag.slug));
        self.write_page(&self.templates.tag, Value::Object(m), &path)?;
        Ok(path)
    }

    /// Renders `value` with `template` and writes the result to `path`,
    /// creating parent directories as needed.
    fn write_page(&self, template: &Template, value: Value, path: &Path) -> Result<()> {
        let write = || -> Result<()> {
            let context = Context::from(value).map_err(Error::Template)?;
            let mut out: Vec<u8> = Vec::new();
            template.execute(&mut out, &context).map_err(Error::Template)?;
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(path, out)?;
            Ok(())
        };
        write().map_err(|e| Error::Annotated(format!("writing `{}`", path.display()), Box::new(e)))
    }
}

/// Renders a `<ul>` linking to the posts in `ids`, most recent first. The
/// first `prefetch` entries prefetch their page.
pub fn post_list<'a, I>(corpus: &'a Corpus, ids: I, prefetch: usize) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let items: Vec<String> = corpus
        .posts_by_date(ids)
        .iter()
        .enumerate()
        .map(|(n, post)| {
            format!(
                r#"<li><Link href="/posts/{}"{}><a>{}: {}</a></Link></li>"#,
                post.url(),
                match n < prefetch {
                    true => " prefetch",
                    false => "",
                },
                post.attributes.date,
                jsx_text(&post.attributes.title),
            )
        })
        .collect();
    format!("<ul>\n{}\n</ul>", items.join("\n"))
}

fn tagged_sentence(count: usize, tag: &str) -> String {
    match count {
        1 => format!("There is 1 post tagged with {}:", tag),
        n => format!("There are {} posts tagged with {}:", n, tag),
    }
}

/// The identifier of a post page component: the capitalized id, prefixed
/// with `Post` when that wouldn't start an identifier.
fn post_component(id: &str) -> String {
    let name = identifier(id);
    match name.chars().next() {
        Some(c) if !c.is_numeric() => name,
        _ => format!("Post{}", name),
    }
}

/// Escapes text for a double-quoted attribute value.
fn attribute(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

/// Escapes text for use as element content.
fn jsx_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            c => out.push(c),
        }
    }
    out
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error parsing or executing a template.
    #[error("template: {0}")]
    Template(String),

    /// Returned when a post body can't be transformed.
    #[error(transparent)]
    Transform(#[from] transform::Error),

    /// Returned when post attributes can't be serialized.
    #[error("serializing post data: {0}")]
    Json(#[from] serde_json::Error),

    /// An error writing the output files.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// An error with an annotation.
    #[error("{0}: {1}")]
    Annotated(String, Box<Error>),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::markdown::RenderOptions;
    use crate::post::test::post;
    use crate::transform::TransformOptions;
    use tempfile::TempDir;
    use url::Url;

    fn transformer() -> Transformer {
        let site = Url::parse("https://blog.example.com/").unwrap();
        let mut options = TransformOptions::new(&site, "static").unwrap();
        options.render = RenderOptions {
            highlight: false,
            ..RenderOptions::default()
        };
        Transformer::new(options)
    }

    fn corpus() -> Corpus {
        let mut hooks = post("hooks", "react-hooks", "2019-02-01", &["react", "js"]);
        hooks.attributes.title = "Hooks & <Friends>".to_owned();
        hooks.attributes.css = Some("hooks.css".to_owned());
        hooks.body = "# Hooks\n\nSee [the intro](../intro/).\n".to_owned();
        let mut intro = post("intro", "intro", "2018-05-03", &["js"]);
        intro.body = "Hello <span class='x'>world</span>\n".to_owned();
        Corpus::new(vec![hooks, intro]).unwrap()
    }

    fn with_writer<T>(f: impl FnOnce(&Writer, &Path) -> T) -> T {
        let tmp = TempDir::new().unwrap();
        let templates = Templates::builtin().unwrap();
        let transformer = transformer();
        let writer = Writer {
            templates: &templates,
            transformer: &transformer,
            output_directory: tmp.path(),
            title: "Krawaller",
            description: "awesome \"web\" blog",
            prefetch: DEFAULT_PREFETCH,
        };
        f(&writer, tmp.path())
    }

    #[test]
    fn test_post_list() {
        let posts: Vec<_> = (1..=7)
            .map(|i| post(&format!("p{}", i), &format!("u{}", i), &format!("2020-01-0{}", i), &[]))
            .collect();
        let corpus = Corpus::new(posts).unwrap();
        let list = post_list(&corpus, corpus.posts.keys(), 5);
        let lines: Vec<&str> = list.lines().collect();

        assert_eq!("<ul>", lines[0]);
        assert_eq!(
            r#"<li><Link href="/posts/u7" prefetch><a>2020-01-07: Title of p7</a></Link></li>"#,
            lines[1]
        );
        assert!(lines[5].contains(r#"href="/posts/u3" prefetch>"#));
        assert_eq!(
            r#"<li><Link href="/posts/u2"><a>2020-01-02: Title of p2</a></Link></li>"#,
            lines[6]
        );
        assert_eq!("</ul>", lines[8]);
    }

    #[test]
    fn test_post_list_escapes_titles() {
        let list = post_list(&corpus(), [String::from("hooks")].iter(), 0);
        assert_eq!(
            "<ul>\n<li><Link href=\"/posts/react-hooks\"><a>2019-02-01: Hooks &amp; &lt;Friends&gt;</a></Link></li>\n</ul>",
            list
        );
    }

    #[test]
    fn test_write_index_page() -> Result<()> {
        let corpus = corpus();
        with_writer(|writer, root| {
            let path = writer.write_index_page(&corpus)?;
            assert_eq!(root.join("pages").join("index.js"), path);
            let page = fs::read_to_string(path)?;
            assert!(page.contains(r#"<Master title="Krawaller" summary="awesome &quot;web&quot; blog">"#));
            let hooks = page.find("/posts/react-hooks").unwrap();
            let intro = page.find("/posts/intro").unwrap();
            assert!(hooks < intro);
            assert!(page.contains("export default BlogIndex;"));
            Ok(())
        })
    }

    #[test]
    fn test_write_post_page() -> Result<()> {
        let corpus = corpus();
        with_writer(|writer, root| {
            let anomalies = writer.write_post_page(&corpus, "hooks")?;
            assert!(anomalies.is_empty());
            let page = fs::read_to_string(
                root.join("pages").join("posts").join("react-hooks").join("index.js"),
            )?;
            assert!(page.contains("import Head from 'next/head';"));
            assert!(page.contains(r#"const data = {"id":"hooks","url":"react-hooks","#));
            assert!(page.contains(r#""date":"2019-02-01""#));
            assert!(page.contains("const Hooks = () => ("));
            assert!(page.contains(r#"<link rel="stylesheet" href="../static/posts/react-hooks/hooks.css" />"#));
            assert!(page.contains(r#"<div className="post" data-postid="hooks">"#));
            assert!(page.contains(r#"<h1 id="hooks">Hooks</h1>"#));
            assert!(page.contains(r#"<Link href="/posts/intro" prefetch><a>the intro</a></Link>"#));
            assert!(page.contains("export default Hooks;"));
            Ok(())
        })
    }

    #[test]
    fn test_write_post_page_without_css() -> Result<()> {
        let corpus = corpus();
        with_writer(|writer, root| {
            writer.write_post_page(&corpus, "intro")?;
            let page = fs::read_to_string(
                root.join("pages").join("posts").join("intro").join("index.js"),
            )?;
            assert!(!page.contains("next/head"));
            assert!(!page.contains("<Head>"));
            assert!(page.contains(r#"Hello <span className="x">world</span>"#));
            Ok(())
        })
    }

    #[test]
    fn test_write_unknown_post() {
        let corpus = corpus();
        with_writer(|writer, _| {
            assert!(matches!(
                writer.write_post_page(&corpus, "nope"),
                Err(Error::Transform(transform::Error::UnknownPost(_)))
            ));
        })
    }

    #[test]
    fn test_write_tag_pages() -> Result<()> {
        let corpus = corpus();
        with_writer(|writer, root| {
            writer.write_tag_page(&corpus, "js")?;
            let page = fs::read_to_string(root.join("pages").join("tags").join("js.js"))?;
            assert!(page.contains("const TagJs = () => ("));
            assert!(page.contains(r#"<Master kind="tag" title="js" summary="Posts about js">"#));
            assert!(page.contains("<p>There are 2 posts tagged with js:</p>"));

            writer.write_tag_page(&corpus, "react")?;
            let page = fs::read_to_string(root.join("pages").join("tags").join("react.js"))?;
            assert!(page.contains("<p>There is 1 post tagged with react:</p>"));
            assert!(page.contains(r#"<Link href="/posts/react-hooks" prefetch>"#));
            Ok(())
        })
    }

    #[test]
    fn test_templates_from_directory() -> Result<()> {
        let tmp = TempDir::new()?;
        fs::write(tmp.path().join(INDEX_TEMPLATE), "index {{.title}}")?;
        fs::write(tmp.path().join(POST_TEMPLATE), "post {{.id}}")?;
        fs::write(tmp.path().join(TAG_TEMPLATE), "tag {{.tag.slug}}")?;
        let templates = Templates::from_directory(tmp.path())?;
        let mut out: Vec<u8> = Vec::new();
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String("T".to_owned()));
        templates
            .index
            .execute(&mut out, &Context::from(Value::Object(m)).map_err(Error::Template)?)
            .map_err(Error::Template)?;
        assert_eq!("index T", String::from_utf8_lossy(&out));
        Ok(())
    }

    #[test]
    fn test_missing_template() {
        let tmp = TempDir::new().unwrap();
        let err = Templates::from_directory(tmp.path()).err().unwrap();
        assert!(err.to_string().contains(INDEX_TEMPLATE), "{}", err);
    }

    #[test]
    fn test_post_component() {
        assert_eq!("MyPost", post_component("myPost"));
        assert_eq!("Post2018_hooks", post_component("2018-hooks"));
    }
}
