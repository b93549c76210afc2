//! The textual rewrite passes of [`crate::transform`]. Every pass maps a
//! string to a string; passes that can meet malformed input also push
//! [`Anomaly`] values instead of failing.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::post::Corpus;
use crate::style;
use crate::transform::Anomaly;
use crate::url::LinkConverter;

/// Puts a space between heading markers and the heading text
/// (`##Details` becomes `## Details`). Lines inside `<script>` and `<style>`
/// elements are left alone.
pub fn space_headings(text: &str) -> String {
    static RE_HEADING: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^(#{1,6})([^#\s])").unwrap());
    let raw = raw_text_ranges(text);
    RE_HEADING
        .replace_all(text, |caps: &Captures| {
            match in_ranges(&raw, caps.get(0).map_or(0, |m| m.start())) {
                true => caps[0].to_owned(),
                false => format!("{} {}", &caps[1], &caps[2]),
            }
        })
        .into_owned()
}

/// The byte ranges of the `<script>` and `<style>` elements of `text`, whose
/// contents aren't Markdown. An element that is never closed runs to the end
/// of `text`.
pub fn raw_text_ranges(text: &str) -> Vec<Range<usize>> {
    static RE_RAW_TEXT: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<script\b.*?(?:</script\s*>|\z)|<style\b.*?(?:</style\s*>|\z)")
            .unwrap()
    });
    RE_RAW_TEXT.find_iter(text).map(|m| m.range()).collect()
}

pub fn in_ranges(ranges: &[Range<usize>], offset: usize) -> bool {
    ranges.iter().any(|range| range.contains(&offset))
}

/// Rewrites `./<static_dir>/` references in post source to the directory
/// the post's assets are published to.
pub struct AssetRewriter {
    pattern: Regex,
}

impl AssetRewriter {
    pub fn new(static_dir: &str) -> AssetRewriter {
        AssetRewriter {
            // `../static/` and `a/./static/` are not references.
            pattern: Regex::new(&format!(
                r"(^|[^.\w/])\./{}/",
                regex::escape(static_dir)
            ))
            .unwrap_or_else(|_| unreachable!("escaped static dir is a valid pattern")),
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Replaces each reference with `../static/posts/<post_url>/`, where
    /// [`crate::build::copy_static_assets`] publishes the post's assets.
    pub fn rewrite(&self, text: &str, post_url: &str) -> String {
        self.pattern
            .replace_all(text, |caps: &Captures| {
                format!("{}../static/posts/{}/", &caps[1], post_url)
            })
            .into_owned()
    }
}

/// Normalizes the attributes that JSX spells differently: `class` becomes
/// `className` and single-quoted `style` values become double-quoted.
/// Unquoted `class`/`style` values are reported and left alone.
pub fn quote_attributes(text: &str, anomalies: &mut Vec<Anomaly>) -> String {
    static RE_UNQUOTED: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"<[A-Za-z][^<>]*?\s(class|style)\s*=\s*([^\s"'>]+)"#).unwrap()
    });
    static RE_STYLE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(<[A-Za-z][^<>]*?\s)style\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
    });

    for caps in RE_UNQUOTED.captures_iter(text) {
        anomalies.push(Anomaly::UnquotedAttribute {
            name: caps[1].to_owned(),
            value: caps[2].to_owned(),
        });
    }

    let text = class_names(text);
    replace_all_attributes(&RE_STYLE, &text, |prefix, value| {
        format!(r#"{}style="{}""#, prefix, value.replace('"', "&quot;"))
    })
}

/// Renames quoted `class` attributes to `className`.
pub fn class_names(text: &str) -> String {
    static RE_CLASS: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(<[A-Za-z][^<>]*?\s)class\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
    });
    replace_all_attributes(&RE_CLASS, text, |prefix, value| {
        format!(r#"{}className="{}""#, prefix, value.replace('"', "&quot;"))
    })
}

/// Serializes every `style="..."` attribute as a style object
/// (`style={{"marginLeft":"2em"}}`).
pub fn style_objects(text: &str, anomalies: &mut Vec<Anomaly>) -> String {
    static RE_STYLE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(<[A-Za-z][^<>]*?\s)style="([^"]*)""#).unwrap()
    });
    RE_STYLE
        .replace_all(text, |caps: &Captures| {
            format!("{}style={{{}}}", &caps[1], style::to_object(&caps[2], anomalies))
        })
        .into_owned()
}

/// Self-closes void elements: `<br>` becomes `<br/>`. Elements that are
/// already self-closed are left as they are.
pub fn close_void_elements(text: &str) -> String {
    static RE_VOID: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r#"<(area|base|br|col|embed|hr|img|input|link|meta|param|source|track|wbr)\b((?:[^>"']|"[^"]*"|'[^']*')*?)(/?)>"#,
        )
        .unwrap()
    });
    RE_VOID
        .replace_all(text, |caps: &Captures| {
            if caps[3].is_empty() {
                format!("<{}{}/>", &caps[1], &caps[2])
            } else {
                caps[0].to_owned()
            }
        })
        .into_owned()
}

/// Wraps anchors pointing at sibling posts (`../<url>/`) in a prefetching
/// `Link` to the post's route. The anchor keeps its other attributes and
/// its content. Links to urls the corpus doesn't know are still converted
/// and reported.
pub fn post_links(
    text: &str,
    links: &LinkConverter,
    corpus: &Corpus,
    posts_route: &str,
    anomalies: &mut Vec<Anomaly>,
) -> String {
    static RE_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?s)<a((?:\s(?:[^>"']|"[^"]*"|'[^']*')*)?)>(.*?)</a>"#).unwrap()
    });
    RE_ANCHOR
        .replace_all(text, |caps: &Captures| {
            let (href, rest) = match take_attribute(&caps[1], "href") {
                Some(found) => found,
                None => return caps[0].to_owned(),
            };
            match links.convert(&href) {
                Some(link) => {
                    if corpus.post_by_url(&link.url).is_none() {
                        anomalies.push(Anomaly::UnknownPostLink(link.url.clone()));
                    }
                    format!(
                        r#"<Link href="{}" prefetch><a{}>{}</a></Link>"#,
                        link.route(posts_route),
                        rest,
                        &caps[2]
                    )
                }
                None => caps[0].to_owned(),
            }
        })
        .into_owned()
}

/// Finds the attribute `name` in the attribute list of a start tag. Returns
/// its value and the attribute list without it.
fn take_attribute(attributes: &str, name: &str) -> Option<(String, String)> {
    static RE_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"\s+([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
            .unwrap()
    });
    let caps = RE_ATTRIBUTE
        .captures_iter(attributes)
        .find(|caps| caps[1].eq_ignore_ascii_case(name))?;
    let range = caps.get(0)?.range();
    let value = caps
        .get(2)
        .or_else(|| caps.get(3))
        .or_else(|| caps.get(4))
        .map_or("", |m| m.as_str());
    Some((
        value.to_owned(),
        format!("{}{}", &attributes[..range.start], &attributes[range.end..]),
    ))
}

/// Escapes `{` and `}` inside `<code>` elements so they render as text
/// rather than opening an expression.
pub fn escape_code_braces(text: &str) -> String {
    static RE_CODE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)(<code\b[^>]*>)(.*?)(</code>)").unwrap());
    RE_CODE
        .replace_all(text, |caps: &Captures| {
            let mut inner = String::with_capacity(caps[2].len());
            for c in caps[2].chars() {
                match c {
                    '{' => inner.push_str(r#"{"{"}"#),
                    '}' => inner.push_str(r#"{"}"}"#),
                    c => inner.push(c),
                }
            }
            format!("{}{}{}", &caps[1], inner, &caps[3])
        })
        .into_owned()
}

/// Moves the body of each `<script>` element into a
/// `dangerouslySetInnerHTML` template literal. Self-closed scripts are left
/// alone; a script that is never closed is reported.
pub fn inline_scripts(text: &str, anomalies: &mut Vec<Anomaly>) -> String {
    static RE_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)<script\b((?:[^>/]|/[^>])*)>(.*?)</script>").unwrap()
    });
    inline_raw_text(text, "script", &RE_SCRIPT, anomalies, |attributes, body| {
        format!(
            "<script{} dangerouslySetInnerHTML={{{{__html: `{}`}}}}/>",
            attributes.trim_end(),
            template_literal(body)
        )
    })
}

/// Moves the body of each `<style>` element into a template literal child
/// of a `<style jsx>` element.
pub fn inline_styles(text: &str, anomalies: &mut Vec<Anomaly>) -> String {
    static RE_STYLE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)<style\b((?:[^>/]|/[^>])*)>(.*?)</style>").unwrap()
    });
    inline_raw_text(text, "style", &RE_STYLE, anomalies, |attributes, body| {
        format!(
            "<style jsx{}>{{`{}`}}</style>",
            attributes.trim_end(),
            template_literal(body)
        )
    })
}

/// Appends `index.html` to relative iframe sources that name a directory,
/// keeping any query or fragment.
pub fn iframe_index(text: &str) -> String {
    static RE_IFRAME: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(<iframe\b(?:[^>"']|"[^"]*"|'[^']*')*?\ssrc\s*=\s*)(?:"([^"]*)"|'([^']*)')"#)
            .unwrap()
    });
    RE_IFRAME
        .replace_all(text, |caps: &Captures| match (caps.get(2), caps.get(3)) {
            (Some(src), _) => format!(r#"{}"{}""#, &caps[1], iframe_src(src.as_str())),
            (_, Some(src)) => format!("{}'{}'", &caps[1], iframe_src(src.as_str())),
            _ => caps[0].to_owned(),
        })
        .into_owned()
}

fn iframe_src(src: &str) -> String {
    static RE_SCHEME: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").unwrap());
    if src.starts_with("//") || RE_SCHEME.is_match(src) {
        return src.to_owned();
    }

    let (path, rest) = src.split_at(src.find(['?', '#']).unwrap_or(src.len()));
    let lower = path.to_ascii_lowercase();
    if path.is_empty() || lower.ends_with(".htm") || lower.ends_with(".html") {
        return src.to_owned();
    }
    match path.ends_with('/') {
        true => format!("{}index.html{}", path, rest),
        false => format!("{}/index.html{}", path, rest),
    }
}

fn inline_raw_text(
    text: &str,
    tag: &str,
    element: &Regex,
    anomalies: &mut Vec<Anomaly>,
    mut inline: impl FnMut(&str, &str) -> String,
) -> String {
    static RE_OPEN: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)<(script|style)\b((?:[^>/]|/[^>])*)>").unwrap()
    });

    let opened = RE_OPEN
        .captures_iter(text)
        .filter(|caps| caps[1].eq_ignore_ascii_case(tag))
        .count();
    let mut closed = 0;
    let output = element
        .replace_all(text, |caps: &Captures| {
            closed += 1;
            inline(&caps[1], &caps[2])
        })
        .into_owned();
    if opened > closed {
        anomalies.push(Anomaly::UnclosedElement(tag.to_owned()));
    }
    output
}

/// Escapes `body` for use inside a template literal.
fn template_literal(body: &str) -> String {
    body.replace('\\', r"\\")
        .replace('`', r"\`")
        .replace("${", r"\${")
}

/// Applies `replace` to every match of an attribute pattern whose first
/// group is the tag prefix and whose second or third group is the
/// double- or single-quoted value.
fn replace_all_attributes(
    pattern: &Regex,
    text: &str,
    replace: impl Fn(&str, &str) -> String,
) -> String {
    pattern
        .replace_all(text, |caps: &Captures| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str());
            replace(&caps[1], value)
        })
        .into_owned()
}
