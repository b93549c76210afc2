//! Implements a custom HTML renderer for post bodies. Compared to
//! [`pulldown_cmark::html::push_html`] it gives headings the same anchor ids
//! the reader derives for headlines and highlights fenced code. The bodies of
//! `<script>` and `<style>` elements are kept verbatim.

use std::collections::VecDeque;
use std::fmt::{self, Display};
use std::io;
use std::sync::LazyLock;

use pulldown_cmark::escape::{escape_href, escape_html, StrWrite};
use pulldown_cmark::{Alignment, CodeBlockKind, CowStr, Event, LinkType, Tag};
use regex::Regex;

use crate::highlight::SyntaxHighlighter;
use crate::transform::Anomaly;

struct Adaptor<'a, T> {
    formatter: &'a mut T,
    result: fmt::Result,
}

impl<T> Adaptor<'_, T> {
    fn handle_result(&mut self, result: fmt::Result) -> io::Result<()> {
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.result = result;
                Err(io::Error::new(io::ErrorKind::Other, e))
            }
        }
    }
}

impl<T: fmt::Write> StrWrite for Adaptor<'_, T> {
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        let result = self.formatter.write_str(s);
        self.handle_result(result)
    }

    fn write_fmt(&mut self, args: fmt::Arguments) -> io::Result<()> {
        let result = self.formatter.write_fmt(args);
        self.handle_result(result)
    }
}

struct EscapeHref<'a>(&'a str);

impl Display for EscapeHref<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };
        let _ = escape_href(&mut adaptor, self.0);
        adaptor.result
    }
}

struct EscapeHtml<'a>(&'a str);

impl Display for EscapeHtml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut adaptor = Adaptor {
            formatter: f,
            result: Ok(()),
        };

        let _ = escape_html(&mut adaptor, self.0);
        adaptor.result
    }
}

enum TableState {
    Head,
    Body,
}

/// A fenced or indented code block whose text is still being collected.
struct CodeBlock {
    language: Option<String>,
    text: String,
}

/// Renders markdown [`Event`]s into HTML. This is largely modeled after
/// [`pulldown_cmark`]'s private [`HtmlWriter`
/// struct](https://github.com/raphlinus/pulldown-cmark/blob/bf0a1a4938dbd2ec41c3add069b3d361d11731f4/src/html.rs#L36-L50).
pub struct HtmlRenderer<'h> {
    table_alignments: Vec<Alignment>,
    table_state: TableState,
    table_cell_index: usize,

    /// Highlights code blocks; `None` renders them as escaped text.
    highlighter: Option<&'h SyntaxHighlighter>,

    /// The ids of the headings still to be rendered, in document order.
    heading_ids: VecDeque<String>,
    code: Option<CodeBlock>,

    /// The nesting depth of images. Everything inside an image is alt text.
    image_depth: usize,
    image_title: String,

    /// Set while inside a `<script>` or `<style>` element.
    raw_text: bool,
    anomalies: Vec<Anomaly>,
}

impl<'a, 'h> HtmlRenderer<'h> {
    pub fn on_event<W: StrWrite>(
        &mut self,
        w: &mut W,
        event: Event<'a>,
    ) -> io::Result<()> {
        if self.image_depth > 0 {
            return self.on_alt_text(w, event);
        }
        match event {
            Event::Start(tag) => self.on_start(w, tag),
            Event::End(tag) => self.on_end(w, tag),
            Event::Code(code) => self.on_code(w, code),
            Event::FootnoteReference(name) => write!(
                w,
                r##"<sup class="footnote-reference"><a href="#{}">{}</a></sup>"##,
                EscapeHtml(&name),
                EscapeHtml(&name),
            ),
            Event::HardBreak => self.on_hard_break(w),
            Event::Html(html) => self.on_html(w, html),
            Event::Rule => self.on_rule(w),
            Event::SoftBreak => self.on_soft_break(w),
            Event::TaskListMarker(checked) => {
                self.on_task_list_marker(w, checked)
            }
            Event::Text(text) => self.on_text(w, text),
        }
    }
}

impl<'a, 'h> HtmlRenderer<'h> {
    pub fn new(
        highlighter: Option<&'h SyntaxHighlighter>,
        heading_ids: VecDeque<String>,
    ) -> Self {
        HtmlRenderer {
            table_alignments: Vec::default(),
            table_state: TableState::Head,
            table_cell_index: usize::default(),
            highlighter,
            heading_ids,
            code: None,
            image_depth: 0,
            image_title: String::default(),
            raw_text: false,
            anomalies: Vec::default(),
        }
    }

    /// The anomalies met while rendering.
    pub fn into_anomalies(self) -> Vec<Anomaly> {
        self.anomalies
    }

    fn on_start<W: StrWrite>(
        &mut self,
        w: &mut W,
        tag: Tag<'a>,
    ) -> io::Result<()> {
        match tag {
            Tag::BlockQuote => w.write_str("<blockquote>\n"),
            Tag::CodeBlock(kind) => {
                self.code = Some(CodeBlock {
                    language: match kind {
                        CodeBlockKind::Fenced(info) => {
                            info.split_whitespace().next().map(str::to_owned)
                        }
                        CodeBlockKind::Indented => None,
                    },
                    text: String::new(),
                });
                Ok(())
            }
            Tag::Emphasis => w.write_str("<em>"),
            Tag::FootnoteDefinition(name) => {
                let name = EscapeHtml(&name);
                write!(
                    w,
                    r#"<div class="footnote-definition" id="{}">{}. &nbsp;"#,
                    &name, &name,
                )
            }
            Tag::Heading(level) => {
                match self.heading_ids.pop_front().filter(|id| !id.is_empty()) {
                    Some(id) => write!(w, r#"<h{} id="{}">"#, level, EscapeHtml(&id)),
                    None => write!(w, "<h{}>", level),
                }
            }
            Tag::Image(_link_type, dest, title) => {
                self.image_depth = 1;
                self.image_title = title.into_string();
                write!(w, r#"<img src="{}" alt=""#, EscapeHref(&dest))
            }
            Tag::Item => w.write_str("<li>"),
            Tag::Link(LinkType::Email, dest, title) => {
                write!(w, r#"<a href="mailto:{}""#, EscapeHref(&dest))?;
                self.write_title(w, &title)
            }
            Tag::Link(_link_type, dest, title) => {
                write!(w, r#"<a href="{}""#, EscapeHref(&dest))?;
                self.write_title(w, &title)
            }
            Tag::List(None) => w.write_str("<ul>\n"),
            Tag::List(Some(1)) => w.write_str("<ol>\n"),
            Tag::List(Some(start)) => write!(w, "<ol start=\"{}\">\n", start),
            Tag::Paragraph => w.write_str("<p>"),
            Tag::Strikethrough => w.write_str("<del>"),
            Tag::Strong => w.write_str("<strong>"),
            Tag::Table(alignments) => {
                self.table_alignments = alignments;
                w.write_str("<table>")
            }
            Tag::TableHead => {
                self.table_state = TableState::Head;
                self.table_cell_index = 0;
                w.write_str("<thead><tr>")
            }
            Tag::TableRow => {
                self.table_cell_index = 0;
                w.write_str("<tr>")
            }
            Tag::TableCell => write!(
                w,
                "<{}{}>",
                match self.table_state {
                    TableState::Head => "th",
                    TableState::Body => "td",
                },
                match self.table_alignments.get(self.table_cell_index) {
                    Some(Alignment::Left) => r#" align="left""#,
                    Some(Alignment::Right) => r#" align="right""#,
                    Some(Alignment::Center) => r#" align="center""#,
                    _ => "",
                }
            ),
        }
    }

    fn on_end<W: StrWrite>(&mut self, w: &mut W, tag: Tag) -> io::Result<()> {
        match tag {
            Tag::BlockQuote => w.write_str("</blockquote>\n"),
            Tag::CodeBlock(_) => self.on_code_block(w),
            Tag::Emphasis => w.write_str("</em>"),
            Tag::FootnoteDefinition(_) => w.write_str("</div>\n"),
            Tag::Heading(level) => write!(w, "</h{}>\n", level),
            Tag::Image(_, _, _) => Ok(()), /* handled as alt text */
            Tag::Item => w.write_str("</li>\n"),
            Tag::Link(_, _, _) => w.write_str("</a>"),
            Tag::List(Some(_)) => w.write_str("</ol>\n"),
            Tag::List(None) => w.write_str("</ul>\n"),
            Tag::Paragraph => w.write_str("</p>\n"),
            Tag::Strikethrough => w.write_str("</del>"),
            Tag::Strong => w.write_str("</strong>"),
            Tag::Table(_) => w.write_str("</tbody></table>\n"),
            Tag::TableHead => {
                self.table_state = TableState::Body;
                w.write_str("</tr></thead><tbody>")
            }
            Tag::TableRow => w.write_str("</tr>"),
            Tag::TableCell => {
                self.table_cell_index += 1;
                w.write_str(match self.table_state {
                    TableState::Head => "</th>",
                    TableState::Body => "</td>",
                })
            }
        }
    }

    /// Handles the events nested in an image, which only contribute their
    /// text to the `alt` attribute.
    fn on_alt_text<W: StrWrite>(
        &mut self,
        w: &mut W,
        event: Event<'a>,
    ) -> io::Result<()> {
        match event {
            Event::Start(Tag::Image(..)) => {
                self.image_depth += 1;
                Ok(())
            }
            Event::End(Tag::Image(..)) => {
                self.image_depth -= 1;
                if self.image_depth > 0 {
                    return Ok(());
                }
                w.write_str("\"")?;
                let title = std::mem::take(&mut self.image_title);
                self.write_title(w, &title)
            }
            Event::Text(text) | Event::Code(text) => escape_html(w, &text),
            Event::SoftBreak | Event::HardBreak => w.write_str(" "),
            _ => Ok(()),
        }
    }

    fn write_title<W: StrWrite>(&self, w: &mut W, title: &str) -> io::Result<()> {
        match title.is_empty() {
            true => w.write_str(">"),
            false => write!(w, r#" title="{}">"#, EscapeHtml(title)),
        }
    }

    fn on_code_block<W: StrWrite>(&mut self, w: &mut W) -> io::Result<()> {
        let code = match self.code.take() {
            Some(code) => code,
            None => return w.write_str("</code></pre>\n"),
        };
        match &code.language {
            Some(language) => write!(
                w,
                r#"<pre><code class="language-{}">"#,
                EscapeHtml(language)
            )?,
            None => w.write_str("<pre><code>")?,
        }
        match self.highlighter {
            Some(highlighter) => highlighter.highlight(
                &mut *w,
                &code.text,
                code.language.as_deref(),
                &mut self.anomalies,
            )?,
            None => escape_html(&mut *w, &code.text)?,
        }
        w.write_str("</code></pre>\n")
    }

    fn on_text<W: StrWrite>(
        &mut self,
        w: &mut W,
        s: CowStr,
    ) -> io::Result<()> {
        if let Some(code) = &mut self.code {
            code.text.push_str(&s);
            return Ok(());
        }
        match self.raw_text {
            true => w.write_str(&s),
            false => escape_html(w, &s),
        }
    }

    fn on_code<W: StrWrite>(
        &mut self,
        w: &mut W,
        s: CowStr,
    ) -> io::Result<()> {
        match self.raw_text {
            true => w.write_str(&code_span_source(&s)),
            false => write!(w, "<code>{}</code>", EscapeHtml(&s)),
        }
    }

    fn on_html<W: StrWrite>(
        &mut self,
        w: &mut W,
        s: CowStr,
    ) -> io::Result<()> {
        static RE_RAW_TEXT_TAG: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"(?i)<(/?)(?:script|style)\b").unwrap());
        for caps in RE_RAW_TEXT_TAG.captures_iter(&s) {
            self.raw_text = caps[1].is_empty();
        }
        w.write_str(&s)
    }

    fn on_soft_break<W: StrWrite>(&mut self, w: &mut W) -> io::Result<()> {
        w.write_str("\n")
    }

    fn on_hard_break<W: StrWrite>(&mut self, w: &mut W) -> io::Result<()> {
        w.write_str("<br />\n")
    }

    fn on_rule<W: StrWrite>(&mut self, w: &mut W) -> io::Result<()> {
        w.write_str("<hr />\n")
    }

    fn on_task_list_marker<W: StrWrite>(
        &mut self,
        w: &mut W,
        checked: bool,
    ) -> io::Result<()> {
        write!(
            w,
            r#"<input disabled="" type="checkbox" {}/>"#,
            match checked {
                true => r#"checked="" "#,
                false => "",
            }
        )
    }
}

/// Rebuilds the backtick source of a code span from its content: the fence
/// is one backtick longer than the longest run inside, padded with a space
/// when the content starts or ends with a backtick.
fn code_span_source(code: &str) -> String {
    let longest = code
        .split(|c: char| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest + 1);
    let pad = match code.starts_with('`') || code.ends_with('`') {
        true => " ",
        false => "",
    };
    format!("{}{}{}{}{}", fence, pad, code, pad, fence)
}

#[cfg(test)]
mod test {
    use super::*;
    use pulldown_cmark::{Options, Parser};

    fn render(markdown: &str, heading_ids: &[&str]) -> String {
        let mut out = String::new();
        let mut renderer =
            HtmlRenderer::new(None, heading_ids.iter().map(|s| s.to_string()).collect());
        for event in Parser::new_ext(markdown, Options::ENABLE_TABLES) {
            renderer.on_event(&mut out, event).unwrap();
        }
        out
    }

    #[test]
    fn test_heading_ids() {
        assert_eq!(
            "<h1 id=\"intro\">Intro</h1>\n<h2>Next</h2>\n",
            render("# Intro\n\n## Next\n", &["intro", ""])
        );
    }

    #[test]
    fn test_image_alt_text() {
        assert_eq!(
            "<p><img src=\"a.png\" alt=\"an image\" title=\"T\"></p>\n",
            render("![an *image*](a.png \"T\")", &[])
        );
        assert_eq!(
            "<p><img src=\"a%20b.png\" alt=\"\"></p>\n",
            render("![](a%20b.png)", &[])
        );
    }

    #[test]
    fn test_links_omit_empty_title() {
        assert_eq!(
            "<p><a href=\"../x/\">x</a> <a href=\"mailto:a@b.c\">a@b.c</a></p>\n",
            render("[x](../x/) <a@b.c>", &[])
        );
    }

    #[test]
    fn test_code_block_without_highlighter() {
        assert_eq!(
            "<pre><code class=\"language-html\">&lt;b&gt;{x}&lt;/b&gt;\n</code></pre>\n",
            render("```html\n<b>{x}</b>\n```\n", &[])
        );
    }

    #[test]
    fn test_script_body_is_raw() {
        assert_eq!(
            "<p>a <script>if (a < b && c) {}</script> b</p>\n",
            render("a <script>if (a < b && c) {}</script> b", &[])
        );
    }

    #[test]
    fn test_code_span_in_script_keeps_backticks() {
        assert_eq!(
            "<p>a <script>alert('x' + `y`) + ``a`b``</script> <code>c</code></p>\n",
            render("a <script>alert('x' + `y`) + ``a`b``</script> `c`", &[])
        );
    }

    #[test]
    fn test_code_span_source() {
        assert_eq!("`y`", code_span_source("y"));
        assert_eq!("``a`b``", code_span_source("a`b"));
        assert_eq!("`` `a ``", code_span_source("`a"));
    }

    #[test]
    fn test_table() {
        assert_eq!(
            "<table><thead><tr><th>a</th><th align=\"right\">b</th></tr></thead><tbody><tr><td>1</td><td align=\"right\">2</td></tr></tbody></table>\n",
            render("| a | b |\n|---|--:|\n| 1 | 2 |\n", &[])
        );
    }
}
