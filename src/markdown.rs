use std::collections::VecDeque;
use std::io;

use pulldown_cmark::{Event, Options, Parser, Tag};
use serde::Deserialize;

use crate::highlight::SyntaxHighlighter;
use crate::htmlrenderer::HtmlRenderer;
use crate::post::headline_id;
use crate::transform::Anomaly;

/// The Markdown extensions and renderer features used for post bodies.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub tables: bool,
    pub strikethrough: bool,
    pub tasklists: bool,
    pub footnotes: bool,
    pub smart_punctuation: bool,

    /// Highlights fenced code blocks.
    pub highlight: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            tables: true,
            strikethrough: false,
            tasklists: true,
            footnotes: false,
            smart_punctuation: false,
            highlight: true,
        }
    }
}

impl RenderOptions {
    fn parser_options(&self) -> Options {
        let mut options = Options::empty();
        options.set(Options::ENABLE_TABLES, self.tables);
        options.set(Options::ENABLE_STRIKETHROUGH, self.strikethrough);
        options.set(Options::ENABLE_TASKLISTS, self.tasklists);
        options.set(Options::ENABLE_FOOTNOTES, self.footnotes);
        options.set(Options::ENABLE_SMART_PUNCTUATION, self.smart_punctuation);
        options
    }
}

/// Converts Markdown to HTML.
pub struct Markdown {
    options: Options,
    highlighter: Option<SyntaxHighlighter>,
}

impl Markdown {
    pub fn new(options: RenderOptions) -> Markdown {
        Markdown {
            highlighter: options.highlight.then(SyntaxHighlighter::new),
            options: options.parser_options(),
        }
    }

    /// Renders `markdown`, adding any anomalies the renderer met to
    /// `anomalies`.
    pub fn render(&self, markdown: &str, anomalies: &mut Vec<Anomaly>) -> io::Result<String> {
        let events: Vec<Event> = Parser::new_ext(markdown, self.options).collect();
        let mut renderer = HtmlRenderer::new(self.highlighter.as_ref(), heading_ids(&events));
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        for event in events {
            renderer.on_event(&mut out, event)?;
        }
        anomalies.extend(renderer.into_anomalies());
        Ok(out)
    }
}

/// Computes the anchor ids of the headings in `events` from their plain
/// text, in document order.
fn heading_ids(events: &[Event]) -> VecDeque<String> {
    let mut ids = VecDeque::new();
    let mut text: Option<String> = None;
    for event in events {
        match event {
            Event::Start(Tag::Heading(_)) => text = Some(String::new()),
            Event::End(Tag::Heading(_)) => {
                if let Some(text) = text.take() {
                    ids.push_back(headline_id(&text));
                }
            }
            Event::Text(s) | Event::Code(s) => {
                if let Some(text) = &mut text {
                    text.push_str(s);
                }
            }
            _ => {}
        }
    }
    ids
}
