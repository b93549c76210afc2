//! Syntax highlighting for fenced code blocks. Highlighted code is emitted
//! as `<span class="...">` runs so themes live in the site's stylesheet
//! rather than in inline styles.

use std::io;

use pulldown_cmark::escape::{escape_html, StrWrite};
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::transform::Anomaly;

pub struct SyntaxHighlighter {
    syntaxes: SyntaxSet,
}

impl Default for SyntaxHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxHighlighter {
    pub fn new() -> Self {
        SyntaxHighlighter {
            syntaxes: SyntaxSet::load_defaults_newlines(),
        }
    }

    /// Highlights `code` as `language` into `w`. Without a language, or with
    /// one no syntax answers to, the syntax is detected from the first line
    /// and falls back to plain text. Highlighting failures are reported and
    /// write the escaped code instead.
    pub fn highlight<W: StrWrite>(
        &self,
        w: &mut W,
        code: &str,
        language: Option<&str>,
        anomalies: &mut Vec<Anomaly>,
    ) -> io::Result<()> {
        let syntax = match language {
            Some(lang) => match self.syntaxes.find_syntax_by_token(lang) {
                Some(syntax) => syntax,
                None => {
                    anomalies.push(Anomaly::UnknownLanguage(lang.to_owned()));
                    self.detect(code)
                }
            },
            None => self.detect(code),
        };

        let mut generator = ClassedHTMLGenerator::new_with_class_style(
            syntax,
            &self.syntaxes,
            ClassStyle::Spaced,
        );
        for line in LinesWithEndings::from(code) {
            if let Err(e) = generator.parse_html_for_line_which_includes_newline(line) {
                anomalies.push(Anomaly::Highlight(e.to_string()));
                return escape_html(w, code);
            }
        }
        w.write_str(&generator.finalize())
    }

    fn detect(&self, code: &str) -> &SyntaxReference {
        code.lines()
            .next()
            .and_then(|line| self.syntaxes.find_syntax_by_first_line(line))
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn highlight(code: &str, language: Option<&str>, anomalies: &mut Vec<Anomaly>) -> String {
        let mut out = String::new();
        SyntaxHighlighter::new()
            .highlight(&mut out, code, language, anomalies)
            .unwrap();
        out
    }

    #[test]
    fn test_highlight_known_language() {
        let mut anomalies = Vec::new();
        let html = highlight("fn main() {}\n", Some("rust"), &mut anomalies);
        assert!(html.contains(r#"<span class="source rust">"#), "{}", html);
        assert!(html.contains("main"));
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_highlight_escapes() {
        let mut anomalies = Vec::new();
        let html = highlight("<div>&</div>\n", None, &mut anomalies);
        assert!(html.contains("&lt;div&gt;&amp;&lt;/div&gt;"), "{}", html);
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_highlight_detects_from_first_line() {
        let mut anomalies = Vec::new();
        let html = highlight("#!/bin/bash\necho hi\n", None, &mut anomalies);
        assert!(html.contains("source shell"), "{}", html);
    }

    #[test]
    fn test_highlight_unknown_language() {
        let mut anomalies = Vec::new();
        let html = highlight("hello\n", Some("klingon"), &mut anomalies);
        assert!(html.contains("hello"));
        assert_eq!(vec![Anomaly::UnknownLanguage("klingon".to_owned())], anomalies);
    }
}
