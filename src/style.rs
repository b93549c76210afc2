//! Converts inline CSS declarations into style objects.

use serde_json::{Map, Value};

use crate::transform::Anomaly;

/// Serializes the declarations of an inline `style` attribute as a JSON
/// object keyed by camel-cased property names, keeping declaration order.
/// A later declaration of the same property replaces the earlier value.
/// Declarations without a `property: value` shape are dropped and
/// reported.
pub fn to_object(css: &str, anomalies: &mut Vec<Anomaly>) -> String {
    let css = decode_entities(css);
    let mut object = Map::new();
    for declaration in declarations(&css) {
        let declaration = declaration.trim();
        if declaration.is_empty() {
            continue;
        }
        match declaration.split_once(':') {
            Some((property, value)) if !property.trim().is_empty() => {
                object.insert(
                    camel_case(property.trim()),
                    Value::String(value.trim().to_owned()),
                );
            }
            _ => anomalies.push(Anomaly::MalformedDeclaration(declaration.to_owned())),
        }
    }
    Value::Object(object).to_string()
}

/// Splits on `;` outside of quotes and parentheses, so
/// `background: url(a;b.png)` stays one declaration.
fn declarations(css: &str) -> Vec<&str> {
    let mut declarations = Vec::new();
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0;
    for (i, c) in css.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                declarations.push(&css[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    declarations.push(&css[start..]);
    declarations
}

/// `margin-left` becomes `marginLeft` and `-webkit-transition` becomes
/// `WebkitTransition`. The `-ms-` prefix stays lowercase (`msTransform`)
/// and custom properties (`--accent`) are kept as written.
fn camel_case(property: &str) -> String {
    if property.starts_with("--") {
        return property.to_owned();
    }
    let property = property.to_ascii_lowercase();
    let property = match property.strip_prefix("-ms-") {
        Some(rest) => format!("ms-{}", rest),
        None => property,
    };

    let mut out = String::with_capacity(property.len());
    let mut upper = false;
    for c in property.chars() {
        match c {
            '-' => upper = true,
            c if upper => {
                out.push(c.to_ascii_uppercase());
                upper = false;
            }
            c => out.push(c),
        }
    }
    out
}

/// Decodes the entities an attribute value may carry after quoting.
fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
