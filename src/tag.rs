//! Defines the [`Tag`] type, which represents a [`crate::post::Post`] tag and
//! the names its tag page is published under.

use gtmpl::Value;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Represents a [`crate::post::Post`] tag together with the names derived
/// from it.
#[derive(Clone, Debug)]
pub struct Tag {
    /// The tag as written in the front matter.
    pub name: String,

    /// The file stem of the tag page (`pages/tags/{slug}.js`): the name
    /// lower-cased with whitespace replaced by `_`.
    pub slug: String,

    /// The identifier of the tag page component, e.g. `TagReact_hooks`.
    pub component: String,
}

impl Tag {
    pub fn new(name: &str) -> Tag {
        Tag {
            name: name.to_owned(),
            slug: name
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("_"),
            component: format!("Tag{}", identifier(name)),
        }
    }

    /// The site route of the tag page.
    pub fn route(&self) -> String {
        format!("/tags/{}", self.slug)
    }
}

impl Hash for Tag {
    /// Implements [`Hash`] for [`Tag`] by delegating directly to the `name`
    /// field.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl PartialEq for Tag {
    /// Implements [`PartialEq`] and [`Eq`] for [`Tag`] by delegating directly
    /// to the `name` field.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Tag {}

impl From<&Tag> for Value {
    /// Converts [`Tag`]s into [`Value`]s for templating.
    fn from(t: &Tag) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("tag".to_owned(), Value::String(t.name.clone()));
        m.insert("slug".to_owned(), Value::String(t.slug.clone()));
        m.insert("component".to_owned(), Value::String(t.component.clone()));
        m.insert("url".to_owned(), Value::String(t.route()));
        Value::Object(m)
    }
}

/// Turns `name` into a component identifier: the first character is
/// upper-cased and every character that can't appear in an identifier
/// becomes `_`.
pub fn identifier(name: &str) -> String {
    let mut chars = name.chars();
    let mut out = String::with_capacity(name.len());
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
    }
    out.extend(chars);
    out.chars()
        .map(|c| match c.is_alphanumeric() || c == '_' || c == '$' {
            true => c,
            false => '_',
        })
        .collect()
}
