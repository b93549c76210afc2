//! The library code for the `posthaste` blog builder. The architecture can be
//! generally broken down into three distinct steps:
//!
//! 1. Reading posts from source directories on disk ([`crate::parser`])
//! 2. Transforming each post body into component markup
//!    ([`crate::transform`])
//! 3. Writing page sources, static assets and the feed ([`crate::write`],
//!    [`crate::build`], [`crate::feed`])
//!
//! The second step is the most involved. A post body is a mix of Markdown and
//! inline HTML which is rewritten in a fixed sequence of passes: fenced code
//! is set aside first so no other pass touches it, the remaining source is
//! rewritten and rendered to HTML, and the joined document is then adapted to
//! JSX (class names, style objects, closed void elements, inlined scripts and
//! styles). Problems met along the way are reported as
//! [`crate::transform::Anomaly`] values and never abort the build.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod feed;
pub mod highlight;
pub mod htmlrenderer;
pub mod markdown;
pub mod parser;
pub mod post;
pub mod rewrite;
pub mod style;
pub mod tag;
pub mod transform;
pub mod url;
pub mod write;
