//! The shortcodes that pages use to link to each other.
//!
//! Every function here is pure: the same arguments always produce the same
//! fragment, so the host generator is free to call them from any thread.

mod registry;

use serde::Deserialize;
use thiserror::Error;

use crate::html::{a, details, div, summary, HtmlElement};

pub use registry::*;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShortcodeError {
    #[error("invalid argument `{param}` for shortcode: {reason}")]
    InvalidArgument { param: String, reason: String },

    #[error("unknown shortcode: {0}")]
    UnknownShortcode(String),

    #[error("shortcode `{name}` takes at most {max} arguments, got {given}")]
    TooManyArguments {
        name: String,
        max: usize,
        given: usize,
    },

    #[error("shortcode `{0}` must enclose a body")]
    MissingContent(String),

    #[error("shortcode `{0}` does not take a body")]
    UnexpectedContent(String),

    #[error("render error: {0}")]
    Render(#[from] std::fmt::Error),
}

impl ShortcodeError {
    fn blank(param: &str) -> Self {
        Self::InvalidArgument {
            param: param.to_string(),
            reason: "must not be empty".to_string(),
        }
    }
}

/// Where page links point to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkOptions {
    /// The path that page slugs are joined onto, e.g. `pages` or `/pages`.
    pub page_base_path: String,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            page_base_path: "pages".to_string(),
        }
    }
}

impl LinkOptions {
    pub fn new(page_base_path: impl Into<String>) -> Self {
        Self {
            page_base_path: page_base_path.into(),
        }
    }

    /// Returns the link target for the page with the given slug.
    pub fn page_href(&self, slug: &str) -> String {
        self.join(slug)
    }

    /// Returns the link target for the original version of the page with the
    /// given slug.
    pub fn original_href(&self, slug: &str) -> String {
        self.join(&format!("original/{slug}"))
    }

    fn join(&self, path: &str) -> String {
        let base = self.page_base_path.trim_end_matches('/');
        if base.is_empty() && !self.page_base_path.starts_with('/') {
            path.to_string()
        } else {
            format!("{base}/{path}")
        }
    }
}

fn require<'a>(param: &str, value: &'a str) -> Result<&'a str, ShortcodeError> {
    if value.trim().is_empty() {
        return Err(ShortcodeError::blank(param));
    }

    Ok(value)
}

fn link(href: String, label: &str) -> HtmlElement {
    a().href(href).text(label)
}

/// Renders a link to the page with the given slug.
///
/// The link is labeled with `name`, or with the slug when no name is given.
pub fn page_link(
    options: &LinkOptions,
    slug: &str,
    name: Option<&str>,
) -> Result<String, ShortcodeError> {
    let slug = require("slug", slug)?;
    let label = name.filter(|name| !name.trim().is_empty()).unwrap_or(slug);

    Ok(link(options.page_href(slug), label).render_to_string()?)
}

/// Renders a link back to the homepage.
pub fn home_link(name: &str) -> Result<String, ShortcodeError> {
    let name = require("name", name)?;

    Ok(link("/".to_string(), name).render_to_string()?)
}

/// Renders the banner shown on a page that revises an older article,
/// followed by a collapsed panel holding the original `content`.
pub fn original_notice(
    options: &LinkOptions,
    content: &str,
    slug: &str,
    name: &str,
) -> Result<String, ShortcodeError> {
    let slug = require("slug", slug)?;
    let name = require("name", name)?;

    let callout = div()
        .class("alert alert-success")
        .role("alert")
        .text("This is a revised version of ")
        .child(link(options.original_href(slug), name))
        .text(". The original is kept below.");

    let panel = details()
        .class("original-content")
        .child(summary().text("Original article"))
        .raw(content);

    Ok(format!(
        "{}{}",
        callout.render_to_string()?,
        panel.render_to_string()?
    ))
}

/// Renders the banner shown on a page that has a newer, better version.
pub fn improved_notice(
    options: &LinkOptions,
    slug: &str,
    name: &str,
) -> Result<String, ShortcodeError> {
    let slug = require("slug", slug)?;
    let name = require("name", name)?;

    let callout = div()
        .class("alert alert-warning")
        .role("alert")
        .text("An improved version of this page is available: ")
        .child(link(options.page_href(slug), name))
        .text(".");

    Ok(callout.render_to_string()?)
}
