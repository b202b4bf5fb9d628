use std::fmt;
use std::sync::{Arc, OnceLock};

use derive_more::Deref;
use indexmap::IndexMap;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, trace};

use crate::shortcodes::{
    home_link, improved_notice, original_notice, page_link, LinkOptions, ShortcodeError,
};

static NAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn name_regex() -> &'static Regex {
    NAME_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .expect("failed to compile regex for shortcode names")
    })
}

pub type RenderShortcode =
    Arc<dyn Fn(&ShortcodeArgs) -> Result<String, ShortcodeError> + Send + Sync>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ShortcodeKind {
    /// Called on its own, e.g. `{{ page("intro") }}`.
    Inline,
    /// Wraps a body of content that is handed to the shortcode.
    Paired,
}

/// The arguments a shortcode is called with.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ShortcodeArgs {
    pub positional: Vec<String>,
    pub content: Option<String>,
}

impl ShortcodeArgs {
    pub fn new<I, S>(positional: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            positional: positional.into_iter().map(Into::into).collect(),
            content: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    pub fn required(&self, index: usize, param: &str) -> Result<&str, ShortcodeError> {
        self.get(index).ok_or_else(|| ShortcodeError::InvalidArgument {
            param: param.to_string(),
            reason: "is required".to_string(),
        })
    }

    /// The enclosed body, or an empty string for inline calls.
    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct Shortcode {
    pub kind: ShortcodeKind,
    /// The names of the positional parameters, in order.
    pub params: Vec<String>,
    pub render: RenderShortcode,
}

impl fmt::Debug for Shortcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shortcode")
            .field("kind", &self.kind)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Shortcode {
    pub fn inline(
        params: &[&str],
        render: impl Fn(&ShortcodeArgs) -> Result<String, ShortcodeError> + Send + Sync + 'static,
    ) -> Self {
        Self::new(ShortcodeKind::Inline, params, render)
    }

    pub fn paired(
        params: &[&str],
        render: impl Fn(&ShortcodeArgs) -> Result<String, ShortcodeError> + Send + Sync + 'static,
    ) -> Self {
        Self::new(ShortcodeKind::Paired, params, render)
    }

    fn new(
        kind: ShortcodeKind,
        params: &[&str],
        render: impl Fn(&ShortcodeArgs) -> Result<String, ShortcodeError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            params: params.iter().map(|param| param.to_string()).collect(),
            render: Arc::new(render),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegisterShortcodeError {
    #[error("invalid shortcode name: {0:?}")]
    InvalidName(String),

    #[error("shortcode already registered: {0}")]
    Duplicate(String),
}

/// The shortcodes available to pages, keyed by name.
#[derive(Debug, Clone, Default, Deref)]
pub struct Shortcodes(IndexMap<String, Shortcode>);

impl Shortcodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the built-in shortcodes, linking pages according to `options`:
    ///
    /// - `page(slug, name?)`
    /// - `home(name)`
    /// - `original(slug, name)`, paired with the original article's content
    /// - `improved(slug, name)`
    pub fn builtin(options: &LinkOptions) -> Self {
        let mut shortcodes = Self::new();

        let page_options = options.clone();
        let original_options = options.clone();
        let improved_options = options.clone();

        let builtins = [
            (
                "page",
                Shortcode::inline(&["slug", "name"], move |args| {
                    page_link(&page_options, args.required(0, "slug")?, args.get(1))
                }),
            ),
            (
                "home",
                Shortcode::inline(&["name"], |args| home_link(args.required(0, "name")?)),
            ),
            (
                "original",
                Shortcode::paired(&["slug", "name"], move |args| {
                    original_notice(
                        &original_options,
                        args.content(),
                        args.required(0, "slug")?,
                        args.required(1, "name")?,
                    )
                }),
            ),
            (
                "improved",
                Shortcode::inline(&["slug", "name"], move |args| {
                    improved_notice(
                        &improved_options,
                        args.required(0, "slug")?,
                        args.required(1, "name")?,
                    )
                }),
            ),
        ];

        for (name, shortcode) in builtins {
            shortcodes.0.insert(name.to_string(), shortcode);
        }

        shortcodes
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        shortcode: Shortcode,
    ) -> Result<(), RegisterShortcodeError> {
        let name = name.into();

        if !name_regex().is_match(&name) {
            return Err(RegisterShortcodeError::InvalidName(name));
        }

        if self.0.contains_key(&name) {
            return Err(RegisterShortcodeError::Duplicate(name));
        }

        debug!(name = %name, kind = ?shortcode.kind, "registered shortcode");
        self.0.insert(name, shortcode);

        Ok(())
    }

    /// Calls the inline shortcode with the given name.
    pub fn invoke(&self, name: &str, args: &[&str]) -> Result<String, ShortcodeError> {
        self.call(name, &ShortcodeArgs::new(args.iter().copied()))
    }

    /// Calls the paired shortcode with the given name, handing it `content`.
    pub fn invoke_paired(
        &self,
        name: &str,
        content: &str,
        args: &[&str],
    ) -> Result<String, ShortcodeError> {
        self.call(
            name,
            &ShortcodeArgs::new(args.iter().copied()).with_content(content),
        )
    }

    pub fn call(&self, name: &str, args: &ShortcodeArgs) -> Result<String, ShortcodeError> {
        let shortcode = self
            .0
            .get(name)
            .ok_or_else(|| ShortcodeError::UnknownShortcode(name.to_string()))?;

        match (shortcode.kind, &args.content) {
            (ShortcodeKind::Inline, Some(_)) => {
                return Err(ShortcodeError::UnexpectedContent(name.to_string()));
            }
            (ShortcodeKind::Paired, None) => {
                return Err(ShortcodeError::MissingContent(name.to_string()));
            }
            _ => {}
        }

        if args.positional.len() > shortcode.params.len() {
            return Err(ShortcodeError::TooManyArguments {
                name: name.to_string(),
                max: shortcode.params.len(),
                given: args.positional.len(),
            });
        }

        trace!(name, args = ?args.positional, "invoking shortcode");

        (shortcode.render)(args)
    }
}
