//! A tiny HTML builder for the fragments that shortcodes emit.

use std::fmt::Write;

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(HtmlElement),
    /// Text that is escaped when rendered.
    Text(String),
    /// Markup that is written out as-is.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlElement {
    pub tag_name: String,
    pub children: Vec<Node>,
    pub attrs: IndexMap<String, String>,
}

impl HtmlElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag_name: tag.into(),
            children: Vec::new(),
            attrs: IndexMap::new(),
        }
    }

    fn attr<V>(mut self, name: impl Into<String>, value: impl Into<Option<V>>) -> Self
    where
        V: Into<String>,
    {
        let name = name.into();
        match value.into() {
            Some(value) => {
                *self.attrs.entry(name).or_default() = value.into();
            }
            None => {
                self.attrs.shift_remove(&name);
            }
        }

        self
    }

    pub fn child(mut self, child: HtmlElement) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = HtmlElement>) -> Self {
        self.children.extend(children.into_iter().map(Node::Element));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn raw(mut self, markup: impl Into<String>) -> Self {
        self.children.push(Node::Raw(markup.into()));
        self
    }

    pub fn render_to_string(&self) -> Result<String, std::fmt::Error> {
        let mut html = String::new();
        self.render_into(&mut html)?;

        Ok(html)
    }

    fn render_into(&self, html: &mut String) -> std::fmt::Result {
        write!(html, "<{}", self.tag_name)?;

        for (name, value) in &self.attrs {
            write!(html, " ")?;
            if value.is_empty() {
                write!(html, "{name}")?;
            } else {
                write!(html, r#"{name}="{}""#, escape(value))?;
            }
        }

        write!(html, ">")?;

        for child in &self.children {
            match child {
                Node::Element(element) => element.render_into(html)?,
                Node::Text(text) => write!(html, "{}", escape(text))?,
                Node::Raw(markup) => write!(html, "{markup}")?,
            }
        }

        write!(html, "</{}>", self.tag_name)?;

        Ok(())
    }
}

impl HtmlElement {
    pub fn id<V>(self, id: impl Into<Option<V>>) -> Self
    where
        V: Into<String>,
    {
        self.attr("id", id)
    }

    pub fn class<V>(self, class: impl Into<Option<V>>) -> Self
    where
        V: Into<String>,
    {
        self.attr("class", class)
    }

    pub fn href<V>(self, href: impl Into<Option<V>>) -> Self
    where
        V: Into<String>,
    {
        self.attr("href", href)
    }

    pub fn role<V>(self, role: impl Into<Option<V>>) -> Self
    where
        V: Into<String>,
    {
        self.attr("role", role)
    }

    /// Toggles the boolean `open` attribute, rendered without a value.
    pub fn open(self, open: bool) -> Self {
        self.attr::<&str>("open", open.then_some(""))
    }
}

/// Escapes text for use in element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for char in text.chars() {
        match char {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            char => escaped.push(char),
        }
    }

    escaped
}

pub fn a() -> HtmlElement {
    HtmlElement::new("a")
}

pub fn div() -> HtmlElement {
    HtmlElement::new("div")
}

pub fn p() -> HtmlElement {
    HtmlElement::new("p")
}

pub fn details() -> HtmlElement {
    HtmlElement::new("details")
}

pub fn summary() -> HtmlElement {
    HtmlElement::new("summary")
}
