use serde::Deserialize;

/// Class strings applied to rendered markup, keyed by node kind.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    pub heading: HeadingTheme,
    pub image: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HeadingTheme {
    pub level: HeadingLevels,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HeadingLevels {
    #[serde(rename = "1")]
    pub one: String,
    #[serde(rename = "2")]
    pub two: String,
    #[serde(rename = "3")]
    pub three: String,
    #[serde(rename = "4")]
    pub four: String,
    #[serde(rename = "5")]
    pub five: String,
    #[serde(rename = "6")]
    pub six: String,
}

impl ThemeConfig {
    pub fn heading_class(&self, level: u8) -> &str {
        let levels = &self.heading.level;
        match level {
            1 => &levels.one,
            2 => &levels.two,
            3 => &levels.three,
            4 => &levels.four,
            5 => &levels.five,
            6 => &levels.six,
            _ => "",
        }
    }
}

/// A markdown node as seen by a [`NodeVisitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node<'a> {
    /// `id`, `classes` and `attrs` come from a `{#id .class key=value}`
    /// block and are only set when entering.
    Heading {
        level: u8,
        id: Option<&'a str>,
        classes: &'a [&'a str],
        attrs: &'a [(&'a str, Option<&'a str>)],
    },
    Image { src: &'a str, alt: &'a str },
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// The visitor wrote the markup for this node.
    Handled,
    /// The default HTML writer renders this node.
    Deferred,
}

pub trait NodeVisitor {
    fn visit(&self, node: &Node<'_>, entering: bool, out: &mut String) -> Visit;
}

/// Leaves every node to the default HTML writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainVisitor;

impl NodeVisitor for PlainVisitor {
    fn visit(&self, _node: &Node<'_>, _entering: bool, _out: &mut String) -> Visit {
        Visit::Deferred
    }
}

/// Renders headings and images with the classes from a [`ThemeConfig`].
#[derive(Debug, Clone)]
pub struct ThemeRenderer {
    theme: ThemeConfig,
}

impl ThemeRenderer {
    pub fn new(theme: ThemeConfig) -> Self {
        Self { theme }
    }
}

impl NodeVisitor for ThemeRenderer {
    fn visit(&self, node: &Node<'_>, entering: bool, out: &mut String) -> Visit {
        match *node {
            Node::Heading {
                level,
                id,
                classes,
                attrs,
            } => {
                if entering {
                    out.push_str(&format!("<h{level}"));
                    if let Some(id) = id {
                        out.push_str(&format!(" id=\"{}\"", escape_attribute(id)));
                    }
                    let mut class = self.theme.heading_class(level).to_string();
                    for extra in classes {
                        if !class.is_empty() {
                            class.push(' ');
                        }
                        class.push_str(extra);
                    }
                    out.push_str(&class_attribute(&class));
                    for (key, value) in attrs {
                        out.push_str(&format!(
                            " {}=\"{}\"",
                            escape_attribute(key),
                            escape_attribute(value.unwrap_or_default())
                        ));
                    }
                    out.push('>');
                } else {
                    out.push_str(&format!("</h{level}>\n"));
                }
                Visit::Handled
            }
            Node::Image { src, alt } => {
                if entering {
                    out.push_str(&format!(
                        "<figure{}><img src=\"{}\"",
                        class_attribute(&self.theme.image),
                        escape_attribute(src)
                    ));
                    if !alt.is_empty() {
                        out.push_str(&format!(" alt=\"{}\"", escape_attribute(alt)));
                    }
                    out.push('>');
                } else {
                    out.push_str("</figure>");
                }
                Visit::Handled
            }
            Node::Other => Visit::Deferred,
        }
    }
}

fn class_attribute(class: &str) -> String {
    if class.is_empty() {
        String::new()
    } else {
        format!(" class=\"{}\"", escape_attribute(class))
    }
}

pub(crate) fn escape_attribute(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
