use crate::error::{IoContext, Result, SquatchError};
use crate::theme::{Node, NodeVisitor, PlainVisitor, Visit};
use crate::types::Page;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use std::fs;
use std::path::Path;

const TITLE_MARKER: &str = "[_metadata_:title]:-";
const LAYOUT_MARKER: &str = "[_metadata_:layout]:-";

/// Markdown to HTML conversion with a [`NodeVisitor`] deciding the markup
/// for each node before the default writer sees it.
pub struct MarkdownRenderer<V = PlainVisitor> {
    visitor: V,
}

impl<V: NodeVisitor> MarkdownRenderer<V> {
    pub fn new(visitor: V) -> Self {
        Self { visitor }
    }

    pub fn render(&self, content: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        let events: Vec<Event<'_>> = Parser::new_ext(content, options).collect();
        let mut output = Vec::with_capacity(events.len());
        let mut index = 0;

        while index < events.len() {
            match &events[index] {
                Event::Start(Tag::Image { dest_url, .. }) => {
                    let end = image_end(&events, index);
                    let alt = alt_text(&events[index + 1..end]);
                    let node = Node::Image {
                        src: dest_url.as_ref(),
                        alt: &alt,
                    };

                    let mut open = String::new();
                    if self.visitor.visit(&node, true, &mut open) == Visit::Handled {
                        let mut close = String::new();
                        self.visitor.visit(&node, false, &mut close);
                        output.push(Event::InlineHtml(open.into()));
                        output.push(Event::InlineHtml(close.into()));
                    } else {
                        output.extend(events[index..=end].iter().cloned());
                    }

                    index = end + 1;
                    continue;
                }
                Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                }) => {
                    let classes: Vec<&str> = classes.iter().map(|class| class.as_ref()).collect();
                    let attrs: Vec<(&str, Option<&str>)> = attrs
                        .iter()
                        .map(|(key, value)| (key.as_ref(), value.as_deref()))
                        .collect();
                    let node = Node::Heading {
                        level: *level as u8,
                        id: id.as_deref(),
                        classes: &classes,
                        attrs: &attrs,
                    };
                    self.emit(&node, true, &events[index], &mut output);
                }
                Event::End(TagEnd::Heading(level)) => {
                    let node = Node::Heading {
                        level: *level as u8,
                        id: None,
                        classes: &[],
                        attrs: &[],
                    };
                    self.emit(&node, false, &events[index], &mut output);
                }
                Event::End(_) => self.emit(&Node::Other, false, &events[index], &mut output),
                _ => self.emit(&Node::Other, true, &events[index], &mut output),
            }
            index += 1;
        }

        let mut html_output = String::new();
        pulldown_cmark::html::push_html(&mut html_output, output.into_iter());
        html_output
    }

    fn emit<'a>(
        &self,
        node: &Node<'_>,
        entering: bool,
        event: &Event<'a>,
        output: &mut Vec<Event<'a>>,
    ) {
        let mut fragment = String::new();
        match self.visitor.visit(node, entering, &mut fragment) {
            Visit::Handled => output.push(Event::Html(fragment.into())),
            Visit::Deferred => output.push(event.clone()),
        }
    }
}

/// Index of the `End(Image)` matching the `Start(Image)` at `start`.
fn image_end(events: &[Event<'_>], start: usize) -> usize {
    let mut depth = 0usize;
    for (index, event) in events.iter().enumerate().skip(start) {
        match event {
            Event::Start(Tag::Image { .. }) => depth += 1,
            Event::End(TagEnd::Image) => {
                depth -= 1;
                if depth == 0 {
                    return index;
                }
            }
            _ => {}
        }
    }
    events.len() - 1
}

fn alt_text(events: &[Event<'_>]) -> String {
    let mut alt = String::new();
    for event in events {
        match event {
            Event::Text(text) | Event::Code(text) => alt.push_str(text),
            Event::SoftBreak | Event::HardBreak => alt.push(' '),
            _ => {}
        }
    }
    alt
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub title: Option<String>,
    pub layout: Option<String>,
}

fn is_metadata_line(line: &str) -> bool {
    line.starts_with(TITLE_MARKER) || line.starts_with(LAYOUT_MARKER)
}

/// `content` without its metadata lines, so markers never reach the
/// rendered body whatever text surrounds them.
pub fn strip_metadata(content: &str) -> String {
    content
        .lines()
        .filter(|line| !is_metadata_line(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Scans every line for the title and layout markers. The first line
/// carrying a marker decides that field.
pub fn extract_metadata(content: &str) -> Metadata {
    let mut metadata = Metadata::default();

    for line in content.lines() {
        if metadata.title.is_none()
            && let Some(rest) = line.strip_prefix(TITLE_MARKER)
        {
            metadata.title = Some(quoted_value(rest).to_string());
        } else if metadata.layout.is_none()
            && let Some(rest) = line.strip_prefix(LAYOUT_MARKER)
        {
            metadata.layout = Some(quoted_value(rest).to_string());
        }

        if metadata.title.is_some() && metadata.layout.is_some() {
            break;
        }
    }

    metadata
}

fn quoted_value(rest: &str) -> &str {
    match rest.split_once('"') {
        Some((_, after)) => after.split_once('"').map_or(after, |(value, _)| value),
        None => "",
    }
}

/// Reads and renders one markdown document.
///
/// Fails with the recoverable [`SquatchError::MissingField`] when the
/// document has no title or layout marker.
pub fn parse_page<V: NodeVisitor>(path: &Path, renderer: &MarkdownRenderer<V>) -> Result<Page> {
    let bytes = fs::read(path).io_context("reading page", path)?;
    let content = String::from_utf8_lossy(&bytes);

    let body = renderer.render(&strip_metadata(&content));
    let metadata = extract_metadata(&content);

    let page = Page {
        title: metadata.title.unwrap_or_default(),
        body,
        layout: metadata.layout.unwrap_or_default(),
        source_path: path.to_path_buf(),
    };

    if page.title.is_empty() {
        return Err(SquatchError::MissingField {
            field: "title",
            path: path.to_path_buf(),
        });
    }
    if page.layout.is_empty() {
        return Err(SquatchError::MissingField {
            field: "layout",
            path: path.to_path_buf(),
        });
    }

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{ThemeConfig, ThemeRenderer};
    use tempfile::TempDir;

    fn themed() -> MarkdownRenderer<ThemeRenderer> {
        let theme: ThemeConfig = serde_json::from_str(
            r#"{
                "heading": { "level": {
                    "1": "h-one", "2": "h-two", "3": "h-three",
                    "4": "h-four", "5": "h-five", "6": "h-six"
                } },
                "image": "photo"
            }"#,
        )
        .unwrap();
        MarkdownRenderer::new(ThemeRenderer::new(theme))
    }

    #[test]
    fn test_headings_carry_level_classes_in_order() {
        let input = "# One\n## Two\n### Three\n#### Four\n##### Five\n###### Six";
        let output = themed().render(input);

        let expected = [
            "<h1 class=\"h-one\">One</h1>",
            "<h2 class=\"h-two\">Two</h2>",
            "<h3 class=\"h-three\">Three</h3>",
            "<h4 class=\"h-four\">Four</h4>",
            "<h5 class=\"h-five\">Five</h5>",
            "<h6 class=\"h-six\">Six</h6>",
        ];
        let mut cursor = 0;
        for fragment in expected {
            let found = output[cursor..]
                .find(fragment)
                .unwrap_or_else(|| panic!("{fragment} missing or out of order in {output}"));
            cursor += found + fragment.len();
        }
    }

    #[test]
    fn test_plain_renderer_keeps_default_headings() {
        let output = MarkdownRenderer::new(PlainVisitor).render("# Heading One\n## Heading Two");
        let compact: String = output.chars().filter(|c| !c.is_whitespace()).collect();
        assert_eq!(compact, "<h1>HeadingOne</h1><h2>HeadingTwo</h2>");
    }

    #[test]
    fn test_image_with_alt() {
        let output = themed().render("![A red fox](img/fox.jpg)");
        assert!(output.contains(
            "<figure class=\"photo\"><img src=\"img/fox.jpg\" alt=\"A red fox\"></figure>"
        ));
    }

    #[test]
    fn test_image_without_alt() {
        let output = themed().render("![](img/fox.jpg)");
        assert!(output.contains("<figure class=\"photo\"><img src=\"img/fox.jpg\"></figure>"));
        assert!(!output.contains("alt="));
    }

    #[test]
    fn test_other_nodes_use_default_markup() {
        let output = themed().render("Some **bold** text\n\n- item");
        assert!(output.contains("<p>Some <strong>bold</strong> text</p>"));
        assert!(output.contains("<li>item</li>"));
    }

    #[test]
    fn test_extract_metadata() {
        let content =
            "[_metadata_:title]:- \"Example page title\"\n[_metadata_:layout]:- \"pages\"\n\n# Body";
        let metadata = extract_metadata(content);
        assert_eq!(metadata.title.as_deref(), Some("Example page title"));
        assert_eq!(metadata.layout.as_deref(), Some("pages"));
    }

    #[test]
    fn test_first_title_wins() {
        let content = "[_metadata_:title]:- \"First\"\ntext\n[_metadata_:title]:- \"Second\"";
        assert_eq!(extract_metadata(content).title.as_deref(), Some("First"));
    }

    #[test]
    fn test_metadata_without_closing_quote() {
        let content = "[_metadata_:layout]:- \"open ended";
        assert_eq!(extract_metadata(content).layout.as_deref(), Some("open ended"));
    }

    #[test]
    fn test_strip_metadata() {
        let content = "[_metadata_:title]:- \"Hidden\"\n[_metadata_:layout]:- \"pages\"\n\nVisible";
        assert_eq!(strip_metadata(content), "\nVisible");
    }

    #[test]
    fn test_metadata_after_paragraph_is_not_rendered() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("intro.md");
        fs::write(
            &path,
            "Some intro\n[_metadata_:title]:- \"T\" trailing\n[_metadata_:layout]:- \"pages\"\n",
        )
        .unwrap();

        let page = parse_page(&path, &MarkdownRenderer::new(PlainVisitor)).unwrap();
        assert_eq!(page.title, "T");
        assert_eq!(page.layout, "pages");
        assert_eq!(page.body, "<p>Some intro</p>\n");
    }

    #[test]
    fn test_heading_attributes_are_kept() {
        let output = themed().render("# Intro {#intro .lead}\n");
        assert_eq!(output, "<h1 id=\"intro\" class=\"h-one lead\">Intro</h1>\n");

        let plain = MarkdownRenderer::new(PlainVisitor).render("## Intro {#intro .lead}\n");
        assert_eq!(plain, "<h2 id=\"intro\" class=\"lead\">Intro</h2>\n");
    }

    #[test]
    fn test_parse_page() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("example.md");
        fs::write(
            &path,
            "[_metadata_:title]:- \"Example page title\"\n[_metadata_:layout]:- \"pages\"\n\n# Hello",
        )
        .unwrap();

        let page = parse_page(&path, &themed()).unwrap();
        assert_eq!(page.title, "Example page title");
        assert_eq!(page.layout, "pages");
        assert_eq!(page.source_path, path);
        assert!(page.body.contains("<h1 class=\"h-one\">Hello</h1>"));
    }

    #[test]
    fn test_parse_page_missing_title() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("README.md");
        fs::write(&path, "[_metadata_:layout]:- \"pages\"\n\n# Readme").unwrap();

        let error = parse_page(&path, &themed()).unwrap_err();
        assert!(matches!(
            error,
            SquatchError::MissingField { field: "title", .. }
        ));
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_parse_page_missing_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("draft.md");
        fs::write(&path, "[_metadata_:title]:- \"Draft\"\n\nText").unwrap();

        let error = parse_page(&path, &themed()).unwrap_err();
        assert!(matches!(
            error,
            SquatchError::MissingField { field: "layout", .. }
        ));
    }

    #[test]
    fn test_parse_page_unreadable_is_fatal() {
        let dir = TempDir::new().unwrap();
        let error = parse_page(&dir.path().join("missing.md"), &themed()).unwrap_err();
        assert!(!error.is_recoverable());
    }
}
