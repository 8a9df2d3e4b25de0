//! Title and paragraph extraction from a fetched HTML page.

use scraper::{ElementRef, Html, Node, Selector};

use curator_shared::{CuratorError, FetchConfig, Result};

use crate::FetchedDocument;

/// Separator placed between extracted paragraphs.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// CSS selectors driving extraction.
///
/// Stored as source strings and validated up front; `scraper::Html` is not
/// `Send`, so parsing happens inside [`extract_document`] on the caller's thread.
#[derive(Debug, Clone)]
pub struct Selectors {
    title: String,
    content: String,
    paragraph: String,
}

impl Selectors {
    /// Validate and wrap the three selectors.
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        paragraph: impl Into<String>,
    ) -> Result<Self> {
        let selectors = Self {
            title: title.into(),
            content: content.into(),
            paragraph: paragraph.into(),
        };
        for source in [&selectors.title, &selectors.content, &selectors.paragraph] {
            parse_selector(source)?;
        }
        Ok(selectors)
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        Self::new(
            &config.title_selector,
            &config.content_selector,
            &config.paragraph_selector,
        )
    }
}

fn parse_selector(source: &str) -> Result<Selector> {
    Selector::parse(source)
        .map_err(|e| CuratorError::config(format!("invalid CSS selector {source:?}: {e}")))
}

/// Extract the title and paragraph body from an HTML document.
///
/// Fails when no title can be found or the content region is missing.
/// A region without non-empty paragraphs yields an empty body.
pub fn extract_document(html: &str, selectors: &Selectors) -> Result<FetchedDocument> {
    let doc = Html::parse_document(html);

    let title = extract_title(&doc, &selectors.title)?
        .ok_or_else(|| CuratorError::parse("no title found on page"))?;

    let content_sel = parse_selector(&selectors.content)?;
    let region = doc.select(&content_sel).next().ok_or_else(|| {
        CuratorError::parse(format!(
            "content region `{}` not found on page",
            selectors.content
        ))
    })?;

    let paragraph_sel = parse_selector(&selectors.paragraph)?;
    let body = region
        .select(&paragraph_sel)
        .map(|p| element_text(&p))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(PARAGRAPH_SEPARATOR);

    Ok(FetchedDocument { title, body })
}

/// Title from the configured selector, then the first `<h1>`, then `<title>`.
fn extract_title(doc: &Html, title_selector: &str) -> Result<Option<String>> {
    for source in [title_selector, "h1", "title"] {
        let sel = parse_selector(source)?;
        if let Some(text) = doc
            .select(&sel)
            .map(|el| element_text(&el))
            .find(|text| !text.is_empty())
        {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

/// Rendered text of an element: `<br>` becomes a line break, source
/// whitespace inside each line is collapsed, and the ends are trimmed.
fn element_text(el: &ElementRef<'_>) -> String {
    let mut lines = vec![String::new()];
    for node in el.descendants() {
        match node.value() {
            Node::Text(text) => {
                if let Some(line) = lines.last_mut() {
                    line.push_str(text);
                }
            }
            Node::Element(e) if e.name() == "br" => lines.push(String::new()),
            _ => {}
        }
    }
    lines
        .iter()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
