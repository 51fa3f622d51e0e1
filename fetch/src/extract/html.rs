//! Main-content HTML → plain text.
//!
//! Picks the content root, drops boilerplate (tag, attribute, and class/id token
//! rules), keeps tables as ` | `-joined rows, and emits paragraphs separated by
//! blank lines. Comments are never emitted.

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use super::TextExtractor;
use crate::error::GateError;

/// A root candidate with at least this much non-whitespace text wins outright.
const ROOT_MIN_CHARS: usize = 50;

/// Class/id tokens marking boilerplate. Whole-token match: "nav" matches
/// `class="nav main"` but not `class="navigate"`.
const BOILERPLATE_TOKENS: &[&str] = &[
    "nav",
    "navbar",
    "navigation",
    "header",
    "footer",
    "sidebar",
    "menu",
    "breadcrumb",
    "breadcrumbs",
    "advertisement",
    "ad",
    "ads",
    "social",
    "share",
    "sharing",
    "comment",
    "comments",
    "related",
    "subscribe",
    "newsletter",
    "cookie",
    "cookies",
    "banner",
    "popup",
    "modal",
];

/// scraper-backed main-content extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct MainContentExtractor;

impl TextExtractor for MainContentExtractor {
    fn extract(&self, body: &[u8], _url: &Url) -> Result<String, GateError> {
        let html = String::from_utf8_lossy(body);
        Ok(main_content_text(&html))
    }
}

/// Extract the main text of an HTML document. Empty when nothing survives.
#[must_use]
pub fn main_content_text(html: &str) -> String {
    let html = html.strip_prefix('\u{FEFF}').unwrap_or(html);
    let document = Html::parse_document(html);

    let Some(root) = find_content_root(&document) else {
        return String::new();
    };

    let mut output = String::new();
    let mut preformatted = false;
    write_children(&mut output, root, &mut preformatted);
    normalize_blank_lines(&output)
}

/// First candidate (in priority order) with enough text, else the richest non-empty one.
fn find_content_root(document: &Html) -> Option<ElementRef<'_>> {
    let selectors = [
        "main",
        "article",
        "[role=\"main\"]",
        "#content",
        ".content",
        "body",
    ];

    let mut best: Option<(usize, ElementRef<'_>)> = None;

    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            let len = visible_text_len(element);
            if len >= ROOT_MIN_CHARS {
                return Some(element);
            }
            if len > 0 && best.as_ref().is_none_or(|(best_len, _)| len > *best_len) {
                best = Some((len, element));
            }
        }
    }

    best.map(|(_, element)| element)
}

fn visible_text_len(element: ElementRef<'_>) -> usize {
    if is_boilerplate(element) {
        return 0;
    }

    element
        .children()
        .map(|child| match child.value() {
            Node::Text(text) => text.chars().filter(|c| !c.is_whitespace()).count(),
            Node::Element(_) => ElementRef::wrap(child).map_or(0, visible_text_len),
            _ => 0,
        })
        .sum()
}

fn is_boilerplate(element: ElementRef<'_>) -> bool {
    let el = element.value();

    if matches!(
        el.name(),
        "script"
            | "style"
            | "noscript"
            | "nav"
            | "header"
            | "footer"
            | "aside"
            | "form"
            | "template"
            | "iframe"
            | "svg"
            | "object"
            | "embed"
            | "canvas"
            | "button"
            | "select"
            | "textarea"
            | "input"
    ) {
        return true;
    }

    if el.attr("hidden").is_some()
        || el.attr("aria-hidden") == Some("true")
        || el.attr("role") == Some("navigation")
    {
        return true;
    }

    el.attr("class").is_some_and(has_boilerplate_token)
        || el.attr("id").is_some_and(has_boilerplate_token)
}

fn has_boilerplate_token(attr: &str) -> bool {
    attr.to_lowercase()
        .split_whitespace()
        .any(|token| BOILERPLATE_TOKENS.contains(&token))
}

fn write_children(output: &mut String, element: ElementRef<'_>, preformatted: &mut bool) {
    for child in element.children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    write_element(output, el, preformatted);
                }
            }
            Node::Text(text) => {
                if *preformatted {
                    output.push_str(text);
                } else {
                    push_inline(output, text);
                }
            }
            _ => {}
        }
    }
}

fn write_element(output: &mut String, element: ElementRef<'_>, preformatted: &mut bool) {
    if is_boilerplate(element) {
        return;
    }

    match element.value().name() {
        "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "blockquote" | "figcaption" | "dt"
        | "dd" | "address" => {
            ensure_blank_line(output);
            write_children(output, element, preformatted);
            ensure_blank_line(output);
        }
        "div" | "section" | "article" | "main" | "figure" | "ul" | "ol" | "dl" => {
            ensure_line_break(output);
            write_children(output, element, preformatted);
            ensure_line_break(output);
        }
        "li" => {
            ensure_line_break(output);
            output.push_str("- ");
            write_children(output, element, preformatted);
            ensure_line_break(output);
        }
        "pre" => {
            ensure_blank_line(output);
            let was = *preformatted;
            *preformatted = true;
            write_children(output, element, preformatted);
            *preformatted = was;
            ensure_blank_line(output);
        }
        "table" => write_table(output, element),
        "br" => output.push('\n'),
        "hr" => ensure_blank_line(output),
        "img" | "video" | "audio" | "source" | "track" | "map" | "area" => {}
        _ => write_children(output, element, preformatted),
    }
}

/// One line per row, cells joined by ` | `.
fn write_table(output: &mut String, table: ElementRef<'_>) {
    let Ok(row_selector) = Selector::parse("tr") else {
        return;
    };
    let Ok(cell_selector) = Selector::parse("th, td") else {
        return;
    };

    let rows: Vec<String> = table
        .select(&row_selector)
        .map(|tr| {
            tr.select(&cell_selector)
                .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .filter(|row| !row.replace('|', "").trim().is_empty())
        .collect();

    if rows.is_empty() {
        return;
    }

    ensure_blank_line(output);
    for row in rows {
        output.push_str(&row);
        output.push('\n');
    }
    output.push('\n');
}

/// Append text with runs of whitespace collapsed to one space.
fn push_inline(output: &mut String, text: &str) {
    let collapsed = collapse_whitespace(text);
    let starts_ws = text.chars().next().is_some_and(char::is_whitespace);
    let ends_ws = text.chars().last().is_some_and(char::is_whitespace);

    if (starts_ws || collapsed.is_empty()) && !output.is_empty() && !output.ends_with([' ', '\n'])
    {
        output.push(' ');
    }
    if collapsed.is_empty() {
        return;
    }
    output.push_str(&collapsed);
    if ends_ws {
        output.push(' ');
    }
}

fn ensure_line_break(output: &mut String) {
    trim_trailing_spaces(output);
    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
}

fn ensure_blank_line(output: &mut String) {
    trim_trailing_spaces(output);
    if output.is_empty() {
        return;
    }
    let trailing = output.chars().rev().take_while(|&c| c == '\n').count();
    for _ in trailing..2 {
        output.push('\n');
    }
}

fn trim_trailing_spaces(output: &mut String) {
    let trimmed = output.trim_end_matches([' ', '\t']).len();
    output.truncate(trimmed);
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim each line, drop runs of blank lines to one, trim the ends.
fn normalize_blank_lines(s: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = true;

    for line in s.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            if !previous_blank {
                lines.push("");
            }
            previous_blank = true;
        } else {
            lines.push(line);
            previous_blank = false;
        }
    }

    while lines.last() == Some(&"") {
        lines.pop();
    }
    lines.join("\n")
}
