//! Turns exported documents into ordered, normalized text lines.
//!
//! HTML exports put one log entry per `<br>`-terminated run of text, with
//! decorative `<font>`/`<b>` markup inside the run. Block elements also end a
//! line, which is a no-op for documents that only use `<br>`.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Node, Selector};

lazy_static! {
    static ref ROW: Selector = Selector::parse("tr").unwrap();
}

/// Elements whose text never belongs to the log.
const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style", "title"];

/// Elements that start and end a line of their own.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "tr", "li", "ul", "ol", "table", "pre", "h1", "h2", "h3", "h4", "h5", "h6",
    "hr", "center", "blockquote",
];

/// Ordered lines of one document. Iterating never consumes them, so any stage
/// can walk the sequence again from the start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogLines {
    lines: Vec<String>,
}

impl LogLines {
    /// Extract lines from an HTML document.
    pub fn from_html(markup: &str) -> Self {
        let document = Html::parse_document(markup);
        let mut builder = LineBuilder::default();
        walk(document.root_element(), &mut builder);
        builder.finish()
    }

    /// Extract lines from a plain-text log.
    pub fn from_text(text: &str) -> Self {
        Self::from_lines(text.lines())
    }

    /// Build from already-split lines, applying the same normalization.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines = lines
            .into_iter()
            .map(|line| normalize_line(line.as_ref()))
            .filter(|line| !line.is_empty())
            .collect();
        Self { lines }
    }

    /// Pick HTML or plain-text extraction based on the content.
    pub fn from_document(content: &str) -> Self {
        if looks_like_markup(content) {
            Self::from_html(content)
        } else {
            Self::from_text(content)
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl<'a> IntoIterator for &'a LogLines {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

#[derive(Default)]
struct LineBuilder {
    current: String,
    lines: Vec<String>,
}

impl LineBuilder {
    fn push_text(&mut self, text: &str) {
        self.current.push_str(text);
    }

    fn break_line(&mut self) {
        let line = normalize_line(&self.current);
        self.current.clear();
        if !line.is_empty() {
            self.lines.push(line);
        }
    }

    fn finish(mut self) -> LogLines {
        self.break_line();
        LogLines { lines: self.lines }
    }
}

fn walk(element: ElementRef<'_>, builder: &mut LineBuilder) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => builder.push_text(text),
            Node::Element(el) => {
                let name = el.name();
                if name == "br" {
                    builder.break_line();
                    continue;
                }
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    builder.break_line();
                }
                if let Some(child_element) = ElementRef::wrap(child) {
                    walk(child_element, builder);
                }
                if block {
                    builder.break_line();
                }
            }
            _ => {}
        }
    }
}

/// Normalized text content of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
    normalize_line(&element.text().collect::<String>())
}

/// `td`/`th` children of a table row.
pub fn row_cells<'a>(row: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        .collect()
}

/// Rows of the same table that come after `header`, skipping rows of nested
/// tables.
pub fn rows_after<'a>(header: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let Some(table) = enclosing_table(header) else {
        return Vec::new();
    };
    table
        .select(&ROW)
        .skip_while(|row| row.id() != header.id())
        .skip(1)
        .filter(|row| enclosing_table(*row).map(|t| t.id()) == Some(table.id()))
        .collect()
}

fn enclosing_table(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "table")
}

/// Replace non-breaking spaces, collapse whitespace runs and trim.
pub fn normalize_line(raw: &str) -> String {
    let replaced = raw
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace('\u{a0}', " ");
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cheap sniff for HTML content.
pub fn looks_like_markup(content: &str) -> bool {
    let head: String = content
        .chars()
        .take(4096)
        .collect::<String>()
        .to_ascii_lowercase();
    ["<html", "<body", "<br", "<!doctype", "<table", "<p>", "<font"]
        .iter()
        .any(|tag| head.contains(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_br_delimited_lines() {
        let html = "<html><body>Month 1, Day 1<br>Tom - Moved to <b>Borderland</b> 4<br></body></html>";
        let lines = LogLines::from_html(html);
        let collected: Vec<&str> = lines.iter().map(String::as_str).collect();
        assert_eq!(collected, vec!["Month 1, Day 1", "Tom - Moved to Borderland 4"]);
    }

    #[test]
    fn test_nbsp_and_whitespace_collapse() {
        let html = "<body><font color=red>&nbsp;&nbsp;RealmSpeak&nbsp;-&nbsp;\n   Hello</font><br/><br/>&nbsp;<br></body>";
        let lines = LogLines::from_html(html);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.iter().next().unwrap(), "RealmSpeak - Hello");
    }

    #[test]
    fn test_head_and_script_skipped() {
        let html = "<html><head><title>Game Log</title><script>var x = 1;</script></head><body>Tom - Hides<br></body></html>";
        let lines = LogLines::from_html(html);
        let collected: Vec<&str> = lines.iter().map(String::as_str).collect();
        assert_eq!(collected, vec!["Tom - Hides"]);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let lines = LogLines::from_text("a\n\n  b  \nc");
        let first: Vec<&String> = lines.iter().collect();
        let second: Vec<&String> = (&lines).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_rows_after_header_skip_nested_tables() {
        let html = "<table><tr><th>Month</th><th>Day</th></tr>\
            <tr><td>1</td><td><table><tr><td>nested</td></tr></table></td></tr>\
            <tr><td>2</td><td>5</td></tr></table>";
        let document = Html::parse_document(html);
        let header = document.select(&ROW).next().unwrap();
        let rows = rows_after(header);
        assert_eq!(rows.len(), 2);
        let cells = row_cells(rows[1]);
        assert_eq!(element_text(cells[0]), "2");
        assert_eq!(element_text(cells[1]), "5");
    }

    #[test]
    fn test_from_document_sniffs_markup() {
        assert!(looks_like_markup("<HTML><BODY>x</BODY></HTML>"));
        assert!(!looks_like_markup("Month 1, Day 1\nTom - Hides"));
        let lines = LogLines::from_document("Month 1, Day 1\r\nTom - Hides\r\n");
        assert_eq!(lines.len(), 2);
    }
}
