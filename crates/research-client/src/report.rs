use once_cell::sync::Lazy;
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use regex::Regex;

static WRAPPING_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md)?\s*\n(.*)\n```$")
        .unwrap_or_else(|e| panic!("invalid fence pattern: {e}"))
});

/// Removes an outer code fence wrapping the whole report.
///
/// Models often answer with the report inside ```` ```markdown ... ``` ````.
pub fn strip_wrapping_fence(report: &str) -> &str {
    let trimmed = report.trim();
    match WRAPPING_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// Sources of every fenced code block tagged `mermaid`, in document order.
pub fn mermaid_blocks(markdown: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<String> = None;
    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))
                if info.split_whitespace().next() == Some("mermaid") =>
            {
                current = Some(String::new());
            }
            Event::Text(text) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(mut chart) = current.take() {
                    if chart.ends_with('\n') {
                        chart.pop();
                    }
                    blocks.push(chart);
                }
            }
            _ => {}
        }
    }
    blocks
}
