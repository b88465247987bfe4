use once_cell::sync::Lazy;
use regex::{Captures, Regex};

struct DelimiterFamily {
    open: char,
    close: char,
    /// Characters of the other two families; their presence in a label signals a collision.
    foreign: [char; 4],
    pattern: Regex,
}

impl DelimiterFamily {
    fn new(open: char, close: char, foreign: [char; 4], pattern: &str) -> Self {
        Self {
            open,
            close,
            foreign,
            // Patterns are compile-time constants covered by the tests below.
            pattern: Regex::new(pattern).unwrap_or_else(|e| panic!("invalid label pattern: {e}")),
        }
    }

    fn rewrite(&self, caps: &Captures<'_>) -> String {
        let (opens, inner, closes) = (&caps[1], &caps[2], &caps[3]);
        let single = opens.len() == 1 && closes.len() == 1;
        if single && inner.contains(self.foreign) && !is_quoted(inner) {
            format!("{}\"{}\"{}", self.open, inner, self.close)
        } else {
            caps[0].to_string()
        }
    }
}

static FAMILIES: Lazy<[DelimiterFamily; 3]> = Lazy::new(|| {
    [
        DelimiterFamily::new('[', ']', ['(', ')', '{', '}'], r"(\[+)([^\[\]\n]*)(\]+)"),
        DelimiterFamily::new('(', ')', ['[', ']', '{', '}'], r"(\(+)([^()\n]*)(\)+)"),
        DelimiterFamily::new('{', '}', ['[', ']', '(', ')'], r"(\{+)([^{}\n]*)(\}+)"),
    ]
});

fn is_quoted(inner: &str) -> bool {
    let trimmed = inner.trim();
    trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"')
}

/// Quotes node labels whose text would otherwise be read as nested shape syntax.
///
/// `A[call(x)]` becomes `A["call(x)"]`. Doubled shapes (`[[..]]`, `((..))`,
/// `{{..}}`) and already-quoted labels are left as they are. Quotes inside a
/// label are not escaped.
pub fn sanitize(source: &str) -> String {
    FAMILIES.iter().fold(source.to_string(), |text, family| {
        family
            .pattern
            .replace_all(&text, |caps: &Captures<'_>| family.rewrite(caps))
            .into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_bracket_label_containing_parens() {
        assert_eq!(sanitize("A[txt(x)] --> B"), "A[\"txt(x)\"] --> B");
    }

    #[test]
    fn quotes_each_family() {
        let src = "A(run [fast]) --> B{is f(x) ok?}\nB --> C[map{k}]";
        assert_eq!(
            sanitize(src),
            "A(\"run [fast]\") --> B{\"is f(x) ok?\"}\nB --> C[\"map{k}\"]"
        );
    }

    #[test]
    fn plain_labels_are_untouched() {
        let src = "graph TD\n  A[Start] --> B(Process) --> C{Decide}";
        assert_eq!(sanitize(src), src);
    }

    #[test]
    fn doubled_shapes_are_byte_identical() {
        let src = "A[[Start (init)]] --> B((End [x])) --> C{{Decision (y)}}";
        assert_eq!(sanitize(src), src);
    }

    #[test]
    fn already_quoted_labels_are_not_requoted() {
        let src = "A[\"txt(x)\"] --> B( \"see [1]\" )";
        assert_eq!(sanitize(src), src);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "A[txt(x)] --> B(g[y])",
            "A(p [q(r)] s) --> B{x(y)}",
            "A[x{y}] --> B[[Start]] --> C((End))",
            "%%{init: {'theme':'dark'}}%%\nflowchart LR\n  X[fetch(url)] --> Y{ok?}",
            "sequenceDiagram\n  A->>B: call(x)",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input: {input}");
        }
    }

    #[test]
    fn labels_do_not_span_lines() {
        let src = "A[open\nB(close)]";
        assert_eq!(sanitize(src), src);
    }
}
