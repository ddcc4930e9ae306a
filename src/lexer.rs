//! Statement splitting and per-statement tokenizing.
//!
//! Both passes share one nesting tracker so that separators inside quoted
//! literals, lists, formulas or `<...>` IRIs are never taken for boundaries.
//! Neither pass reports errors: an unterminated quote or paren simply runs to
//! the end of the input and the parser rejects whatever comes out.

#[derive(Debug, Default)]
struct Nesting {
    quote: Option<char>,
    escaped: bool,
    paren: usize,
    bracket: usize,
    brace: usize,
    angle: usize,
}

impl Nesting {
    fn at_top(&self) -> bool {
        self.quote.is_none()
            && self.paren == 0
            && self.bracket == 0
            && self.brace == 0
            && self.angle == 0
    }

    fn feed(&mut self, c: char, next: Option<char>) {
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == q {
                self.quote = None;
            }
            return;
        }

        match c {
            '"' | '\'' => self.quote = Some(c),
            '(' => self.paren += 1,
            ')' => self.paren = self.paren.saturating_sub(1),
            '[' => self.bracket += 1,
            ']' => self.bracket = self.bracket.saturating_sub(1),
            '{' => self.brace += 1,
            '}' => self.brace = self.brace.saturating_sub(1),
            '<' if opens_iri(next) => self.angle += 1,
            '>' if self.angle > 0 => self.angle -= 1,
            _ => {}
        }
    }
}

/// `<` starts an IRI unless it is the `<=` operator or a lone comparison.
fn opens_iri(next: Option<char>) -> bool {
    matches!(next, Some(n) if !n.is_whitespace() && n != '=')
}

fn is_boundary(c: char) -> bool {
    c == '.' || c == ';' || c == '\n'
}

fn flush(buf: &mut String, out: &mut Vec<String>) {
    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    buf.clear();
}

/// Split raw text into top-level statements at `.`, `;` or newline.
pub fn split_statements(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut nesting = Nesting::default();
    let mut out = Vec::new();
    let mut buf = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if nesting.at_top() && is_boundary(c) {
            flush(&mut buf, &mut out);
            continue;
        }
        nesting.feed(c, chars.get(i + 1).copied());
        buf.push(c);
    }
    flush(&mut buf, &mut out);

    out
}

/// Split one statement into term tokens on whitespace at zero depth.
///
/// A parenthesized list is always a single token, even when it touches the
/// previous token (`<a>(1 2)`).
pub fn tokenize_statement(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut nesting = Nesting::default();
    let mut out = Vec::new();
    let mut buf = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if nesting.at_top() {
            if c.is_whitespace() {
                flush(&mut buf, &mut out);
                continue;
            }
            if c == '(' {
                flush(&mut buf, &mut out);
            }
        }
        nesting.feed(c, chars.get(i + 1).copied());
        buf.push(c);
        if c == ')' && nesting.at_top() {
            flush(&mut buf, &mut out);
        }
    }
    flush(&mut buf, &mut out);

    out
}
