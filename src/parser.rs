use pest::Parser as PestParser;
use thiserror::Error;

use crate::ast::*;
use crate::lexer::{split_statements, tokenize_statement};
use crate::normalize::normalize_implications;
use crate::resolve::{Directive, PrefixEnv};

mod grammar {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "term.pest"]
    pub struct LiteralGrammar;
}

pub use grammar::Rule as LiteralRule;
use grammar::LiteralGrammar;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("statement `{statement}` has {found} terms, expected 3")]
    Arity { statement: String, found: usize },
    #[error("malformed literal `{token}`")]
    MalformedLiteral {
        token: String,
        #[source]
        source: Box<pest::error::Error<LiteralRule>>,
    },
    #[error("variable without a name in `{0}`")]
    EmptyVariable(String),
    #[error("blank node without an id in `{0}`")]
    EmptyBlankNode(String),
    #[error("unbalanced braces near byte {0}")]
    UnbalancedBraces(usize),
    #[error("rule consequent must be a `{{...}}` formula near byte {0}")]
    MalformedRule(usize),
    #[error("malformed directive `{0}`")]
    MalformedDirective(String),
}

/// Parse a whole document: ground triples, `{A} => {B} .` rules and
/// `@forAll` / `@forSome` declarations.
pub fn parse_document(input: &str) -> Result<Document, ParseError> {
    let text = normalize(input);
    let (rest, blocks) = extract_rule_blocks(&text)?;

    let mut directives = vec![];
    let mut quantifiers = vec![];
    let mut statements = vec![];

    for stmt in split_statements(&rest) {
        let tokens = tokenize_statement(&stmt);
        if let Some(d) = Directive::from_tokens(&tokens)? {
            directives.push(d);
        } else {
            statements.push((stmt, tokens));
        }
    }

    let env = PrefixEnv::from_directives(&directives);

    let mut triples = vec![];
    for (stmt, tokens) in statements {
        if let Some(q) = parse_quantifier(&tokens, &env)? {
            quantifiers.push(q);
            continue;
        }
        triples.push(triple_from_tokens(&stmt, &tokens, &env)?);
    }

    let mut rules = vec![];
    for (premise, conclusion) in blocks {
        let antecedent = parse_formula_in(&premise, &env, &mut quantifiers)?;
        let consequent = parse_formula_in(&conclusion, &env, &mut quantifiers)?;
        rules.push(Rule {
            antecedent,
            consequent,
        });
    }

    let triples = normalize_implications(triples, &mut rules);

    // Declarations are not scoped: every rule formula of this call gets all of them.
    if !quantifiers.is_empty() {
        for rule in &mut rules {
            rule.antecedent.quantifiers = quantifiers.clone();
            rule.consequent.quantifiers = quantifiers.clone();
        }
    }

    Ok(Document {
        triples,
        rules,
        builtins: vec![],
    })
}

/// Parse a single term token with no prefix declarations in scope.
pub fn parse_term(token: &str) -> Result<Term, ParseError> {
    parse_term_in(token, &PrefixEnv::default())
}

/// Parse the inside of a `{ ... }` formula.
pub fn parse_formula(text: &str) -> Result<Formula, ParseError> {
    parse_formula_in(text, &PrefixEnv::default(), &mut vec![])
}

fn parse_formula_in(
    text: &str,
    env: &PrefixEnv,
    quantifiers: &mut Vec<Quantifier>,
) -> Result<Formula, ParseError> {
    let mut triples = vec![];
    for stmt in split_statements(text) {
        let tokens = tokenize_statement(&stmt);
        if let Some(q) = parse_quantifier(&tokens, env)? {
            quantifiers.push(q);
            continue;
        }
        triples.push(triple_from_tokens(&stmt, &tokens, env)?);
    }
    Ok(Formula::new(triples))
}

fn triple_from_tokens(
    stmt: &str,
    tokens: &[String],
    env: &PrefixEnv,
) -> Result<Triple, ParseError> {
    match tokens {
        [s, p, o] => Ok(Triple::new(
            parse_term_in(s, env)?,
            parse_term_in(p, env)?,
            parse_term_in(o, env)?,
        )),
        _ => Err(ParseError::Arity {
            statement: stmt.to_string(),
            found: tokens.len(),
        }),
    }
}

fn parse_quantifier(tokens: &[String], env: &PrefixEnv) -> Result<Option<Quantifier>, ParseError> {
    let kind = match tokens.first().map(String::as_str) {
        Some("@forAll") => QuantifierKind::ForAll,
        Some("@forSome") => QuantifierKind::ForSome,
        _ => return Ok(None),
    };

    let mut vars = vec![];
    for tok in &tokens[1..] {
        for name in tok.split(',').filter(|n| !n.is_empty()) {
            vars.push(parse_term_in(name, env)?);
        }
    }
    Ok(Some(Quantifier { kind, vars }))
}

fn parse_term_in(token: &str, env: &PrefixEnv) -> Result<Term, ParseError> {
    let token = token.trim();

    if token.len() >= 2 && token.starts_with('<') && token.ends_with('>') {
        return Ok(Term::Iri(env.resolve_iri(&token[1..token.len() - 1])));
    }
    if token.starts_with('"') {
        return parse_literal(token, env);
    }
    if let Some(name) = token.strip_prefix('?') {
        if name.is_empty() {
            return Err(ParseError::EmptyVariable(token.to_string()));
        }
        return Ok(Term::Variable(name.to_string()));
    }
    if let Some(id) = token.strip_prefix("_:") {
        if id.is_empty() {
            return Err(ParseError::EmptyBlankNode(token.to_string()));
        }
        return Ok(Term::BlankNode(id.to_string()));
    }
    if let Some(inner) = wrapped(token, '(', ')') {
        let items = tokenize_statement(inner)
            .iter()
            .map(|t| parse_term_in(t, env))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Term::List(items));
    }
    if let Some(inner) = wrapped(token, '{', '}') {
        return Ok(Term::Formula(parse_formula_in(inner, env, &mut vec![])?));
    }

    // Bare prefixed names and builtin URIs.
    Ok(Term::Iri(env.expand_name(token)))
}

/// The inside of `open ... close` when the opening char is balanced by the last one.
fn wrapped(token: &str, open: char, close: char) -> Option<&str> {
    if !(token.starts_with(open) && token.ends_with(close)) || token.len() < 2 {
        return None;
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in token.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if c == '"' {
            quote = Some(c);
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.saturating_sub(1);
            if depth == 0 && i + c.len_utf8() != token.len() {
                return None;
            }
        }
    }
    (depth == 0).then(|| &token[1..token.len() - 1])
}

fn parse_literal(token: &str, env: &PrefixEnv) -> Result<Term, ParseError> {
    let mut pairs = LiteralGrammar::parse(LiteralRule::literal, token).map_err(|e| {
        ParseError::MalformedLiteral {
            token: token.to_string(),
            source: Box::new(e),
        }
    })?;

    let mut value = String::new();
    let mut datatype = None;
    let mut language = None;

    if let Some(lit) = pairs.next() {
        for p in lit.into_inner() {
            match p.as_rule() {
                LiteralRule::lexical => value = unescape_string(p.as_str()),
                LiteralRule::datatype => {
                    if let Some(dt) = p.into_inner().next() {
                        datatype = Some(match dt.as_rule() {
                            LiteralRule::iri_ref => {
                                let body = dt.as_str();
                                env.resolve_iri(&body[1..body.len() - 1])
                            }
                            _ => env.expand_name(dt.as_str()),
                        });
                    }
                }
                LiteralRule::langtag => {
                    language = p.into_inner().next().map(|l| l.as_str().to_string());
                }
                _ => {}
            }
        }
    }

    Ok(Term::Literal {
        value,
        datatype,
        language,
    })
}

fn unescape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Drop `#` comments and squeeze whitespace runs to one space.
///
/// A `#` inside a quoted literal or an `<...>` IRI is not a comment.
fn normalize(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut in_iri = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;

        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            out.push(c);
            continue;
        }

        if in_iri {
            if c == '>' {
                in_iri = false;
            }
            out.push(c);
            continue;
        }

        match c {
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
            }
            '<' if chars.get(i).is_some_and(|n| !n.is_whitespace() && *n != '=') => {
                in_iri = true;
                out.push(c);
            }
            c if c.is_whitespace() => {
                if !out.ends_with(' ') && !out.is_empty() {
                    out.push(' ');
                }
            }
            c => out.push(c),
        }
    }

    out.trim_end().to_string()
}

/// Pull balanced `{A} => {B}` blocks out of normalized text.
///
/// Returns the text with the rule blocks blanked out, plus the inner text of
/// each premise / conclusion pair in document order.
fn extract_rule_blocks(text: &str) -> Result<(String, Vec<(String, String)>), ParseError> {
    let bytes = text.as_bytes();
    let mut rest = String::with_capacity(text.len());
    let mut blocks = vec![];
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    let mut i = 0;
    let mut copied = 0;

    while i < bytes.len() {
        let c = bytes[i];

        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == b'\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            b'"' | b'\'' => {
                quote = Some(c);
                i += 1;
            }
            b'}' => return Err(ParseError::UnbalancedBraces(i)),
            b'{' => {
                let premise_end = matching_brace(bytes, i)?;
                let mut j = skip_spaces(bytes, premise_end + 1);
                if !text[j..].starts_with("=>") {
                    // a formula term inside an ordinary statement
                    i = premise_end + 1;
                    continue;
                }
                j = skip_spaces(bytes, j + 2);
                if bytes.get(j) != Some(&b'{') {
                    return Err(ParseError::MalformedRule(j));
                }
                let conclusion_end = matching_brace(bytes, j)?;
                let mut end = skip_spaces(bytes, conclusion_end + 1);
                if bytes.get(end) == Some(&b'.') {
                    end += 1;
                }

                blocks.push((
                    text[i + 1..premise_end].to_string(),
                    text[j + 1..conclusion_end].to_string(),
                ));
                rest.push_str(&text[copied..i]);
                // keep the surrounding statements apart
                rest.push_str(" . ");
                copied = end;
                i = end;
            }
            _ => i += 1,
        }
    }

    rest.push_str(&text[copied..]);
    Ok((rest, blocks))
}

fn skip_spaces(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Index of the `}` closing the `{` at `open`, ignoring braces inside quotes.
fn matching_brace(bytes: &[u8], open: usize) -> Result<usize, ParseError> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (i, &c) in bytes.iter().enumerate().skip(open) {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == b'\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            b'"' | b'\'' => quote = Some(c),
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }

    Err(ParseError::UnbalancedBraces(open))
}
