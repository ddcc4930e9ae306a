use std::collections::HashMap;

use crate::parser::ParseError;

pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";
pub const LOG_NS: &str = "http://www.w3.org/2000/10/swap/log#";

/// A `@prefix` / `@base` statement, before it is folded into a [`PrefixEnv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Prefix { prefix: String, iri: String },
    Base { iri: String },
}

impl Directive {
    /// Recognise a tokenized statement as a directive.
    ///
    /// Returns `Ok(None)` for anything that is not a directive. The SPARQL
    /// spellings (`PREFIX`, `base`, ...) are also plain names, so a statement
    /// that starts with one but is not shaped like a directive is left for
    /// the triple parser. Only a malformed `@prefix` / `@base` is an error.
    pub fn from_tokens(tokens: &[String]) -> Result<Option<Directive>, ParseError> {
        let Some(head) = tokens.first() else {
            return Ok(None);
        };

        let directive = match head.as_str() {
            "@prefix" | "PREFIX" | "prefix" => match tokens {
                [_, pfx, iri] if pfx.ends_with(':') && is_iri_ref(iri) => Some(Directive::Prefix {
                    prefix: pfx.trim_end_matches(':').to_string(),
                    iri: strip_iri(iri),
                }),
                _ => None,
            },
            "@base" | "BASE" | "base" => match tokens {
                [_, iri] if is_iri_ref(iri) => Some(Directive::Base {
                    iri: strip_iri(iri),
                }),
                _ => None,
            },
            _ => return Ok(None),
        };

        match directive {
            None if head.starts_with('@') => Err(ParseError::MalformedDirective(tokens.join(" "))),
            d => Ok(d),
        }
    }
}

fn is_iri_ref(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('<') && s.ends_with('>')
}

fn strip_iri(s: &str) -> String {
    s[1..s.len() - 1].to_string()
}

/// Declared prefixes and base; nothing is pre-seeded.
#[derive(Debug, Clone, Default)]
pub struct PrefixEnv {
    pub base: Option<String>,
    pub prefixes: HashMap<String, String>, // prefix -> namespace IRI
}

impl PrefixEnv {
    pub fn from_directives(directives: &[Directive]) -> Self {
        let mut env = PrefixEnv::default();
        for d in directives {
            match d {
                Directive::Base { iri } => env.base = Some(iri.clone()),
                Directive::Prefix { prefix, iri } => {
                    env.prefixes.insert(prefix.clone(), iri.clone());
                }
            }
        }
        env
    }

    /// Expand a bare `prefix:local` token. Undeclared prefixes stay verbatim.
    pub fn expand_name(&self, name: &str) -> String {
        if let Some((pfx, local)) = name.split_once(':') {
            if !local.starts_with("//") {
                if let Some(ns) = self.prefixes.get(pfx) {
                    return format!("{ns}{local}");
                }
            }
        }
        name.to_string()
    }

    /// Resolve the body of an `<...>` IRI against the base, if any.
    pub fn resolve_iri(&self, iri: &str) -> String {
        match &self.base {
            Some(base) if !has_scheme(iri) => format!("{base}{iri}"),
            _ => iri.to_string(),
        }
    }
}

fn has_scheme(iri: &str) -> bool {
    match iri.split_once(':') {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn prefix_directive() {
        let d = Directive::from_tokens(&toks("@prefix ex: <http://ex.org/>")).unwrap();
        assert_eq!(
            d,
            Some(Directive::Prefix {
                prefix: "ex".into(),
                iri: "http://ex.org/".into()
            })
        );
    }

    #[test]
    fn prefix_without_iri_is_rejected() {
        assert!(Directive::from_tokens(&toks("@prefix ex:")).is_err());
    }

    #[test]
    fn bare_keyword_that_is_not_a_directive_is_none() {
        assert_eq!(Directive::from_tokens(&toks("base <p> <o>")).unwrap(), None);
        assert_eq!(Directive::from_tokens(&toks("PREFIX <p> <o>")).unwrap(), None);
        assert!(Directive::from_tokens(&toks("@base <p> <o>")).is_err());
        assert_eq!(
            Directive::from_tokens(&toks("BASE <http://ex.org/>")).unwrap(),
            Some(Directive::Base {
                iri: "http://ex.org/".into()
            })
        );
    }

    #[test]
    fn non_directive_is_none() {
        assert_eq!(Directive::from_tokens(&toks("<a> <b> <c>")).unwrap(), None);
    }

    #[test]
    fn expands_only_declared_prefixes() {
        let env = PrefixEnv::from_directives(&[Directive::Prefix {
            prefix: "".into(),
            iri: "http://ex.org/".into(),
        }]);
        assert_eq!(env.expand_name(":foo"), "http://ex.org/foo");
        assert_eq!(env.expand_name("ex:foo"), "ex:foo");
        assert_eq!(env.expand_name("a"), "a");
    }

    #[test]
    fn base_resolves_relative_iris_only() {
        let env = PrefixEnv::from_directives(&[Directive::Base {
            iri: "http://ex.org/".into(),
        }]);
        assert_eq!(env.resolve_iri("thing"), "http://ex.org/thing");
        assert_eq!(env.resolve_iri("urn:x"), "urn:x");
        assert_eq!(env.resolve_iri("http://other/"), "http://other/");
    }
}
