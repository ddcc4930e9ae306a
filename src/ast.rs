use std::collections::HashMap;
use std::fmt;

use crate::builtins::Builtin;

/// Variable name -> bound value, one map per unification branch.
pub type Bindings = HashMap<String, Term>;

#[derive(Debug, Clone)]
pub struct Document {
    pub triples: Vec<Triple>,
    pub rules: Vec<Rule>,
    /// Empty after parsing; the engine fills it from the registry.
    pub builtins: Vec<Builtin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rule {
    pub antecedent: Formula,
    pub consequent: Formula,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Formula {
    pub triples: Vec<Triple>,
    pub quantifiers: Vec<Quantifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quantifier {
    pub kind: QuantifierKind,
    pub vars: Vec<Term>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantifierKind {
    ForAll,  // @forAll
    ForSome, // @forSome
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Variable(String),
    Literal {
        value: String,
        datatype: Option<String>,
        language: Option<String>,
    },
    BlankNode(String),
    Iri(String),
    List(Vec<Term>),
    Formula(Formula),
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(value.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Term::Variable(name.into())
    }

    /// Plain literal without datatype or language tag.
    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// True when no variable occurs anywhere inside the term.
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Variable(_) => false,
            Term::Literal { .. } | Term::BlankNode(_) | Term::Iri(_) => true,
            Term::List(items) => items.iter().all(Term::is_ground),
            Term::Formula(f) => f.triples.iter().all(Triple::is_ground),
        }
    }
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Triple {
            subject,
            predicate,
            object,
        }
    }

    pub fn is_ground(&self) -> bool {
        self.subject.is_ground() && self.predicate.is_ground() && self.object.is_ground()
    }

    /// Dedup key: the three terms rendered by value.
    pub fn key(&self) -> String {
        format!("{} {} {}", self.subject, self.predicate, self.object)
    }
}

impl Formula {
    pub fn new(triples: Vec<Triple>) -> Self {
        Formula {
            triples,
            quantifiers: vec![],
        }
    }
}

fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(name) => write!(f, "?{name}"),
            Term::Literal {
                value,
                datatype,
                language,
            } => {
                write!(f, "\"{}\"", escape_literal(value))?;
                if let Some(dt) = datatype {
                    write!(f, "^^<{dt}>")
                } else if let Some(lang) = language {
                    write!(f, "@{lang}")
                } else {
                    Ok(())
                }
            }
            Term::BlankNode(id) => write!(f, "_:{id}"),
            Term::Iri(value) => write!(f, "<{value}>"),
            Term::List(items) => {
                let inside: Vec<String> = items.iter().map(|t| t.to_string()).collect();
                write!(f, "({})", inside.join(" "))
            }
            Term::Formula(formula) => write!(f, "{formula}"),
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.triples.is_empty() {
            return write!(f, "{{}}");
        }
        write!(f, "{{ ")?;
        for tr in &self.triples {
            write!(f, "{tr} ")?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {} .", self.antecedent, self.consequent)
    }
}
