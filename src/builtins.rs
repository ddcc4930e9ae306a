//! Builtin predicates: the invocation contract and the registry.
//!
//! A builtin is looked up by the IRI in a pattern's predicate position. The
//! registry always holds the core set first, then whatever callers
//! registered, and lookup is first-match-wins.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::ast::Term;
use crate::resolve::{LOG_NS, XSD_NS};

pub const TYPE_NS: &str = "urn:n3chain:type#";

/// Raised by a builtin to signal "cannot evaluate"; never escapes matching.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct BuiltinError(pub String);

pub type BuiltinFn = Arc<dyn Fn(&[Term]) -> Result<BuiltinValue, BuiltinError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    Unary,
    Binary,
    Ternary,
}

impl Arity {
    pub fn count(self) -> usize {
        match self {
            Arity::Unary => 1,
            Arity::Binary => 2,
            Arity::Ternary => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinValue {
    Bool(bool),
    Term(Term),
}

impl BuiltinValue {
    /// Loose truth: a returned term counts unless it is a falsy literal.
    pub fn is_truthy(&self) -> bool {
        match self {
            BuiltinValue::Bool(b) => *b,
            BuiltinValue::Term(Term::Literal { value, .. }) => {
                !matches!(value.as_str(), "" | "false" | "0")
            }
            BuiltinValue::Term(_) => true,
        }
    }
}

impl From<bool> for BuiltinValue {
    fn from(b: bool) -> Self {
        BuiltinValue::Bool(b)
    }
}

impl From<Term> for BuiltinValue {
    fn from(t: Term) -> Self {
        BuiltinValue::Term(t)
    }
}

#[derive(Clone)]
pub struct Builtin {
    pub uri: String,
    pub arity: Arity,
    pub description: Option<String>,
    apply: BuiltinFn,
}

impl Builtin {
    pub fn new<F>(uri: impl Into<String>, arity: Arity, apply: F) -> Self
    where
        F: Fn(&[Term]) -> Result<BuiltinValue, BuiltinError> + Send + Sync + 'static,
    {
        Builtin {
            uri: uri.into(),
            arity,
            description: None,
            apply: Arc::new(apply),
        }
    }

    /// Shorthand for an infallible test predicate.
    pub fn test<F>(uri: impl Into<String>, arity: Arity, test: F) -> Self
    where
        F: Fn(&[Term]) -> bool + Send + Sync + 'static,
    {
        Builtin::new(uri, arity, move |args| Ok(BuiltinValue::Bool(test(args))))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Invoke with exactly `arity` arguments.
    ///
    /// Wrong argument counts, `Err` returns and panics all read as `false`.
    pub fn call(&self, args: &[Term]) -> bool {
        if args.len() != self.arity.count() {
            tracing::debug!(uri = %self.uri, got = args.len(), "builtin called with wrong arity");
            return false;
        }
        match catch_unwind(AssertUnwindSafe(|| (self.apply)(args))) {
            Ok(Ok(value)) => value.is_truthy(),
            Ok(Err(e)) => {
                tracing::debug!(uri = %self.uri, error = %e, "builtin failed, treated as no match");
                false
            }
            Err(_) => {
                tracing::warn!(uri = %self.uri, "builtin panicked, treated as no match");
                false
            }
        }
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builtin")
            .field("uri", &self.uri)
            .field("arity", &self.arity)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Core builtins followed by caller-registered ones.
#[derive(Debug, Clone)]
pub struct BuiltinRegistry {
    custom: Vec<Builtin>,
    merged: Vec<Builtin>,
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        BuiltinRegistry {
            custom: vec![],
            merged: Self::merge(&[]),
        }
    }

    /// The core set concatenated with `custom`. Nothing is deduplicated;
    /// lookups simply take the first entry with a matching URI.
    pub fn merge(custom: &[Builtin]) -> Vec<Builtin> {
        let mut out = core_builtins();
        out.extend(custom.iter().cloned());
        out
    }

    pub fn register(&mut self, builtin: Builtin) {
        self.register_all([builtin]);
    }

    pub fn register_all(&mut self, builtins: impl IntoIterator<Item = Builtin>) {
        for b in builtins {
            if let Some(existing) = self.lookup(&b.uri) {
                tracing::warn!(
                    uri = %b.uri,
                    arity = ?existing.arity,
                    "builtin already registered; the new definition is shadowed"
                );
            }
            self.custom.push(b);
            self.refresh();
        }
    }

    /// Recompute the merged set from the core set and the custom list.
    pub fn refresh(&mut self) {
        self.merged = Self::merge(&self.custom);
    }

    pub fn merged(&self) -> &[Builtin] {
        &self.merged
    }

    pub fn lookup(&self, uri: &str) -> Option<&Builtin> {
        self.merged.iter().find(|b| b.uri == uri)
    }

    /// The builtin named by a predicate term, if the term is a registered IRI.
    pub fn for_predicate(&self, predicate: &Term) -> Option<&Builtin> {
        match predicate {
            Term::Iri(uri) => self.lookup(uri),
            _ => None,
        }
    }

    pub fn uris(&self) -> Vec<String> {
        self.merged.iter().map(|b| b.uri.clone()).collect()
    }
}

fn core_builtins() -> Vec<Builtin> {
    vec![
        Builtin::test(format!("{LOG_NS}equalTo"), Arity::Binary, |a| a[0] == a[1])
            .with_description("subject and object are the same term"),
        Builtin::test(format!("{LOG_NS}notEqualTo"), Arity::Binary, |a| a[0] != a[1])
            .with_description("subject and object are different terms"),
        Builtin::test(format!("{TYPE_NS}isIri"), Arity::Unary, |a| {
            matches!(a[0], Term::Iri(_))
        }),
        Builtin::test(format!("{TYPE_NS}isLiteral"), Arity::Unary, |a| {
            matches!(a[0], Term::Literal { .. })
        }),
        Builtin::test(format!("{TYPE_NS}isBlank"), Arity::Unary, |a| {
            matches!(a[0], Term::BlankNode(_))
        }),
        Builtin::test(format!("{TYPE_NS}isList"), Arity::Unary, |a| {
            matches!(a[0], Term::List(_))
        }),
        Builtin::test(format!("{TYPE_NS}isNumeric"), Arity::Unary, |a| is_numeric(&a[0]))
            .with_description("literal with a numeric xsd datatype, or a plain numeric literal"),
        Builtin::test(format!("{TYPE_NS}isString"), Arity::Unary, |a| is_string(&a[0])),
        Builtin::test(format!("{TYPE_NS}isDate"), Arity::Unary, |a| is_date(&a[0]))
            .with_description("literal holding an xsd:date (YYYY-MM-DD)"),
        Builtin::test(format!("{TYPE_NS}isDateTime"), Arity::Unary, |a| is_date_time(&a[0]))
            .with_description("literal holding an xsd:dateTime"),
    ]
}

const NUMERIC_TYPES: &[&str] = &[
    "integer", "decimal", "double", "float", "int", "long", "short", "byte",
    "nonNegativeInteger", "positiveInteger", "negativeInteger", "nonPositiveInteger",
    "unsignedInt", "unsignedLong", "unsignedShort", "unsignedByte",
];

fn xsd_local(datatype: &str) -> Option<&str> {
    datatype
        .strip_prefix(XSD_NS)
        .or_else(|| datatype.strip_prefix("xsd:"))
}

fn is_numeric(t: &Term) -> bool {
    match t {
        Term::Literal { value, datatype, language: None } => {
            let typed_ok = match datatype.as_deref() {
                None => true,
                Some(dt) => xsd_local(dt).is_some_and(|l| NUMERIC_TYPES.contains(&l)),
            };
            typed_ok && value.trim().parse::<f64>().is_ok()
        }
        _ => false,
    }
}

fn is_string(t: &Term) -> bool {
    match t {
        Term::Literal { datatype: None, .. } => true,
        Term::Literal { datatype: Some(dt), .. } => xsd_local(dt) == Some("string"),
        _ => false,
    }
}

fn literal_of_type<'a>(t: &'a Term, local: &str) -> Option<&'a str> {
    match t {
        Term::Literal { value, datatype, .. } => match datatype.as_deref() {
            None => Some(value.as_str()),
            Some(dt) if xsd_local(dt) == Some(local) => Some(value.as_str()),
            Some(_) => None,
        },
        _ => None,
    }
}

fn is_date(t: &Term) -> bool {
    literal_of_type(t, "date")
        .is_some_and(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").is_ok())
}

fn is_date_time(t: &Term) -> bool {
    literal_of_type(t, "dateTime").is_some_and(|v| {
        DateTime::parse_from_rfc3339(v).is_ok()
            || NaiveDateTime::parse_from_str(v, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
    })
}
