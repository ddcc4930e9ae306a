//! Unification of rule antecedents against a fact set.
//!
//! Patterns are solved head-first with the bindings threaded through the
//! recursion. A pattern whose predicate names a unary or binary builtin is
//! not matched against data; instead its arguments are resolved from the
//! bindings, or guessed from every distinct value seen in the same triple
//! position when still unbound, and the builtin decides.

use std::collections::HashSet;

use crate::ast::*;
use crate::builtins::{Arity, Builtin, BuiltinRegistry};
use crate::config::LogConfig;
use crate::error::MatchError;

#[derive(Debug, Clone, Copy)]
enum Position {
    Subject,
    Object,
}

/// Match `data` against `pattern` under the bindings so far.
///
/// On failure `bindings` may hold partial work; callers match on a scratch copy.
pub fn term_match(pattern: &Term, data: &Term, bindings: &mut Bindings) -> bool {
    match pattern {
        Term::Variable(name) => match bindings.get(name) {
            Some(bound) => bound == data,
            None => {
                bindings.insert(name.clone(), data.clone());
                true
            }
        },
        Term::List(items) => match data {
            Term::List(values) if items.len() == values.len() => items
                .iter()
                .zip(values)
                .all(|(p, v)| term_match(p, v, bindings)),
            _ => false,
        },
        _ => pattern == data,
    }
}

pub fn match_triple(pattern: &Triple, data: &Triple) -> Option<Bindings> {
    match_triple_with(pattern, data, &Bindings::new())
}

fn match_triple_with(pattern: &Triple, data: &Triple, bindings: &Bindings) -> Option<Bindings> {
    let mut scratch = bindings.clone();
    let ok = term_match(&pattern.subject, &data.subject, &mut scratch)
        && term_match(&pattern.predicate, &data.predicate, &mut scratch)
        && term_match(&pattern.object, &data.object, &mut scratch);
    ok.then_some(scratch)
}

/// Every binding map under which all `patterns` hold against `data`.
pub fn match_antecedent(
    patterns: &[Triple],
    data: &[Triple],
    registry: &BuiltinRegistry,
) -> Result<Vec<Bindings>, MatchError> {
    Matcher::new(data, registry).solve(patterns, &Bindings::new())
}

pub struct Matcher<'a> {
    data: &'a [Triple],
    registry: &'a BuiltinRegistry,
    log: LogConfig,
}

impl<'a> Matcher<'a> {
    pub fn new(data: &'a [Triple], registry: &'a BuiltinRegistry) -> Self {
        Matcher {
            data,
            registry,
            log: LogConfig::default(),
        }
    }

    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    pub fn solve(&self, patterns: &[Triple], bindings: &Bindings) -> Result<Vec<Bindings>, MatchError> {
        let Some((head, rest)) = patterns.split_first() else {
            return Ok(vec![bindings.clone()]);
        };

        if let Some(builtin) = self
            .registry
            .for_predicate(&head.predicate)
            .filter(|b| b.arity != Arity::Ternary)
        {
            let mut out = vec![];
            for solution in self.solve(rest, bindings)? {
                self.eval_builtin(head, builtin, &solution, &mut out);
            }
            return Ok(out);
        }

        let mut out = vec![];
        for fact in self.data {
            let Some(local) = match_triple_with(head, fact, bindings) else {
                continue;
            };
            if self.log.trace_matching {
                tracing::trace!(pattern = %head, fact = %fact, "pattern matched");
            }
            for remaining in self.solve(rest, &local)? {
                out.push(merge(remaining, &local)?);
            }
        }
        Ok(out)
    }

    fn eval_builtin(
        &self,
        pattern: &Triple,
        builtin: &Builtin,
        bindings: &Bindings,
        out: &mut Vec<Bindings>,
    ) {
        for subject in self.candidates(&pattern.subject, bindings, Position::Subject) {
            let mut with_subject = bindings.clone();
            bind_if_unbound(&pattern.subject, &subject, &mut with_subject);

            match builtin.arity {
                Arity::Binary => {
                    for object in self.candidates(&pattern.object, &with_subject, Position::Object) {
                        let mut with_object = with_subject.clone();
                        bind_if_unbound(&pattern.object, &object, &mut with_object);
                        let ok = builtin.call(&[subject.clone(), object.clone()]);
                        self.trace_call(builtin, &[&subject, &object], ok);
                        if ok {
                            out.push(with_object);
                        }
                    }
                }
                _ => {
                    let ok = builtin.call(std::slice::from_ref(&subject));
                    self.trace_call(builtin, &[&subject], ok);
                    if ok {
                        out.push(with_subject);
                    }
                }
            }
        }
    }

    /// Values a builtin argument may take: its bound value, or every distinct
    /// value found at that position in the data when it is still unbound.
    fn candidates(&self, term: &Term, bindings: &Bindings, position: Position) -> Vec<Term> {
        let value = instantiate_term(term, bindings);
        if !value.is_variable() {
            return vec![value];
        }
        let mut seen = HashSet::new();
        self.data
            .iter()
            .map(|t| match position {
                Position::Subject => &t.subject,
                Position::Object => &t.object,
            })
            .filter(|v| seen.insert(*v))
            .cloned()
            .collect()
    }

    fn trace_call(&self, builtin: &Builtin, args: &[&Term], ok: bool) {
        if self.log.trace_builtins {
            let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            tracing::trace!(uri = %builtin.uri, args = ?args, ok, "builtin evaluated");
        }
    }
}

fn bind_if_unbound(term: &Term, value: &Term, bindings: &mut Bindings) {
    if let Term::Variable(name) = term {
        bindings.entry(name.clone()).or_insert_with(|| value.clone());
    }
}

/// `remaining` first, then `local` on top.
fn merge(mut remaining: Bindings, local: &Bindings) -> Result<Bindings, MatchError> {
    for (var, value) in local {
        if let Some(existing) = remaining.get(var) {
            if existing != value {
                return Err(MatchError::BindingConflict {
                    var: var.clone(),
                    first: existing.clone(),
                    second: value.clone(),
                });
            }
        }
        remaining.insert(var.clone(), value.clone());
    }
    Ok(remaining)
}

pub fn instantiate_term(term: &Term, bindings: &Bindings) -> Term {
    match term {
        Term::Variable(name) => bindings.get(name).cloned().unwrap_or_else(|| term.clone()),
        Term::List(items) => Term::List(items.iter().map(|t| instantiate_term(t, bindings)).collect()),
        Term::Formula(f) => Term::Formula(Formula {
            triples: f.triples.iter().map(|t| instantiate_triple(t, bindings)).collect(),
            quantifiers: f.quantifiers.clone(),
        }),
        Term::Literal { .. } | Term::BlankNode(_) | Term::Iri(_) => term.clone(),
    }
}

/// Substitute bound variables; unbound ones are left in place.
pub fn instantiate_triple(triple: &Triple, bindings: &Bindings) -> Triple {
    Triple {
        subject: instantiate_term(&triple.subject, bindings),
        predicate: instantiate_term(&triple.predicate, bindings),
        object: instantiate_term(&triple.object, bindings),
    }
}
