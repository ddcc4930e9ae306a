use crate::ast::*;
use crate::resolve::LOG_NS;

/// Rewrite `{P} log:implies {C} .` triples into rules.
///
/// Call this **after** prefix resolution so predicates are full IRIs.
pub fn normalize_implications(triples: Vec<Triple>, rules: &mut Vec<Rule>) -> Vec<Triple> {
    let implies = format!("{LOG_NS}implies");
    let mut out = Vec::with_capacity(triples.len());

    for tr in triples {
        match tr {
            Triple {
                subject: Term::Formula(antecedent),
                predicate: Term::Iri(ref p),
                object: Term::Formula(consequent),
            } if *p == implies => rules.push(Rule {
                antecedent,
                consequent,
            }),
            // not an implication triple, keep as is
            other => out.push(other),
        }
    }

    out
}
