use thiserror::Error;

use crate::ast::Term;
use crate::parser::ParseError;
use crate::reasoner::EngineState;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("variable ?{var} bound to both {first} and {second}")]
    BindingConflict { var: String, first: Term, second: Term },
}

#[derive(Debug, Error)]
pub enum InstantiationError {
    #[error("predicate position instantiated to {term}, expected an IRI or blank node")]
    InvalidPredicate { term: Term },
}

/// A failure inside the fixpoint loop; fatal to that `reason()` call.
#[derive(Debug, Error)]
pub enum ReasonError {
    #[error("rule #{rule}: matching the antecedent failed: {source}")]
    Match {
        rule: usize,
        #[source]
        source: MatchError,
    },
    #[error("rule #{rule}: instantiating the consequent failed: {source}")]
    Instantiation {
        rule: usize,
        #[source]
        source: InstantiationError,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("input is not UTF-8 text: {0}")]
    Type(#[from] std::str::Utf8Error),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("unsupported format `{0}`")]
    UnsupportedFormat(String),
    #[error("engine is {state:?}; load an ontology before reasoning")]
    NotReady { state: EngineState },
    #[error("reasoning failed: {0}")]
    Reasoning(#[from] ReasonError),
}
