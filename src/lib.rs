mod ast;
mod builtins;
mod config;
mod error;
mod hooks;
mod lexer;
mod matcher;
mod normalize;
mod parser;
mod reasoner;
mod resolve;

pub use ast::*;
pub use builtins::{Arity, Builtin, BuiltinError, BuiltinFn, BuiltinRegistry, BuiltinValue, TYPE_NS};
pub use config::{EngineConfig, Format, LogConfig};
pub use error::{EngineError, InstantiationError, MatchError, ReasonError};
pub use hooks::{HookBus, HookError, HookEvent, HookKind, Subscriber};
pub use lexer::{split_statements, tokenize_statement};
pub use matcher::{
    instantiate_term,
    instantiate_triple,
    match_antecedent,
    match_triple,
    term_match,
    Matcher,
};
pub use normalize::normalize_implications;
pub use parser::{parse_document, parse_formula, parse_term, LiteralRule, ParseError};
pub use reasoner::{Engine, EngineState, FactStore, Origin, Provenance, ReasonOutput};
pub use resolve::{Directive, PrefixEnv, LOG_NS, XSD_NS};
