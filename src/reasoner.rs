// Forward chaining to a fixpoint.
//
// Behavior:
// - Asserted triples seed the working store, deduplicated by value.
// - Every sweep runs every rule against the store as it currently is.
// - A sweep that adds no new triple ends the loop.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::ast::*;
use crate::builtins::{Arity, Builtin, BuiltinRegistry};
use crate::config::{EngineConfig, Format, LogConfig};
use crate::error::{EngineError, InstantiationError, ReasonError};
use crate::hooks::{HookBus, HookError, HookEvent, HookKind};
use crate::matcher::{instantiate_term, instantiate_triple, Matcher};
use crate::parser::parse_document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    Idle,
    Loading,
    Ready,
    Reasoning,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Origin {
    Asserted,
    Inferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provenance {
    pub id: usize,
    pub origin: Origin,
}

/// The working fact set of one `reason()` call.
#[derive(Debug, Default)]
pub struct FactStore {
    triples: Vec<Triple>,
    provenance: Vec<Provenance>,
    seen: HashSet<String>,
}

impl FactStore {
    /// Add the triple unless an equal one is already stored.
    pub fn insert(&mut self, triple: Triple, origin: Origin) -> bool {
        if !self.seen.insert(triple.key()) {
            return false;
        }
        self.provenance.push(Provenance {
            id: self.triples.len(),
            origin,
        });
        self.triples.push(triple);
        true
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.seen.contains(&triple.key())
    }

    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Triple, &Provenance)> {
        self.triples.iter().zip(&self.provenance)
    }

    pub fn inferred(&self) -> impl Iterator<Item = &Triple> {
        self.iter()
            .filter(|(_, p)| p.origin == Origin::Inferred)
            .map(|(t, _)| t)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }
}

/// What `reason()` hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasonOutput {
    pub message: String,
    /// Canonical `s p o .` lines, asserted first, then in derivation order.
    pub triples: Vec<String>,
    pub rules: Vec<String>,
    pub builtins: Vec<String>,
}

type Plugin = Box<dyn FnMut(&mut Engine)>;

pub struct Engine {
    config: EngineConfig,
    state: EngineState,
    document: Option<Document>,
    registry: BuiltinRegistry,
    hooks: HookBus,
    plugin: Option<Plugin>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Engine {
            config,
            state: EngineState::Idle,
            document: None,
            registry: BuiltinRegistry::new(),
            hooks: HookBus::default(),
            plugin: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn registry(&self) -> &BuiltinRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut BuiltinRegistry {
        &mut self.registry
    }

    pub fn register_builtin(&mut self, builtin: Builtin) {
        self.registry.register(builtin);
    }

    pub fn register_builtins(&mut self, builtins: impl IntoIterator<Item = Builtin>) {
        self.registry.register_all(builtins);
    }

    pub fn on<F>(&mut self, kind: HookKind, subscriber: F)
    where
        F: FnMut(&HookEvent<'_>, &mut BuiltinRegistry) -> Result<(), HookError> + 'static,
    {
        self.hooks.on(kind, subscriber);
    }

    /// Called once after every successful load, before any reasoning.
    pub fn set_plugin<F>(&mut self, plugin: F)
    where
        F: FnMut(&mut Engine) + 'static,
    {
        self.plugin = Some(Box::new(plugin));
    }

    pub fn load_ontology_as(&mut self, text: &str, format: &str) -> Result<(), EngineError> {
        let format: Format = format.parse()?;
        match format {
            Format::N3 => self.load_ontology(text),
        }
    }

    pub fn load_ontology_bytes(&mut self, bytes: &[u8]) -> Result<(), EngineError> {
        let text = std::str::from_utf8(bytes)?;
        self.load_ontology(text)
    }

    /// Parse `text` and make it the current document.
    ///
    /// On a parse error the previous document and state are left untouched.
    pub fn load_ontology(&mut self, text: &str) -> Result<(), EngineError> {
        let prior = self.state;
        self.state = EngineState::Loading;

        let mut document = match parse_document(text) {
            Ok(doc) => doc,
            Err(e) => {
                self.state = prior;
                tracing::debug!(error = %e, "ontology rejected");
                return Err(e.into());
            }
        };

        self.registry.refresh();
        document.builtins = self.registry.merged().to_vec();
        tracing::info!(
            triples = document.triples.len(),
            rules = document.rules.len(),
            "ontology loaded"
        );

        let document = self.document.insert(document);
        self.state = EngineState::Ready;
        self.hooks.emit(
            &HookEvent::AfterLoadOntology {
                document: &*document,
            },
            &mut self.registry,
        );

        if let Some(mut plugin) = self.plugin.take() {
            plugin(self);
            // the plugin may have installed a replacement for itself
            if self.plugin.is_none() {
                self.plugin = Some(plugin);
            }
        }

        Ok(())
    }

    pub fn reason(&mut self) -> Result<ReasonOutput, EngineError> {
        if !matches!(self.state, EngineState::Ready | EngineState::Done) {
            return Err(EngineError::NotReady { state: self.state });
        }
        let Some(document) = self.document.as_mut() else {
            return Err(EngineError::NotReady { state: self.state });
        };

        self.registry.refresh();
        document.builtins = self.registry.merged().to_vec();
        self.state = EngineState::Reasoning;

        let document = &*document;
        match fixpoint(document, &mut self.registry, &mut self.hooks, self.config.log) {
            Ok((store, sweeps)) => {
                self.state = EngineState::Done;
                let output = render(document, &store, &self.registry, sweeps);
                tracing::info!(
                    facts = store.len(),
                    inferred = store.inferred().count(),
                    sweeps,
                    "reasoning complete"
                );
                Ok(output)
            }
            Err(e) => {
                self.state = EngineState::Failed;
                tracing::warn!(error = %e, "reasoning aborted");
                Err(e.into())
            }
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("document", &self.document)
            .field("registry", &self.registry)
            .field("hooks", &self.hooks)
            .field("plugin", &self.plugin.is_some())
            .finish()
    }
}

fn fixpoint(
    document: &Document,
    registry: &mut BuiltinRegistry,
    hooks: &mut HookBus,
    log: LogConfig,
) -> Result<(FactStore, usize), ReasonError> {
    let mut store = FactStore::default();
    for triple in &document.triples {
        store.insert(triple.clone(), Origin::Asserted);
    }

    hooks.emit(&HookEvent::BeforeReason { document }, registry);

    let mut sweeps = 0;
    loop {
        sweeps += 1;
        let mut changed = false;

        for (idx, rule) in document.rules.iter().enumerate() {
            // Hooks below may register builtins; those count from the next
            // rule on, not for the solutions of this one.
            let frozen = registry.clone();
            let solutions = Matcher::new(store.triples(), &frozen)
                .with_log(log)
                .solve(&rule.antecedent.triples, &Bindings::new())
                .map_err(|source| ReasonError::Match { rule: idx, source })?;

            for bindings in solutions {
                if !guards_hold(&rule.antecedent.triples, &bindings, &frozen) {
                    continue;
                }
                for pattern in &rule.consequent.triples {
                    let triple = instantiate_triple(pattern, &bindings);
                    if !triple.is_ground() {
                        tracing::debug!(rule = idx, triple = %triple, "unbound variable in consequent, skipped");
                        continue;
                    }
                    check_predicate(&triple)
                        .map_err(|source| ReasonError::Instantiation { rule: idx, source })?;

                    if store.insert(triple.clone(), Origin::Inferred) {
                        changed = true;
                        if log.trace_rules {
                            tracing::debug!(rule = idx, triple = %triple, "inferred");
                        }
                        hooks.emit(
                            &HookEvent::AfterRuleApplied {
                                rule,
                                triple: &triple,
                                bindings: &bindings,
                            },
                            registry,
                        );
                    }
                }
            }
        }

        tracing::debug!(sweep = sweeps, facts = store.len(), changed, "sweep finished");
        if !changed {
            break;
        }
    }

    hooks.emit(&HookEvent::AfterReason { facts: &store }, registry);
    Ok((store, sweeps))
}

/// Every builtin pattern of the antecedent must hold under `bindings`.
fn guards_hold(antecedent: &[Triple], bindings: &Bindings, registry: &BuiltinRegistry) -> bool {
    antecedent.iter().all(|pattern| {
        let Some(builtin) = registry.for_predicate(&pattern.predicate) else {
            return true;
        };
        let subject = instantiate_term(&pattern.subject, bindings);
        let object = instantiate_term(&pattern.object, bindings);
        match builtin.arity {
            Arity::Unary => builtin.call(&[subject]),
            Arity::Binary => builtin.call(&[subject, object]),
            Arity::Ternary => {
                let predicate = instantiate_term(&pattern.predicate, bindings);
                builtin.call(&[subject, predicate, object])
            }
        }
    })
}

fn check_predicate(triple: &Triple) -> Result<(), InstantiationError> {
    match &triple.predicate {
        Term::Iri(_) | Term::BlankNode(_) | Term::Variable(_) => Ok(()),
        Term::Literal { .. } | Term::List(_) | Term::Formula(_) => {
            Err(InstantiationError::InvalidPredicate {
                term: triple.predicate.clone(),
            })
        }
    }
}

fn render(
    document: &Document,
    store: &FactStore,
    registry: &BuiltinRegistry,
    sweeps: usize,
) -> ReasonOutput {
    let mut seen = HashSet::new();
    let triples: Vec<String> = store
        .triples()
        .iter()
        .filter(|t| seen.insert(t.key()))
        .map(|t| t.to_string())
        .collect();
    let inferred = store.inferred().count();

    ReasonOutput {
        message: format!(
            "Reasoning complete: {} triples ({} inferred) after {} sweeps",
            triples.len(),
            inferred,
            sweeps
        ),
        triples,
        rules: document.rules.iter().map(|r| r.to_string()).collect(),
        builtins: registry.uris(),
    }
}
