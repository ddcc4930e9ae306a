use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::ast::{Bindings, Document, Rule, Triple};
use crate::builtins::BuiltinRegistry;
use crate::reasoner::FactStore;

pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// A hook subscriber. It gets the registry by `&mut` so it can register
/// builtins; those take effect from the next antecedent match on.
pub type Subscriber = Box<dyn FnMut(&HookEvent<'_>, &mut BuiltinRegistry) -> Result<(), HookError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BeforeReason,
    AfterReason,
    AfterRuleApplied,
    AfterLoadOntology,
}

impl HookKind {
    pub fn name(self) -> &'static str {
        match self {
            HookKind::BeforeReason => "beforeReason",
            HookKind::AfterReason => "afterReason",
            HookKind::AfterRuleApplied => "afterRuleApplied",
            HookKind::AfterLoadOntology => "afterLoadOntology",
        }
    }
}

#[derive(Debug)]
pub enum HookEvent<'a> {
    BeforeReason {
        document: &'a Document,
    },
    AfterReason {
        facts: &'a FactStore,
    },
    AfterRuleApplied {
        rule: &'a Rule,
        triple: &'a Triple,
        bindings: &'a Bindings,
    },
    AfterLoadOntology {
        document: &'a Document,
    },
}

impl HookEvent<'_> {
    pub fn kind(&self) -> HookKind {
        match self {
            HookEvent::BeforeReason { .. } => HookKind::BeforeReason,
            HookEvent::AfterReason { .. } => HookKind::AfterReason,
            HookEvent::AfterRuleApplied { .. } => HookKind::AfterRuleApplied,
            HookEvent::AfterLoadOntology { .. } => HookKind::AfterLoadOntology,
        }
    }
}

#[derive(Default)]
pub struct HookBus {
    subscribers: Vec<(HookKind, Subscriber)>,
}

impl HookBus {
    pub fn on<F>(&mut self, kind: HookKind, subscriber: F)
    where
        F: FnMut(&HookEvent<'_>, &mut BuiltinRegistry) -> Result<(), HookError> + 'static,
    {
        self.subscribers.push((kind, Box::new(subscriber)));
    }

    /// Run every subscriber of the event's kind, in registration order.
    /// Errors and panics are logged and dropped.
    pub fn emit(&mut self, event: &HookEvent<'_>, registry: &mut BuiltinRegistry) {
        let kind = event.kind();
        for (k, subscriber) in self.subscribers.iter_mut().filter(|(k, _)| *k == kind) {
            match catch_unwind(AssertUnwindSafe(|| subscriber(event, registry))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(hook = k.name(), error = %e, "hook failed"),
                Err(_) => tracing::warn!(hook = k.name(), "hook panicked"),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl fmt::Debug for HookBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<&str> = self.subscribers.iter().map(|(k, _)| k.name()).collect();
        f.debug_struct("HookBus").field("subscribers", &kinds).finish()
    }
}
