use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use n3chain::*;

/// Load `src` into a fresh engine and reason to fixpoint.
fn reason(src: &str) -> ReasonOutput {
    let mut engine = Engine::new();
    engine
        .load_ontology(src)
        .unwrap_or_else(|e| panic!("failed to load {src:?}: {e}"));
    engine.reason().expect("reasoning failed")
}

fn as_set(triples: &[String]) -> BTreeSet<String> {
    triples.iter().cloned().collect()
}

fn is_foo() -> Builtin {
    Builtin::test("http://example.org/custom#isFoo", Arity::Unary, |args| {
        args[0] == Term::literal("foo")
    })
    .with_description("true for the literal \"foo\"")
}

// ─── Basic scenarios ─────────────────────────────────────────────

#[test]
fn simple_rule_fires() {
    let out = reason(r#"<a> <b> "1" . { <a> <b> ?x } => { <a> <c> ?x } ."#);
    assert_eq!(out.triples.len(), 2);
    assert!(out.triples.contains(&r#"<a> <c> "1" ."#.to_string()));
}

#[test]
fn custom_unary_builtin_filters_bindings() {
    let mut engine = Engine::new();
    engine.register_builtin(is_foo());
    engine
        .load_ontology(
            r#"<a> <b> "foo" .
               <a> <b> "bar" .
               { <a> <b> ?x . ?x <http://example.org/custom#isFoo> ?x } => { <a> <c> ?x } ."#,
        )
        .unwrap();
    let out = engine.reason().unwrap();

    let inferred: Vec<&String> = out
        .triples
        .iter()
        .filter(|t| t.starts_with("<a> <c>"))
        .collect();
    assert_eq!(inferred, vec![r#"<a> <c> "foo" ."#]);
    assert_eq!(out.triples.len(), 3);
}

#[test]
fn class_membership_rule() {
    let out = reason(
        ":foo a :Thing .\n\
         :bar a :OtherThing .\n\
         { ?x a :Thing } => { ?x :inferred true } .",
    );
    assert!(out.triples.contains(&"<:foo> <:inferred> <true> .".to_string()));
    assert!(!out.triples.iter().any(|t| t.starts_with("<:bar> <:inferred>")));
    assert_eq!(out.triples.len(), 3);
}

#[test]
fn after_rule_applied_hook_sees_rule_triple_and_bindings() {
    let seen: Rc<RefCell<Vec<(String, String, Option<Term>)>>> = Rc::default();
    let sink = seen.clone();

    let mut engine = Engine::new();
    engine.on(HookKind::AfterRuleApplied, move |event, _| {
        if let HookEvent::AfterRuleApplied { rule, triple, bindings } = event {
            sink.borrow_mut()
                .push((rule.to_string(), triple.to_string(), bindings.get("x").cloned()));
        }
        Ok(())
    });
    engine
        .load_ontology(r#"<a> <b> "1" . { <a> <b> ?x } => { <a> <c> ?x } ."#)
        .unwrap();
    engine.reason().unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "{ <a> <b> ?x . } => { <a> <c> ?x . } .");
    assert_eq!(seen[0].1, r#"<a> <c> "1" ."#);
    assert_eq!(seen[0].2, Some(Term::literal("1")));
}

#[test]
fn malformed_terms_are_parse_errors() {
    let mut engine = Engine::new();
    assert!(matches!(
        engine.load_ontology(r#"<a> <b> "unterminated ."#),
        Err(EngineError::Parse(ParseError::MalformedLiteral { .. }))
    ));
    assert!(matches!(
        engine.load_ontology("<a> <b> ? ."),
        Err(EngineError::Parse(ParseError::EmptyVariable(_)))
    ));
    assert_eq!(engine.state(), EngineState::Idle);
}

// ─── Fixpoint properties ─────────────────────────────────────────

#[test]
fn reasoning_twice_gives_the_same_set() {
    let mut engine = Engine::new();
    engine
        .load_ontology(
            "<a> <parent> <b> . <b> <parent> <c> .
             { ?x <parent> ?y } => { ?x <ancestor> ?y } .
             { ?x <ancestor> ?y . ?y <ancestor> ?z } => { ?x <ancestor> ?z } .",
        )
        .unwrap();
    let first = engine.reason().unwrap();
    let second = engine.reason().unwrap();
    assert_eq!(as_set(&first.triples), as_set(&second.triples));
    assert_eq!(engine.state(), EngineState::Done);
}

#[test]
fn transitive_closure_reaches_fixpoint() {
    let out = reason(
        "<a> <parent> <b> . <b> <parent> <c> . <c> <parent> <d> .
         { ?x <parent> ?y } => { ?x <ancestor> ?y } .
         { ?x <ancestor> ?y . ?y <ancestor> ?z } => { ?x <ancestor> ?z } .",
    );
    let ancestors = out.triples.iter().filter(|t| t.contains("<ancestor>")).count();
    assert_eq!(ancestors, 6);
    assert!(out.triples.contains(&"<a> <ancestor> <d> .".to_string()));
}

#[test]
fn asserted_triples_are_never_removed() {
    let src = "<a> <p> <b> . <c> <p> <d> . { ?x <p> ?y } => { ?y <q> ?x } .";
    let asserted = reason("<a> <p> <b> . <c> <p> <d> .");
    let out = reason(src);
    assert!(as_set(&asserted.triples).is_subset(&as_set(&out.triples)));
}

#[test]
fn duplicates_collapse() {
    let out = reason(
        "<a> <p> <b> . <a> <p> <b> . <a> <q> <b> .
         { ?x <p> ?y } => { ?x <q> ?y } .",
    );
    assert_eq!(out.triples, vec!["<a> <p> <b> .", "<a> <q> <b> ."]);
}

#[test]
fn self_feeding_rule_terminates() {
    let out = reason("<a> <same> <a> . { ?x <same> ?y } => { ?y <same> ?x } .");
    assert_eq!(out.triples, vec!["<a> <same> <a> ."]);
}

// ─── Builtins and hooks ──────────────────────────────────────────

#[test]
fn core_not_equal_builtin() {
    let out = reason(
        "<a> <knows> <b> . <a> <knows> <a> .
         { ?x <knows> ?y . ?x <http://www.w3.org/2000/10/swap/log#notEqualTo> ?y }
           => { ?x <knowsOther> ?y } .",
    );
    assert!(out.triples.contains(&"<a> <knowsOther> <b> .".to_string()));
    assert!(!out.triples.contains(&"<a> <knowsOther> <a> .".to_string()));
}

#[test]
fn core_type_builtin_with_prefix() {
    let out = reason(
        r#"@prefix t: <urn:n3chain:type#> .
           <a> <v> "2024-01-01T00:00:00Z" . <b> <v> "soon" .
           { ?s <v> ?d . ?d t:isDateTime ?d } => { ?s <hasTimestamp> ?d } ."#,
    );
    assert!(out
        .triples
        .contains(&r#"<a> <hasTimestamp> "2024-01-01T00:00:00Z" ."#.to_string()));
    assert!(!out.triples.iter().any(|t| t.starts_with("<b> <hasTimestamp>")));
}

#[test]
fn builtin_registered_by_hook_is_used_later() {
    let mut engine = Engine::new();
    engine.on(HookKind::BeforeReason, |_, registry| {
        if registry.lookup("http://example.org/custom#isFoo").is_none() {
            registry.register(is_foo());
        }
        Ok(())
    });
    engine
        .load_ontology(
            r#"<a> <b> "foo" . <a> <b> "bar" .
               { <a> <b> ?x . ?x <http://example.org/custom#isFoo> ?x } => { <a> <c> ?x } ."#,
        )
        .unwrap();
    let out = engine.reason().unwrap();
    assert!(out.triples.contains(&r#"<a> <c> "foo" ."#.to_string()));
    assert!(!out.triples.contains(&r#"<a> <c> "bar" ."#.to_string()));
    assert!(out.builtins.contains(&"http://example.org/custom#isFoo".to_string()));
}

#[test]
fn builtin_registered_mid_rule_waits_for_the_next_match() {
    let mut engine = Engine::new();
    engine.on(HookKind::AfterRuleApplied, |_, registry| {
        if registry.lookup("urn:t#late").is_none() {
            registry.register(Builtin::test("urn:t#late", Arity::Unary, |_| false));
        }
        Ok(())
    });
    engine
        .load_ontology(
            "<a> <urn:t#late> <x> . <b> <urn:t#late> <y> .
             { ?s <urn:t#late> ?o } => { ?s <ok> ?o } .",
        )
        .unwrap();
    let out = engine.reason().unwrap();

    let ok: Vec<&String> = out.triples.iter().filter(|t| t.contains("<ok>")).collect();
    assert_eq!(ok, vec!["<a> <ok> <x> .", "<b> <ok> <y> ."]);
    assert!(engine.registry().lookup("urn:t#late").is_some());
}

#[test]
fn failing_hook_does_not_abort_reasoning() {
    let mut engine = Engine::new();
    engine.on(HookKind::AfterRuleApplied, |_, _| Err("hook exploded".into()));
    engine
        .load_ontology(r#"<a> <b> "1" . { <a> <b> ?x } => { <a> <c> ?x } ."#)
        .unwrap();
    assert_eq!(engine.reason().unwrap().triples.len(), 2);
}

#[test]
fn plugin_runs_once_per_load() {
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();

    let mut engine = Engine::new();
    engine.set_plugin(move |engine| {
        *counter.borrow_mut() += 1;
        assert_eq!(engine.state(), EngineState::Ready);
        engine.register_builtin(is_foo());
    });
    engine.load_ontology("<a> <b> <c> .").unwrap();
    assert_eq!(*calls.borrow(), 1);
    assert!(engine.load_ontology("<a> <b> .").is_err());
    assert_eq!(*calls.borrow(), 1);
    assert!(engine.registry().lookup("http://example.org/custom#isFoo").is_some());
}

#[test]
fn lifecycle_hooks_fire_in_order() {
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::default();
    let mut engine = Engine::new();
    for kind in [
        HookKind::AfterLoadOntology,
        HookKind::BeforeReason,
        HookKind::AfterRuleApplied,
        HookKind::AfterReason,
    ] {
        let log = log.clone();
        engine.on(kind, move |event, _| {
            log.borrow_mut().push(event.kind().name());
            Ok(())
        });
    }
    engine
        .load_ontology("<a> <p> <b> . { ?x <p> ?y } => { ?y <p> ?x } .")
        .unwrap();
    engine.reason().unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["afterLoadOntology", "beforeReason", "afterRuleApplied", "afterReason"]
    );
}

// ─── Engine surface ──────────────────────────────────────────────

#[test]
fn unknown_format_is_a_configuration_error() {
    let mut engine = Engine::new();
    assert!(matches!(
        engine.load_ontology_as("<a> <b> <c> .", "turtle"),
        Err(EngineError::UnsupportedFormat(_))
    ));
    engine.load_ontology_as("<a> <b> <c> .", "N3").unwrap();
    assert_eq!(engine.state(), EngineState::Ready);
}

#[test]
fn non_utf8_input_is_a_type_error() {
    let mut engine = Engine::new();
    assert!(matches!(
        engine.load_ontology_bytes(&[0xff, 0xfe, 0x00]),
        Err(EngineError::Type(_))
    ));
}

#[test]
fn output_serializes_to_json() {
    let out = reason(r#"<a> <b> "1" . { <a> <b> ?x } => { <a> <c> ?x } ."#);
    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["triples"].as_array().unwrap().len(), 2);
    assert_eq!(json["rules"].as_array().unwrap().len(), 1);
    assert!(json["message"].as_str().unwrap().contains("1 inferred"));
}
