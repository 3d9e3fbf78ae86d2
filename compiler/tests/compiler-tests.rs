// Conformance tests for snarec at the library boundary.
//
// Each case runs a whole session (batch parse → classify → generate →
// finalize) over in-memory sources and checks either that glue is produced
// or that generation is refused, plus the exact diagnostics delivered.
//
// Scope:
// - Positive cases must generate non-empty glue
// - Negative cases must be refused with at least one error diagnostic
// - Directive bookkeeping (uniquing, schema gating, unused reporting)

use snarec::consumer::{CollectingConsumer, DiagnosticLog};
use snarec::diag::DiagLevel;
use snarec::pipeline::{Artifacts, PipelineError, PipelineOptions, Session};

fn session(schemas: &[&str]) -> (Session, DiagnosticLog) {
    let mut options = PipelineOptions::default();
    options.parse.schemas = schemas.iter().map(|s| s.to_string()).collect();
    options.generator.emit_source_locations = false;
    let session = Session::new(options);
    let (collector, log) = CollectingConsumer::new();
    session.engine.add_consumer(Box::new(collector));
    (session, log)
}

fn run(files: &[(&str, &str)]) -> (Result<Artifacts, PipelineError>, DiagnosticLog) {
    run_with_schemas(&[], files)
}

fn run_with_schemas(
    schemas: &[&str],
    files: &[(&str, &str)],
) -> (Result<Artifacts, PipelineError>, DiagnosticLog) {
    let (session, log) = session(schemas);
    let sources = files
        .iter()
        .map(|(n, t)| (n.to_string(), t.to_string()))
        .collect();
    (session.run_sources(sources), log)
}

fn assert_generates(case_name: &str, source: &str) {
    let (result, log) = run(&[("case.x", source)]);
    match result {
        Ok(artifacts) => assert!(
            artifacts.glue.contains("func snare_init()"),
            "{}: glue has no entry point",
            case_name
        ),
        Err(e) => panic!("{}: expected glue, got {} ({:?})", case_name, e, log.messages()),
    }
}

fn assert_refused(case_name: &str, source: &str) {
    let (result, log) = run(&[("case.x", source)]);
    assert!(
        matches!(result, Err(PipelineError::Failed(n)) if n > 0),
        "{}: expected refusal, got {:?}",
        case_name,
        result.map(|a| a.glue)
    );
    assert!(
        log.diagnostics().iter().any(|d| d.level == DiagLevel::Error),
        "{}: refused without an error diagnostic",
        case_name
    );
}

macro_rules! generates {
    ($test_name:ident, $src:expr) => {
        #[test]
        fn $test_name() {
            assert_generates(stringify!($test_name), $src);
        }
    };
}

macro_rules! refused {
    ($test_name:ident, $src:expr) => {
        #[test]
        fn $test_name() {
            assert_refused(stringify!($test_name), $src);
        }
    };
}

// ── Declarations ─────────────────────────────────────────────────────────

generates!(empty_project, "");

generates!(
    class_hook_with_every_method_kind,
    concat!(
        "class H: ClassHook<UIView> {\n",
        "    func layoutSubviews() {}\n",
        "    class func layerClass() -> AnyClass { orig { } }\n",
        "    func deinitializer() -> DeinitPolicy { .callOrig }\n",
        "    private func helper() {}\n",
        "}\n",
    )
);

generates!(
    function_hook,
    "class Open: FunctionHook {\n    func function(_ path: String) -> Int32 { 0 }\n}\n"
);

generates!(final_tweak, "final class Main: Tweak {}\n");

generates!(plain_types_are_ignored, "class Model: NSObject {}\nstruct Point {}\n");

refused!(
    type_with_two_capabilities,
    "class Both: ClassHook<UIView>, FunctionHook {}\n"
);

refused!(private_class_hook, "private class H: ClassHook<UIView> {}\n");

refused!(fileprivate_function_hook, "fileprivate class F: FunctionHook { func function() {} }\n");

refused!(static_hook_method, "class H: ClassHook<UIView> { static func f() {} }\n");

refused!(final_hook_method, "class H: ClassHook<UIView> { final func f() {} }\n");

refused!(
    type_level_deinitializer,
    "class H: ClassHook<UIView> { class func deinitializer() {} }\n"
);

refused!(function_hook_without_function, "class F: FunctionHook { func other() {} }\n");

refused!(unbalanced_braces, "class H: ClassHook<UIView> {\n");

refused!(truncated_class_head, "class H: ClassHook<");

refused!(trailing_bare_import, "import UIKit\nimport");

refused!(multiple_tweaks_in_one_file, "class A: Tweak {}\nclass B: Tweak {}\n");

// ── Multi-file behaviour ─────────────────────────────────────────────────

#[test]
fn multiple_tweaks_report_every_declaration() {
    let (result, log) = run(&[
        ("a.x", "class A: Tweak {}\n"),
        ("b.x", "struct B: TweakWithBackend {}\n"),
    ]);
    assert!(matches!(result, Err(PipelineError::Failed(1))));
    let diags = log.diagnostics();
    assert_eq!(diags.len(), 1);
    let notes: Vec<&str> = diags[0].notes.iter().map(|n| n.message.as_str()).collect();
    assert_eq!(notes, vec!["'A' declared here", "'B' declared here"]);
    assert_eq!(&*diags[0].notes[1].location.file, "b.x");
}

#[test]
fn per_declaration_error_stops_generation_but_not_parsing() {
    let (result, log) = run(&[
        ("a.x", "class Bad: ClassHook<UIView> { static func f() {} }\n"),
        ("b.x", "final class AlsoBad: ClassHook<UIView> {}\n"),
    ]);
    assert!(matches!(result, Err(PipelineError::Failed(2))));
    let files: Vec<String> = log
        .diagnostics()
        .iter()
        .map(|d| d.location.file.to_string())
        .collect();
    assert_eq!(files, vec!["a.x", "b.x"]);
}

#[test]
fn merge_follows_file_order() {
    let (result, _) = run(&[
        ("a.x", "class A: ClassHook<UIView> {}\n"),
        ("b.x", "class B: FunctionHook { func function() {} }\nclass B2: ClassHook<UIView> {}\n"),
        ("c.x", "class C: ClassHook<UIView> {}\n"),
    ]);
    let artifacts = result.expect("generation failed");
    let glue = &artifacts.glue;
    let positions: Vec<usize> = ["A._Glue", "B2._Glue", "C._Glue", "B._Glue"]
        .iter()
        .map(|needle| {
            glue.find(&format!("hooks.append({needle}.self)"))
                .unwrap_or_else(|| panic!("{} not appended", needle))
        })
        .collect();
    let mut sorted = positions.clone();
    sorted.sort();
    assert_eq!(positions, sorted, "class hooks first in file order, then function hooks");
}

// ── Directives ───────────────────────────────────────────────────────────

#[test]
fn consumed_directive_is_not_reported() {
    let (result, log) = run(&[(
        "case.x",
        "class H: ClassHook<NSObject> {\n    // snare:new\n    func added() {}\n}\n",
    )]);
    assert!(result.is_ok());
    assert!(log.diagnostics().is_empty(), "{:?}", log.messages());
}

#[test]
fn unconsumed_directive_is_reported_once() {
    let (result, log) = run(&[(
        "case.x",
        "// snare:new\nclass H: ClassHook<NSObject> {}\n",
    )]);
    assert!(result.is_ok());
    let diags = log.diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].message, "Unused directive");
    assert_eq!(diags[0].level, DiagLevel::Warning);
    assert_eq!(diags[0].location.line, 1);
}

#[test]
fn unknown_directive_warns_without_blocking() {
    let (result, log) = run(&[(
        "case.x",
        "// snare:frobnicate\nclass H: ClassHook<NSObject> {}\n",
    )]);
    assert!(result.is_ok());
    assert_eq!(log.messages(), vec!["Unknown directive: frobnicate".to_string()]);
}

#[test]
fn disabled_file_contributes_nothing() {
    let (result, log) = run(&[
        ("a.x", "// snare:disable\nclass Broken: ClassHook<UIView> { static func f() {} }\n"),
        ("b.x", "class Fine: ClassHook<UIView> {}\n"),
    ]);
    let artifacts = result.expect("disabled file should not fail the batch");
    assert!(log.diagnostics().is_empty());
    assert!(!artifacts.glue.contains("Broken"));
    assert!(artifacts.glue.contains("extension Fine {"));
}

#[test]
fn schema_gates_directives() {
    let source = "class H: ClassHook<NSObject> {\n    // snare[beta]:new\n    func added() {}\n}\n";

    let (result, log) = run_with_schemas(&[], &[("case.x", source)]);
    let glue = result.expect("generation failed").glue;
    assert!(glue.contains("builder.addHook("));
    assert!(log.diagnostics().is_empty());

    let (result, log) = run_with_schemas(&["beta"], &[("case.x", source)]);
    let glue = result.expect("generation failed").glue;
    assert!(glue.contains("builder.addMethod("));
    assert!(log.diagnostics().is_empty());
}

#[test]
fn ignored_import_is_not_emitted() {
    let (result, _) = run(&[(
        "case.x",
        "// snare:ignore_import\nimport Private\nimport UIKit\nclass H: ClassHook<UIView> {}\n",
    )]);
    let glue = result.expect("generation failed").glue;
    assert!(!glue.contains("import Private"));
    assert!(glue.contains("import UIKit"));
}
