// classify.rs — Single-file declaration classifier
//
// Walks one parsed source unit and turns qualifying type declarations into
// hook records: class hooks (`ClassHook<Target>`), function hooks
// (`FunctionHook`), and tweaks (`Tweak`, `TweakWithBackend`). Modifier
// legality is checked per classification; an illegal declaration is dropped
// with an error and the walk continues so one run reports as much as possible.
//
// Preconditions: `unit` was produced by `SourceUnit::parse`.
// Postconditions: every comment in the unit has been offered to the directive
//   registry (unless the file is disabled); `failed` is true iff an error
//   diagnostic was produced.
// Failure modes: syntax errors, ambiguous or illegal declarations (all
//   reported as diagnostics, never raised).
// Side effects: registers directives in the shared registry.

use chumsky::span::Span as _;

use crate::ast::*;
use crate::data::*;
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::directive::{Directive, DirectiveError, DirectiveKind, DirectiveRegistry};
use crate::source::SourceUnit;

/// Lifecycle callbacks that are never hooked.
const LIFECYCLE_METHODS: &[&str] = &["hookWillActivate", "hookDidActivate"];

const TEARDOWN_METHOD: &str = "deinitializer";

const FUNCTION_METHOD: &str = "function";

/// Modifiers that hide a declaration from the generated subclass.
const HIDDEN: &[&str] = &["private", "fileprivate"];

/// Modifiers that stop a declaration from being subclassed or overridden.
const SEALED: &[&str] = &["private", "fileprivate", "final"];

const FUNCTION_FORBIDDEN: &[&str] = &["private", "fileprivate", "final", "class", "static"];

/// Result of classifying one file.
#[derive(Debug, Default)]
pub struct FileOutput {
    pub data: HookData,
    pub diagnostics: Vec<Diagnostic>,
    pub failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DeclKind {
    ClassHook { target: String },
    FunctionHook,
    Tweak { custom_backend: bool },
}

impl DeclKind {
    fn description(&self) -> &'static str {
        match self {
            DeclKind::ClassHook { .. } => "class hook",
            DeclKind::FunctionHook => "function hook",
            DeclKind::Tweak { .. } => "tweak",
        }
    }
}

/// Classify one source unit.
pub fn classify(unit: &SourceUnit, directives: &DirectiveRegistry) -> FileOutput {
    let mut classifier = Classifier {
        unit,
        directives,
        output: FileOutput::default(),
    };
    classifier.run();
    let output = classifier.output;
    tracing::debug!(
        file = %unit.name,
        class_hooks = output.data.class_hooks.len(),
        function_hooks = output.data.function_hooks.len(),
        tweaks = output.data.tweaks.len(),
        failed = output.failed,
        "classified"
    );
    output
}

struct Classifier<'a> {
    unit: &'a SourceUnit,
    directives: &'a DirectiveRegistry,
    output: FileOutput,
}

impl<'a> Classifier<'a> {
    fn run(&mut self) {
        // File-level directives come first: `disable` short-circuits everything.
        let leading = self.resolve_quietly(self.unit.leading_comments());
        if leading.iter().any(|d| d.kind == DirectiveKind::Disable) {
            for directive in &leading {
                directive.mark_used();
            }
            return;
        }

        self.scan_comments();

        let syntax = self.unit.syntax();
        let Some(file) = &syntax.file else {
            for err in &syntax.errors {
                self.error(codes::E0001, err.span().start, err.to_string());
            }
            return;
        };

        self.output.data.global_directives = leading;
        for item in &file.items {
            match item {
                Item::Import(import) => self.visit_import(import),
                Item::Type(decl) => self.visit_type(decl),
                Item::Extension(ext) => self.visit_members(&ext.members),
                Item::Func(_) | Item::Other(_) => {}
            }
        }
    }

    // ── Diagnostics ──

    fn error(&mut self, code: DiagCode, offset: usize, message: String) {
        self.push_error(Diagnostic::error(self.unit.location(offset), message).with_code(code));
    }

    fn push_error(&mut self, diagnostic: Diagnostic) {
        self.output.failed = true;
        self.output.diagnostics.push(diagnostic);
    }

    fn remove_fix_its(&self, mut diagnostic: Diagnostic, modifiers: &[&Modifier]) -> Diagnostic {
        for modifier in modifiers {
            diagnostic = diagnostic.with_fix_it(
                format!("Remove '{}'", modifier.name),
                self.unit.location(modifier.span.start()),
                self.unit.location(modifier.span.end()),
                "",
            );
        }
        diagnostic
    }

    // ── Directives ──

    /// Offer every comment to the registry, reporting rejected directives.
    fn scan_comments(&mut self) {
        for comment in self.unit.comments() {
            let location = self.unit.location(comment.span.start);
            let text = comment.body(&self.unit.text);
            if let Err(err) = self.directives.resolve(text, &location) {
                let code = match err {
                    DirectiveError::Unknown(_) => codes::W0101,
                    _ => codes::W0102,
                };
                self.output
                    .diagnostics
                    .push(Diagnostic::warning(location, err.to_string()).with_code(code));
            }
        }
    }

    /// Resolve comments without reporting failures; the scan already did.
    fn resolve_quietly(&self, comments: &[crate::lexer::Comment]) -> Vec<Directive> {
        comments
            .iter()
            .filter_map(|comment| {
                let location = self.unit.location(comment.span.start);
                self.directives
                    .resolve(comment.body(&self.unit.text), &location)
                    .ok()
                    .flatten()
            })
            .collect()
    }

    /// Directives attached to the declaration whose first token starts at `offset`.
    fn attached(&self, offset: usize) -> Vec<Directive> {
        self.resolve_quietly(self.unit.comments_before(offset))
    }

    // ── Imports ──

    fn visit_import(&mut self, import: &ImportDecl) {
        let directives = self.attached(import.span.start());
        if let Some(ignore) = directives
            .iter()
            .find(|d| d.kind == DirectiveKind::IgnoreImport)
        {
            ignore.mark_used();
            return;
        }

        let mut text = String::new();
        for attribute in &import.attributes {
            text.push_str(&render_attribute(attribute));
            text.push(' ');
        }
        text.push_str("import ");
        if let Some(kind) = &import.kind {
            text.push_str(kind);
            text.push(' ');
        }
        let path: Vec<&str> = import.path.iter().map(|p| p.name.as_str()).collect();
        text.push_str(&path.join("."));

        self.output.data.imports.push(ImportRef {
            text,
            location: self.unit.location(import.span.start()),
        });
    }

    // ── Type declarations ──

    fn visit_members(&mut self, members: &[Member]) {
        for member in members {
            if let Member::Type(nested) = member {
                self.visit_type(nested);
            }
        }
    }

    fn visit_type(&mut self, decl: &TypeDecl) {
        if let Some(kind) = self.declaration_kind(decl) {
            match (decl.kind, kind) {
                (TypeKind::Class, DeclKind::ClassHook { target }) => {
                    self.class_hook(decl, target)
                }
                (TypeKind::Class, DeclKind::FunctionHook) => self.function_hook(decl),
                (_, DeclKind::Tweak { custom_backend }) => {
                    self.output.data.tweaks.push(TweakSpec {
                        name: decl.name.name.clone(),
                        uses_custom_backend: custom_backend,
                        location: self.unit.location(decl.name.span.start()),
                    });
                }
                // Value types cannot be subclassed, so only tweaks apply.
                (TypeKind::Struct | TypeKind::Enum, _) => {}
            }
        }
        self.visit_members(&decl.members);
    }

    /// The single capability tag of `decl`, after modifier validation.
    fn declaration_kind(&mut self, decl: &TypeDecl) -> Option<DeclKind> {
        let kinds: Vec<DeclKind> = decl
            .inherits
            .iter()
            .filter_map(|tag| {
                let name = tag.name.name.rsplit('.').next().unwrap_or_default();
                match name {
                    "ClassHook" => tag.generic_args.first().map(|target| DeclKind::ClassHook {
                        target: target.text.clone(),
                    }),
                    "FunctionHook" => Some(DeclKind::FunctionHook),
                    "Tweak" => Some(DeclKind::Tweak {
                        custom_backend: false,
                    }),
                    "TweakWithBackend" => Some(DeclKind::Tweak {
                        custom_backend: true,
                    }),
                    _ => None,
                }
            })
            .collect();

        let kind = match kinds.as_slice() {
            [] => return None,
            [kind] => kind.clone(),
            [..] => {
                let offset = decl.inherits[0].span.start();
                self.error(
                    codes::E0100,
                    offset,
                    "A type can only be a single type of hook or tweak".to_string(),
                );
                return None;
            }
        };

        let forbidden = match kind {
            DeclKind::Tweak { .. } => HIDDEN,
            DeclKind::ClassHook { .. } | DeclKind::FunctionHook => SEALED,
        };
        let invalid: Vec<&Modifier> = decl
            .modifiers
            .iter()
            .filter(|m| forbidden.contains(&m.name.as_str()))
            .collect();
        if let Some(first) = invalid.first() {
            let rule = match kind {
                DeclKind::Tweak { .. } => "private or fileprivate",
                _ => "private, fileprivate, or final",
            };
            let message = format!("A {} cannot be {}", kind.description(), rule);
            let diagnostic = Diagnostic::error(self.unit.location(first.span.start()), message)
                .with_code(codes::E0101);
            let diagnostic = self.remove_fix_its(diagnostic, &invalid);
            self.push_error(diagnostic);
            return None;
        }

        Some(kind)
    }

    // ── Class hooks ──

    fn class_hook(&mut self, decl: &TypeDecl, target: String) {
        let methods: Vec<MethodSpec> = decl
            .functions()
            .filter_map(|func| self.hook_method(func))
            .collect();
        self.output.data.class_hooks.push(ClassHookSpec {
            name: decl.name.name.clone(),
            target,
            methods,
            availability: availability(decl),
            location: self.unit.location(decl.name.span.start()),
        });
    }

    fn hook_method(&mut self, func: &FuncDecl) -> Option<MethodSpec> {
        if func.modifiers.iter().any(|m| HIDDEN.contains(&m.name.as_str())) {
            return None;
        }
        if LIFECYCLE_METHODS.contains(&func.name.name.as_str()) {
            return None;
        }

        if let Some(modifier) = func.modifier("static") {
            let location = self.unit.location(modifier.span.start());
            let diagnostic = Diagnostic::error(
                location.clone(),
                "A method hook or addition cannot be static. If you are hooking or adding a \
                 type-level method, use `class` instead of `static`. If this is a helper \
                 function, declare it as private or fileprivate.",
            )
            .with_code(codes::E0102)
            .with_fix_it(
                "Replace 'static' with 'class'",
                location,
                self.unit.location(modifier.span.end()),
                "class",
            );
            self.push_error(diagnostic);
            return None;
        }

        let directives = self.attached(func.span.start());
        let is_addition = directives.iter().any(|d| d.kind == DirectiveKind::New);

        if let Some(modifier) = func.modifier("final") {
            if is_addition {
                // The directive has done its job for this check; the generator
                // consults it again for registration.
                for directive in directives.iter().filter(|d| d.kind == DirectiveKind::New) {
                    directive.mark_used();
                }
            } else {
                self.error(
                    codes::E0103,
                    modifier.span.start(),
                    "A method hook cannot be declared with the modifier final. If you \
                     intended to add this method, mark it with the directive \
                     `// snare:new` instead."
                        .to_string(),
                );
                return None;
            }
        }

        let is_teardown = func.name.name == TEARDOWN_METHOD;
        if is_teardown {
            if let Some(modifier) = func.modifier("class") {
                let diagnostic = Diagnostic::error(
                    self.unit.location(modifier.span.start()),
                    "A deinitializer cannot be a class method",
                )
                .with_code(codes::E0106);
                let diagnostic = self.remove_fix_its(diagnostic, &[modifier]);
                self.push_error(diagnostic);
                return None;
            }
        }

        Some(self.method_spec(func, directives))
    }

    fn method_spec(&self, func: &FuncDecl, directives: Vec<Directive>) -> MethodSpec {
        let dispatch_attribute = func.attribute("objc").map(|attr| match &attr.args {
            Some(selector) => DispatchAttribute::Named(selector.replace(char::is_whitespace, "")),
            None => DispatchAttribute::Plain,
        });
        MethodSpec {
            is_type_level: func.modifier("class").is_some(),
            dispatch_attribute,
            is_teardown: func.name.name == TEARDOWN_METHOD,
            signature: signature(func),
            directives,
            location: self.unit.location(func.name.span.start()),
        }
    }

    // ── Function hooks ──

    fn function_hook(&mut self, decl: &TypeDecl) {
        let Some(func) = decl.functions().find(|f| f.name.name == FUNCTION_METHOD) else {
            self.error(
                codes::E0104,
                decl.name.span.start(),
                "Function hooks must contain a function named 'function'".to_string(),
            );
            return;
        };

        let invalid: Vec<&Modifier> = func
            .modifiers
            .iter()
            .filter(|m| FUNCTION_FORBIDDEN.contains(&m.name.as_str()))
            .collect();
        if let Some(first) = invalid.first() {
            let diagnostic = Diagnostic::error(
                self.unit.location(first.span.start()),
                "A function hook's `function` cannot be declared with the modifiers private, \
                 fileprivate, final, class, or static",
            )
            .with_code(codes::E0105);
            let diagnostic = self.remove_fix_its(diagnostic, &invalid);
            self.push_error(diagnostic);
            return;
        }

        let directives = self.attached(func.span.start());
        let function = self.method_spec(func, directives);
        self.output.data.function_hooks.push(FunctionHookSpec {
            name: decl.name.name.clone(),
            function,
            availability: availability(decl),
            location: self.unit.location(decl.name.span.start()),
        });
    }
}

// ── Helpers ──

fn availability(decl: &TypeDecl) -> Option<String> {
    decl.attribute("available").and_then(|a| a.args.clone())
}

fn render_attribute(attribute: &Attribute) -> String {
    match &attribute.args {
        Some(args) => format!("@{}({})", attribute.name.name, args),
        None => format!("@{}", attribute.name.name),
    }
}

fn signature(func: &FuncDecl) -> FunctionSignature {
    FunctionSignature {
        name: func.name.name.clone(),
        generics: func.generics.clone(),
        params: func
            .params
            .iter()
            .map(|p| ParamSpec {
                label: p.external_label().to_string(),
                ty: p.ty.text.clone(),
            })
            .collect(),
        effects: func.effects.clone(),
        return_type: func.return_type.as_ref().map(|t| t.text.clone()),
        attributes: func.attributes.iter().map(render_attribute).collect(),
        modifiers: func.modifiers.iter().map(|m| m.name.clone()).collect(),
    }
}
