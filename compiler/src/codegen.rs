// codegen.rs — Glue code generation
//
// Transforms the merged hook data into one generated source unit: per class
// hook a dispatch subclass, original-implementation storage and a
// registration function; per function hook the same without the ancestor
// path; and a single `snare_init` entry point that hands every hook to the
// resolved tweak together with the chosen backend.
//
// Preconditions: the batch that produced `data` reported no errors.
// Postconditions: returns `GenerateResult` with the glue text, or `None` and
//   an error diagnostic when more than one tweak exists.
// Failure modes: multiple tweaks (E0200) abort generation entirely.
// Side effects: marks every directive the generator consults as used.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde::Serialize;

use crate::data::*;
use crate::diag::{codes, Diagnostic};
use crate::source::SourceLocation;

// ── Public types ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct GenerateResult {
    pub output: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Invalid backend name '{0}'")]
    InvalidName(String),
}

/// The dispatch backend generated code activates hooks with.
///
/// A backend named `Foo.Bar<Int>` refers to `Backends.Foo.Bar<Int>` and
/// implicitly imports `SnareBackend_Foo` when that module is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backend {
    pub name: String,
    pub implicit_module: Option<String>,
}

impl Backend {
    /// The built-in backend. It lives in the runtime module itself.
    pub fn internal() -> Self {
        Self {
            name: "Internal".to_string(),
            implicit_module: None,
        }
    }

    pub fn named(name: &str) -> Result<Self, BackendError> {
        let before_generics = name.split('<').next().unwrap_or_default();
        let before_dot = before_generics.split('.').next().unwrap_or_default();
        if before_dot.is_empty() {
            return Err(BackendError::InvalidName(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            implicit_module: Some(format!("SnareBackend_{before_dot}")),
        })
    }

    /// `internal` (any case) selects the built-in backend.
    pub fn from_name(name: &str) -> Result<Self, BackendError> {
        if name.eq_ignore_ascii_case("internal") {
            Ok(Self::internal())
        } else {
            Self::named(name)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratorOptions {
    pub backend: Backend,
    pub extra_backend_modules: BTreeSet<String>,
    pub emit_source_locations: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            backend: Backend::internal(),
            extra_backend_modules: BTreeSet::new(),
            emit_source_locations: true,
        }
    }
}

// ── Public entry point ──────────────────────────────────────────────────────

pub fn generate(data: &HookData, options: &GeneratorOptions) -> GenerateResult {
    let mut ctx = CodegenCtx::new(data, options);
    let complete = ctx.emit_all();
    tracing::debug!(
        class_hooks = data.class_hooks.len(),
        function_hooks = data.function_hooks.len(),
        bytes = ctx.out.len(),
        complete,
        "glue generated"
    );
    ctx.build_result(complete)
}

// ── Internal context ────────────────────────────────────────────────────────

const INDENT: &str = "    ";

struct CodegenCtx<'a> {
    data: &'a HookData,
    options: &'a GeneratorOptions,
    out: String,
    indent: usize,
    diagnostics: Vec<Diagnostic>,
}

/// The tweak the entry point activates.
struct ResolvedTweak {
    name: String,
    custom_backend: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MethodRole {
    /// Replaces an existing routine.
    Hook,
    /// Exists only so the ancestor can be reached; never registered.
    Trampoline,
    /// Adds a routine the target lacks.
    Addition,
    Teardown,
}

/// Everything the emitters need about one method, decided once so each
/// directive is queried a single time.
struct MethodPlan<'m> {
    method: &'m MethodSpec,
    index: usize,
    role: MethodRole,
    retained: bool,
    selector: Option<String>,
}

impl MethodPlan<'_> {
    fn sig(&self) -> &FunctionSignature {
        &self.method.signature
    }

    fn sel_ident(&self) -> String {
        format!("snare_sel{}", self.index)
    }

    fn orig_ident(&self) -> String {
        match self.role {
            MethodRole::Addition => format!("snare_imp{}", self.index),
            _ => format!("snare_orig{}", self.index),
        }
    }

    fn return_type(&self) -> String {
        let ret = self.sig().return_type_or_void();
        if self.retained {
            format!("Unmanaged<{ret}>")
        } else {
            ret.to_string()
        }
    }

    fn take_retained(&self) -> &'static str {
        if self.retained {
            ".takeRetainedValue()"
        } else {
            ""
        }
    }
}

impl<'a> CodegenCtx<'a> {
    fn new(data: &'a HookData, options: &'a GeneratorOptions) -> Self {
        CodegenCtx {
            data,
            options,
            out: String::new(),
            indent: 0,
            diagnostics: Vec::new(),
        }
    }

    fn build_result(self, complete: bool) -> GenerateResult {
        GenerateResult {
            output: complete.then_some(self.out),
            diagnostics: self.diagnostics,
        }
    }

    // ── Output helpers ──────────────────────────────────────────────────

    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.out.push_str(INDENT);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.indent += 1;
    }

    fn close(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    fn source_location(&mut self, location: &SourceLocation) {
        if self.options.emit_source_locations {
            let file = location.file.replace('\\', "\\\\").replace('"', "\\\"");
            self.line(format!(
                "#sourceLocation(file: \"{}\", line: {})",
                file, location.line
            ));
        }
    }

    fn source_location_end(&mut self) {
        if self.options.emit_source_locations {
            self.line("#sourceLocation()");
        }
    }

    // ── Top-level emit ──────────────────────────────────────────────────

    /// Returns false when generation was refused.
    fn emit_all(&mut self) -> bool {
        let Some(tweak) = self.resolve_tweak() else {
            return false;
        };
        let data = self.data;
        self.emit_preamble();
        for hook in &data.class_hooks {
            self.emit_class_hook(hook);
        }
        for hook in &data.function_hooks {
            self.emit_function_hook(hook);
        }
        if !tweak.custom_backend {
            self.emit_backend_imports();
        }
        self.emit_entry_point(&tweak);
        true
    }

    fn resolve_tweak(&mut self) -> Option<ResolvedTweak> {
        match self.data.tweaks.as_slice() {
            [] => Some(ResolvedTweak {
                name: "DefaultTweak".to_string(),
                custom_backend: false,
            }),
            [tweak] => Some(ResolvedTweak {
                name: tweak.name.clone(),
                custom_backend: tweak.uses_custom_backend,
            }),
            [first, ..] => {
                let mut diagnostic = Diagnostic::error(
                    first.location.clone(),
                    "Cannot have more than one Tweak type in a module",
                )
                .with_code(codes::E0200);
                for tweak in &self.data.tweaks {
                    diagnostic = diagnostic
                        .with_note(tweak.location.clone(), format!("'{}' declared here", tweak.name));
                }
                self.diagnostics.push(diagnostic);
                None
            }
        }
    }

    // ── Phase 1: Preamble ───────────────────────────────────────────────

    fn emit_preamble(&mut self) {
        self.out.push_str("// ###\n");
        self.out.push_str("// # GENERATED SNARE GLUE FILE. DO NOT EDIT.\n");
        self.out.push_str("// ###\n");
        self.out.push('\n');
        self.out.push_str("// snare:disable\n");
        self.out.push('\n');

        let mut imports: BTreeSet<&str> = self.data.imports.iter().map(|i| i.text.as_str()).collect();
        imports.insert("import Foundation");
        imports.insert("import Snare");
        for import in imports {
            let _ = writeln!(self.out, "{}", import);
        }
        self.out.push('\n');
    }

    // ── Phase 2: Class hooks ────────────────────────────────────────────

    fn plan_methods<'m>(&self, hook: &'m ClassHookSpec) -> Vec<MethodPlan<'m>> {
        hook.methods
            .iter()
            .enumerate()
            .map(|(i, method)| {
                // Teardown methods never consult their directives, so a stray
                // `new` on one is reported as unused.
                let role = if method.is_teardown {
                    MethodRole::Teardown
                } else if method.is_addition() {
                    MethodRole::Addition
                } else if method.is_super_trampoline() {
                    MethodRole::Trampoline
                } else {
                    MethodRole::Hook
                };
                let retained = role != MethodRole::Teardown && method.returns_retained();
                let selector = match role {
                    MethodRole::Teardown => None,
                    _ => method.selector_override(),
                };
                MethodPlan {
                    method,
                    index: i + 1,
                    role,
                    retained,
                    selector,
                }
            })
            .collect()
    }

    fn emit_class_hook(&mut self, hook: &ClassHookSpec) {
        let plans = self.plan_methods(hook);
        let name = &hook.name;

        self.open(format!("{}extension {} {{", availability_prefix(&hook.availability), name));
        self.open("enum _Glue: _GlueClassHook {");
        self.line(format!("typealias HookType = {name}"));
        self.line("");

        let overrides: Vec<&MethodPlan> =
            plans.iter().filter(|p| p.role != MethodRole::Addition).collect();
        if overrides.is_empty() {
            self.line(format!("final class Dispatch: {name}, _GlueClassHookTrampoline {{}}"));
        } else {
            self.open(format!("final class Dispatch: {name}, _GlueClassHookTrampoline {{"));
            for (i, plan) in overrides.iter().enumerate() {
                if i > 0 {
                    self.line("");
                }
                self.emit_dispatch_override(plan);
            }
            self.close("}");
        }
        self.line("");
        self.line("static let storage = initializeStorage()");

        for plan in &plans {
            self.line("");
            self.emit_method_storage(hook, plan);
        }
        self.line("");

        let registrations: Vec<String> = plans
            .iter()
            .filter_map(|plan| registration(name, plan))
            .collect();
        if registrations.is_empty() {
            self.line(
                "static func activate(withClassHookBuilder builder: inout _GlueClassHookBuilder) {}",
            );
        } else {
            self.open(
                "static func activate(withClassHookBuilder builder: inout _GlueClassHookBuilder) {",
            );
            for registration in registrations {
                self.line(registration);
            }
            self.close("}");
        }
        self.close("}");
        self.close("}");
        self.line("");
    }

    /// The override that consults the call state and picks an implementation.
    fn emit_dispatch_override(&mut self, plan: &MethodPlan) {
        let sig = plan.sig();
        let args = arguments(sig);
        let comma_args = leading_comma(&args.join(", "));
        let sel = plan.sel_ident();
        let state = if plan.method.is_type_level {
            "_Glue.typeCallState".to_string()
        } else {
            "_Glue.callState(for: self)".to_string()
        };

        let orig = match plan.role {
            MethodRole::Teardown => "deinitOrigError()".to_string(),
            MethodRole::Trampoline => "trampOrigError()".to_string(),
            _ => format!(
                "_Glue.{}(target, _Glue.{}{}){}",
                plan.orig_ident(),
                sel,
                comma_args,
                plan.take_retained()
            ),
        };
        let supr = match plan.role {
            MethodRole::Teardown => "deinitSuprError()".to_string(),
            _ => format!(
                "callSuper((@convention(c) (UnsafeRawPointer, Selector{}) -> {}).self) {{ $0($1, _Glue.{}{}){} }}",
                leading_comma(&param_types(sig)),
                plan.return_type(),
                sel,
                comma_args,
                plan.take_retained()
            ),
        };

        self.source_location(&plan.method.location);
        self.open(format!(
            "{} {{",
            override_header(sig, !plan.method.explicit_dispatch_attribute_present())
        ));
        self.source_location_end();
        self.open(format!("switch {state}.fetchRequest() {{"));
        self.close("case nil, .selfCall?:");
        self.indent += 1;
        self.line(format!(
            "return {}super.{}({})",
            effect_prefix(sig),
            sig.name,
            call_arguments(sig, &args)
        ));
        self.close("case .origCall?:");
        self.indent += 1;
        self.line(format!("return {orig}"));
        self.close("case .superCall?:");
        self.indent += 1;
        self.line(format!("return {supr}"));
        self.close("}");
        self.close("}");
    }

    /// Selector and original-implementation storage for one method.
    fn emit_method_storage(&mut self, hook: &ClassHookSpec, plan: &MethodPlan) {
        let orig = plan.orig_ident();
        if plan.role == MethodRole::Teardown {
            self.line(format!(
                "private static var {orig}: @convention(c) (Any, Selector) -> Void = {{ _, _ in }}"
            ));
            return;
        }

        let sig = plan.sig();
        let name = &hook.name;
        let types = param_types(sig);
        let args = arguments(sig);
        let is_type_level = plan.method.is_type_level;

        let selector = match &plan.selector {
            Some(selector) => format!("NSSelectorFromString(\"{selector}\")"),
            None => {
                let receiver = if is_type_level {
                    String::new()
                } else {
                    format!("({name}) -> ")
                };
                format!(
                    "#selector({}.{} as {}({}) -> {})",
                    name,
                    sig.identifier(),
                    receiver,
                    types,
                    sig.return_type_or_void()
                )
            }
        };
        let receiver_type = if is_type_level { "AnyClass" } else { hook.target.as_str() };
        let call_target = if is_type_level {
            name.clone()
        } else {
            format!("{name}(target: target)")
        };
        let call = format!(
            "{}.{}({})",
            call_target,
            sig.name,
            call_arguments(sig, &args)
        );
        let body = if plan.retained {
            format!("Unmanaged.passRetained({call})")
        } else {
            call
        };

        self.source_location(&plan.method.location);
        self.line(format!("private static let {} = {}", plan.sel_ident(), selector));
        self.source_location_end();
        self.source_location(&plan.method.location);
        self.open(format!(
            "private static var {}: @convention(c) ({}, Selector{}) -> {} = {{ target, _cmd{} in",
            orig,
            receiver_type,
            leading_comma(&types),
            plan.return_type(),
            leading_comma(&args.join(", "))
        ));
        self.source_location_end();
        self.line(body);
        self.close("}");
    }

    // ── Phase 3: Function hooks ─────────────────────────────────────────

    fn emit_function_hook(&mut self, hook: &FunctionHookSpec) {
        let name = &hook.name;
        let sig = &hook.function.signature;
        let args = arguments(sig);
        let arg_list = args.join(", ");
        let call_args = call_arguments(sig, &args);
        let closure_args = if args.is_empty() {
            String::new()
        } else {
            format!(" {arg_list} in")
        };

        self.open(format!("{}extension {} {{", availability_prefix(&hook.availability), name));
        self.open("enum _Glue: _GlueFunctionHook {");
        self.line(format!("typealias HookType = {name}"));
        self.line("");
        self.line("static let callState = CallState<_FunctionHookRequest>()");
        self.line("");

        self.open(format!("final class Dispatch: {name}, _GlueFunctionHookTrampoline {{"));
        self.source_location(&hook.function.location);
        self.open(format!("{} {{", override_header(sig, false)));
        self.source_location_end();
        self.open("switch _Glue.callState.fetchRequest() {");
        self.close("case nil:");
        self.indent += 1;
        self.line(format!(
            "return {}super.{}({})",
            effect_prefix(sig),
            sig.name,
            call_args
        ));
        self.close("case .origCall?:");
        self.indent += 1;
        self.line(format!("return _Glue.origFunction({arg_list})"));
        self.close("}");
        self.close("}");
        self.close("}");
        self.line("");

        self.source_location(&hook.function.location);
        self.open(format!(
            "static var origFunction: @convention(c) ({}) -> {} = {{{}",
            param_types(sig),
            sig.return_type_or_void(),
            closure_args
        ));
        self.source_location_end();
        self.line(format!("{}().{}({})", name, sig.name, call_args));
        self.close("}");
        self.line("");
        self.line("static let storage = initializeStorage()");
        self.close("}");
        self.close("}");
        self.line("");
    }

    // ── Phase 4: Backend and entry point ────────────────────────────────

    fn emit_backend_imports(&mut self) {
        let modules: Vec<String> = self
            .options
            .extra_backend_modules
            .iter()
            .chain(self.options.backend.implicit_module.iter())
            .cloned()
            .collect();
        if modules.is_empty() {
            return;
        }
        for module in modules {
            let _ = writeln!(self.out, "#if canImport({module})");
            let _ = writeln!(self.out, "import {module}");
            let _ = writeln!(self.out, "#endif");
        }
        self.out.push('\n');
    }

    fn emit_entry_point(&mut self, tweak: &ResolvedTweak) {
        self.line("@_cdecl(\"snare_init\")");
        self.open("func snare_init() {");
        self.line("var hooks: [_GlueAnyHook.Type]");
        self.line("hooks = []");

        let data = self.data;
        let glues = data
            .class_hooks
            .iter()
            .map(|h| (&h.name, &h.availability))
            .chain(data.function_hooks.iter().map(|h| (&h.name, &h.availability)));
        for (name, availability) in glues {
            let append = format!("hooks.append({name}._Glue.self)");
            match availability {
                Some(constraint) => {
                    self.open(format!("if #available({constraint}) {{"));
                    self.line(append);
                    self.close("}");
                }
                None => self.line(append),
            }
        }

        self.open(format!("{}._activate(", tweak.name));
        if !tweak.custom_backend {
            self.line(format!("backend: Backends.{}(),", self.options.backend.name));
        }
        self.line("hooks: hooks");
        self.close(")");
        self.close("}");
    }
}

// ── Rendering helpers ───────────────────────────────────────────────────────

fn availability_prefix(availability: &Option<String>) -> String {
    availability
        .as_ref()
        .map(|a| format!("@available({a}) "))
        .unwrap_or_default()
}

fn arguments(sig: &FunctionSignature) -> Vec<String> {
    (1..=sig.arity()).map(|i| format!("arg{i}")).collect()
}

fn param_types(sig: &FunctionSignature) -> String {
    sig.params
        .iter()
        .map(|p| p.ty.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn leading_comma(list: &str) -> String {
    if list.is_empty() {
        String::new()
    } else {
        format!(", {list}")
    }
}

/// Call-site arguments with their labels: `arg1, bar: arg2`.
fn call_arguments(sig: &FunctionSignature, args: &[String]) -> String {
    sig.params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            if param.label == "_" {
                arg.clone()
            } else {
                format!("{}: {}", param.label, arg)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn effect_prefix(sig: &FunctionSignature) -> &'static str {
    let throws = sig.effects.iter().any(|e| e == "throws" || e == "rethrows");
    let is_async = sig.effects.iter().any(|e| e == "async");
    match (throws, is_async) {
        (true, true) => "try await ",
        (true, false) => "try ",
        (false, true) => "await ",
        (false, false) => "",
    }
}

/// `@objc override func foo(_ arg1: Int) throws -> Bool`, with parameters
/// renamed and the user's attributes and modifiers carried over.
fn override_header(sig: &FunctionSignature, add_objc: bool) -> String {
    let mut header = String::new();
    if add_objc {
        header.push_str("@objc ");
    }
    for attribute in &sig.attributes {
        let _ = write!(header, "{attribute} ");
    }
    header.push_str("override ");
    for modifier in sig.modifiers.iter().filter(|m| *m != "override") {
        let _ = write!(header, "{modifier} ");
    }
    let params: Vec<String> = sig
        .params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{} arg{}: {}", p.label, i + 1, p.ty))
        .collect();
    let _ = write!(
        header,
        "func {}{}({})",
        sig.name,
        sig.generics.as_deref().unwrap_or_default(),
        params.join(", ")
    );
    for effect in &sig.effects {
        let _ = write!(header, " {effect}");
    }
    if let Some(ret) = &sig.return_type {
        let _ = write!(header, " -> {ret}");
    }
    header
}

fn registration(hook_name: &str, plan: &MethodPlan) -> Option<String> {
    let sel = plan.sel_ident();
    let orig = plan.orig_ident();
    let class_method = plan.method.is_type_level;
    match plan.role {
        MethodRole::Hook => Some(format!(
            "builder.addHook({sel}, {orig}, isClassMethod: {class_method}) {{ {orig} = $0 }}"
        )),
        MethodRole::Addition => Some(format!(
            "builder.addMethod({sel}, {orig}, isClassMethod: {class_method})"
        )),
        MethodRole::Teardown => Some(format!(
            "builder.addDeinitializer(to: {hook_name}.self, getOrig: {{ {orig} }}, setOrig: {{ {orig} = $0 }})"
        )),
        MethodRole::Trampoline => None,
    }
}
