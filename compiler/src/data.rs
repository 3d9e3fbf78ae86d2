// data.rs — Hook intermediate representation
//
// The typed records the classifier produces per file and the generator
// consumes after merging. Records are plain data; the only behaviour here is
// directive queries (which mark the queried directive used) and the
// order-preserving merge.

use serde::Serialize;

use crate::directive::{Directive, DirectiveKind};
use crate::source::SourceLocation;

// ── Signatures ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    /// External label as written (`_` for unlabeled).
    pub label: String,
    pub ty: String,
}

/// A method signature kept as re-emittable text. Types are never
/// interpreted, only copied and counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionSignature {
    pub name: String,
    pub generics: Option<String>,
    pub params: Vec<ParamSpec>,
    pub effects: Vec<String>,
    pub return_type: Option<String>,
    /// Attributes rendered as written, e.g. `@objc(fooWithBar:)`.
    pub attributes: Vec<String>,
    pub modifiers: Vec<String>,
}

impl FunctionSignature {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Full name including argument labels: `foo(_:bar:)`, or `foo` when the
    /// method takes no arguments.
    pub fn identifier(&self) -> String {
        if self.params.is_empty() {
            return self.name.clone();
        }
        let labels: String = self.params.iter().map(|p| format!("{}:", p.label)).collect();
        format!("{}({})", self.name, labels)
    }

    pub fn return_type_or_void(&self) -> &str {
        self.return_type.as_deref().unwrap_or("Void")
    }
}

// ── Methods ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "selector", rename_all = "snake_case")]
pub enum DispatchAttribute {
    /// `@objc`
    Plain,
    /// `@objc(selector:)`
    Named(String),
}

const RETAINED_FAMILIES: &[&str] = &["alloc", "new", "copy", "mutableCopy"];

#[derive(Debug, Clone, Serialize)]
pub struct MethodSpec {
    pub is_type_level: bool,
    pub dispatch_attribute: Option<DispatchAttribute>,
    pub is_teardown: bool,
    pub signature: FunctionSignature,
    pub directives: Vec<Directive>,
    pub location: SourceLocation,
}

impl MethodSpec {
    pub fn explicit_dispatch_attribute_present(&self) -> bool {
        self.dispatch_attribute.is_some()
    }

    /// First directive whose kind satisfies `f`, marked used.
    fn consume<T>(&self, f: impl Fn(&DirectiveKind) -> Option<T>) -> Option<T> {
        self.directives.iter().find_map(|d| {
            let value = f(&d.kind)?;
            d.mark_used();
            Some(value)
        })
    }

    /// The method adds a new routine instead of replacing an existing one.
    pub fn is_addition(&self) -> bool {
        self.consume(|k| matches!(k, DirectiveKind::New).then_some(()))
            .is_some()
    }

    /// The method exists only as a route to the ancestor implementation.
    pub fn is_super_trampoline(&self) -> bool {
        self.consume(|k| matches!(k, DirectiveKind::SuprTramp).then_some(()))
            .is_some()
    }

    /// The selector-equivalent name the backend should target, when it
    /// differs from the method name.
    pub fn selector_override(&self) -> Option<String> {
        let from_directive = self.consume(|k| match k {
            DirectiveKind::Selector(s) => Some(s.clone()),
            _ => None,
        });
        from_directive.or_else(|| match &self.dispatch_attribute {
            Some(DispatchAttribute::Named(s)) => Some(s.clone()),
            _ => None,
        })
    }

    /// Whether the routine hands back an owned (+1) value.
    ///
    /// An explicit `returns_retained` directive wins; otherwise the
    /// alloc/new/copy/mutableCopy naming families decide.
    pub fn returns_retained(&self) -> bool {
        if let Some(explicit) = self.consume(|k| match k {
            DirectiveKind::ReturnsRetained(v) => Some(*v),
            _ => None,
        }) {
            return explicit;
        }
        let selector = self
            .selector_override()
            .unwrap_or_else(|| self.signature.name.clone());
        let head = selector.split(':').next().unwrap_or_default();
        let head = head.trim_start_matches('_');
        RETAINED_FAMILIES.iter().any(|family| {
            head.strip_prefix(family)
                .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_lowercase()))
        })
    }
}

// ── Declarations ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ClassHookSpec {
    pub name: String,
    pub target: String,
    pub methods: Vec<MethodSpec>,
    /// Raw `@available(...)` arguments, when present.
    pub availability: Option<String>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionHookSpec {
    pub name: String,
    pub function: MethodSpec,
    pub availability: Option<String>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
pub struct TweakSpec {
    pub name: String,
    pub uses_custom_backend: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRef {
    /// Normalized import line, e.g. `import class UIKit.UIView`.
    pub text: String,
    pub location: SourceLocation,
}

// ── Aggregate ────────────────────────────────────────────────────────────

/// One file's (or, after `merge`, the whole project's) hook records.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HookData {
    pub class_hooks: Vec<ClassHookSpec>,
    pub function_hooks: Vec<FunctionHookSpec>,
    pub tweaks: Vec<TweakSpec>,
    pub imports: Vec<ImportRef>,
    pub global_directives: Vec<Directive>,
}

impl HookData {
    /// Concatenate each record category in the order `parts` yields them.
    pub fn merge(parts: impl IntoIterator<Item = HookData>) -> HookData {
        let mut merged = HookData::default();
        for part in parts {
            merged.class_hooks.extend(part.class_hooks);
            merged.function_hooks.extend(part.function_hooks);
            merged.tweaks.extend(part.tweaks);
            merged.imports.extend(part.imports);
            merged.global_directives.extend(part.global_directives);
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.class_hooks.is_empty()
            && self.function_hooks.is_empty()
            && self.tweaks.is_empty()
            && self.imports.is_empty()
            && self.global_directives.is_empty()
    }
}
