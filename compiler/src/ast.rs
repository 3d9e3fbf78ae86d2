// AST node types for Snare .x hook source files.
//
// Only the declarations the classifier inspects are modelled: imports, type
// declarations with their capability tags and members, and function
// signatures. Everything else is kept as an opaque `Other` span.
//
// Preconditions: produced by the parser from a token stream.
// Postconditions: each node's span covers the source range of the construct,
//   starting at its first token (attributes included).
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Root ──

/// A complete source file: a sequence of top-level items.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub items: Vec<Item>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Import(ImportDecl),
    Type(TypeDecl),
    Extension(ExtensionDecl),
    Func(FuncDecl),
    Other(Span),
}

// ── Common pieces ──

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// `@name` or `@name(args)`. `args` is the raw text between the parentheses.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: Ident,
    pub args: Option<String>,
    pub span: Span,
}

/// A declaration modifier such as `private`, `final`, `class`, `override`.
#[derive(Debug, Clone, PartialEq)]
pub struct Modifier {
    pub name: String,
    pub span: Span,
}

/// A type reference kept as whitespace-normalized source text.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub text: String,
    pub span: Span,
}

// ── Imports ──

/// `import [kind] Path.To.Module`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub attributes: Vec<Attribute>,
    pub kind: Option<String>,
    pub path: Vec<Ident>,
    pub span: Span,
}

// ── Type declarations ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Struct,
    Enum,
}

/// One entry of an inheritance clause: `Name` or `Name<Args>`.
#[derive(Debug, Clone, PartialEq)]
pub struct InheritedType {
    pub name: Ident,
    pub generic_args: Vec<TypeRef>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub attributes: Vec<Attribute>,
    pub modifiers: Vec<Modifier>,
    pub kind: TypeKind,
    pub name: Ident,
    pub inherits: Vec<InheritedType>,
    pub members: Vec<Member>,
    pub span: Span,
}

/// `extension Name [: Tags] { members }`. Members are visited for nested
/// types but the extension itself is never a hook.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionDecl {
    pub extended: TypeRef,
    pub members: Vec<Member>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Func(FuncDecl),
    Type(TypeDecl),
    Other(Span),
}

// ── Functions ──

/// A parameter: `[label] name: Type [= default]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub label: Option<Ident>,
    pub name: Ident,
    pub ty: TypeRef,
    pub span: Span,
}

impl Param {
    /// The argument label callers write: the explicit label, or the name when
    /// only one identifier was given.
    pub fn external_label(&self) -> &str {
        match &self.label {
            Some(label) => &label.name,
            None => &self.name.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub attributes: Vec<Attribute>,
    pub modifiers: Vec<Modifier>,
    pub name: Ident,
    /// Raw generic parameter clause including the angle brackets.
    pub generics: Option<String>,
    pub params: Vec<Param>,
    /// `async`, `throws`, `rethrows` in source order.
    pub effects: Vec<String>,
    pub return_type: Option<TypeRef>,
    pub span: Span,
}

impl FuncDecl {
    pub fn modifier(&self, name: &str) -> Option<&Modifier> {
        self.modifiers.iter().find(|m| m.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name.name == name)
    }
}

impl TypeDecl {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name.name == name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FuncDecl> {
        self.members.iter().filter_map(|m| match m {
            Member::Func(f) => Some(f),
            _ => None,
        })
    }
}
