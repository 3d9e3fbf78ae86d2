// directive.rs — Directive catalog, resolution, and usage tracking
//
// Directives are structured annotations written in comments:
//
//     // snare:new
//     // snare[legacy]:returns_retained true
//
// The registry resolves comment text against a fixed catalog (exact names,
// then `prefix:value` names, then custom predicates), applies the schema gate,
// and uniques every directive by its source location so repeated visits of
// the same comment share one identity and one `used` flag.
//
// Preconditions: callers pass comment bodies with delimiters already stripped.
// Postconditions: every successfully resolved directive is registered exactly
//   once per (file, offset) until the registry is dropped.
// Failure modes: unknown names and bad arguments return `DirectiveError`.
// Side effects: resolution inserts into the shared location table.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Serialize, Serializer};

use crate::source::SourceLocation;

/// Marker every directive comment starts with.
pub const DIRECTIVE_PREFIX: &str = "snare";

// ── Kinds ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveKind {
    /// The method is an addition rather than an override.
    New,
    /// Skip the whole file (only honoured in leading file commentary).
    Disable,
    /// The method exists only so `supr` can reach the ancestor.
    SuprTramp,
    /// Drop the following import from generated output.
    IgnoreImport,
    /// Explicit ownership of the return value.
    ReturnsRetained(bool),
    /// Explicit selector-equivalent identifier.
    Selector(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveError {
    #[error("Unknown directive: {0}")]
    Unknown(String),
    #[error("{name} directive expected zero arguments, got {got}")]
    UnexpectedArguments { name: &'static str, got: usize },
    #[error("returns_retained directive expected one argument, got {0}")]
    ReturnsRetainedArity(usize),
    #[error("Invalid returns_retained directive mode '{0}'")]
    ReturnsRetainedMode(String),
    #[error("{0} directive expects a value after ':'")]
    MissingValue(&'static str),
}

type Constructor = fn(&str, &[String]) -> Result<DirectiveKind, DirectiveError>;
type Predicate = fn(&str) -> bool;

fn no_arguments(name: &'static str, args: &[String]) -> Result<(), DirectiveError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(DirectiveError::UnexpectedArguments {
            name,
            got: args.len(),
        })
    }
}

fn build_new(_: &str, args: &[String]) -> Result<DirectiveKind, DirectiveError> {
    no_arguments("new", args).map(|()| DirectiveKind::New)
}

fn build_disable(_: &str, args: &[String]) -> Result<DirectiveKind, DirectiveError> {
    no_arguments("disable", args).map(|()| DirectiveKind::Disable)
}

fn build_supr_tramp(_: &str, args: &[String]) -> Result<DirectiveKind, DirectiveError> {
    no_arguments("supr_tramp", args).map(|()| DirectiveKind::SuprTramp)
}

fn build_ignore_import(_: &str, args: &[String]) -> Result<DirectiveKind, DirectiveError> {
    no_arguments("ignore_import", args).map(|()| DirectiveKind::IgnoreImport)
}

fn build_returns_retained(_: &str, args: &[String]) -> Result<DirectiveKind, DirectiveError> {
    let [mode] = args else {
        return Err(DirectiveError::ReturnsRetainedArity(args.len()));
    };
    match mode.as_str() {
        "true" => Ok(DirectiveKind::ReturnsRetained(true)),
        "false" => Ok(DirectiveKind::ReturnsRetained(false)),
        other => Err(DirectiveError::ReturnsRetainedMode(other.to_string())),
    }
}

fn build_selector(name: &str, args: &[String]) -> Result<DirectiveKind, DirectiveError> {
    no_arguments("selector", args)?;
    match name.split_once(':') {
        Some((_, value)) if !value.is_empty() => Ok(DirectiveKind::Selector(value.to_string())),
        _ => Err(DirectiveError::MissingValue("selector")),
    }
}

/// Alternate spellings of `returns_retained` (`returnsRetained`,
/// `returns-retained`).
fn is_returns_retained_alias(name: &str) -> bool {
    let folded: String = name.chars().filter(|c| *c != '_' && *c != '-').collect();
    folded.eq_ignore_ascii_case("returnsretained")
}

// ── Registered directives ────────────────────────────────────────────────

/// The shared, location-uniqued part of a directive.
#[derive(Debug, Serialize)]
pub struct DirectiveBase {
    pub name: String,
    pub arguments: Vec<String>,
    pub location: SourceLocation,
    #[serde(skip)]
    used: AtomicBool,
}

impl DirectiveBase {
    pub fn is_used(&self) -> bool {
        self.used.load(Ordering::Acquire)
    }

    pub fn mark_used(&self) {
        self.used.store(true, Ordering::Release);
    }
}

/// A resolved directive: shared identity plus its validated kind.
#[derive(Debug, Clone)]
pub struct Directive {
    base: Arc<DirectiveBase>,
    pub kind: DirectiveKind,
}

impl Directive {
    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn arguments(&self) -> &[String] {
        &self.base.arguments
    }

    pub fn location(&self) -> &SourceLocation {
        &self.base.location
    }

    pub fn is_used(&self) -> bool {
        self.base.is_used()
    }

    pub fn mark_used(&self) {
        self.base.mark_used()
    }

    /// True if both handles refer to the same registered comment.
    pub fn same_identity(&self, other: &Directive) -> bool {
        Arc::ptr_eq(&self.base, &other.base)
    }
}

impl Serialize for Directive {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.base.serialize(serializer)
    }
}

// ── Registry ─────────────────────────────────────────────────────────────

type DirectiveKey = (Arc<str>, usize);

pub struct DirectiveRegistry {
    exact: HashMap<&'static str, Constructor>,
    prefix: HashMap<&'static str, Constructor>,
    custom: Vec<(Predicate, Constructor)>,
    schemas: BTreeSet<String>,
    bases: Mutex<HashMap<DirectiveKey, Arc<DirectiveBase>>>,
}

impl DirectiveRegistry {
    /// Registry with the built-in catalog and the given enabled schemas.
    pub fn new<S: Into<String>>(schemas: impl IntoIterator<Item = S>) -> Self {
        let exact: HashMap<&'static str, Constructor> = [
            ("new", build_new as Constructor),
            ("disable", build_disable),
            ("supr_tramp", build_supr_tramp),
            ("ignore_import", build_ignore_import),
            ("returns_retained", build_returns_retained),
        ]
        .into_iter()
        .collect();
        let prefix: HashMap<&'static str, Constructor> =
            [("selector", build_selector as Constructor)].into_iter().collect();
        let custom: Vec<(Predicate, Constructor)> = vec![(
            is_returns_retained_alias as Predicate,
            build_returns_retained as Constructor,
        )];

        Self {
            exact,
            prefix,
            custom,
            schemas: schemas.into_iter().map(Into::into).collect(),
            bases: Mutex::new(HashMap::new()),
        }
    }

    pub fn schemas(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().map(String::as_str)
    }

    /// Resolve a comment body found at `location`.
    ///
    /// Returns `Ok(None)` when the text is not a directive for the enabled
    /// schemas, `Ok(Some(_))` for a registered directive, and `Err` when the
    /// marker matched but the catalog rejected the name or arguments.
    pub fn resolve(
        &self,
        text: &str,
        location: &SourceLocation,
    ) -> Result<Option<Directive>, DirectiveError> {
        let Some(body) = self.directive_body(text) else {
            return Ok(None);
        };
        let mut words = body.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let arguments: Vec<String> = words.map(str::to_string).collect();
        let build = self.lookup(name)?;

        let key: DirectiveKey = (Arc::clone(&location.file), location.offset);
        let mut bases = self.bases.lock();
        let (base, inserted) = match bases.get(&key) {
            Some(existing) => (Arc::clone(existing), false),
            None => {
                let base = Arc::new(DirectiveBase {
                    name: name.to_string(),
                    arguments,
                    location: location.clone(),
                    used: AtomicBool::new(false),
                });
                bases.insert(key.clone(), Arc::clone(&base));
                (base, true)
            }
        };

        match build(&base.name, &base.arguments) {
            Ok(kind) => Ok(Some(Directive { base, kind })),
            Err(err) => {
                if inserted {
                    bases.remove(&key);
                }
                Err(err)
            }
        }
    }

    /// Registered directives whose `used` flag is still false, in
    /// (file, offset) order.
    pub fn unused(&self) -> Vec<Arc<DirectiveBase>> {
        let mut unused: Vec<Arc<DirectiveBase>> = self
            .bases
            .lock()
            .values()
            .filter(|base| !base.is_used())
            .cloned()
            .collect();
        unused.sort_by(|a, b| a.location.cmp(&b.location));
        unused
    }

    /// Number of registered directives.
    pub fn len(&self) -> usize {
        self.bases.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Strip the marker and optional schema gate, returning the body.
    fn directive_body<'a>(&self, text: &'a str) -> Option<&'a str> {
        let rest = text.strip_prefix(DIRECTIVE_PREFIX)?;
        if let Some(body) = rest.strip_prefix(':') {
            return Some(body);
        }
        let gated = rest.strip_prefix('[')?;
        let (schema, after) = gated.split_once(']')?;
        let body = after.strip_prefix(':')?;
        self.schemas.contains(schema).then_some(body)
    }

    fn lookup(&self, name: &str) -> Result<Constructor, DirectiveError> {
        if let Some(build) = self.exact.get(name) {
            return Ok(*build);
        }
        let head = name.split_once(':').map_or(name, |(head, _)| head);
        if let Some(build) = self.prefix.get(head) {
            return Ok(*build);
        }
        self.custom
            .iter()
            .find(|(matches, _)| matches(name))
            .map(|(_, build)| *build)
            .ok_or_else(|| DirectiveError::Unknown(name.to_string()))
    }
}

impl Default for DirectiveRegistry {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl std::fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectiveRegistry")
            .field("schemas", &self.schemas)
            .field("registered", &self.len())
            .finish()
    }
}
