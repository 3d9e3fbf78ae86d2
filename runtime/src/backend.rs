// backend.rs — Hook installation interface
//
// A backend replaces the implementation behind a function symbol or a
// (class, selector) pair and hands back the previous one. Installation is
// batched through a `Hooker`; the one-off helpers on `Backend` wrap a
// single-request batch.
//
// Preconditions: every completion passed to a hooker runs by the time
//   `finalize` returns.
// Postconditions: a successful request yields the entry point that was
//   installed before the replacement.
// Failure modes: unknown targets and duplicate requests in one batch
//   (`InstallError`).
// Side effects: mutates the backend's dispatch state on `finalize`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// An opaque code address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryPoint(pub usize);

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A free function to hook.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FunctionTarget {
    /// A named symbol, optionally scoped to one image.
    Symbol { image: Option<String>, name: String },
    Address(EntryPoint),
}

impl FunctionTarget {
    pub fn symbol(name: impl Into<String>) -> Self {
        FunctionTarget::Symbol {
            image: None,
            name: name.into(),
        }
    }
}

impl fmt::Display for FunctionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionTarget::Symbol { image: Some(image), name } => write!(f, "{}`{}", image, name),
            FunctionTarget::Symbol { image: None, name } => f.write_str(name),
            FunctionTarget::Address(addr) => write!(f, "function at {}", addr),
        }
    }
}

/// A method to hook, identified by class and selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodTarget {
    pub class: String,
    pub selector: String,
    pub is_class_method: bool,
}

impl MethodTarget {
    pub fn instance(class: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            selector: selector.into(),
            is_class_method: false,
        }
    }

    pub fn class_method(class: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            selector: selector.into(),
            is_class_method: true,
        }
    }
}

impl fmt::Display for MethodTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sigil = if self.is_class_method { '+' } else { '-' };
        write!(f, "{}[{} {}]", sigil, self.class, self.selector)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstallError {
    #[error("Could not find function {0}")]
    FunctionNotFound(FunctionTarget),
    #[error("Could not find method {0}")]
    MethodNotFound(MethodTarget),
    #[error("{0} is hooked more than once in the same batch")]
    AlreadyHooked(String),
    #[error("hooker finalized without completing the request")]
    Incomplete,
}

/// Receives the original entry point (or the failure) for one request.
pub type Completion = Box<dyn FnOnce(Result<EntryPoint, InstallError>)>;

/// A batch of pending installations.
pub trait Hooker {
    fn add_function_hook(
        &mut self,
        target: FunctionTarget,
        replacement: EntryPoint,
        completion: Completion,
    );

    fn add_method_hook(&mut self, target: MethodTarget, replacement: EntryPoint, completion: Completion);

    /// Apply the batch. Every completion has run when this returns.
    fn finalize(self: Box<Self>);
}

pub trait Backend {
    fn make_hooker(&mut self) -> Box<dyn Hooker + '_>;

    /// Install a single function hook. Prefer batching through `make_hooker`.
    fn hook_function(
        &mut self,
        target: FunctionTarget,
        replacement: EntryPoint,
    ) -> Result<EntryPoint, InstallError> {
        let (slot, completion) = one_off();
        let mut hooker = self.make_hooker();
        hooker.add_function_hook(target, replacement, completion);
        hooker.finalize();
        take(&slot)
    }

    /// Install a single method hook. Prefer batching through `make_hooker`.
    fn hook_method(
        &mut self,
        target: MethodTarget,
        replacement: EntryPoint,
    ) -> Result<EntryPoint, InstallError> {
        let (slot, completion) = one_off();
        let mut hooker = self.make_hooker();
        hooker.add_method_hook(target, replacement, completion);
        hooker.finalize();
        take(&slot)
    }
}

type Slot = Arc<Mutex<Option<Result<EntryPoint, InstallError>>>>;

fn one_off() -> (Slot, Completion) {
    let slot: Slot = Arc::new(Mutex::new(None));
    let writer = Arc::clone(&slot);
    (slot, Box::new(move |result| *writer.lock() = Some(result)))
}

fn take(slot: &Slot) -> Result<EntryPoint, InstallError> {
    slot.lock().take().unwrap_or(Err(InstallError::Incomplete))
}

// ── TableBackend ───────────────────────────────────────────────────────────

/// In-process dispatch tables standing in for a symbol or method table.
#[derive(Debug, Default)]
pub struct TableBackend {
    functions: HashMap<FunctionTarget, EntryPoint>,
    methods: HashMap<MethodTarget, EntryPoint>,
}

impl TableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_function(&mut self, target: FunctionTarget, entry: EntryPoint) {
        self.functions.insert(target, entry);
    }

    pub fn define_method(&mut self, target: MethodTarget, entry: EntryPoint) {
        self.methods.insert(target, entry);
    }

    /// The entry point currently answering calls to `target`.
    pub fn resolve_function(&self, target: &FunctionTarget) -> Option<EntryPoint> {
        self.functions.get(target).copied()
    }

    pub fn resolve_method(&self, target: &MethodTarget) -> Option<EntryPoint> {
        self.methods.get(target).copied()
    }

    fn install_function(
        &mut self,
        target: &FunctionTarget,
        replacement: EntryPoint,
    ) -> Result<EntryPoint, InstallError> {
        match self.functions.get_mut(target) {
            Some(entry) => Ok(std::mem::replace(entry, replacement)),
            None => Err(InstallError::FunctionNotFound(target.clone())),
        }
    }

    fn install_method(
        &mut self,
        target: &MethodTarget,
        replacement: EntryPoint,
    ) -> Result<EntryPoint, InstallError> {
        match self.methods.get_mut(target) {
            Some(entry) => Ok(std::mem::replace(entry, replacement)),
            None => Err(InstallError::MethodNotFound(target.clone())),
        }
    }
}

impl Backend for TableBackend {
    fn make_hooker(&mut self) -> Box<dyn Hooker + '_> {
        Box::new(TableHooker {
            table: self,
            pending: Vec::new(),
        })
    }
}

enum Pending {
    Function(FunctionTarget, EntryPoint, Completion),
    Method(MethodTarget, EntryPoint, Completion),
}

struct TableHooker<'a> {
    table: &'a mut TableBackend,
    pending: Vec<Pending>,
}

impl Hooker for TableHooker<'_> {
    fn add_function_hook(
        &mut self,
        target: FunctionTarget,
        replacement: EntryPoint,
        completion: Completion,
    ) {
        self.pending
            .push(Pending::Function(target, replacement, completion));
    }

    fn add_method_hook(&mut self, target: MethodTarget, replacement: EntryPoint, completion: Completion) {
        self.pending.push(Pending::Method(target, replacement, completion));
    }

    fn finalize(self: Box<Self>) {
        let TableHooker { table, pending } = *self;
        tracing::debug!(requests = pending.len(), "applying hook batch");

        let mut seen_functions = HashSet::new();
        let mut seen_methods = HashSet::new();
        for request in pending {
            match request {
                Pending::Function(target, replacement, completion) => {
                    let result = if seen_functions.insert(target.clone()) {
                        table.install_function(&target, replacement)
                    } else {
                        Err(InstallError::AlreadyHooked(target.to_string()))
                    };
                    completion(result);
                }
                Pending::Method(target, replacement, completion) => {
                    let result = if seen_methods.insert(target.clone()) {
                        table.install_method(&target, replacement)
                    } else {
                        Err(InstallError::AlreadyHooked(target.to_string()))
                    };
                    completion(result);
                }
            }
        }
    }
}
