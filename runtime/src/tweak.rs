// tweak.rs — Tweak lifecycle and hook activation
//
// Generated glue builds one `HookDescriptor` per hooked routine and calls
// `activate` with the project's tweak type (or `DefaultTweak`).

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{Backend, EntryPoint, FunctionTarget, InstallError, MethodTarget};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookTarget {
    Function(FunctionTarget),
    Method(MethodTarget),
}

/// Storage for the entry point a hook replaced. Filled in during activation.
#[derive(Debug, Default)]
pub struct OriginalSlot(Mutex<Option<EntryPoint>>);

impl OriginalSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<EntryPoint> {
        *self.0.lock()
    }

    fn set(&self, entry: EntryPoint) {
        *self.0.lock() = Some(entry);
    }
}

/// Everything the backend needs to install one hook.
#[derive(Debug, Clone)]
pub struct HookDescriptor {
    /// Display name of the hook, used in error reports.
    pub name: String,
    pub target: HookTarget,
    pub replacement: EntryPoint,
    pub original: Arc<OriginalSlot>,
}

impl HookDescriptor {
    pub fn new(name: impl Into<String>, target: HookTarget, replacement: EntryPoint) -> Self {
        Self {
            name: name.into(),
            target,
            replacement,
            original: Arc::new(OriginalSlot::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Error in hook {hook}: {source}")]
pub struct HookError {
    pub hook: String,
    #[source]
    pub source: InstallError,
}

pub trait Tweak {
    /// Runs before any hook is installed.
    fn new() -> Self
    where
        Self: Sized;

    /// Runs once every hook has been installed (or reported).
    fn tweak_did_activate(&mut self) {}

    /// The default terminates the process through a panic.
    fn handle_error(&mut self, error: HookError) {
        panic!("{}", error);
    }
}

/// Used when a project declares no tweak of its own.
#[derive(Debug, Default)]
pub struct DefaultTweak;

impl Tweak for DefaultTweak {
    fn new() -> Self {
        DefaultTweak
    }
}

/// Construct `T`, install `hooks` through one backend batch, and report
/// failures to the tweak in hook order.
pub fn activate<T: Tweak, B: Backend + ?Sized>(backend: &mut B, hooks: Vec<HookDescriptor>) -> T {
    let mut tweak = T::new();
    let errors: Rc<RefCell<Vec<HookError>>> = Rc::new(RefCell::new(Vec::new()));

    tracing::debug!(hooks = hooks.len(), "activating tweak");
    let mut hooker = backend.make_hooker();
    for hook in hooks {
        let slot = Arc::clone(&hook.original);
        let name = hook.name;
        let sink = Rc::clone(&errors);
        let completion = Box::new(move |result: Result<EntryPoint, InstallError>| match result {
            Ok(orig) => slot.set(orig),
            Err(source) => sink.borrow_mut().push(HookError { hook: name, source }),
        });
        match hook.target {
            HookTarget::Function(target) => {
                hooker.add_function_hook(target, hook.replacement, completion)
            }
            HookTarget::Method(target) => hooker.add_method_hook(target, hook.replacement, completion),
        }
    }
    hooker.finalize();

    let errors = std::mem::take(&mut *errors.borrow_mut());
    for error in errors {
        tracing::warn!(%error, "hook installation failed");
        tweak.handle_error(error);
    }
    tweak.tweak_did_activate();
    tweak
}
