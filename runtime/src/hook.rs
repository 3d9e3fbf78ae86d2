// hook.rs — Dispatch routes shared by generated trampolines and hook bodies
//
// A generated override calls `dispatch_class` / `dispatch_function` once per
// intercepted invocation. A hook body that wants the original (or ancestor)
// implementation calls `request_class` / `request_function`, which pushes the
// request and then re-enters the routine so the dispatch picks it up.

use crate::call_state::{CallState, Transition};

/// Requests a class-hook dispatch can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassRequest {
    /// Call the implementation that was installed before the hook.
    Orig,
    /// Call the immediate ancestor's implementation.
    Supr,
    /// Explicitly take the default route into the hook body.
    SelfCall,
}

/// Requests a function-hook dispatch can receive. Functions have no ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionRequest {
    Orig,
}

/// Route one class-hook invocation.
///
/// No pending request and `SelfCall` both run `hook`.
pub fn dispatch_class<T>(
    state: &CallState<ClassRequest>,
    hook: impl FnOnce() -> T,
    orig: impl FnOnce() -> T,
    supr: impl FnOnce() -> T,
) -> T {
    match state.fetch_request() {
        None | Some(ClassRequest::SelfCall) => hook(),
        Some(ClassRequest::Orig) => orig(),
        Some(ClassRequest::Supr) => supr(),
    }
}

/// Route one function-hook invocation.
pub fn dispatch_function<T>(
    state: &CallState<FunctionRequest>,
    hook: impl FnOnce() -> T,
    orig: impl FnOnce() -> T,
) -> T {
    match state.fetch_request() {
        None => hook(),
        Some(FunctionRequest::Orig) => orig(),
    }
}

/// Push `request` and run `trampoline`, which must trigger exactly one
/// dispatch on the same state.
pub fn request_class<T>(
    state: &CallState<ClassRequest>,
    request: ClassRequest,
    transition: Transition,
    trampoline: impl FnOnce() -> T,
) -> T {
    state.make_request(request, transition);
    trampoline()
}

pub fn request_function<T>(
    state: &CallState<FunctionRequest>,
    request: FunctionRequest,
    transition: Transition,
    trampoline: impl FnOnce() -> T,
) -> T {
    state.make_request(request, transition);
    trampoline()
}
