// snare_rt — runtime support for generated snare glue
//
// The call-state dispatch protocol that generated trampolines consult on
// every intercepted invocation, and the backend interface that installs
// hooks at activation time.

pub mod backend;
pub mod call_state;
pub mod hook;
pub mod tweak;

pub use backend::{
    Backend, Completion, EntryPoint, FunctionTarget, Hooker, InstallError, MethodTarget,
    TableBackend,
};
pub use call_state::{CallState, Transition};
pub use hook::{
    dispatch_class, dispatch_function, request_class, request_function, ClassRequest,
    FunctionRequest,
};
pub use tweak::{activate, DefaultTweak, HookDescriptor, HookError, HookTarget, OriginalSlot, Tweak};
