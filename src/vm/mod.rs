//! Bridge to a virtual machine that runs assembled methods

pub mod engine;
pub mod fault;
pub mod integration;
pub mod sandbox;
pub mod value;

pub use engine::{ClassHandle, VirtualMachine};
pub use fault::{ThrowableInfo, VmFault};
pub use integration::{Invocation, VmIntegration, VmOptions, VmState};
pub use sandbox::SandboxFs;
pub use value::{render, ArrayElements, ArrayRef, InstanceRef, StringDecoder, VmValue};
