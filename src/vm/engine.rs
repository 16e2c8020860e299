//! Seam to the virtual machine that runs assembled code

use crate::vm::fault::VmFault;
use crate::vm::sandbox::SandboxFs;
use crate::vm::value::{InstanceRef, VmValue};

/// Class resolved inside the VM
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassHandle {
    /// Internal name
    pub name: String,
    pub id: u64,
}

impl ClassHandle {
    pub fn new(name: impl Into<String>, id: u64) -> Self {
        Self { name: name.into(), id }
    }
}

/// A virtual machine the integration drives from its worker threads.
///
/// Calls are serialized by the integration; implementations need not be `Sync`.
pub trait VirtualMachine: Send {
    /// Bring the VM up. File access must go through `fs`.
    fn bootstrap(&mut self, fs: &SandboxFs) -> Result<(), VmFault>;

    /// Look up a class by internal name. `Ok(None)` when no such class exists,
    /// `Err` when it exists but failed to load.
    fn find_class(&mut self, name: &str) -> Result<Option<ClassHandle>, VmFault>;

    /// Run the static initializer if it has not run yet
    fn initialize_class(&mut self, class: &ClassHandle) -> Result<(), VmFault>;

    /// Invoke a method. `args` starts with the receiver for instance methods.
    fn invoke(
        &mut self,
        class: &ClassHandle,
        name: &str,
        descriptor: &str,
        is_static: bool,
        args: &[VmValue],
    ) -> Result<VmValue, VmFault>;

    /// Text of a `java/lang/String` instance
    fn read_utf8(&self, instance: &InstanceRef) -> Option<String>;
}
