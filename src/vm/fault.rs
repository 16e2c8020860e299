//! Failures reported by the execution bridge

use std::fmt;

/// Exception thrown inside the virtual machine, with its cause chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrowableInfo {
    /// Internal name of the exception class
    pub class_name: String,
    pub message: Option<String>,
    pub cause: Option<Box<ThrowableInfo>>,
}

impl ThrowableInfo {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: None,
            cause: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_cause(mut self, cause: ThrowableInfo) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// This throwable followed by its causes, outermost first
    pub fn chain(&self) -> impl Iterator<Item = &ThrowableInfo> {
        std::iter::successors(Some(self), |t| t.cause.as_deref())
    }
}

impl fmt::Display for ThrowableInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.class_name, message),
            None => f.write_str(&self.class_name),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VmFault {
    #[error("Class not found in VM: {owner}")]
    ClassNotFound { owner: String },

    #[error("Failed to initialize class {owner}")]
    ClassInitFailed {
        owner: String,
        #[source]
        source: Box<VmFault>,
    },

    #[error("{0}")]
    Thrown(ThrowableInfo),

    #[error("VM is not initialized yet")]
    NotReady,

    #[error("VM failed to initialize: {message}")]
    InitFailed { message: String },

    #[error("VM integration is shut down")]
    Shutdown,
}

impl VmFault {
    /// Human-readable causes, outermost first
    pub fn cause_chain(&self) -> Vec<String> {
        let mut causes = Vec::new();
        let mut current = Some(self);
        while let Some(fault) = current {
            match fault {
                VmFault::ClassInitFailed { source, .. } => {
                    causes.push(fault.to_string());
                    current = Some(source);
                }
                VmFault::Thrown(throwable) => {
                    causes.extend(throwable.chain().map(ToString::to_string));
                    current = None;
                }
                _ => {
                    causes.push(fault.to_string());
                    current = None;
                }
            }
        }
        causes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_chain_walks_throwables() {
        let thrown = ThrowableInfo::new("java/lang/ExceptionInInitializerError")
            .with_cause(ThrowableInfo::new("java/lang/ArithmeticException").with_message("/ by zero"));
        let fault = VmFault::ClassInitFailed {
            owner: "Demo".to_string(),
            source: Box::new(VmFault::Thrown(thrown)),
        };
        assert_eq!(
            fault.cause_chain(),
            vec![
                "Failed to initialize class Demo".to_string(),
                "java/lang/ExceptionInInitializerError".to_string(),
                "java/lang/ArithmeticException: / by zero".to_string(),
            ]
        );
    }

    #[test]
    fn test_single_fault_chain() {
        let fault = VmFault::ClassNotFound { owner: "Missing".to_string() };
        assert_eq!(fault.cause_chain(), vec!["Class not found in VM: Missing".to_string()]);
    }
}
