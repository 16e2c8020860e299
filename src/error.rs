use std::fmt;
use thiserror::Error;

use crate::ast::SyntaxProblem;
use crate::codegen::descriptor::DescriptorError;
use crate::verify::VerifyRule;

/// Result type for jasm operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which reference of a node failed to resolve against the label table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSite {
    /// Try-catch range start
    Start,
    /// Try-catch range end
    End,
    /// Try-catch handler entry
    Handler,
    /// Branch, switch or line-number operand of an instruction
    Operand,
}

impl fmt::Display for LabelSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelSite::Start => f.write_str("try-catch start"),
            LabelSite::End => f.write_str("try-catch end"),
            LabelSite::Handler => f.write_str("try-catch handler"),
            LabelSite::Operand => f.write_str("instruction operand"),
        }
    }
}

/// Error types for the method assembler
#[derive(Error, Debug)]
pub enum Error {
    /// The upstream parser reported problems; all of them are carried along
    #[error("AST must not contain errors: {count} problem(s), first at line {line}", count = .problems.len())]
    Syntax {
        line: usize,
        problems: Vec<SyntaxProblem>,
    },

    #[error("AST must have definition statement")]
    MissingDefinition,

    #[error("No label associated with {site}: {name} (line {line})")]
    UnresolvedLabel {
        site: LabelSite,
        name: String,
        line: usize,
    },

    #[error("Label '{name}' placed twice: line {line}, first placed at line {first_line}")]
    DuplicateLabel {
        name: String,
        line: usize,
        first_line: usize,
    },

    #[error("Use of undeclared variable '{name}' (line {line})")]
    UndeclaredVariable { name: String, line: usize },

    #[error("Invalid operand at line {line}: {message}")]
    InvalidOperand { line: usize, message: String },

    #[error("Invalid descriptor at line {line}: {source}")]
    Descriptor {
        line: usize,
        #[source]
        source: DescriptorError,
    },

    /// Verification failed at `index` of the instruction sequence
    #[error("Verification failed at instruction {index} `{insn}`{}: {rule}", line_suffix(.line))]
    Verification {
        index: usize,
        line: Option<usize>,
        insn: String,
        rule: VerifyRule,
    },
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!(" (line {})", line),
        None => String::new(),
    }
}

impl Error {
    /// Create an operand error with location information
    pub fn invalid_operand(line: usize, message: impl Into<String>) -> Self {
        Self::InvalidOperand {
            line,
            message: message.into(),
        }
    }

    pub fn unresolved_label(site: LabelSite, name: impl Into<String>, line: usize) -> Self {
        Self::UnresolvedLabel {
            site,
            name: name.into(),
            line,
        }
    }

    /// Source line the error can be highlighted at, if it has one
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Syntax { line, .. }
            | Error::UnresolvedLabel { line, .. }
            | Error::DuplicateLabel { line, .. }
            | Error::UndeclaredVariable { line, .. }
            | Error::InvalidOperand { line, .. }
            | Error::Descriptor { line, .. } => Some(*line),
            Error::Verification { line, .. } => *line,
            Error::MissingDefinition => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_label_message_names_site() {
        let err = Error::unresolved_label(LabelSite::Handler, "L9", 4);
        assert_eq!(err.to_string(), "No label associated with try-catch handler: L9 (line 4)");
        assert_eq!(err.line(), Some(4));
    }

    #[test]
    fn test_syntax_error_counts_problems() {
        let err = Error::Syntax {
            line: 2,
            problems: vec![SyntaxProblem::new(2, "bad token"), SyntaxProblem::new(7, "eof")],
        };
        assert_eq!(err.to_string(), "AST must not contain errors: 2 problem(s), first at line 2");
    }

    #[test]
    fn test_missing_definition_has_no_line() {
        assert_eq!(Error::MissingDefinition.line(), None);
    }
}
