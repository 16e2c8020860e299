//! Syntax tree accepted by the assembler
//!
//! The tree is produced upstream by a parser for the textual assembly
//! language. It is flat: one node per source statement, in document order.
//! Nodes are stored in an arena and addressed by [`NodeId`].

mod nodes;

pub use nodes::*;

/// Problem reported by the upstream parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxProblem {
    pub line: usize,
    pub message: String,
}

impl SyntaxProblem {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SyntaxProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Parser output: the tree plus every problem found while building it
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub tree: SyntaxTree,
    pub problems: Vec<SyntaxProblem>,
}

impl ParseResult {
    pub fn new(tree: SyntaxTree) -> Self {
        Self {
            tree,
            problems: Vec::new(),
        }
    }

    pub fn with_problems(tree: SyntaxTree, problems: Vec<SyntaxProblem>) -> Self {
        Self { tree, problems }
    }

    pub fn is_success(&self) -> bool {
        self.problems.is_empty()
    }
}

impl From<SyntaxTree> for ParseResult {
    fn from(tree: SyntaxTree) -> Self {
        Self::new(tree)
    }
}
