//! Alias table: compile-time substitution of identifier operands

use crate::ast::SyntaxTree;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    values: HashMap<String, String>,
}

impl AliasTable {
    /// Collect every alias node; a later alias of the same name replaces the earlier one
    pub fn build(tree: &SyntaxTree) -> Self {
        let mut values = HashMap::new();
        for (_, alias) in tree.aliases() {
            values.insert(alias.name.clone(), alias.value.clone());
        }
        Self { values }
    }

    /// Substituted text for `name`, or `name` itself. Values are not re-expanded.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.values.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
