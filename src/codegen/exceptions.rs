//! Exception range construction from try-catch statements

use crate::ast::SyntaxTree;
use crate::codegen::alias::AliasTable;
use crate::codegen::insn::LabelId;
use crate::codegen::labels::LabelTable;
use crate::error::{Error, LabelSite, Result};

/// Protected range `[start, end)` with its handler, in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRange {
    pub start: LabelId,
    pub end: LabelId,
    pub handler: LabelId,
    /// Internal name of the caught type; `None` catches everything
    pub catch_type: Option<String>,
}

/// Resolve every try-catch node against the label table.
///
/// The returned list keeps tree order: the JVM searches handlers in table
/// order, so it must never be sorted or merged.
pub fn build_ranges(tree: &SyntaxTree, labels: &LabelTable, aliases: &AliasTable) -> Result<Vec<ExceptionRange>> {
    let mut ranges = Vec::new();
    for (node, tc) in tree.try_catches() {
        let resolve = |site: LabelSite, name: &str| -> Result<LabelId> {
            let name = aliases.resolve(name);
            labels
                .get(name)
                .ok_or_else(|| Error::unresolved_label(site, name, node.line))
        };
        let start = resolve(LabelSite::Start, &tc.start)?;
        let end = resolve(LabelSite::End, &tc.end)?;
        let handler = resolve(LabelSite::Handler, &tc.handler)?;
        let catch_type = tc
            .catch_type
            .as_deref()
            .map(|t| aliases.resolve(t).to_string());
        ranges.push(ExceptionRange {
            start,
            end,
            handler,
            catch_type,
        });
    }
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;

    fn tree_with(labels: &[&str], catches: &[(&str, &str, &str, Option<&str>)]) -> SyntaxTree {
        let mut tree = SyntaxTree::new();
        let mut line = 1;
        for l in labels {
            tree.push(line, NodeKind::label(*l));
            line += 1;
        }
        for (s, e, h, t) in catches {
            tree.push(line, NodeKind::try_catch(*s, *e, *h, *t));
            line += 1;
        }
        tree
    }

    #[test]
    fn test_ranges_keep_declaration_order() {
        let tree = tree_with(
            &["A", "B", "C"],
            &[
                ("A", "B", "C", Some("java/lang/RuntimeException")),
                ("A", "B", "C", Some("java/lang/Exception")),
                ("A", "C", "C", None),
            ],
        );
        let labels = LabelTable::build(&tree);
        let ranges = build_ranges(&tree, &labels, &AliasTable::default()).expect("ranges");
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].catch_type.as_deref(), Some("java/lang/RuntimeException"));
        assert_eq!(ranges[1].catch_type.as_deref(), Some("java/lang/Exception"));
        assert_eq!(ranges[2].catch_type, None);
        assert_eq!(ranges[2].end, labels.get("C").expect("C"));
    }

    #[test]
    fn test_reports_first_unresolved_site() {
        let tree = tree_with(&["A"], &[("A", "missing_end", "missing_handler", None)]);
        let labels = LabelTable::build(&tree);
        match build_ranges(&tree, &labels, &AliasTable::default()) {
            Err(Error::UnresolvedLabel { site, name, line }) => {
                assert_eq!(site, LabelSite::End);
                assert_eq!(name, "missing_end");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_alias_resolves_labels_and_type() {
        let mut tree = tree_with(&["A", "B"], &[]);
        tree.push(3, NodeKind::alias("EX", "java/lang/Exception"));
        tree.push(4, NodeKind::alias("H", "B"));
        tree.push(5, NodeKind::try_catch("A", "B", "H", Some("EX")));
        let labels = LabelTable::build(&tree);
        let aliases = AliasTable::build(&tree);
        let ranges = build_ranges(&tree, &labels, &aliases).expect("ranges");
        assert_eq!(ranges[0].handler, labels.get("B").expect("B"));
        assert_eq!(ranges[0].catch_type.as_deref(), Some("java/lang/Exception"));
    }
}
