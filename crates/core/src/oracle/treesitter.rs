//! tree-sitter-ruby oracle. Feature-gated behind `treesitter`.
//!
//! tree-sitter always produces a tree; the text is valid when that tree holds
//! no ERROR or MISSING nodes.

use std::io::Write;

use tree_sitter::{Node, Parser};

use super::SyntaxOracle;
use crate::error::OracleError;

pub struct TreeSitterOracle;

/// First ERROR or MISSING node in document order.
fn first_problem<'t>(node: Node<'t>) -> Option<Node<'t>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_problem)
}

impl SyntaxOracle for TreeSitterOracle {
    fn check(&self, text: &str, diagnostics: &mut dyn Write) -> Result<bool, OracleError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_ruby::LANGUAGE.into())
            .map_err(|e| OracleError::Unavailable(format!("tree-sitter-ruby: {e}")))?;

        let tree = parser
            .parse(text, None)
            .ok_or_else(|| OracleError::Failed("tree-sitter returned no tree".to_string()))?;
        let root = tree.root_node();

        match first_problem(root) {
            None => Ok(true),
            Some(node) => {
                let what = if node.is_missing() { "missing" } else { "unexpected" };
                writeln!(
                    diagnostics,
                    "-:{}: syntax error, {what} {}",
                    node.start_position().row + 1,
                    node.kind()
                )
                .map_err(|e| OracleError::Failed(e.to_string()))?;
                Ok(false)
            }
        }
    }

    fn name(&self) -> &str {
        "tree-sitter"
    }
}
