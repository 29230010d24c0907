//! Language-neutral syntax tree and semantic model handed over by the
//! provider for a single source file.

use crate::graph::{Range, SymbolId, SymbolInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    CompilationUnit,
    Namespace,
    TypeDeclaration,
    Method,
    Constructor,
    Accessor,
    Property,
    Field,
    Event,
    Block,
    Statement,
    Expression,
    If,
    Else,
    While,
    Do,
    For,
    ForEach,
    Switch,
    SwitchArm,
    Try,
    Catch,
    Finally,
    LogicalAnd,
    LogicalOr,
}

impl SyntaxKind {
    /// Nodes that own a body whose complexity is measured.
    pub fn is_routine(self) -> bool {
        matches!(
            self,
            SyntaxKind::Method | SyntaxKind::Constructor | SyntaxKind::Accessor
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyntaxNode {
    pub kind: SyntaxKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub range: Range,
    /// Set on nodes that introduce a declaration.
    #[serde(default)]
    pub declares: Option<SymbolId>,
    #[serde(default)]
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn new(kind: SyntaxKind, range: Range) -> Self {
        Self {
            kind,
            name: None,
            range,
            declares: None,
            children: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn declaring(mut self, id: SymbolId) -> Self {
        self.declares = Some(id);
        self
    }

    pub fn with_children(mut self, children: Vec<SyntaxNode>) -> Self {
        self.children = children;
        self
    }

    /// Pre-order walk over this node and every descendant, driven by an
    /// explicit stack so deeply nested input cannot exhaust the call stack.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a SyntaxNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a SyntaxNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyntaxTree {
    pub file: PathBuf,
    pub root: SyntaxNode,
}

/// What the semantic model knows about one declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeclaredSymbol {
    pub info: SymbolInfo,
    pub full_name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SemanticModel {
    pub module: String,
    #[serde(default)]
    pub symbols: HashMap<SymbolId, DeclaredSymbol>,
}

impl SemanticModel {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            symbols: HashMap::new(),
        }
    }

    pub fn declare(&mut self, symbol: DeclaredSymbol) {
        self.symbols.insert(symbol.info.id.clone(), symbol);
    }

    pub fn declared_symbol(&self, id: &SymbolId) -> Option<&DeclaredSymbol> {
        self.symbols.get(id)
    }
}

/// Syntax tree plus semantic model for one file. Both are dropped as soon as
/// the records derived from them have been extracted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileModel {
    pub syntax: SyntaxTree,
    pub semantic: SemanticModel,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(kind: SyntaxKind, line: u32) -> SyntaxNode {
        SyntaxNode::new(kind, Range::at_line(line, 0, 1))
    }

    #[test]
    fn test_descendants_is_preorder() {
        let tree = leaf(SyntaxKind::Method, 0).with_children(vec![
            leaf(SyntaxKind::If, 1).with_children(vec![leaf(SyntaxKind::Block, 2)]),
            leaf(SyntaxKind::While, 3),
        ]);

        let lines: Vec<u32> = tree.descendants().map(|n| n.range.start.line).collect();
        assert_eq!(lines, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_deep_nesting_does_not_recurse() {
        let mut node = leaf(SyntaxKind::Block, 0);
        for depth in 1..50_000 {
            node = leaf(SyntaxKind::Block, depth).with_children(vec![node]);
        }
        assert_eq!(node.descendants().count(), 50_000);
        // Dropping a deep tree recurses in the generated drop glue; leak it
        // instead of relying on the test thread's stack size.
        std::mem::forget(node);
    }

    #[test]
    fn test_routine_kinds() {
        assert!(SyntaxKind::Method.is_routine());
        assert!(SyntaxKind::Accessor.is_routine());
        assert!(!SyntaxKind::If.is_routine());
    }
}
