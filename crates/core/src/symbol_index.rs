//! Flattens the namespace/type tree of a compilation into [`SymbolRecord`]s.
//!
//! Traversal order is fixed: a namespace is emitted before its types, each
//! type before its members (in declared order) and nested types, and child
//! namespaces come after the types of their parent. Ranking and reference
//! deduplication rely on this order for tie-breaks.

use crate::graph::{
    Compilation, NamespaceDecl, SymbolInfo, SymbolKind, SymbolRecord, TypeDecl,
};
use crate::syntax::FileModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Set of symbol kinds a query is interested in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindFilter(BTreeSet<SymbolKind>);

impl KindFilter {
    pub fn all() -> Self {
        Self(SymbolKind::ALL.into_iter().collect())
    }

    pub fn only(kinds: &[SymbolKind]) -> Self {
        Self(kinds.iter().copied().collect())
    }

    pub fn contains(&self, kind: SymbolKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for KindFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<SymbolKind> for KindFilter {
    fn from_iter<I: IntoIterator<Item = SymbolKind>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A symbol as seen during the walk, before it is turned into a record.
#[derive(Debug, Clone, Copy)]
pub struct IndexEntry<'a> {
    pub info: &'a SymbolInfo,
    pub full_name: &'a str,
    pub namespace: &'a str,
    /// Full name of the enclosing type, for types and members.
    pub containing_type: Option<&'a str>,
}

impl IndexEntry<'_> {
    pub fn kind(&self) -> SymbolKind {
        self.info.kind
    }

    pub fn to_record(&self, module: &str) -> SymbolRecord {
        let location = self.info.primary_location();
        SymbolRecord {
            name: self.info.name.clone(),
            full_name: self.full_name.to_string(),
            kind: self.info.kind,
            accessibility: self.info.accessibility,
            namespace: self.namespace.to_string(),
            module: module.to_string(),
            file: location.map(|l| l.file.clone()),
            line: location.map(|l| l.line()).unwrap_or(0),
            summary: self.info.summary(),
        }
    }
}

enum Visit<'a> {
    Namespace {
        decl: &'a NamespaceDecl,
        parent: String,
    },
    Type {
        decl: &'a TypeDecl,
        namespace: String,
        container: Option<String>,
    },
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Read-only walker over one compilation; cheap to create per caller.
pub struct SymbolIndexer<'a> {
    compilation: &'a Compilation,
}

impl<'a> SymbolIndexer<'a> {
    pub fn new(compilation: &'a Compilation) -> Self {
        Self { compilation }
    }

    pub fn module(&self) -> &str {
        &self.compilation.module
    }

    /// Visit every declared symbol with an explicit work stack.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(IndexEntry<'_>),
    {
        let mut stack = vec![Visit::Namespace {
            decl: &self.compilation.global_namespace,
            parent: String::new(),
        }];

        while let Some(item) = stack.pop() {
            match item {
                Visit::Namespace { decl, parent } => {
                    let full_name = if decl.is_global() {
                        parent.clone()
                    } else {
                        let full_name = qualify(&parent, &decl.info.name);
                        visit(IndexEntry {
                            info: &decl.info,
                            full_name: &full_name,
                            namespace: &parent,
                            containing_type: None,
                        });
                        full_name
                    };

                    // Pushed in reverse so they pop in declared order:
                    // types first, then child namespaces.
                    for child in decl.namespaces.iter().rev() {
                        stack.push(Visit::Namespace {
                            decl: child,
                            parent: full_name.clone(),
                        });
                    }
                    for ty in decl.types.iter().rev() {
                        stack.push(Visit::Type {
                            decl: ty,
                            namespace: full_name.clone(),
                            container: None,
                        });
                    }
                }
                Visit::Type {
                    decl,
                    namespace,
                    container,
                } => {
                    let prefix = container.as_deref().unwrap_or(&namespace);
                    let full_name = qualify(prefix, &decl.info.name);
                    visit(IndexEntry {
                        info: &decl.info,
                        full_name: &full_name,
                        namespace: &namespace,
                        containing_type: container.as_deref(),
                    });

                    for member in &decl.members {
                        let member_name = qualify(&full_name, &member.name);
                        visit(IndexEntry {
                            info: member,
                            full_name: &member_name,
                            namespace: &namespace,
                            containing_type: Some(full_name.as_str()),
                        });
                    }

                    for nested in decl.nested_types.iter().rev() {
                        stack.push(Visit::Type {
                            decl: nested,
                            namespace: namespace.clone(),
                            container: Some(full_name.clone()),
                        });
                    }
                }
            }
        }
    }

    /// Every symbol whose kind is in `filter`, in traversal order.
    pub fn index(&self, filter: &KindFilter) -> Vec<SymbolRecord> {
        let module = self.module();
        let mut records = Vec::new();
        self.walk(|entry| {
            if filter.contains(entry.kind()) {
                records.push(entry.to_record(module));
            }
        });
        records
    }

    /// Symbols named exactly `name` (case-insensitive).
    pub fn find_symbol(&self, name: &str) -> Vec<SymbolRecord> {
        let module = self.module();
        let mut records = Vec::new();
        self.walk(|entry| {
            if entry.info.name.eq_ignore_ascii_case(name) {
                records.push(entry.to_record(module));
            }
        });
        records
    }

    /// Symbols whose primary declaration lives in `file`.
    pub fn symbols_in_file(&self, file: &Path) -> Vec<SymbolRecord> {
        let module = self.module();
        let mut records = Vec::new();
        self.walk(|entry| {
            if entry
                .info
                .primary_location()
                .is_some_and(|location| location.file == file)
            {
                records.push(entry.to_record(module));
            }
        });
        records
    }
}

/// Records for every syntax node of `model` that introduces a declaration,
/// located at that node.
pub fn extract_declarations(model: &FileModel) -> Vec<SymbolRecord> {
    let file = &model.syntax.file;
    model
        .syntax
        .root
        .descendants()
        .filter_map(|node| {
            let id = node.declares.as_ref()?;
            let declared = model.semantic.declared_symbol(id)?;
            Some(SymbolRecord {
                name: declared.info.name.clone(),
                full_name: declared.full_name.clone(),
                kind: declared.info.kind,
                accessibility: declared.info.accessibility,
                namespace: declared.namespace.clone(),
                module: model.semantic.module.clone(),
                file: Some(file.clone()),
                line: node.range.start.line + 1,
                summary: declared.info.summary(),
            })
        })
        .collect()
}
