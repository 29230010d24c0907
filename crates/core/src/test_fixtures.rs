//! Shared fixtures and builders for tests.
//!
//! Line numbers passed to the builders are zero-based, matching what a
//! provider reports; records and findings expose them one-based.

use crate::error::ProviderError;
use crate::graph::{
    Accessibility, Compilation, Location, ModuleInfo, NamespaceDecl, ProjectGraph, Range,
    SymbolId, SymbolInfo, SymbolKind, SymbolUsage, TypeDecl, TypeKind,
};
use crate::provider::ProjectGraphProvider;
use crate::syntax::{DeclaredSymbol, FileModel, SemanticModel, SyntaxKind, SyntaxNode, SyntaxTree};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// In-memory provider with call counters and injectable failures.
#[derive(Default)]
pub struct FixtureProvider {
    graphs: HashMap<PathBuf, ProjectGraph>,
    compilations: HashMap<String, Arc<Compilation>>,
    file_models: HashMap<PathBuf, FileModel>,
    sources: HashMap<PathBuf, String>,
    failing_modules: HashSet<String>,
    failing_files: HashSet<PathBuf>,
    load_delay: Option<Duration>,
    compile_delay: Option<Duration>,
    load_calls: AtomicUsize,
    compile_calls: AtomicUsize,
    file_model_calls: Mutex<HashMap<PathBuf, usize>>,
    mtimes: Mutex<HashMap<PathBuf, SystemTime>>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(mut self, graph: ProjectGraph) -> Self {
        self.graphs.insert(graph.path.clone(), graph);
        self
    }

    pub fn with_compilation(mut self, compilation: Compilation) -> Self {
        self.compilations
            .insert(compilation.module.clone(), Arc::new(compilation));
        self
    }

    pub fn with_file_model(mut self, model: FileModel) -> Self {
        self.file_models.insert(model.syntax.file.clone(), model);
        self
    }

    pub fn with_source(mut self, file: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.sources.insert(file.into(), text.into());
        self
    }

    pub fn failing_module(mut self, module: impl Into<String>) -> Self {
        self.failing_modules.insert(module.into());
        self
    }

    pub fn failing_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.failing_files.insert(file.into());
        self
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    pub fn with_compile_delay(mut self, delay: Duration) -> Self {
        self.compile_delay = Some(delay);
        self
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn compile_calls(&self) -> usize {
        self.compile_calls.load(Ordering::SeqCst)
    }

    pub fn file_model_calls(&self, file: &Path) -> usize {
        self.file_model_calls.lock().get(file).copied().unwrap_or(0)
    }

    pub fn total_file_model_calls(&self) -> usize {
        self.file_model_calls.lock().values().sum()
    }

    /// Advance the modification time of `file` to now.
    pub fn touch(&self, file: impl Into<PathBuf>) {
        self.set_modified(file, SystemTime::now());
    }

    pub fn set_modified(&self, file: impl Into<PathBuf>, time: SystemTime) {
        self.mtimes.lock().insert(file.into(), time);
    }
}

#[async_trait]
impl ProjectGraphProvider for FixtureProvider {
    async fn load_graph(&self, path: &Path) -> Result<ProjectGraph, ProviderError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        self.graphs
            .get(path)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(path.to_path_buf()))
    }

    async fn compile(
        &self,
        _graph: &ProjectGraph,
        module: &ModuleInfo,
    ) -> Result<Arc<Compilation>, ProviderError> {
        self.compile_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.compile_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_modules.contains(&module.name) {
            return Err(ProviderError::Analysis {
                unit: module.name.clone(),
                reason: "injected failure".into(),
            });
        }
        Ok(self
            .compilations
            .get(&module.name)
            .cloned()
            .unwrap_or_else(|| Arc::new(CompilationBuilder::new(&module.name).build())))
    }

    async fn file_model(
        &self,
        _graph: &ProjectGraph,
        file: &Path,
    ) -> Result<Option<FileModel>, ProviderError> {
        *self
            .file_model_calls
            .lock()
            .entry(file.to_path_buf())
            .or_insert(0) += 1;
        if self.failing_files.contains(file) {
            return Err(ProviderError::Analysis {
                unit: file.display().to_string(),
                reason: "injected failure".into(),
            });
        }
        Ok(self.file_models.get(file).cloned())
    }

    async fn read_source(&self, file: &Path) -> Result<String, ProviderError> {
        self.sources
            .get(file)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(file.to_path_buf()))
    }

    async fn modified_time(&self, file: &Path) -> Result<SystemTime, ProviderError> {
        Ok(self
            .mtimes
            .lock()
            .get(file)
            .copied()
            .unwrap_or(SystemTime::UNIX_EPOCH))
    }
}

pub fn module(name: &str, files: &[&str], references: &[&str]) -> ModuleInfo {
    ModuleInfo {
        name: name.to_string(),
        files: files.iter().map(PathBuf::from).collect(),
        module_references: references.iter().map(|r| r.to_string()).collect(),
        external_references: Vec::new(),
    }
}

pub fn symbol_info(id: &str, name: &str, kind: SymbolKind, file: &str, line: u32) -> SymbolInfo {
    SymbolInfo {
        id: SymbolId::new(id),
        name: name.to_string(),
        kind,
        accessibility: Accessibility::Public,
        locations: vec![Location::new(file, Range::at_line(line, 4, name.len() as u32))],
        signature: None,
        documentation: None,
    }
}

fn split_name(full_name: &str) -> (&str, &str) {
    match full_name.rsplit_once('.') {
        Some((namespace, name)) => (namespace, name),
        None => ("", full_name),
    }
}

/// Builds a [`TypeDecl`] from a dotted full name such as `Acme.Widget`.
pub struct TypeBuilder {
    namespace: String,
    full_name: String,
    file: String,
    decl: TypeDecl,
}

impl TypeBuilder {
    pub fn new(full_name: &str, file: &str, line: u32) -> Self {
        let (namespace, name) = split_name(full_name);
        Self {
            namespace: namespace.to_string(),
            full_name: full_name.to_string(),
            file: file.to_string(),
            decl: TypeDecl {
                info: symbol_info(&format!("T:{full_name}"), name, SymbolKind::Type, file, line),
                type_kind: TypeKind::Class,
                members: Vec::new(),
                nested_types: Vec::new(),
            },
        }
    }

    pub fn id(&self) -> &SymbolId {
        &self.decl.info.id
    }

    pub fn type_kind(mut self, kind: TypeKind) -> Self {
        self.decl.type_kind = kind;
        self
    }

    pub fn accessibility(mut self, accessibility: Accessibility) -> Self {
        self.decl.info.accessibility = accessibility;
        self
    }

    pub fn documented(mut self, documentation: &str) -> Self {
        self.decl.info.documentation = Some(documentation.to_string());
        self
    }

    fn member(mut self, prefix: char, name: &str, kind: SymbolKind, line: u32) -> Self {
        let id = format!("{prefix}:{}.{name}", self.full_name);
        let info = symbol_info(&id, name, kind, &self.file, line);
        self.decl.members.push(info);
        self
    }

    pub fn method(self, name: &str, line: u32) -> Self {
        self.member('M', name, SymbolKind::Method, line)
    }

    pub fn property(self, name: &str, line: u32) -> Self {
        self.member('P', name, SymbolKind::Property, line)
    }

    pub fn field(self, name: &str, line: u32) -> Self {
        self.member('F', name, SymbolKind::Field, line)
    }

    pub fn event(self, name: &str, line: u32) -> Self {
        self.member('E', name, SymbolKind::Event, line)
    }

    /// Change the accessibility of the member added last.
    pub fn with_member_accessibility(mut self, accessibility: Accessibility) -> Self {
        if let Some(member) = self.decl.members.last_mut() {
            member.accessibility = accessibility;
        }
        self
    }

    pub fn nested(mut self, nested: TypeBuilder) -> Self {
        self.decl.nested_types.push(nested.decl);
        self
    }

    pub fn build(self) -> TypeDecl {
        self.decl
    }
}

pub struct CompilationBuilder {
    module: String,
    global: NamespaceDecl,
    usages: Vec<SymbolUsage>,
}

impl CompilationBuilder {
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            global: NamespaceDecl::global(),
            usages: Vec::new(),
        }
    }

    /// Add a type to the namespace taken from its full name; intermediate
    /// namespaces are created on demand.
    pub fn with_type(mut self, ty: TypeBuilder) -> Self {
        let namespace = namespace_mut(&mut self.global, &ty.namespace);
        namespace.types.push(ty.decl);
        self
    }

    pub fn with_namespace(mut self, dotted: &str) -> Self {
        namespace_mut(&mut self.global, dotted);
        self
    }

    /// Record a usage of the symbol with id `symbol` at `file:line`.
    pub fn with_usage(mut self, symbol: &str, file: &str, line: u32, character: u32) -> Self {
        self.usages.push(SymbolUsage {
            symbol: SymbolId::new(symbol),
            location: Location::new(file, Range::at_line(line, character, 1)),
        });
        self
    }

    pub fn build(self) -> Compilation {
        Compilation {
            module: self.module,
            global_namespace: self.global,
            usages: self.usages,
        }
    }
}

fn namespace_mut<'a>(global: &'a mut NamespaceDecl, dotted: &str) -> &'a mut NamespaceDecl {
    let mut current = global;
    let mut full_name = String::new();
    for segment in dotted.split('.').filter(|s| !s.is_empty()) {
        if !full_name.is_empty() {
            full_name.push('.');
        }
        full_name.push_str(segment);

        let position = current
            .namespaces
            .iter()
            .position(|ns| ns.info.name == segment);
        let index = match position {
            Some(index) => index,
            None => {
                let mut child = NamespaceDecl::global();
                child.info.id = SymbolId::new(format!("N:{full_name}"));
                child.info.name = segment.to_string();
                current.namespaces.push(child);
                current.namespaces.len() - 1
            }
        };
        current = &mut current.namespaces[index];
    }
    current
}

pub fn node(kind: SyntaxKind, line: u32, children: Vec<SyntaxNode>) -> SyntaxNode {
    SyntaxNode::new(kind, Range::at_line(line, 0, 1)).with_children(children)
}

/// A method whose body holds `complexity - 1` sibling `if` statements.
pub fn routine_with_complexity(name: &str, line: u32, complexity: u32) -> SyntaxNode {
    let branches = (1..complexity)
        .map(|i| node(SyntaxKind::If, line + i, vec![node(SyntaxKind::Block, line + i, vec![])]))
        .collect();
    node(
        SyntaxKind::Method,
        line,
        vec![node(SyntaxKind::Block, line, branches)],
    )
    .named(name)
}

/// Builds the syntax tree and semantic model of a file holding one type.
pub struct FileModelBuilder {
    file: PathBuf,
    module: String,
    namespace: String,
    type_name: String,
    type_line: u32,
    routines: Vec<(String, u32, u32)>,
}

impl FileModelBuilder {
    pub fn new(file: &str, module: &str, type_full_name: &str, type_line: u32) -> Self {
        let (namespace, name) = split_name(type_full_name);
        Self {
            file: PathBuf::from(file),
            module: module.to_string(),
            namespace: namespace.to_string(),
            type_name: name.to_string(),
            type_line,
            routines: Vec::new(),
        }
    }

    /// Add a method declared at `line` with the given cyclomatic complexity.
    pub fn routine(mut self, name: &str, line: u32, complexity: u32) -> Self {
        self.routines.push((name.to_string(), line, complexity.max(1)));
        self
    }

    pub fn build(self) -> FileModel {
        let file = self.file.to_string_lossy().into_owned();
        let type_full = if self.namespace.is_empty() {
            self.type_name.clone()
        } else {
            format!("{}.{}", self.namespace, self.type_name)
        };

        let mut semantic = SemanticModel::new(&self.module);
        let type_id = format!("T:{type_full}");
        semantic.declare(DeclaredSymbol {
            info: symbol_info(&type_id, &self.type_name, SymbolKind::Type, &file, self.type_line),
            full_name: type_full.clone(),
            namespace: self.namespace.clone(),
        });

        let mut methods = Vec::new();
        for (name, line, complexity) in &self.routines {
            let id = format!("M:{type_full}.{name}");
            semantic.declare(DeclaredSymbol {
                info: symbol_info(&id, name, SymbolKind::Method, &file, *line),
                full_name: format!("{type_full}.{name}"),
                namespace: self.namespace.clone(),
            });
            methods.push(routine_with_complexity(name, *line, *complexity).declaring(SymbolId::new(id)));
        }

        let declaration = node(SyntaxKind::TypeDeclaration, self.type_line, methods)
            .named(&self.type_name)
            .declaring(SymbolId::new(type_id));
        let body = if self.namespace.is_empty() {
            declaration
        } else {
            node(SyntaxKind::Namespace, 0, vec![declaration]).named(&self.namespace)
        };

        FileModel {
            syntax: SyntaxTree {
                file: self.file,
                root: node(SyntaxKind::CompilationUnit, 0, vec![body]),
            },
            semantic,
        }
    }
}
