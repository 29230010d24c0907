//! Module dependency aggregation, namespace usage and graph-wide complexity.

use crate::fanout::{fan_out, Gathered, UnitFailure};
use codeindex_core::{
    ComplexityAnalyzer, ComplexityFinding, ProjectGraph, Result, SharedProvider, SymbolIndexer,
    SymbolKind,
};
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

/// Label used for symbols declared outside any namespace.
pub const GLOBAL_NAMESPACE: &str = "<global>";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    ModuleReference,
    ExternalReference,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub kind: DependencyKind,
    /// Number of modules that reference it.
    pub usage_count: usize,
    pub referenced_by: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamespaceUsage {
    pub namespace: String,
    pub usage_count: usize,
    pub types: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyAnalysis {
    pub name: String,
    pub dependencies: Vec<Dependency>,
    /// Most used namespace first.
    pub namespace_usage: Vec<NamespaceUsage>,
    /// Groups of modules that reference each other in a cycle.
    pub cycles: Vec<Vec<String>>,
    /// Types and members; namespaces are not counted.
    pub total_symbols: usize,
    pub public_symbols: usize,
    pub internal_symbols: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<UnitFailure>,
}

/// What one module contributes to the graph-wide analysis.
#[derive(Debug, Default)]
struct ModuleSummary {
    namespaces: HashMap<String, (usize, BTreeSet<String>)>,
    total: usize,
    public: usize,
    internal: usize,
}

pub struct DependencyAnalyzer {
    provider: SharedProvider,
    platform_namespaces: Arc<Vec<String>>,
}

impl DependencyAnalyzer {
    pub fn new(provider: SharedProvider) -> Self {
        Self {
            provider,
            platform_namespaces: Arc::new(vec!["System".to_string(), "Microsoft".to_string()]),
        }
    }

    pub fn with_platform_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.platform_namespaces = Arc::new(namespaces);
        self
    }

    pub async fn analyze_dependencies(&self, graph: &Arc<ProjectGraph>) -> Result<DependencyAnalysis> {
        let summaries = fan_out(graph, |graph, module| {
            let provider = Arc::clone(&self.provider);
            let platform = Arc::clone(&self.platform_namespaces);
            async move {
                let compilation = provider.compile(&graph, &module).await?;
                let mut summary = ModuleSummary::default();
                SymbolIndexer::new(&compilation).walk(|entry| {
                    if entry.kind() == SymbolKind::Namespace {
                        return;
                    }
                    summary.total += 1;
                    if entry.info.accessibility.is_public() {
                        summary.public += 1;
                    }
                    if entry.info.accessibility.is_internal() {
                        summary.internal += 1;
                    }

                    let namespace = if entry.namespace.is_empty() {
                        GLOBAL_NAMESPACE
                    } else {
                        entry.namespace
                    };
                    if is_platform_namespace(namespace, &platform) {
                        return;
                    }
                    let type_name = match entry.kind() {
                        SymbolKind::Type => entry.full_name,
                        _ => entry.containing_type.unwrap_or(entry.full_name),
                    };
                    let slot = summary.namespaces.entry(namespace.to_string()).or_default();
                    slot.0 += 1;
                    slot.1.insert(type_name.to_string());
                });
                Ok(summary)
            }
        })
        .await;

        let mut analysis = DependencyAnalysis {
            name: graph.name(),
            dependencies: aggregate_dependencies(graph),
            cycles: module_cycles(graph),
            failures: summaries.failures,
            ..Default::default()
        };

        let mut namespaces: HashMap<String, (usize, BTreeSet<String>)> = HashMap::new();
        for summary in summaries.items {
            analysis.total_symbols += summary.total;
            analysis.public_symbols += summary.public;
            analysis.internal_symbols += summary.internal;
            for (namespace, (count, types)) in summary.namespaces {
                let slot = namespaces.entry(namespace).or_default();
                slot.0 += count;
                slot.1.extend(types);
            }
        }

        analysis.namespace_usage = namespaces
            .into_iter()
            .map(|(namespace, (usage_count, types))| NamespaceUsage {
                namespace,
                usage_count,
                types,
            })
            .collect();
        analysis.namespace_usage.sort_by(|a, b| {
            b.usage_count
                .cmp(&a.usage_count)
                .then_with(|| a.namespace.cmp(&b.namespace))
        });

        info!(
            graph = %analysis.name,
            dependencies = analysis.dependencies.len(),
            symbols = analysis.total_symbols,
            cycles = analysis.cycles.len(),
            "dependency analysis finished"
        );
        Ok(analysis)
    }

    /// Routines at or above `threshold` across every file of the graph. A
    /// file listed by several modules is analyzed once, by the first.
    pub async fn analyze_complexity(
        &self,
        graph: &Arc<ProjectGraph>,
        threshold: u32,
    ) -> Result<Gathered<ComplexityFinding>> {
        let analyzer = ComplexityAnalyzer::new(threshold);
        let per_module = fan_out(graph, |graph, module| {
            let provider = Arc::clone(&self.provider);
            async move {
                let mut findings = Vec::new();
                let mut failures = Vec::new();
                for file in &module.files {
                    let owner = graph.module_of_file(file).map(|m| m.name.as_str());
                    if owner != Some(module.name.as_str()) {
                        continue;
                    }
                    match provider.file_model(&graph, file).await {
                        Ok(Some(model)) => findings.extend(analyzer.analyze_tree(&model.syntax)),
                        Ok(None) => {}
                        Err(err) => {
                            warn!(file = %file.display(), error = %err, "complexity analysis failed; skipping file");
                            failures.push(UnitFailure::new(file.display().to_string(), err));
                        }
                    }
                }
                Ok((findings, failures))
            }
        })
        .await;

        let mut gathered = Gathered {
            items: Vec::new(),
            failures: per_module.failures,
        };
        for (findings, failures) in per_module.items {
            gathered.items.extend(findings);
            gathered.failures.extend(failures);
        }

        info!(
            threshold,
            findings = gathered.items.len(),
            failures = gathered.failures.len(),
            "complexity analysis finished"
        );
        Ok(gathered)
    }
}

/// Prefix match on a segment boundary: `System` covers `System.IO` but not
/// `SystemTools`.
pub fn is_platform_namespace(namespace: &str, platform: &[String]) -> bool {
    platform.iter().any(|prefix| {
        namespace == prefix
            || namespace
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

/// One entry per (name, kind), in first-observed order.
fn aggregate_dependencies(graph: &ProjectGraph) -> Vec<Dependency> {
    let mut dependencies: Vec<Dependency> = Vec::new();
    let mut index: HashMap<(String, DependencyKind), usize> = HashMap::new();

    for module in &graph.modules {
        let observed = module
            .module_references
            .iter()
            .map(|name| (name, DependencyKind::ModuleReference))
            .chain(
                module
                    .external_references
                    .iter()
                    .map(|name| (name, DependencyKind::ExternalReference)),
            );
        for (name, kind) in observed {
            match index.get(&(name.clone(), kind)) {
                Some(&slot) => {
                    let dependency = &mut dependencies[slot];
                    dependency.usage_count += 1;
                    if !dependency.referenced_by.contains(&module.name) {
                        dependency.referenced_by.push(module.name.clone());
                    }
                }
                None => {
                    index.insert((name.clone(), kind), dependencies.len());
                    dependencies.push(Dependency {
                        name: name.clone(),
                        kind,
                        usage_count: 1,
                        referenced_by: vec![module.name.clone()],
                    });
                }
            }
        }
    }
    dependencies
}

/// Strongly connected groups of two or more modules, each sorted by name.
fn module_cycles(graph: &ProjectGraph) -> Vec<Vec<String>> {
    let mut references: DiGraph<&str, ()> = DiGraph::new();
    let nodes: HashMap<&str, _> = graph
        .modules
        .iter()
        .map(|module| (module.name.as_str(), references.add_node(module.name.as_str())))
        .collect();

    for module in &graph.modules {
        let from = nodes[module.name.as_str()];
        for target in &module.module_references {
            if let Some(&to) = nodes.get(target.as_str()) {
                references.add_edge(from, to, ());
            }
        }
    }

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&references)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            let mut names: Vec<String> = component
                .into_iter()
                .map(|node| references[node].to_string())
                .collect();
            names.sort();
            names
        })
        .collect();
    cycles.sort();
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeindex_core::test_fixtures::{
        module, CompilationBuilder, FileModelBuilder, FixtureProvider, TypeBuilder,
    };
    use codeindex_core::{Accessibility, ProjectGraphProvider};
    use std::path::Path;

    fn graph() -> ProjectGraph {
        let mut modules = vec![
            module("Core", &["core/User.cs"], &["Shared"]),
            module("Web", &["web/Api.cs", "core/User.cs"], &["Core", "Shared"]),
            module("Shared", &["shared/Util.cs"], &["Web"]),
            module("Tests", &["tests/UserTests.cs"], &["Core"]),
        ];
        modules[0].external_references = vec!["Newtonsoft.Json".into()];
        modules[1].external_references = vec!["Newtonsoft.Json".into()];
        ProjectGraph::new("/repo/Shop.sln", modules)
    }

    async fn analyzer(provider: FixtureProvider) -> (DependencyAnalyzer, Arc<ProjectGraph>) {
        let provider: SharedProvider = Arc::new(provider);
        let graph = Arc::new(provider.load_graph(Path::new("/repo/Shop.sln")).await.unwrap());
        (DependencyAnalyzer::new(provider), graph)
    }

    fn provider() -> FixtureProvider {
        FixtureProvider::new()
            .with_graph(graph())
            .with_compilation(
                CompilationBuilder::new("Core")
                    .with_type(
                        TypeBuilder::new("Shop.Models.User", "core/User.cs", 1)
                            .property("Name", 2)
                            .method("Validate", 3)
                            .with_member_accessibility(Accessibility::Internal),
                    )
                    .with_type(
                        TypeBuilder::new("Shop.Models.Order", "core/User.cs", 10)
                            .accessibility(Accessibility::Internal),
                    )
                    .build(),
            )
            .with_compilation(
                CompilationBuilder::new("Web")
                    .with_type(TypeBuilder::new("Shop.Web.Api", "web/Api.cs", 0).method("Get", 1))
                    .with_type(
                        TypeBuilder::new("System.Extensions.Helper", "web/Api.cs", 20)
                            .accessibility(Accessibility::Private),
                    )
                    .build(),
            )
            .with_compilation(
                CompilationBuilder::new("Shared")
                    .with_type(TypeBuilder::new("Util", "shared/Util.cs", 0))
                    .build(),
            )
    }

    #[tokio::test]
    async fn test_dependencies_are_counted_once_per_kind() {
        let (analyzer, graph) = analyzer(provider()).await;
        let analysis = analyzer.analyze_dependencies(&graph).await.unwrap();

        assert_eq!(analysis.name, "Shop");
        let summary: Vec<(&str, DependencyKind, usize)> = analysis
            .dependencies
            .iter()
            .map(|d| (d.name.as_str(), d.kind, d.usage_count))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Shared", DependencyKind::ModuleReference, 2),
                ("Newtonsoft.Json", DependencyKind::ExternalReference, 2),
                ("Core", DependencyKind::ModuleReference, 2),
                ("Web", DependencyKind::ModuleReference, 1),
            ]
        );
        assert_eq!(analysis.dependencies[2].referenced_by, vec!["Web", "Tests"]);
    }

    #[tokio::test]
    async fn test_namespace_usage_and_counts() {
        let (analyzer, graph) = analyzer(provider()).await;
        let analysis = analyzer.analyze_dependencies(&graph).await.unwrap();

        // User, Name, Validate, Order, Api, Get, Helper, Util
        assert_eq!(analysis.total_symbols, 8);
        assert_eq!(analysis.internal_symbols, 2);
        assert_eq!(analysis.public_symbols, 5);

        let usage: Vec<(&str, usize)> = analysis
            .namespace_usage
            .iter()
            .map(|n| (n.namespace.as_str(), n.usage_count))
            .collect();
        assert_eq!(
            usage,
            vec![("Shop.Models", 4), ("Shop.Web", 2), ("<global>", 1)]
        );
        let models = &analysis.namespace_usage[0];
        assert_eq!(
            models.types.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["Shop.Models.Order", "Shop.Models.User"]
        );
    }

    #[tokio::test]
    async fn test_cycles() {
        let (analyzer, graph) = analyzer(provider()).await;
        let analysis = analyzer.analyze_dependencies(&graph).await.unwrap();
        assert_eq!(analysis.cycles, vec![vec!["Core", "Shared", "Web"]]);
    }

    #[tokio::test]
    async fn test_failed_module_is_skipped() {
        let (analyzer, graph) = analyzer(provider().failing_module("Web")).await;
        let analysis = analyzer.analyze_dependencies(&graph).await.unwrap();
        assert_eq!(analysis.total_symbols, 5);
        assert_eq!(analysis.failures.len(), 1);
        assert_eq!(analysis.failures[0].unit, "Web");
    }

    #[tokio::test]
    async fn test_complexity_threshold() {
        let provider = provider()
            .with_file_model(
                FileModelBuilder::new("core/User.cs", "Core", "Shop.Models.User", 1)
                    .routine("Validate", 3, 4)
                    .routine("Normalize", 12, 6)
                    .build(),
            )
            .with_file_model(
                FileModelBuilder::new("web/Api.cs", "Web", "Shop.Web.Api", 0)
                    .routine("Get", 1, 9)
                    .build(),
            )
            .failing_file("shared/Util.cs");
        let (analyzer, graph) = analyzer(provider).await;

        let gathered = analyzer.analyze_complexity(&graph, 5).await.unwrap();
        let found: Vec<(&str, u32)> = gathered
            .items
            .iter()
            .map(|f| (f.routine.as_str(), f.complexity))
            .collect();
        // core/User.cs belongs to Core even though Web lists it too.
        assert_eq!(found, vec![("Normalize", 6), ("Get", 9)]);
        assert_eq!(gathered.failures.len(), 1);
        assert_eq!(gathered.failures[0].unit, "shared/Util.cs");
    }

    #[test]
    fn test_platform_namespace_prefix() {
        let platform = vec!["System".to_string()];
        assert!(is_platform_namespace("System", &platform));
        assert!(is_platform_namespace("System.Collections.Generic", &platform));
        assert!(!is_platform_namespace("SystemTools", &platform));
        assert!(!is_platform_namespace("Acme.System", &platform));
    }
}
