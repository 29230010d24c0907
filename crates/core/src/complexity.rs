use crate::syntax::{SyntaxKind, SyntaxNode, SyntaxTree};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One routine whose cyclomatic complexity reached the threshold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ComplexityFinding {
    pub routine: String,
    pub containing_type: Option<String>,
    pub namespace: String,
    pub file: PathBuf,
    /// One-based line of the routine declaration.
    pub line: u32,
    pub complexity: u32,
}

/// Number of decision points a single node contributes.
fn decision_weight(kind: SyntaxKind) -> u32 {
    match kind {
        SyntaxKind::If
        | SyntaxKind::While
        | SyntaxKind::Do
        | SyntaxKind::For
        | SyntaxKind::ForEach
        | SyntaxKind::Switch
        | SyntaxKind::Catch
        | SyntaxKind::LogicalAnd
        | SyntaxKind::LogicalOr => 1,
        _ => 0,
    }
}

/// McCabe complexity of a routine: one base path plus one per branch, loop,
/// multi-way branch, catch clause and short-circuit operator in its body.
/// Nested routines (local functions) are scored on their own and do not add
/// to the enclosing routine.
pub fn cyclomatic_complexity(routine: &SyntaxNode) -> u32 {
    let mut complexity = 1;
    let mut stack: Vec<&SyntaxNode> = routine.children.iter().collect();
    while let Some(node) = stack.pop() {
        if node.kind.is_routine() {
            continue;
        }
        complexity += decision_weight(node.kind);
        stack.extend(node.children.iter());
    }
    complexity
}

/// Reports routines at or above a complexity threshold.
#[derive(Debug, Clone, Copy)]
pub struct ComplexityAnalyzer {
    threshold: u32,
}

struct Frame<'a> {
    node: &'a SyntaxNode,
    namespace: String,
    container: Option<String>,
}

impl ComplexityAnalyzer {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Walk one file, tracking the enclosing namespace and type of each
    /// routine. Findings come back in source order.
    pub fn analyze_tree(&self, tree: &SyntaxTree) -> Vec<ComplexityFinding> {
        let mut findings = Vec::new();
        let mut stack = vec![Frame {
            node: &tree.root,
            namespace: String::new(),
            container: None,
        }];

        while let Some(Frame {
            node,
            namespace,
            container,
        }) = stack.pop()
        {
            let (namespace, container) = match (node.kind, node.name.as_deref()) {
                (SyntaxKind::Namespace, Some(name)) => (join(&namespace, name), None),
                (SyntaxKind::TypeDeclaration, Some(name)) => {
                    let ty = match &container {
                        Some(outer) => join(outer, name),
                        None => name.to_string(),
                    };
                    (namespace, Some(ty))
                }
                _ => (namespace, container),
            };

            if node.kind.is_routine() {
                let complexity = cyclomatic_complexity(node);
                if complexity >= self.threshold {
                    findings.push(ComplexityFinding {
                        routine: node.name.clone().unwrap_or_else(|| "<anonymous>".into()),
                        containing_type: container.clone(),
                        namespace: namespace.clone(),
                        file: tree.file.clone(),
                        line: node.range.start.line + 1,
                        complexity,
                    });
                }
            }

            for child in node.children.iter().rev() {
                stack.push(Frame {
                    node: child,
                    namespace: namespace.clone(),
                    container: container.clone(),
                });
            }
        }

        findings
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Highest complexity first; ties by file, then line.
pub fn rank_findings(findings: &mut [ComplexityFinding]) {
    findings.sort_by(|a, b| {
        b.complexity
            .cmp(&a.complexity)
            .then_with(|| a.file.cmp(&b.file))
            .then_with(|| a.line.cmp(&b.line))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Range;

    fn node(kind: SyntaxKind, line: u32, children: Vec<SyntaxNode>) -> SyntaxNode {
        SyntaxNode::new(kind, Range::at_line(line, 0, 1)).with_children(children)
    }

    fn routine(name: &str, line: u32, body: Vec<SyntaxNode>) -> SyntaxNode {
        node(SyntaxKind::Method, line, vec![node(SyntaxKind::Block, line, body)]).named(name)
    }

    fn two_ifs_and_a_loop() -> Vec<SyntaxNode> {
        vec![
            node(SyntaxKind::If, 2, vec![node(SyntaxKind::Block, 2, vec![])]),
            node(SyntaxKind::If, 4, vec![node(SyntaxKind::Else, 5, vec![])]),
            node(SyntaxKind::While, 6, vec![node(SyntaxKind::Statement, 7, vec![])]),
        ]
    }

    #[test]
    fn test_straight_line_routine_has_complexity_one() {
        let method = routine("Noop", 0, vec![node(SyntaxKind::Statement, 1, vec![])]);
        assert_eq!(cyclomatic_complexity(&method), 1);
    }

    #[test]
    fn test_two_ifs_and_a_loop() {
        let method = routine("Run", 1, two_ifs_and_a_loop());
        assert_eq!(cyclomatic_complexity(&method), 4);
    }

    #[test]
    fn test_logical_operator_adds_one() {
        let mut body = two_ifs_and_a_loop();
        body[0].children.push(node(SyntaxKind::LogicalAnd, 2, vec![]));
        let method = routine("Run", 1, body);
        assert_eq!(cyclomatic_complexity(&method), 5);
    }

    #[test]
    fn test_switch_catch_and_loops() {
        let body = vec![
            node(
                SyntaxKind::Switch,
                2,
                vec![
                    node(SyntaxKind::SwitchArm, 3, vec![]),
                    node(SyntaxKind::SwitchArm, 4, vec![]),
                ],
            ),
            node(
                SyntaxKind::Try,
                5,
                vec![
                    node(SyntaxKind::Catch, 6, vec![]),
                    node(SyntaxKind::Catch, 7, vec![]),
                    node(SyntaxKind::Finally, 8, vec![]),
                ],
            ),
            node(SyntaxKind::For, 9, vec![node(SyntaxKind::LogicalOr, 9, vec![])]),
            node(SyntaxKind::ForEach, 10, vec![]),
        ];
        // 1 + switch + 2 catch + for + || + foreach
        assert_eq!(cyclomatic_complexity(&routine("Mixed", 1, body)), 7);
    }

    #[test]
    fn test_nested_routine_is_scored_separately() {
        let mut body = two_ifs_and_a_loop();
        body.push(routine(
            "Local",
            8,
            vec![node(SyntaxKind::If, 9, vec![]), node(SyntaxKind::While, 10, vec![])],
        ));
        let outer = routine("Run", 1, body);
        assert_eq!(cyclomatic_complexity(&outer), 4);

        let tree = SyntaxTree {
            file: "a.cs".into(),
            root: node(SyntaxKind::TypeDeclaration, 0, vec![outer]).named("Jobs"),
        };
        let findings = ComplexityAnalyzer::new(1).analyze_tree(&tree);
        let scores: Vec<(&str, u32)> = findings
            .iter()
            .map(|f| (f.routine.as_str(), f.complexity))
            .collect();
        assert_eq!(scores, vec![("Run", 4), ("Local", 3)]);
    }

    #[test]
    fn test_threshold_filters_routines() {
        let mut complex_body = two_ifs_and_a_loop();
        complex_body.push(node(SyntaxKind::ForEach, 8, vec![]));
        complex_body.push(node(SyntaxKind::LogicalOr, 9, vec![]));

        let tree = SyntaxTree {
            file: "src/Jobs.cs".into(),
            root: node(
                SyntaxKind::CompilationUnit,
                0,
                vec![node(
                    SyntaxKind::Namespace,
                    0,
                    vec![node(
                        SyntaxKind::TypeDeclaration,
                        1,
                        vec![
                            routine("Simple", 2, two_ifs_and_a_loop()),
                            routine("Complex", 20, complex_body),
                        ],
                    )
                    .named("Scheduler")],
                )
                .named("Acme.Jobs")],
            ),
        };

        let findings = ComplexityAnalyzer::new(5).analyze_tree(&tree);
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.routine, "Complex");
        assert_eq!(finding.complexity, 6);
        assert_eq!(finding.containing_type.as_deref(), Some("Scheduler"));
        assert_eq!(finding.namespace, "Acme.Jobs");
        assert_eq!(finding.line, 21);

        let all = ComplexityAnalyzer::new(1).analyze_tree(&tree);
        let names: Vec<&str> = all.iter().map(|f| f.routine.as_str()).collect();
        assert_eq!(names, vec!["Simple", "Complex"]);
    }

    #[test]
    fn test_nested_types_are_qualified() {
        let tree = SyntaxTree {
            file: "a.cs".into(),
            root: node(
                SyntaxKind::TypeDeclaration,
                0,
                vec![node(SyntaxKind::TypeDeclaration, 1, vec![routine("Go", 2, vec![])])
                    .named("Inner")],
            )
            .named("Outer"),
        };
        let findings = ComplexityAnalyzer::new(1).analyze_tree(&tree);
        assert_eq!(findings[0].containing_type.as_deref(), Some("Outer.Inner"));
        assert_eq!(findings[0].namespace, "");
    }

    #[test]
    fn test_rank_findings() {
        let finding = |file: &str, line: u32, complexity: u32| ComplexityFinding {
            routine: format!("r{line}"),
            containing_type: None,
            namespace: String::new(),
            file: file.into(),
            line,
            complexity,
        };
        let mut findings = vec![finding("b.cs", 1, 7), finding("a.cs", 9, 12), finding("a.cs", 3, 7)];
        rank_findings(&mut findings);
        let order: Vec<(u32, u32)> = findings.iter().map(|f| (f.complexity, f.line)).collect();
        assert_eq!(order, vec![(12, 9), (7, 3), (7, 1)]);
    }
}
