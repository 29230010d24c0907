use crate::snapshot::SnapshotProvider;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codeindex_core::{IndexConfig, SymbolKind};
use codeindex_service::{
    AnalyzeChangesParams, AnalyzeCodeComplexityParams, AnalyzeDependenciesParams,
    FindReferencesParams, IndexService, SearchSymbolsParams, ToolResponse, Tools,
};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "codeindex")]
#[command(about = "Incremental code index over project graph snapshots")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search symbols by wildcard pattern [aliases: s]
    #[command(visible_alias = "s")]
    Search {
        /// Project graph snapshot
        snapshot: PathBuf,

        /// Pattern with `*` and `?` wildcards
        pattern: String,

        /// Restrict to symbol kinds (namespace|type|method|property|field|event)
        #[arg(short = 'k', long = "kind", value_parser = parse_kind)]
        kinds: Vec<SymbolKind>,

        /// Match case exactly
        #[arg(short = 'C', long = "case-sensitive")]
        case_sensitive: bool,

        /// Maximum results
        #[arg(short = 'm', long = "max")]
        limit: Option<usize>,
    },

    /// Find references to a symbol [aliases: refs, r]
    #[command(visible_alias = "refs", visible_alias = "r")]
    References {
        snapshot: PathBuf,

        /// Symbol name
        symbol: String,

        /// Include definitions in results
        #[arg(short = 'd', long = "include-defs")]
        include_definitions: bool,
    },

    /// Dependencies, namespace usage and module cycles [aliases: deps]
    #[command(visible_alias = "deps")]
    Dependencies { snapshot: PathBuf },

    /// Routines above a cyclomatic complexity threshold
    Complexity {
        snapshot: PathBuf,

        /// Report routines at or above this complexity
        #[arg(short = 't', long = "threshold")]
        threshold: Option<u32>,

        /// Only analyze this file
        #[arg(short = 'f', long = "file")]
        file: Option<PathBuf>,
    },

    /// Incremental analysis of changed (or all) files
    Analyze {
        snapshot: PathBuf,

        /// Changed files; every file when omitted
        #[arg(long = "changed")]
        changed: Vec<PathBuf>,
    },
}

fn parse_kind(value: &str) -> std::result::Result<SymbolKind, String> {
    value.parse()
}

impl Cli {
    pub fn load_config(&self) -> Result<IndexConfig> {
        match &self.config {
            Some(path) => IndexConfig::load(path)
                .with_context(|| format!("loading configuration {}", path.display())),
            None => Ok(IndexConfig::default()),
        }
    }

    /// Run the command and return its JSON result.
    pub async fn run(self) -> Result<Value> {
        let config = self.load_config()?;
        let service = IndexService::new(Arc::new(SnapshotProvider::new()), config)?;
        let tools = Tools::new(Arc::new(service));

        match self.command {
            Commands::Search {
                snapshot,
                pattern,
                kinds,
                case_sensitive,
                limit,
            } => {
                let response = tools
                    .search_symbols(SearchSymbolsParams {
                        solution_path: snapshot,
                        pattern,
                        kinds: (!kinds.is_empty()).then_some(kinds),
                        ignore_case: !case_sensitive,
                        limit,
                    })
                    .await?;
                to_json(response)
            }
            Commands::References {
                snapshot,
                symbol,
                include_definitions,
            } => {
                let response = tools
                    .find_references(FindReferencesParams {
                        solution_path: snapshot,
                        symbol_name: symbol,
                        include_definition: include_definitions,
                    })
                    .await?;
                to_json(response)
            }
            Commands::Dependencies { snapshot } => {
                let response = tools
                    .analyze_dependencies(AnalyzeDependenciesParams {
                        solution_path: snapshot,
                    })
                    .await?;
                to_json(response)
            }
            Commands::Complexity {
                snapshot,
                threshold,
                file,
            } => {
                let response = tools
                    .analyze_code_complexity(AnalyzeCodeComplexityParams {
                        solution_path: snapshot,
                        threshold,
                        file,
                    })
                    .await?;
                to_json(response)
            }
            Commands::Analyze { snapshot, changed } => {
                let response = tools
                    .analyze_changes(AnalyzeChangesParams {
                        solution_path: snapshot,
                        changed_files: (!changed.is_empty()).then_some(changed),
                    })
                    .await?;
                to_json(response)
            }
        }
    }
}

fn to_json<T: Serialize>(response: ToolResponse<T>) -> Result<Value> {
    Ok(serde_json::to_value(response)?)
}
