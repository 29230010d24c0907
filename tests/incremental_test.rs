mod common;

use codeindex_core::test_fixtures::{module, FixtureProvider};
use codeindex_core::{IndexConfig, ProjectGraph};
use codeindex_workspace::IndexService;
use common::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

fn service(provider: &Arc<FixtureProvider>, config: IndexConfig) -> IndexService {
    IndexService::new(provider.clone(), config).unwrap()
}

#[tokio::test]
async fn test_only_modified_files_are_reanalyzed() {
    let provider = Arc::new(shop_provider());
    let service = service(&provider, test_config());
    let solution = Path::new(SOLUTION);

    let first = service.analyze(solution, None).await.unwrap();
    assert_eq!(first.processed_file_count, 3);
    assert_eq!(first.analyzed_file_count, 3);
    assert_eq!(first.reused_file_count, 0);
    assert_eq!(first.symbols.len(), 6);
    assert_eq!(first.complexity_findings.len(), 1);
    assert_eq!(first.complexity_findings[0].routine, "Checkout");

    let second = service.analyze(solution, None).await.unwrap();
    assert_eq!(second.analyzed_file_count, 0);
    assert_eq!(second.reused_file_count, 3);
    assert_eq!(provider.total_file_model_calls(), 3);
    assert_eq!(second.symbols, first.symbols);

    provider.set_modified(ORDER_FILE, SystemTime::now() + Duration::from_secs(1));
    let third = service.analyze(solution, None).await.unwrap();
    assert_eq!(third.analyzed_file_count, 1);
    assert_eq!(third.reused_file_count, 2);
    assert_eq!(provider.file_model_calls(Path::new(ORDER_FILE)), 2);
    assert_eq!(provider.file_model_calls(Path::new(WIDGET_FILE)), 1);
    assert_eq!(third.symbols, first.symbols);
    assert!(third.start_time <= third.end_time);
}

#[tokio::test]
async fn test_batch_size_does_not_change_results() {
    let sequential = IndexConfig {
        max_concurrency: 1,
        batch_size: Some(1),
        ..test_config()
    };
    let parallel = IndexConfig {
        max_concurrency: 4,
        batch_size: Some(8),
        ..test_config()
    };

    let one = service(&Arc::new(shop_provider()), sequential)
        .analyze(Path::new(SOLUTION), None)
        .await
        .unwrap();
    let many = service(&Arc::new(shop_provider()), parallel)
        .analyze(Path::new(SOLUTION), None)
        .await
        .unwrap();

    assert_eq!(one.symbols, many.symbols);
    assert_eq!(one.complexity_findings, many.complexity_findings);
    let files: Vec<_> = one
        .symbols
        .iter()
        .filter_map(|s| s.file.clone())
        .collect::<Vec<_>>();
    assert_eq!(files.first(), Some(&PathBuf::from(WIDGET_FILE)));
    assert_eq!(files.last(), Some(&PathBuf::from(APP_FILE)));
}

#[tokio::test]
async fn test_changed_files_are_deduplicated() {
    let provider = Arc::new(shop_provider());
    let service = service(&provider, test_config());
    let changed = vec![PathBuf::from(APP_FILE), PathBuf::from(APP_FILE)];

    let result = service
        .analyze(Path::new(SOLUTION), Some(changed.as_slice()))
        .await
        .unwrap();
    assert_eq!(result.processed_file_count, 1);
    assert_eq!(result.symbols.len(), 2);
    assert_eq!(provider.total_file_model_calls(), 1);
}

#[tokio::test]
async fn test_failed_files_are_retried() {
    let provider = Arc::new(shop_provider().failing_file(ORDER_FILE));
    let service = service(&provider, test_config());

    let result = service.analyze(Path::new(SOLUTION), None).await.unwrap();
    assert_eq!(result.analyzed_file_count, 2);
    assert_eq!(result.failures.len(), 1);
    assert!(result.failures[0].unit.contains("Order.cs"));
    assert_eq!(service.file_cache().len(), 2);

    let again = service.analyze(Path::new(SOLUTION), None).await.unwrap();
    assert_eq!(again.reused_file_count, 2);
    assert_eq!(again.failures.len(), 1);
    assert_eq!(provider.file_model_calls(Path::new(ORDER_FILE)), 2);
}

#[tokio::test]
async fn test_durable_cache_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = test_config();
    config.cache.durable_path = Some(dir.path().join("cache"));

    {
        let provider = Arc::new(shop_provider());
        let first = service(&provider, config.clone());
        let result = first.analyze(Path::new(SOLUTION), None).await.unwrap();
        assert_eq!(result.analyzed_file_count, 3);
    }

    let provider = Arc::new(shop_provider());
    let restarted = service(&provider, config);
    let result = restarted.analyze(Path::new(SOLUTION), None).await.unwrap();
    assert_eq!(result.reused_file_count, 3);
    assert_eq!(result.symbols.len(), 6);
    assert_eq!(provider.load_calls(), 0);
    assert_eq!(provider.total_file_model_calls(), 0);
    assert!(restarted.file_stats().durable_hits >= 3);
}

#[tokio::test]
async fn test_graph_beyond_fast_capacity_is_reused() {
    let names: Vec<String> = (0..1100).map(|i| format!("/big/src/File{i}.cs")).collect();
    let files: Vec<&str> = names.iter().map(String::as_str).collect();
    let provider = Arc::new(FixtureProvider::new().with_graph(ProjectGraph::new(
        "/big/Big.sln",
        vec![module("Big", &files, &[])],
    )));
    let service = service(&provider, IndexConfig::default());
    let solution = Path::new("/big/Big.sln");

    let first = service.analyze(solution, None).await.unwrap();
    assert_eq!(first.analyzed_file_count, 1100);

    let second = service.analyze(solution, None).await.unwrap();
    assert_eq!(second.reused_file_count, 1100);
    assert_eq!(second.analyzed_file_count, 0);
    assert_eq!(provider.total_file_model_calls(), 1100);
    assert_eq!(service.file_cache().len(), 1100);
}
