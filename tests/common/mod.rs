#![allow(dead_code)]

use codeindex_core::test_fixtures::{
    module, CompilationBuilder, FileModelBuilder, FixtureProvider, TypeBuilder,
};
use codeindex_core::{IndexConfig, ProjectGraph};

pub const SOLUTION: &str = "/shop/Shop.sln";
pub const WIDGET_FILE: &str = "/shop/Domain/Widget.cs";
pub const ORDER_FILE: &str = "/shop/Domain/Order.cs";
pub const APP_FILE: &str = "/shop/App/App.cs";

pub const APP_SOURCE: &str = "namespace Shop.App
{
    public class App
    {
        Widget main = new Widget();
        void Main() { main.Render(); }
    }
}
";

pub const WIDGET_SOURCE: &str = "namespace Shop.Domain
{
    public class Widget
    {
        public void Render() { }
    }
}
";

/// Two modules: `App` uses `Widget` from `Domain`.
pub fn shop_provider() -> FixtureProvider {
    FixtureProvider::new()
        .with_graph(ProjectGraph::new(
            SOLUTION,
            vec![
                module("Domain", &[WIDGET_FILE, ORDER_FILE], &[]),
                module("App", &[APP_FILE], &["Domain"]),
            ],
        ))
        .with_compilation(
            CompilationBuilder::new("Domain")
                .with_type(TypeBuilder::new("Shop.Domain.Widget", WIDGET_FILE, 2).method("Render", 4))
                .with_type(TypeBuilder::new("Shop.Domain.Order", ORDER_FILE, 2).method("Checkout", 4))
                .build(),
        )
        .with_compilation(
            CompilationBuilder::new("App")
                .with_type(TypeBuilder::new("Shop.App.App", APP_FILE, 2).method("Main", 5))
                .with_usage("T:Shop.Domain.Widget", APP_FILE, 4, 8)
                .with_usage("T:Shop.Domain.Widget", APP_FILE, 4, 26)
                .with_usage("M:Shop.Domain.Widget.Render", APP_FILE, 5, 27)
                .build(),
        )
        .with_file_model(
            FileModelBuilder::new(WIDGET_FILE, "Domain", "Shop.Domain.Widget", 2)
                .routine("Render", 4, 3)
                .build(),
        )
        .with_file_model(
            FileModelBuilder::new(ORDER_FILE, "Domain", "Shop.Domain.Order", 2)
                .routine("Checkout", 4, 12)
                .build(),
        )
        .with_file_model(
            FileModelBuilder::new(APP_FILE, "App", "Shop.App.App", 2)
                .routine("Main", 5, 6)
                .build(),
        )
        .with_source(APP_FILE, APP_SOURCE)
        .with_source(WIDGET_FILE, WIDGET_SOURCE)
}

pub fn test_config() -> IndexConfig {
    IndexConfig {
        max_concurrency: 4,
        request_timeout_secs: 10,
        ..IndexConfig::default()
    }
}
