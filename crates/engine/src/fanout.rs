//! One task per module, joined before aggregation. A failing module is
//! logged and reported, never allowed to cancel its siblings.

use codeindex_core::{ModuleInfo, ProjectGraph, ProviderError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// A module or file whose analysis failed and was skipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitFailure {
    pub unit: String,
    pub message: String,
}

impl UnitFailure {
    pub fn new(unit: impl Into<String>, message: impl ToString) -> Self {
        Self {
            unit: unit.into(),
            message: message.to_string(),
        }
    }
}

/// Results of a fan-out together with the failures that were contained.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Gathered<T> {
    pub items: Vec<T>,
    pub failures: Vec<UnitFailure>,
}

impl<T> Default for Gathered<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> Gathered<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Gathered<U> {
        Gathered {
            items: self.items.into_iter().map(f).collect(),
            failures: self.failures,
        }
    }
}

impl<T> Gathered<Vec<T>> {
    pub fn flatten(self) -> Gathered<T> {
        Gathered {
            items: self.items.into_iter().flatten().collect(),
            failures: self.failures,
        }
    }
}

/// Run `task` once per module of `graph` concurrently and collect the
/// successful outputs in module order.
///
/// Dropping the returned future aborts the tasks still running.
pub async fn fan_out<T, F, Fut>(graph: &Arc<ProjectGraph>, task: F) -> Gathered<T>
where
    F: Fn(Arc<ProjectGraph>, ModuleInfo) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>> + Send + 'static,
    T: Send + 'static,
{
    let mut set = JoinSet::new();
    for (index, module) in graph.modules.iter().enumerate() {
        let name = module.name.clone();
        let work = task(Arc::clone(graph), module.clone());
        set.spawn(async move { (index, name, work.await) });
    }

    let mut slots: Vec<Option<T>> = Vec::with_capacity(graph.modules.len());
    slots.resize_with(graph.modules.len(), || None);
    let mut reported = vec![false; graph.modules.len()];
    let mut failures = Vec::new();

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, name, Ok(output))) => {
                debug!(module = %name, "module analyzed");
                slots[index] = Some(output);
                reported[index] = true;
            }
            Ok((index, name, Err(err))) => {
                warn!(module = %name, error = %err, "module analysis failed; skipping");
                failures.push((index, UnitFailure::new(name, err)));
                reported[index] = true;
            }
            Err(err) => {
                warn!(error = %err, "module task did not complete");
            }
        }
    }

    // A panicked task never reports its index; attribute it afterwards.
    for (index, done) in reported.iter().enumerate() {
        if !done {
            failures.push((
                index,
                UnitFailure::new(graph.modules[index].name.clone(), "analysis task aborted"),
            ));
        }
    }
    failures.sort_by_key(|(index, _)| *index);

    Gathered {
        items: slots.into_iter().flatten().collect(),
        failures: failures.into_iter().map(|(_, failure)| failure).collect(),
    }
}
