//! Diagram rename/delete fan-out across the six child collections

use std::fmt;
use std::future::Future;
use tracing::{debug, error, warn};

use crate::{Error, Result};

/// A collection owned by a diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildCollection {
    Tables,
    Relationships,
    Dependencies,
    Areas,
    CustomTypes,
    DiagramFilter,
}

impl ChildCollection {
    pub const ALL: [ChildCollection; 6] = [
        ChildCollection::Tables,
        ChildCollection::Relationships,
        ChildCollection::Dependencies,
        ChildCollection::Areas,
        ChildCollection::CustomTypes,
        ChildCollection::DiagramFilter,
    ];

    /// Relational table holding the collection. Every one of them keys its
    /// owner by `diagram_id`.
    pub fn table(&self) -> &'static str {
        match self {
            ChildCollection::Tables => "db_tables",
            ChildCollection::Relationships => "db_relationships",
            ChildCollection::Dependencies => "db_dependencies",
            ChildCollection::Areas => "areas",
            ChildCollection::CustomTypes => "db_custom_types",
            ChildCollection::DiagramFilter => "diagram_filters",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChildCollection::Tables => "tables",
            ChildCollection::Relationships => "relationships",
            ChildCollection::Dependencies => "dependencies",
            ChildCollection::Areas => "areas",
            ChildCollection::CustomTypes => "custom types",
            ChildCollection::DiagramFilter => "diagram filter",
        }
    }
}

impl fmt::Display for ChildCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-collection results of one fan-out.
#[derive(Debug)]
pub struct CascadeOutcome {
    pub operation: &'static str,
    pub diagram_id: String,
    pub affected: Vec<(ChildCollection, usize)>,
    pub failed: Vec<(ChildCollection, Error)>,
}

impl CascadeOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Rows touched across all collections that succeeded.
    pub fn total_affected(&self) -> usize {
        self.affected.iter().map(|(_, n)| n).sum()
    }

    /// Log the failures, then surface them as one error. Steps that
    /// succeeded are not undone.
    pub fn into_result(self) -> Result<usize> {
        if self.failed.is_empty() {
            debug!(
                "Cascade {} of diagram {} touched {} rows",
                self.operation,
                self.diagram_id,
                self.total_affected()
            );
            return Ok(self.total_affected());
        }

        for (collection, e) in &self.failed {
            warn!(
                "Cascade {} of diagram {}: {} step failed: {}",
                self.operation, self.diagram_id, collection, e
            );
        }
        error!(
            "Cascade {} of diagram {} left {} of {} collections unchanged",
            self.operation,
            self.diagram_id,
            self.failed.len(),
            ChildCollection::ALL.len()
        );

        Err(Error::Cascade {
            operation: self.operation.to_string(),
            diagram_id: self.diagram_id,
            failed: self.failed.iter().map(|(c, _)| c.to_string()).collect(),
        })
    }
}

/// Run `step` for every child collection concurrently and gather the
/// results. No step is cancelled when another fails.
pub async fn fan_out<F, Fut>(operation: &'static str, diagram_id: &str, step: F) -> CascadeOutcome
where
    F: Fn(ChildCollection) -> Fut,
    Fut: Future<Output = Result<usize>>,
{
    let [tables, relationships, dependencies, areas, custom_types, filter] = ChildCollection::ALL;
    let results = tokio::join!(
        step(tables),
        step(relationships),
        step(dependencies),
        step(areas),
        step(custom_types),
        step(filter),
    );
    let results = [results.0, results.1, results.2, results.3, results.4, results.5];

    let mut outcome = CascadeOutcome {
        operation,
        diagram_id: diagram_id.to_string(),
        affected: Vec::new(),
        failed: Vec::new(),
    };
    for (collection, result) in ChildCollection::ALL.into_iter().zip(results) {
        match result {
            Ok(count) => outcome.affected.push((collection, count)),
            Err(e) => outcome.failed.push((collection, e)),
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fan_out_visits_every_collection() {
        let outcome = fan_out("delete", "d1", |collection| async move {
            Ok(if collection == ChildCollection::Tables { 3 } else { 1 })
        })
        .await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.affected.len(), 6);
        assert_eq!(outcome.into_result().unwrap(), 8);
    }

    #[tokio::test]
    async fn test_partial_failure_reports_failed_collections() {
        let outcome = fan_out("rename", "d1", |collection| async move {
            match collection {
                ChildCollection::Areas => Err(Error::Task("areas locked".to_string())),
                _ => Ok(1),
            }
        })
        .await;

        assert_eq!(outcome.affected.len(), 5);
        match outcome.into_result() {
            Err(Error::Cascade { operation, diagram_id, failed }) => {
                assert_eq!(operation, "rename");
                assert_eq!(diagram_id, "d1");
                assert_eq!(failed, vec!["areas".to_string()]);
            }
            other => panic!("expected cascade error, got {:?}", other),
        }
    }
}
