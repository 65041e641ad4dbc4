//! Per-diagram visibility filter

use serde::{Deserialize, Serialize};

/// Which tables and schemas are visible on a diagram.
///
/// `None` means no filter (everything visible); `Some(vec![])` means
/// nothing visible. The two are never conflated in storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramFilter {
    #[serde(default)]
    pub diagram_id: String,
    #[serde(default)]
    pub table_ids: Option<Vec<String>>,
    #[serde(default)]
    pub schemas_ids: Option<Vec<String>>,
}

impl DiagramFilter {
    /// A filter that hides nothing.
    pub fn unfiltered(diagram_id: impl Into<String>) -> Self {
        Self {
            diagram_id: diagram_id.into(),
            table_ids: None,
            schemas_ids: None,
        }
    }

    pub fn is_table_visible(&self, table_id: &str) -> bool {
        self.table_ids
            .as_ref()
            .is_none_or(|ids| ids.iter().any(|id| id == table_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_and_empty_are_distinct() {
        let unfiltered: DiagramFilter =
            serde_json::from_str(r#"{"diagramId":"d1","tableIds":null,"schemasIds":null}"#).unwrap();
        let hidden: DiagramFilter =
            serde_json::from_str(r#"{"diagramId":"d1","tableIds":[],"schemasIds":[]}"#).unwrap();

        assert_ne!(unfiltered, hidden);
        assert!(unfiltered.is_table_visible("t1"));
        assert!(!hidden.is_table_visible("t1"));

        let json = serde_json::to_value(&unfiltered).unwrap();
        assert!(json["tableIds"].is_null());
        let json = serde_json::to_value(&hidden).unwrap();
        assert_eq!(json["tableIds"], serde_json::json!([]));
    }
}
