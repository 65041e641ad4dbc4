use tabled::{settings::Style, Table, Tabled};

use crate::model::Diagram;

#[derive(Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "Collection")]
    pub label: String,
    #[tabled(rename = "Count")]
    pub value: String,
}

#[derive(Tabled)]
pub struct DiagramRow {
    #[tabled(rename = "Id")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Database")]
    pub database: String,
    #[tabled(rename = "Tables")]
    pub tables: String,
    #[tabled(rename = "Updated")]
    pub updated: String,
}

impl From<&Diagram> for DiagramRow {
    fn from(diagram: &Diagram) -> Self {
        let database = match &diagram.database_edition {
            Some(edition) => format!("{} ({})", diagram.database_type, edition),
            None => diagram.database_type.clone(),
        };
        Self {
            id: diagram.id.clone(),
            name: diagram.name.clone(),
            database,
            tables: diagram
                .tables
                .as_ref()
                .map_or_else(|| "-".to_string(), |t| t.len().to_string()),
            updated: diagram.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

#[derive(Default)]
struct TableBuilder {
    rows: Vec<SummaryRow>,
}

impl TableBuilder {
    fn new() -> Self {
        Self::default()
    }

    fn add_row(&mut self, label: &str, value: impl ToString) {
        self.rows.push(SummaryRow {
            label: label.to_string(),
            value: value.to_string(),
        });
    }

    fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn diagrams_table(diagrams: &[Diagram]) -> String {
    if diagrams.is_empty() {
        return String::new();
    }
    let rows: Vec<DiagramRow> = diagrams.iter().map(DiagramRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Child counts of a diagram loaded with all collections.
pub fn diagram_summary(diagram: &Diagram) -> String {
    fn count<T>(list: &Option<Vec<T>>) -> usize {
        list.as_ref().map_or(0, Vec::len)
    }

    let mut builder = TableBuilder::new();
    builder.add_row("tables", count(&diagram.tables));
    builder.add_row("relationships", count(&diagram.relationships));
    builder.add_row("dependencies", count(&diagram.dependencies));
    builder.add_row("areas", count(&diagram.areas));
    builder.add_row("custom types", count(&diagram.custom_types));
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DBTable;

    #[test]
    fn test_diagrams_table_lists_each_diagram() {
        let mut shop = Diagram::new("d1", "Shop", "postgres");
        shop.database_edition = Some("supabase".to_string());
        shop.tables = Some(vec![DBTable::new("t1", "users")]);
        let blog = Diagram::new("d2", "Blog", "mysql");

        let rendered = diagrams_table(&[shop, blog]);
        assert!(rendered.contains("postgres (supabase)"));
        assert!(rendered.contains("Blog"));
        assert!(diagrams_table(&[]).is_empty());
    }

    #[test]
    fn test_summary_counts_children() {
        let mut shop = Diagram::new("d1", "Shop", "postgres");
        shop.tables = Some(vec![DBTable::new("t1", "users"), DBTable::new("t2", "orders")]);
        let rendered = diagram_summary(&shop);
        assert!(rendered.contains("custom types"));
        assert!(rendered.contains('2'));
    }
}
