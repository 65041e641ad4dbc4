pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    backend, diagram_created, diagram_deleted, diagram_moved, dim, error, header, id, info,
    migration_step, section, success, warn,
};
pub use table::{diagram_summary, diagrams_table};
pub use theme::{theme, Theme};
