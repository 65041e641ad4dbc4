//! Chartstore CLI - manage diagram stores and run the record service

use anyhow::Context;
use chartstore::config::{self, Backend, ChartstoreConfig};
use chartstore::model::{ConfigPatch, DiagramIncludes, DiagramPatch};
use chartstore::storage::{migrations, DiagramStorage, SqliteStore};
use chartstore::{clone, server, storage, ui};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "chartstore")]
#[command(version)]
#[command(about = "Diagram persistence layer - embedded SQLite store or remote record service")]
#[command(long_about = r#"
Chartstore keeps database-schema diagrams and everything they own
(tables, relationships, dependencies, areas, custom types, filters)
behind one storage contract, backed either by an embedded SQLite file
or by the chartstore record service.

Example usage:
  chartstore init
  chartstore serve --port 3000
  chartstore diagrams
  chartstore move d1 shop-v2
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file and create the database directory
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Run the record service
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to the service database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Bring an embedded store up to the latest version
    Migrate {
        /// Path to the embedded store file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// List diagrams
    Diagrams {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one diagram with all of its children
    Show {
        id: String,

        /// Print the full diagram as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change a diagram's display name
    Rename {
        id: String,

        #[arg(short, long)]
        name: String,
    },

    /// Change a diagram's id, re-pointing everything it owns
    Move { id: String, new_id: String },

    /// Copy a diagram and its children under fresh ids
    Duplicate {
        id: String,

        /// Name of the copy (defaults to "<name> (Copy)")
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Delete a diagram and everything it owns
    Delete { id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    if let Err(err) = run(cli).await {
        ui::error(&format!("{:#}", err));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let settings = config::load_config(Some(&config_path))?;

    match cli.command {
        Commands::Init { force } => {
            let defaults = ChartstoreConfig::default();
            config::write_config(&config_path, &defaults, force)?;
            config::ensure_db_dir(&defaults.storage.database)?;
            ui::success(&format!("Wrote {}", config_path.display()));
            ui::info("Embedded store", &defaults.storage.database.display().to_string());
            ui::info("Record service", &defaults.storage.api_base_url);
        }

        Commands::Serve { port, database } => {
            let mut server_config = settings.server;
            if let Some(port) = port {
                server_config.port = port;
            }
            if let Some(database) = database {
                server_config.database = database;
            }
            server::start_server(&server_config).await?;
        }

        Commands::Migrate { database } => {
            let database = database.unwrap_or(settings.storage.database);
            run_migrate(&database)?;
        }

        Commands::Diagrams { json } => {
            let storage = open(&settings.storage).await?;
            let includes = DiagramIncludes {
                include_tables: true,
                ..DiagramIncludes::default()
            };
            let diagrams = storage.list_diagrams(includes).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&diagrams)?);
            } else if diagrams.is_empty() {
                ui::warn("No diagrams stored.");
            } else {
                println!("{}", ui::diagrams_table(&diagrams));
            }
        }

        Commands::Show { id, json } => {
            let storage = open(&settings.storage).await?;
            let diagram = storage
                .get_diagram(&id, DiagramIncludes::all())
                .await?
                .with_context(|| format!("diagram '{}' not found", id))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&diagram)?);
            } else {
                ui::header(&diagram.name);
                ui::info("Id", &ui::id(&diagram.id));
                ui::info("Database", &diagram.database_type);
                if let Some(edition) = &diagram.database_edition {
                    ui::info("Edition", edition);
                }
                ui::info("Updated", &ui::dim(&diagram.updated_at.to_rfc3339()));
                println!("{}", ui::diagram_summary(&diagram));
                if let Some(filter) = storage.get_diagram_filter(&id).await? {
                    let tables = diagram.tables.as_deref().unwrap_or_default();
                    let visible = tables.iter().filter(|t| filter.is_table_visible(&t.id)).count();
                    ui::section("Filter");
                    ui::info("Visible tables", &format!("{} of {}", visible, tables.len()));
                    println!("{}", serde_json::to_string_pretty(&filter)?);
                }
            }
        }

        Commands::Rename { id, name } => {
            let storage = open(&settings.storage).await?;
            require_diagram(storage.as_ref(), &id).await?;
            storage.update_diagram(&id, DiagramPatch::rename(name.as_str())).await?;
            ui::success(&format!("Renamed {} to '{}'", id, name));
        }

        Commands::Move { id, new_id } => {
            let storage = open(&settings.storage).await?;
            require_diagram(storage.as_ref(), &id).await?;
            if storage.get_diagram(&new_id, DiagramIncludes::default()).await?.is_some() {
                anyhow::bail!("diagram '{}' already exists", new_id);
            }

            storage.update_diagram(&id, DiagramPatch::move_to(new_id.as_str())).await?;
            repoint_default(storage.as_ref(), &id, Some(&new_id)).await?;
            ui::diagram_moved(&id, &new_id);
        }

        Commands::Duplicate { id, name } => {
            let storage = open(&settings.storage).await?;
            let copy = clone::duplicate_diagram(storage.as_ref(), &id, name.as_deref()).await?;
            ui::diagram_created(&copy.id, &copy.name);
        }

        Commands::Delete { id } => {
            let storage = open(&settings.storage).await?;
            require_diagram(storage.as_ref(), &id).await?;
            storage.delete_diagram(&id).await?;
            repoint_default(storage.as_ref(), &id, None).await?;
            ui::diagram_deleted(&id);
        }
    }

    Ok(())
}

async fn open(settings: &config::StorageConfig) -> anyhow::Result<Arc<dyn DiagramStorage>> {
    match settings.backend {
        Backend::Embedded => {
            config::ensure_db_dir(&settings.database)?;
            ui::backend(Backend::Embedded.as_str(), &settings.database.display().to_string());
        }
        Backend::Remote => ui::backend(Backend::Remote.as_str(), &settings.api_base_url),
    }
    Ok(storage::open_storage(settings).await?)
}

async fn require_diagram(storage: &dyn DiagramStorage, id: &str) -> anyhow::Result<()> {
    if storage.get_diagram(id, DiagramIncludes::default()).await?.is_none() {
        anyhow::bail!("diagram '{}' not found", id);
    }
    Ok(())
}

/// Keep the default diagram pointing at something that exists after `id`
/// moved (`to`) or went away (`None`).
async fn repoint_default(storage: &dyn DiagramStorage, id: &str, to: Option<&str>) -> anyhow::Result<()> {
    let Some(current) = storage.get_config().await? else {
        return Ok(());
    };
    if current.default_diagram_id != id {
        return Ok(());
    }

    let next = match to {
        Some(to) => to.to_string(),
        None => storage
            .list_diagrams(DiagramIncludes::default())
            .await?
            .first()
            .map(|d| d.id.clone())
            .unwrap_or_default(),
    };
    storage.update_config(ConfigPatch::default_diagram(next)).await?;
    Ok(())
}

fn run_migrate(database: &Path) -> anyhow::Result<()> {
    config::ensure_db_dir(database)?;
    let (store, report) = SqliteStore::open_with_report(database)?;

    ui::backend(Backend::Embedded.as_str(), &database.display().to_string());
    if report.is_noop() {
        ui::success(&format!("Already at version {}", report.to));
        return Ok(());
    }

    ui::header(&format!("Migrated from version {} to {}", report.from, report.to));
    for (offset, description) in report.applied.iter().enumerate() {
        ui::migration_step(report.from + offset + 1, description);
    }
    ui::info("Latest version", &migrations::latest_version().to_string());
    ui::info("Diagrams", &store.count_diagrams()?.to_string());
    Ok(())
}
