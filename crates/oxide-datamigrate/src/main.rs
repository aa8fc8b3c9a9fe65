//! oxide-datamigrate CLI
//!
//! Command-line tool for generating row-level data migrations.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_datamigrate::history::DEFAULT_MIGRATION_TABLE;
use oxide_datamigrate::prelude::*;

/// File name of the baseline snapshot inside the migrations directory.
const DEFAULT_SNAPSHOT_FILE: &str = "schema_rows.json";

/// Row-level data migrations generated from table snapshots.
#[derive(Parser)]
#[command(name = "oxide-datamigrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Migrations directory.
    #[arg(short, long, default_value = "migrations")]
    migrations_dir: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WatchArgs {
    /// Table to watch. Repeat the flag or separate names with commas.
    #[arg(
        short,
        long = "table",
        env = "WATCHING_TABLES",
        value_delimiter = ',',
        required = true
    )]
    tables: Vec<String>,

    /// Baseline snapshot file (defaults to `<migrations-dir>/schema_rows.json`).
    #[arg(long)]
    snapshot_file: Option<PathBuf>,
}

impl WatchArgs {
    fn store(&self, migrations_dir: &Path) -> SnapshotStore {
        let path = self
            .snapshot_file
            .clone()
            .unwrap_or_else(|| migrations_dir.join(DEFAULT_SNAPSHOT_FILE));
        SnapshotStore::new(path)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate migrations for rows changed since the baseline.
    Generate {
        /// Migration base name, prefixed to every generated struct.
        #[arg(short, long)]
        name: String,

        #[command(flatten)]
        watch: WatchArgs,

        /// Bookkeeping table, never diffed.
        #[arg(long, env = "MIGRATION_TABLE", default_value = DEFAULT_MIGRATION_TABLE)]
        migration_table: String,

        /// Save the current rows as the new baseline after writing.
        #[arg(long)]
        overwrite: bool,

        /// Do not mark generated migrations as applied.
        #[arg(long)]
        no_mark: bool,

        /// Print migrations without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Capture the watched tables as the baseline.
    Snapshot {
        #[command(flatten)]
        watch: WatchArgs,
    },

    /// List migrations marked as applied.
    ShowHistory {
        /// Bookkeeping table.
        #[arg(long, env = "MIGRATION_TABLE", default_value = DEFAULT_MIGRATION_TABLE)]
        migration_table: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Connect to database
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&cli.database)
        .await?;

    match &cli.command {
        Commands::Generate {
            name,
            watch,
            migration_table,
            overwrite,
            no_mark,
            dry_run,
        } => {
            let mut options = GeneratorOptions::new(name)
                .with_migrations_dir(&cli.migrations_dir)
                .with_migration_table(migration_table);
            if *no_mark || *dry_run {
                options = options.without_marking();
            }
            generate(&cli, &pool, watch, options, *overwrite, *dry_run).await?;
        }

        Commands::Snapshot { watch } => {
            let collected = collect(&cli, &pool, watch).await?;
            watch.store(&cli.migrations_dir).save(&collected.snapshot)?;
        }

        Commands::ShowHistory { migration_table } => {
            let history = MigrationHistory::with_table(pool.clone(), migration_table)?;
            history.ensure_table().await?;

            let applied = history.get_applied().await?;
            if applied.is_empty() {
                info!("No migrations have been marked as applied yet.");
            } else {
                println!("\nApplied migrations:");
                println!("{:-<60}", "");
                for record in &applied {
                    println!(
                        " [X] {} {} ({})",
                        record.version,
                        record.migration_name,
                        record.end_time.format("%Y-%m-%d %H:%M:%S")
                    );
                }
                println!();
            }
        }
    }

    Ok(())
}

async fn collect(
    cli: &Cli,
    pool: &SqlitePool,
    watch: &WatchArgs,
) -> anyhow::Result<CollectedSnapshot> {
    let source = SqliteSnapshotSource::new(pool.clone(), cli.database.clone());
    let collected = source.collect(&watch.tables).await?;
    if !collected.missing.is_empty() {
        warn!(missing = ?collected.missing, "Some watched tables were skipped");
    }
    Ok(collected)
}

async fn generate(
    cli: &Cli,
    pool: &SqlitePool,
    watch: &WatchArgs,
    options: GeneratorOptions,
    overwrite: bool,
    dry_run: bool,
) -> anyhow::Result<()> {
    let store = watch.store(&cli.migrations_dir);
    let collected = collect(cli, pool, watch).await?;
    let baseline = store.load()?;

    let generator = MigrationGenerator::new(options);
    let plan = generator.plan(&collected.snapshot, &baseline)?;
    if plan.is_empty() {
        info!("No new rows detected.");
        return Ok(());
    }

    if dry_run {
        let mut sink = MemoryArtifactSink::default();
        generator.emit(&plan, &mut sink, None).await?;
        for artifact in &sink.artifacts {
            println!("// {}", artifact.file_name);
            println!("{}", artifact.body);
        }
        info!(count = sink.artifacts.len(), "Dry run, nothing was written");
        return Ok(());
    }

    let history = if generator.options().mark_applied {
        let history = MigrationHistory::with_table(
            pool.clone(),
            generator.options().migration_table.clone(),
        )?;
        history.ensure_table().await?;
        Some(history)
    } else {
        None
    };

    let mut writer = FsArtifactWriter::new(&cli.migrations_dir);
    let written = generator.emit(&plan, &mut writer, history.as_ref()).await?;
    info!(count = written.len(), dir = %cli.migrations_dir.display(), "Generated migrations");

    if overwrite {
        store.save(&collected.snapshot)?;
    }

    Ok(())
}
