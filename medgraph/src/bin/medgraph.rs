use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use medgraph::query::CATALOG;
use medgraph::{
    CHECKPOINT_EXTENSION, CsvSource, GraphSnapshot, GraphStore, LoadOptions, Loader, MemGraph,
    Resolver, SchemaRegistry, prepare,
};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Hospital records graph: schema, load and query
#[derive(Parser)]
#[command(name = "medgraph")]
#[command(about = "Loads hospital CSV records into a graph store and queries them", long_about = None)]
struct Cli {
    /// Database file
    #[arg(long, global = true, env = "MEDGRAPH_DB", default_value_os_t = default_db())]
    db: PathBuf,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply the hospital schema
    Schema {
        /// Print the schema definition instead of applying it
        #[arg(long)]
        print: bool,
    },
    /// Apply the schema and load every CSV file of a directory
    Load {
        /// Directory holding doctors.csv, patients.csv, ...
        #[arg(long, env = "MEDGRAPH_DATA_DIR")]
        data: PathBuf,

        /// Records per commit
        #[arg(long, env = "MEDGRAPH_BATCH_SIZE", default_value_t = medgraph::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Run a catalog query, printing one JSON object per row
    Query {
        /// Query name, e.g. patient-medications
        name: String,

        /// Parameter as name=value; repeatable
        #[arg(long = "param", short = 'p', value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// List the catalog queries and their parameters
    Queries,
    /// Print node and edge counts
    Stats,
}

fn default_db() -> PathBuf {
    PathBuf::from(format!("hospital.{CHECKPOINT_EXTENSION}"))
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got `{raw}`"))
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let filter = EnvFilter::try_from_env("MEDGRAPH_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default.as_str().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::Queries = cli.command {
        for q in CATALOG {
            let params: Vec<&str> = q.params.iter().map(|p| p.name).collect();
            println!("{:<22} ({}) {}", q.name, params.join(", "), q.description);
        }
        return Ok(());
    }
    if let Command::Schema { print: true } = cli.command {
        print!("{}", SchemaRegistry::hospital()?.definition().render());
        return Ok(());
    }

    let store = MemGraph::open(&cli.db)
        .with_context(|| format!("failed to open database {}", cli.db.display()))?;

    match &cli.command {
        Command::Schema { .. } => {
            let mut registry = SchemaRegistry::hospital()?;
            registry.apply(&store)?;
            let def = registry.definition();
            println!(
                "schema applied to {}: {} types, {} predicates",
                cli.db.display(),
                def.types.len(),
                def.predicates.len()
            );
        }
        Command::Load { data, batch_size } => {
            if !data.is_dir() {
                anyhow::bail!("data directory not found: {}", data.display());
            }
            SchemaRegistry::hospital()?.apply(&store)?;
            let mut resolver = Resolver::new();
            let options = LoadOptions::default().with_batch_size(*batch_size);
            let summary = Loader::new(&store, &mut resolver)
                .with_options(options)
                .load(&CsvSource::new(data))
                .context("load failed")?;
            print!("{summary}");
            println!(
                "{} nodes created, {} duplicates, {} keys resolved",
                summary.created(),
                summary.duplicates(),
                resolver.len()
            );
        }
        Command::Query { name, params } => {
            let query = prepare(name)?;
            let params =
                query.bind_text(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
            let snapshot = store.snapshot();
            let rows = query.execute(&snapshot, &params)?;
            let stdout = std::io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            for row in &rows {
                serde_json::to_writer(&mut out, row)?;
                writeln!(out)?;
            }
            out.flush()?;
        }
        Command::Stats => {
            let snapshot = store.snapshot();
            println!("nodes: {}", snapshot.node_count(None));
            for t in medgraph::NodeType::ALL {
                println!("  {:<18} {}", t.type_name(), snapshot.node_count(Some(t.type_name())));
            }
            println!("edges: {}", snapshot.edge_count(None));
            for (name, def) in &snapshot.schema().predicates {
                if def.is_edge() {
                    println!("  {:<22} {}", name, snapshot.edge_count(Some(name)));
                }
            }
        }
        Command::Queries => {}
    }

    store.close().context("failed to write database")?;
    Ok(())
}
