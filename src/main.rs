use anyhow::{anyhow, Result};
use clap::Parser;
use rankdb::{duck, process, IngestConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Load yearly round cutoff files into a single DuckDB table.
#[derive(Parser, Debug)]
#[command(name = "rankdb", version)]
struct Args {
    /// Directory holding the four-digit year directories
    #[arg(default_value = ".")]
    base_dir: PathBuf,

    /// Store file (defaults to <BASE_DIR>/josaa.db)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Extension of round files
    #[arg(long, default_value = "psv")]
    extension: String,

    /// Single-byte field delimiter
    #[arg(long, default_value_t = '#')]
    delimiter: char,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,
}

impl Args {
    fn into_config(self) -> Result<IngestConfig> {
        if !self.delimiter.is_ascii() {
            return Err(anyhow!("delimiter {:?} is not a single byte", self.delimiter));
        }
        let mut cfg = IngestConfig::new(self.base_dir)
            .with_extension(&self.extension)
            .with_delimiter(self.delimiter as u8);
        if let Some(db) = self.db {
            cfg = cfg.with_db_path(db);
        }
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) configure ────────────────────────────────────────────────
    let args = Args::parse();
    let json = args.json;
    let cfg = args.into_config()?;
    info!(
        base = %cfg.base_dir.display(),
        db = %cfg.db_path.display(),
        "startup"
    );

    // ─── 3) open store + ensure table ────────────────────────────────
    let mut conn = duck::open_disk_db(&cfg.db_path)?;
    duck::ensure_table(&conn)?;

    // ─── 4) ingest ───────────────────────────────────────────────────
    let summary = process::run(&mut conn, &cfg)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    conn.close().map_err(|(_, e)| e)?;
    Ok(())
}
