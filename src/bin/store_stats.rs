// src/bin/store_stats.rs

use anyhow::{Context, Result};
use rankdb::duck;
use std::{env, path::PathBuf};

fn main() -> Result<()> {
    // 1) Store path from the first CLI argument
    let db_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("josaa.db"));
    if !db_path.is_file() {
        return Err(anyhow::anyhow!("no store at '{}'", db_path.display()));
    }

    let conn = duck::open_disk_db(&db_path)?;

    // 2) Per-round counts
    let counts = duck::round_counts(&conn).context("reading round counts")?;
    let total = duck::count_rows(&conn)?;

    // 3) Sentinel / null ranks across the whole table
    let records = duck::read_records(&conn)?;
    let neutral = records
        .iter()
        .filter(|r| r.opening_rank == Some(-1.0) || r.closing_rank == Some(-1.0))
        .count();
    let missing = records
        .iter()
        .filter(|r| r.opening_rank.is_none() || r.closing_rank.is_none())
        .count();

    // 4) Print summary table
    println!("\n{: <10} {: >8} {: >12}", "Year", "Round", "Rows");
    println!("{:-<32}", "");
    for (year, round, rows) in &counts {
        println!("{: <10} {: >8} {: >12}", year, round, rows);
    }
    println!("{:-<32}", "");
    println!("{: <19} {: >12}", "total", total);
    println!("{: <19} {: >12}", "gender-neutral rank", neutral);
    println!("{: <19} {: >12}", "missing rank", missing);

    for d in duck::schema_drift(&conn)? {
        println!("drift: {}", d);
    }

    Ok(())
}
