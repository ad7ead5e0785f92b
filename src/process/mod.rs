// src/process/mod.rs
use anyhow::Result;
use csv::{Reader, ReaderBuilder, StringRecord};
use duckdb::{params_from_iter, Connection};
use std::{fs, io, path::Path};
use tracing::{debug, info, instrument, warn};

use crate::config::IngestConfig;
use crate::report::{FileError, FileReport, IngestSummary, RowRejection, SkippedFile};
use crate::schema::{normalize_identifier, FIELDS, FIELD_COUNT, INSERT_SQL};

pub mod coerce;
pub mod discover;
pub mod lines;

use coerce::{coerce_row, SqlValue};
use discover::RoundName;
use lines::LineIndex;

/// Walk every year directory under the configured base and ingest each round
/// file into `conn`.
///
/// Only an unreadable base directory is an error here; problems with a single
/// file or row end up in the returned summary.
pub fn run(conn: &mut Connection, cfg: &IngestConfig) -> Result<IngestSummary> {
    let mut summary = IngestSummary::new(&cfg.db_path);

    for (year, dir) in discover::year_dirs(cfg.base_dir())? {
        info!(year, "processing year directory");
        summary.years.push(year);

        for path in discover::round_files(&dir, &cfg.extension)? {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();

            match discover::parse_round(&stem) {
                RoundName::Round(round) => {
                    let report = ingest_file(conn, &path, year, round, cfg.delimiter);
                    summary.files.push(report);
                }
                RoundName::NoMatch => {
                    warn!(
                        file = %path.display(),
                        "filename does not match 'round<number>' pattern, skipping"
                    );
                    summary.skipped_files.push(SkippedFile {
                        path,
                        reason: "filename does not match round<number>".into(),
                    });
                }
                RoundName::BadNumber(digits) => {
                    warn!(
                        file = %path.display(),
                        digits = %digits,
                        "could not parse round number, skipping"
                    );
                    summary.skipped_files.push(SkippedFile {
                        path,
                        reason: format!("round number {:?} is not a valid ordinal", digits),
                    });
                }
            }
        }
    }

    summary.finish();
    info!(
        inserted = summary.total_inserted(),
        skipped = summary.total_skipped(),
        failed_files = summary.failed_files(),
        "finished processing; store '{}' is populated",
        cfg.db_path.display()
    );
    Ok(summary)
}

/// Ingest one round file. Never fails: file-level problems are recorded in
/// the report's `error`, rejected rows in its `rejections`.
#[instrument(level = "info", skip(conn, path), fields(file = %path.display()))]
pub fn ingest_file(
    conn: &mut Connection,
    path: &Path,
    year: i32,
    round: i32,
    delimiter: u8,
) -> FileReport {
    let mut report = FileReport::new(path, year, round);

    if let Err(e) = load_file(conn, path, year, round, delimiter, &mut report) {
        match &e {
            FileError::Empty => warn!("skipping empty file"),
            FileError::NotFound => warn!("file not found, skipping"),
            other => warn!(
                inserted = report.inserted,
                "abandoning file: {}", other
            ),
        }
        report.error = Some(e);
    }

    if report.data_rows() > 0 {
        info!(
            inserted = report.inserted,
            skipped = report.skipped,
            "processed file"
        );
    }
    report
}

fn load_file(
    conn: &mut Connection,
    path: &Path,
    year: i32,
    round: i32,
    delimiter: u8,
    report: &mut FileReport,
) -> Result<(), FileError> {
    let raw = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => FileError::NotFound,
        _ => FileError::Read(e),
    })?;
    // undecodable bytes become U+FFFD rather than failing the file
    let text = String::from_utf8_lossy(&raw);
    let bytes = text.as_bytes();

    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut lines = LineIndex::new(bytes);

    let mut header = StringRecord::new();
    if !rdr.read_record(&mut header)? {
        return Err(FileError::Empty);
    }
    check_header(&header)?;

    // Rows inserted before a mid-file failure stay committed.
    let mut accepted = Vec::new();
    let tx = conn.transaction()?;
    let outcome = insert_rows(&tx, &mut rdr, &mut lines, year, round, report, &mut accepted);

    match outcome {
        Err(FileError::Store(err)) => {
            // a failed statement aborts the whole transaction
            report.inserted = 0;
            tx.rollback()?;
            replay_rows(conn, &accepted)?;
            report.inserted = accepted.len() as u64;
            Err(FileError::Store(err))
        }
        outcome => {
            if let Err(e) = tx.commit() {
                report.inserted = 0;
                return Err(e.into());
            }
            outcome
        }
    }
}

/// Write rows again in a fresh transaction after the first one was aborted.
fn replay_rows(conn: &mut Connection, rows: &[Vec<SqlValue>]) -> Result<(), FileError> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(INSERT_SQL)?;
        for values in rows {
            stmt.execute(params_from_iter(values.iter()))?;
        }
    }
    tx.commit()?;
    debug!(rows = rows.len(), "replayed rows after failed insert");
    Ok(())
}

/// The first `FIELD_COUNT` header cells, normalized, must be the declared
/// field identifiers in order.
fn check_header(header: &StringRecord) -> Result<(), FileError> {
    let found: Vec<String> = header
        .iter()
        .take(FIELD_COUNT)
        .map(normalize_identifier)
        .collect();
    let expected: Vec<String> = FIELDS.iter().map(|f| f.ident.to_string()).collect();

    if found != expected {
        return Err(FileError::HeaderMismatch { expected, found });
    }
    if header.len() > FIELD_COUNT {
        debug!(
            extra = header.len() - FIELD_COUNT,
            "header has trailing columns, ignoring them"
        );
    }
    Ok(())
}

/// Insert every data row after the header. Rows that went in are pushed to
/// `accepted`; rejected rows and empty lines are recorded on `report` under
/// their physical line.
fn insert_rows(
    conn: &Connection,
    rdr: &mut Reader<&[u8]>,
    lines: &mut LineIndex<'_>,
    year: i32,
    round: i32,
    report: &mut FileReport,
    accepted: &mut Vec<Vec<SqlValue>>,
) -> Result<(), FileError> {
    let mut stmt = conn.prepare(INSERT_SQL)?;
    let mut record = StringRecord::new();

    loop {
        let start = rdr.position().byte() as usize;
        let more = rdr.read_record(&mut record)?;
        let gap = lines.gap(start, rdr.position().byte() as usize);

        for line in gap.blank_lines {
            let reason = RowRejection::Malformed { fields: 0 };
            warn!(line, "skipping row: {}", reason);
            report.reject(line, reason);
        }
        if !more {
            break;
        }

        let line = gap.record_line;
        match coerce_row(&record, year, round) {
            Ok(values) => {
                stmt.execute(params_from_iter(values.iter()))?;
                accepted.push(values);
                report.inserted += 1;
            }
            Err(reason) => {
                warn!(line, "skipping row: {}", reason);
                report.reject(line, reason);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duck;
    use crate::report::RowRejection;
    use anyhow::Result;
    use std::path::PathBuf;
    use tempfile::tempdir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    const HEADER: &str =
        "Institute#Academic Program Name#Quota#Seat Type#Gender#Opening Rank#Closing Rank";

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,rankdb::process=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn store() -> Result<Connection> {
        let conn = duck::open_mem_db()?;
        duck::ensure_table(&conn)?;
        Ok(conn)
    }

    fn write_round(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(name);
        fs::write(&path, body)?;
        Ok(path)
    }

    #[test]
    fn ingests_single_row_file() -> Result<()> {
        init_test_logging();
        let tmp = tempdir()?;
        let path = write_round(
            &tmp.path().join("2023"),
            "round1.psv",
            &format!(
                "{}\nIIT Bombay#Computer Science#OPEN#OPEN#Gender-Neutral#10#50\n",
                HEADER
            ),
        )?;

        let mut conn = store()?;
        let report = ingest_file(&mut conn, &path, 2023, 1, b'#');
        assert!(report.is_clean());
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped, 0);

        let rows = duck::read_records(&conn)?;
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.institute.as_deref(), Some("IIT Bombay"));
        assert_eq!(r.academic_program_name.as_deref(), Some("Computer Science"));
        assert_eq!(r.gender.as_deref(), Some("Gender-Neutral"));
        assert_eq!(r.opening_rank, Some(10.0));
        assert_eq!(r.closing_rank, Some(50.0));
        assert_eq!((r.year, r.round), (2023, 1));
        Ok(())
    }

    #[test]
    fn tallies_every_data_row() -> Result<()> {
        init_test_logging();
        let tmp = tempdir()?;
        let body = [
            HEADER,
            "NIT Trichy#Civil Engineering#HS#OBC-NCL#Female-only#Gender-Neutral#",
            "NIT Trichy#Civil Engineering#HS#OBC-NCL",
            "IIIT Delhi#CSE, with minor#OS#OPEN#Gender-Neutral#1200#N/A",
            "######",
            "IIT Madras#Data Science#AI#EWS#Gender-Neutral# 300 #412.0",
        ]
        .join("\n");
        let path = write_round(&tmp.path().join("2022"), "round3.psv", &body)?;

        let mut conn = store()?;
        let report = ingest_file(&mut conn, &path, 2022, 3, b'#');
        assert!(report.is_clean());
        assert_eq!(report.data_rows(), 5);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped, 3);

        let lines: Vec<usize> = report.rejections.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert_eq!(report.rejections[0].reason, RowRejection::Malformed { fields: 4 });
        assert_eq!(
            report.rejections[1].reason,
            RowRejection::InvalidRank {
                field: "closing_rank",
                value: "N/A".into()
            }
        );
        assert_eq!(report.rejections[2].reason, RowRejection::Blank);

        let rows = duck::read_records(&conn)?;
        assert_eq!(rows[0].opening_rank, Some(-1.0));
        assert_eq!(rows[0].closing_rank, None);
        assert_eq!(rows[1].academic_program_name.as_deref(), Some("Data Science"));
        assert_eq!(rows[1].opening_rank, Some(300.0));
        assert_eq!(rows[1].closing_rank, Some(412.0));
        Ok(())
    }

    #[test]
    fn empty_lines_count_as_malformed_rows() -> Result<()> {
        init_test_logging();
        let tmp = tempdir()?;
        let body = format!("{}\nA#B#C#D#E#1#2\n\nA#B#C#D#E#1#N/A\n", HEADER);
        let path = write_round(&tmp.path().join("2023"), "round1.psv", &body)?;

        let mut conn = store()?;
        let report = ingest_file(&mut conn, &path, 2023, 1, b'#');
        assert!(report.is_clean());
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped, 2);

        let lines: Vec<usize> = report.rejections.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![3, 4]);
        assert_eq!(report.rejections[0].reason, RowRejection::Malformed { fields: 0 });
        assert!(matches!(
            report.rejections[1].reason,
            RowRejection::InvalidRank { field: "closing_rank", .. }
        ));
        Ok(())
    }

    #[test]
    fn crlf_lines_keep_physical_numbers() -> Result<()> {
        let tmp = tempdir()?;
        let body = format!(
            "{}\r\nA#B#C#D#E#1#2\r\n\r\nA#B#C#D#E#1#N/A\r\nA#B#C#D#E#3#4\r\n\r\n",
            HEADER
        );
        let path = write_round(&tmp.path().join("2023"), "round2.psv", &body)?;

        let mut conn = store()?;
        let report = ingest_file(&mut conn, &path, 2023, 2, b'#');
        assert!(report.is_clean());
        assert_eq!(report.inserted, 2);

        let lines: Vec<usize> = report.rejections.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![3, 4, 6]);
        assert_eq!(report.rejections[2].reason, RowRejection::Malformed { fields: 0 });

        let rows = duck::read_records(&conn)?;
        assert_eq!(rows[1].closing_rank, Some(4.0));
        Ok(())
    }

    #[test]
    fn failed_insert_keeps_earlier_rows() -> Result<()> {
        init_test_logging();
        let mut conn = duck::open_mem_db()?;
        // same layout, but a closing rank column that cannot hold large values
        conn.execute_batch(
            r#"CREATE SEQUENCE josaa_rankings_id_seq START 1;
            CREATE TABLE josaa_rankings (
                "id" BIGINT PRIMARY KEY DEFAULT nextval('josaa_rankings_id_seq'),
                "institute" VARCHAR,
                "academic_program_name" VARCHAR,
                "quota" VARCHAR,
                "seat_type" VARCHAR,
                "gender" VARCHAR,
                "opening_rank" DOUBLE,
                "closing_rank" INTEGER,
                "year" INTEGER,
                "round" INTEGER
            );"#,
        )?;
        duck::ensure_table(&conn)?;
        assert!(!duck::schema_drift(&conn)?.is_empty());

        let tmp = tempdir()?;
        let body = format!("{}\nA#B#C#D#E#1#2\nA#B#C#D#E#1#1e20\n", HEADER);
        let path = write_round(&tmp.path().join("2023"), "round1.psv", &body)?;

        let report = ingest_file(&mut conn, &path, 2023, 1, b'#');
        assert!(matches!(report.error, Some(FileError::Store(_))));
        assert_eq!(report.inserted, 1);
        assert_eq!(duck::count_rows(&conn)?, report.inserted as i64);
        Ok(())
    }

    #[test]
    fn commas_stay_inside_values() -> Result<()> {
        let tmp = tempdir()?;
        let body = format!(
            "{}\nIIT (ISM) Dhanbad#Mathematics and Computing (5 Years, Integrated M.Tech.)#AI#SC#Gender-Neutral#55#90\n",
            HEADER
        );
        let path = write_round(&tmp.path().join("2021"), "round2.psv", &body)?;

        let mut conn = store()?;
        let report = ingest_file(&mut conn, &path, 2021, 2, b'#');
        assert_eq!(report.inserted, 1);

        let rows = duck::read_records(&conn)?;
        assert_eq!(
            rows[0].academic_program_name.as_deref(),
            Some("Mathematics and Computing (5 Years, Integrated M.Tech.)")
        );
        Ok(())
    }

    #[test]
    fn tolerates_undecodable_bytes() -> Result<()> {
        let tmp = tempdir()?;
        let dir = tmp.path().join("2020");
        fs::create_dir_all(&dir)?;
        let path = dir.join("round1.psv");
        let mut body = format!("{}\n", HEADER).into_bytes();
        body.extend_from_slice(b"IIT Kanpur \xff\xfe#Physics#AI#OPEN#Gender-Neutral#5#9\n");
        fs::write(&path, body)?;

        let mut conn = store()?;
        let report = ingest_file(&mut conn, &path, 2020, 1, b'#');
        assert!(report.is_clean());
        assert_eq!(report.inserted, 1);

        let rows = duck::read_records(&conn)?;
        let institute = rows[0].institute.as_deref().unwrap_or_default();
        assert!(institute.starts_with("IIT Kanpur"));
        assert!(institute.contains('\u{fffd}'));
        Ok(())
    }

    #[test]
    fn empty_and_missing_files() -> Result<()> {
        let tmp = tempdir()?;
        let dir = tmp.path().join("2023");
        let empty = write_round(&dir, "round1.psv", "")?;
        let header_only = write_round(&dir, "round2.psv", &format!("{}\n", HEADER))?;

        let mut conn = store()?;
        let report = ingest_file(&mut conn, &empty, 2023, 1, b'#');
        assert!(matches!(report.error, Some(FileError::Empty)));
        assert_eq!(report.data_rows(), 0);

        let report = ingest_file(&mut conn, &header_only, 2023, 2, b'#');
        assert!(report.is_clean());
        assert_eq!(report.data_rows(), 0);

        let report = ingest_file(&mut conn, &dir.join("round9.psv"), 2023, 9, b'#');
        assert!(matches!(report.error, Some(FileError::NotFound)));

        assert_eq!(duck::count_rows(&conn)?, 0);
        Ok(())
    }

    #[test]
    fn misordered_header_fails_file() -> Result<()> {
        let tmp = tempdir()?;
        let body = "Institute#Quota#Academic Program Name#Seat Type#Gender#Opening Rank#Closing Rank\n\
                    IIT Delhi#OPEN#Electrical#OPEN#Gender-Neutral#100#200\n";
        let path = write_round(&tmp.path().join("2023"), "round1.psv", body)?;

        let mut conn = store()?;
        let report = ingest_file(&mut conn, &path, 2023, 1, b'#');
        match &report.error {
            Some(FileError::HeaderMismatch { found, .. }) => {
                assert_eq!(found[1], "quota");
            }
            other => panic!("expected header mismatch, got {:?}", other),
        }
        assert_eq!(report.inserted, 0);
        assert_eq!(duck::count_rows(&conn)?, 0);
        Ok(())
    }

    #[test]
    fn comma_delimited_file_fails_header_check() -> Result<()> {
        let tmp = tempdir()?;
        let body = "Institute,Academic Program Name,Quota,Seat Type,Gender,Opening Rank,Closing Rank\n\
                    IIT Delhi,Electrical,AI,OPEN,Gender-Neutral,100,200\n";
        let path = write_round(&tmp.path().join("2023"), "round1.psv", body)?;

        let mut conn = store()?;
        let report = ingest_file(&mut conn, &path, 2023, 1, b'#');
        assert!(matches!(report.error, Some(FileError::HeaderMismatch { .. })));
        Ok(())
    }

    #[test]
    fn run_walks_years_and_rounds() -> Result<()> {
        init_test_logging();
        let tmp = tempdir()?;
        let base = tmp.path();
        let row = "IIT Roorkee#Mechanical Engineering#AI#OPEN#Gender-Neutral#900#1500";

        write_round(&base.join("2022"), "round1.psv", &format!("{}\n{}\n", HEADER, row))?;
        write_round(
            &base.join("2022"),
            "Round2.psv",
            &format!("{}\n{}\n{}\n", HEADER, row, row),
        )?;
        write_round(&base.join("2023"), "round1.psv", &format!("{}\n{}\n", HEADER, row))?;
        // not a round file name
        write_round(&base.join("2023"), "final.psv", &format!("{}\n{}\n", HEADER, row))?;
        // wrong extension
        write_round(&base.join("2023"), "round2.csv", &format!("{}\n{}\n", HEADER, row))?;
        // not a year directory
        write_round(&base.join("backup"), "round1.psv", &format!("{}\n{}\n", HEADER, row))?;
        write_round(&base.join("20231"), "round1.psv", &format!("{}\n{}\n", HEADER, row))?;

        let cfg = IngestConfig::new(base);
        let mut conn = store()?;
        let summary = run(&mut conn, &cfg)?;

        assert_eq!(summary.years, vec![2022, 2023]);
        assert_eq!(summary.files.len(), 3);
        assert_eq!(summary.total_inserted(), 4);
        assert_eq!(summary.total_skipped(), 0);
        assert_eq!(summary.skipped_files.len(), 1);
        assert!(summary.skipped_files[0].path.ends_with("2023/final.psv"));
        assert!(summary.finished_at.is_some());

        assert_eq!(
            duck::round_counts(&conn)?,
            vec![(2022, 1, 1), (2022, 2, 2), (2023, 1, 1)]
        );
        Ok(())
    }

    #[test]
    fn rerun_duplicates_rows() -> Result<()> {
        let tmp = tempdir()?;
        let base = tmp.path();
        write_round(
            &base.join("2024"),
            "round1.psv",
            &format!("{}\nIIT Goa#CSE#AI#OPEN#Gender-Neutral#1#2\n", HEADER),
        )?;

        let cfg = IngestConfig::new(base);
        let mut conn = store()?;
        run(&mut conn, &cfg)?;
        assert_eq!(duck::count_rows(&conn)?, 1);
        run(&mut conn, &cfg)?;
        assert_eq!(duck::count_rows(&conn)?, 2);
        Ok(())
    }
}
