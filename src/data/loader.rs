use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc, Weekday};
use log::{debug, info, warn};

use super::model::{RawCorpus, RawRecord};
use crate::error::{CompileError, Result};

/// Extension of the data files in a snapshot directory.
pub const DATA_EXTENSION: &str = "csv";
/// Extension of the sibling file carrying the HTTP response headers.
pub const HEADERS_EXTENSION: &str = "headers";
/// Header whose value becomes the snapshot timestamp.
pub const TIMESTAMP_HEADER: &str = "Last-Modified";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load every `<stem>.csv` / `<stem>.headers` pair in `dir`.
///
/// All header files are read before any CSV is parsed, so a missing
/// `Last-Modified` line fails the run without touching the data files.
/// Files are visited in sorted path order; when two files carry the same
/// timestamp the later one replaces the earlier.
pub fn load_directory(dir: &Path) -> Result<RawCorpus> {
    if !dir.is_dir() {
        return Err(CompileError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let data_files = list_data_files(dir)?;
    let mut stamped = Vec::with_capacity(data_files.len());
    for data_path in data_files {
        let headers_path = data_path.with_extension(HEADERS_EXTENSION);
        if !headers_path.is_file() {
            return Err(CompileError::MissingHeaderFile {
                data: data_path,
                headers: headers_path,
            });
        }
        let timestamp = read_last_modified(&headers_path)?;
        stamped.push((timestamp, data_path));
    }

    let mut corpus = RawCorpus::default();
    for (timestamp, data_path) in stamped {
        let (fields, records) = load_csv(&data_path)?;
        info!(
            "loaded {} rows from {} ({timestamp})",
            records.len(),
            data_path.display()
        );
        corpus.field_names.extend(fields);
        if corpus.snapshots.insert(timestamp, records).is_some() {
            warn!(
                "{} repeats snapshot timestamp {timestamp}; keeping its rows",
                data_path.display()
            );
        }
    }

    Ok(corpus)
}

fn list_data_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let io_err = |source| CompileError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_data = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == DATA_EXTENSION);
        if is_data && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    debug!("found {} data files in {}", files.len(), dir.display());
    Ok(files)
}

// ---------------------------------------------------------------------------
// Header file
// ---------------------------------------------------------------------------

/// Scan a header file for its `Last-Modified` line and parse the value.
pub fn read_last_modified(path: &Path) -> Result<DateTime<Utc>> {
    let file = fs::File::open(path).map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        // Only `Key: Value` lines with exactly one separator count.
        let mut parts = line.trim().splitn(3, ": ");
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        if key == TIMESTAMP_HEADER {
            return parse_http_date(value).map_err(|reason| CompileError::InvalidTimestamp {
                path: path.to_path_buf(),
                value: value.to_string(),
                reason,
            });
        }
    }

    Err(CompileError::MissingTimestamp {
        path: path.to_path_buf(),
    })
}

/// Zone names accepted after the time of day; all of them mean UTC.
const UTC_ZONES: [&str; 3] = ["GMT", "UTC", "UT"];

/// Parse `%a, %d %b %Y %H:%M:%S %Z`, e.g. `Wed, 21 Oct 2015 07:28:00 GMT`.
///
/// The weekday must be a weekday name but is not checked against the date.
/// Only UTC zone names are accepted.
pub fn parse_http_date(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    let value = value.trim();
    let (weekday, rest) = value
        .split_once(", ")
        .ok_or_else(|| "expected '<weekday>, <date>'".to_string())?;
    weekday
        .parse::<Weekday>()
        .map_err(|_| format!("'{weekday}' is not a weekday"))?;

    let (datetime, zone) = rest
        .rsplit_once(' ')
        .ok_or_else(|| "missing time zone".to_string())?;
    if !UTC_ZONES.iter().any(|z| z.eq_ignore_ascii_case(zone)) {
        return Err(format!("unsupported time zone '{zone}'"));
    }

    NaiveDateTime::parse_from_str(datetime, "%d %b %Y %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// CSV data file
// ---------------------------------------------------------------------------

/// CSV layout: header row with field names, one record per line.
/// Every token is kept as its raw string; typing happens later.
fn load_csv(path: &Path) -> Result<(Vec<String>, Vec<RawRecord>)> {
    let csv_err = |source| CompileError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.map_err(csv_err)?;
        let record: RawRecord = headers
            .iter()
            .cloned()
            .zip(row.iter().map(str::to_string))
            .collect();
        records.push(record);
    }

    Ok((headers, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(path: &Path, contents: &str) {
        let mut file = fs::File::create(path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn parses_rfc1123_dates_as_utc() {
        let ts = parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(ts.to_rfc3339(), "2015-10-21T07:28:00+00:00");
        assert!(parse_http_date("yesterday").is_err());
    }

    #[test]
    fn utc_zone_names_are_all_accepted() {
        for zone in ["GMT", "UTC", "UT", "utc"] {
            let value = format!("Wed, 21 Oct 2015 07:28:00 {zone}");
            let ts = parse_http_date(&value).unwrap();
            assert_eq!(ts.to_rfc3339(), "2015-10-21T07:28:00+00:00", "{zone}");
        }
    }

    #[test]
    fn weekday_is_not_checked_against_the_date() {
        // 21 Oct 2015 was a Wednesday.
        let ts = parse_http_date("Mon, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(ts.to_rfc3339(), "2015-10-21T07:28:00+00:00");
        assert!(parse_http_date("Xyz, 21 Oct 2015 07:28:00 GMT").is_err());
    }

    #[test]
    fn non_utc_zones_are_rejected() {
        assert!(parse_http_date("Wed, 21 Oct 2015 07:28:00 EST").is_err());
        assert!(parse_http_date("Wed, 21 Oct 2015 07:28:00 +0200").is_err());
        assert!(parse_http_date("Wed, 21 Oct 2015 07:28:00").is_err());
    }

    #[test]
    fn unparsable_last_modified_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a.csv"), "zip\n1\n");
        write(
            &dir.path().join("a.headers"),
            "Last-Modified: Wed, 21 Oct 2015 07:28:00 EST\n",
        );

        let err = read_last_modified(&dir.path().join("a.headers")).unwrap_err();
        match &err {
            CompileError::InvalidTimestamp { value, reason, .. } => {
                assert_eq!(value, "Wed, 21 Oct 2015 07:28:00 EST");
                assert!(reason.contains("EST"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = load_directory(dir.path()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidTimestamp { .. }));
    }

    #[test]
    fn header_lines_with_two_separators_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.headers");
        write(
            &path,
            concat!(
                "Last-Modified: Thu, 01 Jan 2015 00:00:00 GMT: extra\n",
                "Last-Modified: Fri, 02 Jan 2015 00:00:00 GMT\n",
            ),
        );
        let ts = read_last_modified(&path).unwrap();
        assert_eq!(ts.to_rfc3339(), "2015-01-02T00:00:00+00:00");

        write(&path, "Last-Modified: a: b\n");
        let err = read_last_modified(&path).unwrap_err();
        assert!(matches!(err, CompileError::MissingTimestamp { .. }));
    }

    #[test]
    fn finds_last_modified_among_other_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.headers");
        write(
            &path,
            concat!(
                "HTTP/1.1 200 OK\nContent-Type: text/csv\n",
                "Last-Modified: Thu, 01 Jan 2015 00:00:00 GMT\nETag: \"x\"\n",
            ),
        );

        let ts = read_last_modified(&path).unwrap();
        assert_eq!(ts.to_rfc3339(), "2015-01-01T00:00:00+00:00");
    }

    #[test]
    fn missing_last_modified_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.headers");
        write(&path, "Content-Type: text/csv\n");

        let err = read_last_modified(&path).unwrap_err();
        assert!(matches!(err, CompileError::MissingTimestamp { .. }));
    }

    #[test]
    fn rows_keep_file_order_and_raw_tokens() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a.csv"), "zip,name\n10002,\"B\"\n10001,007\n");
        write(
            &dir.path().join("a.headers"),
            "Last-Modified: Thu, 01 Jan 2015 00:00:00 GMT\n",
        );

        let corpus = load_directory(dir.path()).unwrap();
        assert_eq!(corpus.field_names.len(), 2);
        let rows: Vec<_> = corpus.records().collect();
        assert_eq!(rows[0]["zip"], "10002");
        assert_eq!(rows[0]["name"], "B");
        assert_eq!(rows[1]["name"], "007");
    }

    #[test]
    fn later_file_wins_on_duplicate_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let stamp = "Last-Modified: Thu, 01 Jan 2015 00:00:00 GMT\n";
        write(&dir.path().join("a.csv"), "zip,name\n1,first\n");
        write(&dir.path().join("a.headers"), stamp);
        write(&dir.path().join("b.csv"), "zip,name\n2,second\n3,third\n");
        write(&dir.path().join("b.headers"), stamp);

        let corpus = load_directory(dir.path()).unwrap();
        assert_eq!(corpus.snapshots.len(), 1);
        let rows: Vec<_> = corpus.records().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "second");
        assert_eq!(rows[1]["zip"], "3");
    }

    #[test]
    fn data_file_without_headers_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a.csv"), "zip\n1\n");

        let err = load_directory(dir.path()).unwrap_err();
        assert!(matches!(err, CompileError::MissingHeaderFile { .. }));
    }

    #[test]
    fn non_directory_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.csv");
        write(&file, "zip\n1\n");

        let err = load_directory(&file).unwrap_err();
        assert!(matches!(err, CompileError::DirectoryNotFound { .. }));
    }
}
