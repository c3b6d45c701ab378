#![allow(dead_code)]

use std::path::Path;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub const T1: &str = "Mon, 01 Mar 2021 08:00:00 GMT";
pub const T2: &str = "Mon, 08 Mar 2021 08:00:00 GMT";
pub const T1_RFC3339: &str = "2021-03-01T08:00:00+00:00";
pub const T2_RFC3339: &str = "2021-03-08T08:00:00+00:00";

/// Write `<stem>.csv` and a `<stem>.headers` file stamped `last_modified`.
pub fn write_snapshot(dir: &Path, stem: &str, last_modified: &str, csv: &str) -> TestResult {
    std::fs::write(
        dir.join(format!("{stem}.headers")),
        format!("HTTP/1.1 200 OK\nContent-Type: text/csv\nLast-Modified: {last_modified}\n"),
    )?;
    std::fs::write(dir.join(format!("{stem}.csv")), csv)?;
    Ok(())
}

/// Two weekly snapshots of three zip codes with a city coordinate.
pub fn write_zip_corpus(dir: &Path) -> TestResult {
    // File names sort opposite to time on purpose.
    write_snapshot(
        dir,
        "b-first",
        T1,
        "zip,city,population,income,note\n\
         10001,New York,100,55.5,ok\n\
         10002,New York,200,,ok\n",
    )?;
    write_snapshot(
        dir,
        "a-second",
        T2,
        "zip,city,population,income,note\n\
         10002,New York,210,61.25,\"revised\"\n\
         60601,Chicago,50,70,ok\n",
    )?;
    Ok(())
}
