use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use clap::Parser;
use log::info;

/// Write a demo snapshot directory for `compile-dataset`.
#[derive(Debug, Parser)]
#[command(name = "generate-sample")]
struct Args {
    /// Output directory (created if missing)
    #[arg(default_value = "sample_snapshots")]
    dir: PathBuf,

    /// Number of snapshots to write
    #[arg(long, default_value_t = 3)]
    snapshots: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// (zip, city, base population, base median income)
const ZIPS: [(&str, &str, i64, f64); 4] = [
    ("10001", "New York", 21_102, 88_526.0),
    ("10002", "New York", 76_807, 35_607.0),
    ("60601", "Chicago", 14_675, 107_483.0),
    ("94103", "San Francisco", 27_170, 71_295.0),
];

fn http_date(ts: &DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn write_snapshot(dir: &Path, index: usize, ts: &DateTime<Utc>, rng: &mut SimpleRng) -> Result<()> {
    let stem = format!("snapshot-{index:03}");

    let headers = format!(
        "HTTP/1.1 200 OK\nContent-Type: text/csv\nLast-Modified: {}\n",
        http_date(ts)
    );
    let headers_path = dir.join(format!("{stem}.headers"));
    fs::write(&headers_path, headers)
        .with_context(|| format!("writing {}", headers_path.display()))?;

    let csv_path = dir.join(format!("{stem}.csv"));
    let mut writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("creating {}", csv_path.display()))?;
    writer.write_record(["zip", "city", "population", "median_income"])?;
    for (zip, city, population, income) in ZIPS {
        // Some zips skip a snapshot; their cells stay at the fill value.
        if rng.next_f64() < 0.15 {
            continue;
        }
        let population = population + (rng.next_f64() * 500.0) as i64 * index as i64;
        // Income is sometimes unreported, which makes the column float.
        let income = if rng.next_f64() < 0.2 {
            String::new()
        } else {
            format!("{:.2}", income * (1.0 + 0.02 * index as f64))
        };
        let population = population.to_string();
        writer.write_record([zip, city, population.as_str(), income.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    fs::create_dir_all(&args.dir).with_context(|| format!("creating {}", args.dir.display()))?;
    let start = Utc
        .with_ymd_and_hms(2021, 1, 4, 9, 30, 0)
        .single()
        .context("invalid start date")?;
    for index in 0..args.snapshots {
        let ts = start + Duration::days(7 * index as i64);
        write_snapshot(&args.dir, index, &ts, &mut rng)?;
        info!("wrote snapshot {index} ({})", http_date(&ts));
    }

    println!(
        "Wrote {} snapshots to {}\ntry: compile-dataset --path {} --dim zip --coord-to-dim city:zip --interact",
        args.snapshots,
        args.dir.display(),
        args.dir.display()
    );
    Ok(())
}
