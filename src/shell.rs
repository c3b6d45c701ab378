use anyhow::{Context, Result};
use log::debug;
use rustyline::{error::ReadlineError, DefaultEditor};

use crate::data::dataset::{CompiledDataset, TIME_DIM};
use crate::data::select::{parse_selector, select, Selectors};

const PROMPT: &str = "dataset> ";

const HELP: &str = r#"commands:
  info                        dataset summary
  dims                        dimension names and sizes
  coords [NAME]               axis or coordinate values
  vars                        data variables with dtypes
  show VAR [DIM=LABEL ...]    values of VAR, optionally fixing dims
  help
  exit | quit
notes:
  - time labels are RFC 3339, e.g. time=2015-10-21T07:28:00+00:00
"#;

/// What the shell loop should do after one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellAction {
    /// Print the text and read the next line.
    Continue(String),
    Exit,
}

/// Interactive inspection of a compiled dataset.
pub fn run_shell(dataset: &CompiledDataset) -> Result<()> {
    let mut editor = DefaultEditor::new().context("starting line editor")?;
    println!("{dataset}");
    println!("type `help` for commands");

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(line.as_str());
                }
                match execute(dataset, &line) {
                    ShellAction::Continue(text) => print!("{text}"),
                    ShellAction::Exit => break,
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("reading shell input"),
        }
    }
    Ok(())
}

/// Run one shell command line against `dataset`.
pub fn execute(dataset: &CompiledDataset, line: &str) -> ShellAction {
    let mut tokens = line.split_whitespace();
    let Some(command) = tokens.next() else {
        return ShellAction::Continue(String::new());
    };
    let args: Vec<&str> = tokens.collect();
    debug!("shell command '{command}' with {} args", args.len());

    let text = match command {
        "exit" | "quit" => return ShellAction::Exit,
        "help" => HELP.to_string(),
        "info" => dataset.to_string(),
        "dims" => dims(dataset),
        "coords" => coords(dataset, args.first().copied()),
        "vars" => vars(dataset),
        "show" => show(dataset, &args),
        other => format!("unknown command '{other}' (try `help`)\n"),
    };
    ShellAction::Continue(text)
}

fn dims(dataset: &CompiledDataset) -> String {
    dataset
        .dims()
        .iter()
        .zip(dataset.shape())
        .map(|(name, len)| format!("{name}: {len}\n"))
        .collect()
}

fn vars(dataset: &CompiledDataset) -> String {
    let dims = dataset.dims().join(", ");
    dataset
        .variables()
        .iter()
        .map(|(name, data)| format!("{name} ({dims}) {}\n", data.kind()))
        .collect()
}

fn coords(dataset: &CompiledDataset, name: Option<&str>) -> String {
    let Some(name) = name else {
        let mut out: String = dataset.dims().iter().map(|d| format!("* {d}\n")).collect();
        for (coord, c) in dataset.coordinates() {
            out.push_str(&format!("  {coord} ({})\n", c.dimension));
        }
        return out;
    };

    if let Some(labels) = dataset.axis_labels(name) {
        return labels.into_iter().map(|l| format!("{l}\n")).collect();
    }
    let Some(coord) = dataset.coordinates().get(name) else {
        return format!("unknown coordinate '{name}'\n");
    };
    let labels = dataset.axis_labels(&coord.dimension).unwrap_or_default();
    labels
        .iter()
        .zip(&coord.values)
        .map(|(label, value)| match value {
            Some(v) => format!("{label}: {v}\n"),
            None => format!("{label}: <none>\n"),
        })
        .collect()
}

fn show(dataset: &CompiledDataset, args: &[&str]) -> String {
    let Some((variable, rest)) = args.split_first() else {
        return format!("usage: show VAR [DIM=LABEL ...] (dims: {TIME_DIM}, ...)\n");
    };

    let mut selectors = Selectors::new();
    for arg in rest {
        match parse_selector(arg) {
            Ok((dim, label)) => {
                selectors.insert(dim, label);
            }
            Err(e) => return format!("error: {e}\n"),
        }
    }

    match select(dataset, variable, &selectors) {
        Ok(selection) => selection.to_string(),
        Err(e) => format!("error: {e}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompileOptions;
    use crate::data::builder::build_dataset;
    use crate::data::infer::infer_types;
    use crate::data::model::RawCorpus;
    use chrono::{TimeZone, Utc};

    fn dataset() -> CompiledDataset {
        let mut raw = RawCorpus::default();
        for field in ["zip", "city", "population"] {
            raw.field_names.insert(field.to_string());
        }
        let rows = [("10001", "NYC", "5"), ("10002", "NYC", "7")];
        let records = rows
            .iter()
            .map(|(zip, city, population)| {
                [("zip", zip), ("city", city), ("population", population)]
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .collect();
        raw.snapshots
            .insert(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(), records);

        let options = CompileOptions::default()
            .with_dimension("zip")
            .with_coordinate("city", "zip");
        build_dataset(&infer_types(raw).unwrap(), &options).unwrap()
    }

    fn output(line: &str) -> String {
        match execute(&dataset(), line) {
            ShellAction::Continue(text) => text,
            ShellAction::Exit => panic!("'{line}' should not exit"),
        }
    }

    #[test]
    fn exit_and_quit_leave_the_shell() {
        assert_eq!(execute(&dataset(), "exit"), ShellAction::Exit);
        assert_eq!(execute(&dataset(), "  quit "), ShellAction::Exit);
    }

    #[test]
    fn listing_commands_describe_the_dataset() {
        assert_eq!(output("dims"), "time: 1\nzip: 2\n");
        assert_eq!(output("vars"), "population (time, zip) int64\n");
        assert_eq!(output("coords"), "* time\n* zip\n  city (zip)\n");
        assert_eq!(output("coords city"), "10001: NYC\n10002: NYC\n");
        assert!(output("info").contains("population"));
    }

    #[test]
    fn show_selects_by_label() {
        let text = output("show population zip=10002");
        assert_eq!(text, "population (time)\n  2020-01-01T00:00:00+00:00 = 7\n");

        let text = output("show population time=2020-01-01T00:00:00+00:00 zip=10001");
        assert_eq!(text, "population = 5\n");
    }

    #[test]
    fn mistakes_are_reported_not_fatal() {
        assert!(output("show").starts_with("usage"));
        assert!(output("show income").starts_with("error"));
        assert!(output("show population zip").starts_with("error"));
        assert!(output("frobnicate").starts_with("unknown command"));
        assert_eq!(output("   "), "");
    }
}
