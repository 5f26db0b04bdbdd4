use clap::Parser;
use covid_admissions::{header, Dataset, Range, RangeSet};
use qu::ick_use::*;
use serde::Serialize;
use std::{fs, path::PathBuf};
use term_data_table::{Cell, Row, Table};

#[derive(Parser)]
struct Opt {
    /// The dataset to summarize (CSV, optionally gzipped).
    input: PathBuf,
    /// The column holding ages, if any.
    #[clap(long)]
    age_column: Option<String>,
    /// Also write the summary as JSON to this file.
    #[clap(long)]
    json: Option<PathBuf>,
}

#[derive(Serialize)]
struct Summary {
    rows: usize,
    columns: Vec<ColumnSummary>,
}

#[derive(Serialize)]
struct ColumnSummary {
    name: String,
    missing: usize,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let dataset = Dataset::read_csv(&opt.input)?;
    let rows = dataset.len();

    header("Dataset");
    println!("patients: {}", rows);
    println!("columns: {}", dataset.column_names().count());

    header("Missing values");
    let mut table = Table::new().with_row(
        Row::new()
            .with_cell(Cell::from("Column"))
            .with_cell(Cell::from("Missing"))
            .with_cell(Cell::from("Percentage")),
    );
    let counts = dataset.null_counts();
    for (name, missing) in counts.iter() {
        table.add_row(
            Row::new()
                .with_cell(Cell::from(name.to_string()))
                .with_cell(Cell::from(missing.to_string()))
                .with_cell(Cell::from(percent(*missing, rows))),
        );
    }
    println!("{}", table.for_terminal());

    if let Some(age_column) = opt.age_column.as_deref() {
        header("Ages");
        let age_buckets = RangeSet::new(vec![
            Range::new(0, Some(18)),
            Range::new(18, Some(40)),
            Range::new(40, Some(50)),
            Range::new(50, Some(60)),
            Range::new(60, Some(70)),
            Range::new(70, Some(80)),
            Range::new(80, None),
        ]);
        let ages = dataset
            .column(age_column)?
            .iter()
            .map(|value| value.as_str().and_then(|age| age.parse::<i64>().ok()));
        let counts = age_buckets.bucket_values_with_missing(ages);
        let mut table = Table::new().with_row(
            Row::new()
                .with_cell(Cell::from("Age range"))
                .with_cell(Cell::from("Count"))
                .with_cell(Cell::from("Percentage")),
        );
        for (label, count) in counts.for_display() {
            table.add_row(
                Row::new()
                    .with_cell(Cell::from(label.to_string()))
                    .with_cell(Cell::from(count.to_string()))
                    .with_cell(Cell::from(percent(count, rows))),
            );
        }
        println!("{}", table.for_terminal());
    }

    if let Some(path) = opt.json {
        let summary = Summary {
            rows,
            columns: counts
                .into_iter()
                .map(|(name, missing)| ColumnSummary {
                    name: name.to_string(),
                    missing,
                })
                .collect(),
        };
        let text = serde_json::to_string_pretty(&summary)?;
        fs::write(&path, text)
            .with_context(|| format!("writing summary to \"{}\"", path.display()))?;
    }
    Ok(())
}

fn percent(count: usize, total: usize) -> String {
    if total == 0 {
        return "-".into();
    }
    format!("{:.1}%", count as f64 / total as f64 * 100.)
}
