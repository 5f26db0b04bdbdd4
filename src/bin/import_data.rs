use clap::Parser;
use covid_admissions::{StudyConfig, Tables};
use qu::ick_use::*;
use std::path::PathBuf;

#[derive(Parser)]
struct Opt {
    /// The study configuration (TOML). The defaults are used if not given.
    #[clap(long, short)]
    config: Option<PathBuf>,
}

/// Parse the CSV extracts and cache them in bincode format next to the originals.
#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let config = StudyConfig::load_or_default(opt.config.as_deref())?;
    let tables = Tables::from_csv_dir(&config.input_dir)?;
    tables.save(&config.input_dir)?;
    Ok(())
}
