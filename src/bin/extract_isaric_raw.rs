use clap::Parser;
use covid_admissions::{study::isaric_raw_dataset, tables::Isaric, StudyConfig};
use qu::ick_use::*;
use std::path::PathBuf;

#[derive(Parser)]
struct Opt {
    /// The study configuration (TOML). The defaults are used if not given.
    #[clap(long, short)]
    config: Option<PathBuf>,
    /// Where to write the dataset, instead of the output directory.
    #[clap(long, short)]
    output: Option<PathBuf>,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let config = StudyConfig::load_or_default(opt.config.as_deref())?;
    // only the ISARIC table is needed, so don't load the rest
    let isaric = Isaric::load_or_import(&config.input_dir)?;

    let dataset = isaric_raw_dataset(&isaric)?;
    dataset.write_csv(opt.output.unwrap_or_else(|| config.isaric_raw_output()))?;
    Ok(())
}
