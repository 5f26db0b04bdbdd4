use clap::Parser;
use covid_admissions::{
    study::{isaric_dataset, Study},
    Codelists, StudyConfig, Tables,
};
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
    let tables = Tables::load_or_import(&config.input_dir)?;
    ensure!(
        !tables.isaric.rows().is_empty(),
        "the ISARIC table is empty, so there is no population"
    );
    let codelists = Codelists::load(&config.codelist_dir)?;
    let study = Study::new(&tables, &codelists, config.rules())?;

    let dataset = isaric_dataset(&study)?;
    dataset.write_csv(opt.output.unwrap_or_else(|| config.isaric_output()))?;
    Ok(())
}
