use chrono::NaiveDate;
use clap::Parser;
use covid_admissions::{
    study::{sus_dataset, Study},
    AdmissionMethod, Codelists, StudyConfig, Tables,
};
use qu::ick_use::*;
use std::path::PathBuf;

#[derive(Parser)]
struct Opt {
    /// How COVID-19 admissions are identified (A, B or C).
    #[clap(long, short = 'm')]
    admission_method: AdmissionMethod,
    /// Only count admissions on or after this date.
    #[clap(long)]
    since: Option<NaiveDate>,
    /// The study configuration (TOML). The defaults are used if not given.
    #[clap(long, short)]
    config: Option<PathBuf>,
    /// Where to write the dataset, instead of the output directory.
    #[clap(long, short)]
    output: Option<PathBuf>,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let method = opt.admission_method.check_supported()?;
    let config = StudyConfig::load_or_default(opt.config.as_deref())?;
    let tables = Tables::load_or_import(&config.input_dir)?;
    let codelists = Codelists::load(&config.codelist_dir)?;
    let study = Study::new(&tables, &codelists, config.rules())?;

    let dataset = sus_dataset(&study, method, opt.since)?;
    dataset.write_csv(opt.output.unwrap_or_else(|| config.sus_output(method)))?;
    Ok(())
}
