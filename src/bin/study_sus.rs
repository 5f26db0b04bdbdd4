use clap::Parser;
use covid_admissions::{
    study::{legacy_dataset, PreviousAdmission, Study},
    AdmissionMethod, Codelists, StudyConfig, Tables,
};
use qu::ick_use::*;
use std::path::PathBuf;

/// Find each patient's `n`th COVID-19 admission, given the output of the run for `n - 1`.
#[derive(Parser)]
struct Opt {
    /// Which admission to find, counting from 1.
    #[clap(long, short = 'n')]
    admission_number: u32,
    /// How COVID-19 admissions are identified (A, B or C).
    #[clap(long, short = 'm')]
    admission_method: AdmissionMethod,
    /// The study configuration (TOML). The defaults are used if not given.
    #[clap(long, short)]
    config: Option<PathBuf>,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let method = opt.admission_method.check_supported()?;
    let config = StudyConfig::load_or_default(opt.config.as_deref())?;
    let previous = PreviousAdmission::load(&config, method, opt.admission_number)?;
    let tables = Tables::load_or_import(&config.input_dir)?;
    let codelists = Codelists::load(&config.codelist_dir)?;
    let study = Study::new(&tables, &codelists, config.rules())?;

    let dataset = legacy_dataset(&study, method, &previous)?;
    dataset.write_csv(config.legacy_output(method, opt.admission_number))?;
    Ok(())
}
