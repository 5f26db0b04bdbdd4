//! The chained SUS study: one run per admission number.
//!
//! Run `n` finds each patient's first admission after the one found by run `n - 1`, reading the
//! earlier run's output. The first run searches from the start of the study window.
use super::Study;
use crate::{
    admissions::{select_episodes, AdmissionMethod},
    config::StudyConfig,
    dataset::{read_date_column, Dataset},
    demographics::{active_on, dereg_date_on_or_after, prior_dereg_date, registered_on},
    error::SetupError,
    PatientId,
};

use chrono::NaiveDate;
use qu::ick_use::*;
use std::collections::BTreeMap;

/// The column holding the admission date found by a run.
pub const ADMISSION_DATE: &str = "admiss_date";

/// Where the search for the next admission starts (the day after this date).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviousAdmission {
    /// The same date for everyone.
    Fixed(NaiveDate),
    /// Each patient's previous admission. Patients without one have no next admission.
    ByPatient(BTreeMap<PatientId, NaiveDate>),
}

impl PreviousAdmission {
    /// The previous admissions for run `admission_number` (counting from 1).
    pub fn load(config: &StudyConfig, method: AdmissionMethod, admission_number: u32) -> Result<Self> {
        match admission_number {
            0 => Err(SetupError::InvalidParameter {
                name: "admission_number",
                reason: "admissions are numbered from 1".into(),
            }
            .into()),
            1 => Ok(PreviousAdmission::Fixed(config.window.start)),
            n => {
                let path = config.legacy_output(method, n - 1);
                let dates = read_date_column(&path, ADMISSION_DATE)?;
                event!(
                    Level::INFO,
                    "read {} previous admission dates from \"{}\"",
                    dates.len(),
                    path.display()
                );
                Ok(PreviousAdmission::ByPatient(dates))
            }
        }
    }

    pub fn for_patient(&self, patient_id: PatientId) -> Option<NaiveDate> {
        match self {
            PreviousAdmission::Fixed(date) => Some(*date),
            PreviousAdmission::ByPatient(dates) => dates.get(&patient_id).copied(),
        }
    }
}

/// Build the dataset for the admission after `previous`.
pub fn legacy_dataset(
    study: &Study,
    method: AdmissionMethod,
    previous: &PreviousAdmission,
) -> Result<Dataset> {
    let tables = study.tables;
    let episodes = select_episodes(
        method,
        &tables.hospital_admissions,
        &tables.emergency_care_attendances,
        study.codelists,
    )?;
    let admissions = episodes
        .patient_ids()
        .filter_map(|id| {
            let from = previous.for_patient(id)?.succ_opt()?;
            let episode = episodes.first_on_or_after(id, from)?;
            Some((id, episode.date))
        })
        .collect::<BTreeMap<_, _>>();

    let mut ds = Dataset::new(admissions.keys().copied());
    ds.add("previous_admiss_date", |row| previous.for_patient(row.patient_id))?;
    ds.add(ADMISSION_DATE, |row| admissions.get(&row.patient_id).copied())?;
    let admiss = ds.dates(ADMISSION_DATE)?;

    let regs = &tables.practice_registrations;
    ds.add("prior_dereg_date", |row| {
        admiss[row.idx].and_then(|date| prior_dereg_date(regs.for_patient(row.patient_id), date))
    })?;
    ds.add("dereg_date", |row| {
        admiss[row.idx]
            .and_then(|date| dereg_date_on_or_after(regs.for_patient(row.patient_id), date))
    })?;
    ds.add("registered", |row| {
        admiss[row.idx]
            .map(|date| registered_on(regs.for_patient(row.patient_id), date))
            .unwrap_or(false)
    })?;
    ds.add("age", |row| {
        tables
            .patients
            .find(row.patient_id)?
            .age_on(admiss[row.idx]?)
    })?;
    ds.add("sex", |row| {
        tables
            .patients
            .find(row.patient_id)
            .map(|patient| patient.sex.as_str())
    })?;

    let practice = admiss
        .iter()
        .zip(ds.population())
        .map(|(date, id)| date.and_then(|date| active_on(regs.for_patient(*id), date)))
        .collect::<Vec<_>>();
    ds.add("practice_id", |row| {
        practice[row.idx].and_then(|reg| reg.practice_pseudo_id)
    })?;
    ds.add("stp", |row| {
        practice[row.idx].and_then(|reg| reg.practice_stp.clone())
    })?;
    ds.add("region", |row| {
        practice[row.idx].and_then(|reg| reg.practice_nuts1_region_name.clone())
    })?;
    ds.add("death_date", |row| {
        tables
            .ons_deaths
            .for_patient(row.patient_id)
            .filter_map(|death| death.date)
            .max()
    })?;

    event!(
        Level::INFO,
        "built chained SUS dataset for method {}: {} patients",
        method,
        ds.len()
    );
    Ok(ds)
}
