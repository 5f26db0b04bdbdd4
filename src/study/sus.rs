//! The SUS study: patients with a COVID-19 admission, by one of the admission methods.
use super::Study;
use crate::{
    admissions::{nth_episode_dates, select_episodes, AdmissionMethod},
    dataset::Dataset,
};

use chrono::{Duration, NaiveDate};
use qu::ick_use::*;

/// How many sequential admission dates are written.
pub const ADMISSION_COLUMNS: usize = 5;

const REFERENCE: &str = "first_admission_date_sus";

/// Build the SUS dataset for `method`, counting only episodes on or after `since` if given.
pub fn sus_dataset(
    study: &Study,
    method: AdmissionMethod,
    since: Option<NaiveDate>,
) -> Result<Dataset> {
    let tables = study.tables;
    let mut episodes = select_episodes(
        method,
        &tables.hospital_admissions,
        &tables.emergency_care_attendances,
        study.codelists,
    )?;
    if let Some(since) = since {
        episodes = episodes.since(since);
    }
    let episodes = &episodes;

    let mut ds = Dataset::new(episodes.patient_ids());
    ds.add(REFERENCE, |row| {
        episodes.first(row.patient_id).map(|episode| episode.date)
    })?;
    let dates = ds
        .population()
        .iter()
        .map(|id| nth_episode_dates(episodes.for_patient(*id), ADMISSION_COLUMNS, Duration::zero()))
        .collect::<Vec<_>>();
    for n in 0..ADMISSION_COLUMNS {
        ds.add(&format!("admission{}_date_sus", n + 1), |row| dates[row.idx][n])?;
    }

    let pc = study.primary_care(REFERENCE, "_sus");
    pc.add_registration(&mut ds)?;
    pc.add_characteristics(&mut ds)?;

    let hospital = method.is_hospital();
    if hospital {
        ds.add("n_admissions", |row| episodes.count(row.patient_id) as i64)?;
        ds.add("days_in_critical_care", |row| {
            episodes
                .first(row.patient_id)
                .and_then(|episode| episode.days_in_critical_care)
        })?;
    }
    pc.add_deaths(&mut ds)?;
    ds.add("in_hospital_death", |row| {
        tables
            .ons_deaths
            .for_patient(row.patient_id)
            .any(|death| death.place.as_deref() == Some("Hospital"))
    })?;
    if hospital {
        ds.add("discharge_date", |row| {
            episodes
                .first(row.patient_id)
                .and_then(|episode| episode.discharge_date)
        })?;
    }
    event!(
        Level::INFO,
        "built SUS dataset for method {}: {} patients, {} columns",
        method,
        ds.len(),
        ds.column_names().count()
    );
    Ok(ds)
}
