//! Columns derived from the primary care record, relative to a reference date.
//!
//! Every study has the same primary care columns, named with a suffix (`_sus`, `_pc`) and
//! computed relative to a date column already in the dataset.
use super::Study;
use crate::{
    codelist::Codelist,
    codes::CodeSystem,
    comorbidity::add_comorbidities,
    dataset::Dataset,
    demographics::{
        add_years, dereg_date, ethnicity_label, imd_on, imd_quintile, prior_dereg_date,
        region_on, registered_on,
    },
    tables::ClinicalEvents,
    PatientId,
};

use chrono::NaiveDate;
use noisy_float::prelude::*;
use qu::ick_use::*;

/// BMI values outside this (open) range are recording errors.
const BMI_RANGE: (f64, f64) = (4.0, 200.0);
/// How far back a BMI recording counts.
const BMI_YEARS: i32 = 5;
/// BMI is only meaningful for adults.
const BMI_MIN_AGE: i32 = 16;

/// Adds the primary care columns for one reference date.
#[derive(Debug, Clone)]
pub struct PrimaryCare<'a> {
    study: &'a Study<'a>,
    reference: &'a str,
    suffix: &'a str,
}

impl<'a> PrimaryCare<'a> {
    pub fn new(study: &'a Study<'a>, reference: &'a str, suffix: &'a str) -> Self {
        Self {
            study,
            reference,
            suffix,
        }
    }

    fn name(&self, column: &str) -> String {
        format!("{}{}", column, self.suffix)
    }

    /// `prior_dereg_date`, `dereg_date` and `registered`.
    pub fn add_registration(&self, dataset: &mut Dataset) -> Result {
        let refs = dataset.dates(self.reference)?;
        let regs = &self.study.tables.practice_registrations;
        dataset.add(&self.name("prior_dereg_date"), |row| {
            refs[row.idx].and_then(|date| prior_dereg_date(regs.for_patient(row.patient_id), date))
        })?;
        dataset.add(&self.name("dereg_date"), |row| {
            dereg_date(regs.for_patient(row.patient_id))
        })?;
        dataset.add(&self.name("registered"), |row| {
            refs[row.idx]
                .map(|date| registered_on(regs.for_patient(row.patient_id), date))
                .unwrap_or(false)
        })?;
        Ok(())
    }

    /// Demographics, COVID history, comorbidities and BMI.
    pub fn add_characteristics(&self, dataset: &mut Dataset) -> Result {
        let refs = dataset.dates(self.reference)?;
        let tables = self.study.tables;
        let codelists = self.study.codelists;
        let events = &tables.clinical_events;

        dataset.add(&self.name("age"), |row| {
            let patient = tables.patients.find(row.patient_id)?;
            patient.age_on(refs[row.idx]?)
        })?;
        dataset.add(&self.name("sex"), |row| {
            tables
                .patients
                .find(row.patient_id)
                .map(|patient| patient.sex.as_str())
        })?;

        let ethnicity = codelists.get_in("ethnicity_codelist", CodeSystem::Snomed)?;
        dataset.add(&self.name("ethnicity"), |row| {
            let category = refs[row.idx].and_then(|date| {
                latest_event(events, ethnicity, CodeSystem::Snomed, row.patient_id, date)
                    .and_then(|(_, code)| ethnicity.category(code))
            });
            ethnicity_label(category.map(|c| &**c))
        })?;

        dataset.add(&self.name("imd"), |row| {
            let imd = refs[row.idx]
                .and_then(|date| imd_on(tables.addresses.for_patient(row.patient_id), date));
            imd_quintile(imd)
        })?;
        dataset.add(&self.name("region"), |row| {
            refs[row.idx].and_then(|date| {
                region_on(tables.practice_registrations.for_patient(row.patient_id), date)
            })
        })?;

        for (column, list) in [
            ("suspected_covid_date", "primary_care_suspected_covid_combined"),
            ("probable_covid_date", "covid_primary_care_probable_combined"),
        ] {
            let codelist = codelists.get_in(list, CodeSystem::Ctv3)?;
            dataset.add(&self.name(column), |row| {
                refs[row.idx].and_then(|date| {
                    latest_event(events, codelist, CodeSystem::Ctv3, row.patient_id, date)
                        .map(|(date, _)| date)
                })
            })?;
        }

        dataset.add(&self.name("last_positive_test_date"), |row| {
            let reference = refs[row.idx]?;
            tables
                .sgss_covid_all_tests
                .for_patient(row.patient_id)
                .filter(|test| test.is_positive)
                .filter_map(|test| test.specimen_taken_date)
                .filter(|date| *date <= reference)
                .max()
        })?;
        dataset.add(&self.name("covid19_vaccine"), |row| match refs[row.idx] {
            Some(reference) => tables
                .vaccinations
                .for_patient(row.patient_id)
                .any(|vacc| matches!(vacc.date, Some(date) if date <= reference)),
            None => false,
        })?;

        // obesity sits between hiv and the diabetes flags in the output
        let rules = &self.study.rules;
        let split = rules
            .iter()
            .position(|rule| &*rule.column == "hiv")
            .map(|idx| idx + 1)
            .unwrap_or(rules.len());
        add_comorbidities(
            dataset,
            events,
            codelists,
            &rules[..split],
            self.reference,
            self.suffix,
        )?;
        let obesity = codelists.get_in("obesity_codelist", CodeSystem::Snomed)?;
        dataset.add(&self.name("obesity"), |row| {
            let reference = refs[row.idx]?;
            let dob = tables.patients.find(row.patient_id)?.date_of_birth?;
            max_bmi(events, obesity, row.patient_id, dob, reference)
        })?;
        add_comorbidities(
            dataset,
            events,
            codelists,
            &rules[split..],
            self.reference,
            self.suffix,
        )?;
        Ok(())
    }

    /// `ons_death_date`, `death_date` and `has_died`. These are never suffixed.
    pub fn add_deaths(&self, dataset: &mut Dataset) -> Result {
        let refs = dataset.dates(self.reference)?;
        let tables = self.study.tables;
        dataset.add("ons_death_date", |row| {
            tables
                .ons_deaths
                .for_patient(row.patient_id)
                .filter_map(|death| death.date)
                .max()
        })?;
        dataset.add("death_date", |row| {
            tables
                .patients
                .find(row.patient_id)
                .and_then(|patient| patient.date_of_death)
        })?;
        dataset.add("has_died", |row| match refs[row.idx] {
            Some(reference) => tables
                .ons_deaths
                .for_patient(row.patient_id)
                .any(|death| matches!(death.date, Some(date) if date >= reference)),
            None => false,
        })?;
        Ok(())
    }

    /// Every primary care column, in the order the SUS study writes them.
    pub fn add_all(&self, dataset: &mut Dataset) -> Result {
        self.add_registration(dataset)?;
        self.add_characteristics(dataset)?;
        event!(
            Level::INFO,
            "added primary care columns relative to {}",
            self.reference
        );
        Ok(())
    }
}

/// The latest event on or before `date` with a code in `codelist`, as (date, code).
///
/// Ties on date go to the event that comes last in the table.
pub fn latest_event<'e>(
    events: &'e ClinicalEvents,
    codelist: &Codelist,
    system: CodeSystem,
    patient_id: PatientId,
    date: NaiveDate,
) -> Option<(NaiveDate, &'e str)> {
    events
        .for_patient(patient_id)
        .filter_map(|event| Some((event.date?, event.code(system)?)))
        .filter(|(on, code)| *on <= date && codelist.contains(code))
        .max_by_key(|(on, _)| *on)
}

/// The largest plausible BMI recorded in the five years up to `reference`, from age 16.
pub fn max_bmi(
    events: &ClinicalEvents,
    codelist: &Codelist,
    patient_id: PatientId,
    date_of_birth: NaiveDate,
    reference: NaiveDate,
) -> Option<f64> {
    let earliest = add_years(reference, -BMI_YEARS);
    let adult = add_years(date_of_birth, BMI_MIN_AGE);
    events
        .for_patient(patient_id)
        .filter(|event| {
            matches!(event.date, Some(date) if date >= earliest && date <= reference && date >= adult)
        })
        .filter(|event| {
            event
                .code(CodeSystem::Snomed)
                .map(|code| codelist.contains(code))
                .unwrap_or(false)
        })
        .filter_map(|event| event.numeric_value)
        .filter(|value| *value > BMI_RANGE.0 && *value < BMI_RANGE.1)
        .filter_map(R64::try_new)
        .max()
        .map(|value| value.raw())
}
