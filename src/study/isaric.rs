//! The ISARIC study: patients with an ISARIC case report, linked to primary care and SUS.
use super::Study;
use crate::{
    codes::CodeSystem,
    dataset::{Dataset, Value},
    diagnosis::DiagnosisMatcher,
    tables::{Isaric, IsaricRow},
    util,
};

use chrono::Duration;
use qu::ick_use::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The admission date column of the case report.
pub const ADMISSION_DATE: &str = "hostdat";
/// When a patient has several case reports, the one with the lowest value here is used.
pub const SORT_COLUMN: &str = "age";

const REFERENCE: &str = "first_admission_date_isaric";

/// Case report columns copied to the output as they are, as (source, output).
pub const PASSTHROUGH: &[(&str, &str)] = &[
    ("age", "age_isaric"),
    ("calc_age", "calc_age_isaric"),
    ("sex", "sex_isaric"),
    ("corona_ieorres", "corona_ieorres_isaric"),
    ("coriona_ieorres2", "coriona_ieorres2_isaric"),
    ("coriona_ieorres3", "coriona_ieorres3_isaric"),
    ("inflammatory_mss", "inflammatory_mss_isaric"),
    ("ethnic___1", "eth1_isaric"),
    ("ethnic___2", "eth2_isaric"),
    ("ethnic___3", "eth3_isaric"),
    ("ethnic___4", "eth4_isaric"),
    ("ethnic___5", "eth5_isaric"),
    ("ethnic___6", "eth6_isaric"),
    ("ethnic___7", "eth7_isaric"),
    ("ethnic___8", "eth8_isaric"),
    ("ethnic___9", "eth9_isaric"),
    ("ethnic___10", "eth10_isaric"),
    ("covid19_vaccine", "covid19_vaccine_isaric"),
    ("chrincard", "ccd_isaric"),
    ("hypertension_mhyn", "hypertension_isaric"),
    ("chronicpul_mhyn", "copd_isaric"),
    ("asthma_mhyn", "asthma_isaric"),
    ("renal_mhyn", "ckd_isaric"),
    ("mildliver", "mildliver_isaric"),
    ("modliv", "modliver_isaric"),
    ("chronicneu_mhyn", "neuro_isaric"),
    ("malignantneo_mhyn", "cancer_isaric"),
    ("chronichaemo_mhyn", "cancer_haemo_isaric"),
    ("aidshiv_mhyn", "hiv_isaric"),
    ("obesity_mhyn", "obesity_isaric"),
    ("diabetes_mhyn", "diabetes_isaric"),
    ("diabetescom_mhyn", "diabetescom_isaric"),
    ("rheumatologic_mhyn", "rheumatologic_isaric"),
    ("dementia_mhyn", "dementia_isaric"),
    ("malnutrition_mhyn", "malnutrition_isaric"),
    ("smoking_mhyn", "smoking_isaric"),
];

fn column_index(isaric: &Isaric, name: &str) -> Result<usize> {
    isaric
        .column_index(name)
        .ok_or_else(|| format_err!("the ISARIC extract has no column \"{}\"", name))
}

/// Build the ISARIC dataset.
pub fn isaric_dataset(study: &Study) -> Result<Dataset> {
    let tables = study.tables;
    let isaric = &tables.isaric;
    let sort_idx = column_index(isaric, SORT_COLUMN)?;
    let date_idx = column_index(isaric, ADMISSION_DATE)?;
    let passthrough = PASSTHROUGH
        .iter()
        .map(|(source, output)| Ok((column_index(isaric, source)?, *output)))
        .collect::<Result<Vec<_>>>()?;
    let covid = DiagnosisMatcher::new(study.codelists.get_in("covid_icd10", CodeSystem::Icd10)?)?;

    let mut ds = Dataset::new(isaric.rows().patient_ids());
    let first = ds
        .population()
        .iter()
        .map(|id| isaric.first_sorted_by(*id, sort_idx))
        .collect::<Vec<Option<&IsaricRow>>>();
    let text = |row: usize, idx: usize| -> Value {
        first[row]
            .and_then(|isaric_row| isaric_row.values[idx].clone())
            .into()
    };

    let bad_dates = AtomicUsize::new(0);
    ds.add(REFERENCE, |row| {
        let value = first[row.idx].and_then(|isaric_row| isaric_row.values[date_idx].as_deref());
        match value.map(util::parse_date) {
            Some(Ok(date)) => Some(date),
            Some(Err(_)) => {
                bad_dates.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => None,
        }
    })?;
    let bad_dates = bad_dates.into_inner();
    if bad_dates > 0 {
        event!(
            Level::WARN,
            "{} ISARIC admission dates could not be parsed and were treated as missing",
            bad_dates
        );
    }
    for (idx, output) in passthrough {
        ds.add(output, |row| text(row.idx, idx))?;
    }

    let pc = study.primary_care(REFERENCE, "_pc");
    pc.add_characteristics(&mut ds)?;

    let refs = ds.dates(REFERENCE)?;
    let hospital = &tables.hospital_admissions;
    ds.add("n_admissions", |row| {
        isaric.rows().for_patient(row.patient_id).count() as i64
    })?;
    ds.add("days_in_critical_care", |row| {
        let reference = refs[row.idx]?;
        hospital
            .for_patient(row.patient_id)
            .filter(|adm| adm.admission_date == Some(reference))
            .find(|adm| covid.matches_opt(adm.all_diagnoses.as_deref()))
            .and_then(|adm| adm.days_in_critical_care)
    })?;
    pc.add_deaths(&mut ds)?;
    for (name, days) in [
        ("non_covid_admission_SUS_same_date", 0),
        ("non_covid_admission_SUS_2days", 2),
    ] {
        ds.add(name, |row| match refs[row.idx] {
            Some(reference) => {
                let (from, to) = (reference - Duration::days(days), reference + Duration::days(days));
                hospital
                    .for_patient(row.patient_id)
                    .any(|adm| matches!(adm.admission_date, Some(date) if date >= from && date <= to))
            }
            None => false,
        })?;
    }
    pc.add_registration(&mut ds)?;

    event!(
        Level::INFO,
        "built ISARIC dataset: {} patients, {} columns",
        ds.len(),
        ds.column_names().count()
    );
    Ok(ds)
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::{
        comorbidity::default_rules,
        study::fixtures::{codelists, date, tables},
        ArcStr, PatientId,
    };

    /// An ISARIC table with every column the study reads, filled from `(patient, [(column, value)])`.
    pub fn isaric(rows: &[(PatientId, &[(&str, &str)])]) -> Isaric {
        let columns = std::iter::once(ADMISSION_DATE)
            .chain(PASSTHROUGH.iter().map(|(source, _)| *source))
            .map(ArcStr::from)
            .collect::<Vec<_>>();
        let rows = rows
            .iter()
            .map(|(patient_id, values)| IsaricRow {
                patient_id: *patient_id,
                values: columns
                    .iter()
                    .map(|col| {
                        values
                            .iter()
                            .find(|(name, _)| *name == &**col)
                            .map(|(_, value)| ArcStr::from(*value))
                    })
                    .collect(),
            })
            .collect();
        Isaric::new(columns, rows).unwrap()
    }

    #[test]
    fn linked_dataset() {
        let mut tables = tables();
        tables.isaric = isaric(&[
            (1, &[("hostdat", "2020-04-12"), ("age", "71"), ("sex", "2")]),
            (
                1,
                &[("hostdat", "2020-04-10"), ("age", "70"), ("asthma_mhyn", "1")],
            ),
            (2, &[("hostdat", "unknown"), ("ethnic___3", "1")]),
        ]);
        let codelists = codelists();
        let study = Study::new(&tables, &codelists, default_rules()).unwrap();
        let ds = isaric_dataset(&study).unwrap();
        assert_eq!(ds.population(), [1, 2]);
        let col = |name| ds.column(name).unwrap().to_vec();
        assert_eq!(
            col("first_admission_date_isaric"),
            [Value::Date(date(2020, 4, 10)), Value::Null]
        );
        assert_eq!(col("age_isaric"), [Value::from("70"), Value::Null]);
        assert_eq!(col("sex_isaric"), [Value::Null, Value::Null]);
        assert_eq!(col("asthma_isaric"), [Value::from("1"), Value::Null]);
        assert_eq!(col("eth3_isaric"), [Value::Null, Value::from("1")]);
        assert_eq!(col("age_pc"), [Value::Int(69), Value::Null]);
        assert_eq!(col("asthma_pc"), [Value::Bool(true), Value::Bool(false)]);
        assert_eq!(col("n_admissions"), [Value::Int(2), Value::Int(1)]);
        assert_eq!(col("days_in_critical_care"), [Value::Int(2), Value::Null]);
        assert_eq!(
            col("non_covid_admission_SUS_same_date"),
            [Value::Bool(true), Value::Bool(false)]
        );
        assert_eq!(
            col("non_covid_admission_SUS_2days"),
            [Value::Bool(true), Value::Bool(false)]
        );
        assert_eq!(col("registered_pc"), [Value::Bool(true), Value::Bool(false)]);

        let names = ds.column_names().map(|n| n.to_string()).collect::<Vec<_>>();
        assert_eq!(names[0], "first_admission_date_isaric");
        assert_eq!(names[1], "age_isaric");
        assert_eq!(names.last().map(|s| &**s), Some("registered_pc"));
    }

    #[test]
    fn admissions_near_the_isaric_date() {
        let mut tables = tables();
        tables.isaric = isaric(&[(3, &[("hostdat", "2020-05-03"), ("age", "20")])]);
        let codelists = codelists();
        let study = Study::new(&tables, &codelists, default_rules()).unwrap();
        let ds = isaric_dataset(&study).unwrap();
        // patient 3 was admitted on 2020-05-01, without COVID
        assert_eq!(
            ds.value(0, "non_covid_admission_SUS_same_date").unwrap(),
            &Value::Bool(false)
        );
        assert_eq!(
            ds.value(0, "non_covid_admission_SUS_2days").unwrap(),
            &Value::Bool(true)
        );
        assert_eq!(ds.value(0, "days_in_critical_care").unwrap(), &Value::Null);
    }

    #[test]
    fn missing_columns() {
        let mut tables = tables();
        tables.isaric = Isaric::new(
            vec!["hostdat".into()],
            vec![IsaricRow {
                patient_id: 1,
                values: vec![Some("2020-01-01".into())],
            }],
        )
        .unwrap();
        let codelists = codelists();
        let study = Study::new(&tables, &codelists, default_rules()).unwrap();
        let err = isaric_dataset(&study).unwrap_err();
        assert!(err.to_string().contains("\"age\""));
    }
}
