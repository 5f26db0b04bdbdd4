//! Assembling the output datasets.
//!
//! Each study variant picks a population, then adds its columns in output order. The primary
//! care columns are shared between variants and live in `primary_care`.
use crate::{
    codelists::Codelists, comorbidity::ComorbidityRule, error::SetupError, tables::Tables,
};

pub mod isaric;
pub mod isaric_raw;
pub mod legacy;
pub mod primary_care;
pub mod sus;

pub use isaric::isaric_dataset;
pub use isaric_raw::isaric_raw_dataset;
pub use legacy::{legacy_dataset, PreviousAdmission};
pub use primary_care::PrimaryCare;
pub use sus::sus_dataset;

/// Everything a study variant reads.
#[derive(Debug, Clone)]
pub struct Study<'a> {
    pub tables: &'a Tables,
    pub codelists: &'a Codelists,
    pub rules: Vec<ComorbidityRule>,
}

impl<'a> Study<'a> {
    /// Check the comorbidity rules against the codelists, so a bad rule fails before any work.
    pub fn new(
        tables: &'a Tables,
        codelists: &'a Codelists,
        rules: Vec<ComorbidityRule>,
    ) -> Result<Self, SetupError> {
        for rule in &rules {
            rule.codelist(codelists)?;
        }
        Ok(Self {
            tables,
            codelists,
            rules,
        })
    }

    /// The primary care columns relative to the date column `reference`, named with `suffix`.
    pub fn primary_care<'s>(&'s self, reference: &'s str, suffix: &'s str) -> PrimaryCare<'s> {
        PrimaryCare::new(self, reference, suffix)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! A small world of tables and codelists shared by the study tests.
    use crate::{
        codelist::Codelist,
        codelists::Codelists,
        codes::CodeSystem,
        tables::{
            Address, ClinicalEvent, CovidTest, HospitalAdmission, OnsDeath, PracticeRegistration,
            Tables, Vaccination,
        },
        Patient, PatientId, Sex,
    };
    use chrono::NaiveDate;

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn codelists() -> Codelists {
        let mut lists = Codelists::literals().unwrap();
        let snomed = |codes: &[&str]| Codelist::from_codes(CodeSystem::Snomed, codes).unwrap();
        let ctv3 = |codes: &[&str]| Codelist::from_codes(CodeSystem::Ctv3, codes).unwrap();
        for (name, list) in [
            ("chronic_cardiac_disease", snomed(&["194828000"])),
            ("hypertension", snomed(&["38341003"])),
            ("copd", snomed(&["13645005"])),
            ("asthma", snomed(&["195967001"])),
            ("chronic_kidney_disease", snomed(&["709044004"])),
            ("chronic_liver_disease", snomed(&["328383001"])),
            ("neuro_other", snomed(&["230690007"])),
            ("cancer_lung", snomed(&["93880001"])),
            ("cancer_other", snomed(&["363346000"])),
            ("cancer_haemo", snomed(&["118600007"])),
            ("hiv", snomed(&["86406008"])),
            ("diabetes", snomed(&["73211009"])),
            ("diabetes_t1", snomed(&["46635009"])),
            ("diabetes_t2", snomed(&["44054006"])),
            ("dementia", snomed(&["52448006"])),
            ("covid_emergency", snomed(&["1240751000000100"])),
            ("primary_care_suspected_covid_combined", ctv3(&["Y20d1"])),
            ("covid_primary_care_probable_combined", ctv3(&["Y228d"])),
        ] {
            lists.insert(name, list);
        }
        let ethnicity = Codelist::from_reader(
            "snomedcode,Grouping_6\n976631000000101,1\n92491000000104,3\n".as_bytes(),
            CodeSystem::Snomed,
            "snomedcode",
            Some("Grouping_6"),
        )
        .unwrap();
        lists.insert("ethnicity_codelist", ethnicity);
        let smoking = Codelist::from_reader(
            "CTV3Code,Category\n137R.,S\n137L.,N\n".as_bytes(),
            CodeSystem::Ctv3,
            "CTV3Code",
            Some("Category"),
        )
        .unwrap();
        lists.insert("clear_smoking_codes", smoking);
        lists
    }

    pub fn snomed_event(patient_id: PatientId, on: NaiveDate, code: &str) -> ClinicalEvent {
        ClinicalEvent {
            patient_id,
            date: Some(on),
            snomedct_code: Some(code.into()),
            ctv3_code: None,
            numeric_value: None,
        }
    }

    pub fn ctv3_event(patient_id: PatientId, on: NaiveDate, code: &str) -> ClinicalEvent {
        ClinicalEvent {
            patient_id,
            date: Some(on),
            snomedct_code: None,
            ctv3_code: Some(code.into()),
            numeric_value: None,
        }
    }

    pub fn bmi(patient_id: PatientId, on: NaiveDate, value: f64) -> ClinicalEvent {
        ClinicalEvent {
            numeric_value: Some(value),
            ..snomed_event(patient_id, on, "60621009")
        }
    }

    pub fn admission(
        patient_id: PatientId,
        admitted: NaiveDate,
        method: &str,
        diagnoses: &str,
        critical_care: i64,
    ) -> HospitalAdmission {
        HospitalAdmission {
            patient_id,
            admission_date: Some(admitted),
            discharge_date: admitted.succ_opt(),
            admission_method: Some(method.into()),
            all_diagnoses: Some(diagnoses.into()),
            days_in_critical_care: Some(critical_care),
        }
    }

    pub fn registration(
        patient_id: PatientId,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> PracticeRegistration {
        PracticeRegistration {
            patient_id,
            start_date: Some(start),
            end_date: end,
            practice_pseudo_id: Some(patient_id as i64 * 10),
            practice_stp: Some("E54000005".into()),
            practice_nuts1_region_name: Some("London".into()),
        }
    }

    /// Three patients:
    ///
    /// 1. born 1950, registered throughout, asthma, two unplanned COVID admissions and a
    ///    readmission on the same day, died in hospital.
    /// 2. born 1980, registration ended 2020-06-01, one elective COVID admission.
    /// 3. born 2000, no admissions.
    pub fn tables() -> Tables {
        let mut tables = Tables::empty();
        tables.patients = vec![
            Patient {
                patient_id: 1,
                date_of_birth: Some(date(1950, 6, 1)),
                sex: Sex::Female,
                date_of_death: Some(date(2021, 2, 1)),
            },
            Patient {
                patient_id: 2,
                date_of_birth: Some(date(1980, 1, 1)),
                sex: Sex::Male,
                date_of_death: None,
            },
            Patient {
                patient_id: 3,
                date_of_birth: Some(date(2000, 1, 1)),
                sex: Sex::Unknown,
                date_of_death: None,
            },
        ]
        .into_iter()
        .collect();
        tables.hospital_admissions = vec![
            admission(1, date(2020, 4, 10), "21", "U071", 2),
            admission(1, date(2020, 4, 10), "21", "J189,U071", 0),
            admission(1, date(2021, 1, 5), "2A", "U072 ,I10X", 5),
            admission(2, date(2020, 12, 1), "11", "U0719", 1),
            admission(3, date(2020, 5, 1), "21", "S720", 0),
        ]
        .into_iter()
        .collect();
        tables.clinical_events = vec![
            snomed_event(1, date(2010, 1, 1), "195967001"),
            snomed_event(1, date(2015, 1, 1), "976631000000101"),
            ctv3_event(1, date(2020, 4, 1), "Y20d1"),
            ctv3_event(1, date(2020, 4, 11), "Y20d1"),
            ctv3_event(1, date(2019, 1, 1), "137R."),
            bmi(1, date(2018, 1, 1), 31.5),
            bmi(1, date(2019, 1, 1), 28.0),
            bmi(1, date(2019, 6, 1), 250.0),
            bmi(1, date(2010, 1, 1), 40.0),
            snomed_event(2, date(2020, 12, 1), "38341003"),
            snomed_event(2, date(2018, 1, 1), "92491000000104"),
            bmi(2, date(1990, 1, 1), 35.0),
        ]
        .into_iter()
        .collect();
        tables.practice_registrations = vec![
            registration(1, date(1990, 1, 1), Some(date(2000, 1, 1))),
            registration(1, date(2000, 1, 1), Some(date(9999, 12, 31))),
            registration(2, date(2000, 1, 1), Some(date(2020, 6, 1))),
            registration(3, date(2010, 1, 1), None),
        ]
        .into_iter()
        .collect();
        tables.addresses = vec![
            Address {
                patient_id: 1,
                start_date: Some(date(2000, 1, 1)),
                end_date: None,
                imd_rounded: Some(32844),
            },
            Address {
                patient_id: 2,
                start_date: Some(date(2000, 1, 1)),
                end_date: None,
                imd_rounded: Some(100),
            },
        ]
        .into_iter()
        .collect();
        tables.sgss_covid_all_tests = vec![
            CovidTest {
                patient_id: 1,
                specimen_taken_date: Some(date(2020, 4, 8)),
                is_positive: true,
            },
            CovidTest {
                patient_id: 1,
                specimen_taken_date: Some(date(2020, 4, 9)),
                is_positive: false,
            },
        ]
        .into_iter()
        .collect();
        tables.vaccinations = vec![Vaccination {
            patient_id: 2,
            date: Some(date(2020, 11, 1)),
            target_disease: Some("SARS-2 CORONAVIRUS".into()),
            product_name: None,
        }]
        .into_iter()
        .collect();
        tables.ons_deaths = vec![OnsDeath {
            patient_id: 1,
            date: Some(date(2021, 2, 1)),
            place: Some("Hospital".into()),
        }]
        .into_iter()
        .collect();
        tables
    }
}
