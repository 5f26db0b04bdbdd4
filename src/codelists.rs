//! The named codelists used by the study.
use crate::{codelist::Codelist, codes::CodeSystem, error::SetupError, ArcStr};

use qu::ick_use::*;
use std::{collections::BTreeMap, path::Path};

/// ICD-10 codes for confirmed or suspected COVID-19 (and its sequelae).
pub const COVID_ICD10: &[&str] = &["U071", "U072", "U109", "U099"];

/// Emergency care discharge destinations that mean the patient was admitted.
pub const DISCHARGED_TO_HOSPITAL: &[&str] = &["306706006", "1066331000000109", "1066391000000105"];

/// Codes capturing a recorded body mass index.
pub const OBESITY: &[&str] = &["60621009", "846931000000101"];

/// Where a codelist file lives, and how to read it.
#[derive(Debug, Copy, Clone)]
pub struct CodelistFile {
    pub name: &'static str,
    pub file: &'static str,
    pub system: CodeSystem,
    pub column: &'static str,
    pub category_column: Option<&'static str>,
}

macro_rules! file {
    ($name:literal, $file:literal, $system:ident, $column:literal) => {
        CodelistFile {
            name: $name,
            file: $file,
            system: CodeSystem::$system,
            column: $column,
            category_column: None,
        }
    };
    ($name:literal, $file:literal, $system:ident, $column:literal, $category:literal) => {
        CodelistFile {
            name: $name,
            file: $file,
            system: CodeSystem::$system,
            column: $column,
            category_column: Some($category),
        }
    };
}

/// Codelists loaded from the codelist directory.
pub const CODELIST_FILES: &[CodelistFile] = &[
    file!("ethnicity_codelist", "opensafely-ethnicity-snomed-0removed.csv", Snomed, "snomedcode", "Grouping_6"),
    file!("covid_emergency", "opensafely-covid-19-ae-diagnosis-codes.csv", Snomed, "code"),
    file!("resp_emergency", "user-Louis-respiratory-related-ae.csv", Snomed, "code"),
    file!("covid_primary_care_positive_test", "opensafely-covid-identification-in-primary-care-probable-covid-positive-test.csv", Ctv3, "CTV3ID"),
    file!("covid_primary_care_code", "opensafely-covid-identification-in-primary-care-probable-covid-clinical-code.csv", Ctv3, "CTV3ID"),
    file!("covid_primary_care_sequelae", "opensafely-covid-identification-in-primary-care-probable-covid-sequelae.csv", Ctv3, "CTV3ID"),
    file!("covid_primary_care_suspected_covid_advice", "opensafely-covid-identification-in-primary-care-suspected-covid-advice.csv", Ctv3, "CTV3ID"),
    file!("covid_primary_care_suspected_covid_had_test", "opensafely-covid-identification-in-primary-care-suspected-covid-had-test.csv", Ctv3, "CTV3ID"),
    file!("covid_primary_care_suspected_covid_isolation", "opensafely-covid-identification-in-primary-care-suspected-covid-isolation-code.csv", Ctv3, "CTV3ID"),
    file!("covid_primary_care_suspected_covid_nonspecific_clinical_assessment", "opensafely-covid-identification-in-primary-care-suspected-covid-nonspecific-clinical-assessment.csv", Ctv3, "CTV3ID"),
    file!("covid_primary_care_suspected_covid_exposure", "opensafely-covid-identification-in-primary-care-exposure-to-disease.csv", Ctv3, "CTV3ID"),
    file!("chronic_cardiac_disease", "opensafely-chronic-cardiac-disease-snomed.csv", Snomed, "id"),
    file!("hypertension", "opensafely-hypertension-snomed.csv", Snomed, "id"),
    file!("copd", "nhsd-primary-care-domain-refsets-copd_cod.csv", Snomed, "code"),
    file!("asthma", "opensafely-asthma-diagnosis-snomed.csv", Snomed, "id"),
    file!("chronic_kidney_disease", "opensafely-chronic-kidney-disease-snomed.csv", Snomed, "id"),
    file!("chronic_liver_disease", "opensafely-chronic-liver-disease-snomed.csv", Snomed, "id"),
    file!("neuro_other", "opensafely-other-neurological-conditions-snomed.csv", Snomed, "id"),
    file!("cancer_haemo", "opensafely-haematological-cancer-snomed.csv", Snomed, "id"),
    file!("cancer_lung", "opensafely-lung-cancer-snomed.csv", Snomed, "id"),
    file!("cancer_other", "opensafely-cancer-excluding-lung-and-haematological-snomed.csv", Snomed, "id"),
    file!("hiv", "opensafely-hiv-snomed.csv", Snomed, "id"),
    file!("diabetes", "opensafely-diabetes-snomed.csv", Snomed, "id"),
    file!("diabetes_t1", "nhsd-primary-care-domain-refsets-dmtype1_cod.csv", Snomed, "code"),
    file!("diabetes_t2", "nhsd-primary-care-domain-refsets-dmtype2_cod.csv", Snomed, "code"),
    file!("dementia", "opensafely-dementia-snomed.csv", Snomed, "id"),
    file!("clear_smoking_codes", "opensafely-smoking-clear.csv", Ctv3, "CTV3Code", "Category"),
];

/// Codelists built by combining others: (name, parts).
pub const COMBINED_CODELISTS: &[(&str, &[&str])] = &[
    (
        "covid_primary_care_probable_combined",
        &[
            "covid_primary_care_positive_test",
            "covid_primary_care_code",
            "covid_primary_care_sequelae",
        ],
    ),
    (
        "primary_care_suspected_covid_combined",
        &[
            "covid_primary_care_suspected_covid_advice",
            "covid_primary_care_suspected_covid_had_test",
            "covid_primary_care_suspected_covid_isolation",
            "covid_primary_care_suspected_covid_exposure",
        ],
    ),
];

/// A registry from symbolic name to codelist.
#[derive(Debug, Clone, Default)]
pub struct Codelists {
    lists: BTreeMap<ArcStr, Codelist>,
}

impl Codelists {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding only the literal codelists.
    pub fn literals() -> Result<Self, SetupError> {
        let mut this = Self::new();
        this.insert(
            "covid_icd10",
            Codelist::from_codes(CodeSystem::Icd10, COVID_ICD10)?,
        );
        this.insert(
            "discharged_to_hospital",
            Codelist::from_codes(CodeSystem::Snomed, DISCHARGED_TO_HOSPITAL)?,
        );
        this.insert(
            "obesity_codelist",
            Codelist::from_codes(CodeSystem::Snomed, OBESITY)?,
        );
        Ok(this)
    }

    /// Load every codelist the study uses from `dir`, then build the combined lists.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut this = Self::literals()?;
        for file in CODELIST_FILES {
            let list = Codelist::from_csv(
                dir.join(file.file),
                file.system,
                file.column,
                file.category_column,
            )?;
            event!(
                Level::DEBUG,
                "loaded codelist {} ({} codes)",
                file.name,
                list.len()
            );
            this.insert(file.name, list);
        }
        this.build_combined()?;
        event!(
            Level::INFO,
            "loaded {} codelists from \"{}\"",
            this.len(),
            dir.display()
        );
        Ok(this)
    }

    /// Build the combined codelists from their (already registered) parts.
    pub fn build_combined(&mut self) -> Result<(), SetupError> {
        for (name, parts) in COMBINED_CODELISTS {
            let (first, rest) = match parts.split_first() {
                Some(split) => split,
                None => continue,
            };
            let first = self.get(first)?;
            let rest = rest
                .iter()
                .map(|name| self.get(name))
                .collect::<Result<Vec<_>, _>>()?;
            let combined = first.combine(&rest);
            self.insert(*name, combined);
        }
        Ok(())
    }

    pub fn insert(&mut self, name: impl Into<ArcStr>, list: Codelist) {
        self.lists.insert(name.into(), list);
    }

    pub fn get(&self, name: &str) -> Result<&Codelist, SetupError> {
        self.lists
            .get(name)
            .ok_or_else(|| SetupError::UnknownCodelist(name.into()))
    }

    /// Like `get`, but also checks the coding system of the list.
    pub fn get_in(&self, name: &str, system: CodeSystem) -> Result<&Codelist, SetupError> {
        let list = self.get(name)?;
        if list.system() != system {
            return Err(SetupError::WrongSystem {
                name: name.into(),
                expected: system,
                found: list.system(),
            });
        }
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn literals() {
        let lists = Codelists::literals().unwrap();
        assert!(lists.get("covid_icd10").unwrap().contains("U071"));
        assert_eq!(
            lists.get("discharged_to_hospital").unwrap().system(),
            CodeSystem::Snomed
        );
        assert_eq!(
            lists.get("chronic_cardiac_disease"),
            Err(SetupError::UnknownCodelist("chronic_cardiac_disease".into()))
        );
        assert!(matches!(
            lists.get_in("covid_icd10", CodeSystem::Snomed),
            Err(SetupError::WrongSystem { .. })
        ));
    }

    #[test]
    fn combined() {
        let mut lists = Codelists::new();
        let ctv3 = |codes: &[&str]| Codelist::from_codes(CodeSystem::Ctv3, codes).unwrap();
        lists.insert("covid_primary_care_positive_test", ctv3(&["Y20d1", "Y23f7"]));
        lists.insert("covid_primary_care_code", ctv3(&["Y20d1", "Y211f"]));
        lists.insert("covid_primary_care_sequelae", ctv3(&["Y2b9d"]));
        lists.insert("covid_primary_care_suspected_covid_advice", ctv3(&["Y228e"]));
        lists.insert("covid_primary_care_suspected_covid_had_test", ctv3(&["Y228e"]));
        lists.insert("covid_primary_care_suspected_covid_isolation", ctv3(&["Y2113"]));
        lists.insert("covid_primary_care_suspected_covid_exposure", ctv3(&["Y20fc"]));
        lists.build_combined().unwrap();
        assert_eq!(
            lists
                .get("covid_primary_care_probable_combined")
                .unwrap()
                .len(),
            4
        );
        assert_eq!(
            lists
                .get("primary_care_suspected_covid_combined")
                .unwrap()
                .len(),
            3
        );
    }

    #[test]
    fn combined_missing_part() {
        let mut lists = Codelists::new();
        assert!(matches!(
            lists.build_combined(),
            Err(SetupError::UnknownCodelist(_))
        ));
    }
}
