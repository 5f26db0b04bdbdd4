//! Comorbidity flags: did the patient have a coded condition before a reference date?
//!
//! Which conditions we look for is a table of rules, so a study can swap in its own (e.g. from
//! the config file) without new code.
use crate::{
    codelist::Codelist,
    codelists::Codelists,
    codes::CodeSystem,
    dataset::{Dataset, Value},
    error::SetupError,
    tables::{ClinicalEvent, ClinicalEvents},
    ArcStr, PatientId,
};

use chrono::NaiveDate;
use qu::ick_use::*;
use serde::{Deserialize, Serialize};

/// What a flag should be when the patient's reference date is missing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingReference {
    /// No reference date means no events before it, so the flag is false.
    #[default]
    False,
    /// The flag is null.
    Null,
}

/// One row of the comorbidity table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComorbidityRule {
    /// The output column, before the study's suffix is added.
    pub column: ArcStr,
    /// The name of the codelist in the registry.
    pub codelist: ArcStr,
    /// Which code column of the clinical events to match against.
    pub system: CodeSystem,
    /// The reference date column. Defaults to the study's reference date.
    #[serde(default)]
    pub reference: Option<ArcStr>,
    #[serde(default)]
    pub missing_reference: MissingReference,
}

impl ComorbidityRule {
    pub fn new(column: &str, codelist: &str, system: CodeSystem) -> Self {
        Self {
            column: column.into(),
            codelist: codelist.into(),
            system,
            reference: None,
            missing_reference: MissingReference::False,
        }
    }

    /// Find the rule's codelist, checking it is usable for primary care events.
    pub fn codelist<'a>(&self, codelists: &'a Codelists) -> Result<&'a Codelist, SetupError> {
        if self.system == CodeSystem::Icd10 {
            return Err(SetupError::InvalidParameter {
                name: "system",
                reason: format!(
                    "rule \"{}\": clinical events are not coded in {}",
                    self.column, self.system
                ),
            });
        }
        codelists.get_in(&self.codelist, self.system)
    }

    /// The flag for one patient, given their reference date.
    pub fn evaluate(
        &self,
        events: &ClinicalEvents,
        codelist: &Codelist,
        patient_id: PatientId,
        reference: Option<NaiveDate>,
    ) -> Value {
        match (reference, self.missing_reference) {
            (None, MissingReference::Null) => Value::Null,
            (reference, _) => Value::Bool(derive_flag(
                events,
                codelist,
                self.system,
                patient_id,
                cutoff(reference),
            )),
        }
    }
}

/// The table of comorbidities recorded for every study.
pub fn default_rules() -> Vec<ComorbidityRule> {
    use CodeSystem::*;
    [
        ("ccd", "chronic_cardiac_disease", Snomed),
        ("hypertension", "hypertension", Snomed),
        ("copd", "copd", Snomed),
        ("asthma", "asthma", Snomed),
        ("ckd", "chronic_kidney_disease", Snomed),
        ("cld", "chronic_liver_disease", Snomed),
        ("neuro", "neuro_other", Snomed),
        ("cancer_lung", "cancer_lung", Snomed),
        ("cancer_other", "cancer_other", Snomed),
        ("cancer_haemo", "cancer_haemo", Snomed),
        ("hiv", "hiv", Snomed),
        ("diabetes", "diabetes", Snomed),
        ("diabetes_t1", "diabetes_t1", Snomed),
        ("diabetes_t2", "diabetes_t2", Snomed),
        ("dementia", "dementia", Snomed),
        ("smoking", "clear_smoking_codes", Ctv3),
    ]
    .into_iter()
    .map(|(column, codelist, system)| ComorbidityRule::new(column, codelist, system))
    .collect()
}

/// Events must be on or before the day before the reference date.
pub fn cutoff(reference: Option<NaiveDate>) -> Option<NaiveDate> {
    reference.and_then(|date| date.pred_opt())
}

/// Whether any event has a code in `codelist` and is dated on or before `cutoff`.
pub fn has_prior_event<'a>(
    events: impl IntoIterator<Item = &'a ClinicalEvent>,
    codelist: &Codelist,
    system: CodeSystem,
    cutoff: NaiveDate,
) -> bool {
    events.into_iter().any(|event| {
        matches!(event.date, Some(date) if date <= cutoff)
            && event
                .code(system)
                .map(|code| codelist.contains(code))
                .unwrap_or(false)
    })
}

/// Whether the patient had a matching event on or before `cutoff`.
///
/// A patient with no events, or no cutoff, does not have the condition.
pub fn derive_flag(
    events: &ClinicalEvents,
    codelist: &Codelist,
    system: CodeSystem,
    patient_id: PatientId,
    cutoff: Option<NaiveDate>,
) -> bool {
    match cutoff {
        Some(cutoff) => has_prior_event(events.for_patient(patient_id), codelist, system, cutoff),
        None => false,
    }
}

/// Add a column `<rule.column><suffix>` for each rule.
///
/// `reference` names the date column the rules are relative to, unless a rule names its own.
pub fn add_comorbidities(
    dataset: &mut Dataset,
    events: &ClinicalEvents,
    codelists: &Codelists,
    rules: &[ComorbidityRule],
    reference: &str,
    suffix: &str,
) -> Result {
    // every codelist must resolve before any column is added
    let lists = rules
        .iter()
        .map(|rule| rule.codelist(codelists))
        .collect::<Result<Vec<_>, _>>()?;
    for (rule, codelist) in rules.iter().zip(lists) {
        let references = dataset.dates(rule.reference.as_deref().unwrap_or(reference))?;
        let name = format!("{}{}", rule.column, suffix);
        dataset.add(&name, |row| {
            rule.evaluate(events, codelist, row.patient_id, references[row.idx])
        })?;
    }
    event!(
        Level::INFO,
        "added {} comorbidity columns relative to {}",
        rules.len(),
        reference
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(patient_id: PatientId, date: NaiveDate, snomed: &str) -> ClinicalEvent {
        ClinicalEvent {
            patient_id,
            date: Some(date),
            snomedct_code: Some(snomed.into()),
            ctv3_code: None,
            numeric_value: None,
        }
    }

    fn codelists() -> Codelists {
        let mut lists = Codelists::new();
        lists.insert(
            "hypertension",
            Codelist::from_codes(CodeSystem::Snomed, ["38341003"]).unwrap(),
        );
        lists.insert(
            "clear_smoking_codes",
            Codelist::from_codes(CodeSystem::Ctv3, ["137R."]).unwrap(),
        );
        lists
    }

    #[test]
    fn flag_before_cutoff() {
        let lists = codelists();
        let hypertension = lists.get("hypertension").unwrap();
        let events: ClinicalEvents = vec![
            event(1, date(2020, 3, 31), "38341003"),
            event(2, date(2020, 4, 1), "38341003"),
            event(3, date(2019, 1, 1), "22298006"),
        ]
        .into_iter()
        .collect();
        let reference = Some(date(2020, 4, 1));
        let flag = |id| derive_flag(&events, hypertension, CodeSystem::Snomed, id, cutoff(reference));
        assert!(flag(1));
        // on the reference date itself doesn't count
        assert!(!flag(2));
        // wrong code
        assert!(!flag(3));
        // no events at all
        assert!(!flag(4));
        // matching against the wrong code column
        assert!(!derive_flag(&events, hypertension, CodeSystem::Ctv3, 1, cutoff(reference)));
    }

    #[test]
    fn missing_reference() {
        let lists = codelists();
        let hypertension = lists.get("hypertension").unwrap();
        let events: ClinicalEvents = vec![event(1, date(2000, 1, 1), "38341003")]
            .into_iter()
            .collect();
        let mut rule = ComorbidityRule::new("hypertension", "hypertension", CodeSystem::Snomed);
        assert_eq!(rule.evaluate(&events, hypertension, 1, None), Value::Bool(false));
        rule.missing_reference = MissingReference::Null;
        assert_eq!(rule.evaluate(&events, hypertension, 1, None), Value::Null);
        assert_eq!(
            rule.evaluate(&events, hypertension, 1, Some(date(2020, 1, 1))),
            Value::Bool(true)
        );
    }

    #[test]
    fn dataset_columns() {
        let lists = codelists();
        let events: ClinicalEvents = vec![event(1, date(2020, 1, 1), "38341003")]
            .into_iter()
            .collect();
        let rules = [
            ComorbidityRule::new("hypertension", "hypertension", CodeSystem::Snomed),
            ComorbidityRule::new("smoking", "clear_smoking_codes", CodeSystem::Ctv3),
        ];
        let mut ds = Dataset::new([1, 2]);
        ds.add("admission_date", |row| {
            (row.patient_id == 1).then(|| date(2021, 1, 1))
        })
        .unwrap();
        add_comorbidities(&mut ds, &events, &lists, &rules, "admission_date", "_sus").unwrap();
        assert_eq!(
            ds.column("hypertension_sus").unwrap(),
            [Value::Bool(true), Value::Bool(false)]
        );
        assert_eq!(
            ds.column("smoking_sus").unwrap(),
            [Value::Bool(false), Value::Bool(false)]
        );

        // the reference column must already exist
        let mut ds = Dataset::new([1]);
        let err = add_comorbidities(&mut ds, &events, &lists, &rules, "missing", "").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SetupError>(),
            Some(SetupError::UnknownColumn(_))
        ));
    }

    #[test]
    fn bad_rules() {
        let lists = codelists();
        let wrong_system = ComorbidityRule::new("smoking", "clear_smoking_codes", CodeSystem::Snomed);
        assert!(matches!(
            wrong_system.codelist(&lists),
            Err(SetupError::WrongSystem { .. })
        ));
        let icd10 = ComorbidityRule::new("covid", "covid_icd10", CodeSystem::Icd10);
        assert!(matches!(
            icd10.codelist(&lists),
            Err(SetupError::InvalidParameter { .. })
        ));
        let unknown = ComorbidityRule::new("copd", "copd", CodeSystem::Snomed);
        assert!(matches!(
            unknown.codelist(&lists),
            Err(SetupError::UnknownCodelist(_))
        ));
    }

    #[test]
    fn default_table() {
        let rules = default_rules();
        assert_eq!(rules.len(), 16);
        assert!(rules
            .iter()
            .all(|rule| rule.missing_reference == MissingReference::False));
        assert_eq!(rules.last().unwrap().system, CodeSystem::Ctv3);
    }
}
