//! Finding COVID-19 admission episodes.
//!
//! There are several ways of defining a COVID-19 admission, from different source tables. Each
//! gives a per-patient list of episodes, in date order.
use crate::{
    codelists::Codelists,
    codes::CodeSystem,
    diagnosis::{emergency_care_diagnosis_matches, DiagnosisMatcher},
    error::SetupError,
    tables::{EmergencyCareAttendances, HospitalAdmission, HospitalAdmissions},
    PatientId,
};

use chrono::{Duration, NaiveDate};
use qu::ick_use::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Admission method codes for unplanned (non-elective) hospital admissions.
pub const NON_ELECTIVE_METHODS: &[&str] =
    &["21", "22", "23", "24", "25", "2A", "2B", "2C", "2D", "28"];

/// How a COVID-19 admission is identified.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AdmissionMethod {
    /// Unplanned hospital admissions with a COVID-19 diagnosis.
    A,
    /// Any hospital admission with a COVID-19 diagnosis.
    B,
    /// Emergency care attendances with a COVID-19 diagnosis, discharged to hospital.
    C,
    /// Emergency care attendances with a respiratory diagnosis near a positive test.
    ///
    /// Needs a join between attendances and test results, which we don't support.
    D,
    /// Unplanned hospital admissions with a respiratory diagnosis near a positive test.
    ///
    /// Needs a join between admissions and test results, which we don't support.
    E,
}

impl AdmissionMethod {
    pub fn letter(self) -> char {
        match self {
            AdmissionMethod::A => 'A',
            AdmissionMethod::B => 'B',
            AdmissionMethod::C => 'C',
            AdmissionMethod::D => 'D',
            AdmissionMethod::E => 'E',
        }
    }

    /// Errors for methods we can't compute, so they can be rejected before any work is done.
    pub fn check_supported(self) -> Result<Self, SetupError> {
        match self {
            AdmissionMethod::A | AdmissionMethod::B | AdmissionMethod::C => Ok(self),
            AdmissionMethod::D | AdmissionMethod::E => {
                Err(SetupError::UnsupportedMethod(self.letter()))
            }
        }
    }

    /// Whether episodes come from the hospital admissions table (rather than emergency care).
    pub fn is_hospital(self) -> bool {
        matches!(
            self,
            AdmissionMethod::A | AdmissionMethod::B | AdmissionMethod::E
        )
    }
}

impl fmt::Display for AdmissionMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for AdmissionMethod {
    type Err = SetupError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim() {
            "A" | "a" => Ok(AdmissionMethod::A),
            "B" | "b" => Ok(AdmissionMethod::B),
            "C" | "c" => Ok(AdmissionMethod::C),
            "D" | "d" => Ok(AdmissionMethod::D),
            "E" | "e" => Ok(AdmissionMethod::E),
            other => Err(SetupError::UnknownMethod(other.to_string())),
        }
    }
}

/// A qualifying admission (or emergency attendance).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub patient_id: PatientId,
    /// Admission date, or arrival date for emergency care.
    pub date: NaiveDate,
    pub discharge_date: Option<NaiveDate>,
    pub days_in_critical_care: Option<i64>,
}

/// Qualifying episodes grouped by patient, each patient's in date order.
#[derive(Debug, Clone, Default)]
pub struct Episodes {
    by_patient: BTreeMap<PatientId, Vec<Episode>>,
}

impl Episodes {
    /// Group episodes by patient. Episodes on the same date keep their order.
    pub fn new(episodes: impl IntoIterator<Item = Episode>) -> Self {
        let mut by_patient: BTreeMap<PatientId, Vec<Episode>> = BTreeMap::new();
        for episode in episodes {
            by_patient
                .entry(episode.patient_id)
                .or_insert_with(Vec::new)
                .push(episode);
        }
        for list in by_patient.values_mut() {
            list.sort_by_key(|episode| episode.date);
        }
        Self { by_patient }
    }

    /// Every patient with at least one episode.
    pub fn patient_ids(&self) -> impl Iterator<Item = PatientId> + '_ {
        self.by_patient.keys().copied()
    }

    pub fn for_patient(&self, patient_id: PatientId) -> &[Episode] {
        self.by_patient
            .get(&patient_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn first(&self, patient_id: PatientId) -> Option<&Episode> {
        self.for_patient(patient_id).first()
    }

    pub fn count(&self, patient_id: PatientId) -> usize {
        self.for_patient(patient_id).len()
    }

    /// The first episode on or after `date`.
    pub fn first_on_or_after(&self, patient_id: PatientId, date: NaiveDate) -> Option<&Episode> {
        self.for_patient(patient_id)
            .iter()
            .find(|episode| episode.date >= date)
    }

    /// Only the episodes on or after `date`.
    pub fn since(&self, date: NaiveDate) -> Self {
        Self::new(
            self.by_patient
                .values()
                .flatten()
                .filter(|episode| episode.date >= date)
                .cloned(),
        )
    }

    /// The number of patients with an episode.
    pub fn patient_count(&self) -> usize {
        self.by_patient.len()
    }

    /// The total number of episodes.
    pub fn len(&self) -> usize {
        self.by_patient.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_patient.is_empty()
    }
}

/// Find every qualifying episode for the given method.
///
/// Episodes without a date are dropped, as they can never be ordered.
pub fn select_episodes(
    method: AdmissionMethod,
    hospital: &HospitalAdmissions,
    emergency: &EmergencyCareAttendances,
    codelists: &Codelists,
) -> Result<Episodes, SetupError> {
    let episodes = match method {
        AdmissionMethod::A | AdmissionMethod::B => {
            let matcher =
                DiagnosisMatcher::new(codelists.get_in("covid_icd10", CodeSystem::Icd10)?)?;
            let non_elective_only = method == AdmissionMethod::A;
            let episodes = hospital
                .par_iter()
                .filter(|row| !non_elective_only || is_non_elective(row))
                .filter(|row| matcher.matches_opt(row.all_diagnoses.as_deref()))
                .filter_map(|row| {
                    Some(Episode {
                        patient_id: row.patient_id,
                        date: row.admission_date?,
                        discharge_date: row.discharge_date,
                        days_in_critical_care: row.days_in_critical_care,
                    })
                })
                .collect::<Vec<_>>();
            Episodes::new(episodes)
        }
        AdmissionMethod::C => {
            let diagnoses = codelists.get_in("covid_emergency", CodeSystem::Snomed)?;
            let destinations = codelists.get_in("discharged_to_hospital", CodeSystem::Snomed)?;
            let episodes = emergency
                .par_iter()
                .filter(|row| emergency_care_diagnosis_matches(&row.diagnoses, diagnoses))
                .filter(|row| {
                    row.discharge_destination
                        .as_deref()
                        .map(|dest| destinations.contains(dest))
                        .unwrap_or(false)
                })
                .filter_map(|row| {
                    Some(Episode {
                        patient_id: row.patient_id,
                        date: row.arrival_date?,
                        discharge_date: None,
                        days_in_critical_care: None,
                    })
                })
                .collect::<Vec<_>>();
            Episodes::new(episodes)
        }
        AdmissionMethod::D | AdmissionMethod::E => {
            return Err(SetupError::UnsupportedMethod(method.letter()))
        }
    };
    event!(
        Level::INFO,
        "method {}: {} episodes for {} patients",
        method,
        episodes.len(),
        episodes.patient_count()
    );
    Ok(episodes)
}

fn is_non_elective(row: &HospitalAdmission) -> bool {
    row.admission_method
        .as_deref()
        .map(|method| NON_ELECTIVE_METHODS.contains(&method))
        .unwrap_or(false)
}

/// The dates of the first `n` distinct admissions.
///
/// Each time we take the earliest remaining episode, then drop every episode that isn't more than
/// `gap` after it, so one hospital stay recorded as several rows counts once. Missing admissions
/// are `None`.
pub fn nth_episode_dates(episodes: &[Episode], n: usize, gap: Duration) -> Vec<Option<NaiveDate>> {
    let mut remaining = episodes.iter().map(|ep| ep.date).collect::<Vec<_>>();
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let next = remaining.iter().copied().min();
        if let Some(taken) = next {
            match taken.checked_add_signed(gap) {
                Some(after) => remaining.retain(|date| *date > after),
                // nothing can be later than a date past the end of the calendar
                None => remaining.clear(),
            }
        }
        out.push(next);
    }
    out
}
