//! Matching diagnosis fields against codelists.
//!
//! Hospital episodes store every diagnosis in a single string, so we can't look codes up in a
//! set. Instead we search the string for each code in the codelist. ICD-10 codes are a letter
//! followed by digits, so a code can only appear inside the field as itself or as the start of
//! one of its children (e.g. `U071` in `U0719`), and a substring match is also a hierarchy match.
use crate::{codelist::Codelist, codes::CodeSystem, error::SetupError, ArcStr};

use aho_corasick::AhoCorasick;

/// Searches diagnosis strings for any code of an ICD-10 codelist.
#[derive(Debug, Clone)]
pub struct DiagnosisMatcher {
    ac: AhoCorasick,
    len: usize,
}

impl DiagnosisMatcher {
    /// Build a matcher from an ICD-10 codelist.
    ///
    /// Every code is checked again here, because a malformed code would otherwise just never
    /// match anything.
    pub fn new(codelist: &Codelist) -> Result<Self, SetupError> {
        if codelist.system() != CodeSystem::Icd10 {
            return Err(SetupError::WrongSystem {
                name: "diagnosis matcher".into(),
                expected: CodeSystem::Icd10,
                found: codelist.system(),
            });
        }
        let codes = codelist.iter().collect::<Vec<_>>();
        for code in codes.iter() {
            CodeSystem::Icd10.validate(code)?;
        }
        Ok(Self {
            ac: AhoCorasick::new(codes.iter().map(|code| code.as_bytes())),
            len: codes.len(),
        })
    }

    /// Whether any code of the codelist appears in `all_diagnoses`.
    pub fn matches(&self, all_diagnoses: &str) -> bool {
        self.len > 0 && self.ac.is_match(all_diagnoses)
    }

    /// Like `matches`, treating a missing field as matching nothing.
    pub fn matches_opt(&self, all_diagnoses: Option<&str>) -> bool {
        all_diagnoses.map(|d| self.matches(d)).unwrap_or(false)
    }
}

/// Whether any code of `codelist` appears in `all_diagnoses`.
///
/// Builds a matcher each call: use `DiagnosisMatcher` when matching many fields.
pub fn matches(all_diagnoses: &str, codelist: &Codelist) -> Result<bool, SetupError> {
    Ok(DiagnosisMatcher::new(codelist)?.matches(all_diagnoses))
}

/// Whether any of the (fixed) diagnosis slots of an emergency care attendance holds a code in
/// `codelist`. Emergency care diagnoses are single SNOMED-CT codes, so this is exact membership.
pub fn emergency_care_diagnosis_matches(slots: &[Option<ArcStr>], codelist: &Codelist) -> bool {
    slots
        .iter()
        .flatten()
        .any(|code| codelist.contains(code))
}

#[cfg(test)]
mod test {
    use super::*;

    fn covid() -> Codelist {
        Codelist::from_codes(CodeSystem::Icd10, ["U071", "U072", "U109", "U099"]).unwrap()
    }

    #[test]
    fn hierarchy_match() {
        let matcher = DiagnosisMatcher::new(&covid()).unwrap();
        assert!(matcher.matches("U0719"));
        assert!(matcher.matches("J189 ,U071 ,I10X"));
        assert!(matcher.matches("||E119 ,U072||"));
        assert!(!matcher.matches("U081"));
        assert!(!matcher.matches("J189 ,U081 ,I10X"));
        assert!(!matcher.matches(""));
        assert!(!matcher.matches_opt(None));
        assert!(matcher.matches_opt(Some("U109")));
        assert_eq!(matches("U0719", &covid()), Ok(true));
        assert_eq!(matches("U081", &covid()), Ok(false));
    }

    #[test]
    fn empty_codelist_matches_nothing() {
        let empty = Codelist::from_codes(CodeSystem::Icd10, Vec::<&str>::new()).unwrap();
        let matcher = DiagnosisMatcher::new(&empty).unwrap();
        assert!(!matcher.matches("U071"));
    }

    #[test]
    fn rejects_other_systems() {
        let snomed = Codelist::from_codes(CodeSystem::Snomed, ["840539006"]).unwrap();
        assert!(matches!(
            DiagnosisMatcher::new(&snomed),
            Err(SetupError::WrongSystem { .. })
        ));
        // combined lists keep the first system, but the codes are checked anyway
        let mixed = covid().combine(&[&snomed]);
        assert!(matches!(
            DiagnosisMatcher::new(&mixed),
            Err(SetupError::InvalidCode { .. })
        ));
    }

    #[test]
    fn emergency_slots() {
        let codelist = Codelist::from_codes(CodeSystem::Snomed, ["1240751000000100"]).unwrap();
        let mut slots = vec![None; 24];
        assert!(!emergency_care_diagnosis_matches(&slots, &codelist));
        slots[23] = Some(ArcStr::from("1240751000000100"));
        assert!(emergency_care_diagnosis_matches(&slots, &codelist));
        slots[23] = Some(ArcStr::from("12407510000001"));
        assert!(!emergency_care_diagnosis_matches(&slots, &codelist));
    }
}
