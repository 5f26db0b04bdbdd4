//! Clinical coding systems, and the lexical rules codes in each system must follow.
use crate::error::SetupError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// ICD-10 codes as they appear in the hospital extracts: a letter followed by two or more
/// digits, without the dot (e.g. `U071`).
static ICD10: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][0-9]{2,}$").unwrap());

/// The coding system a codelist (or a column of a table) is written in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeSystem {
    #[serde(alias = "snomedct")]
    Snomed,
    Ctv3,
    Icd10,
}

impl CodeSystem {
    /// Check that `code` is lexically valid in this system.
    pub fn validate(self, code: &str) -> Result<(), SetupError> {
        let invalid = |reason| SetupError::InvalidCode {
            system: self,
            code: code.into(),
            reason,
        };
        match self {
            CodeSystem::Snomed => {
                if !(6..=18).contains(&code.len()) {
                    return Err(invalid("SNOMED-CT identifiers are 6 to 18 digits long"));
                }
                if !code.bytes().all(|ch| ch.is_ascii_digit()) {
                    return Err(invalid("SNOMED-CT identifiers contain only digits"));
                }
            }
            CodeSystem::Ctv3 => {
                if code.len() != 5 {
                    return Err(invalid("CTV3 codes are exactly 5 characters long"));
                }
                if !code.bytes().all(is_ctv3_ch) {
                    return Err(invalid("CTV3 codes contain characters [a-zA-Z0-9.]"));
                }
            }
            CodeSystem::Icd10 => {
                if !ICD10.is_match(code) {
                    return Err(invalid("expected a letter followed by at least two digits"));
                }
            }
        }
        Ok(())
    }

    pub fn name(self) -> &'static str {
        match self {
            CodeSystem::Snomed => "snomed",
            CodeSystem::Ctv3 => "ctv3",
            CodeSystem::Icd10 => "icd10",
        }
    }
}

impl fmt::Display for CodeSystem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CodeSystem {
    type Err = anyhow::Error;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "snomed" | "snomedct" => Ok(CodeSystem::Snomed),
            "ctv3" => Ok(CodeSystem::Ctv3),
            "icd10" => Ok(CodeSystem::Icd10),
            _ => Err(anyhow::format_err!(
                "didn't recognise coding system \"{}\"",
                input
            )),
        }
    }
}

fn is_ctv3_ch(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.'
}
