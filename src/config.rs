//! Study configuration, read from a TOML file.
//!
//! Every field has a default matching the repository layout, so an empty file (or no file) is a
//! valid configuration.
use crate::{
    admissions::AdmissionMethod,
    comorbidity::{default_rules, ComorbidityRule},
    error::SetupError,
};

use chrono::NaiveDate;
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Where the study reads and writes, and what it derives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StudyConfig {
    /// Directory holding the table extracts (`<table>.csv`) and their `.bin` caches.
    pub input_dir: PathBuf,
    /// Directory holding the codelist CSVs.
    pub codelist_dir: PathBuf,
    /// Directory the datasets are written to.
    pub output_dir: PathBuf,
    /// Replaces the built-in comorbidity table when present.
    pub comorbidities: Option<Vec<ComorbidityRule>>,
    /// The window searched for admissions by the chained (legacy) study.
    pub window: StudyWindow,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            input_dir: "data/input".into(),
            codelist_dir: "codelists".into(),
            output_dir: "output/admissions".into(),
            comorbidities: None,
            window: StudyWindow::default(),
        }
    }
}

impl StudyConfig {
    /// Load the configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        fn inner(path: &Path) -> Result<StudyConfig> {
            let text = fs::read_to_string(path)?;
            let config: StudyConfig = toml::from_str(&text)?;
            config.window.check()?;
            Ok(config)
        }
        let path = path.as_ref();
        inner(path).with_context(|| format!("loading study config \"{}\"", path.display()))
    }

    /// Load the configuration if a path was given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// The comorbidity table to use.
    pub fn rules(&self) -> Vec<ComorbidityRule> {
        match &self.comorbidities {
            Some(rules) => rules.clone(),
            None => default_rules(),
        }
    }

    pub fn sus_output(&self, method: AdmissionMethod) -> PathBuf {
        self.output_dir
            .join(format!("dataset_sus_method{}.csv.gz", method))
    }

    pub fn isaric_output(&self) -> PathBuf {
        self.output_dir.join("dataset_isaric.csv.gz")
    }

    pub fn isaric_raw_output(&self) -> PathBuf {
        self.output_dir.join("dataset_isaric_raw.csv.gz")
    }

    /// The output of the chained study for the `n`th admission.
    pub fn legacy_output(&self, method: AdmissionMethod, n: u32) -> PathBuf {
        self.output_dir
            .join(format!("sus_method{}_admission{}.csv.gz", method, n))
    }
}

/// A closed range of dates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for StudyWindow {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2022, 11, 30).unwrap(),
        }
    }
}

impl StudyWindow {
    pub fn check(&self) -> Result<(), SetupError> {
        if self.start > self.end {
            return Err(SetupError::InvalidParameter {
                name: "window",
                reason: format!("starts ({}) after it ends ({})", self.start, self.end),
            });
        }
        Ok(())
    }
}
