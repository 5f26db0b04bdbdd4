pub mod admissions;
pub mod codelist;
pub mod codelists;
pub mod codes;
pub mod comorbidity;
pub mod config;
pub mod dataset;
pub mod demographics;
pub mod diagnosis;
pub mod error;
mod range;
pub mod study;
pub mod tables;
mod util;

pub use anyhow::{Context, Error};
use chrono::{Datelike, NaiveDate};
use qu::ick_use::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

pub use crate::{
    admissions::{AdmissionMethod, Episode, Episodes},
    codelist::Codelist,
    codelists::Codelists,
    codes::CodeSystem,
    config::StudyConfig,
    dataset::{Dataset, Value},
    error::SetupError,
    range::{Bands, Buckets, Range, RangeSet},
    tables::{PatientTable, Record, Tables},
    util::header,
};

pub type ArcStr = Arc<str>;
pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
pub type PatientId = u64;

/// A row in the patients table.
///
/// In this and every other table, `patient_id` always identifies the same patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: PatientId,
    #[serde(deserialize_with = "util::opt_date")]
    pub date_of_birth: Option<NaiveDate>,
    pub sex: Sex,
    #[serde(default, deserialize_with = "util::opt_date")]
    pub date_of_death: Option<NaiveDate>,
}

impl Patient {
    /// Age in whole years on `date`, or `None` if we don't know when the patient was born.
    pub fn age_on(&self, date: NaiveDate) -> Option<i64> {
        self.date_of_birth.map(|dob| age_on(dob, date))
    }
}

/// Whole years between `date_of_birth` and `date`.
///
/// Negative if `date` is before the birth date.
pub fn age_on(date_of_birth: NaiveDate, date: NaiveDate) -> i64 {
    let mut years = i64::from(date.year()) - i64::from(date_of_birth.year());
    if (date.month(), date.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    years
}

/// Sex as recorded in the primary care record.
///
/// Ordering is arbitrary.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize, Hash, Ord, PartialOrd)]
pub enum Sex {
    #[serde(rename = "male", alias = "M", alias = "m", alias = "Male")]
    Male,
    #[serde(rename = "female", alias = "F", alias = "f", alias = "Female")]
    Female,
    #[serde(rename = "intersex", alias = "I")]
    Intersex,
    #[serde(rename = "unknown", alias = "U", alias = "")]
    Unknown,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::Intersex => "intersex",
            Sex::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load a cached table into memory.
fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    fn inner<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let reader = io::BufReader::new(fs::File::open(path)?);
        bincode::deserialize_from(reader).map_err(Into::into)
    }
    let path = path.as_ref();
    check_extension(path, "bin")?;

    inner(path).with_context(|| format!("unable to load data from \"{}\"", path.display()))
}

/// Save a table to disk, for quick reloading with `load`.
fn save<T: Serialize + ?Sized>(contents: &T, path: impl AsRef<Path>) -> Result {
    fn inner<T: Serialize + ?Sized>(contents: &T, path: &Path) -> Result {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("could not create parent")?;
        }
        // it seems File::options().create_new(true) doesn't work on the server, so fall back to
        // checking for existence.
        if util::path_exists(path)? {
            event!(
                Level::WARN,
                "overwriting existing file at \"{}\"",
                path.display()
            );
        }
        let mut out = io::BufWriter::new(fs::File::create(path)?);
        bincode::serialize_into(&mut out, contents)?;
        Ok(())
    }
    let path = path.as_ref();
    check_extension(path, "bin")?;

    inner(contents, path).with_context(|| format!("unable to save data to \"{}\"", path.display()))
}

/// Load rows from a CSV extract.
fn load_csv<T: DeserializeOwned>(reader: impl io::Read) -> Result<Vec<T>> {
    csv_reader(reader)
        .into_deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(Into::into)
}

/// The CSV reader settings used for every extract.
fn csv_reader<R: io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Open a file for reading, transparently decompressing it if its name ends with `.gz`.
pub fn open_input(path: &Path) -> Result<Box<dyn io::Read>> {
    let file = io::BufReader::new(
        fs::File::open(path).with_context(|| format!("opening \"{}\"", path.display()))?,
    );
    Ok(if is_gzip(path) {
        Box::new(flate2::read::GzDecoder::new(file))
    } else {
        Box::new(file)
    })
}

pub fn is_gzip(path: &Path) -> bool {
    matches!(path.extension(), Some(ext) if ext == "gz")
}

/// Note: No protection from escaping the root directory.
pub fn table_path(dir: &Path, table: &str, ext: &str) -> PathBuf {
    dir.join(format!("{}.{}", table, ext))
}

pub fn check_extension(path: &Path, ext: &str) -> Result<()> {
    ensure!(
        matches!(path.extension(), Some(p) if p == ext),
        "filename should end with `.{}`",
        ext
    );
    Ok(())
}
