//! The input tables of the study, each indexed by patient.
use crate::{
    codes::CodeSystem, csv_reader, load, load_csv, open_input, save, table_path, util, ArcStr,
    Patient, PatientId,
};

use chrono::NaiveDate;
use itertools::Either;
use qu::ick_use::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, io, iter, ops::Deref, path::Path, sync::Arc};

/// The number of diagnosis columns in the emergency care table.
pub const DIAGNOSIS_SLOTS: usize = 24;

/// A row in one of the patient-level tables.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned {
    /// The name of the table, also used for the file name of the extract.
    const TABLE: &'static str;

    fn patient_id(&self) -> PatientId;

    /// Parse rows from a CSV extract with a header row.
    fn read_csv<R: io::Read>(reader: R) -> Result<Vec<Self>> {
        load_csv(reader)
    }
}

/// A row that is valid over a period, like a practice registration or an address.
pub trait Period {
    fn start_date(&self) -> Option<NaiveDate>;
    fn end_date(&self) -> Option<NaiveDate>;

    /// Whether the period covers `date`: it started on or before, and hasn't ended.
    fn is_active_on(&self, date: NaiveDate) -> bool {
        matches!(self.start_date(), Some(start) if start <= date)
            && self.end_date().map(|end| end > date).unwrap_or(true)
    }
}

/// A parsed table, with a pre-built index for the `patient_id` field.
#[derive(Debug, Clone)]
pub struct PatientTable<T> {
    els: Arc<Vec<T>>,
    id_idx: BTreeMap<PatientId, Vec<usize>>,
}

impl<T: Record> PatientTable<T> {
    /// Load a table from a CSV extract (optionally gzipped).
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let this = open_input(path)
            .and_then(Self::from_reader)
            .with_context(|| format!("while loading \"{}\"", path.display()))?;
        event!(
            Level::INFO,
            "loaded {} rows for {} patients from table {}",
            this.len(),
            this.patient_count(),
            T::TABLE
        );
        Ok(this)
    }

    pub fn from_reader(reader: impl io::Read) -> Result<Self> {
        Ok(Self::new(T::read_csv(reader)?))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(load(path)?))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result {
        save(&self.els[..], path)
    }

    pub fn new(els: Vec<T>) -> Self {
        let mut this = PatientTable {
            els: Arc::new(els),
            id_idx: BTreeMap::new(),
        };
        this.rebuild_id_map();
        this
    }

    /// The rows for one patient, in table order.
    pub fn for_patient(&self, patient_id: PatientId) -> impl Iterator<Item = &T> + Clone + '_ {
        let idxs = match self.id_idx.get(&patient_id) {
            Some(idxs) => idxs,
            None => return Either::Left(iter::empty()),
        };
        Either::Right(idxs.iter().map(|idx| &self.els[*idx]))
    }

    /// Every patient with at least one row, in ascending order.
    pub fn patient_ids(&self) -> impl Iterator<Item = PatientId> + '_ {
        self.id_idx.keys().copied()
    }

    pub fn patient_count(&self) -> usize {
        self.id_idx.len()
    }

    /// Iterate over the rows of this table.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.els.iter().cloned()
    }

    fn rebuild_id_map(&mut self) {
        self.id_idx.clear();
        for (idx, el) in self.els.iter().enumerate() {
            self.id_idx
                .entry(el.patient_id())
                .or_insert_with(Vec::new)
                .push(idx);
        }
    }
}

impl<T> Deref for PatientTable<T> {
    type Target = [T];
    fn deref(&self) -> &Self::Target {
        &self.els
    }
}

impl<'a, T> IntoIterator for &'a PatientTable<T> {
    type IntoIter = <&'a [T] as IntoIterator>::IntoIter;
    type Item = &'a T;
    fn into_iter(self) -> Self::IntoIter {
        self.els.iter()
    }
}

impl<T: Record> FromIterator<T> for PatientTable<T> {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::new(iter.into_iter().collect())
    }
}

pub type Patients = PatientTable<Patient>;

impl Record for Patient {
    const TABLE: &'static str = "patients";
    fn patient_id(&self) -> PatientId {
        self.patient_id
    }
}

impl Patients {
    pub fn find(&self, patient_id: PatientId) -> Option<&Patient> {
        self.for_patient(patient_id).next()
    }
}

/// A coded event in the primary care record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalEvent {
    pub patient_id: PatientId,
    #[serde(deserialize_with = "util::opt_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "util::optional_string")]
    pub snomedct_code: Option<ArcStr>,
    #[serde(default, deserialize_with = "util::optional_string")]
    pub ctv3_code: Option<ArcStr>,
    #[serde(default, deserialize_with = "util::opt_f64")]
    pub numeric_value: Option<f64>,
}

impl ClinicalEvent {
    /// The code of this event in the given system.
    ///
    /// Primary care events are never coded in ICD-10.
    pub fn code(&self, system: CodeSystem) -> Option<&str> {
        match system {
            CodeSystem::Snomed => self.snomedct_code.as_deref(),
            CodeSystem::Ctv3 => self.ctv3_code.as_deref(),
            CodeSystem::Icd10 => None,
        }
    }
}

impl Record for ClinicalEvent {
    const TABLE: &'static str = "clinical_events";
    fn patient_id(&self) -> PatientId {
        self.patient_id
    }
}

pub type ClinicalEvents = PatientTable<ClinicalEvent>;

/// A hospital admission episode from SUS (secondary uses service).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalAdmission {
    pub patient_id: PatientId,
    #[serde(deserialize_with = "util::opt_date")]
    pub admission_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "util::opt_date")]
    pub discharge_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "util::optional_string")]
    pub admission_method: Option<ArcStr>,
    /// Every diagnosis of the episode, concatenated into one string.
    #[serde(default, deserialize_with = "util::optional_string")]
    pub all_diagnoses: Option<ArcStr>,
    #[serde(default, deserialize_with = "util::opt_i64")]
    pub days_in_critical_care: Option<i64>,
}

impl Record for HospitalAdmission {
    const TABLE: &'static str = "hospital_admissions";
    fn patient_id(&self) -> PatientId {
        self.patient_id
    }
}

pub type HospitalAdmissions = PatientTable<HospitalAdmission>;

/// An attendance at an emergency department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyCareAttendance {
    pub patient_id: PatientId,
    pub arrival_date: Option<NaiveDate>,
    pub discharge_destination: Option<ArcStr>,
    /// Always `DIAGNOSIS_SLOTS` long.
    pub diagnoses: Vec<Option<ArcStr>>,
}

impl Record for EmergencyCareAttendance {
    const TABLE: &'static str = "emergency_care_attendances";
    fn patient_id(&self) -> PatientId {
        self.patient_id
    }

    // The diagnoses are spread over columns `diagnosis_01` to `diagnosis_24`, so we gather them
    // by hand.
    fn read_csv<R: io::Read>(reader: R) -> Result<Vec<Self>> {
        let mut reader = csv_reader(reader);
        let headers = reader.headers()?.clone();
        let find = |name: &str| headers.iter().position(|h| h == name);
        let id_idx = find("patient_id").context("no column named \"patient_id\"")?;
        let arrival_idx = find("arrival_date");
        let destination_idx = find("discharge_destination");
        let diagnosis_idxs = (1..=DIAGNOSIS_SLOTS)
            .map(|slot| find(&format!("diagnosis_{:02}", slot)))
            .collect::<Vec<_>>();

        let mut out = vec![];
        for (row, record) in reader.into_records().enumerate() {
            let record = record?;
            let field = |idx: Option<usize>| idx.and_then(|idx| record.get(idx)).unwrap_or("");
            let patient_id = field(Some(id_idx))
                .parse()
                .with_context(|| format!("row {}: invalid patient_id", row + 1))?;
            let arrival_date = util::parse_opt_date(field(arrival_idx))
                .map_err(|e| format_err!("row {}: {}", row + 1, e))?;
            out.push(EmergencyCareAttendance {
                patient_id,
                arrival_date,
                discharge_destination: util::opt_str(field(destination_idx)),
                diagnoses: diagnosis_idxs
                    .iter()
                    .map(|idx| util::opt_str(field(*idx)))
                    .collect(),
            });
        }
        Ok(out)
    }
}

pub type EmergencyCareAttendances = PatientTable<EmergencyCareAttendance>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeRegistration {
    pub patient_id: PatientId,
    #[serde(deserialize_with = "util::opt_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "util::opt_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "util::opt_i64")]
    pub practice_pseudo_id: Option<i64>,
    #[serde(default, deserialize_with = "util::optional_string")]
    pub practice_stp: Option<ArcStr>,
    #[serde(default, deserialize_with = "util::optional_string")]
    pub practice_nuts1_region_name: Option<ArcStr>,
}

impl Record for PracticeRegistration {
    const TABLE: &'static str = "practice_registrations";
    fn patient_id(&self) -> PatientId {
        self.patient_id
    }
}

impl Period for PracticeRegistration {
    fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }
    fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }
}

pub type PracticeRegistrations = PatientTable<PracticeRegistration>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub patient_id: PatientId,
    #[serde(deserialize_with = "util::opt_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "util::opt_date")]
    pub end_date: Option<NaiveDate>,
    /// Index of multiple deprivation rank, rounded to the nearest 100.
    #[serde(default, deserialize_with = "util::opt_i64")]
    pub imd_rounded: Option<i64>,
}

impl Record for Address {
    const TABLE: &'static str = "addresses";
    fn patient_id(&self) -> PatientId {
        self.patient_id
    }
}

impl Period for Address {
    fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }
    fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }
}

pub type Addresses = PatientTable<Address>;

/// A SARS-CoV-2 test result from SGSS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovidTest {
    pub patient_id: PatientId,
    #[serde(deserialize_with = "util::opt_date")]
    pub specimen_taken_date: Option<NaiveDate>,
    #[serde(deserialize_with = "util::flag")]
    pub is_positive: bool,
}

impl Record for CovidTest {
    const TABLE: &'static str = "sgss_covid_all_tests";
    fn patient_id(&self) -> PatientId {
        self.patient_id
    }
}

pub type CovidTests = PatientTable<CovidTest>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vaccination {
    pub patient_id: PatientId,
    #[serde(deserialize_with = "util::opt_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "util::optional_string")]
    pub target_disease: Option<ArcStr>,
    #[serde(default, deserialize_with = "util::optional_string")]
    pub product_name: Option<ArcStr>,
}

impl Record for Vaccination {
    const TABLE: &'static str = "vaccinations";
    fn patient_id(&self) -> PatientId {
        self.patient_id
    }
}

pub type Vaccinations = PatientTable<Vaccination>;

/// A death registered with the Office for National Statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnsDeath {
    pub patient_id: PatientId,
    #[serde(deserialize_with = "util::opt_date")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "util::optional_string")]
    pub place: Option<ArcStr>,
}

impl Record for OnsDeath {
    const TABLE: &'static str = "ons_deaths";
    fn patient_id(&self) -> PatientId {
        self.patient_id
    }
}

pub type OnsDeaths = PatientTable<OnsDeath>;

/// A row of the ISARIC case report form table. Values are kept as text in column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsaricRow {
    pub patient_id: PatientId,
    pub values: Vec<Option<ArcStr>>,
}

impl Record for IsaricRow {
    const TABLE: &'static str = "isaric";
    fn patient_id(&self) -> PatientId {
        self.patient_id
    }

    fn read_csv<R: io::Read>(reader: R) -> Result<Vec<Self>> {
        Ok(Isaric::read(reader)?.1)
    }
}

/// The ISARIC table: an open set of text columns.
///
/// The columns are whatever the extract contains, apart from `patient_id`.
#[derive(Debug, Clone)]
pub struct Isaric {
    columns: Arc<Vec<ArcStr>>,
    rows: PatientTable<IsaricRow>,
}

impl Isaric {
    pub fn new(columns: Vec<ArcStr>, rows: Vec<IsaricRow>) -> Result<Self> {
        for row in &rows {
            ensure!(
                row.values.len() == columns.len(),
                "ISARIC row for patient {} has {} values, expected {}",
                row.patient_id,
                row.values.len(),
                columns.len()
            );
        }
        Ok(Self {
            columns: Arc::new(columns),
            rows: PatientTable::new(rows),
        })
    }

    pub fn empty() -> Self {
        Self {
            columns: Arc::new(vec![]),
            rows: PatientTable::new(vec![]),
        }
    }

    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let this = open_input(path)
            .and_then(Self::from_reader)
            .with_context(|| format!("while loading \"{}\"", path.display()))?;
        event!(
            Level::INFO,
            "loaded {} ISARIC rows with {} columns for {} patients",
            this.rows.len(),
            this.columns.len(),
            this.rows.patient_count()
        );
        Ok(this)
    }

    pub fn from_reader(reader: impl io::Read) -> Result<Self> {
        let (columns, rows) = Self::read(reader)?;
        Self::new(columns, rows)
    }

    fn read(reader: impl io::Read) -> Result<(Vec<ArcStr>, Vec<IsaricRow>)> {
        let mut reader = csv_reader(reader);
        let headers = reader.headers()?.clone();
        let id_idx = headers
            .iter()
            .position(|h| h == "patient_id")
            .context("no column named \"patient_id\"")?;
        let columns = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != id_idx)
            .map(|(_, name)| ArcStr::from(name))
            .collect();

        let mut rows = vec![];
        for (row, record) in reader.into_records().enumerate() {
            let record = record?;
            let patient_id = record
                .get(id_idx)
                .unwrap_or("")
                .parse()
                .with_context(|| format!("row {}: invalid patient_id", row + 1))?;
            let values = record
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != id_idx)
                .map(|(_, value)| util::opt_str(value))
                .collect();
            rows.push(IsaricRow { patient_id, values });
        }
        Ok((columns, rows))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let (columns, rows): (Vec<ArcStr>, Vec<IsaricRow>) = load(path)?;
        Self::new(columns, rows)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result {
        save(&(&*self.columns, &self.rows[..]), path)
    }

    /// Load `<dir>/isaric.bin` if there is one, otherwise parse `<dir>/isaric.csv`.
    pub fn load_or_import(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let cached = table_path(dir, IsaricRow::TABLE, "bin");
        if util::path_exists(&cached)? {
            Self::load(cached)
        } else {
            Self::from_csv(table_path(dir, IsaricRow::TABLE, "csv"))
        }
    }

    pub fn columns(&self) -> &[ArcStr] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| &**col == name)
    }

    pub fn rows(&self) -> &PatientTable<IsaricRow> {
        &self.rows
    }

    /// The first row for a patient when their rows are sorted by column `idx`.
    ///
    /// Missing values sort first, numbers compare numerically, and ties keep table order.
    pub fn first_sorted_by(&self, patient_id: PatientId, idx: usize) -> Option<&IsaricRow> {
        self.rows
            .for_patient(patient_id)
            .min_by(|a, b| compare_values(a.values[idx].as_deref(), b.values[idx].as_deref()))
    }
}

/// Compare two ISARIC values for sorting.
pub fn compare_values(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.parse::<f64>(), b.parse::<f64>()) {
            (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => a.cmp(b),
        },
    }
}

/// Every table the study reads.
#[derive(Debug, Clone)]
pub struct Tables {
    pub patients: Patients,
    pub clinical_events: ClinicalEvents,
    pub hospital_admissions: HospitalAdmissions,
    pub emergency_care_attendances: EmergencyCareAttendances,
    pub practice_registrations: PracticeRegistrations,
    pub addresses: Addresses,
    pub sgss_covid_all_tests: CovidTests,
    pub vaccinations: Vaccinations,
    pub ons_deaths: OnsDeaths,
    pub isaric: Isaric,
}

impl Tables {
    /// Load every table from `<dir>/<table>.csv`.
    ///
    /// The ISARIC table is only needed by some studies, so it is left empty if its file is
    /// missing.
    pub fn from_csv_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let csv = |table| table_path(dir, table, "csv");
        let isaric_path = csv(IsaricRow::TABLE);
        let isaric = if util::path_exists(&isaric_path)? {
            Isaric::from_csv(isaric_path)?
        } else {
            event!(
                Level::WARN,
                "no ISARIC extract at \"{}\", using an empty table",
                isaric_path.display()
            );
            Isaric::empty()
        };
        Ok(Self {
            patients: PatientTable::from_csv(csv(Patient::TABLE))?,
            clinical_events: PatientTable::from_csv(csv(ClinicalEvent::TABLE))?,
            hospital_admissions: PatientTable::from_csv(csv(HospitalAdmission::TABLE))?,
            emergency_care_attendances: PatientTable::from_csv(csv(
                EmergencyCareAttendance::TABLE,
            ))?,
            practice_registrations: PatientTable::from_csv(csv(PracticeRegistration::TABLE))?,
            addresses: PatientTable::from_csv(csv(Address::TABLE))?,
            sgss_covid_all_tests: PatientTable::from_csv(csv(CovidTest::TABLE))?,
            vaccinations: PatientTable::from_csv(csv(Vaccination::TABLE))?,
            ons_deaths: PatientTable::from_csv(csv(OnsDeath::TABLE))?,
            isaric,
        })
    }

    /// Load every table from the bincode cache written by `save`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let bin = |table| table_path(dir, table, "bin");
        Ok(Self {
            patients: PatientTable::load(bin(Patient::TABLE))?,
            clinical_events: PatientTable::load(bin(ClinicalEvent::TABLE))?,
            hospital_admissions: PatientTable::load(bin(HospitalAdmission::TABLE))?,
            emergency_care_attendances: PatientTable::load(bin(EmergencyCareAttendance::TABLE))?,
            practice_registrations: PatientTable::load(bin(PracticeRegistration::TABLE))?,
            addresses: PatientTable::load(bin(Address::TABLE))?,
            sgss_covid_all_tests: PatientTable::load(bin(CovidTest::TABLE))?,
            vaccinations: PatientTable::load(bin(Vaccination::TABLE))?,
            ons_deaths: PatientTable::load(bin(OnsDeath::TABLE))?,
            isaric: Isaric::load(bin(IsaricRow::TABLE))?,
        })
    }

    /// Load from the cache if there is one, otherwise from the CSV extracts.
    pub fn load_or_import(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if util::path_exists(&table_path(dir, Patient::TABLE, "bin"))? {
            Self::load(dir)
        } else {
            Self::from_csv_dir(dir)
        }
    }

    pub fn save(&self, dir: impl AsRef<Path>) -> Result {
        let dir = dir.as_ref();
        let bin = |table| table_path(dir, table, "bin");
        self.patients.save(bin(Patient::TABLE))?;
        self.clinical_events.save(bin(ClinicalEvent::TABLE))?;
        self.hospital_admissions.save(bin(HospitalAdmission::TABLE))?;
        self.emergency_care_attendances
            .save(bin(EmergencyCareAttendance::TABLE))?;
        self.practice_registrations
            .save(bin(PracticeRegistration::TABLE))?;
        self.addresses.save(bin(Address::TABLE))?;
        self.sgss_covid_all_tests.save(bin(CovidTest::TABLE))?;
        self.vaccinations.save(bin(Vaccination::TABLE))?;
        self.ons_deaths.save(bin(OnsDeath::TABLE))?;
        self.isaric.save(bin(IsaricRow::TABLE))?;
        Ok(())
    }

    /// A set of empty tables, to fill in piece by piece.
    pub fn empty() -> Self {
        Self {
            patients: PatientTable::new(vec![]),
            clinical_events: PatientTable::new(vec![]),
            hospital_admissions: PatientTable::new(vec![]),
            emergency_care_attendances: PatientTable::new(vec![]),
            practice_registrations: PatientTable::new(vec![]),
            addresses: PatientTable::new(vec![]),
            sgss_covid_all_tests: PatientTable::new(vec![]),
            vaccinations: PatientTable::new(vec![]),
            ons_deaths: PatientTable::new(vec![]),
            isaric: Isaric::empty(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn index_by_patient() {
        let input = "patient_id,date,snomedct_code,ctv3_code,numeric_value\n\
                     2,2020-01-01,22298006,,\n\
                     1,2019-05-01,,Y20d1,\n\
                     2,NULL,60621009,,31.5\n";
        let events = ClinicalEvents::from_reader(input.as_bytes()).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events.patient_ids().collect::<Vec<_>>(), [1, 2]);
        let for_2 = events.for_patient(2).collect::<Vec<_>>();
        assert_eq!(for_2.len(), 2);
        assert_eq!(for_2[0].date, Some(date(2020, 1, 1)));
        assert_eq!(for_2[1].date, None);
        assert_eq!(for_2[1].numeric_value, Some(31.5));
        assert_eq!(for_2[1].code(CodeSystem::Snomed), Some("60621009"));
        assert_eq!(events.for_patient(1).next().unwrap().code(CodeSystem::Ctv3), Some("Y20d1"));
        assert_eq!(events.for_patient(3).count(), 0);
    }

    #[test]
    fn emergency_care_slots() {
        let input = "patient_id,arrival_date,discharge_destination,diagnosis_01,diagnosis_03\n\
                     1,2020-04-01,306706006,1240751000000100,\n\
                     1,2020-05-01,,,840539006\n";
        let ed = EmergencyCareAttendances::from_reader(input.as_bytes()).unwrap();
        assert_eq!(ed.len(), 2);
        assert!(ed.iter().all(|row| row.diagnoses.len() == DIAGNOSIS_SLOTS));
        assert_eq!(ed[0].diagnoses[0].as_deref(), Some("1240751000000100"));
        assert_eq!(ed[0].discharge_destination.as_deref(), Some("306706006"));
        assert_eq!(ed[1].diagnoses[2].as_deref(), Some("840539006"));
        assert_eq!(ed[1].discharge_destination, None);
    }

    #[test]
    fn active_periods() {
        let reg = PracticeRegistration {
            patient_id: 1,
            start_date: Some(date(2010, 1, 1)),
            end_date: Some(date(2020, 1, 1)),
            practice_pseudo_id: Some(7),
            practice_stp: None,
            practice_nuts1_region_name: None,
        };
        assert!(!reg.is_active_on(date(2009, 12, 31)));
        assert!(reg.is_active_on(date(2010, 1, 1)));
        assert!(reg.is_active_on(date(2019, 12, 31)));
        assert!(!reg.is_active_on(date(2020, 1, 1)));
        let open = PracticeRegistration {
            end_date: None,
            ..reg
        };
        assert!(open.is_active_on(date(2030, 1, 1)));
    }

    #[test]
    fn isaric_sorting() {
        let input = "patient_id,age,hostdat,sex\n\
                     1,70,2020-04-01,1\n\
                     1,9,2020-03-01,1\n\
                     1,,2020-02-01,\n\
                     2,55,2020-06-01,2\n";
        let isaric = Isaric::from_reader(input.as_bytes()).unwrap();
        assert_eq!(&*isaric.columns()[0], "age");
        let age = isaric.column_index("age").unwrap();
        // missing sorts first
        let first = isaric.first_sorted_by(1, age).unwrap();
        assert_eq!(first.values[1].as_deref(), Some("2020-02-01"));
        // numeric, not lexicographic
        assert_eq!(compare_values(Some("9"), Some("70")), Ordering::Less);
        assert_eq!(compare_values(Some("b"), Some("a")), Ordering::Greater);
        assert!(isaric.first_sorted_by(3, age).is_none());
    }

    #[test]
    fn isaric_cache_preferred() {
        let dir = std::env::temp_dir().join(format!("covid-admissions-isaric-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        assert!(Isaric::load_or_import(&dir).is_err());

        std::fs::write(
            table_path(&dir, IsaricRow::TABLE, "csv"),
            "patient_id,age\n1,70\n",
        )
        .unwrap();
        let from_csv = Isaric::load_or_import(&dir).unwrap();
        assert_eq!(from_csv.rows().len(), 1);

        let cached = Isaric::from_reader("patient_id,age\n1,70\n2,40\n".as_bytes()).unwrap();
        cached.save(table_path(&dir, IsaricRow::TABLE, "bin")).unwrap();
        let loaded = Isaric::load_or_import(&dir).unwrap();
        assert_eq!(loaded.rows().len(), 2);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
