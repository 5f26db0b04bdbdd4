//! The output table: one row per patient in the population, with named columns.
use crate::{csv_reader, error::SetupError, is_gzip, open_input, util, ArcStr, PatientId};

use chrono::NaiveDate;
use qu::ick_use::*;
use rayon::prelude::*;
use std::{
    collections::BTreeMap,
    fmt, fs, io,
    path::Path,
    sync::Arc,
};

/// A single value in the dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(ArcStr),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Formats the way the value is written to CSV: booleans as `T`/`F`, dates in ISO format and
/// nulls as the empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(true) => f.write_str("T"),
            Value::Bool(false) => f.write_str("F"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<bool> for Value {
    fn from(from: bool) -> Self {
        Value::Bool(from)
    }
}

impl From<i64> for Value {
    fn from(from: i64) -> Self {
        Value::Int(from)
    }
}

impl From<f64> for Value {
    fn from(from: f64) -> Self {
        Value::Float(from)
    }
}

impl From<NaiveDate> for Value {
    fn from(from: NaiveDate) -> Self {
        Value::Date(from)
    }
}

impl From<ArcStr> for Value {
    fn from(from: ArcStr) -> Self {
        Value::Str(from)
    }
}

impl From<&str> for Value {
    fn from(from: &str) -> Self {
        Value::Str(from.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(from: Option<T>) -> Self {
        from.map(Into::into).unwrap_or(Value::Null)
    }
}

/// The row a column is being evaluated for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Row {
    pub idx: usize,
    pub patient_id: PatientId,
}

#[derive(Debug, Clone)]
struct Column {
    name: ArcStr,
    values: Vec<Value>,
}

/// A dataset under construction.
///
/// The population is fixed when the dataset is created. Columns are then added one at a time;
/// a column may read columns added before it, but can never be changed or removed.
#[derive(Debug, Clone)]
pub struct Dataset {
    population: Arc<Vec<PatientId>>,
    columns: Vec<Column>,
    col_idx: BTreeMap<ArcStr, usize>,
}

impl Dataset {
    /// Create a dataset with the given patients as rows (sorted, duplicates removed).
    pub fn new(population: impl IntoIterator<Item = PatientId>) -> Self {
        let mut population = population.into_iter().collect::<Vec<_>>();
        population.sort_unstable();
        population.dedup();
        event!(Level::INFO, "population has {} patients", population.len());
        Self {
            population: Arc::new(population),
            columns: vec![],
            col_idx: BTreeMap::new(),
        }
    }

    pub fn population(&self) -> &[PatientId] {
        &self.population
    }

    /// The number of rows.
    pub fn len(&self) -> usize {
        self.population.len()
    }

    pub fn is_empty(&self) -> bool {
        self.population.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &ArcStr> + '_ {
        self.columns.iter().map(|col| &col.name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.col_idx.contains_key(name)
    }

    /// Add a column, computing the value for each row in parallel.
    pub fn add<V, F>(&mut self, name: &str, f: F) -> Result<(), SetupError>
    where
        V: Into<Value> + Send,
        F: Fn(Row) -> V + Sync + Send,
    {
        self.check_new(name)?;
        let values: Vec<Value> = self
            .population
            .par_iter()
            .enumerate()
            .map(|(idx, patient_id)| {
                f(Row {
                    idx,
                    patient_id: *patient_id,
                })
                .into()
            })
            .collect();
        self.push(name, values);
        Ok(())
    }

    fn check_new(&self, name: &str) -> Result<(), SetupError> {
        if self.has_column(name) {
            return Err(SetupError::DuplicateColumn(name.into()));
        }
        Ok(())
    }

    fn push(&mut self, name: &str, values: Vec<Value>) {
        let name = ArcStr::from(name);
        event!(Level::DEBUG, "added column {}", name);
        self.col_idx.insert(name.clone(), self.columns.len());
        self.columns.push(Column { name, values });
    }

    /// All values of a column, in row order.
    pub fn column(&self, name: &str) -> Result<&[Value], SetupError> {
        let idx = self
            .col_idx
            .get(name)
            .ok_or_else(|| SetupError::UnknownColumn(name.into()))?;
        Ok(&self.columns[*idx].values)
    }

    /// A date column, with nulls as `None`.
    pub fn dates(&self, name: &str) -> Result<Vec<Option<NaiveDate>>, SetupError> {
        self.column(name)?
            .iter()
            .map(|value| match value {
                Value::Null => Ok(None),
                Value::Date(date) => Ok(Some(*date)),
                _ => Err(SetupError::ColumnType {
                    column: name.into(),
                    expected: "date",
                }),
            })
            .collect()
    }

    pub fn value(&self, row: usize, name: &str) -> Result<&Value, SetupError> {
        self.column(name)?
            .get(row)
            .ok_or_else(|| SetupError::InvalidParameter {
                name: "row",
                reason: format!("row {} out of range for {} rows", row, self.len()),
            })
    }

    /// The number of null values in each column, in column order.
    pub fn null_counts(&self) -> Vec<(ArcStr, usize)> {
        self.columns
            .iter()
            .map(|col| {
                (
                    col.name.clone(),
                    col.values.iter().filter(|v| v.is_null()).count(),
                )
            })
            .collect()
    }

    /// Write the dataset as CSV, gzipped if the file name ends with `.gz`.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result {
        let path = path.as_ref();
        let inner = || -> Result {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("could not create parent")?;
            }
            let file = io::BufWriter::new(fs::File::create(path)?);
            if is_gzip(path) {
                let mut gz = flate2::write::GzEncoder::new(file, flate2::Compression::default());
                self.write_to(&mut gz)?;
                io::Write::flush(&mut gz.finish()?)?;
            } else {
                self.write_to(file)?;
            }
            Ok(())
        };
        inner().with_context(|| format!("unable to write dataset to \"{}\"", path.display()))?;
        event!(
            Level::INFO,
            "wrote {} rows and {} columns to \"{}\"",
            self.len(),
            self.columns.len() + 1,
            path.display()
        );
        Ok(())
    }

    /// Write the dataset as CSV: a `patient_id` column, then every column in the order added.
    pub fn write_to(&self, writer: impl io::Write) -> Result {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(
            Some("patient_id").into_iter().chain(
                self.columns.iter().map(|col| &*col.name),
            ),
        )?;
        let mut record = Vec::with_capacity(self.columns.len() + 1);
        for (idx, patient_id) in self.population.iter().enumerate() {
            record.clear();
            record.push(patient_id.to_string());
            record.extend(self.columns.iter().map(|col| col.values[idx].to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read a dataset written by `write_csv` back in. Every non-empty value is read as text.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        open_input(path)
            .and_then(Self::read_from)
            .with_context(|| format!("while reading dataset \"{}\"", path.display()))
    }

    pub fn read_from(reader: impl io::Read) -> Result<Self> {
        let mut reader = csv_reader(reader);
        let headers = reader.headers()?.clone();
        ensure!(
            headers.get(0) == Some("patient_id"),
            "the first column of a dataset should be `patient_id`"
        );
        let mut population = vec![];
        let mut columns = headers
            .iter()
            .skip(1)
            .map(|name| Column {
                name: name.into(),
                values: vec![],
            })
            .collect::<Vec<_>>();
        for (row, record) in reader.into_records().enumerate() {
            let record = record?;
            let patient_id: PatientId = record
                .get(0)
                .unwrap_or("")
                .parse()
                .with_context(|| format!("row {}: invalid patient_id", row + 1))?;
            population.push(patient_id);
            for (col, value) in columns.iter_mut().zip(record.iter().skip(1)) {
                col.values.push(util::opt_str(value).into());
            }
        }
        let col_idx = columns
            .iter()
            .enumerate()
            .map(|(idx, col)| (col.name.clone(), idx))
            .collect::<BTreeMap<_, _>>();
        ensure!(
            col_idx.len() == columns.len(),
            "dataset has duplicate column names"
        );
        Ok(Self {
            population: Arc::new(population),
            columns,
            col_idx,
        })
    }
}

/// Read a date column from a previously written dataset, keyed by patient.
///
/// Rows with an empty value are skipped.
pub fn read_date_column(
    path: impl AsRef<Path>,
    column: &str,
) -> Result<BTreeMap<PatientId, NaiveDate>> {
    let path = path.as_ref();
    let dataset = Dataset::read_csv(path)?;
    date_column(&dataset, column)
        .with_context(|| format!("reading column \"{}\" of \"{}\"", column, path.display()))
}

fn date_column(dataset: &Dataset, column: &str) -> Result<BTreeMap<PatientId, NaiveDate>> {
    let values = dataset.column(column)?;
    let mut out = BTreeMap::new();
    for (patient_id, value) in dataset.population().iter().zip(values) {
        if let Some(s) = value.as_str() {
            let date = util::parse_date(s).map_err(|e| format_err!("{}", e))?;
            out.insert(*patient_id, date);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn columns() {
        let mut ds = Dataset::new([3, 1, 2, 1]);
        assert_eq!(ds.population(), [1, 2, 3]);
        ds.add("admission_date", |row| {
            (row.patient_id != 2).then(|| date(2020, 4, row.patient_id as u32))
        })
        .unwrap();
        assert_eq!(
            ds.dates("admission_date").unwrap(),
            [Some(date(2020, 4, 1)), None, Some(date(2020, 4, 3))]
        );
        // later columns can read earlier ones
        let dates = ds.dates("admission_date").unwrap();
        ds.add("admitted", |row| dates[row.idx].is_some()).unwrap();
        assert_eq!(ds.value(1, "admitted").unwrap(), &Value::Bool(false));

        assert_eq!(
            ds.add("admitted", |_| true),
            Err(SetupError::DuplicateColumn("admitted".into()))
        );
        assert_eq!(
            ds.dates("missing"),
            Err(SetupError::UnknownColumn("missing".into()))
        );
        assert!(matches!(
            ds.dates("admitted"),
            Err(SetupError::ColumnType { .. })
        ));
        assert_eq!(ds.null_counts()[0].1, 1);
    }

    #[test]
    fn csv_output() {
        let mut ds = Dataset::new([2, 1]);
        ds.add("admission_date", |row| {
            (row.patient_id == 1).then(|| date(2021, 1, 5))
        })
        .unwrap();
        ds.add("registered", |row| row.patient_id == 1).unwrap();
        ds.add("age", |row| row.patient_id as i64 * 10).unwrap();
        ds.add("imd", |_| "2").unwrap();
        let mut out = vec![];
        ds.write_to(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out.clone()).unwrap(),
            "patient_id,admission_date,registered,age,imd\n\
             1,2021-01-05,T,10,2\n\
             2,,F,20,2\n"
        );

        let back = Dataset::read_from(&out[..]).unwrap();
        assert_eq!(back.population(), [1, 2]);
        assert_eq!(back.value(1, "admission_date").unwrap(), &Value::Null);
        let dates = date_column(&back, "admission_date").unwrap();
        assert_eq!(dates.len(), 1);
        assert_eq!(dates[&1], date(2021, 1, 5));
        assert!(date_column(&back, "registered").is_err());
    }
}
