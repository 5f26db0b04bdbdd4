//! The raw ISARIC dump: every case report column, one row per patient.
use crate::{
    dataset::{Dataset, Value},
    tables::Isaric,
};

use qu::ick_use::*;

/// For each ISARIC column, the patient's first value when their rows are sorted by that column.
///
/// Each column is sorted on its own, so a row of the output can mix values from different case
/// reports.
pub fn isaric_raw_dataset(isaric: &Isaric) -> Result<Dataset> {
    let mut ds = Dataset::new(isaric.rows().patient_ids());
    for (idx, column) in isaric.columns().iter().enumerate() {
        ds.add(column, |row| -> Value {
            isaric
                .first_sorted_by(row.patient_id, idx)
                .and_then(|isaric_row| isaric_row.values[idx].clone())
                .into()
        })?;
    }
    event!(
        Level::INFO,
        "built raw ISARIC dataset: {} patients, {} columns",
        ds.len(),
        isaric.columns().len()
    );
    Ok(ds)
}
