use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use csv::{ReaderBuilder, Trim, WriterBuilder};

use crate::cascade::INDUCED_TRUTH;
use crate::dataset::{Dataset, Label};
use crate::error::{Result, TandemError};

fn reader(file_path: &Path) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(file_path).map_err(|err| {
        TandemError::Input(format!("cannot open {}: {err}", file_path.display()))
    })?;

    Ok(ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(BufReader::new(file)))
}

fn parse_value(file_path: &Path, row: usize, value: &str) -> Result<f64> {
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(number),
        _ => Err(TandemError::Input(format!(
            "{} row {row}: '{value}' is not a finite number",
            file_path.display()
        ))),
    }
}

/// Feature rows, skipping the header row.
pub fn parse_features(file_path: &Path) -> Result<Vec<Vec<f64>>> {
    let mut reader = reader(file_path)?;
    let mut rows = Vec::new();

    for (row, result) in reader.records().enumerate() {
        let record = result.map_err(|err| {
            TandemError::Input(format!("{}: {err}", file_path.display()))
        })?;

        let values = record
            .iter()
            .map(|value| parse_value(file_path, row + 1, value))
            .collect::<Result<Vec<f64>>>()?;

        rows.push(values);
    }

    Ok(rows)
}

/// Labels from a single-column file, skipping the header row.
/// Integral floats such as `2.0` are accepted.
pub fn parse_labels(file_path: &Path) -> Result<Vec<Label>> {
    let mut reader = reader(file_path)?;
    let mut labels = Vec::new();

    for (row, result) in reader.records().enumerate() {
        let record = result.map_err(|err| {
            TandemError::Input(format!("{}: {err}", file_path.display()))
        })?;

        let (Some(field), 1) = (record.get(0), record.len()) else {
            return Err(TandemError::Input(format!(
                "{} row {}: expected one label column, found {}",
                file_path.display(),
                row + 1,
                record.len()
            )));
        };

        let value = parse_value(file_path, row + 1, field)?;

        #[allow(clippy::float_cmp)]
        if value.fract() != 0.0 || !(0.0..=f64::from(INDUCED_TRUTH)).contains(&value) {
            return Err(TandemError::Input(format!(
                "{} row {}: label {value} is not one of 0, 1, 2, 3",
                file_path.display(),
                row + 1
            )));
        }

        #[allow(clippy::cast_possible_truncation)]
        #[allow(clippy::cast_sign_loss)]
        labels.push(value as Label);
    }

    Ok(labels)
}

/// Reads and pairs the feature and label files.
pub fn load_dataset(
    features_path: &Path,
    labels_path: &Path,
    expected_features: usize,
) -> Result<Dataset> {
    let rows = parse_features(features_path)?;
    let labels = parse_labels(labels_path)?;

    if rows.is_empty() {
        return Err(TandemError::Input(format!(
            "{} contains no examples",
            features_path.display()
        )));
    }
    if rows.len() != labels.len() {
        return Err(TandemError::Input(format!(
            "{} has {} rows but {} has {} labels",
            features_path.display(),
            rows.len(),
            labels_path.display(),
            labels.len()
        )));
    }

    let dataset = Dataset::from_rows(&rows, labels)?;
    if dataset.n_features() != expected_features {
        return Err(TandemError::Input(format!(
            "{} has {} feature columns, expected {expected_features}",
            features_path.display(),
            dataset.n_features()
        )));
    }

    Ok(dataset)
}

fn output_error(file_path: &Path, err: impl std::fmt::Display) -> TandemError {
    TandemError::Output(format!("{}: {err}", file_path.display()))
}

/// Writes one prediction per line, row-aligned with the input features.
pub fn save_predictions(file_path: &Path, predictions: &[Label]) -> Result<()> {
    if let Some(parent) = file_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| output_error(file_path, err))?;
    }

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(file_path)
        .map_err(|err| output_error(file_path, err))?;

    for prediction in predictions {
        writer
            .write_record([prediction.to_string()])
            .map_err(|err| output_error(file_path, err))?;
    }

    writer.flush().map_err(|err| output_error(file_path, err))?;

    Ok(())
}
