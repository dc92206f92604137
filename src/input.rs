use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::utils::{Dataset, INPUT_COLUMNS, Record};

/// Load and validate a patient dataset from a CSV file.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let file = File::open(path)?;
    let dataset = read_dataset(file)?;
    info!(path = %path.display(), rows = dataset.len(), "loaded dataset");
    Ok(dataset)
}

/// Read a dataset from any CSV source with the `Age,Sex,BP,Cholesterol,Na_to_K,Drug` header.
///
/// Extra columns are ignored. Every expected column must be present and every
/// expected cell non-empty.
pub fn read_dataset<R: Read>(source: R) -> Result<Dataset> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let positions = column_positions(&headers)?;
    debug!(?positions, "resolved input columns");

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row?;
        records.push(parse_record(&row, &positions, i + 1)?);
    }
    Ok(Dataset::new(records))
}

fn column_positions(headers: &StringRecord) -> Result<[usize; 6]> {
    let mut positions = [0usize; 6];
    let mut missing = Vec::new();
    for (slot, name) in positions.iter_mut().zip(INPUT_COLUMNS) {
        match headers.iter().position(|h| h == name) {
            Some(idx) => *slot = idx,
            None => missing.push(name),
        }
    }
    if !missing.is_empty() {
        return Err(PipelineError::schema(format!(
            "missing column(s): {}",
            missing.join(", ")
        )));
    }
    Ok(positions)
}

fn parse_record(row: &StringRecord, positions: &[usize; 6], row_no: usize) -> Result<Record> {
    let cell = |col: usize| -> Result<&str> {
        let value = row.get(positions[col]).unwrap_or("");
        if value.is_empty() {
            return Err(PipelineError::MissingValue {
                row: row_no,
                column: INPUT_COLUMNS[col].to_string(),
            });
        }
        Ok(value)
    };

    // Presence is checked for every cell before any cell is parsed.
    let cells = (0..INPUT_COLUMNS.len())
        .map(cell)
        .collect::<Result<Vec<_>>>()?;

    let age = cells[0]
        .parse::<u32>()
        .ok()
        .filter(|age| *age > 0)
        .ok_or_else(|| {
            PipelineError::schema(format!(
                "row {row_no}: Age must be a positive integer, got `{}`",
                cells[0]
            ))
        })?;
    let na_to_k = cells[4]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            PipelineError::schema(format!(
                "row {row_no}: Na_to_K must be a number, got `{}`",
                cells[4]
            ))
        })?;

    Ok(Record {
        age,
        sex: cells[1].to_string(),
        blood_pressure: cells[2].to_string(),
        cholesterol: cells[3].to_string(),
        na_to_k,
        drug: cells[5].to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const HEADER: &str = "Age,Sex,BP,Cholesterol,Na_to_K,Drug\n";

    #[test]
    fn reads_records_in_file_order() {
        let csv = format!("{HEADER}23,F,HIGH,HIGH,25.355,DrugY\n47,M,LOW,HIGH,13.093,drugC\n");
        let data = read_dataset(csv.as_bytes()).unwrap();
        assert_eq!(data.len(), 2);
        let first = &data.records()[0];
        assert_eq!(first.age, 23);
        assert_eq!(first.sex, "F");
        assert_eq!(first.blood_pressure, "HIGH");
        assert_eq!(first.na_to_k, 25.355);
        assert_eq!(data.records()[1].drug, "drugC");
    }

    #[test]
    fn column_order_and_extra_columns_do_not_matter() {
        let csv = "Drug,Id,Na_to_K,Cholesterol,BP,Sex,Age\ndrugX,7,10.5,NORMAL,NORMAL,M,61\n";
        let data = read_dataset(csv.as_bytes()).unwrap();
        let r = &data.records()[0];
        assert_eq!((r.age, r.drug.as_str(), r.na_to_k), (61, "drugX", 10.5));
    }

    #[test]
    fn missing_column_is_schema_error() {
        let csv = "Age,Sex,BP,Na_to_K,Drug\n23,F,HIGH,25.3,DrugY\n";
        let err = read_dataset(csv.as_bytes()).unwrap_err();
        match err {
            PipelineError::Schema(msg) => assert!(msg.contains("Cholesterol"), "{msg}"),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn empty_cell_is_missing_value() {
        let csv = format!("{HEADER}23,F,HIGH,HIGH,25.3,DrugY\n30,M,,HIGH,11.0,drugA\n");
        let err = read_dataset(csv.as_bytes()).unwrap_err();
        assert!(
            matches!(err, PipelineError::MissingValue { row: 2, ref column } if column == "BP"),
            "{err:?}"
        );
    }

    #[test]
    fn short_row_is_missing_value() {
        let csv = format!("{HEADER}23,F,HIGH,HIGH,25.3\n");
        let err = read_dataset(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingValue { ref column, .. } if column == "Drug"));
    }

    #[test]
    fn unparseable_age_is_schema_error() {
        let csv = format!("{HEADER}old,F,HIGH,HIGH,25.3,DrugY\n");
        assert!(matches!(
            read_dataset(csv.as_bytes()),
            Err(PipelineError::Schema(_))
        ));
        let csv = format!("{HEADER}0,F,HIGH,HIGH,25.3,DrugY\n");
        assert!(matches!(
            read_dataset(csv.as_bytes()),
            Err(PipelineError::Schema(_))
        ));
    }

    #[test]
    fn load_dataset_reads_from_disk() {
        let mut file = NamedTempFile::new().expect("tempfile");
        write!(file, "{HEADER}50,M,NORMAL,NORMAL,9.17,drugX\n").expect("write");
        let data = load_dataset(file.path()).unwrap();
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn load_dataset_missing_file_is_io_error() {
        let err = load_dataset(Path::new("does/not/exist.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
