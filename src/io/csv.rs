//! Delimited-text reading and writing for count matrices, metadata and results

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ndarray::Array2;

use crate::data::{is_whole_count, CountMatrix, SampleMetadata};
use crate::distance::DistanceMatrix;
use crate::error::{CountQcError, Result};
use crate::mds::EmbeddingResult;
use crate::normalization::NormalizedMatrix;

/// Options for [`read_count_matrix`]
#[derive(Debug, Clone, Default)]
pub struct CountTableOptions {
    /// Header names of auxiliary columns to drop, e.g. `Length` in
    /// featureCounts output
    pub drop_columns: Vec<String>,
}

/// Tab if the header line contains one, comma otherwise
fn detect_delimiter(content: &str) -> u8 {
    let header = content
        .lines()
        .find(|line| !line.starts_with('#') && !line.trim().is_empty())
        .unwrap_or("");
    if header.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

fn reader_for(content: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(content))
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes())
}

fn tsv_writer<P: AsRef<Path>>(path: P) -> Result<csv::Writer<fs::File>> {
    Ok(csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?)
}

/// Read a gene x sample count table.
///
/// The first column holds gene IDs and the header row supplies sample IDs.
/// Lines starting with `#` are skipped; columns named in
/// `options.drop_columns` are removed before the counts are parsed.
pub fn read_count_matrix<P: AsRef<Path>>(
    path: P,
    options: &CountTableOptions,
) -> Result<CountMatrix> {
    let content = fs::read_to_string(path)?;
    let mut reader = reader_for(&content);

    let header = reader.headers()?.clone();
    if header.len() < 2 {
        return Err(CountQcError::InvalidInput {
            reason: "count table needs a gene ID column and at least one sample column".to_string(),
        });
    }

    for name in &options.drop_columns {
        if !header.iter().skip(1).any(|h| h == name) {
            return Err(CountQcError::InvalidInput {
                reason: format!("column '{}' to drop is not in the count table header", name),
            });
        }
    }

    let sample_columns: Vec<usize> = (1..header.len())
        .filter(|&i| !options.drop_columns.iter().any(|d| d == &header[i]))
        .collect();
    if sample_columns.is_empty() {
        return Err(CountQcError::InvalidInput {
            reason: "no sample columns left after dropping auxiliary columns".to_string(),
        });
    }
    let sample_ids: Vec<String> = sample_columns.iter().map(|&i| header[i].to_string()).collect();

    let mut gene_ids = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        let gene_id = record[0].to_string();
        for (&col, sample_id) in sample_columns.iter().zip(&sample_ids) {
            let value = parse_count(&record[col]).map_err(|value| CountQcError::InvalidCount {
                gene_id: gene_id.clone(),
                sample_id: sample_id.clone(),
                value,
            })?;
            values.push(value);
        }
        gene_ids.push(gene_id);
    }

    if gene_ids.is_empty() {
        return Err(CountQcError::InvalidInput {
            reason: "no genes found in count table".to_string(),
        });
    }

    log::debug!(
        "Read {} genes x {} samples (dropped columns: {:?})",
        gene_ids.len(),
        sample_ids.len(),
        options.drop_columns
    );

    let counts = Array2::from_shape_vec((gene_ids.len(), sample_ids.len()), values)
        .map_err(|e| CountQcError::InvalidInput {
            reason: format!("count table is not rectangular: {}", e),
        })?;
    CountMatrix::new(counts, gene_ids, sample_ids)
}

/// Parse one count field.
///
/// Integers are read exactly as `u64`; whole-number floats such as `10.0`
/// (written by some quantifiers) are accepted too. On failure the offending
/// value is returned, NaN if it was not a number at all.
fn parse_count(field: &str) -> std::result::Result<u64, f64> {
    if let Ok(count) = field.parse::<u64>() {
        return Ok(count);
    }
    let value = field.parse::<f64>().map_err(|_| f64::NAN)?;
    if is_whole_count(value) {
        Ok(value as u64)
    } else {
        Err(value)
    }
}

/// Read sample metadata.
///
/// First column is the sample ID; every further column becomes a
/// categorical attribute named after its header.
pub fn read_metadata<P: AsRef<Path>>(path: P) -> Result<SampleMetadata> {
    let content = fs::read_to_string(path)?;
    let mut reader = reader_for(&content);

    let header = reader.headers()?.clone();
    if header.is_empty() {
        return Err(CountQcError::InvalidInput {
            reason: "empty metadata header".to_string(),
        });
    }
    let names: Vec<String> = header.iter().skip(1).map(|s| s.to_string()).collect();
    if let Some(pos) = (1..names.len()).find(|&i| names[..i].contains(&names[i])) {
        return Err(CountQcError::InvalidInput {
            reason: format!("duplicate attribute column '{}' in metadata header", names[pos]),
        });
    }

    let mut sample_ids = Vec::new();
    let mut columns: BTreeMap<&str, Vec<String>> =
        names.iter().map(|n| (n.as_str(), Vec::new())).collect();
    for record in reader.records() {
        let record = record?;
        sample_ids.push(record[0].to_string());
        for (i, name) in names.iter().enumerate() {
            if let Some(values) = columns.get_mut(name.as_str()) {
                values.push(record[i + 1].to_string());
            }
        }
    }

    if sample_ids.is_empty() {
        return Err(CountQcError::InvalidInput {
            reason: "no samples found in metadata".to_string(),
        });
    }

    let mut metadata = SampleMetadata::new(sample_ids);
    for (name, values) in columns {
        metadata.add_condition(name, values)?;
    }
    Ok(metadata)
}

/// Read a square distance matrix: header of sample IDs, one row per sample
/// starting with its ID
pub fn read_distance_matrix<P: AsRef<Path>>(path: P) -> Result<DistanceMatrix> {
    let content = fs::read_to_string(path)?;
    let mut reader = reader_for(&content);

    let header = reader.headers()?.clone();
    let sample_ids: Vec<String> = header.iter().skip(1).map(|s| s.to_string()).collect();
    let n = sample_ids.len();

    let mut row_ids = Vec::with_capacity(n);
    let mut values = Vec::with_capacity(n * n);
    for record in reader.records() {
        let record = record?;
        row_ids.push(record[0].to_string());
        for field in record.iter().skip(1) {
            values.push(field.parse::<f64>().map_err(|_| CountQcError::InvalidInput {
                reason: format!("invalid distance value '{}'", field),
            })?);
        }
    }

    if row_ids != sample_ids {
        return Err(CountQcError::schema(
            "distance matrix row IDs do not match its column IDs",
        ));
    }

    let values = Array2::from_shape_vec((n, n), values).map_err(|e| CountQcError::InvalidInput {
        reason: format!("distance matrix is not square: {}", e),
    })?;
    DistanceMatrix::from_values(sample_ids, values)
}

/// Write normalized values, one row per gene
pub fn write_normalized<P: AsRef<Path>>(path: P, matrix: &NormalizedMatrix) -> Result<()> {
    let mut writer = tsv_writer(path)?;

    let mut header = vec!["gene_id".to_string()];
    header.extend(matrix.sample_ids().iter().cloned());
    writer.write_record(&header)?;

    for (i, gene_id) in matrix.gene_ids().iter().enumerate() {
        let mut row = vec![gene_id.clone()];
        row.extend(matrix.gene_values(i).iter().map(|v| format!("{:.6}", v)));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a distance matrix with sample IDs as row and column labels
pub fn write_distances<P: AsRef<Path>>(path: P, distances: &DistanceMatrix) -> Result<()> {
    let mut writer = tsv_writer(path)?;

    let mut header = vec!["sample_id".to_string()];
    header.extend(distances.sample_ids().iter().cloned());
    writer.write_record(&header)?;

    for (i, sample_id) in distances.sample_ids().iter().enumerate() {
        let mut row = vec![sample_id.clone()];
        row.extend(distances.values().row(i).iter().map(|v| format!("{:.10}", v)));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write embedding coordinates, with the metadata attributes of each
/// sample alongside for downstream coloring
pub fn write_embedding<P: AsRef<Path>>(
    path: P,
    embedding: &EmbeddingResult,
    metadata: Option<&SampleMetadata>,
) -> Result<()> {
    let mut writer = tsv_writer(path)?;
    let attributes: Vec<&str> = metadata.map(|m| m.condition_names()).unwrap_or_default();

    let mut header = vec!["sample_id".to_string()];
    header.extend(attributes.iter().map(|a| a.to_string()));
    header.extend((1..=embedding.dimensions()).map(|k| format!("dim{}", k)));
    writer.write_record(&header)?;

    for (i, sample_id) in embedding.sample_ids().iter().enumerate() {
        let mut row = vec![sample_id.clone()];
        if let Some(meta) = metadata {
            for name in &attributes {
                row.push(meta.get_value(name, i)?);
            }
        }
        row.extend(embedding.sample(i).iter().map(|v| format!("{:.10}", v)));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
