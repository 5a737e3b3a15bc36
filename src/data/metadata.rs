//! Sample metadata: ordered sample ids with opaque categorical labels

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::{CountQcError, Result};

/// Sample metadata containing categorical attributes
///
/// The order of `sample_ids` is the canonical column order of every matrix
/// bound to this metadata. Attribute values are carried through as labels
/// for grouping and coloring; the numeric core never interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    /// Sample identifiers
    sample_ids: Vec<String>,
    /// Attribute columns (column name -> value for each sample)
    conditions: BTreeMap<String, Vec<String>>,
}

impl SampleMetadata {
    /// Create new sample metadata
    pub fn new(sample_ids: Vec<String>) -> Self {
        Self {
            sample_ids,
            conditions: BTreeMap::new(),
        }
    }

    /// Add a condition column (categorical factor)
    pub fn add_condition(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.sample_ids.len() {
            return Err(CountQcError::schema(format!(
                "condition '{}' has {} values for {} samples",
                name,
                values.len(),
                self.sample_ids.len()
            )));
        }
        self.conditions.insert(name.to_string(), values);
        Ok(())
    }

    /// Check if a condition exists
    pub fn has_condition(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    /// Get the value of a condition for a specific sample
    pub fn get_value(&self, condition: &str, sample_idx: usize) -> Result<String> {
        self.conditions
            .get(condition)
            .and_then(|v| v.get(sample_idx))
            .cloned()
            .ok_or_else(|| CountQcError::InvalidInput {
                reason: format!(
                    "condition '{}' or sample index {} not found",
                    condition, sample_idx
                ),
            })
    }

    /// Get sample IDs
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get number of samples
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Get condition values for a specific column
    pub fn condition(&self, name: &str) -> Option<&Vec<String>> {
        self.conditions.get(name)
    }

    /// Get all condition names, sorted
    pub fn condition_names(&self) -> Vec<&str> {
        self.conditions.keys().map(|s| s.as_str()).collect()
    }

    /// Get unique levels for a condition (sorted)
    pub fn levels(&self, condition_name: &str) -> Option<Vec<String>> {
        self.conditions.get(condition_name).map(|values| {
            let mut unique: Vec<String> = values.to_vec();
            unique.sort();
            unique.dedup();
            unique
        })
    }

    /// Get sample indices for a specific condition level
    pub fn samples_with_level(&self, condition_name: &str, level: &str) -> Vec<usize> {
        self.conditions
            .get(condition_name)
            .map(|values| {
                values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.as_str() == level)
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Size of the smallest group of a condition.
    ///
    /// A natural `min_samples` for expression filtering.
    pub fn smallest_group(&self, condition_name: &str) -> Option<usize> {
        self.levels(condition_name)?
            .iter()
            .map(|level| self.samples_with_level(condition_name, level).len())
            .min()
    }

    /// First sample ID that occurs more than once
    pub(crate) fn duplicate_sample(&self) -> Option<&str> {
        let mut seen = HashSet::with_capacity(self.sample_ids.len());
        self.sample_ids
            .iter()
            .find(|id| !seen.insert(id.as_str()))
            .map(|id| id.as_str())
    }

    /// Subset metadata to specific samples
    pub fn subset(&self, sample_indices: &[usize]) -> Result<Self> {
        let new_ids: Vec<String> = sample_indices
            .iter()
            .map(|&i| self.sample_ids[i].clone())
            .collect();

        let mut new_meta = SampleMetadata::new(new_ids);

        for (name, values) in &self.conditions {
            let new_values: Vec<String> = sample_indices
                .iter()
                .map(|&i| values[i].clone())
                .collect();
            new_meta.add_condition(name, new_values)?;
        }

        Ok(new_meta)
    }
}
