//! Target computation for decoded records

use crate::mapping::AggregationSpec;
use crate::transmit_core::record::{format_record_id, round_value, RawRecord, ResolvedRecord};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("record {record_id}: target '{target}' is missing dependent '{dependent}'")]
    MissingDependent {
        record_id: String,
        target: String,
        dependent: String,
    },
}

/// Computes every target of a mapping as the sum of its dependents
pub struct Aggregator<'a> {
    spec: &'a AggregationSpec,
}

impl<'a> Aggregator<'a> {
    pub fn new(spec: &'a AggregationSpec) -> Self {
        Self { spec }
    }

    /// Resolve one record
    ///
    /// The dependents table is rebuilt for every call, so a value missing from
    /// this record can never be filled in from an earlier one. Values the mapping
    /// does not reference are ignored.
    pub fn resolve(&self, record: &RawRecord) -> Result<ResolvedRecord, AggregationError> {
        let mut table: BTreeMap<&str, Option<f64>> = self
            .spec
            .dependents()
            .iter()
            .map(|name| (name.as_str(), None))
            .collect();

        for (name, value) in &record.values {
            if let Some(slot) = table.get_mut(name.as_str()) {
                *slot = Some(*value);
            }
        }

        let mut values = BTreeMap::new();
        for (target, dependents) in self.spec.targets() {
            let mut sum = 0.0;
            for dependent in dependents {
                match table.get(dependent.as_str()).copied().flatten() {
                    Some(value) => sum += value,
                    None => {
                        return Err(AggregationError::MissingDependent {
                            record_id: format_record_id(&record.timestamp),
                            target: target.clone(),
                            dependent: dependent.clone(),
                        })
                    }
                }
            }
            values.insert(target.clone(), round_value(sum));
        }

        Ok(ResolvedRecord {
            record_id: record.timestamp,
            values,
        })
    }
}
