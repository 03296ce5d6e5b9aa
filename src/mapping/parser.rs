//! Mapping parser - turns one configuration block into an `AggregationSpec`
//!
//! Block format:
//!
//! ```text
//! SOURCE -> DESTINATION
//! DEP1 DEP2 ... -> TARGET
//! DEP3 -> OTHER_TARGET
//! ```
//!
//! The first non-blank line is the header. Every following non-blank line
//! declares one target as the sum of its whitespace-separated dependents.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

const ARROW: &str = "->";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("mapping block is empty")]
    EmptyBlock,
    #[error("malformed header '{0}': expected 'SOURCE -> DESTINATION'")]
    MalformedHeader(String),
    #[error("malformed target line '{0}': expected 'DEP1 DEP2 ... -> TARGET'")]
    MalformedTarget(String),
    #[error("target '{0}' declares no dependents")]
    EmptyDependents(String),
    #[error("target '{target}' lists dependent '{dependent}' more than once")]
    DuplicateDependent { target: String, dependent: String },
    #[error("target '{0}' is declared more than once")]
    DuplicateTarget(String),
}

/// Parsed aggregation mapping for one source
///
/// Immutable once parsed: `dependents` is always the union of every
/// target's dependent list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationSpec {
    source_id: String,
    destination_id: String,
    targets: BTreeMap<String, Vec<String>>,
    dependents: BTreeSet<String>,
}

impl AggregationSpec {
    /// Parse a mapping block
    pub fn parse(block: &str) -> Result<Self, MappingError> {
        let mut lines = block
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty());

        let header = lines.next().ok_or(MappingError::EmptyBlock)?;
        let (source_id, destination_id) = parse_header(header)?;

        let mut targets: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut dependents = BTreeSet::new();

        for line in lines {
            let (target, deps) = parse_target_line(line)?;

            if targets.contains_key(&target) {
                return Err(MappingError::DuplicateTarget(target));
            }

            dependents.extend(deps.iter().cloned());
            targets.insert(target, deps);
        }

        Ok(Self {
            source_id,
            destination_id,
            targets,
            dependents,
        })
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn destination_id(&self) -> &str {
        &self.destination_id
    }

    /// Target name -> dependents, in declared order
    pub fn targets(&self) -> &BTreeMap<String, Vec<String>> {
        &self.targets
    }

    pub fn dependents(&self) -> &BTreeSet<String> {
        &self.dependents
    }

    pub fn has_targets(&self) -> bool {
        !self.targets.is_empty()
    }
}

/// Split a line on the single arrow token it must contain
fn split_arrow(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.split(ARROW);
    let left = parts.next()?;
    let right = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((left.trim(), right.trim()))
}

fn is_single_token(s: &str) -> bool {
    !s.is_empty() && !s.contains(char::is_whitespace)
}

fn parse_header(line: &str) -> Result<(String, String), MappingError> {
    let malformed = || MappingError::MalformedHeader(line.to_string());

    let (source, destination) = split_arrow(line).ok_or_else(malformed)?;
    if !is_single_token(source) || !is_single_token(destination) {
        return Err(malformed());
    }

    Ok((source.to_string(), destination.to_string()))
}

fn parse_target_line(line: &str) -> Result<(String, Vec<String>), MappingError> {
    let (deps, target) =
        split_arrow(line).ok_or_else(|| MappingError::MalformedTarget(line.to_string()))?;

    if !is_single_token(target) {
        return Err(MappingError::MalformedTarget(line.to_string()));
    }

    let mut names: Vec<String> = Vec::new();
    for dep in deps.split_whitespace() {
        if names.iter().any(|n| n == dep) {
            return Err(MappingError::DuplicateDependent {
                target: target.to_string(),
                dependent: dep.to_string(),
            });
        }
        names.push(dep.to_string());
    }

    if names.is_empty() {
        return Err(MappingError::EmptyDependents(target.to_string()));
    }

    Ok((target.to_string(), names))
}
