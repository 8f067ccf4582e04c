//! Peril and sub-peril classification of cause-of-loss codes.
//!
//! The catalog is loaded by the caller (usually from the peril hierarchy in the
//! database) and passed in explicitly.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use arrow::{
    array::{ArrayRef, StringArray},
    record_batch::RecordBatch,
};

use crate::{error::TableResult, util::build_batch};

/// Umbrella code meaning "every peril". Never part of a catalog.
pub const ALL_PERILS_CODE: &str = "ALLP";

pub const PERIL_CODE: &str = "Peril Code";
pub const PERIL_NAME: &str = "Peril Name";
pub const SUB_PERIL_CODE: &str = "Sub Peril Code";
pub const SUB_PERIL_NAME: &str = "Sub Peril Name";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct PerilEntry {
    pub peril_code: String,
    pub peril_name: String,
    pub sub_peril_code: String,
    pub sub_peril_name: String,
}

/// Codes split by the level of the hierarchy they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedCodes {
    pub perils: BTreeSet<String>,
    pub sub_perils: BTreeSet<String>,
    pub others: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PerilCatalog {
    entries: Vec<PerilEntry>,
    sub_perils_by_peril: BTreeMap<String, BTreeSet<String>>,
    sub_perils: BTreeSet<String>,
}

impl PerilCatalog {
    pub fn new(entries: impl IntoIterator<Item = PerilEntry>) -> Self {
        let entries: Vec<PerilEntry> = entries
            .into_iter()
            .filter(|entry| entry.peril_code != ALL_PERILS_CODE)
            .collect();

        let mut sub_perils_by_peril: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut sub_perils = BTreeSet::new();
        for entry in &entries {
            sub_perils_by_peril
                .entry(entry.peril_code.clone())
                .or_default()
                .insert(entry.sub_peril_code.clone());
            sub_perils.insert(entry.sub_peril_code.clone());
        }

        Self {
            entries,
            sub_perils_by_peril,
            sub_perils,
        }
    }

    pub fn entries(&self) -> &[PerilEntry] {
        &self.entries
    }

    pub fn is_peril(&self, code: &str) -> bool {
        self.sub_perils_by_peril.contains_key(code)
    }

    pub fn is_sub_peril(&self, code: &str) -> bool {
        self.sub_perils.contains(code)
    }

    /// A code naming both a peril and a sub-peril counts as a peril.
    pub fn classify<I, S>(&self, codes: I) -> ClassifiedCodes
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classified = ClassifiedCodes::default();
        for code in codes {
            let code = code.as_ref();
            if self.is_peril(code) {
                classified.perils.insert(code.to_string());
            } else if self.is_sub_peril(code) {
                classified.sub_perils.insert(code.to_string());
            } else {
                classified.others.insert(code.to_string());
            }
        }
        classified
    }

    /// Reduces classified codes to the set to report.
    ///
    /// Any unrecognised code widens the result to every sub-peril. A peril
    /// with at least one of its sub-perils listed expands to all of them,
    /// otherwise it is kept as is. Listed sub-perils are always kept.
    pub fn consolidate(&self, codes: &ClassifiedCodes) -> BTreeSet<String> {
        if !codes.others.is_empty() {
            return self.sub_perils.clone();
        }

        let mut out = BTreeSet::new();
        for peril in &codes.perils {
            let Some(children) = self.sub_perils_by_peril.get(peril) else {
                continue;
            };
            if children.iter().any(|child| codes.sub_perils.contains(child)) {
                out.extend(children.iter().cloned());
            } else {
                out.insert(peril.clone());
            }
        }
        out.extend(codes.sub_perils.iter().cloned());
        out
    }

    /// The catalog rows selected by `codes`, sorted by peril code.
    ///
    /// A selected peril contributes all of its rows, a selected sub-peril the
    /// rows it appears in. Rows selected both ways appear twice.
    pub fn to_table(&self, codes: &BTreeSet<String>) -> TableResult<RecordBatch> {
        let classified = self.classify(codes);
        let mut rows: Vec<&PerilEntry> = self
            .entries
            .iter()
            .filter(|entry| classified.perils.contains(&entry.peril_code))
            .chain(
                self.entries
                    .iter()
                    .filter(|entry| classified.sub_perils.contains(&entry.sub_peril_code)),
            )
            .collect();
        rows.sort_by(|a, b| a.peril_code.cmp(&b.peril_code));

        build_batch(vec![
            (
                PERIL_CODE.to_string(),
                strings(rows.iter().map(|e| e.peril_code.as_str())),
            ),
            (
                PERIL_NAME.to_string(),
                strings(rows.iter().map(|e| e.peril_name.as_str())),
            ),
            (
                SUB_PERIL_CODE.to_string(),
                strings(rows.iter().map(|e| e.sub_peril_code.as_str())),
            ),
            (
                SUB_PERIL_NAME.to_string(),
                strings(rows.iter().map(|e| e.sub_peril_name.as_str())),
            ),
        ])
    }

    /// One row per peril, `[Peril Code, Peril Name]`, for exposures whose
    /// codes match nothing in the catalog.
    pub fn perils_table(&self) -> TableResult<RecordBatch> {
        let mut perils: BTreeMap<&str, &str> = BTreeMap::new();
        for entry in &self.entries {
            perils
                .entry(entry.peril_code.as_str())
                .and_modify(|name| {
                    if entry.peril_name.as_str() < *name {
                        *name = entry.peril_name.as_str();
                    }
                })
                .or_insert(entry.peril_name.as_str());
        }
        build_batch(vec![
            (PERIL_CODE.to_string(), strings(perils.keys().copied())),
            (PERIL_NAME.to_string(), strings(perils.values().copied())),
        ])
    }
}

fn strings<'a>(values: impl Iterator<Item = &'a str>) -> ArrayRef {
    Arc::new(StringArray::from_iter_values(values))
}

/// Splits `+`-joined layer cause-of-loss values into individual codes.
pub fn layer_cause_of_loss<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .flatten()
        .flat_map(|value| {
            value
                .as_ref()
                .split('+')
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}
