//! Relational tables rebuilt from the column files of one snapshot.

use std::{collections::BTreeSet, collections::HashSet, sync::Arc};

use arrow::{
    array::{ArrayRef, AsArray, UInt32Array},
    compute::sort_to_indices,
    record_batch::RecordBatch,
};
use exposure_bin_format::BinFile;

use crate::{
    assemble::{assemble, assemble_enum_table, open_optional},
    cause_of_loss::{derive_combined_cause_of_loss, CauseOfLossEntries},
    error::TableResult,
    join::{inner_join, key_value_table},
    layout::{
        names::*, DictionarySpec, EntityLayout, Snapshot, CAUSE_OF_LOSS_ID_MAP_FILE,
        COVERAGE_CAUSE_OF_LOSS_FILE,
    },
    peril::layer_cause_of_loss,
    util::{
        append_column, build_batch, column, key_strings, named_columns, remove_column, select,
        sort_columns, take_rows,
    },
};

/// Reads a dictionary file as a `[key, value]` table.
pub fn read_dictionary(snapshot: &Snapshot, spec: &DictionarySpec) -> TableResult<RecordBatch> {
    let decoded = BinFile::open(snapshot.path(&spec.file))?
        .read_key_value_map(spec.key_type, spec.value_type)?;
    key_value_table(&decoded.value, &spec.key, &spec.value)
}

/// Plain columns followed by enum columns of `layout`. Absent files are skipped.
pub fn read_entity(snapshot: &Snapshot, layout: &EntityLayout) -> TableResult<RecordBatch> {
    let plain = assemble(&layout.plain_files(snapshot.dir()), layout.read_header)?;
    let enums = assemble_enum_table(&layout.enum_files(snapshot.dir()))?;
    let mut columns = named_columns(&plain);
    columns.extend(named_columns(&enums));
    build_batch(columns)
}

/// Asset columns plus a positional `Asset Row`, columns sorted by name.
pub fn asset_table(snapshot: &Snapshot) -> TableResult<RecordBatch> {
    let assets = read_entity(snapshot, &EntityLayout::assets(snapshot)?)?;
    let rows = UInt32Array::from_iter_values(0..assets.num_rows() as u32);
    let assets = append_column(&assets, ASSET_ROW, Arc::new(rows) as ArrayRef)?;
    tracing::debug!(
        snapshot = %snapshot.key(),
        rows = assets.num_rows(),
        columns = assets.num_columns(),
        "asset table"
    );
    sort_columns(&assets)
}

/// First row of each distinct value of `key`, in order of appearance.
fn first_rows(batch: &RecordBatch, key: &str) -> TableResult<UInt32Array> {
    let mut seen = HashSet::new();
    let rows = key_strings(column(batch, key)?)?
        .into_iter()
        .enumerate()
        .filter(|(_, key)| seen.insert(key.clone()))
        .map(|(row, _)| row as u32);
    Ok(UInt32Array::from_iter_values(rows))
}

fn sort_by(batch: &RecordBatch, key: &str) -> TableResult<RecordBatch> {
    let indices = sort_to_indices(column(batch, key)?, None, None)?;
    take_rows(batch, &indices)
}

/// Contracts keyed by row number.
///
/// The three contract dictionaries are joined on row number and the
/// per-contract columns appended. Inception and expiration dates come from
/// the first asset of each contract.
pub fn contract_table(snapshot: &Snapshot, assets: &RecordBatch) -> TableResult<RecordBatch> {
    let layout = EntityLayout::contracts(snapshot);

    let mut contracts: Option<RecordBatch> = None;
    for spec in &layout.dictionaries {
        let dictionary = read_dictionary(snapshot, spec)?;
        contracts = Some(match contracts {
            None => dictionary,
            Some(table) => {
                inner_join(&table, &dictionary, CONTRACT_ROW_NUM, CONTRACT_ROW_NUM)?.table
            }
        });
    }
    let mut contracts = match contracts {
        Some(table) => table,
        None => build_batch(vec![])?,
    };

    let extra = assemble(&layout.plain_files(snapshot.dir()), layout.read_header)?;
    for (name, array) in named_columns(&extra) {
        if array.len() != contracts.num_rows() {
            tracing::warn!(
                column = %name,
                rows = array.len(),
                expected = contracts.num_rows(),
                "not adding contract column with mismatched length"
            );
            continue;
        }
        contracts = append_column(&contracts, &name, array)?;
    }

    let dates = select(assets, &[CONTRACT_ROW_NUM, INCEPTION_DATE, EXPIRATION_DATE])?;
    let dates = take_rows(&dates, &first_rows(&dates, CONTRACT_ROW_NUM)?)?;
    let contracts = inner_join(&dates, &contracts, CONTRACT_ROW_NUM, CONTRACT_ROW_NUM)?.table;
    sort_by(&contracts, CONTRACT_ROW_NUM)
}

/// Layers with the row number of their contract, `None` when the snapshot
/// has no layer rows.
pub fn layer_table(snapshot: &Snapshot, contracts: &RecordBatch) -> TableResult<Option<RecordBatch>> {
    let layout = EntityLayout::layers(snapshot);
    let layers = assemble(&layout.plain_files(snapshot.dir()), layout.read_header)?;
    if layers.num_rows() == 0 {
        tracing::debug!(snapshot = %snapshot.key(), "no layer rows");
        return Ok(None);
    }
    let keys = select(contracts, &[CONTRACT_NUMBER, CONTRACT_ROW_NUM])?;
    Ok(Some(
        inner_join(&layers, &keys, CONTRACT_NUMBER, CONTRACT_NUMBER)?.table,
    ))
}

pub fn valuation_table(snapshot: &Snapshot) -> TableResult<RecordBatch> {
    read_entity(snapshot, &EntityLayout::valuations())
}

/// Flat coverage cause-of-loss stream resolved to names, `None` when either
/// file is absent.
pub fn coverage_cause_of_loss(snapshot: &Snapshot) -> TableResult<Option<CauseOfLossEntries>> {
    let Some(ids) = open_optional(&snapshot.path(COVERAGE_CAUSE_OF_LOSS_FILE))? else {
        return Ok(None);
    };
    let Some(id_map) = open_optional(&snapshot.path(CAUSE_OF_LOSS_ID_MAP_FILE))? else {
        return Ok(None);
    };
    let ids = ids.read_array(None)?.value;
    let id_map = id_map.read_key_value_map(None, None)?.value;
    Ok(Some(CauseOfLossEntries::resolve(&ids, &id_map)?))
}

/// Coverage columns with the combined cause-of-loss names and ids of each row.
pub fn coverage_table(snapshot: &Snapshot) -> TableResult<RecordBatch> {
    let coverages = read_entity(snapshot, &EntityLayout::coverages())?;
    if coverages.column_by_name(CAUSE_OF_LOSS_COUNT).is_none() {
        return Ok(coverages);
    }
    match coverage_cause_of_loss(snapshot)? {
        Some(entries) => derive_combined_cause_of_loss(
            &coverages,
            &entries,
            CAUSE_OF_LOSS_COUNT,
            CAUSE_OF_LOSS,
            CAUSE_OF_LOSS_IDS,
        ),
        None => {
            tracing::warn!(
                snapshot = %snapshot.key(),
                "cause of loss files absent, coverages left without names"
            );
            Ok(coverages)
        }
    }
}

/// Every cause-of-loss code referenced by coverages and layers.
pub fn cause_of_loss_codes(snapshot: &Snapshot) -> TableResult<BTreeSet<String>> {
    let mut codes: BTreeSet<String> = coverage_cause_of_loss(snapshot)?
        .map(|entries| entries.names.into_iter().collect())
        .unwrap_or_default();

    let layer_file = format!("data_f_layer_{}_cause_of_loss.bin", snapshot.key());
    if let Some(file) = open_optional(&snapshot.path(&layer_file))? {
        let values = file.read_array(Some(exposure_bin_format::ColumnType::Utf8))?.value;
        codes.extend(layer_cause_of_loss(values.as_string::<i32>().iter()));
    }
    Ok(codes)
}

/// Asset, contract and layer tables of one snapshot.
#[derive(Debug, Clone)]
pub struct ExposureReconstruction {
    pub assets: RecordBatch,
    pub contracts: RecordBatch,
    pub layers: Option<RecordBatch>,
}

impl ExposureReconstruction {
    /// Contract dates are taken from the assets, which then drop them.
    pub fn execute(snapshot: &Snapshot) -> TableResult<Self> {
        let assets = asset_table(snapshot)?;
        let contracts = contract_table(snapshot, &assets)?;
        let assets = remove_column(&assets, EXPIRATION_DATE)?;
        let assets = remove_column(&assets, INCEPTION_DATE)?;
        let layers = layer_table(snapshot, &contracts)?;

        tracing::info!(
            snapshot = %snapshot.key(),
            assets = assets.num_rows(),
            contracts = contracts.num_rows(),
            layers = layers.as_ref().map(|l| l.num_rows()).unwrap_or(0),
            "reconstructed exposure"
        );
        Ok(Self {
            assets,
            contracts,
            layers,
        })
    }
}
