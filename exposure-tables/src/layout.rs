//! Where each entity's columns live inside a snapshot directory.
//!
//! Built-in layouts cover the files the exposure producer writes. Callers can
//! describe other entities with the same structure in JSON:
//!
//! ```json
//! {
//!     "columns": { "Latitude": { "file": "m_latitude.bin", "convert_to": "float32" } },
//!     "enums": { "State": "m_state_code.bin" },
//!     "dictionaries": [],
//!     "read_header": true
//! }
//! ```

use std::path::{Path, PathBuf};

use exposure_bin_format::ColumnType;
use exposure_config::Config;
use indexmap::IndexMap;

use crate::{
    assemble::{EnumColumnFiles, PlainColumnFiles},
    error::{TableError, TableResult},
};

pub mod names {
    pub const LATITUDE: &str = "Latitude";
    pub const LONGITUDE: &str = "Longitude";
    pub const ASSET_NAME: &str = "Asset Name";
    pub const ASSET_NUMBER: &str = "Asset Number";
    pub const ASSET_SCHEDULE_ID: &str = "Asset Schedule Id";
    pub const ASSET_ROW: &str = "Asset Row";
    pub const INCEPTION_DATE: &str = "Inception Date";
    pub const EXPIRATION_DATE: &str = "Expiration Date";
    pub const STATE: &str = "State";
    pub const COUNTRY: &str = "Country";
    pub const ZIPCODE: &str = "Zipcode";
    pub const COUNTY: &str = "County";
    pub const CITY: &str = "City";
    pub const CRESTA: &str = "Cresta";
    pub const OCCUPANCY: &str = "Occupancy";
    pub const GEOCODED_RESOLUTION: &str = "Geocoded Resolution";

    pub const CONTRACT_ROW_NUM: &str = "Contract Row Num";
    pub const CONTRACT_NUMBER: &str = "Contract Number";
    pub const COVERED_ASSET_SCHEDULE_NAME: &str = "Covered Asset Schedule Name";
    pub const CEDANT_NAME: &str = "Cedant Name";
    pub const LOB: &str = "LOB";
    pub const PRODUCER: &str = "Producer";

    pub const LAYER_INCEPTION_DATE: &str = "Layer Inception Date";
    pub const LAYER_EXPIRATION_DATE: &str = "Layer Expiration Date";
    pub const LAYER_NUMBER: &str = "Layer Number";

    pub const CAUSE_OF_LOSS_COUNT: &str = "Cause Of Loss Count";
    pub const CAUSE_OF_LOSS: &str = "Cause Of Loss";
    pub const CAUSE_OF_LOSS_IDS: &str = "Cause Of Loss Ids";
    pub const COVERAGE_ORDER: &str = "Coverage Order";
    pub const PROGRAM_NAME: &str = "Program Name";
    pub const DEDUCTIBLE: &str = "Deductible";
    pub const MIN_DEDUCTIBLE: &str = "Min Deductible";
    pub const MAX_DEDUCTIBLE: &str = "Max Deductible";
    pub const CONDITION_NAME: &str = "Condition Name";
    pub const TERM_TYPE: &str = "Term Type";

    pub const TIV: &str = "TIV";
    pub const VALUATION_DATE: &str = "Valuation Date";
    pub const VALUATION_CURRENCY_CODE: &str = "Valuation Currency Code";
}

pub const COVERAGE_CAUSE_OF_LOSS_FILE: &str = "data_f_coverage_cause_of_loss.bin";
pub const CAUSE_OF_LOSS_ID_MAP_FILE: &str = "coltoidmap.bin";
pub const COVERAGE_SECTION_NAME_FILE: &str = "data_f_coverage_section_name.bin";
pub const COVERAGE_LAYER_NUMBER_FILE: &str = "data_f_coverage_layer_number.bin";
pub const DONE_MARKER_FILE: &str = "done.txt";

/// The bin files of one `(audit_id, schedule_id)` export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    dir: PathBuf,
    audit_id: i64,
    schedule_id: i64,
}

impl Snapshot {
    pub fn new<P: Into<PathBuf>>(dir: P, audit_id: i64, schedule_id: i64) -> Self {
        Self {
            dir: dir.into(),
            audit_id,
            schedule_id,
        }
    }

    pub fn from_config(config: &Config, audit_id: i64, schedule_id: i64) -> Self {
        Self::new(config.snapshot_dir(audit_id, schedule_id), audit_id, schedule_id)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn audit_id(&self) -> i64 {
        self.audit_id
    }

    pub fn schedule_id(&self) -> i64 {
        self.schedule_id
    }

    /// `"{audit_id}_{schedule_id}"`, embedded in contract and layer file names.
    pub fn key(&self) -> String {
        format!("{}_{}", self.audit_id, self.schedule_id)
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Present once the snapshot was fully downloaded and unpacked.
    pub fn done_marker(&self) -> PathBuf {
        self.path(DONE_MARKER_FILE)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColumnSpec {
    pub file: String,
    #[serde(default)]
    pub convert_to: Option<ColumnType>,
}

/// A whole-file key/value map exposed as two named columns.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DictionarySpec {
    pub file: String,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub key_type: Option<ColumnType>,
    #[serde(default)]
    pub value_type: Option<ColumnType>,
}

fn default_read_header() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EntityLayout {
    #[serde(default)]
    pub columns: IndexMap<String, ColumnSpec>,
    #[serde(default)]
    pub enums: IndexMap<String, String>,
    #[serde(default)]
    pub dictionaries: Vec<DictionarySpec>,
    /// Whether plain columns may carry the standard header.
    #[serde(default = "default_read_header")]
    pub read_header: bool,
}

impl Default for EntityLayout {
    fn default() -> Self {
        Self {
            columns: IndexMap::new(),
            enums: IndexMap::new(),
            dictionaries: Vec::new(),
            read_header: default_read_header(),
        }
    }
}

impl EntityLayout {
    pub fn from_json_str(json: &str) -> TableResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> TableResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| TableError::LayoutReadError(path.to_path_buf(), e))?;
        Self::from_json_str(&json)
    }

    pub fn with_column(
        mut self,
        name: &str,
        file: impl Into<String>,
        convert_to: Option<ColumnType>,
    ) -> Self {
        self.columns.insert(
            name.to_string(),
            ColumnSpec {
                file: file.into(),
                convert_to,
            },
        );
        self
    }

    pub fn with_enum(mut self, name: &str, file: impl Into<String>) -> Self {
        self.enums.insert(name.to_string(), file.into());
        self
    }

    pub fn with_dictionary(
        mut self,
        file: impl Into<String>,
        key: &str,
        value: &str,
        key_type: Option<ColumnType>,
        value_type: Option<ColumnType>,
    ) -> Self {
        self.dictionaries.push(DictionarySpec {
            file: file.into(),
            key: key.to_string(),
            value: value.to_string(),
            key_type,
            value_type,
        });
        self
    }

    pub fn with_read_header(mut self, read_header: bool) -> Self {
        self.read_header = read_header;
        self
    }

    pub fn plain_files(&self, dir: &Path) -> PlainColumnFiles {
        self.columns
            .iter()
            .map(|(name, spec)| (name.clone(), (dir.join(&spec.file), spec.convert_to)))
            .collect()
    }

    pub fn enum_files(&self, dir: &Path) -> EnumColumnFiles {
        self.enums
            .iter()
            .map(|(name, file)| (name.clone(), dir.join(file)))
            .collect()
    }

    /// Asset columns. Condition columns are discovered from the snapshot
    /// directory and named after their file stem without the `m_` prefix.
    pub fn assets(snapshot: &Snapshot) -> TableResult<Self> {
        use names::*;

        let mut layout = Self::default()
            .with_column(LATITUDE, "m_latitude.bin", Some(ColumnType::Float32))
            .with_column(LONGITUDE, "m_longitude.bin", Some(ColumnType::Float32))
            .with_column(
                CONTRACT_ROW_NUM,
                "m_assetlevelcontractrownum.bin",
                Some(ColumnType::UInt32),
            )
            .with_column(ASSET_NAME, "m_asset_name.bin", None)
            .with_column(INCEPTION_DATE, "m_inception_date.bin", Some(ColumnType::UInt32))
            .with_column(EXPIRATION_DATE, "m_expiration_date.bin", Some(ColumnType::UInt32))
            .with_column(
                ASSET_SCHEDULE_ID,
                "m_asset_schedule_id.bin",
                Some(ColumnType::UInt32),
            )
            .with_column(ASSET_NUMBER, "m_asset_number.bin", Some(ColumnType::UInt64));

        for file in condition_files(snapshot.dir())? {
            if let Some(name) = file.strip_prefix("m_").and_then(|f| f.strip_suffix(".bin")) {
                let name = name.to_string();
                layout = layout.with_column(&name, file.clone(), None);
            }
        }

        Ok(layout
            .with_enum(STATE, "m_state_code.bin")
            .with_enum(COUNTRY, "m_country_code.bin")
            .with_enum(ZIPCODE, "m_zipcode.bin")
            .with_enum(COUNTY, "m_county_code.bin")
            .with_enum(CITY, "m_city.bin")
            .with_enum(CRESTA, "m_cresta.bin")
            .with_enum(OCCUPANCY, "m_occupancy_code.bin")
            .with_enum(GEOCODED_RESOLUTION, "m_geocoded_resolution_code.bin"))
    }

    /// Contract dictionaries (all keyed by row number) and the headerless
    /// per-contract columns.
    pub fn contracts(snapshot: &Snapshot) -> Self {
        use names::*;

        let key = snapshot.key();
        let prefix = format!("data_f_contract_{}", key);
        Self::default()
            .with_read_header(false)
            .with_dictionary(
                format!("data_m_asset_schedule_{}_assetschid_to_contractrownum_map.bin", key),
                ASSET_SCHEDULE_ID,
                CONTRACT_ROW_NUM,
                Some(ColumnType::UInt32),
                Some(ColumnType::UInt32),
            )
            .with_dictionary(
                format!("{}_assetschname_to_contractrownum_map.bin", prefix),
                COVERED_ASSET_SCHEDULE_NAME,
                CONTRACT_ROW_NUM,
                None,
                Some(ColumnType::UInt32),
            )
            .with_dictionary(
                format!("{}_contractname_to_contractrownum_map.bin", prefix),
                CONTRACT_NUMBER,
                CONTRACT_ROW_NUM,
                None,
                Some(ColumnType::UInt32),
            )
            .with_column(CEDANT_NAME, format!("{}_cedant_name.bin", prefix), None)
            .with_column(LOB, format!("{}_lob.bin", prefix), None)
            .with_column(PRODUCER, format!("{}_producer.bin", prefix), None)
    }

    /// Layer columns, files named after the lower-cased column name.
    pub fn layers(snapshot: &Snapshot) -> Self {
        use names::*;

        let prefix = format!("data_f_layer_{}", snapshot.key());
        [
            (LAYER_INCEPTION_DATE, Some(ColumnType::UInt32)),
            (LAYER_EXPIRATION_DATE, Some(ColumnType::UInt32)),
            (LAYER_NUMBER, None),
            (LOB, None),
            (CONTRACT_NUMBER, None),
        ]
        .into_iter()
        .fold(Self::default().with_read_header(false), |layout, (name, convert_to)| {
            let file = format!("{}_{}.bin", prefix, name.to_lowercase().replace(' ', "_"));
            layout.with_column(name, file, convert_to)
        })
    }

    pub fn coverages() -> Self {
        use names::*;

        Self::default()
            .with_column(
                CAUSE_OF_LOSS_COUNT,
                "data_f_coverage_cause_of_loss_count.bin",
                Some(ColumnType::UInt32),
            )
            .with_column(COVERAGE_ORDER, "data_f_coverage_coverage_order.bin", None)
            .with_column(PROGRAM_NAME, "data_f_coverage_program_name.bin", None)
            .with_column(DEDUCTIBLE, "data_f_coverage_deductible_value.bin", None)
            .with_column(MIN_DEDUCTIBLE, "data_f_coverage_min_deductible_value.bin", None)
            .with_column(MAX_DEDUCTIBLE, "data_f_coverage_max_deductible_value.bin", None)
            .with_column(CONDITION_NAME, "data_f_coverage_condition_name.bin", None)
            .with_column(TERM_TYPE, "data_f_coverage_term_type.bin", Some(ColumnType::Int64))
            .with_column(LAYER_NUMBER, COVERAGE_LAYER_NUMBER_FILE, Some(ColumnType::Int32))
    }

    pub fn valuations() -> Self {
        use names::*;

        Self::default()
            .with_enum(ASSET_SCHEDULE_ID, "f_asset_schedule_id.bin")
            .with_enum(ASSET_NUMBER, "f_asset_number.bin")
            .with_enum(VALUATION_DATE, "f_valuation_date.bin")
            .with_enum(TIV, "f_tiv.bin")
            .with_enum(VALUATION_CURRENCY_CODE, "f_valuation_currency_code.bin")
    }
}

/// File names of `m_condition*.bin` in `dir`, sorted.
fn condition_files(dir: &Path) -> TableResult<Vec<String>> {
    let pattern = dir.join("m_condition*.bin");
    let mut files: Vec<String> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(Result::ok)
        .filter_map(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_key_and_paths() {
        let snapshot = Snapshot::new("/data/prod/77_0", 77, 0);
        assert_eq!(snapshot.key(), "77_0");
        assert_eq!(snapshot.done_marker(), PathBuf::from("/data/prod/77_0/done.txt"));
    }

    #[test]
    fn snapshot_from_config() {
        let config = Config {
            data_dir: PathBuf::from("/srv/exposure"),
            env: "Alpha".to_string(),
            log_level: "info".to_string(),
        };
        let snapshot = Snapshot::from_config(&config, 12, 3);
        assert_eq!(snapshot.dir(), Path::new("/srv/exposure/alpha/12_3"));
        assert_eq!(snapshot.key(), "12_3");
    }

    #[test]
    fn layer_files_use_lowercase_names() {
        let layout = EntityLayout::layers(&Snapshot::new("/tmp", 5, 0));
        assert_eq!(
            layout.columns[names::LAYER_INCEPTION_DATE].file,
            "data_f_layer_5_0_layer_inception_date.bin"
        );
        assert_eq!(layout.columns[names::LOB].file, "data_f_layer_5_0_lob.bin");
        assert!(!layout.read_header);
    }

    #[test]
    fn contract_dictionaries_embed_the_key() {
        let layout = EntityLayout::contracts(&Snapshot::new("/tmp", 9, 2));
        let files: Vec<&str> = layout.dictionaries.iter().map(|d| d.file.as_str()).collect();
        assert_eq!(
            files,
            vec![
                "data_m_asset_schedule_9_2_assetschid_to_contractrownum_map.bin",
                "data_f_contract_9_2_assetschname_to_contractrownum_map.bin",
                "data_f_contract_9_2_contractname_to_contractrownum_map.bin",
            ]
        );
    }

    #[test]
    fn asset_layout_discovers_condition_columns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("m_condition_b.bin"), [0x90]).unwrap();
        std::fs::write(dir.path().join("m_condition_a.bin"), [0x90]).unwrap();
        std::fs::write(dir.path().join("m_other.bin"), [0x90]).unwrap();

        let layout = EntityLayout::assets(&Snapshot::new(dir.path(), 1, 0)).unwrap();
        let names: Vec<&String> = layout.columns.keys().collect();
        assert!(names.contains(&&"condition_a".to_string()));
        assert!(names.contains(&&"condition_b".to_string()));
        assert!(!names.contains(&&"other".to_string()));
        assert_eq!(layout.enums.len(), 8);
    }

    #[test]
    fn parses_json_layout_in_order() {
        let layout = EntityLayout::from_json_str(
            r#"{
                "columns": {
                    "Zeta": { "file": "z.bin", "convert_to": "uint32" },
                    "Alpha": { "file": "a.bin" }
                },
                "enums": { "State": "m_state_code.bin" }
            }"#,
        )
        .unwrap();

        let names: Vec<&str> = layout.columns.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
        assert_eq!(layout.columns["Zeta"].convert_to, Some(ColumnType::UInt32));
        assert!(layout.read_header);

        let files = layout.plain_files(Path::new("/snap"));
        assert_eq!(files["Alpha"], (PathBuf::from("/snap/a.bin"), None));
    }

    #[test]
    fn loads_layout_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valuations.json");
        std::fs::write(
            &path,
            r#"{ "enums": { "TIV": "f_tiv.bin" }, "read_header": false }"#,
        )
        .unwrap();

        let layout = EntityLayout::from_path(&path).unwrap();
        assert!(layout.columns.is_empty());
        assert_eq!(layout.enums["TIV"], "f_tiv.bin");
        assert!(!layout.read_header);
    }

    #[test]
    fn missing_layout_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = EntityLayout::from_path(&path).unwrap_err();
        assert!(matches!(err, TableError::LayoutReadError(ref p, _) if *p == path));
    }

    #[test]
    fn bad_json_is_a_parse_error() {
        let err = EntityLayout::from_json_str("{\"columns\": 3}").unwrap_err();
        assert!(matches!(err, TableError::LayoutParseError(_)));
    }
}
