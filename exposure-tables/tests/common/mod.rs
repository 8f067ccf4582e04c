#![allow(dead_code)]

use std::path::{Path, PathBuf};

use exposure_bin_format::{dictionary::encode_v3, Header};
use exposure_tables::Snapshot;
use rmpv::Value;

pub const AUDIT_ID: i64 = 42;
pub const SCHEDULE_ID: i64 = 0;

pub fn packed_date(year: u32, month: u32, day: u32) -> u32 {
    year << 16 | month << 8 | day
}

/// Writes bin files into a temporary snapshot directory.
pub struct SnapshotFixture {
    dir: tempfile::TempDir,
}

impl SnapshotFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.dir.path(), AUDIT_ID, SCHEDULE_ID)
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.path().join(file)
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, file: &str, bytes: Vec<u8>) {
        std::fs::write(self.path(file), bytes).expect("write fixture file");
    }

    /// Payload behind a standard header without a dictionary.
    pub fn headered(&self, file: &str, values: Vec<Value>) {
        let mut bytes = Header::new(0, values.len() as i64, 4, 3).to_bytes().to_vec();
        rmpv::encode::write_value(&mut bytes, &Value::Array(values)).expect("encode payload");
        self.write(file, bytes);
    }

    /// Bare MessagePack array.
    pub fn headerless(&self, file: &str, values: Vec<Value>) {
        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, &Value::Array(values)).expect("encode payload");
        self.write(file, bytes);
    }

    /// Bare MessagePack map.
    pub fn map(&self, file: &str, entries: Vec<(Value, Value)>) {
        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, &Value::Map(entries)).expect("encode map");
        self.write(file, bytes);
    }

    /// Enum column with a version 3 dictionary.
    pub fn enum_v3(&self, file: &str, dictionary: &[&str], indices: &[u64]) {
        let dictionary = encode_v3(dictionary, '_').expect("encode dictionary");
        let mut bytes = Header::new(dictionary.len() as i64, indices.len() as i64, 4, 3)
            .to_bytes()
            .to_vec();
        bytes.extend(dictionary);
        let payload = Value::Array(indices.iter().map(|i| Value::from(*i)).collect());
        rmpv::encode::write_value(&mut bytes, &payload).expect("encode payload");
        self.write(file, bytes);
    }

    pub fn touch(&self, file: &str) {
        self.write(file, b"done".to_vec());
    }
}

pub fn strs(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

pub fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

pub fn floats(values: &[f64]) -> Vec<Value> {
    values.iter().map(|v| Value::F64(*v)).collect()
}

/// Three assets over two contracts, their contract dictionaries and three
/// layers of which one references an unknown contract.
pub fn exposure_fixture() -> SnapshotFixture {
    let fixture = SnapshotFixture::new();
    let key = format!("{}_{}", AUDIT_ID, SCHEDULE_ID);
    let jan = packed_date(2024, 1, 1) as i64;
    let feb = packed_date(2024, 2, 1) as i64;
    let dec = packed_date(2024, 12, 31) as i64;

    fixture.headered("m_latitude.bin", floats(&[34.0, 40.7, 37.8]));
    fixture.headered("m_longitude.bin", floats(&[-118.2, -74.0, -122.4]));
    fixture.headered("m_assetlevelcontractrownum.bin", ints(&[0, 1, 0]));
    fixture.headered("m_asset_name.bin", strs(&["LA office", "NY office", "SF office"]));
    fixture.headered("m_inception_date.bin", ints(&[jan, feb, feb]));
    fixture.headered("m_expiration_date.bin", ints(&[dec, dec, dec]));
    fixture.headered("m_asset_schedule_id.bin", ints(&[10, 11, 10]));
    fixture.headered("m_asset_number.bin", ints(&[100, 101, 102]));
    fixture.headered("m_condition_flood.bin", strs(&["", "FZ1", ""]));
    fixture.enum_v3("m_state_code.bin", &["CA", "NY"], &[0, 1, 4294967295]);

    fixture.map(
        &format!("data_m_asset_schedule_{}_assetschid_to_contractrownum_map.bin", key),
        vec![
            (Value::from(10), Value::from(0)),
            (Value::from(11), Value::from(1)),
        ],
    );
    fixture.map(
        &format!("data_f_contract_{}_assetschname_to_contractrownum_map.bin", key),
        vec![
            (Value::from("Schedule A"), Value::from(0)),
            (Value::from("Schedule B"), Value::from(1)),
        ],
    );
    fixture.map(
        &format!("data_f_contract_{}_contractname_to_contractrownum_map.bin", key),
        vec![
            (Value::from("C-2"), Value::from(1)),
            (Value::from("C-1"), Value::from(0)),
            (Value::from("C-3"), Value::from(2)),
        ],
    );
    fixture.headerless(
        &format!("data_f_contract_{}_cedant_name.bin", key),
        strs(&["Cedant One", "Cedant Two"]),
    );
    fixture.headerless(&format!("data_f_contract_{}_lob.bin", key), strs(&["Property"]));

    fixture.headerless(
        &format!("data_f_layer_{}_contract_number.bin", key),
        strs(&["C-2", "C-1", "C-9"]),
    );
    fixture.headerless(&format!("data_f_layer_{}_layer_number.bin", key), ints(&[1, 2, 3]));
    fixture.headerless(
        &format!("data_f_layer_{}_layer_inception_date.bin", key),
        ints(&[jan, jan, jan]),
    );

    fixture
}

/// Three coverages owning 2, 0 and 3 causes of loss.
pub fn coverage_fixture() -> SnapshotFixture {
    let fixture = SnapshotFixture::new();
    fixture.headerless("data_f_coverage_cause_of_loss_count.bin", ints(&[2, 0, 3]));
    fixture.headerless("data_f_coverage_program_name.bin", strs(&["P1", "P1", "P2"]));
    fixture.headerless("data_f_coverage_coverage_order.bin", ints(&[0, 1, 0]));
    fixture.headerless("data_f_coverage_cause_of_loss.bin", ints(&[11, 12, 13, 14, 15]));
    fixture.map(
        "coltoidmap.bin",
        vec![
            (Value::from("WS"), Value::from(11)),
            (Value::from("HU"), Value::from(12)),
            (Value::from("EQ"), Value::from(13)),
            (Value::from("SH"), Value::from(14)),
            (Value::from("FF"), Value::from(15)),
        ],
    );
    fixture
}
