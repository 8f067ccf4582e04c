//! Tables reconstructed from exposure snapshots.
//!
//! A snapshot directory holds one bin file per column. [`assemble`] turns a
//! map of column files into an arrow [`RecordBatch`](arrow::record_batch::RecordBatch),
//! [`join`] relates tables through the id-to-row-number dictionary files and
//! [`reconstruct`] builds the asset, contract, layer, coverage and valuation
//! tables of a snapshot using the layouts in [`layout`].

pub mod assemble;
pub mod cause_of_loss;
pub mod dates;
pub mod derived;
pub mod error;
pub mod join;
pub mod layout;
pub mod peril;
pub mod reconstruct;
pub mod util;

pub use error::{TableError, TableResult};
pub use layout::{EntityLayout, Snapshot};
pub use reconstruct::ExposureReconstruction;
