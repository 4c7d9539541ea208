//! Raw result-file loading.
//!
//! An analysis result is addressed by a base path without extension and may
//! exist as one of three interchangeable serializations: the `.pfb` binary
//! columnar format, comma-delimited `.csv`, or tab-delimited `.tsv`. The
//! [`reader`] module probes them in that order and applies the post-load
//! normalization every downstream stage relies on (null-only columns retyped
//! to Float, 64-bit numerics narrowed to 32-bit width).

pub mod columnar;
pub mod delimited;
pub mod reader;

pub use reader::{read_table, ReadOptions};
