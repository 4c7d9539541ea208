//! Core data model for plate measurement tables.
//!
//! A [`frame::PlateFrame`] is an ordered collection of named, typed columns.
//! Columns store missing values as `None`; the scalar view of a cell is a
//! [`value::Value`], where `Value::Undefined` is the missing value. Frames
//! are immutable value types: every transformation produces a new frame.

pub mod column;
pub mod error;
pub mod frame;
pub mod value;

pub use column::Column;
pub use error::{PlateError, Result};
pub use frame::PlateFrame;
pub use value::{Value, ValueKind};
