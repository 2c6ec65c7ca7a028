//! charge-calc - register decoding and derived values
//!
//! # Features
//!
//! - **Decoder**: raw Modbus words to physical values (uint16, int16, uint32, scale)
//! - **Formula functions**: capacity packing, percentages, byte splits, alarm and state labels
//! - **Engine**: evaluates a profile's virtual specs over one snapshot, in declaration order
//!
//! Every function takes and returns `Option`, with `None` as the absent marker.
//!
//! # Example
//!
//! ```rust
//! use charge_calc::functions::{combine_capacity, percentage};
//!
//! let cap = combine_capacity(Some(100.0), Some(50.0));
//! assert!((cap.unwrap() - 13107.3).abs() < 1e-9);
//! assert_eq!(percentage(Some(50.0), Some(0.0)), None);
//! ```

pub mod decoder;
pub mod engine;
pub mod error;
pub mod functions;

pub use decoder::{combine_u32, decode_register, to_int16};
pub use engine::FormulaEngine;
pub use error::{CalcError, Result};
