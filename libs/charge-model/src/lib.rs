//! Charge Model Library
//!
//! Static description of the supported devices and the value containers
//! that flow between the poller and the formula engine.
//!
//! # Modules
//!
//! - `types`: register encodings, categories, device kinds
//! - `formula`: closed set of formula identifiers and their input keys
//! - `profile`: `RegisterSpec`, `VirtualSpec`, `DeviceProfile`
//! - `profiles`: built-in profile tables
//! - `registry`: load-time validated profile lookup
//! - `snapshot`: per-tick raw values and derived values

pub mod error;
pub mod formula;
pub mod profile;
pub mod profiles;
pub mod registry;
pub mod snapshot;
pub mod types;

pub use error::{ModelError, Result};
pub use formula::Formula;
pub use profile::{DeviceProfile, RegisterSpec, VirtualSpec};
pub use registry::ProfileRegistry;
pub use snapshot::{DerivedSnapshot, DerivedValue, Snapshot};
pub use types::{Category, DeviceKind, Encoding};
