//! Concrete filter kinds.
//!
//! - [`TouchstoneImportFilter`]: S-parameter import from `.sNp` files
//! - [`ScaleFilter`]: multiplies an analog stream by a constant

pub mod scale;
pub mod touchstone_import;

pub use scale::ScaleFilter;
pub use touchstone_import::{ImportFingerprint, ImportState, TouchstoneImportFilter};
