//! # Signal Graph Core Library
//!
//! A small filter-node graph for waveform processing. Each node ("filter")
//! owns named parameters, zero or more inputs bound to upstream streams, and
//! one or more output streams carrying immutable waveforms. Hosts edit
//! parameters, then call `refresh`; a filter recomputes only when the inputs
//! that determine its output have changed.
//!
//! ## Crate Structure
//!
//! - **`filter`**: the [`Filter`](filter::Filter) trait, the shared
//!   [`FilterBase`](filter::FilterBase) state and [`RefreshStatus`](filter::RefreshStatus).
//! - **`filters`**: concrete filters, including the Touchstone S-parameter importer.
//! - **`touchstone`**: `.sNp` file reader behind the `SParameterLoader` trait.
//! - **`waveform`** / **`stream`**: sample storage and filter outputs.
//! - **`parameter`**: typed, observable filter parameters with constraints.
//! - **`fingerprint`**: change detection used by every refresh.
//! - **`registry`**: creates filters by protocol name.
//! - **`config`**: graph descriptions loaded with `figment`.
//! - **`logging`**: `tracing-subscriber` initialisation for binaries.
//! - **`export`**: CSV and JSON dumps of published streams.
//! - **`error`**: the crate-wide [`FilterError`](error::FilterError).
//! - **`unit`**: physical units and SI pretty-printing.

pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod filters;
pub mod fingerprint;
pub mod logging;
pub mod parameter;
pub mod registry;
pub mod stream;
pub mod touchstone;
pub mod unit;
pub mod waveform;

pub use error::{FilterError, FilterResult};
pub use filter::{Filter, FilterBase, FilterCategory, RefreshStatus};
