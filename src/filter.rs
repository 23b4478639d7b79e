//! The filter-node abstraction.
//!
//! Every node in the graph implements the flat [`Filter`] trait. Shared state
//! (parameters, streams, inputs, names) lives in a [`FilterBase`] that each
//! concrete filter embeds and exposes through `base()` / `base_mut()`; the
//! trait's provided methods work entirely through it. Concrete filters only
//! supply what actually differs between kinds: input validation, whether
//! configuration is required, naming, and the refresh itself.
//!
//! # Refresh contract
//!
//! ```text
//! host edits parameters / rebinds inputs
//!         │
//!         ▼
//! refresh() ── fingerprint unchanged ──► RefreshStatus::Unchanged
//!         │                               (streams untouched)
//!         ▼
//! store new fingerprint, recompute
//!         │
//!         ├── failure ──► RefreshStatus::Aborted(err)
//!         │               (last good waveforms stay published)
//!         ▼
//! publish fresh waveforms ──► RefreshStatus::Updated
//! ```
//!
//! Refresh takes `&mut self`, so one filter can never be refreshed twice at
//! once or edited mid-refresh. Ordering across filters belongs to the host's
//! scheduler.

use crate::error::{FilterError, FilterResult};
use crate::parameter::{FilterParameter, ParameterValue};
use crate::stream::{Stream, StreamDescriptor, StreamType};
use crate::unit::Unit;
use crate::waveform::WaveformData;
use std::collections::BTreeMap;
use std::fmt;

/// Menu grouping for filter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCategory {
    /// Produces data from a file or generator rather than from inputs
    Generation,
    /// Arithmetic on input waveforms
    Math,
}

/// Outcome of one refresh call.
#[derive(Debug)]
pub enum RefreshStatus {
    /// New waveforms were published.
    Updated,
    /// Fingerprint matched the cache; nothing was touched.
    Unchanged,
    /// Recompute failed; previously published waveforms are still in place.
    Aborted(FilterError),
}

impl RefreshStatus {
    /// True for [`RefreshStatus::Updated`].
    pub fn is_updated(&self) -> bool {
        matches!(self, RefreshStatus::Updated)
    }

    /// The error of an aborted refresh.
    pub fn error(&self) -> Option<&FilterError> {
        match self {
            RefreshStatus::Aborted(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshStatus::Updated => f.write_str("updated"),
            RefreshStatus::Unchanged => f.write_str("unchanged"),
            RefreshStatus::Aborted(err) => write!(f, "aborted: {err}"),
        }
    }
}

// =============================================================================
// FilterBase
// =============================================================================

/// State common to every filter kind.
#[derive(Debug)]
pub struct FilterBase {
    category: FilterCategory,
    parameters: BTreeMap<String, FilterParameter>,
    streams: Vec<Stream>,
    input_names: Vec<String>,
    inputs: Vec<Option<StreamDescriptor>>,
    x_axis_unit: Unit,
    hardware_name: String,
    display_name: String,
}

impl FilterBase {
    /// Base with no parameters, streams or inputs and a femtosecond X axis.
    pub fn new(category: FilterCategory) -> Self {
        Self {
            category,
            parameters: BTreeMap::new(),
            streams: Vec::new(),
            input_names: Vec::new(),
            inputs: Vec::new(),
            x_axis_unit: Unit::Fs,
            hardware_name: String::new(),
            display_name: String::new(),
        }
    }

    /// Menu grouping
    pub fn category(&self) -> FilterCategory {
        self.category
    }

    /// Declare a parameter, keyed by its name.
    pub fn add_parameter(&mut self, param: FilterParameter) {
        self.parameters.insert(param.name().to_string(), param);
    }

    /// Parameter by name.
    pub fn parameter(&self, name: &str) -> FilterResult<&FilterParameter> {
        self.parameters
            .get(name)
            .ok_or_else(|| FilterError::UnknownParameter(name.to_string()))
    }

    /// Mutable parameter by name.
    pub fn parameter_mut(&mut self, name: &str) -> FilterResult<&mut FilterParameter> {
        self.parameters
            .get_mut(name)
            .ok_or_else(|| FilterError::UnknownParameter(name.to_string()))
    }

    /// Parameters in name order.
    pub fn parameters(&self) -> impl Iterator<Item = &FilterParameter> {
        self.parameters.values()
    }

    /// Append a stream and return its index.
    pub fn add_stream(&mut self, unit: Unit, name: impl Into<String>, stream_type: StreamType) -> usize {
        self.streams.push(Stream::new(name, unit, stream_type));
        self.streams.len() - 1
    }

    /// Drop every stream, e.g. before redeclaring the output shape.
    pub fn clear_streams(&mut self) {
        self.streams.clear();
    }

    /// All output streams, by index
    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    /// Output stream `index`
    pub fn stream(&self, index: usize) -> Option<&Stream> {
        self.streams.get(index)
    }

    /// Mutable output stream `index`
    pub fn stream_mut(&mut self, index: usize) -> Option<&mut Stream> {
        self.streams.get_mut(index)
    }

    /// Publish a waveform on stream `index`. Returns false if there is no
    /// such stream.
    pub fn set_data(&mut self, index: usize, data: WaveformData) -> bool {
        match self.streams.get_mut(index) {
            Some(stream) => {
                stream.publish(data);
                true
            }
            None => false,
        }
    }

    /// Declare an input slot and return its index.
    pub fn create_input(&mut self, name: impl Into<String>) -> usize {
        self.input_names.push(name.into());
        self.inputs.push(None);
        self.inputs.len() - 1
    }

    /// Number of input slots
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Label of input slot `index`
    pub fn input_name(&self, index: usize) -> Option<&str> {
        self.input_names.get(index).map(String::as_str)
    }

    /// Stream currently bound to input `index`.
    pub fn input(&self, index: usize) -> Option<&StreamDescriptor> {
        self.inputs.get(index).and_then(Option::as_ref)
    }

    fn bind_input(&mut self, index: usize, stream: Option<StreamDescriptor>) {
        if let Some(slot) = self.inputs.get_mut(index) {
            *slot = stream;
        }
    }

    /// Unit of the waveform X axis
    pub fn x_axis_unit(&self) -> Unit {
        self.x_axis_unit
    }

    /// Set the unit of the waveform X axis
    pub fn set_x_axis_unit(&mut self, unit: Unit) {
        self.x_axis_unit = unit;
    }

    /// Stable generated name
    pub fn hardware_name(&self) -> &str {
        &self.hardware_name
    }

    /// Name shown to users
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Set both the internal and the displayed name.
    pub fn set_names(&mut self, name: impl Into<String>) {
        self.hardware_name = name.into();
        self.display_name = self.hardware_name.clone();
    }

    /// Override the displayed name only.
    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.display_name = name.into();
    }
}

// =============================================================================
// Filter trait
// =============================================================================

/// A node in the processing graph.
pub trait Filter: Send {
    /// Shared filter state.
    fn base(&self) -> &FilterBase;

    /// Shared filter state, mutably.
    fn base_mut(&mut self) -> &mut FilterBase;

    /// Name of this filter kind, also its registry key.
    fn protocol_name(&self) -> &'static str;

    /// Whether `stream` may be connected to input `index`.
    fn validate_channel(&self, index: usize, stream: &StreamDescriptor) -> bool;

    /// Whether the filter cannot produce meaningful output until the user
    /// supplies parameters. Hosts use it to prompt before the first refresh.
    fn needs_config(&self) -> bool;

    /// Recompute every stream from the current parameters and inputs.
    ///
    /// Must return without touching any stream when the fingerprint is
    /// unchanged, and must leave the last good output published on failure.
    fn refresh(&mut self) -> RefreshStatus;

    /// Derive the filter's name from its current parameters.
    fn set_default_name(&mut self);

    /// Forget the cached fingerprint.
    fn invalidate_cache(&mut self);

    /// Called after input `index` has been rebound. Filters whose output
    /// shape follows their inputs redeclare streams here.
    fn on_input_changed(&mut self, _index: usize) {}

    /// Refresh even if nothing relevant changed.
    fn force_refresh(&mut self) -> RefreshStatus {
        self.invalidate_cache();
        self.refresh()
    }

    /// Parameter by name.
    fn get_parameter(&self, name: &str) -> FilterResult<&FilterParameter> {
        self.base().parameter(name)
    }

    /// Set a declared parameter. Does not refresh.
    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> FilterResult<()> {
        self.base_mut().parameter_mut(name)?.set(value)
    }

    /// Apply every entry of `table` as a parameter value. Stops at the first
    /// rejected entry; earlier entries stay applied.
    fn load_parameters(&mut self, table: &toml::Table) -> FilterResult<()> {
        for (name, raw) in table {
            let value = ParameterValue::from_toml(raw).ok_or_else(|| {
                FilterError::Configuration(format!("unsupported value for parameter '{name}'"))
            })?;
            self.set_parameter(name, value)?;
        }
        Ok(())
    }

    /// Current parameter values as a TOML table, loadable by
    /// [`Filter::load_parameters`].
    fn serialize_parameters(&self) -> toml::Table {
        self.base()
            .parameters()
            .map(|p| (p.name().to_string(), p.get().to_toml()))
            .collect()
    }

    /// Connect an upstream stream to input `index`.
    fn set_input(&mut self, index: usize, stream: StreamDescriptor) -> FilterResult<()> {
        if index >= self.base().input_count() {
            return Err(FilterError::InputRejected {
                index,
                reason: format!("{} has no input {index}", self.protocol_name()),
            });
        }
        if !self.validate_channel(index, &stream) {
            return Err(FilterError::InputRejected {
                index,
                reason: format!("{} is not acceptable here", stream.label()),
            });
        }
        self.base_mut().bind_input(index, Some(stream));
        self.on_input_changed(index);
        Ok(())
    }

    /// Disconnect input `index`.
    fn clear_input(&mut self, index: usize) {
        self.base_mut().bind_input(index, None);
        self.on_input_changed(index);
    }

    /// Number of output streams.
    fn stream_count(&self) -> usize {
        self.base().streams().len()
    }

    /// Waveform published on stream `index`.
    fn data(&self, index: usize) -> Option<&WaveformData> {
        self.base().stream(index).and_then(Stream::data)
    }

    /// Snapshot of stream `index` for connecting to a downstream filter.
    fn descriptor(&self, index: usize) -> Option<StreamDescriptor> {
        let base = self.base();
        base.stream(index)
            .map(|s| StreamDescriptor::new(base.display_name(), index, s, base.x_axis_unit()))
    }

    /// Unit of the X axis of every output.
    fn x_axis_unit(&self) -> Unit {
        self.base().x_axis_unit()
    }

    /// Name shown to users.
    fn display_name(&self) -> &str {
        self.base().display_name()
    }

    /// Display offset of stream `index`; 0 for unknown streams.
    fn get_offset(&self, stream: usize) -> f32 {
        self.base().stream(stream).map_or(0.0, Stream::offset)
    }

    /// Set the display offset of a stream. Ignored for unknown streams.
    fn set_offset(&mut self, stream: usize, offset: f32) {
        if let Some(s) = self.base_mut().stream_mut(stream) {
            s.set_offset(offset);
        }
    }

    /// Full-scale display range of stream `index`; 0 for unknown streams.
    fn get_voltage_range(&self, stream: usize) -> f32 {
        self.base().stream(stream).map_or(0.0, Stream::range)
    }

    /// Set the full-scale display range of a stream. Ignored for unknown streams.
    fn set_voltage_range(&mut self, stream: usize, range: f32) {
        if let Some(s) = self.base_mut().stream_mut(stream) {
            s.set_range(range);
        }
    }
}
