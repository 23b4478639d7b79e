//! Constant-gain filter.
//!
//! Multiplies every sample of one analog input by the `Scale` parameter.
//! Axis, timing and metadata are carried over unchanged, as are the input's
//! Y and X units.

use crate::error::FilterError;
use crate::filter::{Filter, FilterBase, FilterCategory, RefreshStatus};
use crate::fingerprint::FingerprintCache;
use crate::parameter::{FilterParameter, ParameterType};
use crate::stream::{StreamDescriptor, StreamType};
use crate::unit::Unit;
use crate::waveform::AnalogWaveform;
use std::sync::Arc;
use tracing::{debug, warn};

/// Gain parameter.
pub const SCALE_PARAM: &str = "Scale";

/// Input waveform identity plus gain.
#[derive(Debug, Clone)]
struct ScaleFingerprint {
    input: Option<Arc<AnalogWaveform>>,
    scale: f64,
}

impl PartialEq for ScaleFingerprint {
    fn eq(&self, other: &Self) -> bool {
        let same_input = match (&self.input, &other.input) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_input && self.scale.to_bits() == other.scale.to_bits()
    }
}

/// Filter producing `input * Scale`.
pub struct ScaleFilter {
    base: FilterBase,
    cache: FingerprintCache<ScaleFingerprint>,
}

impl Default for ScaleFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ScaleFilter {
    /// Unconnected filter with a gain of 1.
    pub fn new() -> Self {
        let mut base = FilterBase::new(FilterCategory::Math);
        base.add_parameter(
            FilterParameter::new(SCALE_PARAM, ParameterType::Float, Unit::Counts)
                .with_value(1.0)
                .with_description("Multiplier applied to every sample"),
        );
        base.create_input("in");
        base.add_stream(Unit::Volts, "data", StreamType::Analog);

        let mut filter = Self {
            base,
            cache: FingerprintCache::new(),
        };
        filter.set_default_name();
        filter
    }

    fn scale(&self) -> f64 {
        self.base
            .parameter(SCALE_PARAM)
            .map_or(1.0, FilterParameter::float_val)
    }

    fn input_waveform(&self) -> Option<Arc<AnalogWaveform>> {
        let data = self.base.input(0)?.data()?;
        data.as_analog().cloned()
    }
}

impl Filter for ScaleFilter {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut FilterBase {
        &mut self.base
    }

    fn protocol_name(&self) -> &'static str {
        "Scale"
    }

    fn validate_channel(&self, index: usize, stream: &StreamDescriptor) -> bool {
        index == 0 && stream.stream_type == StreamType::Analog
    }

    fn needs_config(&self) -> bool {
        false
    }

    fn on_input_changed(&mut self, _index: usize) {
        let (unit, x_unit) = match self.base.input(0) {
            Some(d) => (d.y_unit, d.x_unit),
            None => (Unit::Volts, Unit::Fs),
        };
        self.base.clear_streams();
        self.base.add_stream(unit, "data", StreamType::Analog);
        self.base.set_x_axis_unit(x_unit);
        self.cache.invalidate();
        self.set_default_name();
    }

    fn refresh(&mut self) -> RefreshStatus {
        let fp = ScaleFingerprint {
            input: self.input_waveform(),
            scale: self.scale(),
        };

        if !self.cache.update(fp.clone()) {
            debug!(filter = %self.base.display_name(), "Scale unchanged");
            return RefreshStatus::Unchanged;
        }

        let Some(input) = fp.input else {
            let err = FilterError::Configuration("no analog input connected".to_string());
            warn!(filter = %self.base.display_name(), error = %err, "Scale refresh aborted");
            return RefreshStatus::Aborted(err);
        };

        let gain = fp.scale as f32;
        let mut out = AnalogWaveform::with_capacity(input.metadata, input.len());
        out.dense_packed = input.dense_packed;
        for (offset, duration, sample) in input.iter() {
            out.push(offset, duration, sample * gain);
        }

        self.base.set_data(0, out.into());
        RefreshStatus::Updated
    }

    fn set_default_name(&mut self) {
        let name = match self.base.input(0) {
            Some(d) => format!("Scale({})", d.label()),
            None => "Scale".to_string(),
        };
        self.base.set_names(name);
    }

    fn invalidate_cache(&mut self) {
        self.cache.invalidate();
    }
}
