//! Touchstone S-parameter importer.
//!
//! Loads one `.sNp` file and republishes a single S<dst><src> parameter as
//! two analog streams over a frequency axis:
//!
//! | index | name    | unit    | sample                       |
//! |-------|---------|---------|------------------------------|
//! | 0     | `mag`   | dB      | `20·log10(amplitude)`        |
//! | 1     | `angle` | degrees | `phase_radians · 180/π`      |
//!
//! The file is only reloaded when the file name or either port changes.
//! Frequency points need not be evenly spaced, so the waveforms are sparse
//! and each sample's duration is the gap to the next point.

use crate::error::{FilterError, FilterResult};
use crate::filter::{Filter, FilterBase, FilterCategory, RefreshStatus};
use crate::fingerprint::FingerprintCache;
use crate::parameter::{FilterParameter, ParameterType};
use crate::stream::{StreamDescriptor, StreamType};
use crate::touchstone::{SParameterLoader, SParameterPoint, SParameters, TouchstoneParser};
use crate::unit::Unit;
use crate::waveform::{AnalogWaveform, WaveformMetadata};
use std::path::Path;
use tracing::{debug, info, warn};

/// Parameter holding the path of the file to import.
pub const FILE_PARAM: &str = "Touchstone File";
/// 1-based port the stimulus is applied to.
pub const SOURCE_PORT_PARAM: &str = "Source Port";
/// 1-based port the response is measured at.
pub const DEST_PORT_PARAM: &str = "Dest Port";

const MAG_STREAM: usize = 0;
const ANGLE_STREAM: usize = 1;

/// Inputs that fully determine the importer's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFingerprint {
    /// Path of the file to import
    pub file_name: String,
    /// 1-based stimulus port
    pub src_port: i64,
    /// 1-based response port
    pub dst_port: i64,
}

/// Where the importer stands relative to its current parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    /// No successful load matches the last attempted parameters; any
    /// published output is from an earlier configuration.
    Unconfigured,
    /// Published output matches the current parameters.
    CachedValid,
    /// Parameters changed since the last refresh.
    Stale,
}

/// Filter that imports one S-parameter from a Touchstone file.
pub struct TouchstoneImportFilter {
    base: FilterBase,
    loader: Box<dyn SParameterLoader>,
    cache: FingerprintCache<ImportFingerprint>,
    /// Fingerprint of the output currently published
    published: Option<ImportFingerprint>,
}

impl Default for TouchstoneImportFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TouchstoneImportFilter {
    /// Importer reading files with [`TouchstoneParser`].
    pub fn new() -> Self {
        Self::with_loader(Box::new(TouchstoneParser::new()))
    }

    /// Importer reading files with a custom loader.
    pub fn with_loader(loader: Box<dyn SParameterLoader>) -> Self {
        let mut base = FilterBase::new(FilterCategory::Generation);

        base.add_parameter(
            FilterParameter::new(FILE_PARAM, ParameterType::Filename, Unit::Counts)
                .with_file_filter("*.s*p", "Touchstone S-parameter files (*.s*p)"),
        );
        base.add_parameter(
            FilterParameter::new(SOURCE_PORT_PARAM, ParameterType::Int, Unit::Counts)
                .with_value(1)
                .with_min(1.0),
        );
        base.add_parameter(
            FilterParameter::new(DEST_PORT_PARAM, ParameterType::Int, Unit::Counts)
                .with_value(2)
                .with_min(1.0),
        );

        base.clear_streams();
        base.add_stream(Unit::Db, "mag", StreamType::Analog);
        base.add_stream(Unit::Degrees, "angle", StreamType::Analog);
        base.set_x_axis_unit(Unit::Hz);

        let mut filter = Self {
            base,
            loader,
            cache: FingerprintCache::new(),
            published: None,
        };
        filter.set_voltage_range(MAG_STREAM, 80.0);
        filter.set_offset(MAG_STREAM, 40.0);
        filter.set_voltage_range(ANGLE_STREAM, 370.0);
        filter.set_offset(ANGLE_STREAM, 0.0);
        filter.set_default_name();
        filter
    }

    /// Fingerprint of the current parameter values.
    pub fn fingerprint(&self) -> ImportFingerprint {
        let base = &self.base;
        ImportFingerprint {
            file_name: base.parameter(FILE_PARAM).map(FilterParameter::text).unwrap_or_default(),
            src_port: base.parameter(SOURCE_PORT_PARAM).map_or(0, FilterParameter::int_val),
            dst_port: base.parameter(DEST_PORT_PARAM).map_or(0, FilterParameter::int_val),
        }
    }

    /// Fingerprint the last refresh committed to.
    pub fn cached_fingerprint(&self) -> Option<&ImportFingerprint> {
        self.cache.cached()
    }

    /// Current [`ImportState`], derived from the cache and the published output.
    pub fn state(&self) -> ImportState {
        let current = self.fingerprint();
        if !self.cache.matches(&current) {
            ImportState::Stale
        } else if self.published.as_ref() == Some(&current) {
            ImportState::CachedValid
        } else {
            ImportState::Unconfigured
        }
    }

    fn import(&mut self, fp: &ImportFingerprint) -> FilterResult<()> {
        if fp.file_name.is_empty() {
            return Err(FilterError::Configuration("no Touchstone file selected".to_string()));
        }

        let path = Path::new(&fp.file_name);
        let params = self.loader.load(path)?;
        let points = select(&params, fp.dst_port, fp.src_port)?;

        let (mag, angle) = build_waveforms(&params, points, path)?;
        self.base.set_data(MAG_STREAM, mag.into());
        self.base.set_data(ANGLE_STREAM, angle.into());
        Ok(())
    }
}

/// Validates both ports against the loaded matrix and returns S<dst><src>.
fn select(params: &SParameters, dst: i64, src: i64) -> FilterResult<&[SParameterPoint]> {
    let available = params.port_count();
    let to_index = |port: i64| {
        usize::try_from(port)
            .ok()
            .filter(|&p| p >= 1 && p <= available)
            .ok_or_else(|| FilterError::Range { port, available })
    };
    let src = to_index(src)?;
    let dst = to_index(dst)?;

    params.get(dst, src).ok_or_else(|| FilterError::Range {
        port: dst as i64,
        available,
    })
}

/// Builds fresh magnitude and angle waveforms for `points`.
///
/// Frequencies must round into an `i64` offset; loaders other than
/// [`TouchstoneParser`] are not trusted to have checked.
fn build_waveforms(
    params: &SParameters,
    points: &[SParameterPoint],
    path: &Path,
) -> FilterResult<(AnalogWaveform, AnalogWaveform)> {
    let metadata = WaveformMetadata {
        timescale: 1,
        start_timestamp: params.timestamp.seconds,
        start_femtoseconds: params.timestamp.femtoseconds,
        trigger_phase: 0,
    };

    let mut mag = AnalogWaveform::with_capacity(metadata, points.len());
    let mut angle = AnalogWaveform::with_capacity(metadata, points.len());

    for point in points {
        let offset = frequency_offset(point.frequency).ok_or_else(|| FilterError::Format {
            path: path.to_path_buf(),
            line: 0,
            message: format!("frequency {} Hz cannot be used as an offset", point.frequency),
        })?;
        // amplitude 0 gives -inf dB, passed through as-is
        mag.push(offset, 1, (20.0 * point.amplitude.log10()) as f32);
        angle.push(offset, 1, point.phase.to_degrees() as f32);
    }

    mag.backfill_durations();
    angle.backfill_durations();
    Ok((mag, angle))
}

/// Frequency in Hz rounded to the nearest integer offset.
fn frequency_offset(frequency: f64) -> Option<i64> {
    let rounded = frequency.round();
    // i64::MAX as f64 rounds up to 2^63, which no longer fits
    (rounded.is_finite() && rounded.abs() < i64::MAX as f64).then_some(rounded as i64)
}

impl Filter for TouchstoneImportFilter {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut FilterBase {
        &mut self.base
    }

    fn protocol_name(&self) -> &'static str {
        "Touchstone Import"
    }

    fn validate_channel(&self, _index: usize, _stream: &StreamDescriptor) -> bool {
        // no inputs
        false
    }

    fn needs_config(&self) -> bool {
        let fp = self.fingerprint();
        fp.file_name.is_empty() || fp.src_port < 1 || fp.dst_port < 1
    }

    fn refresh(&mut self) -> RefreshStatus {
        let fp = self.fingerprint();

        if !self.cache.update(fp.clone()) {
            debug!(filter = %self.base.display_name(), "Touchstone import unchanged");
            return RefreshStatus::Unchanged;
        }

        match self.import(&fp) {
            Ok(()) => {
                info!(
                    filter = %self.base.display_name(),
                    file = %fp.file_name,
                    src = fp.src_port,
                    dst = fp.dst_port,
                    "Published S-parameter waveforms"
                );
                self.published = Some(fp);
                RefreshStatus::Updated
            }
            Err(err) => {
                warn!(
                    filter = %self.base.display_name(),
                    file = %fp.file_name,
                    error = %err,
                    "Touchstone import failed, keeping previous output"
                );
                RefreshStatus::Aborted(err)
            }
        }
    }

    fn set_default_name(&mut self) {
        let fp = self.fingerprint();
        let base_name = Path::new(&fp.file_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.base
            .set_names(format!("S{}{}({})", fp.dst_port, fp.src_port, base_name));
    }

    fn invalidate_cache(&mut self) {
        self.cache.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::touchstone::FileTimestamp;
    use std::f64::consts::FRAC_PI_2;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_test::traced_test;

    /// Loader serving a fixed matrix and counting calls.
    struct FakeLoader {
        calls: Arc<AtomicUsize>,
        params: SParameters,
    }

    impl SParameterLoader for FakeLoader {
        fn load(&self, _path: &Path) -> FilterResult<SParameters> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.params.clone())
        }
    }

    fn four_port(freqs: &[f64]) -> SParameters {
        let mut p = SParameters::new(4);
        p.timestamp = FileTimestamp {
            seconds: 1_700_000_000,
            femtoseconds: 250,
        };
        for dst in 1..=4 {
            for src in 1..=4 {
                for &frequency in freqs {
                    p.push(
                        dst,
                        src,
                        SParameterPoint {
                            frequency,
                            amplitude: 0.5,
                            phase: FRAC_PI_2 * dst as f64,
                        },
                    );
                }
            }
        }
        p
    }

    fn importer(freqs: &[f64]) -> (TouchstoneImportFilter, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = FakeLoader {
            calls: calls.clone(),
            params: four_port(freqs),
        };
        let mut f = TouchstoneImportFilter::with_loader(Box::new(loader));
        f.set_parameter(FILE_PARAM, "/data/fixture.s4p".into()).unwrap();
        (f, calls)
    }

    fn analog(f: &TouchstoneImportFilter, stream: usize) -> Arc<AnalogWaveform> {
        f.data(stream).unwrap().as_analog().unwrap().clone()
    }

    #[test]
    fn test_defaults() {
        let f = TouchstoneImportFilter::new();
        assert_eq!(f.stream_count(), 2);
        assert_eq!(f.base().stream(0).unwrap().unit(), Unit::Db);
        assert_eq!(f.base().stream(1).unwrap().name(), "angle");
        assert_eq!(f.x_axis_unit(), Unit::Hz);
        assert_eq!(f.get_voltage_range(0), 80.0);
        assert_eq!(f.get_offset(0), 40.0);
        assert_eq!(f.get_voltage_range(1), 370.0);
        assert_eq!(f.get_offset(1), 0.0);
        assert_eq!(f.display_name(), "S21()");
        assert!(f.needs_config());
        assert_eq!(
            f.get_parameter(FILE_PARAM).unwrap().file_filter_mask(),
            Some("*.s*p")
        );
    }

    #[test]
    fn test_refresh_publishes_converted_samples() {
        let (mut f, _) = importer(&[1e9, 2e9, 5e9]);
        assert!(f.refresh().is_updated());

        let mag = analog(&f, 0);
        let angle = analog(&f, 1);

        assert_eq!(mag.offsets, vec![1_000_000_000, 2_000_000_000, 5_000_000_000]);
        assert_eq!(mag.durations, vec![1_000_000_000, 3_000_000_000, 1]);
        assert_eq!(angle.durations, mag.durations);
        assert!((mag.samples[0] - (-6.0206)).abs() < 1e-3);
        // dst port 2 → phase π
        assert!((angle.samples[0] - 180.0).abs() < 1e-3);
        assert!(!mag.dense_packed);
        assert_eq!(mag.metadata.start_timestamp, 1_700_000_000);
        assert_eq!(mag.metadata.start_femtoseconds, 250);
        assert_eq!(mag.metadata.timescale, 1);
    }

    #[test]
    fn test_quarter_turn_is_ninety_degrees() {
        let (mut f, _) = importer(&[1e9]);
        f.set_parameter(DEST_PORT_PARAM, 1.into()).unwrap();
        f.refresh();
        assert!((analog(&f, 1).samples[0] - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_second_refresh_hits_cache() {
        let (mut f, calls) = importer(&[1e9, 2e9]);
        f.refresh();
        let first = f.data(0).cloned().unwrap();

        assert!(matches!(f.refresh(), RefreshStatus::Unchanged));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(f.data(0).unwrap().ptr_eq(&first));
        assert_eq!(f.state(), ImportState::CachedValid);
    }

    #[test]
    fn test_port_change_reloads_once() {
        let (mut f, calls) = importer(&[1e9]);
        f.refresh();
        f.set_parameter(DEST_PORT_PARAM, 3.into()).unwrap();
        assert_eq!(f.state(), ImportState::Stale);

        assert!(f.refresh().is_updated());
        f.refresh();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.cached_fingerprint().unwrap().dst_port, 3);
    }

    #[test]
    #[traced_test]
    fn test_out_of_range_port_keeps_output() {
        let (mut f, calls) = importer(&[1e9, 2e9]);
        f.refresh();
        let before = f.data(0).cloned().unwrap();

        f.set_parameter(SOURCE_PORT_PARAM, 5.into()).unwrap();
        let status = f.refresh();

        assert!(matches!(
            status.error(),
            Some(FilterError::Range {
                port: 5,
                available: 4
            })
        ));
        assert!(f.data(0).unwrap().ptr_eq(&before));
        assert_eq!(f.state(), ImportState::Unconfigured);
        assert!(logs_contain("keeping previous output"));

        // failure is not retried until something changes
        assert!(matches!(f.refresh(), RefreshStatus::Unchanged));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // forcing does retry
        assert!(f.force_refresh().error().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_no_file_is_configuration_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut f = TouchstoneImportFilter::with_loader(Box::new(FakeLoader {
            calls: calls.clone(),
            params: four_port(&[1e9]),
        }));

        let status = f.refresh();
        assert!(status.error().unwrap().is_configuration());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(f.data(0).is_none());
    }

    #[test]
    fn test_zero_amplitude_is_negative_infinity() {
        let mut p = SParameters::new(2);
        p.push(
            2,
            1,
            SParameterPoint {
                frequency: 1e6,
                amplitude: 0.0,
                phase: 0.0,
            },
        );
        let (mag, _) = build_waveforms(&p, p.get(2, 1).unwrap(), Path::new("zero.s2p")).unwrap();
        assert_eq!(mag.samples[0], f32::NEG_INFINITY);
    }

    #[test]
    fn test_unrepresentable_frequency_aborts() {
        for frequency in [f64::NAN, f64::INFINITY, -1e19, 1e19] {
            let mut p = SParameters::new(2);
            for f in [1e6, frequency] {
                p.push(
                    2,
                    1,
                    SParameterPoint {
                        frequency: f,
                        amplitude: 1.0,
                        phase: 0.0,
                    },
                );
            }
            let calls = Arc::new(AtomicUsize::new(0));
            let mut f = TouchstoneImportFilter::with_loader(Box::new(FakeLoader {
                calls: calls.clone(),
                params: p,
            }));
            f.set_parameter(FILE_PARAM, "/data/odd.s2p".into()).unwrap();

            let status = f.refresh();
            assert!(
                matches!(status.error(), Some(FilterError::Format { line: 0, .. })),
                "frequency {frequency}: {status}"
            );
            assert!(f.data(0).is_none());
        }
    }

    #[test]
    fn test_rejects_every_input() {
        let f = TouchstoneImportFilter::new();
        let other = TouchstoneImportFilter::new();
        for stream in 0..other.stream_count() {
            let desc = other.descriptor(stream).unwrap();
            for index in 0..4 {
                assert!(!f.validate_channel(index, &desc));
            }
        }
    }

    #[test]
    fn test_default_name_uses_ports_and_base_name() {
        let (mut f, _) = importer(&[1e9]);
        f.set_parameter(SOURCE_PORT_PARAM, 3.into()).unwrap();
        f.set_parameter(DEST_PORT_PARAM, 4.into()).unwrap();
        f.set_default_name();
        assert_eq!(f.display_name(), "S43(fixture.s4p)");
        assert_eq!(f.base().hardware_name(), "S43(fixture.s4p)");
    }
}
