//! Sparse/dense waveform storage.
//!
//! A waveform is three parallel vectors (`offsets`, `durations`, `samples`)
//! plus timebase metadata. Offsets and durations are integer multiples of
//! `timescale` along the X axis, whatever that axis is (femtoseconds for an
//! acquisition, hertz for imported network data).
//!
//! Filters never edit a published waveform. They build a new one, fill it
//! completely, and swap the `Arc` handle held by the stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Timebase metadata shared by every sample of a waveform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveformMetadata {
    /// X-axis units per offset tick
    pub timescale: i64,
    /// Capture (or file modification) time, seconds since the UNIX epoch
    pub start_timestamp: i64,
    /// Sub-second part of the start time in femtoseconds
    pub start_femtoseconds: i64,
    /// Offset of the trigger point from the first sample
    pub trigger_phase: i64,
}

impl WaveformMetadata {
    /// Start time as a calendar timestamp, if representable.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        let nanos = u32::try_from(self.start_femtoseconds / 1_000_000).ok()?;
        DateTime::<Utc>::from_timestamp(self.start_timestamp, nanos)
    }
}

/// Sequence of (offset, duration, sample) triples along one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform<S> {
    /// Timing shared by every sample
    #[serde(flatten)]
    pub metadata: WaveformMetadata,
    /// True when samples are uniformly spaced (`offsets[i] == i`,
    /// `durations[i] == 1`).
    pub dense_packed: bool,
    /// Sample positions, in `timescale` units
    pub offsets: Vec<i64>,
    /// Sample widths, in `timescale` units
    pub durations: Vec<i64>,
    /// Sample values
    pub samples: Vec<S>,
}

/// Waveform with floating point samples.
pub type AnalogWaveform = Waveform<f32>;

/// Waveform with boolean samples.
pub type DigitalWaveform = Waveform<bool>;

impl<S> Waveform<S> {
    /// Empty waveform with the given metadata.
    pub fn new(metadata: WaveformMetadata) -> Self {
        Self {
            metadata,
            dense_packed: false,
            offsets: Vec::new(),
            durations: Vec::new(),
            samples: Vec::new(),
        }
    }

    /// Empty waveform with room for `n` samples.
    pub fn with_capacity(metadata: WaveformMetadata, n: usize) -> Self {
        Self {
            metadata,
            dense_packed: false,
            offsets: Vec::with_capacity(n),
            durations: Vec::with_capacity(n),
            samples: Vec::with_capacity(n),
        }
    }

    /// Append one sample.
    pub fn push(&mut self, offset: i64, duration: i64, sample: S) {
        self.offsets.push(offset);
        self.durations.push(duration);
        self.samples.push(sample);
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when there are no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// All three vectors have the same length.
    pub fn is_consistent(&self) -> bool {
        self.offsets.len() == self.samples.len() && self.durations.len() == self.samples.len()
    }

    /// Sets each sample's duration to the distance to the next offset.
    ///
    /// The width of a sample is only known once the following offset is, so
    /// the last sample keeps whatever duration it was given.
    pub fn backfill_durations(&mut self) {
        for i in 1..self.offsets.len() {
            self.durations[i - 1] = self.offsets[i].saturating_sub(self.offsets[i - 1]);
        }
    }

    /// Iterator over `(offset, duration, &sample)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64, &S)> + '_ {
        self.offsets
            .iter()
            .zip(&self.durations)
            .zip(&self.samples)
            .map(|((o, d), s)| (*o, *d, s))
    }

    /// X-axis position of sample `i`, scaled by the timescale.
    pub fn x_at(&self, i: usize) -> Option<i64> {
        self.offsets.get(i).map(|o| o * self.metadata.timescale)
    }
}

impl<S: Clone + Default> Waveform<S> {
    /// Resize all three vectors to `n`, filling new slots with zero values.
    pub fn resize(&mut self, n: usize) {
        self.offsets.resize(n, 0);
        self.durations.resize(n, 0);
        self.samples.resize(n, S::default());
    }
}

/// Shared handle to a published waveform of either sample type.
#[derive(Debug, Clone)]
pub enum WaveformData {
    /// Floating point samples
    Analog(Arc<AnalogWaveform>),
    /// Boolean samples
    Digital(Arc<DigitalWaveform>),
}

impl WaveformData {
    /// The analog waveform, if this is one.
    pub fn as_analog(&self) -> Option<&Arc<AnalogWaveform>> {
        match self {
            WaveformData::Analog(w) => Some(w),
            WaveformData::Digital(_) => None,
        }
    }

    /// The digital waveform, if this is one.
    pub fn as_digital(&self) -> Option<&Arc<DigitalWaveform>> {
        match self {
            WaveformData::Digital(w) => Some(w),
            WaveformData::Analog(_) => None,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        match self {
            WaveformData::Analog(w) => w.len(),
            WaveformData::Digital(w) => w.len(),
        }
    }

    /// True when there are no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Same underlying allocation, i.e. the same published waveform.
    pub fn ptr_eq(&self, other: &WaveformData) -> bool {
        match (self, other) {
            (WaveformData::Analog(a), WaveformData::Analog(b)) => Arc::ptr_eq(a, b),
            (WaveformData::Digital(a), WaveformData::Digital(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<AnalogWaveform> for WaveformData {
    fn from(w: AnalogWaveform) -> Self {
        WaveformData::Analog(Arc::new(w))
    }
}

impl From<DigitalWaveform> for WaveformData {
    fn from(w: DigitalWaveform) -> Self {
        WaveformData::Digital(Arc::new(w))
    }
}
