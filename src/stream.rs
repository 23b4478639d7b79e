//! Output slots of a filter.
//!
//! Every [`Stream`] publishes its waveform on a watch channel. A
//! [`StreamDescriptor`] handed to a downstream filter holds a receiver for
//! that channel, so the consumer always reads what the producer published
//! last, not what was there when the two were connected.

use crate::unit::Unit;
use crate::waveform::WaveformData;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Kind of sample a stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    /// Floating point samples
    Analog,
    /// Boolean samples
    Digital,
}

/// A named, unit-tagged output of a filter holding at most one waveform.
///
/// The stream's position in its filter is its external identifier, so
/// filters only append or clear streams, never reorder them.
#[derive(Debug)]
pub struct Stream {
    name: String,
    unit: Unit,
    stream_type: StreamType,
    data: Option<WaveformData>,
    /// Last published waveform, for downstream descriptors
    data_tx: watch::Sender<Option<WaveformData>>,
    /// Display offset, in `unit`
    offset: f32,
    /// Full-scale display range, in `unit`
    range: f32,
}

impl Stream {
    /// Empty stream with a unit display range.
    pub fn new(name: impl Into<String>, unit: Unit, stream_type: StreamType) -> Self {
        let (data_tx, _) = watch::channel(None);
        Self {
            name: name.into(),
            unit,
            stream_type,
            data: None,
            data_tx,
            offset: 0.0,
            range: 1.0,
        }
    }

    /// Stream name, e.g. `mag`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit of the sample values
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Analog or digital
    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    /// Currently published waveform, if any refresh has succeeded.
    pub fn data(&self) -> Option<&WaveformData> {
        self.data.as_ref()
    }

    /// Replace the published waveform. Consumers holding the previous handle
    /// keep it alive until they drop it; connected descriptors see the new
    /// one on their next read.
    pub(crate) fn publish(&mut self, data: WaveformData) {
        self.data = Some(data.clone());
        self.data_tx.send_replace(Some(data));
    }

    /// Display offset
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Set the display offset
    pub fn set_offset(&mut self, offset: f32) {
        self.offset = offset;
    }

    /// Full-scale display range
    pub fn range(&self) -> f32 {
        self.range
    }

    /// Set the full-scale display range
    pub fn set_range(&mut self, range: f32) {
        self.range = range;
    }
}

/// Live view of one stream of an upstream filter, offered to a downstream
/// filter's input.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    /// Display name of the producing filter
    pub source: String,
    /// Stream index within the producer
    pub index: usize,
    /// Name of the stream within the producer
    pub name: String,
    /// Analog or digital
    pub stream_type: StreamType,
    /// Unit of the sample values
    pub y_unit: Unit,
    /// Unit of the producer's X axis
    pub x_unit: Unit,
    data_rx: watch::Receiver<Option<WaveformData>>,
}

impl StreamDescriptor {
    /// Describe stream `index` of a producer named `source`.
    pub fn new(source: impl Into<String>, index: usize, stream: &Stream, x_unit: Unit) -> Self {
        Self {
            source: source.into(),
            index,
            name: stream.name.clone(),
            stream_type: stream.stream_type,
            y_unit: stream.unit,
            x_unit,
            data_rx: stream.data_tx.subscribe(),
        }
    }

    /// Waveform the producer has published most recently.
    ///
    /// If the producer redeclared its streams since this descriptor was
    /// taken, this is the last waveform the old stream published.
    pub fn data(&self) -> Option<WaveformData> {
        self.data_rx.borrow().clone()
    }

    /// `source.name`, as shown in generated filter names.
    pub fn label(&self) -> String {
        format!("{}.{}", self.source, self.name)
    }
}
