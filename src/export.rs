//! Dumping a filter's published streams as CSV or JSON.
//!
//! CSV output has one row per sample index: the X value of the first stream
//! followed by every stream's sample. Streams shorter than the longest one
//! leave their cells empty. JSON output keeps each waveform intact.

use crate::filter::Filter;
use crate::waveform::WaveformData;
use anyhow::Result;
use serde_json::{json, Value};
use std::io::Write;

/// Writes every stream of `filter` to `out` as CSV.
pub fn write_csv<W: Write>(filter: &dyn Filter, out: W) -> Result<()> {
    let base = filter.base();
    let mut writer = csv::Writer::from_writer(out);

    let mut header = vec![format!("x ({})", base.x_axis_unit())];
    header.extend(
        base.streams()
            .iter()
            .map(|s| format!("{} ({})", s.name(), s.unit())),
    );
    writer.write_record(&header)?;

    let rows = base
        .streams()
        .iter()
        .filter_map(|s| s.data().map(WaveformData::len))
        .max()
        .unwrap_or(0);

    for i in 0..rows {
        let x = base
            .streams()
            .iter()
            .find_map(|s| s.data().and_then(|d| x_value(d, i)))
            .map(|x| x.to_string())
            .unwrap_or_default();

        let mut record = vec![x];
        record.extend(
            base.streams()
                .iter()
                .map(|s| s.data().and_then(|d| sample_text(d, i)).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Builds a JSON document describing `filter` and its published streams.
pub fn to_json(filter: &dyn Filter) -> Value {
    let base = filter.base();
    let streams: Vec<Value> = base
        .streams()
        .iter()
        .map(|s| {
            json!({
                "name": s.name(),
                "unit": s.unit(),
                "offset": s.offset(),
                "range": s.range(),
                "waveform": s.data().map(waveform_json),
            })
        })
        .collect();

    json!({
        "name": base.display_name(),
        "protocol": filter.protocol_name(),
        "x_unit": base.x_axis_unit(),
        "parameters": base
            .parameters()
            .map(|p| (p.name().to_string(), p.value_json()))
            .collect::<serde_json::Map<_, _>>(),
        "streams": streams,
    })
}

fn waveform_json(data: &WaveformData) -> Value {
    let value = match data {
        WaveformData::Analog(w) => serde_json::to_value(w.as_ref()),
        WaveformData::Digital(w) => serde_json::to_value(w.as_ref()),
    };
    value.unwrap_or(Value::Null)
}

fn x_value(data: &WaveformData, i: usize) -> Option<i64> {
    match data {
        WaveformData::Analog(w) => w.x_at(i),
        WaveformData::Digital(w) => w.x_at(i),
    }
}

fn sample_text(data: &WaveformData, i: usize) -> Option<String> {
    match data {
        WaveformData::Analog(w) => w.samples.get(i).map(f32::to_string),
        WaveformData::Digital(w) => w.samples.get(i).map(|&b| u8::from(b).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterBase, FilterCategory, RefreshStatus};
    use crate::stream::{StreamDescriptor, StreamType};
    use crate::unit::Unit;
    use crate::waveform::{AnalogWaveform, WaveformMetadata};

    struct Fixed {
        base: FilterBase,
    }

    impl Fixed {
        fn new() -> Self {
            let mut base = FilterBase::new(FilterCategory::Generation);
            base.add_stream(Unit::Db, "mag", StreamType::Analog);
            base.add_stream(Unit::Degrees, "angle", StreamType::Analog);
            base.set_x_axis_unit(Unit::Hz);
            base.set_names("fixed");

            let mut w = AnalogWaveform::new(WaveformMetadata {
                timescale: 1,
                ..Default::default()
            });
            w.push(100, 50, -3.0);
            w.push(150, 1, -6.0);
            base.set_data(0, w.into());
            Self { base }
        }
    }

    impl Filter for Fixed {
        fn base(&self) -> &FilterBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut FilterBase {
            &mut self.base
        }
        fn protocol_name(&self) -> &'static str {
            "Fixed"
        }
        fn validate_channel(&self, _: usize, _: &StreamDescriptor) -> bool {
            false
        }
        fn needs_config(&self) -> bool {
            false
        }
        fn refresh(&mut self) -> RefreshStatus {
            RefreshStatus::Unchanged
        }
        fn set_default_name(&mut self) {}
        fn invalidate_cache(&mut self) {}
    }

    #[test]
    fn test_csv_rows_with_missing_stream() {
        let mut out = Vec::new();
        write_csv(&Fixed::new(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines, vec!["x (Hz),mag (dB),angle (°)", "100,-3,", "150,-6,"]);
    }

    #[test]
    fn test_json_document() {
        let doc = to_json(&Fixed::new());
        assert_eq!(doc["protocol"], "Fixed");
        assert_eq!(doc["x_unit"], "hz");
        assert_eq!(doc["streams"][0]["waveform"]["offsets"], json!([100, 150]));
        assert!(doc["streams"][1]["waveform"].is_null());
    }
}
