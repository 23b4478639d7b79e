//! Physical-quantity tags for axes and sample values.
//!
//! A [`Unit`] carries no behavior beyond identity and formatting. Streams are
//! tagged with one at declaration time and keep it until they are redeclared.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical quantity attached to an axis, a stream or a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Time in femtoseconds (the native timebase of acquired waveforms)
    Fs,
    /// Frequency in hertz
    Hz,
    /// Electrical potential in volts
    Volts,
    /// Resistance / impedance in ohms
    Ohms,
    /// Logarithmic ratio in decibels
    Db,
    /// Angle in degrees
    Degrees,
    /// Dimensionless count (also used for file names and indices)
    Counts,
}

impl Unit {
    /// Suffix printed after a formatted value.
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Fs => "s",
            Unit::Hz => "Hz",
            Unit::Volts => "V",
            Unit::Ohms => "Ω",
            Unit::Db => "dB",
            Unit::Degrees => "°",
            Unit::Counts => "",
        }
    }

    /// Formats `value` for display, applying an SI prefix where the unit
    /// scales linearly (Hz, V, Ω, seconds).
    pub fn pretty_print(&self, value: f64) -> String {
        match self {
            Unit::Db => format!("{value:.2} dB"),
            Unit::Degrees => format!("{value:.2}°"),
            Unit::Counts => format!("{value}"),
            // Femtoseconds are shown in seconds
            Unit::Fs => si_format(value * 1e-15, self.symbol()),
            Unit::Hz | Unit::Volts | Unit::Ohms => si_format(value, self.symbol()),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Unit::Fs => "fs",
            Unit::Hz => "Hz",
            Unit::Volts => "V",
            Unit::Ohms => "Ω",
            Unit::Db => "dB",
            Unit::Degrees => "°",
            Unit::Counts => "counts",
        };
        f.write_str(name)
    }
}

const SI_PREFIXES: [(f64, &str); 9] = [
    (1e12, "T"),
    (1e9, "G"),
    (1e6, "M"),
    (1e3, "k"),
    (1.0, ""),
    (1e-3, "m"),
    (1e-6, "μ"),
    (1e-9, "n"),
    (1e-12, "p"),
];

fn si_format(value: f64, symbol: &str) -> String {
    let magnitude = value.abs();
    if magnitude == 0.0 || !magnitude.is_finite() {
        return format!("{value} {symbol}");
    }

    let (scale, prefix) = SI_PREFIXES
        .iter()
        .copied()
        .find(|(scale, _)| magnitude >= *scale)
        .unwrap_or((1e-15, "f"));

    format!("{} {prefix}{symbol}", trim_fraction(value / scale))
}

fn trim_fraction(value: f64) -> String {
    let text = format!("{value:.4}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_si_prefixes() {
        assert_eq!(Unit::Hz.pretty_print(1.5e9), "1.5 GHz");
        assert_eq!(Unit::Hz.pretty_print(250e3), "250 kHz");
        assert_eq!(Unit::Volts.pretty_print(0.012), "12 mV");
        assert_eq!(Unit::Ohms.pretty_print(50.0), "50 Ω");
    }

    #[test]
    fn test_femtoseconds_shown_in_seconds() {
        assert_eq!(Unit::Fs.pretty_print(2_500_000.0), "2.5 ns");
    }

    #[test]
    fn test_log_and_angle_units() {
        assert_eq!(Unit::Db.pretty_print(-6.0206), "-6.02 dB");
        assert_eq!(Unit::Degrees.pretty_print(90.0), "90.00°");
        assert_eq!(Unit::Counts.pretty_print(3.0), "3");
    }

    #[test]
    fn test_zero_and_non_finite() {
        assert_eq!(Unit::Hz.pretty_print(0.0), "0 Hz");
        assert_eq!(Unit::Volts.pretty_print(f64::NEG_INFINITY), "-inf V");
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Unit::Db).unwrap(), "\"db\"");
        let unit: Unit = serde_json::from_str("\"degrees\"").unwrap();
        assert_eq!(unit, Unit::Degrees);
    }
}
