//! Touchstone S-parameter files.
//!
//! [`SParameterLoader`] is the seam between the importer filter and whatever
//! reads network data off disk. [`TouchstoneParser`] is the default loader and
//! understands Touchstone 1.x `.sNp` files:
//!
//! ```text
//! ! comment
//! # GHz S MA R 50
//! 1.0  0.10 -20.0  0.90 -45.0  0.90 -45.0  0.10 -20.0
//! 2.0  0.12 -35.0  0.85 -90.0  0.85 -90.0  0.12 -35.0
//! ```
//!
//! Each frequency point is `1 + 2·N²` numbers and may wrap over several
//! lines. Two-port files list S11 S21 S12 S22; every other port count is
//! row-major. Values are stored as linear amplitude and phase in radians
//! whatever the file's format (MA, DB or RI).
//!
//! Files with more than [`MAX_PORTS`] ports, non-finite numbers or
//! frequencies that do not fit the waveform's `i64` offsets are rejected
//! with [`FilterError::Format`].

use crate::error::{FilterError, FilterResult};
use num_complex::Complex64;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Largest port count accepted from an `.sNp` extension.
pub const MAX_PORTS: usize = 1024;

/// Frequencies in Hz must stay below this to round into an `i64` offset.
const FREQUENCY_LIMIT: f64 = i64::MAX as f64;

/// One frequency point of one network parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SParameterPoint {
    /// Frequency in Hz
    pub frequency: f64,
    /// Linear magnitude
    pub amplitude: f64,
    /// Phase in radians
    pub phase: f64,
}

/// Modification time of a loaded file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTimestamp {
    /// Whole seconds since the UNIX epoch
    pub seconds: i64,
    /// Sub-second remainder in femtoseconds
    pub femtoseconds: i64,
}

impl FileTimestamp {
    /// Modification time of `path`, or the epoch if it cannot be read.
    pub fn of_file(path: &Path) -> Self {
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok());

        match modified {
            Some(d) => Self {
                seconds: i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
                femtoseconds: i64::from(d.subsec_nanos()) * 1_000_000,
            },
            None => Self::default(),
        }
    }
}

/// Full parameter matrix of an N-port network, indexed by 1-based
/// `(destination, source)` port pairs.
#[derive(Debug, Clone, Default)]
pub struct SParameters {
    port_count: usize,
    params: HashMap<(usize, usize), Vec<SParameterPoint>>,
    /// Reference impedance in ohms
    pub reference_impedance: f64,
    /// Modification time of the source file
    pub timestamp: FileTimestamp,
}

impl SParameters {
    /// Empty matrix. Per-pair vectors are created on first push.
    pub fn new(port_count: usize) -> Self {
        Self {
            port_count,
            params: HashMap::new(),
            reference_impedance: 50.0,
            timestamp: FileTimestamp::default(),
        }
    }

    /// Number of ports N of the network.
    pub fn port_count(&self) -> usize {
        self.port_count
    }

    fn contains(&self, dst: usize, src: usize) -> bool {
        (1..=self.port_count).contains(&dst) && (1..=self.port_count).contains(&src)
    }

    /// Points of S<dst><src>, if both ports exist.
    pub fn get(&self, dst: usize, src: usize) -> Option<&[SParameterPoint]> {
        if !self.contains(dst, src) {
            return None;
        }
        Some(self.params.get(&(dst, src)).map_or(&[], Vec::as_slice))
    }

    /// Append a point to S<dst><src>. Ignored for ports outside the matrix.
    pub fn push(&mut self, dst: usize, src: usize, point: SParameterPoint) {
        if self.contains(dst, src) {
            self.params.entry((dst, src)).or_default().push(point);
        }
    }

    /// Number of frequency points (taken from S11).
    pub fn point_count(&self) -> usize {
        self.get(1, 1).map_or(0, <[SParameterPoint]>::len)
    }
}

/// Reads network parameters from a file.
pub trait SParameterLoader: Send + Sync {
    /// Load every parameter in `path`.
    fn load(&self, path: &Path) -> FilterResult<SParameters>;
}

/// Data format declared on the option line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataFormat {
    /// Linear magnitude, angle in degrees
    MagnitudeAngle,
    /// Magnitude in dB, angle in degrees
    DecibelAngle,
    /// Real and imaginary parts
    RealImaginary,
}

#[derive(Debug, Clone, Copy)]
struct OptionLine {
    frequency_scale: f64,
    format: DataFormat,
    reference_impedance: f64,
}

impl Default for OptionLine {
    fn default() -> Self {
        Self {
            frequency_scale: 1e9,
            format: DataFormat::MagnitudeAngle,
            reference_impedance: 50.0,
        }
    }
}

/// Touchstone 1.x reader.
#[derive(Debug, Clone, Copy, Default)]
pub struct TouchstoneParser;

impl TouchstoneParser {
    /// Parser with no state; options are read per file.
    pub fn new() -> Self {
        Self
    }

    /// Port count encoded in an `.sNp` extension.
    pub fn port_count_from_path(path: &Path) -> Option<usize> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let digits = ext.strip_prefix('s')?.strip_suffix('p')?;
        digits.parse().ok().filter(|&n| n > 0)
    }

    /// Parse file contents for an `nports`-port network. `path` is only used
    /// in error messages.
    pub fn parse_str(&self, text: &str, nports: usize, path: &Path) -> FilterResult<SParameters> {
        let format_err = |line: usize, message: String| FilterError::Format {
            path: path.to_path_buf(),
            line,
            message,
        };

        let record_len = values_per_record(nports).ok_or_else(|| {
            format_err(0, format!("unsupported port count {nports}, expected 1 to {MAX_PORTS}"))
        })?;

        let mut options: Option<OptionLine> = None;
        let mut values: Vec<(f64, usize)> = Vec::new();

        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.split('!').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix('#') {
                // only the first option line counts
                if options.is_none() {
                    options = Some(parse_option_line(rest).map_err(|m| format_err(line_no, m))?);
                }
                continue;
            }

            if line.starts_with('[') {
                return Err(format_err(
                    line_no,
                    "Touchstone 2.0 keywords are not supported".to_string(),
                ));
            }

            for token in line.split_whitespace() {
                let value = token
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| format_err(line_no, format!("invalid number '{token}'")))?;
                values.push((value, line_no));
            }
        }

        let options = options.unwrap_or_default();
        if values.len() % record_len != 0 {
            let last_line = values.last().map_or(0, |(_, l)| *l);
            return Err(format_err(
                last_line,
                format!(
                    "truncated record: {} values is not a multiple of {record_len}",
                    values.len()
                ),
            ));
        }

        let mut params = SParameters::new(nports);
        params.reference_impedance = options.reference_impedance;

        for record in values.chunks_exact(record_len) {
            let (raw, line_no) = record[0];
            let frequency = raw * options.frequency_scale;
            if !(frequency.is_finite() && frequency.abs() < FREQUENCY_LIMIT) {
                return Err(format_err(line_no, format!("frequency {raw} is out of range")));
            }
            for (k, pair) in record[1..].chunks_exact(2).enumerate() {
                let (dst, src) = matrix_position(k, nports);
                let (amplitude, phase) = to_polar(options.format, pair[0].0, pair[1].0);
                params.push(
                    dst,
                    src,
                    SParameterPoint {
                        frequency,
                        amplitude,
                        phase,
                    },
                );
            }
        }

        Ok(params)
    }
}

impl SParameterLoader for TouchstoneParser {
    fn load(&self, path: &Path) -> FilterResult<SParameters> {
        let nports = Self::port_count_from_path(path).ok_or_else(|| FilterError::Format {
            path: path.to_path_buf(),
            line: 0,
            message: "file name does not end in .sNp".to_string(),
        })?;
        if nports > MAX_PORTS {
            return Err(FilterError::Format {
                path: path.to_path_buf(),
                line: 0,
                message: format!("{nports} ports exceeds the limit of {MAX_PORTS}"),
            });
        }

        let text = std::fs::read_to_string(path).map_err(|source| FilterError::FileRead {
            path: PathBuf::from(path),
            source,
        })?;

        let mut params = self.parse_str(&text, nports, path)?;
        params.timestamp = FileTimestamp::of_file(path);

        debug!(
            file = %path.display(),
            ports = nports,
            points = params.point_count(),
            "Loaded Touchstone file"
        );
        Ok(params)
    }
}

/// Values per frequency point, `1 + 2·N²`, for a supported port count.
fn values_per_record(nports: usize) -> Option<usize> {
    if nports == 0 || nports > MAX_PORTS {
        return None;
    }
    nports
        .checked_mul(nports)
        .and_then(|n| n.checked_mul(2))
        .and_then(|n| n.checked_add(1))
}

fn parse_option_line(rest: &str) -> Result<OptionLine, String> {
    let mut options = OptionLine::default();
    let mut tokens = rest.split_whitespace();

    while let Some(token) = tokens.next() {
        match token.to_ascii_uppercase().as_str() {
            "HZ" => options.frequency_scale = 1.0,
            "KHZ" => options.frequency_scale = 1e3,
            "MHZ" => options.frequency_scale = 1e6,
            "GHZ" => options.frequency_scale = 1e9,
            "S" => {}
            "Y" | "Z" | "H" | "G" => {
                return Err(format!("unsupported parameter type '{token}'"));
            }
            "MA" => options.format = DataFormat::MagnitudeAngle,
            "DB" => options.format = DataFormat::DecibelAngle,
            "RI" => options.format = DataFormat::RealImaginary,
            "R" => {
                let value = tokens
                    .next()
                    .ok_or_else(|| "missing reference impedance after 'R'".to_string())?;
                options.reference_impedance = value
                    .parse()
                    .map_err(|_| format!("invalid reference impedance '{value}'"))?;
            }
            _ => return Err(format!("unknown option '{token}'")),
        }
    }

    Ok(options)
}

/// 1-based `(dst, src)` of the k-th value pair in a record.
fn matrix_position(k: usize, nports: usize) -> (usize, usize) {
    if nports == 2 {
        // S11 S21 S12 S22
        (k % 2 + 1, k / 2 + 1)
    } else {
        (k / nports + 1, k % nports + 1)
    }
}

fn to_polar(format: DataFormat, a: f64, b: f64) -> (f64, f64) {
    match format {
        DataFormat::MagnitudeAngle => (a, b.to_radians()),
        DataFormat::DecibelAngle => (10f64.powf(a / 20.0), b.to_radians()),
        DataFormat::RealImaginary => Complex64::new(a, b).to_polar(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const TWO_PORT: &str = "\
! two-port thru
# MHz S MA R 50
100  0.1 0  0.5 90  0.6 -90  0.2 180
200  0.1 0  0.4 45  0.6 -45  0.2 180
";

    fn parse(text: &str, nports: usize) -> FilterResult<SParameters> {
        TouchstoneParser::new().parse_str(text, nports, Path::new("test.s2p"))
    }

    #[test]
    fn test_port_count_from_extension() {
        assert_eq!(TouchstoneParser::port_count_from_path(Path::new("a.s2p")), Some(2));
        assert_eq!(TouchstoneParser::port_count_from_path(Path::new("b.S12P")), Some(12));
        assert_eq!(TouchstoneParser::port_count_from_path(Path::new("c.txt")), None);
        assert_eq!(TouchstoneParser::port_count_from_path(Path::new("d.s0p")), None);
    }

    #[test]
    fn test_two_port_column_order() {
        let p = parse(TWO_PORT, 2).unwrap();
        assert_eq!(p.port_count(), 2);
        assert_eq!(p.point_count(), 2);

        let s21 = p.get(2, 1).unwrap();
        assert_eq!(s21[0].frequency, 100e6);
        assert_eq!(s21[0].amplitude, 0.5);
        assert!((s21[0].phase - FRAC_PI_2).abs() < 1e-12);

        let s12 = p.get(1, 2).unwrap();
        assert_eq!(s12[1].amplitude, 0.6);
    }

    #[test]
    fn test_row_major_with_wrapped_lines() {
        // 3-port, one point, wrapped after the first row
        let text = "# Hz S MA R 75\n\
                    1e9 0.11 0 0.12 0 0.13 0\n\
                    0.21 0 0.22 0 0.23 0\n\
                    0.31 0 0.32 0 0.33 0\n";
        let p = parse(text, 3).unwrap();
        assert_eq!(p.reference_impedance, 75.0);
        assert_eq!(p.get(1, 3).unwrap()[0].amplitude, 0.13);
        assert_eq!(p.get(3, 1).unwrap()[0].amplitude, 0.31);
        assert_eq!(p.get(2, 2).unwrap()[0].frequency, 1e9);
    }

    #[test]
    fn test_db_and_ri_formats() {
        let db = parse("# GHz S DB R 50\n1 -6.0206 0 0 0 0 0 0 0\n", 2).unwrap();
        assert!((db.get(1, 1).unwrap()[0].amplitude - 0.5).abs() < 1e-4);

        let ri = parse("# GHz S RI R 50\n1 0 1 0 0 0 0 0 0\n", 2).unwrap();
        let s11 = ri.get(1, 1).unwrap()[0];
        assert!((s11.amplitude - 1.0).abs() < 1e-12);
        assert!((s11.phase - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_default_options_are_ghz_ma() {
        let p = parse("1 1 0 1 0 1 0 1 0\n", 2).unwrap();
        assert_eq!(p.get(1, 1).unwrap()[0].frequency, 1e9);
    }

    #[test]
    fn test_truncated_record() {
        let err = parse("# GHz S MA R 50\n1 0.1 0 0.2\n", 2).unwrap_err();
        assert!(matches!(err, FilterError::Format { line: 2, .. }));
    }

    #[test]
    fn test_bad_token_reports_line() {
        let err = parse("# GHz S MA R 50\n\n1 0.1 zero 0 0 0 0 0 0\n", 2).unwrap_err();
        match err {
            FilterError::Format { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("zero"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_non_s_parameters_and_v2() {
        assert!(parse("# GHz Z MA R 50\n", 2).is_err());
        assert!(parse("[Version] 2.0\n", 2).is_err());
    }

    #[test]
    fn test_rejects_non_finite_numbers() {
        for text in [
            "# Hz S MA R 50\ninf 1 0 1 0 1 0 1 0\n",
            "# Hz S MA R 50\nNaN 1 0 1 0 1 0 1 0\n",
            "# Hz S MA R 50\n1 1 0 -inf 0 1 0 1 0\n",
        ] {
            let err = parse(text, 2).unwrap_err();
            assert!(matches!(err, FilterError::Format { line: 2, .. }), "{text:?}: {err:?}");
        }
    }

    #[test]
    fn test_rejects_frequency_beyond_offset_range() {
        let err = parse("# Hz S MA R 50\n1e19 1 0 1 0 1 0 1 0\n", 2).unwrap_err();
        assert!(matches!(err, FilterError::Format { line: 2, .. }));

        // in range as written, out of range once scaled to Hz
        let err = parse("# GHz S MA R 50\n1 1 0 1 0 1 0 1 0\n1e10 1 0 1 0 1 0 1 0\n", 2)
            .unwrap_err();
        assert!(matches!(err, FilterError::Format { line: 3, .. }));

        let p = parse("# Hz S MA R 50\n-9e18 1 0 1 0 1 0 1 0\n9e18 1 0 1 0 1 0 1 0\n", 2).unwrap();
        assert_eq!(p.point_count(), 2);
    }

    #[test]
    fn test_port_count_is_bounded() {
        let huge = Path::new("/nonexistent/huge.s5000000000p");
        assert!(matches!(
            TouchstoneParser::new().load(huge),
            Err(FilterError::Format { line: 0, .. })
        ));

        let wide = Path::new("/nonexistent/wide.s100000p");
        assert!(matches!(
            TouchstoneParser::new().load(wide),
            Err(FilterError::Format { line: 0, .. })
        ));

        for nports in [0, MAX_PORTS + 1, usize::MAX] {
            assert!(matches!(parse("1 1 0\n", nports), Err(FilterError::Format { .. })));
        }
    }

    #[test]
    fn test_matrix_allocates_on_push() {
        let mut p = SParameters::new(100_000);
        assert_eq!(p.get(100_000, 1), Some(&[][..]));
        assert_eq!(p.get(100_001, 1), None);
        assert_eq!(p.get(0, 1), None);
        assert_eq!(p.point_count(), 0);

        let point = SParameterPoint {
            frequency: 1.0,
            amplitude: 0.5,
            phase: 0.0,
        };
        p.push(7, 3, point);
        p.push(100_001, 3, point);
        assert_eq!(p.get(7, 3), Some(&[point][..]));
        assert_eq!(p.params.len(), 1);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = TouchstoneParser::new()
            .load(Path::new("/nonexistent/dir/missing.s2p"))
            .unwrap_err();
        assert!(matches!(err, FilterError::FileRead { .. }));
    }
}
