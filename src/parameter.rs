//! Typed filter parameters.
//!
//! A [`FilterParameter`] is a named, typed configuration value owned by one
//! filter. Values are validated against the declared [`ParameterType`] and
//! optional [`Constraints`] before they are committed, and every committed
//! value is published on a watch channel so a UI can observe it without
//! borrowing the filter.
//!
//! # Example
//!
//! ```rust
//! use signal_graph::parameter::{FilterParameter, ParameterType, ParameterValue};
//! use signal_graph::unit::Unit;
//!
//! let mut port = FilterParameter::new("Source Port", ParameterType::Int, Unit::Counts)
//!     .with_value(1)
//!     .with_min(1.0);
//!
//! let rx = port.subscribe();
//! port.set(3).unwrap();
//! assert_eq!(*rx.borrow(), ParameterValue::Int(3));
//! assert!(port.set(0).is_err());
//! ```
//!
//! Change detection in filters compares [`ParameterValue`]s only; the type
//! tag never takes part in a fingerprint.

use crate::error::{FilterError, FilterResult};
use crate::unit::Unit;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

// =============================================================================
// Types and values
// =============================================================================

/// Declared kind of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// Path to a file on disk
    Filename,
    /// Signed integer
    Int,
    /// Floating point
    Float,
    /// Free text
    String,
    /// On/off flag
    Bool,
}

impl ParameterType {
    fn default_value(self) -> ParameterValue {
        match self {
            ParameterType::Filename | ParameterType::String => ParameterValue::Text(String::new()),
            ParameterType::Int => ParameterValue::Int(0),
            ParameterType::Float => ParameterValue::Float(0.0),
            ParameterType::Bool => ParameterValue::Bool(false),
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterType::Filename => "filename",
            ParameterType::Int => "int",
            ParameterType::Float => "float",
            ParameterType::String => "string",
            ParameterType::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// Value held by a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Switch
    Bool(bool),
    /// Whole number, also used for ports and enums
    Int(i64),
    /// Real number
    Float(f64),
    /// Free text or a file name
    Text(String),
}

impl ParameterValue {
    /// Integer view; floats are not truncated.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of ints and floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Int(v) => Some(*v as f64),
            ParameterValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view of text values.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Boolean view of bool values.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Converts a TOML scalar. Tables, arrays and datetimes have no
    /// parameter representation.
    pub fn from_toml(value: &toml::Value) -> Option<Self> {
        match value {
            toml::Value::Boolean(v) => Some(ParameterValue::Bool(*v)),
            toml::Value::Integer(v) => Some(ParameterValue::Int(*v)),
            toml::Value::Float(v) => Some(ParameterValue::Float(*v)),
            toml::Value::String(v) => Some(ParameterValue::Text(v.clone())),
            _ => None,
        }
    }

    /// Value as written to a graph file.
    pub fn to_toml(&self) -> toml::Value {
        match self {
            ParameterValue::Bool(v) => toml::Value::Boolean(*v),
            ParameterValue::Int(v) => toml::Value::Integer(*v),
            ParameterValue::Float(v) => toml::Value::Float(*v),
            ParameterValue::Text(v) => toml::Value::String(v.clone()),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(v) => write!(f, "{v}"),
            ParameterValue::Int(v) => write!(f, "{v}"),
            ParameterValue::Float(v) => write!(f, "{v}"),
            ParameterValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        ParameterValue::Int(i64::from(v))
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::Text(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        ParameterValue::Text(v)
    }
}

// =============================================================================
// Constraints
// =============================================================================

/// Parameter constraints for validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Constraints {
    /// No constraints
    #[default]
    None,

    /// Numeric range, either bound optional
    Range { min: Option<f64>, max: Option<f64> },

    /// Allowed discrete values
    Choices(Vec<ParameterValue>),
}

impl Constraints {
    /// Validate value against constraints
    pub fn allows(&self, value: &ParameterValue) -> bool {
        match self {
            Constraints::None => true,

            Constraints::Range { min, max } => match value.as_float() {
                Some(v) => min.map_or(true, |m| v >= m) && max.map_or(true, |m| v <= m),
                None => false,
            },

            Constraints::Choices(choices) => choices.iter().any(|c| c == value),
        }
    }
}

// =============================================================================
// FilterParameter
// =============================================================================

/// Named, typed configuration value attached to a filter.
#[derive(Debug)]
pub struct FilterParameter {
    name: String,
    param_type: ParameterType,
    unit: Unit,
    description: Option<String>,

    /// Glob shown by file choosers, e.g. `*.s*p`
    file_filter_mask: Option<String>,
    /// Human-readable label for the mask
    file_filter_name: Option<String>,

    constraints: Constraints,

    value_tx: watch::Sender<ParameterValue>,
    value_rx: watch::Receiver<ParameterValue>,
}

impl FilterParameter {
    /// Create a parameter holding the zero value of its type.
    pub fn new(name: impl Into<String>, param_type: ParameterType, unit: Unit) -> Self {
        let (value_tx, value_rx) = watch::channel(param_type.default_value());

        Self {
            name: name.into(),
            param_type,
            unit,
            description: None,
            file_filter_mask: None,
            file_filter_name: None,
            constraints: Constraints::None,
            value_tx,
            value_rx,
        }
    }

    /// Set the initial value without validation.
    pub fn with_value(self, value: impl Into<ParameterValue>) -> Self {
        self.value_tx.send_replace(value.into());
        self
    }

    /// Set parameter description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restrict file choosers to `mask`, labelled `name`.
    pub fn with_file_filter(mut self, mask: impl Into<String>, name: impl Into<String>) -> Self {
        self.file_filter_mask = Some(mask.into());
        self.file_filter_name = Some(name.into());
        self
    }

    /// Set numeric range constraints
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.constraints = Constraints::Range {
            min: Some(min),
            max: Some(max),
        };
        self
    }

    /// Lower bound only.
    pub fn with_min(mut self, min: f64) -> Self {
        self.constraints = Constraints::Range {
            min: Some(min),
            max: None,
        };
        self
    }

    /// Set discrete choice constraints
    pub fn with_choices(mut self, choices: Vec<ParameterValue>) -> Self {
        self.constraints = Constraints::Choices(choices);
        self
    }

    /// Get current value
    pub fn get(&self) -> ParameterValue {
        self.value_rx.borrow().clone()
    }

    /// Integer value, or 0 when the parameter does not hold an integer.
    pub fn int_val(&self) -> i64 {
        self.value_rx.borrow().as_int().unwrap_or(0)
    }

    /// Numeric value, or 0.0 when the parameter is not numeric.
    pub fn float_val(&self) -> f64 {
        self.value_rx.borrow().as_float().unwrap_or(0.0)
    }

    /// Value rendered as text; for filenames this is the path itself.
    pub fn text(&self) -> String {
        self.value_rx.borrow().to_string()
    }

    /// Set value (type-checks, validates, notifies subscribers)
    ///
    /// Float parameters also accept integers. Nothing is committed when the
    /// value is rejected.
    pub fn set(&mut self, value: impl Into<ParameterValue>) -> FilterResult<()> {
        let value = self.coerce(value.into())?;

        if !self.constraints.allows(&value) {
            return Err(FilterError::ConstraintViolation(self.name.clone()));
        }

        self.value_tx.send_replace(value);
        Ok(())
    }

    fn coerce(&self, value: ParameterValue) -> FilterResult<ParameterValue> {
        let coerced = match (self.param_type, value) {
            (ParameterType::Int, v @ ParameterValue::Int(_)) => Some(v),
            (ParameterType::Float, ParameterValue::Int(v)) => Some(ParameterValue::Float(v as f64)),
            (ParameterType::Float, v @ ParameterValue::Float(_)) => Some(v),
            (ParameterType::Filename | ParameterType::String, v @ ParameterValue::Text(_)) => {
                Some(v)
            }
            (ParameterType::Bool, v @ ParameterValue::Bool(_)) => Some(v),
            _ => None,
        };

        coerced.ok_or_else(|| FilterError::TypeMismatch {
            name: self.name.clone(),
            expected: self.param_type,
        })
    }

    /// Subscribe to value changes (for GUI widgets)
    ///
    /// Each receiver holds its own view of the latest committed value, so a
    /// display thread can read it while the owning filter is refreshing.
    pub fn subscribe(&self) -> watch::Receiver<ParameterValue> {
        self.value_rx.clone()
    }

    /// Current value as JSON, for scripting surfaces.
    pub fn value_json(&self) -> serde_json::Value {
        serde_json::to_value(self.get()).unwrap_or(serde_json::Value::Null)
    }

    /// Name the filter looks the parameter up by
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared value type
    pub fn param_type(&self) -> ParameterType {
        self.param_type
    }

    /// Unit of numeric values
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Help text, if any
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Glob offered by file pickers, e.g. `*.s*p`
    pub fn file_filter_mask(&self) -> Option<&str> {
        self.file_filter_mask.as_deref()
    }

    /// Label for the file picker glob
    pub fn file_filter_name(&self) -> Option<&str> {
        self.file_filter_name.as_deref()
    }

    /// Accepted values
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn port() -> FilterParameter {
        FilterParameter::new("port", ParameterType::Int, Unit::Counts)
            .with_value(1)
            .with_min(1.0)
    }

    #[test]
    fn test_parameter_basic() {
        let mut param = FilterParameter::new("gain", ParameterType::Float, Unit::Db);
        assert_eq!(param.get(), ParameterValue::Float(0.0));

        param.set(3.5).unwrap();
        assert_eq!(param.float_val(), 3.5);
    }

    #[test]
    fn test_float_accepts_integer() {
        let mut param = FilterParameter::new("scale", ParameterType::Float, Unit::Counts);
        param.set(2).unwrap();
        assert_eq!(param.get(), ParameterValue::Float(2.0));
    }

    #[test]
    fn test_type_mismatch_keeps_value() {
        let mut param = port();
        let err = param.set("two").unwrap_err();
        assert!(matches!(
            err,
            FilterError::TypeMismatch {
                expected: ParameterType::Int,
                ..
            }
        ));
        assert_eq!(param.int_val(), 1);

        // ints do not silently truncate floats
        assert!(param.set(2.7).is_err());
    }

    #[test]
    fn test_parameter_range_validation() {
        let mut param = FilterParameter::new("level", ParameterType::Float, Unit::Volts)
            .with_range(0.0, 100.0);

        assert!(param.set(50.0).is_ok());
        assert!(param.set(150.0).is_err()); // Out of range
        assert!(param.set(-10.0).is_err()); // Out of range
        assert_eq!(param.float_val(), 50.0);
    }

    #[test]
    fn test_lower_bound_only() {
        let mut param = port();
        assert!(param.set(0).is_err());
        assert!(param.set(64).is_ok());
    }

    #[test]
    fn test_parameter_choices() {
        let mut param = FilterParameter::new("mode", ParameterType::String, Unit::Counts)
            .with_value("auto")
            .with_choices(vec!["auto".into(), "manual".into()]);

        assert!(param.set("manual").is_ok());
        assert!(matches!(
            param.set("invalid"),
            Err(FilterError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_filename_text_and_mask() {
        let mut param = FilterParameter::new("file", ParameterType::Filename, Unit::Counts)
            .with_file_filter("*.s*p", "Touchstone S-parameter files (*.s*p)");
        param.set("/data/cable.s2p").unwrap();

        assert_eq!(param.text(), "/data/cable.s2p");
        assert_eq!(param.file_filter_mask(), Some("*.s*p"));
        assert_eq!(param.int_val(), 0);
    }

    #[test]
    fn test_toml_round_trip_of_scalars() {
        let v = toml::Value::Integer(4);
        assert_eq!(ParameterValue::from_toml(&v), Some(ParameterValue::Int(4)));
        assert_eq!(ParameterValue::Text("a".into()).to_toml(), toml::Value::String("a".into()));
        assert_eq!(ParameterValue::from_toml(&toml::Value::Array(vec![])), None);
    }

    #[test]
    fn test_value_json() {
        let param = port();
        assert_eq!(param.value_json(), serde_json::json!(1));
    }

    #[tokio::test]
    async fn test_parameter_subscription() {
        let mut param = port();
        let mut rx = param.subscribe();

        // Initial value
        assert_eq!(*rx.borrow(), ParameterValue::Int(1));

        // Change value
        param.set(4).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ParameterValue::Int(4));
    }
}
