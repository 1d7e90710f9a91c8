//! Scalar schema types: Bool, Integer, Double, String, FileName.
//!
//! Scalars are trivially closed: they carry no child types and no open
//! declaration state. Each one knows how to parse a textual default value
//! into its native representation and how to bound-check a runtime value.

use crate::error::{Result, SchemaError};

/// Boolean schema type. Defaults must be exactly `"true"` or `"false"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoolType;

impl BoolType {
    pub fn new() -> Self {
        Self
    }

    /// Parse a textual default value.
    pub fn from_default(&self, raw: &str) -> Result<bool> {
        match raw {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(SchemaError::WrongDefault {
                value: raw.to_string(),
                type_name: "Bool".to_string(),
            }),
        }
    }
}

/// Integer schema type with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerType {
    pub lower_bound: i64,
    pub upper_bound: i64,
}

impl Default for IntegerType {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegerType {
    /// Unbounded integer.
    pub fn new() -> Self {
        Self {
            lower_bound: i64::MIN,
            upper_bound: i64::MAX,
        }
    }

    /// Integer restricted to `lower_bound ..= upper_bound`.
    pub fn bounded(lower_bound: i64, upper_bound: i64) -> Self {
        Self {
            lower_bound,
            upper_bound,
        }
    }

    /// Bound check for a runtime value.
    pub fn matches(&self, value: i64) -> bool {
        value >= self.lower_bound && value <= self.upper_bound
    }

    /// Parse a textual default value; parse failure and out-of-bounds
    /// report the same error kind.
    pub fn from_default(&self, raw: &str) -> Result<i64> {
        raw.trim()
            .parse::<i64>()
            .ok()
            .filter(|v| self.matches(*v))
            .ok_or_else(|| SchemaError::WrongDefault {
                value: raw.to_string(),
                type_name: "Integer".to_string(),
            })
    }
}

/// Double schema type with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoubleType {
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl Default for DoubleType {
    fn default() -> Self {
        Self::new()
    }
}

impl DoubleType {
    /// Unbounded double.
    pub fn new() -> Self {
        Self {
            lower_bound: f64::NEG_INFINITY,
            upper_bound: f64::INFINITY,
        }
    }

    /// Double restricted to `lower_bound ..= upper_bound`.
    pub fn bounded(lower_bound: f64, upper_bound: f64) -> Self {
        Self {
            lower_bound,
            upper_bound,
        }
    }

    /// Bound check for a runtime value.
    pub fn matches(&self, value: f64) -> bool {
        value >= self.lower_bound && value <= self.upper_bound
    }

    /// Parse a textual default value.
    pub fn from_default(&self, raw: &str) -> Result<f64> {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| self.matches(*v))
            .ok_or_else(|| SchemaError::WrongDefault {
                value: raw.to_string(),
                type_name: "Double".to_string(),
            })
    }
}

/// String schema type. Matches any text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StringType;

impl StringType {
    pub fn new() -> Self {
        Self
    }

    pub fn from_default(&self, raw: &str) -> Result<String> {
        Ok(raw.to_string())
    }
}

/// Direction of a file referenced from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Input,
    Output,
}

/// File path schema type. Output files may not be absolute paths; they are
/// always resolved relative to the run's output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileNameType {
    pub kind: FileKind,
}

impl FileNameType {
    pub fn input() -> Self {
        Self {
            kind: FileKind::Input,
        }
    }

    pub fn output() -> Self {
        Self {
            kind: FileKind::Output,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            FileKind::Input => "FileName_input",
            FileKind::Output => "FileName_output",
        }
    }

    /// Format check for a path value.
    pub fn matches(&self, path: &str) -> bool {
        match self.kind {
            FileKind::Input => true,
            FileKind::Output => !path.starts_with('/'),
        }
    }

    /// Parse a textual default value.
    pub fn from_default(&self, raw: &str) -> Result<String> {
        if self.matches(raw) {
            Ok(raw.to_string())
        } else {
            Err(SchemaError::WrongDefault {
                value: raw.to_string(),
                type_name: self.type_name().to_string(),
            })
        }
    }
}
