//! The declarative QC specification.
//!
//! A specification is read in two stages. [`RawSpecification`] is the document
//! exactly as authored, kept loosely typed so that the validator can describe
//! what is wrong with it. [`Specification`] is the normalized form; it can only
//! be produced by [`Validator::validate`](crate::core::Validator::validate).
//!
//! ```yaml
//! general:
//!   input1: data/cohort.csv
//!   input2: data/cohort_*.csv
//!   output_dir: out/
//!   source: csv
//!   patient_id_col: PATIENT_ID
//!   # ... the remaining column roles
//! checks:
//!   qc1:
//!     input_file: input1
//!     level: error
//!     order: 1
//!   qc46:
//!     input_file: [input1, input2]
//!     level: warning
//!     order: 2
//! ```

use crate::core::Level;
use crate::error::{ConfigError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The wildcard token that turns an input slot into a multi-file slot.
pub const WILDCARD: char = '*';

static INPUT_SLOT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^input\d{1,2}$").expect("Hard-coded regex pattern should be valid"));

/// Returns true if `key` names an input slot (`input1` .. `input99`).
pub fn is_input_slot_name(key: &str) -> bool {
    INPUT_SLOT_REGEX.is_match(key)
}

/// The specification document as authored.
///
/// Both sections are kept as raw YAML values; `None` means the key is absent,
/// `Some(Null)` means it is present but empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSpecification {
    pub general: Option<YamlValue>,
    pub checks: Option<YamlValue>,
}

impl RawSpecification {
    /// Builds a raw specification from a parsed document root.
    pub fn from_value(root: YamlValue) -> std::result::Result<Self, ConfigError> {
        let map = match root {
            YamlValue::Mapping(map) => map,
            YamlValue::Null => return Ok(Self::default()),
            _ => {
                return Err(ConfigError::Parse(
                    "the document root must be a mapping".to_string(),
                ))
            }
        };
        Ok(Self {
            general: map.get("general").cloned(),
            checks: map.get("checks").cloned(),
        })
    }

    /// Parses a YAML document.
    ///
    /// Parser errors carry the line and column the parser stopped at; the
    /// actual mistake is usually on the line right above.
    pub fn from_yaml_str(text: &str) -> std::result::Result<Self, ConfigError> {
        let root: YamlValue =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_value(root)
    }

    /// Parses a JSON document.
    pub fn from_json_str(text: &str) -> std::result::Result<Self, ConfigError> {
        let json: JsonValue =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let root = serde_yaml::to_value(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_value(root)
    }

    /// Reads a specification file, choosing the parser from the extension
    /// (`.json` is JSON, anything else is YAML).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let raw = if is_json {
            Self::from_json_str(&text)?
        } else {
            Self::from_yaml_str(&text)?
        };
        Ok(raw)
    }
}

/// Storage format of the input datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Delimited text with a header row
    Csv,
    /// Apache Parquet
    Parquet,
    /// Newline-delimited JSON
    Json,
    /// Feather v2 / Arrow IPC file
    Feather,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Csv,
        SourceKind::Parquet,
        SourceKind::Json,
        SourceKind::Feather,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Csv => "csv",
            SourceKind::Parquet => "parquet",
            SourceKind::Json => "json",
            SourceKind::Feather => "feather",
        }
    }

    /// Comma separated list of accepted names, for diagnostics.
    pub fn allowed() -> String {
        Self::ALL
            .iter()
            .map(SourceKind::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// A named reference to one dataset path, or to a family of paths when the
/// configured path contains [`WILDCARD`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSlot {
    pub name: String,
    pub path: String,
}

impl InputSlot {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Returns true if the slot resolves to several files at plan time.
    pub fn is_glob(&self) -> bool {
        self.path.contains(WILDCARD)
    }
}

/// Semantic column-role mappings shared by every check, e.g. which column
/// holds the record identifier.
///
/// A role maps either to a single column name or to a list of names/suffixes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnRoles(BTreeMap<String, JsonValue>);

impl ColumnRoles {
    pub fn new(roles: BTreeMap<String, JsonValue>) -> Self {
        Self(roles)
    }

    /// Raw value of a role.
    pub fn get(&self, role: &str) -> Option<&JsonValue> {
        self.0.get(role)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains_key(role)
    }

    /// The role as a single column name, if it is one.
    pub fn column(&self, role: &str) -> Option<&str> {
        self.0.get(role).and_then(JsonValue::as_str)
    }

    /// The role as a list of names. A single string becomes a one-element list,
    /// anything else an empty one.
    pub fn columns(&self, role: &str) -> Vec<String> {
        match self.0.get(role) {
            Some(JsonValue::String(name)) => vec![name.clone()],
            Some(JsonValue::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }
}

/// One entry of the `checks` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSpec {
    /// Registry key of the check body
    pub id: String,
    pub level: Level,
    /// Referenced input slot names, as written
    pub inputs: Vec<String>,
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, JsonValue>,
}

impl CheckSpec {
    /// Sort key used wherever checks are sequenced: by order, unordered last,
    /// ties broken by id.
    pub fn sort_key(&self) -> (bool, i64, &str) {
        (
            self.order.is_none(),
            self.order.unwrap_or_default(),
            self.id.as_str(),
        )
    }
}

/// The `general` section, normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct General {
    pub inputs: BTreeMap<String, InputSlot>,
    pub output_dir: PathBuf,
    pub source: SourceKind,
    pub roles: ColumnRoles,
}

/// A validated specification.
///
/// There is no public constructor: the only way to obtain one is through the
/// validator, which makes planning an unvalidated document impossible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Specification {
    general: General,
    checks: BTreeMap<String, CheckSpec>,
}

impl Specification {
    pub(crate) fn new(general: General, checks: BTreeMap<String, CheckSpec>) -> Self {
        Self { general, checks }
    }

    pub fn general(&self) -> &General {
        &self.general
    }

    pub fn inputs(&self) -> &BTreeMap<String, InputSlot> {
        &self.general.inputs
    }

    pub fn input(&self, name: &str) -> Option<&InputSlot> {
        self.general.inputs.get(name)
    }

    pub fn output_dir(&self) -> &Path {
        &self.general.output_dir
    }

    pub fn source(&self) -> SourceKind {
        self.general.source
    }

    pub fn roles(&self) -> &ColumnRoles {
        &self.general.roles
    }

    /// Checks keyed by id.
    pub fn checks(&self) -> &BTreeMap<String, CheckSpec> {
        &self.checks
    }
}
