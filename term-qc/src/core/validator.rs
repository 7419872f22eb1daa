//! Structural and semantic validation of a QC specification.
//!
//! The validator is the only producer of [`Specification`] values. It checks
//! the document rule by rule in a fixed order and stops at the first
//! violation, so the same document always produces the same diagnostic.

use super::specification::{is_input_slot_name, General};
use super::{CheckSpec, ColumnRoles, InputSlot, Level, RawSpecification, SourceKind, Specification};
use crate::checks::{is_check_id, CheckKind, CheckRegistry};
use crate::error::ConfigError;
use serde_json::Value as JsonValue;
use serde_yaml::{Mapping, Value as YamlValue};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, error, warn};

/// Column roles every specification must map.
pub const REQUIRED_ROLES: [&str; 8] = [
    "patient_id_col",
    "matched_patient_id_col",
    "target_col",
    "date_cols",
    "count_cols",
    "freq_cols",
    "first_exp_date_cols",
    "last_exp_date_cols",
];

const OUTPUT_DIR_KEY: &str = "output_dir";
const SOURCE_KEY: &str = "source";
const LEVEL_KEY: &str = "level";
const INPUT_KEY: &str = "input_file";
const ORDER_KEY: &str = "order";
const PARAMS_KEYS: [&str; 2] = ["params", "qc_params"];

type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Whether every check must carry an explicit `order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderingPolicy {
    /// A check without `order` is a configuration error
    Required,
    /// Checks without `order` run after the ordered ones, by id
    #[default]
    Optional,
}

/// Validates raw specifications against a check registry.
///
/// # Examples
///
/// ```rust
/// use term_qc::checks::CheckRegistry;
/// use term_qc::core::{RawSpecification, Validator};
///
/// let registry = CheckRegistry::global();
/// let raw = RawSpecification::from_yaml_str("general:\n  output_dir: out/\n").unwrap();
///
/// let validator = Validator::new(&registry);
/// assert!(!validator.is_valid(&raw));
/// assert_eq!(
///     validator.validate(&raw).unwrap_err().to_string(),
///     "you need to specify at least one input file (input1, input2, ...)"
/// );
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    registry: &'a CheckRegistry,
    ordering: OrderingPolicy,
}

impl<'a> Validator<'a> {
    pub fn new(registry: &'a CheckRegistry) -> Self {
        Self {
            registry,
            ordering: OrderingPolicy::default(),
        }
    }

    pub fn with_ordering(mut self, ordering: OrderingPolicy) -> Self {
        self.ordering = ordering;
        self
    }

    /// Returns true if `raw` satisfies every rule. The first violation is
    /// logged.
    pub fn is_valid(&self, raw: &RawSpecification) -> bool {
        match self.validate(raw) {
            Ok(_) => true,
            Err(diagnostic) => {
                error!(%diagnostic, "Invalid QC specification");
                false
            }
        }
    }

    /// Validates `raw` and returns its normalized form.
    pub fn validate(&self, raw: &RawSpecification) -> ConfigResult<Specification> {
        let general = self.validate_general(raw.general.as_ref())?;
        let checks = self.validate_checks(raw.checks.as_ref(), &general)?;
        debug!(
            inputs = general.inputs.len(),
            checks = checks.len(),
            "Validated QC specification"
        );
        Ok(Specification::new(general, checks))
    }

    fn validate_general(&self, general: Option<&YamlValue>) -> ConfigResult<General> {
        let general = match general {
            None => return Err(ConfigError::MissingGeneral),
            Some(YamlValue::Null) => return Err(ConfigError::EmptyGeneral),
            Some(YamlValue::Mapping(map)) if map.is_empty() => {
                return Err(ConfigError::EmptyGeneral)
            }
            Some(YamlValue::Mapping(map)) => map,
            Some(_) => {
                return Err(ConfigError::Parse(
                    "the 'general' section must be a mapping".to_string(),
                ))
            }
        };

        let mut inputs = BTreeMap::new();
        for (key, value) in string_keyed(general) {
            if !is_input_slot_name(key) {
                continue;
            }
            let path = value
                .as_str()
                .filter(|path| !path.is_empty())
                .ok_or_else(|| ConfigError::InvalidInputPath {
                    slot: key.to_string(),
                })?;
            inputs.insert(key.to_string(), InputSlot::new(key, path));
        }
        if inputs.is_empty() {
            return Err(ConfigError::NoInputs);
        }

        let output_dir = general
            .get(OUTPUT_DIR_KEY)
            .and_then(YamlValue::as_str)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingOutputDir)?;

        let source = match general.get(SOURCE_KEY) {
            None | Some(YamlValue::Null) => {
                return Err(ConfigError::MissingSource {
                    allowed: SourceKind::allowed(),
                })
            }
            Some(value) => {
                let found = render(value);
                found
                    .parse::<SourceKind>()
                    .map_err(|found| ConfigError::InvalidSource {
                        found,
                        allowed: SourceKind::allowed(),
                    })?
            }
        };

        let missing: Vec<String> = REQUIRED_ROLES
            .iter()
            .filter(|role| !general.contains_key(**role))
            .map(|role| role.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingRoles { missing });
        }

        let mut roles = BTreeMap::new();
        for (key, value) in string_keyed(general) {
            if is_input_slot_name(key) || key == OUTPUT_DIR_KEY || key == SOURCE_KEY {
                continue;
            }
            roles.insert(key.to_string(), to_json(value)?);
        }

        Ok(General {
            inputs,
            output_dir,
            source,
            roles: ColumnRoles::new(roles),
        })
    }

    fn validate_checks(
        &self,
        checks: Option<&YamlValue>,
        general: &General,
    ) -> ConfigResult<BTreeMap<String, CheckSpec>> {
        let checks = match checks {
            None => return Err(ConfigError::MissingChecks),
            Some(YamlValue::Null) => return Err(ConfigError::NoChecks),
            Some(YamlValue::Mapping(map)) => map,
            Some(_) => {
                return Err(ConfigError::Parse(
                    "the 'checks' section must be a mapping".to_string(),
                ))
            }
        };

        let mut entries = BTreeMap::new();
        for (key, value) in checks {
            match key.as_str() {
                Some(id) if is_check_id(id) => {
                    entries.insert(id.to_string(), value);
                }
                _ => warn!(
                    key = %render(key),
                    "Ignoring entry under 'checks': check names look like qc<N>"
                ),
            }
        }
        if entries.is_empty() {
            return Err(ConfigError::NoChecks);
        }

        let mut validated = BTreeMap::new();
        for (id, body) in entries {
            let check = self.validate_check(&id, body, general)?;
            validated.insert(id, check);
        }

        let mut orders: BTreeMap<i64, &str> = BTreeMap::new();
        for check in validated.values() {
            let Some(order) = check.order else { continue };
            if let Some(first) = orders.insert(order, &check.id) {
                return Err(ConfigError::DuplicateOrder {
                    order,
                    first: first.to_string(),
                    second: check.id.clone(),
                });
            }
        }

        Ok(validated)
    }

    fn validate_check(&self, id: &str, body: &YamlValue, general: &General) -> ConfigResult<CheckSpec> {
        let Some(registered) = self.registry.get(id) else {
            return Err(ConfigError::UnknownCheck {
                check: id.to_string(),
            });
        };

        let empty = Mapping::new();
        let fields = match body {
            YamlValue::Mapping(map) => map,
            _ => &empty,
        };
        let mut required = vec![LEVEL_KEY, INPUT_KEY];
        if self.ordering == OrderingPolicy::Required {
            required.push(ORDER_KEY);
        }
        let missing: Vec<String> = required
            .into_iter()
            .filter(|field| fields.get(*field).is_none_or(YamlValue::is_null))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingCheckFields {
                check: id.to_string(),
                missing,
            });
        }

        let level_value = fields.get(LEVEL_KEY).map(render).unwrap_or_default();
        let level = level_value
            .parse::<Level>()
            .map_err(|found| ConfigError::InvalidLevel {
                check: id.to_string(),
                found,
            })?;

        let inputs = input_refs(id, fields.get(INPUT_KEY))?;
        if let Some(slot) = inputs.iter().find(|slot| !general.inputs.contains_key(*slot)) {
            return Err(ConfigError::UnknownInput {
                check: id.to_string(),
                slot: slot.clone(),
            });
        }

        if registered.kind() == CheckKind::Compare {
            if inputs.len() != 2 {
                return Err(ConfigError::ComparisonArity {
                    check: id.to_string(),
                    found: inputs.len(),
                });
            }
            if inputs[0] == inputs[1] {
                return Err(ConfigError::ComparisonSameInput {
                    check: id.to_string(),
                    slot: inputs[0].clone(),
                });
            }
            if let Some(slot) = inputs.iter().find(|slot| general.inputs[*slot].is_glob()) {
                return Err(ConfigError::ComparisonGlobInput {
                    check: id.to_string(),
                    slot: slot.clone(),
                });
            }
        } else if let Some(slot) = first_repeat(&inputs) {
            return Err(ConfigError::DuplicateInput {
                check: id.to_string(),
                slot: slot.to_string(),
            });
        }

        let order = match fields.get(ORDER_KEY) {
            None | Some(YamlValue::Null) => None,
            Some(value) => Some(value.as_i64().ok_or_else(|| ConfigError::InvalidOrder {
                check: id.to_string(),
            })?),
        };

        let params = check_params(id, fields)?;
        let missing: Vec<String> = registered
            .info
            .required_params
            .iter()
            .filter(|param| !params.contains_key(*param))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingParams {
                check: id.to_string(),
                missing,
            });
        }

        Ok(CheckSpec {
            id: id.to_string(),
            level,
            inputs,
            order,
            params,
        })
    }
}

fn string_keyed(map: &Mapping) -> impl Iterator<Item = (&str, &YamlValue)> {
    map.iter()
        .filter_map(|(key, value)| key.as_str().map(|key| (key, value)))
}

/// Scalars as written, anything else in YAML flow form.
fn render(value: &YamlValue) -> String {
    match value {
        YamlValue::String(s) => s.clone(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn to_json(value: &YamlValue) -> ConfigResult<JsonValue> {
    serde_json::to_value(value).map_err(|e| ConfigError::Parse(e.to_string()))
}

fn input_refs(id: &str, value: Option<&YamlValue>) -> ConfigResult<Vec<String>> {
    let invalid = || ConfigError::InvalidInputRef {
        check: id.to_string(),
    };
    match value {
        Some(YamlValue::String(slot)) => Ok(vec![slot.clone()]),
        Some(YamlValue::Sequence(slots)) if !slots.is_empty() => slots
            .iter()
            .map(|slot| slot.as_str().map(str::to_string).ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

fn first_repeat(slots: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    slots
        .iter()
        .find(|slot| !seen.insert(slot.as_str()))
        .map(String::as_str)
}

fn check_params(id: &str, fields: &Mapping) -> ConfigResult<BTreeMap<String, JsonValue>> {
    let invalid = || ConfigError::InvalidParams {
        check: id.to_string(),
    };
    let Some(value) = PARAMS_KEYS.iter().find_map(|key| fields.get(*key)) else {
        return Ok(BTreeMap::new());
    };
    match value {
        YamlValue::Null => Ok(BTreeMap::new()),
        YamlValue::Mapping(map) => {
            let mut params = BTreeMap::new();
            for (key, value) in map {
                let key = key.as_str().ok_or_else(invalid)?;
                params.insert(key.to_string(), to_json(value)?);
            }
            Ok(params)
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::SAMPLE_SPEC_YAML;
    use serde_json::json;

    fn registry() -> std::sync::Arc<CheckRegistry> {
        CheckRegistry::global()
    }

    fn raw_with(edit: impl FnOnce(&mut Mapping, &mut Mapping)) -> RawSpecification {
        let mut raw = RawSpecification::from_yaml_str(SAMPLE_SPEC_YAML).unwrap();
        let RawSpecification { general, checks } = &mut raw;
        edit(
            general.as_mut().unwrap().as_mapping_mut().unwrap(),
            checks.as_mut().unwrap().as_mapping_mut().unwrap(),
        );
        raw
    }

    fn check_mut<'m>(checks: &'m mut Mapping, id: &str) -> &'m mut Mapping {
        checks.get_mut(id).unwrap().as_mapping_mut().unwrap()
    }

    fn diagnostic(raw: &RawSpecification) -> ConfigError {
        let registry = registry();
        Validator::new(&registry).validate(raw).unwrap_err()
    }

    #[test]
    fn test_sample_is_valid() {
        let registry = registry();
        let raw = RawSpecification::from_yaml_str(SAMPLE_SPEC_YAML).unwrap();
        let validator = Validator::new(&registry);
        assert!(validator.is_valid(&raw));

        let spec = validator.validate(&raw).unwrap();
        assert_eq!(spec.inputs().len(), 2);
        assert_eq!(spec.source(), SourceKind::Csv);
        assert_eq!(spec.output_dir(), std::path::Path::new("out/"));
        assert_eq!(spec.roles().column("patient_id_col"), Some("PATIENT_ID"));
        assert_eq!(spec.roles().columns("date_cols"), vec!["_dt"]);

        let qc46 = &spec.checks()["qc46"];
        assert_eq!(qc46.inputs, vec!["input1", "input2"]);
        assert_eq!(qc46.level, Level::Warning);
        assert_eq!(qc46.order, Some(3));
    }

    #[test]
    fn test_missing_and_empty_general() {
        let raw = RawSpecification::from_yaml_str("checks:\n  qc1: {}").unwrap();
        assert_eq!(diagnostic(&raw), ConfigError::MissingGeneral);

        let raw = RawSpecification::from_yaml_str("general:\nchecks:\n  qc1: {}").unwrap();
        assert_eq!(diagnostic(&raw), ConfigError::EmptyGeneral);

        let raw = RawSpecification::from_yaml_str("general: {}\nchecks:\n  qc1: {}").unwrap();
        assert_eq!(diagnostic(&raw), ConfigError::EmptyGeneral);
    }

    #[test]
    fn test_inputs_required() {
        let raw = raw_with(|general, _| {
            general.remove("input1");
            general.remove("input2");
        });
        assert_eq!(diagnostic(&raw), ConfigError::NoInputs);

        let raw = raw_with(|general, _| {
            general.insert("input3".into(), YamlValue::from(12));
        });
        assert_eq!(
            diagnostic(&raw),
            ConfigError::InvalidInputPath {
                slot: "input3".into()
            }
        );
    }

    #[test]
    fn test_output_dir_required() {
        let raw = raw_with(|general, _| {
            general.remove("output_dir");
        });
        assert_eq!(diagnostic(&raw), ConfigError::MissingOutputDir);
    }

    #[test]
    fn test_source_rules() {
        let raw = raw_with(|general, _| {
            general.remove("source");
        });
        assert!(matches!(diagnostic(&raw), ConfigError::MissingSource { .. }));

        let raw = raw_with(|general, _| {
            general.insert("source".into(), "sql".into());
        });
        assert_eq!(
            diagnostic(&raw).to_string(),
            "source must be one of: csv, parquet, json, feather, found 'sql'"
        );
    }

    #[test]
    fn test_required_roles_are_listed() {
        let raw = raw_with(|general, _| {
            general.remove("target_col");
            general.remove("freq_cols");
        });
        assert_eq!(
            diagnostic(&raw),
            ConfigError::MissingRoles {
                missing: vec!["target_col".into(), "freq_cols".into()]
            }
        );
    }

    #[test]
    fn test_checks_section_rules() {
        let mut raw = RawSpecification::from_yaml_str(SAMPLE_SPEC_YAML).unwrap();
        raw.checks = None;
        assert_eq!(diagnostic(&raw), ConfigError::MissingChecks);

        raw.checks = Some(YamlValue::Null);
        assert_eq!(diagnostic(&raw), ConfigError::NoChecks);

        let raw = raw_with(|_, checks| {
            checks.clear();
            checks.insert("completeness".into(), YamlValue::Mapping(Mapping::new()));
        });
        assert_eq!(diagnostic(&raw), ConfigError::NoChecks);
    }

    #[test]
    fn test_ill_named_checks_are_ignored() {
        let registry = registry();
        let raw = raw_with(|_, checks| {
            checks.insert("not_a_check".into(), "whatever".into());
        });
        let spec = Validator::new(&registry).validate(&raw).unwrap();
        assert_eq!(spec.checks().len(), 3);
    }

    #[test]
    fn test_unknown_check() {
        let raw = raw_with(|_, checks| {
            let qc1 = checks.get("qc1").unwrap().clone();
            checks.insert("qc999".into(), qc1);
        });
        assert_eq!(
            diagnostic(&raw),
            ConfigError::UnknownCheck {
                check: "qc999".into()
            }
        );
    }

    #[test]
    fn test_check_fields_required() {
        let raw = raw_with(|_, checks| {
            check_mut(checks, "qc6").remove("level");
        });
        assert_eq!(
            diagnostic(&raw),
            ConfigError::MissingCheckFields {
                check: "qc6".into(),
                missing: vec!["level".into()]
            }
        );

        let raw = raw_with(|_, checks| {
            checks.insert("qc7".into(), YamlValue::Null);
        });
        assert_eq!(
            diagnostic(&raw),
            ConfigError::MissingCheckFields {
                check: "qc7".into(),
                missing: vec!["level".into(), "input_file".into()]
            }
        );
    }

    #[test]
    fn test_ordering_policy() {
        let registry = registry();
        let raw = raw_with(|_, checks| {
            check_mut(checks, "qc1").remove("order");
        });
        assert!(Validator::new(&registry).validate(&raw).is_ok());

        let err = Validator::new(&registry)
            .with_ordering(OrderingPolicy::Required)
            .validate(&raw)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingCheckFields {
                check: "qc1".into(),
                missing: vec!["order".into()]
            }
        );
    }

    #[test]
    fn test_invalid_level() {
        let raw = raw_with(|_, checks| {
            check_mut(checks, "qc1").insert("level".into(), "fatal".into());
        });
        assert_eq!(
            diagnostic(&raw),
            ConfigError::InvalidLevel {
                check: "qc1".into(),
                found: "fatal".into()
            }
        );
    }

    #[test]
    fn test_input_references() {
        let raw = raw_with(|_, checks| {
            check_mut(checks, "qc1").insert("input_file".into(), "input7".into());
        });
        assert_eq!(
            diagnostic(&raw),
            ConfigError::UnknownInput {
                check: "qc1".into(),
                slot: "input7".into()
            }
        );

        let raw = raw_with(|_, checks| {
            check_mut(checks, "qc1").insert("input_file".into(), YamlValue::from(1));
        });
        assert_eq!(
            diagnostic(&raw),
            ConfigError::InvalidInputRef {
                check: "qc1".into()
            }
        );
    }

    #[test]
    fn test_repeated_input_reference() {
        let raw = raw_with(|_, checks| {
            let twice = YamlValue::Sequence(vec!["input1".into(), "input1".into()]);
            check_mut(checks, "qc1").insert("input_file".into(), twice);
        });
        assert_eq!(
            diagnostic(&raw),
            ConfigError::DuplicateInput {
                check: "qc1".into(),
                slot: "input1".into()
            }
        );
    }

    #[test]
    fn test_comparison_inputs() {
        let raw = raw_with(|_, checks| {
            check_mut(checks, "qc46").insert("input_file".into(), "input1".into());
        });
        assert_eq!(
            diagnostic(&raw),
            ConfigError::ComparisonArity {
                check: "qc46".into(),
                found: 1
            }
        );

        let raw = raw_with(|_, checks| {
            let same = YamlValue::Sequence(vec!["input2".into(), "input2".into()]);
            check_mut(checks, "qc46").insert("input_file".into(), same);
        });
        assert_eq!(
            diagnostic(&raw),
            ConfigError::ComparisonSameInput {
                check: "qc46".into(),
                slot: "input2".into()
            }
        );

        let raw = raw_with(|general, _| {
            general.insert("input2".into(), "data/cohort_*.csv".into());
        });
        assert_eq!(
            diagnostic(&raw),
            ConfigError::ComparisonGlobInput {
                check: "qc46".into(),
                slot: "input2".into()
            }
        );
    }

    #[test]
    fn test_single_check_may_span_slots() {
        let registry = registry();
        let raw = raw_with(|_, checks| {
            let both = YamlValue::Sequence(vec!["input1".into(), "input2".into()]);
            check_mut(checks, "qc1").insert("input_file".into(), both);
        });
        let spec = Validator::new(&registry).validate(&raw).unwrap();
        assert_eq!(spec.checks()["qc1"].inputs.len(), 2);
    }

    #[test]
    fn test_invalid_order() {
        let raw = raw_with(|_, checks| {
            check_mut(checks, "qc6").insert("order".into(), "second".into());
        });
        assert_eq!(
            diagnostic(&raw),
            ConfigError::InvalidOrder {
                check: "qc6".into()
            }
        );
    }

    #[test]
    fn test_params() {
        let registry = registry();
        let qc48 = |params: Option<(&str, YamlValue)>| {
            raw_with(move |_, checks| {
                let mut body = check_mut(checks, "qc46").clone();
                body.insert("order".into(), YamlValue::from(4));
                if let Some((key, value)) = params {
                    body.insert(key.into(), value);
                }
                checks.insert("qc48".into(), YamlValue::Mapping(body));
            })
        };

        assert_eq!(
            diagnostic(&qc48(None)),
            ConfigError::MissingParams {
                check: "qc48".into(),
                missing: vec!["list_columns".into()]
            }
        );
        assert_eq!(
            diagnostic(&qc48(Some(("params", "A_count".into())))),
            ConfigError::InvalidParams {
                check: "qc48".into()
            }
        );

        let mut columns = Mapping::new();
        columns.insert(
            "list_columns".into(),
            YamlValue::Sequence(vec!["A_count".into()]),
        );
        let raw = qc48(Some(("qc_params", YamlValue::Mapping(columns))));
        let spec = Validator::new(&registry).validate(&raw).unwrap();
        assert_eq!(
            spec.checks()["qc48"].params["list_columns"],
            json!(["A_count"])
        );
    }

    #[test]
    fn test_duplicate_order() {
        let raw = raw_with(|_, checks| {
            check_mut(checks, "qc6").insert("order".into(), YamlValue::from(1));
        });
        assert_eq!(
            diagnostic(&raw),
            ConfigError::DuplicateOrder {
                order: 1,
                first: "qc1".into(),
                second: "qc6".into()
            }
        );
    }

    #[test]
    fn test_first_violation_wins() {
        let raw = raw_with(|general, checks| {
            general.remove("output_dir");
            check_mut(checks, "qc1").insert("level".into(), "fatal".into());
        });
        assert_eq!(diagnostic(&raw), ConfigError::MissingOutputDir);
    }

    #[test]
    fn test_extra_general_keys_become_roles() {
        let registry = registry();
        let raw = raw_with(|general, _| {
            general.insert("gender_col".into(), "SEX".into());
        });
        let spec = Validator::new(&registry).validate(&raw).unwrap();
        assert_eq!(spec.roles().column("gender_col"), Some("SEX"));
        assert!(!spec.roles().contains("output_dir"));
        assert!(!spec.roles().contains("input1"));
    }
}
