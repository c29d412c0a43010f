//! Job parameter store and `#name#` substitution.

use hive_core::ParamValue;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::r#trait::{JobError, Result};

static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#(\w(?:[\w.:-]*\w)?)#").expect("Invalid regex pattern"));

/// Keyed job parameters: runnable defaults overlaid with job values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamStore {
    /// Defaults declared by the runnable
    defaults: BTreeMap<String, ParamValue>,

    /// Values supplied for this job
    values: BTreeMap<String, ParamValue>,
}

impl ParamStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `values`.
    pub fn with_values(values: BTreeMap<String, ParamValue>) -> Self {
        Self {
            defaults: BTreeMap::new(),
            values,
        }
    }

    /// Look up a parameter; job values shadow defaults.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name).or_else(|| self.defaults.get(name))
    }

    /// Whether a non-null value is available for `name`.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.is_null())
    }

    /// Set a job value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Merge job values, overwriting existing ones.
    pub fn merge(&mut self, values: BTreeMap<String, ParamValue>) {
        self.values.extend(values);
    }

    /// Install runnable defaults. Existing defaults with the same name are replaced.
    pub fn set_defaults(&mut self, defaults: BTreeMap<String, ParamValue>) {
        self.defaults.extend(defaults);
    }

    /// Effective parameter set (defaults overlaid with values).
    pub fn flattened(&self) -> BTreeMap<String, ParamValue> {
        let mut all = self.defaults.clone();
        all.extend(self.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        all
    }

    /// Replace every `#name#` marker in `text` with the parameter's value.
    ///
    /// String values are spliced verbatim, any other value in its encoded
    /// form. A marker naming a missing or null parameter is an error.
    pub fn substitute(&self, text: &str) -> Result<String> {
        let mut missing = None;
        let substituted = PLACEHOLDER_REGEX.replace_all(text, |caps: &Captures| {
            match self.get(&caps[1]).filter(|v| !v.is_null()) {
                Some(value) => value.to_param_string(),
                None => {
                    missing.get_or_insert_with(|| caps[1].to_string());
                    caps[0].to_string()
                }
            }
        });

        match missing {
            Some(name) => Err(JobError::Substitution {
                name,
                text: text.to_string(),
            }),
            None => Ok(substituted.into_owned()),
        }
    }

    /// Substitute inside a parameter value.
    ///
    /// A string that is exactly one marker is replaced by the referenced
    /// value itself, keeping its type; other strings go through
    /// [`substitute`](Self::substitute). Lists and mappings are walked.
    pub fn substitute_value(&self, value: &ParamValue) -> Result<ParamValue> {
        match value {
            ParamValue::String(s) => {
                if let Some(caps) = PLACEHOLDER_REGEX.captures(s) {
                    if caps[0].len() == s.len() {
                        if let Some(found) = self.get(&caps[1]).filter(|v| !v.is_null()) {
                            return Ok(found.clone());
                        }
                    }
                }
                Ok(ParamValue::String(self.substitute(s)?))
            }
            ParamValue::List(items) => Ok(ParamValue::List(
                items
                    .iter()
                    .map(|item| self.substitute_value(item))
                    .collect::<Result<_>>()?,
            )),
            ParamValue::Map(entries) => Ok(ParamValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.substitute_value(v)?)))
                    .collect::<Result<_>>()?,
            )),
            other => Ok(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ParamStore {
        let mut params = ParamStore::new();
        params.set("name", "reads");
        params.set("chunk", 7i64);
        params.set("files", vec!["a.fq", "b.fq"]);
        params.set("nothing", ParamValue::Null);
        params
    }

    #[test]
    fn test_values_shadow_defaults() {
        let mut params = store();
        params.set_defaults([("chunk".to_string(), ParamValue::Int(1)), ("mode".to_string(), ParamValue::from("fast"))].into());
        assert_eq!(params.get("chunk"), Some(&ParamValue::Int(7)));
        assert_eq!(params.get("mode"), Some(&ParamValue::from("fast")));
        assert!(!params.has("nothing"));
        assert!(!params.has("absent"));
        assert_eq!(params.flattened().len(), 5);
    }

    #[test]
    fn test_substitute_scalars_and_structures() {
        let params = store();
        assert_eq!(params.substitute("wc -l #name#.txt").unwrap(), "wc -l reads.txt");
        assert_eq!(params.substitute("split -n #chunk#").unwrap(), "split -n 7");
        assert_eq!(params.substitute("echo '#files#'").unwrap(), r#"echo '["a.fq","b.fq"]'"#);
        assert_eq!(params.substitute("# not a marker #").unwrap(), "# not a marker #");
    }

    #[test]
    fn test_substitute_reports_unresolved_marker() {
        let params = store();
        match params.substitute("cat #missing# #name#") {
            Err(JobError::Substitution { name, text }) => {
                assert_eq!(name, "missing");
                assert_eq!(text, "cat #missing# #name#");
            }
            other => panic!("expected substitution error, got {:?}", other),
        }
        assert!(params.substitute("echo #nothing#").is_err());
    }

    #[test]
    fn test_substitute_value_keeps_type_of_whole_marker() {
        let params = store();
        let value = ParamValue::from(vec!["#files#", "--chunk=#chunk#"]);
        let resolved = params.substitute_value(&value).unwrap();
        assert_eq!(
            resolved,
            ParamValue::List(vec![
                ParamValue::from(vec!["a.fq", "b.fq"]),
                ParamValue::from("--chunk=7"),
            ])
        );
    }
}
