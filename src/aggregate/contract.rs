//! API contract middleware for the aggregation engine's parameter surface.
//!
//! Distinct from `crate::contract::SchemaContract` (which governs CSV
//! *input* shape for the loader): this one governs the *query* parameter
//! shape for `aggregate`/`dashboard` -- declared once per endpoint, resolves
//! camelCase/snake_case aliasing, fills defaults, and records violations
//! for observability rather than silently dropping them. Business-rule
//! validation (closed group-by/metric token sets, limit bounds) happens one
//! layer down in `AggregateParams::from_normalized` and is always hard
//! enforced regardless of contract mode -- this layer only concerns param
//! *shape*, not aggregation semantics.

use std::collections::BTreeMap;

/// Warn-mode logs a violation and proceeds with best effort; enforce-mode
/// turns the same violation into a hard `QueryValidationError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractMode {
    Warn,
    Enforce,
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub canonical_name: &'static str,
    /// Additional spellings accepted from callers, e.g. `groupBy` for
    /// `group_by`. The canonical name itself is always accepted.
    pub aliases: &'static [&'static str],
    pub required: bool,
    pub default: Option<&'static str>,
}

impl ParamSpec {
    const fn new(canonical_name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            canonical_name,
            aliases,
            required: false,
            default: None,
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn default_value(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }
}

/// A declared parameter schema for one endpoint (`aggregate` or
/// `dashboard`). Constructed once at process start; stateless after that.
pub struct EndpointContract {
    pub endpoint: &'static str,
    pub params: &'static [ParamSpec],
    pub mode: ContractMode,
}

/// Outcome of normalizing one request's raw params against an
/// `EndpointContract`: the canonical dict plus anything that went sideways,
/// for attachment to a request-scoped log context.
#[derive(Debug, Clone, Default)]
pub struct NormalizedParams {
    pub values: BTreeMap<String, String>,
    pub violations: Vec<String>,
}

impl EndpointContract {
    pub const AGGREGATE: EndpointContract = EndpointContract {
        endpoint: "aggregate",
        params: &[
            ParamSpec::new("group_by", &["groupBy"]).required(),
            ParamSpec::new("metrics", &["metrics"]).required(),
            ParamSpec::new("districts", &["districts[]"]),
            ParamSpec::new("bedrooms", &["bedrooms[]"]),
            ParamSpec::new("segments", &["segments[]"]),
            ParamSpec::new("sale_type", &["saleType"]),
            ParamSpec::new("date_from", &["dateFrom", "from"]),
            ParamSpec::new("date_to", &["dateTo", "to"]),
            ParamSpec::new("psf_min", &["psfMin"]),
            ParamSpec::new("psf_max", &["psfMax"]),
            ParamSpec::new("size_min", &["sizeMin"]),
            ParamSpec::new("size_max", &["sizeMax"]),
            ParamSpec::new("tenure", &["tenure"]),
            ParamSpec::new("project", &["project"]),
            ParamSpec::new("project_exact", &["projectExact"]),
            ParamSpec::new("property_age_bucket", &["propertyAgeBucket", "ageBand"]),
            ParamSpec::new("limit", &["limit"]).default_value("1000"),
            ParamSpec::new("schema", &["schemaVersion"]).default_value("v2"),
        ],
        mode: ContractMode::Warn,
    };

    pub const DASHBOARD: EndpointContract = EndpointContract {
        endpoint: "dashboard",
        params: &[
            ParamSpec::new("panels", &["panels[]"]).required(),
            ParamSpec::new("districts", &["districts[]"]),
            ParamSpec::new("bedrooms", &["bedrooms[]"]),
            ParamSpec::new("segments", &["segments[]"]),
            ParamSpec::new("sale_type", &["saleType"]),
            ParamSpec::new("date_from", &["dateFrom", "from"]),
            ParamSpec::new("date_to", &["dateTo", "to"]),
            ParamSpec::new("tenure", &["tenure"]),
            ParamSpec::new("schema", &["schemaVersion"]).default_value("v2"),
        ],
        mode: ContractMode::Warn,
    };

    /// Resolves aliases, fills defaults, and records (rather than silently
    /// dropping) anything that doesn't fit the declared shape: unrecognized
    /// keys, or required fields left unset with no default.
    pub fn normalize(&self, raw: &BTreeMap<String, String>) -> Result<NormalizedParams, crate::error::CoreError> {
        let mut values = BTreeMap::new();
        let mut violations = Vec::new();
        let mut consumed_raw_keys = std::collections::BTreeSet::new();

        for spec in self.params {
            let mut found = None;
            for key in std::iter::once(&spec.canonical_name).chain(spec.aliases.iter()) {
                if let Some(v) = raw.get(*key) {
                    found = Some(v.clone());
                    consumed_raw_keys.insert(key.to_string());
                    break;
                }
            }

            match found {
                Some(v) => {
                    values.insert(spec.canonical_name.to_string(), v);
                }
                None => {
                    if let Some(default) = spec.default {
                        values.insert(spec.canonical_name.to_string(), default.to_string());
                    } else if spec.required {
                        violations.push(format!("missing required param '{}'", spec.canonical_name));
                    }
                }
            }
        }

        for raw_key in raw.keys() {
            if !consumed_raw_keys.contains(raw_key) {
                violations.push(format!("unrecognized param '{raw_key}'"));
            }
        }

        for violation in &violations {
            tracing::warn!(endpoint = self.endpoint, %violation, "contract violation");
        }

        if self.mode == ContractMode::Enforce {
            if let Some(missing) = violations.iter().find(|v| v.starts_with("missing required")) {
                return Err(crate::error::CoreError::QueryValidation {
                    field: self.endpoint.to_string(),
                    message: missing.clone(),
                });
            }
        }

        Ok(NormalizedParams { values, violations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn camel_case_alias_resolves_to_canonical_name() {
        let normalized = EndpointContract::AGGREGATE
            .normalize(&raw(&[("groupBy", "region"), ("metrics", "count")]))
            .unwrap();
        assert_eq!(normalized.values.get("group_by"), Some(&"region".to_string()));
    }

    #[test]
    fn defaults_are_filled_when_absent() {
        let normalized = EndpointContract::AGGREGATE
            .normalize(&raw(&[("group_by", "region"), ("metrics", "count")]))
            .unwrap();
        assert_eq!(normalized.values.get("limit"), Some(&"1000".to_string()));
        assert_eq!(normalized.values.get("schema"), Some(&"v2".to_string()));
    }

    #[test]
    fn missing_required_param_is_recorded_as_violation_in_warn_mode() {
        let normalized = EndpointContract::AGGREGATE.normalize(&raw(&[("group_by", "region")])).unwrap();
        assert!(normalized.violations.iter().any(|v| v.contains("metrics")));
    }

    #[test]
    fn unrecognized_param_is_recorded_as_violation() {
        let normalized = EndpointContract::AGGREGATE
            .normalize(&raw(&[("group_by", "region"), ("metrics", "count"), ("bogus", "1")]))
            .unwrap();
        assert!(normalized.violations.iter().any(|v| v.contains("bogus")));
    }

    #[test]
    fn enforce_mode_rejects_missing_required_param() {
        let enforce = EndpointContract {
            mode: ContractMode::Enforce,
            ..EndpointContract::AGGREGATE
        };
        let result = enforce.normalize(&raw(&[("group_by", "region")]));
        assert!(result.is_err());
    }
}
