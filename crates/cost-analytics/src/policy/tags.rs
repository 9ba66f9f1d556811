//! Tag compliance policies

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::types::{
    PolicyDetails, PolicyKind, PolicyResult, PolicyStatus, TagDetails, TagViolation,
    TagViolationReason,
};
use crate::error::{CostAnalyticsError, CostAnalyticsResult};
use crate::series::{Dimensions, TimeSeries};

/// How a tag value is checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TagMatcher {
    /// Value must be one of a fixed set
    AllowedValues {
        /// Accepted values, compared exactly
        values: BTreeSet<String>,
    },
    /// Value must fully match a regular expression
    Pattern {
        /// Regular expression, anchored on both ends when compiled
        pattern: String,
    },
}

fn default_required() -> bool {
    true
}

/// Rule for one tag key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    /// How present values are checked
    #[serde(flatten)]
    pub matcher: TagMatcher,
    /// Missing tag is a violation when set; otherwise only present values are checked
    #[serde(default = "default_required")]
    pub required: bool,
}

impl TagRule {
    /// Required rule restricted to a set of values
    pub fn allowed<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            matcher: TagMatcher::AllowedValues {
                values: values.into_iter().map(Into::into).collect(),
            },
            required: true,
        }
    }

    /// Required rule matching a pattern
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self {
            matcher: TagMatcher::Pattern {
                pattern: pattern.into(),
            },
            required: true,
        }
    }

    /// Make the rule optional
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Tag policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPolicy {
    /// Policy identifier
    pub id: String,
    /// Rules keyed by tag name
    pub rules: BTreeMap<String, TagRule>,
}

enum CompiledCheck<'a> {
    Allowed(&'a BTreeSet<String>),
    Pattern(Regex),
}

struct CompiledRule<'a> {
    tag: &'a str,
    check: CompiledCheck<'a>,
    required: bool,
}

impl TagPolicy {
    fn compile(&self) -> CostAnalyticsResult<Vec<CompiledRule<'_>>> {
        let invalid = |reason: String| CostAnalyticsError::InvalidPolicy {
            policy_id: self.id.clone(),
            reason,
        };
        if self.rules.is_empty() {
            return Err(invalid("rule set is empty".to_string()));
        }

        self.rules
            .iter()
            .map(|(tag, rule)| {
                let check = match &rule.matcher {
                    TagMatcher::AllowedValues { values } => {
                        if values.is_empty() {
                            return Err(invalid(format!("tag '{}' allows no values", tag)));
                        }
                        CompiledCheck::Allowed(values)
                    }
                    TagMatcher::Pattern { pattern } => {
                        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                            invalid(format!("tag '{}' pattern does not compile: {}", tag, e))
                        })?;
                        CompiledCheck::Pattern(regex)
                    }
                };
                Ok(CompiledRule {
                    tag: tag.as_str(),
                    check,
                    required: rule.required,
                })
            })
            .collect()
    }

    /// Reject malformed definitions
    pub fn validate(&self) -> CostAnalyticsResult<()> {
        self.compile().map(|_| ())
    }

    /// Evaluate every resource appearing in `series`
    pub fn evaluate(&self, series: &[TimeSeries]) -> CostAnalyticsResult<PolicyResult> {
        let rules = self.compile()?;

        let mut resources: BTreeMap<&str, &Dimensions> = BTreeMap::new();
        for s in series {
            resources.entry(s.id.resource_id.as_str()).or_insert(&s.dimensions);
        }

        let mut violations = Vec::new();
        let mut non_compliant = Vec::new();
        for (resource_id, dimensions) in &resources {
            let before = violations.len();
            for rule in &rules {
                let reason = match (dimensions.tag(rule.tag), &rule.check) {
                    (None, _) if rule.required => Some(TagViolationReason::Missing),
                    (None, _) => None,
                    (Some(value), CompiledCheck::Allowed(values)) => {
                        (!values.contains(value)).then_some(TagViolationReason::NotAllowed)
                    }
                    (Some(value), CompiledCheck::Pattern(regex)) => {
                        (!regex.is_match(value)).then_some(TagViolationReason::PatternMismatch)
                    }
                };
                if let Some(reason) = reason {
                    violations.push(TagViolation {
                        resource_id: resource_id.to_string(),
                        tag: rule.tag.to_string(),
                        reason,
                    });
                }
            }
            if violations.len() > before {
                non_compliant.push(resource_id.to_string());
            }
        }

        let evaluated = resources.len();
        let compliance_percent = if evaluated == 0 {
            100.0
        } else {
            (evaluated - non_compliant.len()) as f64 / evaluated as f64 * 100.0
        };

        Ok(PolicyResult {
            policy_id: self.id.clone(),
            kind: PolicyKind::Tag,
            status: if non_compliant.is_empty() {
                PolicyStatus::Compliant
            } else {
                PolicyStatus::Violated
            },
            affected_resources: non_compliant.clone(),
            details: PolicyDetails::Tag(TagDetails {
                resources_evaluated: evaluated,
                violation_count: non_compliant.len(),
                non_compliant_resources: non_compliant,
                compliance_percent,
                violations,
            }),
        })
    }
}
