//! Raw record shape and field extraction across provider export formats

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::units::to_canonical_value;
use crate::series::{Dimensions, MetricKind};

const RESOURCE_ID_FIELDS: &[&str] = &["resource_id", "ResourceId", "instance_id", "lineItem/ResourceId"];
const METRIC_FIELDS: &[&str] = &["metric", "metric_name", "MeterCategory", "meter"];
const TIMESTAMP_FIELDS: &[&str] = &["timestamp", "date", "usage_start", "UsageStartDate", "lineItem/UsageStartDate"];
const VALUE_FIELDS: &[&str] = &["value", "quantity"];
const COST_FIELDS: &[&str] = &["cost", "amount", "lineItem/UnblendedCost", "CostInBillingCurrency", "PreTaxCost"];
const UNIT_FIELDS: &[&str] = &["unit", "Unit", "UnitOfMeasure", "pricing/unit"];
const CURRENCY_FIELDS: &[&str] = &["currency", "Currency", "BillingCurrency", "lineItem/CurrencyCode"];
const RESOURCE_GROUP_FIELDS: &[&str] = &["resource_group", "ResourceGroup", "account_id", "lineItem/UsageAccountId", "project"];
const REGION_FIELDS: &[&str] = &["region", "Region", "ResourceLocation", "product/region", "location"];
const SERVICE_FIELDS: &[&str] = &["service_type", "ServiceName", "ConsumedService", "service", "lineItem/ProductCode"];
const TAG_PREFIXES: &[&str] = &["tags.", "resourceTags/user:"];

/// One raw usage or billing record as exported by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawUsageRecord {
    /// Record fields, flat or nested
    pub data: Value,
}

impl RawUsageRecord {
    /// Wrap a JSON object
    pub fn new(data: Value) -> Self {
        Self { data }
    }
}

impl From<Value> for RawUsageRecord {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}

/// Record after field aliasing and unit conversion, before bucketing
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    /// Resource identity
    pub resource_id: String,
    /// Metric kind
    pub metric: MetricKind,
    /// Observation time
    pub timestamp: DateTime<Utc>,
    /// Value in canonical units
    pub value: f64,
    /// Dimensions carried by the record
    pub dimensions: Dimensions,
}

impl CanonicalRecord {
    /// Extract a canonical record; the error string explains what was wrong
    pub fn from_raw(raw: &RawUsageRecord, default_currency: &str) -> Result<Self, String> {
        if !raw.data.is_object() {
            return Err("record is not an object".to_string());
        }

        let resource_id = field_str(&raw.data, RESOURCE_ID_FIELDS)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "missing resource identity".to_string())?;

        let timestamp = field(&raw.data, TIMESTAMP_FIELDS)
            .ok_or_else(|| "missing timestamp".to_string())
            .and_then(parse_timestamp)?;

        let (metric, raw_value) = match field_str(&raw.data, METRIC_FIELDS) {
            Some(name) => {
                let metric = MetricKind::from_name(&name)
                    .ok_or_else(|| format!("unknown metric '{}'", name))?;
                let value = field(&raw.data, VALUE_FIELDS)
                    .or_else(|| field(&raw.data, COST_FIELDS))
                    .ok_or_else(|| "missing value".to_string())?;
                (metric, value)
            }
            None => {
                // Billing exports without a metric column carry cost only
                let value = field(&raw.data, COST_FIELDS)
                    .ok_or_else(|| "missing metric name".to_string())?;
                (MetricKind::Cost, value)
            }
        };

        let value = parse_value(raw_value)?;
        let unit = field_str(&raw.data, UNIT_FIELDS);
        let value = to_canonical_value(metric, unit.as_deref(), value)?;

        let mut dimensions = extract_dimensions(&raw.data);
        if metric == MetricKind::Cost {
            let currency = dimensions
                .currency
                .take()
                .or_else(|| unit.filter(|u| is_currency_code(u)))
                .unwrap_or_else(|| default_currency.to_string());
            dimensions.currency = Some(currency.to_ascii_uppercase());
        } else {
            dimensions.currency = None;
        }

        Ok(Self {
            resource_id,
            metric,
            timestamp,
            value,
            dimensions,
        })
    }
}

/// First present field among `aliases`; slash paths fall back to nested lookup
pub fn field<'a>(data: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|alias| {
        data.get(*alias)
            .or_else(|| {
                if alias.contains('/') {
                    data.pointer(&format!("/{}", alias))
                } else {
                    None
                }
            })
            .filter(|v| !v.is_null())
    })
}

fn field_str(data: &Value, aliases: &[&str]) -> Option<String> {
    field(data, aliases).and_then(|v| match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn extract_dimensions(data: &Value) -> Dimensions {
    let mut tags = BTreeMap::new();
    if let Some(Value::Object(map)) = data.get("tags") {
        for (key, value) in map {
            if let Some(value) = value.as_str() {
                tags.insert(key.clone(), value.to_string());
            }
        }
    }
    if let Value::Object(map) = data {
        for (key, value) in map {
            let Some(value) = value.as_str() else { continue };
            for prefix in TAG_PREFIXES {
                if let Some(tag) = key.strip_prefix(prefix) {
                    if !tag.is_empty() {
                        tags.insert(tag.to_string(), value.to_string());
                    }
                }
            }
        }
    }

    Dimensions {
        resource_group: field_str(data, RESOURCE_GROUP_FIELDS),
        region: field_str(data, REGION_FIELDS),
        service_type: field_str(data, SERVICE_FIELDS),
        currency: field_str(data, CURRENCY_FIELDS),
        tags,
    }
}

fn is_currency_code(unit: &str) -> bool {
    unit.len() == 3 && unit.chars().all(|c| c.is_ascii_alphabetic())
}

/// Parse RFC 3339, plain dates, naive date-times or epoch seconds
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, String> {
    match value {
        Value::String(s) => parse_datetime_str(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .ok_or_else(|| format!("invalid epoch timestamp {}", n)),
        other => Err(format!("invalid timestamp {}", other)),
    }
}

fn parse_datetime_str(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
        .map_err(|e| format!("invalid timestamp '{}': {}", s, e))
}

/// Parse a number or numeric string
pub fn parse_value(value: &Value) -> Result<f64, String> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches('$').replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("invalid value {}", value))
}
