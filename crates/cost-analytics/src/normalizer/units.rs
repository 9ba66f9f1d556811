//! Unit conversion into canonical units per metric kind

use crate::series::MetricKind;

const GB_PER_MB: f64 = 1.0 / 1024.0;
const GB_PER_TB: f64 = 1024.0;
const GB_PER_BYTE: f64 = 1.0 / (1024.0 * 1024.0 * 1024.0);

/// Convert `value` expressed in `unit` into the canonical unit of `metric`
pub fn to_canonical_value(metric: MetricKind, unit: Option<&str>, value: f64) -> Result<f64, String> {
    let unit = unit.map(|u| u.trim().to_ascii_lowercase());
    let unit = unit.as_deref().filter(|u| !u.is_empty());

    let factor = match metric {
        MetricKind::Cost => match unit {
            None | Some("currency") => 1.0,
            Some(u) if u.len() == 3 && u.chars().all(|c| c.is_ascii_alphabetic()) => 1.0,
            Some(u) => return Err(unknown_unit(metric, u)),
        },
        MetricKind::CpuUtilization | MetricKind::MemoryUtilization => match unit {
            None | Some("percent") | Some("%") | Some("pct") => 1.0,
            Some("ratio") | Some("fraction") => 100.0,
            Some(u) => return Err(unknown_unit(metric, u)),
        },
        MetricKind::StorageUsedGb | MetricKind::EgressGb | MetricKind::CrossRegionGb => match unit {
            None | Some("gb") | Some("gib") | Some("gigabytes") => 1.0,
            Some("mb") | Some("mib") | Some("megabytes") => GB_PER_MB,
            Some("tb") | Some("tib") | Some("terabytes") => GB_PER_TB,
            Some("bytes") | Some("b") => GB_PER_BYTE,
            Some(u) => return Err(unknown_unit(metric, u)),
        },
        MetricKind::StorageAccessCount => match unit {
            None | Some("count") | Some("requests") | Some("operations") => 1.0,
            Some("10k") => 10_000.0,
            Some(u) => return Err(unknown_unit(metric, u)),
        },
        MetricKind::UsageHours => match unit {
            None | Some("hours") | Some("hour") | Some("hrs") | Some("h") => 1.0,
            Some("minutes") | Some("min") => 1.0 / 60.0,
            Some("seconds") | Some("s") => 1.0 / 3600.0,
            Some(u) => return Err(unknown_unit(metric, u)),
        },
    };

    let converted = value * factor;
    if metric != MetricKind::Cost && converted < 0.0 {
        return Err(format!("negative {} value {}", metric, value));
    }
    Ok(converted)
}

fn unknown_unit(metric: MetricKind, unit: &str) -> String {
    format!("unknown unit '{}' for {}", unit, metric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_utilization_fraction_scaled_to_percent() {
        let v = to_canonical_value(MetricKind::CpuUtilization, Some("Ratio"), 0.12).unwrap();
        assert_relative_eq!(v, 12.0, epsilon = 1e-9);
        let v = to_canonical_value(MetricKind::MemoryUtilization, Some("%"), 30.0).unwrap();
        assert_relative_eq!(v, 30.0);
    }

    #[test]
    fn test_storage_units_convert_to_gb() {
        assert_relative_eq!(
            to_canonical_value(MetricKind::StorageUsedGb, Some("TB"), 2.0).unwrap(),
            2048.0
        );
        assert_relative_eq!(
            to_canonical_value(MetricKind::EgressGb, Some("MB"), 512.0).unwrap(),
            0.5
        );
        assert_relative_eq!(
            to_canonical_value(MetricKind::CrossRegionGb, Some("bytes"), 1_073_741_824.0).unwrap(),
            1.0
        );
    }

    #[test]
    fn test_runtime_minutes_to_hours() {
        assert_relative_eq!(
            to_canonical_value(MetricKind::UsageHours, Some("minutes"), 90.0).unwrap(),
            1.5
        );
    }

    #[test]
    fn test_unknown_units_rejected() {
        assert!(to_canonical_value(MetricKind::EgressGb, Some("furlongs"), 1.0).is_err());
        assert!(to_canonical_value(MetricKind::CpuUtilization, Some("GB"), 1.0).is_err());
    }

    #[test]
    fn test_negative_usage_rejected_but_credits_allowed() {
        assert!(to_canonical_value(MetricKind::UsageHours, None, -1.0).is_err());
        assert_eq!(to_canonical_value(MetricKind::Cost, Some("USD"), -5.0).unwrap(), -5.0);
    }
}
