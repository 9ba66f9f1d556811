use serde_json::json;
use std::sync::Arc;
use stratoswarm_cost_analytics::{
    policy::PolicyDetails,
    recommendation::{ReservedOffer, SizeTierPrice},
    AnalysisPipeline, AnalysisReport, AnalysisRequest, AnalyticsConfig, DetectionMethod,
    GapPolicy, Policy, PolicyStatus, RawUsageRecord, ReasonCode, RecommendationType,
    ResourceMetadata, RiskLevel, Sensitivity, StaticPricingCatalog,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn day(offset: i64) -> String {
    (chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset))
        .format("%Y-%m-%d")
        .to_string()
}

fn metric_records(resource: &str, metric: &str, unit: &str, values: &[f64]) -> Vec<RawUsageRecord> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            RawUsageRecord::from(json!({
                "resource_id": resource,
                "metric": metric,
                "unit": unit,
                "timestamp": day(i as i64),
                "value": v,
                "region": "eastus",
            }))
        })
        .collect()
}

fn cost_records(resource: &str, values: &[f64]) -> Vec<RawUsageRecord> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            RawUsageRecord::from(json!({
                "resource_id": resource,
                "timestamp": day(i as i64),
                "cost": v,
                "currency": "USD",
                "resource_group": "engineering",
            }))
        })
        .collect()
}

fn catalog() -> StaticPricingCatalog {
    StaticPricingCatalog::new("USD")
        .with_size_ladder(
            "vm",
            "eastus",
            vec![
                SizeTierPrice::new("Standard_D2s_v3", 0.096),
                SizeTierPrice::new("Standard_D4s_v3", 0.192),
                SizeTierPrice::new("Standard_D8s_v3", 0.384),
            ],
        )
        .with_reserved_offers("vm", "eastus", ReservedOffer::standard_offers())
}

fn pipeline(config: AnalyticsConfig) -> AnalysisPipeline {
    init_tracing();
    AnalysisPipeline::new(config, Arc::new(catalog())).unwrap()
}

fn vm_metadata(resource: &str) -> ResourceMetadata {
    ResourceMetadata::new(resource)
        .with_compute("vm", "Standard_D4s_v3")
        .with_region("eastus")
}

#[tokio::test]
async fn test_low_cpu_vm_is_rightsized() {
    let cpu: Vec<f64> = (0..90).map(|i| 10.0 + (i % 5) as f64).collect();
    let request = AnalysisRequest::new(metric_records("vm-1", "cpu_utilization", "percent", &cpu))
        .with_metadata(vec![vm_metadata("vm-1")]);
    let report = pipeline(AnalyticsConfig::default()).run(request).await.unwrap();

    assert_eq!(report.recommendations.len(), 1);
    let rec = &report.recommendations[0];
    assert_eq!(rec.recommendation_type, RecommendationType::RightSize);
    assert!(rec.estimated_monthly_savings > 0.0);
    assert_eq!(rec.risk, RiskLevel::Low);
    assert!(rec.confidence > 0.0 && rec.confidence <= 1.0);
    assert_eq!(rec.evidence.series_ids[0].resource_id, "vm-1");
}

#[tokio::test]
async fn test_budget_overrun_is_violated() {
    let policy: Policy = serde_json::from_value(json!({
        "kind": "budget",
        "id": "eng-q1",
        "amount": 5000.0,
        "currency": "USD",
        "thresholds": [50.0, 75.0, 90.0, 100.0],
        "period_start": "2024-01-01T00:00:00Z",
        "period_end": "2024-06-30T00:00:00Z"
    }))
    .unwrap();
    let request = AnalysisRequest::new(cost_records("sub-1", &[52.0; 100])).with_policies(vec![policy]);
    let report = pipeline(AnalyticsConfig::default()).run(request).await.unwrap();

    assert_eq!(report.policy_results.len(), 1);
    let result = &report.policy_results[0];
    assert_eq!(result.status, PolicyStatus::Violated);
    match &result.details {
        PolicyDetails::Budget(details) => {
            assert!((details.current_spend - 5200.0).abs() < 1e-6);
            assert!(details.utilization_percent > 100.0);
        }
        other => panic!("unexpected details {:?}", other),
    }
}

#[tokio::test]
async fn test_budget_counts_series_with_a_missing_day() {
    let policy: Policy = serde_json::from_value(json!({
        "kind": "budget",
        "id": "eng-q1",
        "amount": 5000.0,
        "currency": "USD",
        "thresholds": [50.0, 75.0, 90.0, 100.0],
        "period_start": "2024-01-01T00:00:00Z",
        "period_end": "2024-06-30T00:00:00Z"
    }))
    .unwrap();
    let mut records = cost_records("sub-1", &[52.0; 100]);
    records.remove(50);
    let request = AnalysisRequest::new(records)
        .with_gap_policy(GapPolicy::Drop)
        .with_policies(vec![policy]);
    let report = pipeline(AnalyticsConfig::default()).run(request).await.unwrap();

    assert_eq!(report.omissions_with(ReasonCode::DiscontinuousSeries).count(), 1);
    assert!(report.forecasts.is_empty());
    assert!(report.anomalies.is_empty());

    let result = &report.policy_results[0];
    assert_eq!(result.status, PolicyStatus::Violated);
    assert_eq!(result.affected_resources, vec!["sub-1".to_string()]);
    match &result.details {
        PolicyDetails::Budget(details) => {
            assert!((details.current_spend - 99.0 * 52.0).abs() < 1e-6);
            assert_eq!(details.days_until_depletion, Some(0));
        }
        other => panic!("unexpected details {:?}", other),
    }
}

#[tokio::test]
async fn test_rerun_with_new_history_refits_forecasts() {
    let pipeline = pipeline(AnalyticsConfig::default());
    let first = pipeline
        .run(AnalysisRequest::new(cost_records("vm-1", &[10.0; 20])))
        .await
        .unwrap();
    let second = pipeline
        .run(AnalysisRequest::new(cost_records("vm-1", &[500.0; 20])))
        .await
        .unwrap();

    assert!((first.forecasts[0].points[0].point_estimate - 10.0).abs() < 1e-6);
    assert!((second.forecasts[0].points[0].point_estimate - 500.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_single_spike_flagged_once() {
    let mut costs = vec![100.0; 30];
    costs[20] = 1000.0;
    let request = AnalysisRequest::new(cost_records("vm-1", &costs))
        .with_detection(DetectionMethod::Statistical, Sensitivity::High);
    let report = pipeline(AnalyticsConfig::default()).run(request).await.unwrap();

    assert_eq!(report.anomalies.len(), 1);
    let flag = &report.anomalies[0];
    assert_eq!(flag.timestamp.date_naive().to_string(), day(20));
    assert!(flag.severity > 0.8);
}

#[tokio::test]
async fn test_zero_reservation_budget_is_infeasible() {
    let request = AnalysisRequest::new(metric_records("vm-1", "usage_hours", "hours", &[24.0; 60]))
        .with_metadata(vec![vm_metadata("vm-1")]);

    let unconstrained = pipeline(AnalyticsConfig::default())
        .run(request.clone())
        .await
        .unwrap();
    assert!(unconstrained
        .recommendations
        .iter()
        .any(|r| r.recommendation_type == RecommendationType::ReservedCapacity));

    let mut config = AnalyticsConfig::default();
    config.recommendation.reserved.budget_ceiling = Some(0.0);
    let report = pipeline(config).run(request).await.unwrap();

    assert!(report.recommendations.is_empty());
    let infeasible: Vec<_> = report.omissions_with(ReasonCode::InfeasiblePlan).collect();
    assert_eq!(infeasible.len(), 1);
    assert!(infeasible[0].scope.starts_with("vm-1"));
}

#[tokio::test]
async fn test_reports_are_deterministic() {
    let mut records = Vec::new();
    let cpu: Vec<f64> = (0..30).map(|d| 5.0 + (d % 4) as f64).collect();
    for resource in ["vm-c", "vm-a", "vm-b"] {
        records.extend(metric_records(resource, "cpu_utilization", "percent", &cpu));
    }
    let metadata = vec![vm_metadata("vm-a"), vm_metadata("vm-b"), vm_metadata("vm-c")];
    let request = AnalysisRequest::new(records).with_metadata(metadata);

    let mut reversed = request.clone();
    reversed.records.reverse();

    let pipeline = pipeline(AnalyticsConfig::default());
    let first = pipeline.run(request).await.unwrap();
    let second = pipeline.run(reversed).await.unwrap();

    let key = |report: &AnalysisReport| {
        report
            .recommendations
            .iter()
            .map(|r| (r.resource_id.clone(), r.recommendation_type, r.estimated_monthly_savings))
            .collect::<Vec<_>>()
    };
    assert_eq!(key(&first), key(&second));
    assert_eq!(first.omissions, second.omissions);
    let ids: Vec<_> = first.recommendations.iter().map(|r| r.resource_id.as_str()).collect();
    assert_eq!(ids, vec!["vm-a", "vm-b", "vm-c"]);
}

#[tokio::test]
async fn test_forecast_bounds_hold() {
    let costs: Vec<f64> = (0..60).map(|i| 50.0 + i as f64 * 0.5 + (i % 7) as f64 * 3.0).collect();
    let report = pipeline(AnalyticsConfig::default())
        .run(AnalysisRequest::new(cost_records("vm-1", &costs)))
        .await
        .unwrap();

    assert_eq!(report.forecasts.len(), 1);
    for point in &report.forecasts[0].points {
        assert!(point.lower_bound >= 0.0);
        assert!(point.lower_bound <= point.point_estimate);
        assert!(point.point_estimate <= point.upper_bound);
    }
}

#[tokio::test]
async fn test_bad_inputs_do_not_abort_the_run() {
    let mut records = cost_records("vm-1", &[10.0; 20]);
    records.push(RawUsageRecord::from(json!({"resource_id": "vm-1", "cost": 3.0})));
    records.push(RawUsageRecord::from(json!({
        "resource_id": "vm-1",
        "metric": "egress_gb",
        "unit": "furlongs",
        "timestamp": day(3),
        "value": 1.0,
    })));
    let bad_policy: Policy = serde_json::from_value(json!({
        "kind": "tag",
        "id": "owner-format",
        "rules": {"owner": {"type": "pattern", "pattern": "([a-z"}}
    }))
    .unwrap();

    let request = AnalysisRequest::new(records)
        .with_gap_policy(GapPolicy::ZeroFill)
        .with_policies(vec![bad_policy]);
    let report = pipeline(AnalyticsConfig::default()).run(request).await.unwrap();

    assert_eq!(report.malformed_records, 2);
    assert_eq!(report.omissions_with(ReasonCode::MalformedRecord).count(), 2);
    assert_eq!(report.policy_errors.len(), 1);
    assert_eq!(report.policy_errors[0].policy_id, "owner-format");
    assert_eq!(report.forecasts.len(), 1);
}
