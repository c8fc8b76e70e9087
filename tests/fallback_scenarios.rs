use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;

use hrms_insight::clients::ScriptedBackend;
use hrms_insight::config::HeuristicConfig;
use hrms_insight::extract::extract_value;
use hrms_insight::features::cost::{CostInput, CostOptimization, OptimizationType, WorkforceSnapshot};
use hrms_insight::features::forecast::{DemandForecast, ForecastInput, HistoryPoint};
use hrms_insight::features::schema_gap::{SchemaGap, SchemaGapInput};
use hrms_insight::{AnalysisSource, Config, Feature, ModelInvoker, Orchestrator, Period};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn config(candidates: &[&str]) -> Config {
    let mut config = Config::default();
    config.generation.candidates = candidates.iter().map(|c| c.to_string()).collect();
    config.generation.retry_backoff_ms = 0;
    config
}

fn scenario_c_input() -> CostInput {
    CostInput {
        workforce: WorkforceSnapshot {
            total_employees: 40,
            average_salary: 6000.0,
            total_overtime_hours: 150.0,
            total_overtime_cost: 10000.0,
            attendance_rate: 95.0,
            ..WorkforceSnapshot::default()
        },
        period: Period::new(date(2025, 3, 1), date(2025, 3, 31)),
        focus: Vec::new(),
    }
}

#[tokio::test]
async fn quota_and_missing_models_advance_to_next_candidate() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .fail("m1", "429 Quota exceeded")
            .fail("m2", "404 model not found")
            .respond("m3", "{\"ok\":true}"),
    );
    let invoker = ModelInvoker::new(backend.clone(), config(&["m1", "m2", "m3"]).generation).unwrap();
    let request = invoker.request_for(&hrms_insight::PromptPair {
        prompt: "ping".into(),
        system_instruction: "Answer in JSON only.".into(),
    });

    let generation = invoker.invoke(&request).await.unwrap();
    let value = extract_value(Some(&generation.text)).unwrap();

    assert_eq!(value, json!({"ok": true}));
    assert_eq!(generation.model, "m3");
    assert_eq!(generation.attempts, 3);
    assert_eq!(backend.attempts(), vec!["m1", "m2", "m3"]);
}

#[tokio::test]
async fn vehicle_policy_without_model_suggests_vehicle_log() {
    let orchestrator = Orchestrator::heuristic_only(&Config::default()).unwrap();
    let input = SchemaGapInput::new("هل يمكن صرف بدل سيارة شهري؟");

    let analysis = orchestrator.run::<SchemaGap>(&input).await;

    assert!(analysis.used_fallback());
    assert!(!analysis.data.can_execute);
    let model = analysis
        .data
        .suggested_models
        .iter()
        .find(|m| m.name == "VehicleLog")
        .expect("VehicleLog suggested");
    assert!(model.schema.starts_with("model VehicleLog {"));
    assert!(model.schema.contains("@@map(\"vehicle_log\")"));

    let value = serde_json::to_value(&analysis).unwrap();
    assert_eq!(value["feature"], "schema_gap");
    assert_eq!(value["source"]["kind"], "heuristic");
    assert_eq!(value["data"]["canExecute"], false);
}

#[tokio::test]
async fn overtime_heavy_workforce_gets_two_recommendations() {
    let orchestrator = Orchestrator::heuristic_only(&Config::default()).unwrap();

    let analysis = orchestrator.run::<CostOptimization>(&scenario_c_input()).await;
    let recs = &analysis.data.recommendations;

    assert_eq!(recs.len(), 2);
    let overtime: Vec<_> = recs
        .iter()
        .filter(|r| r.optimization_type == OptimizationType::OvertimeReduction)
        .collect();
    assert_eq!(overtime.len(), 1);
    assert!((overtime[0].potential_savings - 3000.0).abs() < 1e-9);
    assert_eq!(overtime[0].analysis_data.affected_employees, 12);
    assert!(recs.iter().any(|r| r.title == "Improve overall operating efficiency"));
}

#[tokio::test]
async fn unconfigured_backend_matches_direct_fallback() {
    let backend = Arc::new(ScriptedBackend::unconfigured().respond("m1", "{\"predictions\":[]}"));
    let orchestrator = Orchestrator::with_backend(backend.clone(), &config(&["m1"])).unwrap();
    let input = ForecastInput {
        history: (1..=5)
            .map(|d| HistoryPoint {
                date: date(2025, 2, d),
                attendance: 30,
                leaves: 3,
            })
            .collect(),
        current_staff: 35,
        average_salary: 5000.0,
        departments: Vec::new(),
        period: Period::new(date(2025, 3, 1), date(2025, 3, 7)),
    };

    let analysis = orchestrator.run::<DemandForecast>(&input).await;

    assert_eq!(analysis.data, DemandForecast::fallback(&input, &HeuristicConfig::default()));
    assert_eq!(
        analysis.source,
        AnalysisSource::Heuristic {
            reason: "unavailable".into()
        }
    );
    assert_eq!(analysis.data.predictions.len(), 7);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn fatal_backend_error_falls_back_without_trying_later_candidates() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .fail("m1", "403 PERMISSION_DENIED: API key not valid")
            .respond("m2", "{\"recommendations\":[],\"insights\":[]}"),
    );
    let orchestrator = Orchestrator::with_backend(backend.clone(), &config(&["m1", "m2"])).unwrap();

    let analysis = orchestrator.run::<CostOptimization>(&scenario_c_input()).await;

    match &analysis.source {
        AnalysisSource::Heuristic { reason } => {
            assert!(reason.starts_with("non_retryable_generation_failure"), "{reason}")
        }
        other => panic!("expected heuristic source, got {other:?}"),
    }
    assert_eq!(backend.attempts(), vec!["m1"]);
    assert_eq!(analysis.data.recommendations.len(), 2);
}
