//! Staffing demand forecast.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::HeuristicConfig;
use crate::deserializers::{de_i64_rounded, de_u32_rounded};
use crate::features::{Feature, Period, PromptPair, last_n, mean, percentage};

const PROMPT_HISTORY: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    #[serde(default)]
    pub attendance: u32,
    #[serde(default)]
    pub leaves: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentHeadcount {
    pub name: String,
    #[serde(default)]
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastInput {
    #[serde(default)]
    pub history: Vec<HistoryPoint>,
    #[serde(default)]
    pub current_staff: u32,
    #[serde(default)]
    pub average_salary: f64,
    #[serde(default)]
    pub departments: Vec<DepartmentHeadcount>,
    pub period: Period,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffPrediction {
    pub date: NaiveDate,
    #[serde(deserialize_with = "de_u32_rounded")]
    pub required_staff: u32,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageGap {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub department: String,
    #[serde(default, deserialize_with = "de_i64_rounded")]
    pub gap_size: i64,
    pub severity: GapSeverity,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CostForecast {
    pub current_cost: f64,
    pub optimized_cost: f64,
    pub recommended_actions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForecastReport {
    pub predictions: Vec<StaffPrediction>,
    pub coverage_gaps: Vec<CoverageGap>,
    pub cost_optimization: CostForecast,
    pub insights: Vec<String>,
}

/// Required against available staff for one day. Negative gap means understaffed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffingGap {
    pub date: NaiveDate,
    pub required_staff: u32,
    pub available_staff: u32,
    pub gap: i64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostOutlook {
    pub current_cost: f64,
    pub optimized_cost: f64,
    pub savings: f64,
    pub savings_percentage: f64,
    pub recommended_actions: Vec<String>,
}

pub fn staffing_gaps(predictions: &[StaffPrediction], available: u32) -> Vec<StaffingGap> {
    predictions
        .iter()
        .map(|p| StaffingGap {
            date: p.date,
            required_staff: p.required_staff,
            available_staff: available,
            gap: available as i64 - p.required_staff as i64,
            confidence: p.confidence,
        })
        .collect()
}

pub fn cost_outlook(forecast: &CostForecast) -> CostOutlook {
    let savings = forecast.current_cost - forecast.optimized_cost;
    CostOutlook {
        current_cost: forecast.current_cost,
        optimized_cost: forecast.optimized_cost,
        savings,
        savings_percentage: percentage(savings, forecast.current_cost),
        recommended_actions: forecast.recommended_actions.clone(),
    }
}

pub struct DemandForecast;

impl Feature for DemandForecast {
    const NAME: &'static str = "demand_forecast";

    type Input = ForecastInput;
    type Output = ForecastReport;

    fn build_prompt(input: &ForecastInput, _rules: &HeuristicConfig) -> PromptPair {
        let history = last_n(&input.history, PROMPT_HISTORY)
            .iter()
            .map(|h| format!("- {}: {} present, {} on leave", h.date, h.attendance, h.leaves))
            .collect::<Vec<_>>()
            .join("\n");
        let history = if history.is_empty() {
            "- no history available".to_string()
        } else {
            history
        };
        let departments = if input.departments.is_empty() {
            "none recorded".to_string()
        } else {
            input
                .departments
                .iter()
                .map(|d| format!("{} ({})", d.name, d.count))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let prompt = format!(
            r#"Analyse the historical data below and forecast workforce needs.

Historical data (last {tail} points):
{history}

Current workforce:
- Total employees: {staff}
- Average salary: {salary:.2}
- Departments: {departments}

Forecast period:
- From: {start}
- To: {end}
- Days: {days}

Provide:
1. Daily required staff with a confidence level
2. Likely coverage gaps with severity and recommendations
3. Cost optimization with recommended actions
4. Key insights on trends and risks

Give exactly one prediction per day in the forecast period and no dates outside it.

Return JSON only:
{{
  "predictions": [ {{ "date": "YYYY-MM-DD", "requiredStaff": number, "confidence": 0.0-1.0 }} ],
  "coverageGaps": [
    {{ "startDate": "YYYY-MM-DD", "endDate": "YYYY-MM-DD", "department": "string", "gapSize": number, "severity": "LOW|MEDIUM|HIGH|CRITICAL", "recommendations": ["string"] }}
  ],
  "costOptimization": {{ "currentCost": number, "optimizedCost": number, "recommendedActions": ["string"] }},
  "insights": ["string"]
}}"#,
            tail = PROMPT_HISTORY,
            staff = input.current_staff,
            salary = input.average_salary,
            start = input.period.start,
            end = input.period.end,
            days = input.period.day_count(),
        );

        PromptPair {
            prompt,
            system_instruction: "You are an expert workforce analyst. Give precise, detailed \
                staffing forecasts based on historical data. Respond with JSON only."
                .to_string(),
        }
    }

    fn fallback(input: &ForecastInput, rules: &HeuristicConfig) -> ForecastReport {
        let avg_attendance = mean(input.history.iter().map(|h| h.attendance as f64));
        let avg_leaves = mean(input.history.iter().map(|h| h.leaves as f64));
        let required = (avg_attendance + avg_leaves).ceil() as u32;

        let predictions = input
            .period
            .days()
            .map(|date| StaffPrediction {
                date,
                required_staff: required,
                confidence: rules.forecast_confidence,
            })
            .collect();

        let current_cost = input.current_staff as f64 * input.average_salary;
        ForecastReport {
            predictions,
            coverage_gaps: Vec::new(),
            cost_optimization: CostForecast {
                current_cost,
                optimized_cost: current_cost * rules.forecast_optimized_cost_ratio,
                recommended_actions: vec![
                    "Improve shift scheduling".to_string(),
                    "Reduce overtime".to_string(),
                ],
            },
            insights: vec![
                format!("Average daily attendance: {:.0} employees", avg_attendance),
                format!("Average daily leaves: {:.0} employees", avg_leaves),
                "Limited data; collect more history for a sharper forecast".to_string(),
            ],
        }
    }

    fn finalize(_input: &ForecastInput, mut output: ForecastReport) -> ForecastReport {
        for p in &mut output.predictions {
            p.confidence = if p.confidence.is_finite() {
                p.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
        output
    }
}
