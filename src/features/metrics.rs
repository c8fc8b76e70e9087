//! Business metrics and their correlation with staffing needs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::HeuristicConfig;
use crate::features::{Feature, PromptPair, last_n, round2};

const PROMPT_TAIL: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricType {
    Sales,
    Production,
    Orders,
    Traffic,
    Workload,
    Custom,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Sales => "SALES",
            MetricType::Production => "PRODUCTION",
            MetricType::Orders => "ORDERS",
            MetricType::Traffic => "TRAFFIC",
            MetricType::Workload => "WORKLOAD",
            MetricType::Custom => "CUSTOM",
        }
    }

    /// Fixed correlation estimate used when no model is available.
    fn baseline(&self) -> (f64, Impact, &'static str) {
        match self {
            MetricType::Sales => (
                0.8,
                Impact::High,
                "Higher sales call for more customer service and sales staff",
            ),
            MetricType::Production => (
                0.85,
                Impact::High,
                "Adjust production headcount to the expected production volume",
            ),
            MetricType::Orders => (
                0.75,
                Impact::High,
                "More orders call for stronger delivery and warehouse teams",
            ),
            MetricType::Traffic => (
                0.7,
                Impact::Medium,
                "Customer traffic drives reception and service staffing",
            ),
            MetricType::Workload => (
                0.9,
                Impact::High,
                "Workload maps directly onto hiring needs",
            ),
            MetricType::Custom => (
                0.5,
                Impact::Low,
                "Analyse how this metric relates to staffing needs",
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Impact {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub metric_type: MetricType,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub average: f64,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: f64,
    #[serde(default)]
    pub change_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkforcePoint {
    pub date: NaiveDate,
    #[serde(default)]
    pub attendance: u32,
    #[serde(default)]
    pub leaves: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsInput {
    pub summaries: Vec<MetricSummary>,
    pub trends: Vec<TrendPoint>,
    pub workforce: Vec<WorkforcePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkforceCorrelation {
    pub metric: String,
    #[serde(default)]
    pub correlation: f64,
    pub impact: Impact,
    #[serde(default)]
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsAnalysis {
    pub insights: Vec<String>,
    pub workforce_correlation: Vec<WorkforceCorrelation>,
}

/// Trend points for a date-ordered series, with percentage change from the previous value.
///
/// The first point and points after a zero value carry a change of 0.
pub fn trend_from_series(series: &[(NaiveDate, f64)]) -> Vec<TrendPoint> {
    let mut previous: Option<f64> = None;
    series
        .iter()
        .map(|(date, value)| {
            let change = match previous {
                Some(prev) if prev != 0.0 => round2((value - prev) / prev * 100.0),
                _ => 0.0,
            };
            previous = Some(*value);
            TrendPoint {
                date: *date,
                value: *value,
                change_percentage: change,
            }
        })
        .collect()
}

pub struct MetricsCorrelation;

impl Feature for MetricsCorrelation {
    const NAME: &'static str = "metrics_correlation";

    type Input = MetricsInput;
    type Output = MetricsAnalysis;

    fn build_prompt(input: &MetricsInput, _rules: &HeuristicConfig) -> PromptPair {
        let summaries = input
            .summaries
            .iter()
            .map(|s| {
                format!(
                    "- {}: total={:.2}, average={:.2}, min={:.2}, max={:.2}, records={}",
                    s.metric_type.as_str(),
                    s.total,
                    s.average,
                    s.min,
                    s.max,
                    s.count
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let trends = last_n(&input.trends, PROMPT_TAIL)
            .iter()
            .map(|t| format!("- {}: {:.2} (change: {:.2}%)", t.date, t.value, t.change_percentage))
            .collect::<Vec<_>>()
            .join("\n");
        let workforce = last_n(&input.workforce, PROMPT_TAIL)
            .iter()
            .map(|w| format!("- {}: attendance={}, leaves={}", w.date, w.attendance, w.leaves))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            r#"Analyse how the business metrics below relate to workforce needs.

Metric summaries:
{summaries}

Metric trends (last {tail} points):
{trends}

Workforce data (last {tail} points):
{workforce}

Provide:
1. Insights on metric performance and trends
2. How each metric relates to staffing needs
3. Recommendations for better planning

Only describe metrics listed in the summaries.

Return JSON only:
{{
  "insights": ["string"],
  "workforceCorrelation": [
    {{ "metric": "SALES|PRODUCTION|ORDERS|TRAFFIC|WORKLOAD|CUSTOM", "correlation": 0.0-1.0, "impact": "LOW|MEDIUM|HIGH", "recommendation": "string" }}
  ]
}}"#,
            summaries = or_none(summaries),
            trends = or_none(trends),
            workforce = or_none(workforce),
            tail = PROMPT_TAIL,
        );

        PromptPair {
            prompt,
            system_instruction: "You are an expert data analyst focused on the link between \
                business metrics and workforce needs. Respond with JSON only."
                .to_string(),
        }
    }

    fn fallback(input: &MetricsInput, _rules: &HeuristicConfig) -> MetricsAnalysis {
        let mut analysis = MetricsAnalysis::default();

        for summary in &input.summaries {
            if summary.count > 0 {
                analysis.insights.push(format!(
                    "Metric {}: average {:.2} over {} records",
                    summary.metric_type.as_str(),
                    summary.average,
                    summary.count
                ));
            }
            let (correlation, impact, recommendation) = summary.metric_type.baseline();
            analysis.workforce_correlation.push(WorkforceCorrelation {
                metric: summary.metric_type.as_str().to_string(),
                correlation,
                impact,
                recommendation: recommendation.to_string(),
            });
        }

        if analysis.insights.is_empty() {
            analysis
                .insights
                .push("Not enough data for analysis".to_string());
            analysis
                .insights
                .push("Add more business metrics for better insights".to_string());
        }
        analysis
    }

    fn finalize(_input: &MetricsInput, mut output: MetricsAnalysis) -> MetricsAnalysis {
        for c in &mut output.workforce_correlation {
            c.correlation = if c.correlation.is_finite() {
                c.correlation.clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
        output
    }
}

fn or_none(block: String) -> String {
    if block.is_empty() {
        "- none".to_string()
    } else {
        block
    }
}
