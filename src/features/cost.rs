//! Workforce cost optimization recommendations.

use serde::{Deserialize, Serialize};

use crate::config::HeuristicConfig;
use crate::deserializers::{de_u32_rounded, de_u8_rounded};
use crate::features::{Feature, Period, PromptPair, bounded_lines, mean, percentage, round2};

const MAX_PROMPT_DEPARTMENTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationType {
    ScheduleAdjustment,
    HeadcountChange,
    ShiftRestructure,
    OvertimeReduction,
    CostSaving,
}

impl OptimizationType {
    pub const ALL: [OptimizationType; 5] = [
        OptimizationType::ScheduleAdjustment,
        OptimizationType::HeadcountChange,
        OptimizationType::ShiftRestructure,
        OptimizationType::OvertimeReduction,
        OptimizationType::CostSaving,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationType::ScheduleAdjustment => "SCHEDULE_ADJUSTMENT",
            OptimizationType::HeadcountChange => "HEADCOUNT_CHANGE",
            OptimizationType::ShiftRestructure => "SHIFT_RESTRUCTURE",
            OptimizationType::OvertimeReduction => "OVERTIME_REDUCTION",
            OptimizationType::CostSaving => "COST_SAVING",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentCost {
    #[serde(default)]
    pub department_id: String,
    pub department_name: String,
    #[serde(default)]
    pub employee_count: u32,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub overtime_hours: f64,
}

/// Aggregates for one analysis period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkforceSnapshot {
    pub total_employees: u32,
    pub average_salary: f64,
    pub total_overtime_hours: f64,
    pub total_overtime_cost: f64,
    /// Percentage, 0..=100
    pub attendance_rate: f64,
    pub absenteeism_cost: f64,
    pub department_costs: Vec<DepartmentCost>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostInput {
    pub workforce: WorkforceSnapshot,
    pub period: Period,
    /// Restrict recommendations to these types; empty means all.
    #[serde(default)]
    pub focus: Vec<OptimizationType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisData {
    #[serde(deserialize_with = "de_u32_rounded")]
    pub affected_employees: u32,
    pub implementation_timeline: String,
    #[serde(rename = "expectedROI")]
    pub expected_roi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRecommendation {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub optimization_type: OptimizationType,
    #[serde(default)]
    pub current_cost: f64,
    #[serde(default)]
    pub optimized_cost: f64,
    #[serde(default)]
    pub potential_savings: f64,
    #[serde(default)]
    pub savings_percentage: f64,
    /// 1 (lowest) to 4 (highest)
    #[serde(default = "default_priority", deserialize_with = "de_u8_rounded")]
    pub priority: u8,
    /// Implementation steps
    #[serde(default)]
    pub recommendations: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risks: Option<String>,
    #[serde(default)]
    pub analysis_data: AnalysisData,
}

fn default_priority() -> u8 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostPlan {
    #[serde(default)]
    pub recommendations: Vec<CostRecommendation>,
    #[serde(default)]
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    pub total_current_cost: f64,
    pub total_optimized_cost: f64,
    pub total_potential_savings: f64,
    pub overall_savings_percentage: f64,
}

/// Totals across recommendations, savings percentage rounded to 2 decimals.
pub fn summarize(recommendations: &[CostRecommendation]) -> CostSummary {
    let mut summary = CostSummary::default();
    for rec in recommendations {
        summary.total_current_cost += rec.current_cost;
        summary.total_optimized_cost += rec.optimized_cost;
        summary.total_potential_savings += rec.potential_savings;
    }
    summary.overall_savings_percentage = round2(percentage(
        summary.total_potential_savings,
        summary.total_current_cost,
    ));
    summary
}

/// Cost of `hours` overtime at the premium rate for an average salary.
pub fn overtime_cost(hours: f64, average_salary: f64, rules: &HeuristicConfig) -> f64 {
    let hourly = average_salary / rules.monthly_working_hours;
    hours * hourly * rules.overtime_multiplier
}

fn steps(items: &[&str]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n")
}

fn overtime_rule(w: &WorkforceSnapshot, rules: &HeuristicConfig) -> Option<(CostRecommendation, String)> {
    if w.total_overtime_hours <= rules.overtime_hours_threshold {
        return None;
    }
    let rate = rules.overtime_savings_rate;
    let savings = w.total_overtime_cost * rate;
    let rec = CostRecommendation {
        title: "Reduce overtime hours".to_string(),
        description: "Rework shift scheduling to lean less on overtime".to_string(),
        optimization_type: OptimizationType::OvertimeReduction,
        current_cost: w.total_overtime_cost,
        optimized_cost: w.total_overtime_cost * (1.0 - rate),
        potential_savings: savings,
        savings_percentage: rate * 100.0,
        priority: 3,
        recommendations: steps(&[
            "Review current shift rosters",
            "Identify periods with heavy overtime",
            "Redistribute work across employees",
            "Hire extra staff for peak periods",
        ]),
        requirements: Some("Shift data analysis, management approval".to_string()),
        risks: Some("May need temporary extra hiring".to_string()),
        analysis_data: AnalysisData {
            affected_employees: (w.total_employees as f64 * rules.overtime_affected_share).ceil()
                as u32,
            implementation_timeline: "2-4 weeks".to_string(),
            expected_roi: savings * 12.0,
        },
    };
    let insight = format!(
        "Overtime is high ({:.0} hours); better scheduling is recommended",
        w.total_overtime_hours
    );
    Some((rec, insight))
}

fn attendance_rule(w: &WorkforceSnapshot, rules: &HeuristicConfig) -> Option<(CostRecommendation, String)> {
    // No headcount means no measured attendance.
    if w.total_employees == 0 || w.attendance_rate >= rules.attendance_rate_threshold {
        return None;
    }
    let rate = rules.attendance_savings_rate;
    let savings = w.absenteeism_cost * rate;
    let rec = CostRecommendation {
        title: "Improve attendance".to_string(),
        description: "Run programs that raise commitment and cut absence".to_string(),
        optimization_type: OptimizationType::CostSaving,
        current_cost: w.absenteeism_cost,
        optimized_cost: w.absenteeism_cost * (1.0 - rate),
        potential_savings: savings,
        savings_percentage: rate * 100.0,
        priority: 4,
        recommendations: steps(&[
            "Introduce attendance rewards",
            "Review leave policies",
            "Improve the work environment",
            "Follow up on repeated absence",
        ]),
        requirements: Some("Attendance tracking, reward budget".to_string()),
        risks: Some("Results may take time to show".to_string()),
        analysis_data: AnalysisData {
            affected_employees: w.total_employees,
            implementation_timeline: "1-3 months".to_string(),
            expected_roi: savings * 12.0,
        },
    };
    let insight = format!(
        "Attendance is low ({:.1}%); commitment programs are recommended",
        w.attendance_rate
    );
    Some((rec, insight))
}

fn department_rule(w: &WorkforceSnapshot, rules: &HeuristicConfig) -> Option<CostRecommendation> {
    let departments = &w.department_costs;
    if departments.is_empty() {
        return None;
    }
    let overtime_share = w.total_overtime_hours / departments.len() as f64;
    let heavy: Vec<&DepartmentCost> = departments
        .iter()
        .filter(|d| d.overtime_hours > overtime_share)
        .collect();
    if heavy.is_empty() {
        return None;
    }

    let rate = rules.department_savings_rate;
    let average_cost = mean(departments.iter().map(|d| d.total_cost));
    let savings = heavy
        .iter()
        .map(|d| (d.total_cost - average_cost) * rate)
        .sum::<f64>()
        .max(0.0);
    let current: f64 = heavy.iter().map(|d| d.total_cost).sum();
    let review = format!(
        "Review department structure: {}",
        heavy
            .iter()
            .map(|d| d.department_name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Some(CostRecommendation {
        title: "Restructure high-cost departments".to_string(),
        description: "Rebalance staff across departments".to_string(),
        optimization_type: OptimizationType::ShiftRestructure,
        current_cost: current,
        optimized_cost: current * (1.0 - rate),
        potential_savings: savings,
        savings_percentage: rate * 100.0,
        priority: 2,
        recommendations: steps(&[
            review.as_str(),
            "Analyse tasks and workload",
            "Move staff between departments as needed",
        ]),
        requirements: Some("Department head approval, redistribution plan".to_string()),
        risks: Some("Staff resistance to change".to_string()),
        analysis_data: AnalysisData {
            affected_employees: heavy.iter().map(|d| d.employee_count).sum(),
            implementation_timeline: "1-2 months".to_string(),
            expected_roi: savings * 12.0,
        },
    })
}

fn general_rule(w: &WorkforceSnapshot, rules: &HeuristicConfig) -> CostRecommendation {
    let rate = rules.general_savings_rate;
    let monthly = w.total_employees as f64 * w.average_salary;
    CostRecommendation {
        title: "Improve overall operating efficiency".to_string(),
        description: "Apply proven practices to raise operational efficiency".to_string(),
        optimization_type: OptimizationType::CostSaving,
        current_cost: monthly,
        optimized_cost: monthly * (1.0 - rate),
        potential_savings: monthly * rate,
        savings_percentage: rate * 100.0,
        priority: 1,
        recommendations: steps(&[
            "Review current processes",
            "Automate repetitive tasks",
            "Train staff on efficiency",
            "Apply quality standards",
        ]),
        requirements: Some("Process analysis, training budget".to_string()),
        risks: Some("Needs long-term commitment".to_string()),
        analysis_data: AnalysisData {
            affected_employees: w.total_employees,
            implementation_timeline: "3-6 months".to_string(),
            expected_roi: monthly * rate * 12.0,
        },
    }
}

pub struct CostOptimization;

impl Feature for CostOptimization {
    const NAME: &'static str = "cost_optimization";

    type Input = CostInput;
    type Output = CostPlan;

    fn build_prompt(input: &CostInput, _rules: &HeuristicConfig) -> PromptPair {
        let w = &input.workforce;
        let departments = bounded_lines(
            &w.department_costs,
            MAX_PROMPT_DEPARTMENTS,
            |d| {
                format!(
                    "- {}: {} employees, cost {:.2}, overtime {:.2} hours",
                    d.department_name, d.employee_count, d.total_cost, d.overtime_hours
                )
            },
            |more| format!("- ... and {} more departments", more),
        );
        let departments = if departments.is_empty() {
            "- none recorded".to_string()
        } else {
            departments
        };
        let focus = if input.focus.is_empty() {
            "Cover every applicable optimization type.".to_string()
        } else {
            format!(
                "Focus on these optimization types: {}.",
                input
                    .focus
                    .iter()
                    .map(OptimizationType::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        let allowed = OptimizationType::ALL
            .iter()
            .map(OptimizationType::as_str)
            .collect::<Vec<_>>()
            .join("|");

        let prompt = format!(
            r#"Analyse the workforce data below and recommend cost optimizations.

Workforce:
- Total employees: {employees}
- Average salary: {salary:.2}
- Total overtime hours: {ot_hours:.2}
- Overtime cost: {ot_cost:.2}
- Attendance rate: {attendance:.2}%
- Absenteeism cost: {absence:.2}

Department costs:
{departments}

Analysis period: {start} to {end}

{focus}

Each recommendation needs a clear title and description, current and expected optimized cost, potential savings and their percentage, a priority from 1 to 4 (4 is highest), implementation steps, requirements and risks.
Only use the figures above; do not invent departments or headcounts.

Return JSON only:
{{
  "recommendations": [
    {{
      "title": "string",
      "description": "string",
      "optimizationType": "{allowed}",
      "currentCost": number,
      "optimizedCost": number,
      "potentialSavings": number,
      "savingsPercentage": number,
      "priority": 1-4,
      "recommendations": "implementation steps",
      "requirements": "string",
      "risks": "string",
      "analysisData": {{ "affectedEmployees": number, "implementationTimeline": "string", "expectedROI": number }}
    }}
  ],
  "insights": ["string"]
}}"#,
            employees = w.total_employees,
            salary = w.average_salary,
            ot_hours = w.total_overtime_hours,
            ot_cost = w.total_overtime_cost,
            attendance = w.attendance_rate,
            absence = w.absenteeism_cost,
            start = input.period.start,
            end = input.period.end,
        );

        PromptPair {
            prompt,
            system_instruction: "You are an expert workforce cost analyst. Give precise, detailed \
                cost optimization recommendations based on the data provided. Respond with JSON only."
                .to_string(),
        }
    }

    fn fallback(input: &CostInput, rules: &HeuristicConfig) -> CostPlan {
        let w = &input.workforce;
        let mut plan = CostPlan::default();

        for (rec, insight) in [overtime_rule(w, rules), attendance_rule(w, rules)]
            .into_iter()
            .flatten()
        {
            plan.recommendations.push(rec);
            plan.insights.push(insight);
        }
        plan.recommendations.extend(department_rule(w, rules));
        plan.recommendations.push(general_rule(w, rules));

        if plan.insights.is_empty() {
            plan.insights.push(
                "Preliminary cost analysis; collect more data for sharper recommendations"
                    .to_string(),
            );
        }
        plan
    }

    fn finalize(_input: &CostInput, mut output: CostPlan) -> CostPlan {
        for rec in &mut output.recommendations {
            rec.priority = rec.priority.clamp(1, 4);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn input(workforce: WorkforceSnapshot) -> CostInput {
        CostInput {
            workforce,
            period: Period::new(
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            ),
            focus: Vec::new(),
        }
    }

    fn department(name: &str, employees: u32, cost: f64, overtime: f64) -> DepartmentCost {
        DepartmentCost {
            department_id: name.to_lowercase(),
            department_name: name.into(),
            employee_count: employees,
            total_cost: cost,
            overtime_hours: overtime,
        }
    }

    #[test]
    fn test_overtime_without_attendance_issue_yields_two() {
        let plan = CostOptimization::fallback(
            &input(WorkforceSnapshot {
                total_employees: 40,
                average_salary: 8000.0,
                total_overtime_hours: 150.0,
                total_overtime_cost: 10_000.0,
                attendance_rate: 95.0,
                absenteeism_cost: 2_000.0,
                department_costs: Vec::new(),
            }),
            &HeuristicConfig::default(),
        );

        assert_eq!(plan.recommendations.len(), 2);
        let overtime = &plan.recommendations[0];
        assert_eq!(overtime.optimization_type, OptimizationType::OvertimeReduction);
        assert!((overtime.potential_savings - 3_000.0).abs() < 1e-9);
        assert_eq!(overtime.analysis_data.affected_employees, 12);
        assert_eq!(plan.recommendations[1].optimization_type, OptimizationType::CostSaving);
        assert_eq!(plan.recommendations[1].priority, 1);
        assert_eq!(plan.insights.len(), 1);
    }

    #[test]
    fn test_low_attendance_fires() {
        let plan = CostOptimization::fallback(
            &input(WorkforceSnapshot {
                total_employees: 10,
                attendance_rate: 80.0,
                absenteeism_cost: 1_000.0,
                ..WorkforceSnapshot::default()
            }),
            &HeuristicConfig::default(),
        );
        let attendance = &plan.recommendations[0];
        assert_eq!(attendance.priority, 4);
        assert!((attendance.potential_savings - 400.0).abs() < 1e-9);
        assert_eq!(plan.recommendations.len(), 2);
    }

    #[test]
    fn test_department_skew_picks_heavy_departments() {
        let plan = CostOptimization::fallback(
            &input(WorkforceSnapshot {
                total_employees: 30,
                average_salary: 5000.0,
                total_overtime_hours: 90.0,
                attendance_rate: 97.0,
                department_costs: vec![
                    department("Ops", 20, 100_000.0, 70.0),
                    department("Sales", 5, 30_000.0, 15.0),
                    department("HR", 5, 20_000.0, 5.0),
                ],
                ..WorkforceSnapshot::default()
            }),
            &HeuristicConfig::default(),
        );
        let skew = plan
            .recommendations
            .iter()
            .find(|r| r.optimization_type == OptimizationType::ShiftRestructure)
            .unwrap();
        // mean cost 50_000, only Ops exceeds 30h overtime share
        assert!((skew.potential_savings - 5_000.0).abs() < 1e-9);
        assert_eq!(skew.analysis_data.affected_employees, 20);
        assert!(skew.recommendations.contains("Ops"));
    }

    #[test]
    fn test_degenerate_workforce_is_well_formed() {
        let plan = CostOptimization::fallback(
            &input(WorkforceSnapshot::default()),
            &HeuristicConfig::default(),
        );
        assert_eq!(plan.recommendations.len(), 1);
        assert_eq!(plan.recommendations[0].current_cost, 0.0);
        assert_eq!(plan.insights.len(), 1);
        let summary = summarize(&plan.recommendations);
        assert_eq!(summary.overall_savings_percentage, 0.0);
        assert!(plan.recommendations.iter().all(|r| r.potential_savings.is_finite()));
    }

    #[test]
    fn test_summarize_rounds_percentage() {
        let mut rec = general_rule(
            &WorkforceSnapshot {
                total_employees: 3,
                average_salary: 1000.0,
                ..WorkforceSnapshot::default()
            },
            &HeuristicConfig::default(),
        );
        rec.potential_savings = 100.0;
        let summary = summarize(&[rec]);
        assert_eq!(summary.total_current_cost, 3000.0);
        assert_eq!(summary.overall_savings_percentage, 3.33);
    }

    #[test]
    fn test_overtime_cost_uses_premium_rate() {
        let rules = HeuristicConfig::default();
        let cost = overtime_cost(10.0, 17_600.0, &rules);
        assert!((cost - 1_500.0).abs() < 1e-9);
    }

    #[test]
    fn test_prompt_lists_focus_and_enumeration() {
        let mut input = input(WorkforceSnapshot {
            department_costs: (0..25).map(|i| department(&format!("D{i}"), 1, 1.0, 0.0)).collect(),
            ..WorkforceSnapshot::default()
        });
        input.focus = vec![OptimizationType::OvertimeReduction];
        let pair = CostOptimization::build_prompt(&input, &HeuristicConfig::default());
        assert!(pair.prompt.contains("Focus on these optimization types: OVERTIME_REDUCTION."));
        assert!(pair.prompt.contains(
            "SCHEDULE_ADJUSTMENT|HEADCOUNT_CHANGE|SHIFT_RESTRUCTURE|OVERTIME_REDUCTION|COST_SAVING"
        ));
        assert!(pair.prompt.contains("- ... and 5 more departments"));
        assert!(!pair.prompt.contains("- D20:"));
    }

    #[test]
    fn test_model_answer_decodes_and_clamps_priority() {
        let raw: CostPlan = serde_json::from_str(
            r#"{"recommendations":[{"title":"t","optimizationType":"HEADCOUNT_CHANGE","priority":9,"analysisData":{"expectedROI":12}}]}"#,
        )
        .unwrap();
        let plan = CostOptimization::finalize(&input(WorkforceSnapshot::default()), raw);
        assert_eq!(plan.recommendations[0].priority, 4);
        assert_eq!(plan.recommendations[0].analysis_data.expected_roi, 12.0);
        assert!(plan.insights.is_empty());
    }

    #[test]
    fn test_fractional_counts_decode() {
        let plan: CostPlan = crate::extract::extract(Some(
            r#"{"recommendations":[{"title":"t","optimizationType":"COST_SAVING","priority":2.0,"analysisData":{"affectedEmployees":4.0}}]}"#,
        ))
        .unwrap();
        assert_eq!(plan.recommendations[0].analysis_data.affected_employees, 4);
        assert_eq!(plan.recommendations[0].priority, 2);
    }
}
