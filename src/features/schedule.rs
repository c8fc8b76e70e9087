//! Shift schedule optimization.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::HeuristicConfig;
use crate::deserializers::de_u32_rounded;
use crate::features::{Feature, Period, PromptPair, bounded_lines, day_name};

const MAX_PROMPT_EMPLOYEES: usize = 10;
const DEFAULT_MAX_WEEKLY_HOURS: u32 = 48;
const DEFAULT_MIN_REST_HOURS: u32 = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub basic_salary: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleConstraints {
    pub min_staff: Option<u32>,
    pub max_staff: Option<u32>,
    pub max_weekly_hours: Option<u32>,
    pub min_rest_hours: Option<u32>,
    /// Days off, Sunday = 0
    pub weekend_days: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInput {
    pub employees: Vec<Employee>,
    /// Historical mean headcount keyed by weekday, Sunday = 0
    #[serde(default)]
    pub average_attendance_by_weekday: BTreeMap<u8, f64>,
    pub period: Period,
    #[serde(default)]
    pub constraints: ScheduleConstraints,
}

impl ScheduleInput {
    fn weekend_days<'a>(&'a self, rules: &'a HeuristicConfig) -> &'a [u8] {
        self.constraints
            .weekend_days
            .as_deref()
            .unwrap_or(rules.weekend_days.as_slice())
    }

    fn daily_staff(&self, rules: &HeuristicConfig) -> usize {
        let headcount = self.employees.len();
        let mut needed = (headcount as f64 * rules.daily_staff_ratio).ceil() as usize;
        if let Some(min) = self.constraints.min_staff {
            needed = needed.max(min as usize);
        }
        if let Some(max) = self.constraints.max_staff {
            needed = needed.min(max as usize);
        }
        needed.min(headcount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub date: NaiveDate,
    pub user_id: String,
    #[serde(default)]
    pub employee_name: String,
    pub start_time: String,
    pub end_time: String,
    pub hours: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleResult {
    #[serde(deserialize_with = "de_u32_rounded")]
    pub total_shifts: u32,
    pub total_hours: f64,
    pub estimated_cost: f64,
    pub coverage_rate: f64,
    pub optimization_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulePlan {
    pub shifts: Vec<Shift>,
    pub result: ScheduleResult,
    pub recommendations: Vec<String>,
}

pub struct ScheduleOptimization;

impl Feature for ScheduleOptimization {
    const NAME: &'static str = "schedule_optimization";

    type Input = ScheduleInput;
    type Output = SchedulePlan;

    fn build_prompt(input: &ScheduleInput, rules: &HeuristicConfig) -> PromptPair {
        let headcount = input.employees.len();
        let c = &input.constraints;

        let employees = bounded_lines(
            &input.employees,
            MAX_PROMPT_EMPLOYEES,
            |e| format!("- {} ({}) - salary: {:.2}", e.name, e.department, e.basic_salary),
            |more| format!("... and {} more employees", more),
        );
        let patterns = input
            .average_attendance_by_weekday
            .iter()
            .map(|(day, avg)| format!("- {}: average {} employees", day_name(*day as u32), avg.round()))
            .collect::<Vec<_>>()
            .join("\n");
        let patterns = if patterns.is_empty() {
            "- no history available".to_string()
        } else {
            patterns
        };
        let weekend = input
            .weekend_days(rules)
            .iter()
            .map(|d| day_name(*d as u32))
            .collect::<Vec<_>>()
            .join(", ");

        let prompt = format!(
            r#"Optimize the work schedule below using the constraints and historical patterns.

Available employees:
{employees}

Historical attendance by weekday:
{patterns}

Scheduling period: {start} to {end}

Constraints:
- Minimum staff per day: {min_staff}
- Maximum staff per day: {max_staff}
- Maximum weekly hours: {max_weekly}
- Minimum rest between shifts: {min_rest} hours
- Weekly days off: {weekend}

Build a schedule that:
1. Distributes shifts fairly
2. Covers daily workload
3. Respects working-hour and rest limits
4. Lowers cost through smarter scheduling
5. Comes with recommendations for improvement

Only schedule the employees listed; never invent user ids. No shifts on the weekly days off.

Return JSON only:
{{
  "shifts": [
    {{ "date": "YYYY-MM-DD", "userId": "string", "employeeName": "string", "startTime": "HH:MM", "endTime": "HH:MM", "hours": number, "department": "string" }}
  ],
  "result": {{ "totalShifts": number, "totalHours": number, "estimatedCost": number, "coverageRate": number, "optimizationScore": 0.0-1.0 }},
  "recommendations": ["string"]
}}"#,
            start = input.period.start,
            end = input.period.end,
            min_staff = c
                .min_staff
                .map(|v| v as usize)
                .unwrap_or_else(|| (headcount as f64 * rules.daily_staff_ratio).ceil() as usize),
            max_staff = c.max_staff.map(|v| v as usize).unwrap_or(headcount),
            max_weekly = c.max_weekly_hours.unwrap_or(DEFAULT_MAX_WEEKLY_HOURS),
            min_rest = c.min_rest_hours.unwrap_or(DEFAULT_MIN_REST_HOURS),
        );

        PromptPair {
            prompt,
            system_instruction: "You are a work schedule optimization expert. Build schedules that \
                raise productivity and lower cost while respecting labour constraints. \
                Respond with JSON only."
                .to_string(),
        }
    }

    fn fallback(input: &ScheduleInput, rules: &HeuristicConfig) -> SchedulePlan {
        if input.employees.is_empty() || input.period.day_count() == 0 {
            return SchedulePlan {
                recommendations: vec!["No employees or dates to schedule".to_string()],
                ..SchedulePlan::default()
            };
        }

        let weekend = input.weekend_days(rules);
        let per_day = input.daily_staff(rules);
        let hourly_divisor = rules.monthly_working_hours;
        let mut shifts = Vec::new();
        let mut total_hours = 0.0;
        let mut total_cost = 0.0;
        let mut next = 0usize;

        for date in input.period.days() {
            let weekday = date.weekday().num_days_from_sunday();
            if weekend.iter().any(|d| *d as u32 == weekday) {
                continue;
            }
            for _ in 0..per_day {
                let employee = &input.employees[next % input.employees.len()];
                next += 1;
                shifts.push(Shift {
                    date,
                    user_id: employee.id.clone(),
                    employee_name: employee.name.clone(),
                    start_time: rules.shift_start.clone(),
                    end_time: rules.shift_end.clone(),
                    hours: rules.shift_hours,
                    department: Some(employee.department.clone()),
                });
                total_hours += rules.shift_hours;
                total_cost += employee.basic_salary / hourly_divisor * rules.shift_hours;
            }
        }

        SchedulePlan {
            result: ScheduleResult {
                total_shifts: shifts.len() as u32,
                total_hours,
                estimated_cost: total_cost,
                coverage_rate: rules.baseline_coverage_rate,
                optimization_score: rules.baseline_optimization_score,
            },
            shifts,
            recommendations: vec![
                "Baseline rotation schedule; a model-built schedule will balance load better"
                    .to_string(),
                "Review shift distribution for fairness".to_string(),
                "Compare actual attendance against the plan".to_string(),
            ],
        }
    }
}
