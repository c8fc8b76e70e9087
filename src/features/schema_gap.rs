//! Policy feasibility against the HR data schema.
//!
//! Given a policy in free text, report which data the schema lacks and
//! propose models that would hold it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::HeuristicConfig;
use crate::features::{Feature, PromptPair};

const MAX_FIELDS_PER_MODEL: usize = 50;
const MAX_MODELS: usize = 30;

/// Used when no schema document is supplied.
pub const DEFAULT_SCHEMA_DIGEST: &str = "\
User: id, email, salary, hireDate, nationality, isSaudi, managerId
Attendance: checkIn, checkOut, lateMinutes, overtimeMinutes
LeaveRequest: type, startDate, endDate, status
Contract: basicSalary, totalSalary, startDate, endDate";

const RESERVED_FIELDS: [&str; 5] = ["id", "userid", "user", "createdat", "updatedat"];

static MODEL_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"model\s+(\w+)\s+\{([^}]+)\}").expect("valid model regex"));

static SCALAR_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s+(\w+)\s+(String|Int|Float|Boolean|DateTime|Decimal|Json)\b")
        .expect("valid field regex")
});

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaGapInput {
    pub policy_text: String,
    /// Raw schema document; digested before prompting.
    #[serde(default)]
    pub schema_text: Option<String>,
    /// Pre-built digest, preferred over `schema_text`.
    #[serde(default)]
    pub schema_digest: Option<String>,
}

impl SchemaGapInput {
    pub fn new(policy_text: impl Into<String>) -> Self {
        Self {
            policy_text: policy_text.into(),
            ..Self::default()
        }
    }

    pub fn digest(&self) -> String {
        if let Some(digest) = self.schema_digest.as_deref()
            && !digest.trim().is_empty()
        {
            return digest.to_string();
        }
        let built = self
            .schema_text
            .as_deref()
            .map(schema_digest)
            .unwrap_or_default();
        if built.is_empty() {
            DEFAULT_SCHEMA_DIGEST.to_string()
        } else {
            built
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub suggested_model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedModel {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Rendered model block, filled locally.
    #[serde(default)]
    pub schema: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaGapReport {
    #[serde(default)]
    pub missing_fields: Vec<MissingField>,
    #[serde(default)]
    pub suggested_models: Vec<SuggestedModel>,
    #[serde(default)]
    pub can_execute: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Keyword trigger and the data it implies.
struct GapRule {
    topic: &'static str,
    trigger: Regex,
    missing: &'static [(&'static str, &'static str, &'static str, &'static str)],
    model: &'static str,
    fields: &'static [(&'static str, &'static str, &'static str)],
}

impl GapRule {
    fn new(
        topic: &'static str,
        pattern: &str,
        missing: &'static [(&'static str, &'static str, &'static str, &'static str)],
        model: &'static str,
        fields: &'static [(&'static str, &'static str, &'static str)],
    ) -> Self {
        Self {
            topic,
            trigger: Regex::new(pattern).expect("valid gap rule regex"),
            missing,
            model,
            fields,
        }
    }
}

static GAP_RULES: Lazy<Vec<GapRule>> = Lazy::new(|| {
    vec![
        GapRule::new(
            "dependents",
            r"(?i)طفل|أطفال|أبناء|ابن|بنت|معال|معالين|زوج|زوجة|أسرة|\b(?:child(?:ren)?|kids?|dependents?|spouse|wife|husband|family)\b",
            &[
                ("childAge", "Int", "Age of the child", "Dependent"),
                ("childGender", "String", "Gender of the child", "Dependent"),
                ("relationship", "String", "Relationship to the employee", "Dependent"),
            ],
            "Dependent",
            &[
                ("name", "String", "Dependent name"),
                ("age", "Int", "Age"),
                ("gender", "String", "Gender"),
                ("relationship", "String", "Relationship to the employee"),
                ("birthDate", "DateTime", "Date of birth"),
            ],
        ),
        GapRule::new(
            "vehicles",
            r"(?i)سيار|كيلو|مسافة|بنزين|وقود|رحل|مواصلات|\b(?:cars?|vehicles?|mileage|fuel|petrol|gasoline|distance|commut\w*|transport\w*)\b|kilomet",
            &[
                ("hasVehicle", "Boolean", "Whether the employee owns a vehicle", "User"),
                ("monthlyDistance", "Float", "Monthly distance in kilometres", "VehicleLog"),
            ],
            "VehicleLog",
            &[
                ("distance", "Float", "Distance travelled"),
                ("fuelCost", "Float", "Fuel cost"),
                ("date", "DateTime", "Date"),
            ],
        ),
        GapRule::new(
            "sales",
            r"(?i)مبيع|عمول|هدف|نسبة|\b(?:sales?|commissions?|targets?)\b",
            &[
                ("salesAmount", "Float", "Sales amount", "SalesRecord"),
                ("targetAmount", "Float", "Sales target", "SalesTarget"),
            ],
            "SalesRecord",
            &[
                ("amount", "Float", "Sales amount"),
                ("date", "DateTime", "Date"),
                ("productType", "String", "Product type"),
            ],
        ),
        GapRule::new(
            "training",
            r"(?i)تدريب|دورة|شهاد|\b(?:training|courses?|certificat\w*|workshops?)\b",
            &[
                ("courseName", "String", "Course name", "Training"),
                ("completionDate", "DateTime", "Completion date", "Training"),
            ],
            "Training",
            &[
                ("courseName", "String", "Course name"),
                ("provider", "String", "Training provider"),
                ("completionDate", "DateTime", "Completion date"),
                ("certificateUrl", "String", "Certificate link"),
            ],
        ),
    ]
});

/// Compact `Model: field, field, ...` listing of scalar fields in a schema document.
pub fn schema_digest(schema_text: &str) -> String {
    MODEL_BLOCK
        .captures_iter(schema_text)
        .filter_map(|block| {
            let name = block.get(1)?.as_str();
            let body = block.get(2)?.as_str();
            let fields: Vec<&str> = SCALAR_FIELD
                .captures_iter(body)
                .filter_map(|f| f.get(1).map(|m| m.as_str()))
                .collect();
            if fields.is_empty() {
                return None;
            }
            let shown = fields
                .iter()
                .take(MAX_FIELDS_PER_MODEL)
                .copied()
                .collect::<Vec<_>>()
                .join(", ");
            let suffix = if fields.len() > MAX_FIELDS_PER_MODEL {
                format!(", ... (+{} more)", fields.len() - MAX_FIELDS_PER_MODEL)
            } else {
                String::new()
            };
            Some(format!("{}: {}{}", name, shown, suffix))
        })
        .take(MAX_MODELS)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Map a loosely named type onto a schema scalar type.
pub fn schema_type(field_type: &str) -> &'static str {
    match field_type {
        "String" | "string" => "String",
        "Int" => "Int",
        "Float" | "Number" | "number" => "Float",
        "Decimal" => "Decimal",
        "DateTime" | "Date" => "DateTime",
        "Boolean" | "boolean" => "Boolean",
        _ => "String",
    }
}

pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Render a model block with id, owner relation and timestamps added.
///
/// Fields that collide with the added ones are dropped.
pub fn render_model_schema(name: &str, fields: &[FieldSpec]) -> String {
    let mut lines = vec![
        format!("model {} {{", name),
        "    id        String   @id @default(cuid())".to_string(),
        "    userId    String".to_string(),
        "    user      User     @relation(fields: [userId], references: [id])".to_string(),
    ];
    lines.extend(
        fields
            .iter()
            .filter(|f| !RESERVED_FIELDS.contains(&f.name.to_lowercase().as_str()))
            .map(|f| {
                format!(
                    "    {} {} // {}",
                    f.name,
                    schema_type(&f.field_type),
                    f.description
                )
            }),
    );
    lines.push("    createdAt DateTime @default(now())".to_string());
    lines.push("    updatedAt DateTime @updatedAt".to_string());
    lines.push(String::new());
    lines.push(format!("    @@map(\"{}\")", to_snake_case(name)));
    lines.push("}".to_string());
    lines.join("\n")
}

/// Keyword match of the policy against the rule table.
pub fn match_rules(policy_text: &str) -> SchemaGapReport {
    let mut report = SchemaGapReport::default();
    let mut topics = Vec::new();

    for rule in GAP_RULES.iter().filter(|r| r.trigger.is_match(policy_text)) {
        topics.push(rule.topic);
        report
            .missing_fields
            .extend(rule.missing.iter().map(|(name, ty, desc, model)| MissingField {
                name: name.to_string(),
                field_type: ty.to_string(),
                description: desc.to_string(),
                suggested_model: model.to_string(),
            }));
        let fields: Vec<FieldSpec> = rule
            .fields
            .iter()
            .map(|(name, ty, desc)| FieldSpec {
                name: name.to_string(),
                field_type: ty.to_string(),
                description: desc.to_string(),
            })
            .collect();
        report.suggested_models.push(SuggestedModel {
            name: rule.model.to_string(),
            schema: render_model_schema(rule.model, &fields),
            fields,
        });
    }

    report.can_execute = report.suggested_models.is_empty();
    if !topics.is_empty() {
        report.reason = Some(format!(
            "Policy refers to {} with no matching schema data",
            topics.join(", ")
        ));
    }
    report
}

pub struct SchemaGap;

impl Feature for SchemaGap {
    const NAME: &'static str = "schema_gap";

    type Input = SchemaGapInput;
    type Output = SchemaGapReport;

    fn build_prompt(input: &SchemaGapInput, _rules: &HeuristicConfig) -> PromptPair {
        let prompt = format!(
            r#"You analyze HR management system data models.

Policy under review:
"{policy}"

Current schema (every model with its scalar fields):
{digest}

Task:
1. Read the policy and list every concept it depends on (for example child age, employee gender, distance travelled).
2. Check the schema above for fields or models that cover each concept.
3. For the User model, look for related sub-fields (such as child_age or has_car).
4. If a concept needs a model that does not exist (for example Dependents for spouse and children), canExecute is false.

Do not assume fields that are not written in the schema above. If a field such as "child age" or "spouse name" is not listed explicitly, it does not exist.
Any financial or administrative concept in the policy (sales, children, vehicles) without a matching field means canExecute = false.

Return JSON only:
{{
  "requiredConcepts": ["every concept the policy needs"],
  "existsInSchema": ["concepts already covered"],
  "missingFromSchema": ["concepts with no data"],
  "missingFields": [
    {{ "name": "fieldName", "type": "Int|String|Float|Boolean|DateTime", "description": "precise description", "suggestedModel": "ModelName" }}
  ],
  "suggestedModels": [
    {{ "name": "ModelName", "fields": [{{ "name": "field", "type": "type", "description": "desc" }}] }}
  ],
  "canExecute": false,
  "reason": "why the data is missing"
}}"#,
            policy = input.policy_text.trim(),
            digest = input.digest(),
        );

        PromptPair {
            prompt,
            system_instruction: "You analyze data schemas for HR policies. Return JSON only. \
                If any concept in the policy has no matching field, canExecute must be false."
                .to_string(),
        }
    }

    fn fallback(input: &SchemaGapInput, _rules: &HeuristicConfig) -> SchemaGapReport {
        let mut report = match_rules(&input.policy_text);
        if report.suggested_models.is_empty() {
            // Nothing matched, but without a model the policy cannot be confirmed either.
            report.can_execute = false;
            report.reason =
                Some("Policy could not be verified against the schema without a model".to_string());
        }
        report
    }

    fn finalize(_input: &SchemaGapInput, mut output: SchemaGapReport) -> SchemaGapReport {
        for model in &mut output.suggested_models {
            model.schema = render_model_schema(&model.name, &model.fields);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ty: &str) -> FieldSpec {
        FieldSpec {
            name: name.into(),
            field_type: ty.into(),
            description: format!("{name} desc"),
        }
    }

    #[test]
    fn test_arabic_vehicle_policy_suggests_vehicle_log() {
        let input = SchemaGapInput::new("هل يمكن صرف بدل سيارة شهري؟");
        let report = SchemaGap::fallback(&input, &HeuristicConfig::default());
        let names: Vec<_> = report.suggested_models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["VehicleLog"]);
        assert!(!report.can_execute);
        assert!(report.missing_fields.iter().any(|f| f.name == "monthlyDistance"));
        assert!(report.suggested_models[0].schema.contains("@@map(\"vehicle_log\")"));
    }

    #[test]
    fn test_english_triggers_match() {
        let report = match_rules("Pay a family allowance and a sales commission bonus");
        let names: Vec<_> = report.suggested_models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Dependent", "SalesRecord"]);
        assert!(!report.can_execute);
    }

    #[test]
    fn test_no_match_reports_cannot_execute() {
        let input = SchemaGapInput::new("Late arrivals lose a quarter day");
        let report = SchemaGap::fallback(&input, &HeuristicConfig::default());
        assert!(report.missing_fields.is_empty());
        assert!(report.suggested_models.is_empty());
        assert!(!report.can_execute);
        assert!(report.reason.is_some());
    }

    #[test]
    fn test_empty_policy_is_well_formed() {
        let report = SchemaGap::fallback(&SchemaGapInput::default(), &HeuristicConfig::default());
        assert!(report.suggested_models.is_empty());
        assert!(!report.can_execute);
        assert!(match_rules("").can_execute);
    }

    #[test]
    fn test_render_drops_reserved_and_maps_types() {
        let schema = render_model_schema(
            "SalesTarget",
            &[
                field("id", "String"),
                field("UserId", "String"),
                field("amount", "number"),
                field("dueOn", "Date"),
                field("note", "Text"),
                field("createdAt", "DateTime"),
            ],
        );
        assert_eq!(schema.matches("userId").count(), 2);
        assert!(schema.contains("    amount Float // amount desc"));
        assert!(schema.contains("    dueOn DateTime // dueOn desc"));
        assert!(schema.contains("    note String // note desc"));
        assert_eq!(schema.matches("createdAt").count(), 1);
        assert!(schema.starts_with("model SalesTarget {"));
        assert!(schema.ends_with("    @@map(\"sales_target\")\n}"));
    }

    #[test]
    fn test_schema_digest_bounds_fields_and_models() {
        let many_fields: String = (0..55).map(|i| format!("  f{i} String\n")).collect();
        let mut doc = format!("model Wide {{\n{many_fields}}}\n");
        doc.push_str("model Rel {\n  owner User @relation(fields: [a], references: [id])\n}\n");
        for i in 0..35 {
            doc.push_str(&format!("model M{i} {{\n  id String @id\n  n Int?\n}}\n"));
        }

        let digest = schema_digest(&doc);
        let lines: Vec<_> = digest.lines().collect();
        assert_eq!(lines.len(), 30);
        assert!(lines[0].starts_with("Wide: f0, f1,"));
        assert!(lines[0].ends_with("f49, ... (+5 more)"));
        // relation-only models carry no scalar fields
        assert!(!digest.contains("Rel:"));
        assert_eq!(lines[1], "M0: id, n");
    }

    #[test]
    fn test_digest_prefers_prebuilt_then_default() {
        let mut input = SchemaGapInput::new("p");
        assert_eq!(input.digest(), DEFAULT_SCHEMA_DIGEST);
        input.schema_text = Some("model A {\n  x Float\n}".into());
        assert_eq!(input.digest(), "A: x");
        input.schema_digest = Some("Custom: a, b".into());
        assert_eq!(input.digest(), "Custom: a, b");
    }

    #[test]
    fn test_prompt_carries_policy_digest_and_guard() {
        let pair = SchemaGap::build_prompt(&SchemaGapInput::new("  bonus for sales  "), &HeuristicConfig::default());
        assert!(pair.prompt.contains("\"bonus for sales\""));
        assert!(pair.prompt.contains(DEFAULT_SCHEMA_DIGEST));
        assert!(pair.prompt.contains("Do not assume fields"));
        assert!(pair.prompt.contains("\"canExecute\": false"));
        assert!(pair.system_instruction.contains("JSON only"));
    }

    #[test]
    fn test_finalize_renders_model_blocks() {
        let raw: SchemaGapReport = serde_json::from_str(
            r#"{"missingFields":[],"suggestedModels":[{"name":"Badge","fields":[{"name":"code","type":"string","description":"c"}]}],"canExecute":false}"#,
        )
        .unwrap();
        let done = SchemaGap::finalize(&SchemaGapInput::new("p"), raw);
        assert!(done.suggested_models[0].schema.contains("    code String // c"));
    }
}
