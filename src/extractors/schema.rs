// src/extractors/schema.rs
use crate::utils::error::ExtractError;
use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Instruction sent alongside every uploaded report.
pub const EXTRACTION_PROMPT: &str = "\
Analyze this financial report. Extract the specific values for the Income Statement, \
Balance Sheet, and Cash Flow statement for the most recent fiscal year available in the document.

If a specific field (like R&D or Treasury Stock) is not explicitly present, return null.
Ensure you capture the correct scale (e.g., if the table says 'in millions', extract the number as seen).";

fn default_currency_symbol() -> String {
    "KES".to_string()
}

fn default_scale() -> String {
    "Millions".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IncomeStatement {
    /// Total revenue or net sales.
    pub revenue: Option<f64>,
    /// Gross profit (Revenue minus Cost of Goods Sold).
    pub gross_profit: Option<f64>,
    /// Selling, General, and Administrative expenses.
    pub sga_expenses: Option<f64>,
    /// Research and Development expenses.
    pub rd_expenses: Option<f64>,
    /// Depreciation and amortization expense (often found in Operating Expenses or Cash Flow).
    pub depreciation_and_amortization: Option<f64>,
    /// Operating Income or EBIT.
    pub operating_income: Option<f64>,
    /// Interest expense.
    pub interest_expense: Option<f64>,
    /// Net earnings or Net income.
    pub net_income: Option<f64>,
    /// Diluted Earnings Per Share.
    pub eps_diluted: Option<f64>,
    /// Weighted average shares outstanding (diluted).
    pub weighted_average_shares: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BalanceSheet {
    /// Total current assets.
    pub current_assets: Option<f64>,
    /// Total current liabilities.
    pub current_liabilities: Option<f64>,
    /// Net accounts receivable.
    pub net_receivables: Option<f64>,
    /// Total assets.
    pub total_assets: Option<f64>,
    /// Short-term debt plus current portion of long-term debt.
    pub short_term_debt: Option<f64>,
    /// Long-term debt (excluding current portion).
    pub long_term_debt: Option<f64>,
    /// Total liabilities.
    pub total_liabilities: Option<f64>,
    /// Total shareholders' equity.
    pub total_equity: Option<f64>,
    /// Treasury stock (usually a negative number in equity section, extract absolute value if possible).
    pub treasury_stock: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CashFlow {
    /// Capital expenditures (CapEx) or payments for property, plant, and equipment.
    pub capital_expenditures: Option<f64>,
}

/// Financial statement figures for one report. Values are as printed; the
/// unit lives in `currency_symbol` and `scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinancialReportExtraction {
    /// The name of the company.
    pub company_name: String,
    /// The fiscal year ending date for this report.
    pub fiscal_year: i32,
    /// The currency symbol used in the report (e.g., $, €, £).
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    /// The scale of the numbers (e.g., Millions, Thousands, Billions).
    #[serde(default = "default_scale")]
    pub scale: String,
    pub income_statement: IncomeStatement,
    pub balance_sheet: BalanceSheet,
    pub cash_flow: CashFlow,
}

impl FinancialReportExtraction {
    /// JSON Schema handed to the model. Nested records are inlined so the
    /// schema has no `$ref`s.
    pub fn response_schema() -> Result<serde_json::Value, ExtractError> {
        let settings = SchemaSettings::draft07().with(|s| {
            s.inline_subschemas = true;
            s.option_add_null_type = true;
        });
        let schema = settings.into_generator().into_root_schema_for::<Self>();

        let mut value = serde_json::to_value(schema)
            .map_err(|e| {
                ExtractError::Generation(format!("Could not serialize response schema: {}", e))
            })?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("$schema");
        }
        Ok(value)
    }

    /// Parses and checks a model response.
    pub fn from_response(text: &str) -> Result<Self, ExtractError> {
        let body = strip_code_fence(text.trim());
        if body.is_empty() {
            return Err(ExtractError::Validation("empty response".to_string()));
        }

        let report: Self = serde_json::from_str(body)
            .map_err(|e| ExtractError::Validation(e.to_string()))?;

        if report.company_name.trim().is_empty() {
            return Err(ExtractError::Validation("company_name is blank".to_string()));
        }
        Ok(report)
    }
}

/// One line of the output log.
#[derive(Debug, Serialize)]
pub struct ExtractionRecord<'a> {
    #[serde(flatten)]
    pub report: &'a FinancialReportExtraction,
    pub source_title: &'a str,
}

// Models occasionally wrap JSON in a markdown fence even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ACME_RESPONSE: &str = r#"{
        "company_name": "Acme Ltd",
        "fiscal_year": 2024,
        "income_statement": {"revenue": 1000.0, "net_income": 120.5, "rd_expenses": null},
        "balance_sheet": {"total_assets": 5400.0, "total_equity": 2100.0},
        "cash_flow": {"capital_expenditures": 310.0}
    }"#;

    #[test]
    fn fills_defaults_and_keeps_nulls() {
        let report = FinancialReportExtraction::from_response(ACME_RESPONSE).unwrap();

        assert_eq!(report.company_name, "Acme Ltd");
        assert_eq!(report.currency_symbol, "KES");
        assert_eq!(report.scale, "Millions");
        assert_eq!(report.income_statement.revenue, Some(1000.0));
        assert_eq!(report.income_statement.rd_expenses, None);
        assert_eq!(report.income_statement.gross_profit, None);
        assert_eq!(report.cash_flow.capital_expenditures, Some(310.0));
    }

    #[test]
    fn accepts_fenced_json() {
        let fenced = format!("```json\n{}\n```", ACME_RESPONSE);
        assert!(FinancialReportExtraction::from_response(&fenced).is_ok());
    }

    #[test]
    fn rejects_missing_required_fields() {
        let partial = r#"{"company_name": "Acme Ltd", "fiscal_year": 2024}"#;
        let err = FinancialReportExtraction::from_response(partial).unwrap_err();
        assert!(matches!(err, ExtractError::Validation(msg) if msg.contains("income_statement")));
    }

    #[test]
    fn rejects_wrong_types_and_blank_names() {
        let wrong_type = r#"{"company_name":"Acme","fiscal_year":"FY2024","income_statement":{},"balance_sheet":{},"cash_flow":{}}"#;
        assert!(FinancialReportExtraction::from_response(wrong_type).is_err());

        let blank = r#"{"company_name":"  ","fiscal_year":2024,"income_statement":{},"balance_sheet":{},"cash_flow":{}}"#;
        assert!(FinancialReportExtraction::from_response(blank).is_err());

        assert!(FinancialReportExtraction::from_response("not json").is_err());
    }

    #[test]
    fn record_line_carries_source_title() {
        let report = FinancialReportExtraction::from_response(ACME_RESPONSE).unwrap();
        let line = serde_json::to_value(ExtractionRecord {
            report: &report,
            source_title: "ACME Annual Report 2024",
        })
        .unwrap();

        assert_eq!(line["company_name"], "Acme Ltd");
        assert_eq!(line["fiscal_year"], 2024);
        assert_eq!(line["income_statement"]["revenue"], json!(1000.0));
        assert_eq!(line["income_statement"]["gross_profit"], serde_json::Value::Null);
        assert_eq!(line["source_title"], "ACME Annual Report 2024");
    }

    #[test]
    fn schema_is_inlined_and_documented() {
        let schema = FinancialReportExtraction::response_schema().unwrap();

        assert!(schema.get("$schema").is_none());
        assert!(schema.get("definitions").is_none());
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(required.contains(&"company_name"));
        assert!(required.contains(&"income_statement"));
        assert!(!required.contains(&"currency_symbol"));
        assert_eq!(schema["properties"]["currency_symbol"]["default"], "KES");
        assert_eq!(
            schema["properties"]["income_statement"]["properties"]["revenue"]["description"],
            "Total revenue or net sales."
        );
    }
}
