use pricebot_core::domain::PriceResultSet;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

pub const PRICE_QUERY_TOOL: &str = "price_query";

/// Records returned to the model per query. The full set still streams to the
/// client; this cap only bounds prompt growth.
const MAX_RECORDS_FOR_MODEL: usize = 50;

#[derive(Debug, Error)]
pub enum ToolArgumentError {
    #[error("tool arguments are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("tool arguments missing required `filter` string")]
    MissingFilter,
}

/// Function tool definition advertised on every completion request.
pub fn price_query_tool() -> Value {
    json!({
        "type": "function",
        "name": PRICE_QUERY_TOOL,
        "description": "Query the retail price catalog with an OData-style $filter expression. \
                        Allowed fields: armRegionName, productName, meterName. \
                        Use contains(tolower(field), 'keyword') with lowercase keywords.",
        "parameters": {
            "type": "object",
            "properties": {
                "filter": {
                    "type": "string",
                    "description": "$filter expression, e.g. armRegionName eq 'eastus' and contains(tolower(meterName), 'd8s v4')"
                }
            },
            "required": ["filter"]
        }
    })
}

#[derive(Deserialize)]
struct PriceQueryArguments {
    filter: Option<String>,
}

/// Extract the `filter` argument from the raw JSON the model produced.
pub fn parse_filter_arguments(raw: &str) -> Result<String, ToolArgumentError> {
    let arguments: PriceQueryArguments = serde_json::from_str(raw)?;
    arguments
        .filter
        .filter(|filter| !filter.trim().is_empty())
        .ok_or(ToolArgumentError::MissingFilter)
}

/// Tool output for a completed lookup. On an empty set the payload tells the
/// model what to try next instead of leaving it to guess.
pub fn success_payload(result: &PriceResultSet) -> Value {
    if result.is_empty() {
        return json!({
            "status": "no_results",
            "filter": result.filter_used,
            "attempts": result.attempts,
            "suggestion": "No prices matched even after broadening. Ask the user to \
                           confirm the region and SKU spelling, or try a coarser product keyword.",
        });
    }

    let records: Vec<&_> = result.records.iter().take(MAX_RECORDS_FOR_MODEL).collect();
    json!({
        "status": "ok",
        "filter": result.filter_used,
        "attempts": result.attempts,
        "total_count": result.records.len(),
        "items": records,
    })
}

/// Tool output for a failed invocation. `hint` tells the model how to repair
/// the call on its next attempt.
pub fn error_payload(kind: &str, message: &str, hint: &str) -> Value {
    json!({
        "status": "error",
        "kind": kind,
        "message": message,
        "hint": hint,
    })
}

#[cfg(test)]
mod tests {
    use pricebot_core::domain::{PriceRecord, PriceResultSet};

    use super::{error_payload, parse_filter_arguments, price_query_tool, success_payload, ToolArgumentError};

    fn record() -> PriceRecord {
        PriceRecord {
            arm_sku_name: "Standard_D8s_v4".to_string(),
            retail_price: 0.384,
            unit_of_measure: "1 Hour".to_string(),
            arm_region_name: "eastus".to_string(),
            meter_id: "m-1".to_string(),
            meter_name: "D8s v4".to_string(),
            product_name: "Virtual Machines Dsv4 Series".to_string(),
            price_type: "Consumption".to_string(),
            location: None,
            reservation_term: None,
            savings_plan: None,
        }
    }

    #[test]
    fn tool_definition_requires_the_filter_argument() {
        let tool = price_query_tool();
        assert_eq!(tool["type"], "function");
        assert_eq!(tool["name"], "price_query");
        assert_eq!(tool["parameters"]["required"][0], "filter");
    }

    #[test]
    fn filter_argument_is_extracted_from_raw_json() {
        let filter = parse_filter_arguments(r#"{"filter": "armRegionName eq 'eastus'"}"#)
            .expect("arguments should parse");
        assert_eq!(filter, "armRegionName eq 'eastus'");
    }

    #[test]
    fn missing_or_blank_filter_is_rejected() {
        assert!(matches!(parse_filter_arguments("{}"), Err(ToolArgumentError::MissingFilter)));
        assert!(matches!(
            parse_filter_arguments(r#"{"filter": "  "}"#),
            Err(ToolArgumentError::MissingFilter)
        ));
        assert!(matches!(parse_filter_arguments("not json"), Err(ToolArgumentError::Json(_))));
    }

    #[test]
    fn empty_result_payload_carries_a_suggestion() {
        let result = PriceResultSet {
            records: Vec::new(),
            filter_used: "contains(tolower(meterName), 'd8s')".to_string(),
            attempts: 3,
        };
        let payload = success_payload(&result);
        assert_eq!(payload["status"], "no_results");
        assert_eq!(payload["attempts"], 3);
        assert!(payload["suggestion"].as_str().is_some_and(|s| s.contains("broadening")));
    }

    #[test]
    fn populated_result_payload_reports_the_filter_actually_used() {
        let result = PriceResultSet {
            records: vec![record()],
            filter_used: "contains(tolower(meterName), 'd8s v4')".to_string(),
            attempts: 2,
        };
        let payload = success_payload(&result);
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["total_count"], 1);
        assert_eq!(payload["filter"], "contains(tolower(meterName), 'd8s v4')");
        assert_eq!(payload["items"][0]["meterName"], "D8s v4");
    }

    #[test]
    fn error_payload_carries_a_repair_hint() {
        let payload = error_payload("invalid_filter", "unbalanced quotes", "balance every single quote");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["kind"], "invalid_filter");
        assert_eq!(payload["hint"], "balance every single quote");
    }
}
