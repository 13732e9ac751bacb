use serde::{Deserialize, Serialize};

/// One retail price row as returned by the catalog. Field names follow the
/// catalog wire format; a record is never mutated after it is fetched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    #[serde(default)]
    pub arm_sku_name: String,
    #[serde(default)]
    pub retail_price: f64,
    #[serde(default)]
    pub unit_of_measure: String,
    #[serde(default)]
    pub arm_region_name: String,
    #[serde(default)]
    pub meter_id: String,
    #[serde(default)]
    pub meter_name: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(rename = "type", default)]
    pub price_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_term: Option<String>,
    #[serde(rename = "savingsPlan", skip_serializing_if = "Option::is_none")]
    pub savings_plan: Option<Vec<SavingsPlanRate>>,
}

/// Discounted rate attached to some records (term is e.g. "1 Year").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavingsPlanRate {
    pub term: String,
    #[serde(rename = "retailPrice")]
    pub retail_price: String,
}

/// Outcome of one tool invocation after the broadening retry driver has run:
/// the accumulated records, the filter that actually produced them (which may
/// be broader than the one requested), and how many attempts it took.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceResultSet {
    pub records: Vec<PriceRecord>,
    pub filter_used: String,
    pub attempts: u32,
}

impl PriceResultSet {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A structured lookup request emitted by the LLM. `call_id` keys the
/// turn-scoped dedupe set and the tool-result payload sent back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolInvocation {
    pub call_id: String,
    pub name: String,
    pub raw_arguments: String,
}
