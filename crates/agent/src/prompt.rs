use pricebot_core::config::AgentConfig;

use crate::llm::InputItem;

const DEFAULT_SYSTEM_INSTRUCTIONS: &str = "\
You are a cloud pricing assistant backed by the public retail price catalog. \
Answer questions about on-demand, spot, reservation, and savings-plan prices.\n\
\n\
When a question needs price data, call the price_query tool with an OData-style \
$filter over armRegionName, productName, and meterName only. Rules:\n\
- armRegionName is matched exactly: armRegionName eq 'eastus' (lowercase region code).\n\
- productName and meterName are matched with contains(tolower(field), 'keyword'), \
one keyword per clause, keywords lowercase.\n\
- Join clauses with `and`. Keep quotes and parentheses balanced.\n\
- Prefer one query per distinct SKU or region; issue several tool calls in one \
turn when the user compares options.\n\
\n\
When results come back, answer with concrete hourly prices and the unit of \
measure, and say which region and meter each price belongs to. If a lookup \
reports no_results, relay the suggestion to the user rather than inventing \
numbers. Never fabricate a price.";

const DEFAULT_REFERENCE_TABLES: &str = "\
Common region codes: eastus, eastus2, westus, westus2, westus3, centralus, \
northcentralus, southcentralus, westeurope, northeurope, uksouth, ukwest, \
francecentral, germanywestcentral, swedencentral, switzerlandnorth, \
southeastasia, eastasia, japaneast, japanwest, australiaeast, australiasoutheast, \
koreacentral, centralindia, southindia, brazilsouth, canadacentral, canadaeast, \
uaenorth, southafricanorth.\n\
\n\
VM meter naming: meters look like 'D8s v4', 'E16as v5', 'NC24ads A100 v4'. \
Spot meters append 'Spot', low priority meters append 'Low Priority'. \
Windows licensing is a separate product with 'Windows' in productName.";

/// Instruction text sent at the head of every turn. Config can override either
/// half; the defaults cover the common VM pricing vocabulary.
#[derive(Clone, Debug)]
pub struct PromptPack {
    pub system_instructions: String,
    pub reference_tables: String,
}

impl Default for PromptPack {
    fn default() -> Self {
        Self {
            system_instructions: DEFAULT_SYSTEM_INSTRUCTIONS.to_string(),
            reference_tables: DEFAULT_REFERENCE_TABLES.to_string(),
        }
    }
}

impl PromptPack {
    pub fn from_config(config: &AgentConfig) -> Self {
        let defaults = Self::default();
        Self {
            system_instructions: config
                .system_instructions
                .clone()
                .unwrap_or(defaults.system_instructions),
            reference_tables: config.reference_tables.clone().unwrap_or(defaults.reference_tables),
        }
    }

    /// Input for the opening completion of a turn: instructions, reference
    /// tables, then the user's prompt. Prior turns ride along via the
    /// continuation token, not here.
    pub fn turn_input(&self, prompt: &str) -> Vec<InputItem> {
        vec![
            InputItem::system(self.system_instructions.clone()),
            InputItem::system(self.reference_tables.clone()),
            InputItem::user(prompt),
        ]
    }
}
