//! Catalog filter grammar: pre-flight validation and deterministic broadening.
//!
//! A filter is an `and`-joined list of clauses over three permitted fields:
//! at most one exact-match region clause (`armRegionName eq 'eastus'`),
//! optional fuzzy region clauses (`contains(tolower(armRegionName), 'us')`),
//! and ordered `contains(tolower(productName|meterName), 'keyword')` clauses.
//! Region clauses are never relaxed by broadening.

use thiserror::Error;

/// Tokens permitted outside quoted literals, compared case-insensitively.
const ALLOWED_TOKENS: [&str; 8] =
    ["contains", "tolower", "eq", "and", "or", "armregionname", "productname", "metername"];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FilterSyntaxError {
    #[error("filter is empty")]
    Empty,
    #[error("unbalanced single quotes ({count} found, expected an even number)")]
    UnbalancedQuotes { count: usize },
    #[error("unbalanced parentheses")]
    UnbalancedParens,
    #[error("unknown token `{token}` in filter")]
    UnknownToken { token: String },
    #[error("filter starts or ends with logical operator `{operator}`")]
    DanglingOperator { operator: String },
}

impl FilterSyntaxError {
    /// A hint the LLM can act on when it regenerates the filter. Never shown
    /// raw to the end user.
    pub fn remediation_hint(&self) -> String {
        match self {
            Self::Empty => "provide a non-empty OData filter string".to_string(),
            Self::UnbalancedQuotes { .. } => {
                "wrap every literal in paired single quotes, e.g. contains(tolower(meterName), 'd8s')"
                    .to_string()
            }
            Self::UnbalancedParens => {
                "balance the parentheses; every contains(tolower(field), 'kw') needs both closers"
                    .to_string()
            }
            Self::UnknownToken { token } => format!(
                "`{token}` is not allowed; use only armRegionName, productName, meterName with contains/tolower/eq joined by and/or"
            ),
            Self::DanglingOperator { operator } => {
                format!("remove the leading/trailing `{operator}`; the filter must not start or end with a logical operator")
            }
        }
    }
}

/// Pre-flight syntax check. Pure; a failing filter must never reach the
/// catalog.
pub fn validate(filter: &str) -> Result<(), FilterSyntaxError> {
    let trimmed = filter.trim();
    if trimmed.is_empty() {
        return Err(FilterSyntaxError::Empty);
    }

    let quote_count = trimmed.chars().filter(|ch| *ch == '\'').count();
    if quote_count % 2 != 0 {
        return Err(FilterSyntaxError::UnbalancedQuotes { count: quote_count });
    }

    let mut depth = 0i32;
    let mut in_quote = false;
    for ch in trimmed.chars() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth -= 1;
                if depth < 0 {
                    return Err(FilterSyntaxError::UnbalancedParens);
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(FilterSyntaxError::UnbalancedParens);
    }

    let tokens = bare_tokens(trimmed);
    for token in &tokens {
        if !ALLOWED_TOKENS.contains(&token.to_ascii_lowercase().as_str()) {
            return Err(FilterSyntaxError::UnknownToken { token: token.clone() });
        }
    }

    for edge in [tokens.first(), tokens.last()].into_iter().flatten() {
        let lowered = edge.to_ascii_lowercase();
        if lowered == "and" || lowered == "or" {
            return Err(FilterSyntaxError::DanglingOperator { operator: lowered });
        }
    }

    Ok(())
}

/// Tokens appearing outside quoted literals.
fn bare_tokens(filter: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;

    for ch in filter.chars() {
        if ch == '\'' {
            in_quote = !in_quote;
            flush_token(&mut current, &mut tokens);
            continue;
        }
        if in_quote {
            continue;
        }
        if ch.is_ascii_alphanumeric() || ch == '_' {
            current.push(ch);
        } else {
            flush_token(&mut current, &mut tokens);
        }
    }
    flush_token(&mut current, &mut tokens);
    tokens
}

fn flush_token(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

/// Structured view of a filter for broadening. Clause order within each field
/// is document order; `rebuild` emits region, productName, then meterName
/// clauses joined with ` and `.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedFilter {
    pub region_exact: Option<String>,
    pub region_fuzzy: Vec<String>,
    pub product_keywords: Vec<String>,
    pub meter_keywords: Vec<String>,
}

impl ParsedFilter {
    pub fn rebuild(&self) -> String {
        let mut parts = Vec::new();
        if let Some(code) = &self.region_exact {
            parts.push(format!("armRegionName eq '{code}'"));
        }
        for token in &self.region_fuzzy {
            parts.push(format!("contains(tolower(armRegionName), '{token}')"));
        }
        for keyword in &self.product_keywords {
            parts.push(format!("contains(tolower(productName), '{keyword}')"));
        }
        for keyword in &self.meter_keywords {
            parts.push(format!("contains(tolower(meterName), '{keyword}')"));
        }
        parts.join(" and ")
    }
}

/// Best-effort clause extraction. Unrecognized fragments are dropped on
/// rebuild, which is acceptable because broadening only runs on filters that
/// already passed `validate`.
pub fn parse(filter: &str) -> ParsedFilter {
    // ASCII lowering preserves byte offsets, so indexes found in `lower`
    // slice `filter` directly.
    let lower = filter.to_ascii_lowercase();
    let mut parsed = ParsedFilter::default();

    if let Some(pos) = lower.find("armregionname eq '") {
        let start = pos + "armregionname eq '".len();
        if let Some(len) = lower[start..].find('\'') {
            parsed.region_exact = Some(filter[start..start + len].to_string());
        }
    }

    let mut at = 0;
    while let Some(rel) = lower[at..].find("contains(tolower(") {
        let field_start = at + rel + "contains(tolower(".len();
        let Some(field_len) = lower[field_start..].find(')') else { break };
        let field = lower[field_start..field_start + field_len].trim().to_string();

        let after_field = field_start + field_len;
        let Some(quote_rel) = lower[after_field..].find('\'') else { break };
        let keyword_start = after_field + quote_rel + 1;
        let Some(keyword_len) = lower[keyword_start..].find('\'') else { break };
        let keyword = filter[keyword_start..keyword_start + keyword_len].to_string();

        match field.as_str() {
            "productname" => parsed.product_keywords.push(keyword),
            "metername" => parsed.meter_keywords.push(keyword),
            "armregionname" => parsed.region_fuzzy.push(keyword),
            _ => {}
        }
        at = keyword_start + keyword_len + 1;
    }

    parsed
}

/// Propose a strictly broader filter, or `None` when nothing can be dropped.
///
/// Priority: drop the rightmost meterName keyword while more than one remains;
/// then drop all productName keywords keeping the sole meterName keyword; then
/// drop the rightmost productName keyword. Region clauses are preserved
/// verbatim and never relaxed.
pub fn broaden(filter: &str) -> Option<String> {
    let mut parsed = parse(filter);

    if parsed.meter_keywords.len() > 1 {
        parsed.meter_keywords.pop();
    } else if parsed.meter_keywords.len() == 1 && !parsed.product_keywords.is_empty() {
        parsed.product_keywords.clear();
    } else if parsed.meter_keywords.is_empty() && parsed.product_keywords.len() > 1 {
        parsed.product_keywords.pop();
    } else {
        return None;
    }

    Some(parsed.rebuild())
}
