use pricebot_core::filter::{broaden, validate};

use super::CommandResult;

/// Print every filter the zero-result retry path would try, in order.
pub fn run(filter: &str) -> CommandResult {
    if let Err(error) = validate(filter) {
        return CommandResult::failure(format!(
            "invalid filter: {error}\nhint: {}",
            error.remediation_hint()
        ));
    }

    let mut lines = vec![format!("1. {filter}")];
    let mut current = filter.to_string();
    let mut step = 1;
    while let Some(broader) = broaden(&current) {
        step += 1;
        lines.push(format!("{step}. {broader}"));
        current = broader;
    }

    if step == 1 {
        lines.push("(nothing to drop; this filter is already as broad as it gets)".to_string());
    }
    CommandResult::success(lines.join("\n"))
}
