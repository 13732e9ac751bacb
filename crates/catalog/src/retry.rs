use pricebot_core::domain::PriceResultSet;
use pricebot_core::filter::broaden;
use pricebot_stream::StreamEvent;
use tokio::sync::mpsc;
use tracing::info;

use crate::client::{CatalogClient, CatalogError, PageFetcher};

/// Bounded retry driver around the broadening strategy.
///
/// Tries `filter`; on zero records, proposes a strictly broader filter and
/// retries, stopping after `max_attempts` total tries or when nothing more can
/// be dropped. One `step` event is emitted per retry. The returned set carries
/// the filter actually used and the attempt count; intermediate filters are
/// not reported.
pub async fn lookup_with_broadening<F>(
    client: &CatalogClient<F>,
    filter: &str,
    max_attempts: u32,
    events: &mpsc::Sender<StreamEvent>,
) -> Result<PriceResultSet, CatalogError>
where
    F: PageFetcher,
{
    let mut current = filter.to_string();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let records = client.fetch_prices(&current).await?;

        if !records.is_empty() || attempts >= max_attempts {
            return Ok(PriceResultSet { records, filter_used: current, attempts });
        }

        let Some(broader) = broaden(&current) else {
            return Ok(PriceResultSet { records, filter_used: current, attempts });
        };

        info!(
            event_name = "catalog.broaden.retry",
            attempt = attempts,
            from = %current,
            to = %broader,
            "zero results, retrying with broader filter"
        );
        let _ = events
            .send(StreamEvent::Step {
                message: format!("no results, broadening filter to `{broader}`"),
            })
            .await;
        current = broader;
    }
}
