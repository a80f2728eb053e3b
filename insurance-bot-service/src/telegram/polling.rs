use std::{future::Future, time::Duration};
use tracing::{error, info};

use super::{TelegramClient, UpdateQueue};

const LONG_POLL_TIMEOUT_SECS: u64 = 30;
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Receive updates with `getUpdates` until `shutdown` resolves.
///
/// Updates are handed to the per-chat queues; the offset is advanced before
/// processing so a slow handler never causes redelivery.
pub async fn run_polling<S>(client: TelegramClient, updates: UpdateQueue, shutdown: S)
where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut offset: Option<i64> = None;
    info!("starting long polling");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("long polling stopped");
                break;
            }
            result = client.get_updates(offset, LONG_POLL_TIMEOUT_SECS) => match result {
                Ok(batch) => {
                    for update in batch {
                        offset = Some(next_offset(offset, update.update_id));
                        updates.enqueue(update);
                    }
                }
                Err(e) => {
                    error!(error = %format!("{:#}", e), "polling Telegram failed, backing off");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }
    }
}

fn next_offset(current: Option<i64>, update_id: i64) -> i64 {
    current.map_or(update_id + 1, |offset| offset.max(update_id + 1))
}
