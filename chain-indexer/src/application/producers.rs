// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::{Gateway, GatewayError, ShutdownSignal, Subscription, WorkItem, WorkQueueSender};
use fastrace::trace;
use futures::StreamExt;
use log::{info, warn};

/// Reads `latest_height` once, then enqueues every height in `[start_height, latest_height]` in
/// ascending order. Aborts and signals fatal if `latest_height` cannot be fetched; a height that
/// cannot be sent because the queue has been closed ends the sweep quietly (the supervisor is
/// already draining).
#[trace(properties = { "start_height": "{start_height}" })]
pub async fn backfill_sweeper<G>(
    gateway: G,
    sender: WorkQueueSender,
    start_height: i64,
    shutdown: ShutdownSignal,
) -> Result<(), GatewayError>
where
    G: Gateway,
{
    let latest_height = gateway.latest_height().await?;
    info!(start_height, latest_height; "starting backfill sweep");

    if start_height > latest_height {
        info!(start_height, latest_height; "nothing to backfill");
        return Ok(());
    }

    for height in start_height..=latest_height {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!(height; "backfill sweep interrupted by shutdown");
                return Ok(());
            }

            result = sender.send(WorkItem::Height(height)) => {
                if result.is_err() {
                    info!(height; "work queue closed, ending backfill sweep");
                    return Ok(());
                }
            }
        }
    }

    info!(latest_height; "backfill sweep complete");
    Ok(())
}

/// Subscribes to `new_block` notifications and enqueues the height of every block received.
/// Exits cleanly (not fatal) when the subscription stream closes.
#[trace]
pub async fn new_block_listener<G>(
    gateway: G,
    sender: WorkQueueSender,
    shutdown: ShutdownSignal,
) -> Result<(), GatewayError>
where
    G: Gateway,
{
    const SUBSCRIBER_ID: &str = "chain-indexer/new-block-listener";

    let Subscription { mut stream, cancel } =
        gateway.subscribe_new_blocks(SUBSCRIBER_ID).await?;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                cancel.cancel();
                info!("new block listener stopped by shutdown");
                return Ok(());
            }

            next = stream.next() => {
                match next {
                    Some(Ok(notification)) => {
                        let height = notification.height;
                        if sender.send(WorkItem::Height(height)).await.is_err() {
                            cancel.cancel();
                            return Ok(());
                        }
                    }

                    Some(Err(error)) => {
                        warn!(error:% = error; "new block subscription error");
                        cancel.cancel();
                        return Ok(());
                    }

                    None => {
                        info!("new block subscription closed");
                        cancel.cancel();
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Subscribes to the configured query string and enqueues every received event verbatim. Exits
/// cleanly (not fatal) when the subscription stream closes.
#[trace(properties = { "query": "{query}" })]
pub async fn event_listener<G>(
    gateway: G,
    sender: WorkQueueSender,
    query: String,
    shutdown: ShutdownSignal,
) -> Result<(), GatewayError>
where
    G: Gateway,
{
    const SUBSCRIBER_ID: &str = "chain-indexer/event-listener";

    let Subscription { mut stream, cancel } =
        gateway.subscribe_events(SUBSCRIBER_ID, &query).await?;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                cancel.cancel();
                info!("event listener stopped by shutdown");
                return Ok(());
            }

            next = stream.next() => {
                match next {
                    Some(Ok(event)) => {
                        if sender.send(WorkItem::Event(event)).await.is_err() {
                            cancel.cancel();
                            return Ok(());
                        }
                    }

                    Some(Err(error)) => {
                        warn!(error:% = error; "event subscription error");
                        cancel.cancel();
                        return Ok(());
                    }

                    None => {
                        info!("event subscription closed");
                        cancel.cancel();
                        return Ok(());
                    }
                }
            }
        }
    }
}
