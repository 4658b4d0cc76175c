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

mod metrics;
mod producers;
mod workers;

use crate::domain::{Codec, Gateway, ShutdownReason, Storage, SupervisorState, queue};
use anyhow::{Context, bail};
use log::{error, info, warn};
use metrics::Metrics;
use serde::Deserialize;
use std::sync::Arc;
use tokio::{signal::unix::Signal, task::JoinSet};
use tokio_util::sync::CancellationToken;

/// Which of the three producers to run, and how many workers to size the pool at. Everything
/// other than `worker_count` and `queue_capacity` maps directly onto one producer each; a
/// deployment that sets neither `listen_new_blocks` nor an `events_query` and leaves
/// `parse_old_blocks` false runs no producers and idles until signalled.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Height to start the backfill sweep at if the store is empty.
    pub start_height: i64,

    /// Number of workers draining the work queue.
    pub worker_count: usize,

    /// Bounded capacity of the work queue.
    pub queue_capacity: usize,

    /// Whether to run the Backfill Sweeper producer.
    pub parse_old_blocks: bool,

    /// Whether to run the New Block Listener producer.
    pub listen_new_blocks: bool,

    /// Query string for the Event Listener producer; `None` disables it.
    pub events_query: Option<String>,
}

/// Runs the ingestion pipeline to completion: wires the work queue, spawns the configured
/// producers and the worker pool, and drives the Starting -> Running -> Draining -> Stopped
/// lifecycle until a shutdown signal or a fatal producer error occurs.
///
/// Returns `Ok(())` for a signal-driven (clean) shutdown and `Err` for a fatal-error shutdown;
/// callers map the two onto the process exit code.
pub async fn run<G, C, S>(
    config: Config,
    gateway: G,
    codec: C,
    storage: S,
    mut sigterm: Signal,
) -> anyhow::Result<()>
where
    G: Gateway,
    C: Codec,
    S: Storage,
{
    let Config {
        start_height,
        worker_count,
        queue_capacity,
        parse_old_blocks,
        listen_new_blocks,
        events_query,
    } = config;

    if worker_count == 0 {
        bail!("worker_count must be at least 1");
    }

    let mut state = SupervisorState::Starting;
    info!(state:%; "bootstrapping gateway and worker pool");
    let metrics = Arc::new(Metrics::new());
    let shutdown = CancellationToken::new();

    let (sender, receiver) = queue::channel(queue_capacity);
    let receiver = Arc::new(receiver);

    let mut producers = JoinSet::new();

    if parse_old_blocks {
        let resume_height = match storage
            .get_highest_block_info()
            .await
            .context("get highest block info")?
        {
            Some(info) => info.height + 1,
            None => start_height,
        };

        producers.spawn(producers::backfill_sweeper(
            gateway.clone(),
            sender.clone(),
            resume_height,
            shutdown.clone(),
        ));
    }

    if listen_new_blocks {
        producers.spawn(producers::new_block_listener(
            gateway.clone(),
            sender.clone(),
            shutdown.clone(),
        ));
    }

    if let Some(query) = events_query {
        producers.spawn(producers::event_listener(
            gateway.clone(),
            sender.clone(),
            query,
            shutdown.clone(),
        ));
    }

    // Drop our own sender so the channel closes once every producer's clone has been dropped,
    // which is what lets workers drain to completion instead of blocking forever.
    drop(sender);

    let mut workers = JoinSet::new();
    for id in 0..worker_count {
        workers.spawn(workers::worker(
            id,
            gateway.clone(),
            codec.clone(),
            storage.clone(),
            receiver.clone(),
            shutdown.clone(),
            metrics.clone(),
        ));
    }

    state = SupervisorState::Running;
    info!(state:%, worker_count, parse_old_blocks, listen_new_blocks; "chain indexer running");

    let reason = loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => break ShutdownReason::Signal,

            _ = sigterm.recv() => break ShutdownReason::Signal,

            result = producers.join_next(), if !producers.is_empty() => {
                match result {
                    Some(Ok(Ok(()))) => continue,

                    Some(Ok(Err(error))) => {
                        error!(error:% = error; "producer exited with fatal error");
                        break ShutdownReason::FatalError;
                    }

                    Some(Err(join_error)) => {
                        error!(error:% = join_error; "producer task panicked");
                        break ShutdownReason::FatalError;
                    }

                    None => continue,
                }
            }
        }
    };

    state = SupervisorState::Draining;
    info!(state:%, reason:?; "draining");
    shutdown.cancel();

    while let Some(result) = producers.join_next().await {
        if let Err(join_error) = result {
            warn!(error:% = join_error; "producer task panicked during drain");
        }
    }

    while let Some(result) = workers.join_next().await {
        if let Err(join_error) = result {
            warn!(error:% = join_error; "worker task panicked during drain");
        }
    }

    if let Err(error) = gateway.stop().await {
        warn!(error:% = error; "failed to cleanly stop gateway");
    }

    state = SupervisorState::Stopped;
    info!(state:%; "stopped");

    match reason {
        ShutdownReason::Signal => Ok(()),
        ShutdownReason::FatalError => bail!("chain indexer stopped after a fatal producer error"),
    }
}
