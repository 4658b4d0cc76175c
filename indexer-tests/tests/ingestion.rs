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

//! Black-box scenarios against [chain_indexer::application::run], driven entirely through the
//! [Gateway]/[Storage] trait boundary with scripted doubles. Scenarios that need `run` to return
//! share one `#[tokio::test]` function and run strictly one after another: `run` only terminates
//! on a real SIGTERM/SIGINT, and concurrent tests each registering their own SIGTERM handler in
//! the same process would race the others' delivery.

mod support;

use chain_indexer::{
    application,
    domain::{BlockHash, RawBlockHeader, ValidatorEntry},
    infra::codec::JsonCodec,
};
use indexer_common::bytes::ByteArray;
use std::time::Duration;
use support::{InMemoryStorage, ScriptedGateway, json_tx, raise_sigterm, register_sigterm};
use tokio::time::{sleep, timeout};

fn block_hash(seed: u8) -> BlockHash {
    BlockHash(ByteArray([seed; 32]))
}

fn header(height: i64, tx_hashes: Vec<String>) -> RawBlockHeader {
    RawBlockHeader {
        height,
        timestamp: height * 1_000,
        proposer: format!("val-{height}"),
        hash: block_hash(height as u8),
        tx_hashes,
    }
}

fn validators(height: i64) -> Vec<ValidatorEntry> {
    vec![ValidatorEntry {
        address: format!("val-{height}"),
        voting_power: 10,
    }]
}

/// Polls `f` until it returns `true` or the deadline elapses, failing the test on timeout rather
/// than hanging forever if a scenario is mis-scripted.
async fn wait_until(deadline: Duration, mut f: impl FnMut() -> bool) {
    timeout(deadline, async {
        while !f() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition met before deadline");
}

#[tokio::test]
async fn test_ingestion_scenarios_in_sequence() {
    // S1: cold-start backfill over heights 1..=3, where block 2 carries one transaction.
    let tx_hash = "A".repeat(64);
    let (gateway, _new_blocks_tx, _events_tx) = ScriptedGateway::builder()
        .latest_height(3)
        .block(header(1, vec![]))
        .block(header(2, vec![tx_hash.clone()]))
        .block(header(3, vec![]))
        .validators(1, validators(1))
        .validators(2, validators(2))
        .validators(3, validators(3))
        .tx(json_tx(&tx_hash))
        .build();

    let storage = InMemoryStorage::default();
    let codec = JsonCodec;

    let config = application::Config {
        start_height: 1,
        worker_count: 1,
        queue_capacity: 25,
        parse_old_blocks: true,
        listen_new_blocks: false,
        events_query: None,
    };

    let sigterm = register_sigterm();
    let run = tokio::spawn(application::run(
        config,
        gateway.clone(),
        codec,
        storage.clone(),
        sigterm,
    ));

    wait_until(Duration::from_secs(5), || storage.blocks().len() == 3).await;
    assert_eq!(storage.tx_count(), 1);
    assert!(storage.contains_height(2));

    raise_sigterm();
    run.await
        .expect("run task does not panic")
        .expect("clean signal-driven shutdown");

    let blocks = storage.blocks();
    assert_eq!(blocks.len(), 3);
    let block_two = blocks.iter().find(|b| b.height == 2).unwrap();
    assert_eq!(block_two.transactions.len(), 1);
    assert_eq!(block_two.transactions[0].hash, tx_hash);
    assert_eq!(block_two.validator_set, validators(2));

    // S2: rerunning the identical sweep against the same store must not duplicate rows; a
    // resumed backfill starts from `get_highest_block_info` + 1, and here nothing is left to do.
    let (gateway_rerun, _new_blocks_tx2, _events_tx2) = ScriptedGateway::builder()
        .latest_height(3)
        .block(header(1, vec![]))
        .block(header(2, vec![tx_hash.clone()]))
        .block(header(3, vec![]))
        .validators(1, validators(1))
        .validators(2, validators(2))
        .validators(3, validators(3))
        .tx(json_tx(&tx_hash))
        .build();

    let sigterm = register_sigterm();
    let run = tokio::spawn(application::run(
        application::Config {
            start_height: 1,
            worker_count: 1,
            queue_capacity: 25,
            parse_old_blocks: true,
            listen_new_blocks: false,
            events_query: None,
        },
        gateway_rerun,
        JsonCodec,
        storage.clone(),
        sigterm,
    ));

    // Resume height is 4 (highest committed + 1), above latest_height 3: sweep has nothing to
    // do and the only producer finishes immediately. Give it a moment, then end the run.
    sleep(Duration::from_millis(200)).await;
    raise_sigterm();
    run.await
        .expect("run task does not panic")
        .expect("clean signal-driven shutdown");

    assert_eq!(storage.blocks().len(), 3, "rerun must not duplicate rows");
    assert_eq!(storage.tx_count(), 1);

    // S3: live catch-up. Start height above the store's current height, no backfill, and new
    // blocks delivered one at a time over the `new_block` subscription.
    let (gateway_live, new_blocks_tx, _events_tx3) = ScriptedGateway::builder()
        .latest_height(12)
        .block(header(11, vec![]))
        .block(header(12, vec![]))
        .validators(11, validators(11))
        .validators(12, validators(12))
        .build();

    let sigterm = register_sigterm();
    let run = tokio::spawn(application::run(
        application::Config {
            start_height: 11,
            worker_count: 1,
            queue_capacity: 25,
            parse_old_blocks: false,
            listen_new_blocks: true,
            events_query: None,
        },
        gateway_live.clone(),
        JsonCodec,
        storage.clone(),
        sigterm,
    ));

    new_blocks_tx
        .send(chain_indexer::domain::NewBlockNotification { height: 11 })
        .unwrap();
    new_blocks_tx
        .send(chain_indexer::domain::NewBlockNotification { height: 12 })
        .unwrap();
    drop(new_blocks_tx);

    wait_until(Duration::from_secs(5), || {
        storage.contains_height(11) && storage.contains_height(12)
    })
    .await;

    raise_sigterm();
    run.await
        .expect("run task does not panic")
        .expect("clean signal-driven shutdown");

    assert_eq!(storage.blocks().len(), 5, "S1/S2 rows plus the two new heights");

    // S4: a transient REST flake on one transaction must not leave a partial dossier visible.
    // Uses its own store so resume-height bookkeeping from S1-S3 doesn't interfere; height 20's
    // only transaction fails once, then the height is re-swept and fully persists.
    let storage_s4 = InMemoryStorage::default();
    let flaky_hash = "B".repeat(64);
    let (gateway_flaky, _nb, _ev) = ScriptedGateway::builder()
        .latest_height(20)
        .block(header(20, vec![flaky_hash.clone()]))
        .validators(20, validators(20))
        .flaky_tx(json_tx(&flaky_hash), 1)
        .build();

    let sigterm = register_sigterm();
    let run = tokio::spawn(application::run(
        application::Config {
            start_height: 20,
            worker_count: 1,
            queue_capacity: 25,
            parse_old_blocks: true,
            listen_new_blocks: false,
            events_query: None,
        },
        gateway_flaky.clone(),
        JsonCodec,
        storage_s4.clone(),
        sigterm,
    ));

    sleep(Duration::from_millis(300)).await;
    raise_sigterm();
    run.await
        .expect("run task does not panic")
        .expect("clean signal-driven shutdown");

    assert!(
        !storage_s4.contains_height(20),
        "a dossier whose transaction fetch failed must never be persisted"
    );

    // Re-sweep the same height now that the transaction fetch succeeds.
    let sigterm = register_sigterm();
    let run = tokio::spawn(application::run(
        application::Config {
            start_height: 20,
            worker_count: 1,
            queue_capacity: 25,
            parse_old_blocks: true,
            listen_new_blocks: false,
            events_query: None,
        },
        gateway_flaky,
        JsonCodec,
        storage_s4.clone(),
        sigterm,
    ));

    wait_until(Duration::from_secs(5), || storage_s4.contains_height(20)).await;
    raise_sigterm();
    run.await
        .expect("run task does not panic")
        .expect("clean signal-driven shutdown");

    let recovered = storage_s4
        .blocks()
        .into_iter()
        .find(|b| b.height == 20)
        .unwrap();
    assert_eq!(recovered.transactions.len(), 1);
    assert_eq!(recovered.transactions[0].hash, flaky_hash);
}

/// S6: a fatal configuration error (an unrecognised `log_format`) must be rejected at load time,
/// before anything is spawned.
#[test]
fn test_invalid_log_format_is_a_fatal_config_error() {
    use indexer_common::config::ConfigExt;
    use indexer_standalone::config::Config;
    use std::io::Write;
    use tempfile::NamedTempFile;

    let mut file = NamedTempFile::new().expect("temp file can be created");
    writeln!(
        file,
        r#"
        rpc_node = "http://localhost:26657"
        client_node = "http://localhost:1317"
        log_format = "yaml"
        "#
    )
    .expect("file can be written");

    let result = Config::load(file.path());
    assert!(result.is_err(), "an unrecognised log_format must fail to load");
}
