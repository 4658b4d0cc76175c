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

use metrics::{counter, describe_counter};

/// Registers and gives a handle to the counters this pipeline reports. Cheap to construct and
/// clone; the underlying storage lives in the globally installed metrics recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Metrics;

impl Metrics {
    pub fn new() -> Self {
        describe_counter!("chain_indexer_blocks_indexed", "Blocks committed to storage");
        describe_counter!(
            "chain_indexer_transactions_indexed",
            "Transactions committed to storage"
        );
        describe_counter!("chain_indexer_events_indexed", "Events committed to storage");
        describe_counter!(
            "chain_indexer_worker_errors",
            "Work items dropped by a worker after a failed step, by kind"
        );

        Self
    }

    pub fn block_indexed(&self) {
        counter!("chain_indexer_blocks_indexed").increment(1);
    }

    pub fn transactions_indexed(&self, count: u64) {
        counter!("chain_indexer_transactions_indexed").increment(count);
    }

    pub fn event_indexed(&self) {
        counter!("chain_indexer_events_indexed").increment(1);
    }

    pub fn worker_error(&self, kind: &'static str) {
        counter!("chain_indexer_worker_errors", "kind" => kind).increment(1);
    }
}
