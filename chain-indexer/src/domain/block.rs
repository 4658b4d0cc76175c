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

use indexer_common::bytes::ByteArray;
use serde_json::Value as Json;
use std::fmt::{self, Debug, Display};

/// Hash of a [BlockDossier], rendered as uppercase hex at the persistence and REST boundaries.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHash(pub ByteArray<32>);

impl From<ByteArray<32>> for BlockHash {
    fn from(bytes: ByteArray<32>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for BlockHash {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", self)
    }
}

impl Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", const_hex::encode_upper(self.as_ref()))
    }
}

/// Everything known about one height, assembled by a worker before a single atomic commit.
#[derive(Debug, Clone)]
pub struct BlockDossier {
    pub height: i64,
    pub timestamp: i64,
    pub proposer: String,
    pub hash: BlockHash,
    pub tx_count: i32,
    pub validator_set: Vec<ValidatorEntry>,
    pub transactions: Vec<TxRecord>,
}

/// A single entry of a height's validator set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorEntry {
    pub address: String,
    pub voting_power: i64,
}

/// A single transaction, decoded via the pluggable codec.
#[derive(Debug, Clone)]
pub struct TxRecord {
    /// 64-character uppercase hex, unique across the store.
    pub hash: String,
    pub height: i64,
    pub timestamp: i64,
    pub gas_wanted: i64,
    pub gas_used: i64,
    pub messages: Json,
    pub fee: Json,
    pub signatures: Json,
    pub memo: String,
}

/// A single received event, persisted verbatim.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub query: String,
    pub payload: Json,
    pub received_at: i64,
}

impl From<crate::domain::RawEvent> for EventRecord {
    fn from(event: crate::domain::RawEvent) -> Self {
        let crate::domain::RawEvent {
            query,
            payload,
            received_at,
        } = event;

        Self {
            query,
            payload,
            received_at,
        }
    }
}

/// Lightweight identity of a committed block, used for startup bootstrapping (e.g. resuming
/// backfill after the last persisted height).
#[derive(Debug, Clone, Copy)]
pub struct BlockInfo {
    pub height: i64,
    pub hash: BlockHash,
}
