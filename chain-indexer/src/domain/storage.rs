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

use crate::domain::{BlockDossier, BlockInfo, EventRecord};

/// The transactional sink workers commit into. Every implementation must behave as
/// insert-or-replace keyed by `height` for the block row, by `tx.hash` for transaction rows, and
/// by `(height, validator_address)` for validator rows, and must commit a dossier's block,
/// transactions, and validator set atomically: a partially-written dossier is never visible to a
/// concurrent reader.
///
/// Implementations must be safe for concurrent use by `N` workers.
#[trait_variant::make(Send)]
pub trait Storage
where
    Self: Clone + Send + Sync + 'static,
{
    /// The highest height committed so far, used by the standalone binary to report startup
    /// state. Returns `None` on a fresh store.
    async fn get_highest_block_info(&self) -> Result<Option<BlockInfo>, sqlx::Error>;

    /// Atomically upsert a block, its transactions, and its validator set.
    async fn save_block(&self, dossier: &BlockDossier) -> Result<(), sqlx::Error>;

    /// Persist a single received event.
    async fn save_event(&self, event: &EventRecord) -> Result<(), sqlx::Error>;
}
