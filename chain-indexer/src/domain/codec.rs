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

use crate::domain::{RawTx, TxRecord};
use thiserror::Error;

/// Decodes an opaque, wire-format transaction payload into this system's own [TxRecord]. Kept
/// pluggable so the core never commits to a specific chain's wire format: multiple codecs can
/// coexist, selected at construction time.
pub trait Codec
where
    Self: Clone + Send + Sync + 'static,
{
    fn decode_tx(
        &self,
        height: i64,
        timestamp: i64,
        tx: RawTx,
    ) -> Result<TxRecord, DecodeError>;
}

/// Error returned when a codec rejects a transaction payload it was asked to decode.
#[derive(Debug, Error)]
#[error("cannot decode transaction {hash}")]
pub struct DecodeError {
    pub hash: String,
    #[source]
    pub source: indexer_common::error::BoxError,
}
