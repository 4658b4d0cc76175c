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

use crate::domain::{Codec, DecodeError, RawTx, TxRecord};
use indexer_common::error::BoxError;
use serde::Deserialize;
use serde_json::Value as Json;

const MAX_MEMO_LEN: usize = 256;

/// A [Codec] that treats a fetched transaction's raw bytes as the JSON body of the client-facing
/// REST gateway's transaction response (the shape this workspace's REST gateways already return),
/// and keeps `messages`/`fee`/`signatures` opaque rather than interpreting them.
///
/// Missing optional fields fall back to the defaults named in the persistence schema
/// (`gas_wanted`/`gas_used` default to `0`, `messages`/`signatures` default to `[]`, `fee`
/// defaults to `{}`); a payload that isn't valid JSON, or whose `tx_response.txhash` disagrees
/// with the hash it was fetched by, is a [DecodeError].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[derive(Debug, Deserialize)]
struct TxResponseEnvelope {
    tx_response: TxResponseBody,
}

#[derive(Debug, Deserialize)]
struct TxResponseBody {
    txhash: String,

    #[serde(default)]
    gas_wanted: Option<String>,

    #[serde(default)]
    gas_used: Option<String>,

    #[serde(default)]
    tx: Option<TxBody>,
}

#[derive(Debug, Deserialize)]
struct TxBody {
    #[serde(default)]
    body: Option<TxBodyMessages>,

    #[serde(default)]
    auth_info: Option<TxAuthInfo>,

    #[serde(default)]
    signatures: Option<Json>,
}

#[derive(Debug, Deserialize)]
struct TxBodyMessages {
    #[serde(default)]
    messages: Option<Json>,

    #[serde(default)]
    memo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TxAuthInfo {
    #[serde(default)]
    fee: Option<Json>,
}

impl Codec for JsonCodec {
    fn decode_tx(&self, height: i64, timestamp: i64, tx: RawTx) -> Result<TxRecord, DecodeError> {
        let decode = |source: BoxError| DecodeError {
            hash: tx.hash.clone(),
            source,
        };

        let envelope = serde_json::from_slice::<TxResponseEnvelope>(&tx.raw)
            .map_err(|error| decode(error.into()))?;
        let body = envelope.tx_response;

        if !body.txhash.eq_ignore_ascii_case(&tx.hash) {
            return Err(decode(
                format!(
                    "tx hash mismatch: fetched {} but response named {}",
                    tx.hash, body.txhash
                )
                .into(),
            ));
        }

        let gas_wanted = parse_gas(body.gas_wanted.as_deref()).map_err(|e| decode(e.into()))?;
        let gas_used = parse_gas(body.gas_used.as_deref()).map_err(|e| decode(e.into()))?;

        let messages = body
            .tx
            .as_ref()
            .and_then(|tx| tx.body.as_ref())
            .and_then(|b| b.messages.clone())
            .unwrap_or_else(|| Json::Array(Vec::new()));

        let memo = body
            .tx
            .as_ref()
            .and_then(|tx| tx.body.as_ref())
            .and_then(|b| b.memo.clone())
            .unwrap_or_default();
        let memo = if memo.len() > MAX_MEMO_LEN {
            memo[..MAX_MEMO_LEN].to_string()
        } else {
            memo
        };

        let fee = body
            .tx
            .as_ref()
            .and_then(|tx| tx.auth_info.as_ref())
            .and_then(|a| a.fee.clone())
            .unwrap_or_else(|| Json::Object(Default::default()));

        let signatures = body
            .tx
            .as_ref()
            .and_then(|tx| tx.signatures.clone())
            .unwrap_or_else(|| Json::Array(Vec::new()));

        Ok(TxRecord {
            hash: tx.hash,
            height,
            timestamp,
            gas_wanted,
            gas_used,
            messages,
            fee,
            signatures,
            memo,
        })
    }
}

fn parse_gas(value: Option<&str>) -> Result<i64, std::num::ParseIntError> {
    value.map(str::parse).transpose().map(|v| v.unwrap_or(0))
}
