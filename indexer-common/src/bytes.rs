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

use derive_more::{AsRef, From};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Type};
use std::{
    array::TryFromSliceError,
    fmt::{self, Debug, Display},
};

#[cfg(feature = "standalone")]
use sqlx::{Sqlite, sqlite::SqliteTypeInfo};

#[cfg(feature = "cloud")]
use sqlx::{Postgres, postgres::PgTypeInfo};

/// A fixed-size, stack-allocated byte array, used for hashes and other digests of a known length
/// (e.g. `ByteArray<32>` for a block or transaction hash).
#[derive(Clone, Copy, PartialEq, Eq, Hash, From, AsRef, Serialize, Deserialize)]
#[as_ref([u8])]
pub struct ByteArray<const N: usize>(#[serde(with = "serde_bytes_array")] pub [u8; N]);

impl<const N: usize> ByteArray<N> {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> TryFrom<&[u8]> for ByteArray<N> {
    type Error = TryFromSliceError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; N]>::try_from(bytes).map(Self)
    }
}

impl<const N: usize> Default for ByteArray<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> Debug for ByteArray<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_encoded = const_hex::encode(self.as_ref());

        if hex_encoded.len() <= 8 {
            write!(f, "ByteArray({hex_encoded})")
        } else {
            write!(f, "ByteArray({}…)", &hex_encoded[0..8])
        }
    }
}

impl<const N: usize> Display for ByteArray<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", const_hex::encode(self.as_ref()))
    }
}

/// An owned, heap-allocated byte buffer of unknown length (e.g. raw SCALE-less payloads pulled
/// from a node, before this system's own schema is applied).
#[derive(Clone, PartialEq, Eq, From, AsRef, Serialize, Deserialize)]
#[as_ref([u8])]
pub struct ByteVec(pub Vec<u8>);

impl ByteVec {
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<&[u8]> for ByteVec {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl Debug for ByteVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_encoded = const_hex::encode(self.as_ref());

        if hex_encoded.len() <= 8 {
            write!(f, "ByteVec({hex_encoded})")
        } else {
            write!(f, "ByteVec({}…)", &hex_encoded[0..8])
        }
    }
}

impl Display for ByteVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", const_hex::encode(self.as_ref()))
    }
}

#[cfg(feature = "standalone")]
impl Type<Sqlite> for ByteVec {
    fn type_info() -> SqliteTypeInfo {
        <Vec<u8> as Type<Sqlite>>::type_info()
    }
}

#[cfg(feature = "standalone")]
impl<'q> Encode<'q, Sqlite> for ByteVec {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Vec<u8> as Encode<Sqlite>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(feature = "standalone")]
impl<'r> Decode<'r, Sqlite> for ByteVec {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        <Vec<u8> as Decode<Sqlite>>::decode(value).map(Self)
    }
}

#[cfg(feature = "cloud")]
impl Type<Postgres> for ByteVec {
    fn type_info() -> PgTypeInfo {
        <Vec<u8> as Type<Postgres>>::type_info()
    }
}

#[cfg(feature = "cloud")]
impl<'q> Encode<'q, Postgres> for ByteVec {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Vec<u8> as Encode<Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(feature = "cloud")]
impl<'r> Decode<'r, Postgres> for ByteVec {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        <Vec<u8> as Decode<Postgres>>::decode(value).map(Self)
    }
}

mod serde_bytes_array {
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        bytes.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = <Vec<u8>>::deserialize(deserializer)?;
        bytes
            .try_into()
            .map_err(|v: Vec<u8>| Error::custom(format!("expected {N} bytes, got {}", v.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_array_debug_truncates() {
        let array = ByteArray([0xab; 32]);
        let debug = format!("{array:?}");
        assert!(debug.starts_with("ByteArray("));
        assert!(debug.ends_with("…)"));
    }

    #[test]
    fn test_byte_array_roundtrip() {
        let bytes = [1u8, 2, 3, 4];
        let array = ByteArray::try_from(bytes.as_slice()).unwrap();
        assert_eq!(array.as_ref(), &bytes);
    }
}
