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

use std::error::Error as StdError;

/// A type-erased error used at trait boundaries (`Gateway::Error`, `Codec::Error`) where the
/// concrete error type is an implementation detail of the adapter.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Extension methods for rendering an error and its full source chain in a single structured log
/// field.
pub trait StdErrorExt {
    /// Render this error and every `source()` in its chain as a single `": "`-joined string,
    /// suitable as a structured `error:%` log field.
    fn as_chain(&self) -> String;
}

impl<E> StdErrorExt for E
where
    E: StdError,
{
    fn as_chain(&self) -> String {
        let mut chain = self.to_string();

        let mut source = self.source();
        while let Some(error) = source {
            chain.push_str(": ");
            chain.push_str(&error.to_string());
            source = error.source();
        }

        chain
    }
}
