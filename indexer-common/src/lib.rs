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

//! Functionality shared by every crate in this workspace: byte/hash newtypes, error plumbing,
//! configuration loading, telemetry bootstrap, and database connection pools.

pub mod bytes;
pub mod config;
pub mod error;
pub mod infra;
pub mod telemetry;
