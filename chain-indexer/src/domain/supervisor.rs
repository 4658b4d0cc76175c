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

use std::fmt::{self, Display};
use tokio_util::sync::CancellationToken;

/// Lifecycle states of the ingestion pipeline as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Draining,
    Stopped,
}

impl Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// Why the pipeline transitioned out of `Running`, and hence the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT or SIGTERM was received: clean shutdown, exit code 0.
    Signal,

    /// A producer hit a fatal condition (category 1, 2, or 6 of the error design): exit code
    /// non-zero.
    FatalError,
}

/// The shutdown signal shared by every producer and worker, and by in-flight gateway calls, so
/// that all suspendable operations can honour the supervisor's decision to drain.
pub type ShutdownSignal = CancellationToken;
