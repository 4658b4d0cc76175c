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

use crate::domain::RawEvent;
use tokio::sync::{Mutex, mpsc};

/// Default bounded capacity of the work queue, the sole backpressure signal from workers to
/// producers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 25;

/// A value enqueued by a producer and drained by exactly one worker.
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// A height to fetch, assemble, and persist.
    Height(i64),

    /// A raw event received from a subscription, persisted verbatim.
    Event(RawEvent),
}

/// The producer-facing half of the work queue. Cloned once per producer; `send` suspends the
/// caller when the queue is full.
pub type WorkQueueSender = mpsc::Sender<WorkItem>;

/// The worker-facing half of the work queue, shared across all workers so that any of them may
/// dequeue the next available item.
pub type WorkQueueReceiver = Mutex<mpsc::Receiver<WorkItem>>;

/// Create a new bounded work queue with the given capacity.
pub fn channel(capacity: usize) -> (WorkQueueSender, WorkQueueReceiver) {
    let (sender, receiver) = mpsc::channel(capacity);
    (sender, Mutex::new(receiver))
}
