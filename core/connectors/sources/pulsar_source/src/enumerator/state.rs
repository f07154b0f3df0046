/* Licensed to the Apache Software Foundation (ASF) under one
 * or more contributor license agreements.  See the NOTICE file
 * distributed with this work for additional information
 * regarding copyright ownership.  The ASF licenses this file
 * to you under the Apache License, Version 2.0 (the
 * "License"); you may not use this file except in compliance
 * with the License.  You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing,
 * software distributed under the License is distributed on an
 * "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
 * KIND, either express or implied.  See the License for the
 * specific language governing permissions and limitations
 * under the License.
 */

use crate::checkpoint;
use crate::error::PulsarSourceError;
use crate::split::PulsarPartitionSplit;
use crate::topic::TopicPartition;
use std::collections::BTreeSet;

/// The enumerator's checkpoint: every partition discovered so far, the splits not handed
/// to a reader yet and the splits reported finished. Assigned splits are tracked by the
/// readers' own state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumeratorState {
    pub appended_partitions: BTreeSet<TopicPartition>,
    pub pending_splits: Vec<PulsarPartitionSplit>,
    pub finished_splits: BTreeSet<String>,
}

impl EnumeratorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PulsarSourceError> {
        checkpoint::serialize_enumerator_state(self)
    }

    /// Every discovered partition has a split, so all of them finished once each one is
    /// reported.
    pub fn all_splits_finished(&self) -> bool {
        self.pending_splits.is_empty()
            && self
                .appended_partitions
                .iter()
                .all(|partition| self.finished_splits.contains(&partition.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PulsarSourceError> {
        checkpoint::deserialize_enumerator_state(bytes)
    }
}
