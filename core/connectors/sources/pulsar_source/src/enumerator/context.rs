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

use crate::split::PulsarPartitionSplit;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

/// The runtime the enumerator runs in: it knows the registered readers and delivers
/// assignments and completion signals to them.
pub trait SplitEnumeratorContext: Send + Sync + Debug {
    fn current_parallelism(&self) -> u32;

    fn registered_readers(&self) -> BTreeSet<u32>;

    fn assign_splits(&self, assignment: SplitsAssignment);

    fn signal_no_more_splits(&self, reader_id: u32);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitsAssignment {
    assignment: BTreeMap<u32, Vec<PulsarPartitionSplit>>,
}

impl SplitsAssignment {
    pub fn add(&mut self, reader_id: u32, split: PulsarPartitionSplit) {
        self.assignment.entry(reader_id).or_default().push(split);
    }

    pub fn splits_of(&self, reader_id: u32) -> &[PulsarPartitionSplit] {
        self.assignment
            .get(&reader_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.assignment.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.assignment.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<u32, Vec<PulsarPartitionSplit>> {
        self.assignment
    }
}
