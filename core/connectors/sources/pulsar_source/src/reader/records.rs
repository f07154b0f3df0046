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

use crate::message::PulsarMessage;
use std::collections::{BTreeMap, BTreeSet};

/// The outcome of one fetch: emitted messages grouped by split, and the splits that finished.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordsBySplits {
    records: BTreeMap<String, Vec<PulsarMessage>>,
    finished_splits: BTreeSet<String>,
}

impl RecordsBySplits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, split_id: &str, message: PulsarMessage) {
        self.records
            .entry(split_id.to_owned())
            .or_default()
            .push(message);
    }

    pub fn mark_finished(&mut self, split_id: &str) {
        self.finished_splits.insert(split_id.to_owned());
    }

    pub fn records_of(&self, split_id: &str) -> &[PulsarMessage] {
        self.records
            .get(split_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn records(&self) -> impl Iterator<Item = &PulsarMessage> {
        self.records.values().flatten()
    }

    pub fn finished_splits(&self) -> &BTreeSet<String> {
        &self.finished_splits
    }

    /// Number of emitted messages.
    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.finished_splits.is_empty()
    }
}
