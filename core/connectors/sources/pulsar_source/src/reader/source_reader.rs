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

use crate::error::PulsarSourceError;
use crate::reader::ReaderContext;
use crate::reader::records::RecordsBySplits;
use crate::reader::split_reader::{PulsarPartitionSplitReader, SplitsChange, WakeupHandle};
use crate::split::PulsarPartitionSplit;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Runs one split reader per assigned split and fetches from them in turns.
#[derive(Debug)]
pub struct PulsarSourceReader {
    reader_id: u32,
    context: ReaderContext,
    wakeup: WakeupHandle,
    readers: BTreeMap<String, PulsarPartitionSplitReader>,
    /// Finished splits whose acknowledgements still wait for a checkpoint.
    retiring: BTreeMap<String, PulsarPartitionSplitReader>,
    finished: BTreeSet<String>,
    next: usize,
    no_more_splits: bool,
    closed: bool,
}

impl PulsarSourceReader {
    pub fn new(reader_id: u32, context: ReaderContext) -> Self {
        Self {
            reader_id,
            context,
            wakeup: WakeupHandle::default(),
            readers: BTreeMap::new(),
            retiring: BTreeMap::new(),
            finished: BTreeSet::new(),
            next: 0,
            no_more_splits: false,
            closed: false,
        }
    }

    pub fn reader_id(&self) -> u32 {
        self.reader_id
    }

    /// Wakes up whichever split is being fetched.
    pub fn wakeup_handle(&self) -> WakeupHandle {
        self.wakeup.clone()
    }

    pub fn split_ids(&self) -> Vec<String> {
        self.readers.keys().cloned().collect()
    }

    pub async fn add_splits(
        &mut self,
        splits: Vec<PulsarPartitionSplit>,
    ) -> Result<(), PulsarSourceError> {
        if self.closed {
            return Err(PulsarSourceError::ReaderClosed);
        }

        for split in splits {
            let split_id = split.split_id();
            if self.readers.contains_key(&split_id) || self.finished.contains(&split_id) {
                return Err(PulsarSourceError::SplitAlreadyAssigned(split_id));
            }
            let mut reader =
                PulsarPartitionSplitReader::new(self.context.clone(), self.wakeup.clone());
            reader
                .handle_splits_changes(SplitsChange::Addition(vec![split]))
                .await?;
            info!("Reader {} added split {split_id}", self.reader_id);
            self.readers.insert(split_id, reader);
        }
        Ok(())
    }

    /// Fetches one batch from the next split in turn.
    pub async fn fetch(&mut self) -> Result<RecordsBySplits, PulsarSourceError> {
        if self.closed {
            return Err(PulsarSourceError::ReaderClosed);
        }
        if self.readers.is_empty() {
            return Ok(RecordsBySplits::new());
        }

        let index = self.next % self.readers.len();
        self.next = self.next.wrapping_add(1);
        let Some(split_id) = self.readers.keys().nth(index).cloned() else {
            return Ok(RecordsBySplits::new());
        };
        let Some(reader) = self.readers.get_mut(&split_id) else {
            return Ok(RecordsBySplits::new());
        };
        let records = reader.fetch().await?;

        if reader.is_finished()
            && let Some(mut reader) = self.readers.remove(&split_id)
        {
            self.finished.insert(split_id.clone());
            if reader.has_pending_acknowledgements() {
                debug!("Split {split_id} is finished, keeping it until its checkpoint completes");
                self.retiring.insert(split_id, reader);
            } else {
                reader.close().await;
            }
        }
        Ok(records)
    }

    /// The unfinished splits, to be stored with the checkpoint.
    pub fn snapshot_state(&mut self, checkpoint_id: u64) -> Vec<PulsarPartitionSplit> {
        for reader in self.retiring.values_mut() {
            reader.snapshot_state(checkpoint_id);
        }
        self.readers
            .values_mut()
            .filter_map(|reader| reader.snapshot_state(checkpoint_id))
            .collect()
    }

    pub async fn notify_checkpoint_complete(
        &mut self,
        checkpoint_id: u64,
    ) -> Result<(), PulsarSourceError> {
        for reader in self
            .readers
            .values_mut()
            .chain(self.retiring.values_mut())
        {
            reader.notify_checkpoint_complete(checkpoint_id).await?;
        }

        let retired = self
            .retiring
            .iter()
            .filter(|(_, reader)| !reader.has_pending_acknowledgements())
            .map(|(split_id, _)| split_id.clone())
            .collect::<Vec<_>>();
        for split_id in retired {
            if let Some(mut reader) = self.retiring.remove(&split_id) {
                reader.close().await;
            }
        }
        Ok(())
    }

    pub fn signal_no_more_splits(&mut self) {
        info!("Reader {} won't receive more splits", self.reader_id);
        self.no_more_splits = true;
    }

    /// True once no more splits will come and every assigned one finished.
    pub fn is_finished(&self) -> bool {
        self.no_more_splits && self.readers.is_empty()
    }

    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let readers = std::mem::take(&mut self.readers);
        let retiring = std::mem::take(&mut self.retiring);
        for (_, mut reader) in readers.into_iter().chain(retiring) {
            reader.close().await;
        }
        info!("Closed pulsar source reader {}", self.reader_id);
    }
}
