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

//! Versioned checkpoint blobs: a big-endian `u32` version followed by a postcard body.

use crate::cursor::{CursorPosition, MessageId, StopCursor};
use crate::enumerator::EnumeratorState;
use crate::error::PulsarSourceError;
use crate::split::PulsarPartitionSplit;
use crate::topic::{KeySharedMode, TopicPartition, TopicRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const CURRENT_VERSION: u32 = 2;
const LEGACY_VERSION: u32 = 1;
const VERSION_LENGTH: usize = 4;

/// Partition layout written before key-shared modes existed, always consumed as split.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TopicPartitionV1 {
    topic: String,
    partition_id: i32,
    ranges: Vec<TopicRange>,
}

/// Split layout written before start positions were stored with the split.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PulsarPartitionSplitV1 {
    partition: TopicPartitionV1,
    stop_cursor: StopCursor,
    latest_consumed_id: Option<MessageId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EnumeratorStateV1 {
    appended_partitions: Vec<TopicPartitionV1>,
    pending_splits: Vec<PulsarPartitionSplitV1>,
}

#[derive(Serialize, Deserialize)]
struct EnumeratorStateV2 {
    appended_partitions: Vec<TopicPartition>,
    pending_splits: Vec<PulsarPartitionSplit>,
    finished_splits: Vec<String>,
}

impl From<TopicPartitionV1> for TopicPartition {
    fn from(partition: TopicPartitionV1) -> Self {
        TopicPartition::new(
            &partition.topic,
            partition.partition_id,
            partition.ranges,
            KeySharedMode::Split,
        )
    }
}

impl From<PulsarPartitionSplitV1> for PulsarPartitionSplit {
    fn from(split: PulsarPartitionSplitV1) -> Self {
        PulsarPartitionSplit::restore(
            split.partition.into(),
            CursorPosition::earliest(),
            split.stop_cursor,
            split.latest_consumed_id,
        )
    }
}

enum Versioned<'a> {
    Legacy(&'a [u8]),
    Current(&'a [u8]),
}

fn read_version(bytes: &[u8]) -> Result<Versioned<'_>, PulsarSourceError> {
    if bytes.len() < VERSION_LENGTH {
        return Err(PulsarSourceError::CorruptedCheckpoint(format!(
            "checkpoint has {} bytes, the version alone takes {VERSION_LENGTH}",
            bytes.len()
        )));
    }

    let (version, body) = bytes.split_at(VERSION_LENGTH);
    let version = u32::from_be_bytes([version[0], version[1], version[2], version[3]]);
    match version {
        LEGACY_VERSION => Ok(Versioned::Legacy(body)),
        CURRENT_VERSION => Ok(Versioned::Current(body)),
        _ => Err(PulsarSourceError::UnknownCheckpointVersion {
            version,
            latest: CURRENT_VERSION,
        }),
    }
}

fn write_versioned<T: Serialize>(version: u32, body: &T) -> Result<Vec<u8>, PulsarSourceError> {
    let mut bytes = version.to_be_bytes().to_vec();
    bytes.extend(postcard::to_allocvec(body)?);
    Ok(bytes)
}

fn decode<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, PulsarSourceError> {
    postcard::from_bytes(body)
        .map_err(|error| PulsarSourceError::CorruptedCheckpoint(error.to_string()))
}

pub fn serialize_split(split: &PulsarPartitionSplit) -> Result<Vec<u8>, PulsarSourceError> {
    write_versioned(CURRENT_VERSION, split)
}

pub fn deserialize_split(bytes: &[u8]) -> Result<PulsarPartitionSplit, PulsarSourceError> {
    match read_version(bytes)? {
        Versioned::Legacy(body) => decode::<PulsarPartitionSplitV1>(body).map(Into::into),
        Versioned::Current(body) => decode(body),
    }
}

pub fn serialize_enumerator_state(state: &EnumeratorState) -> Result<Vec<u8>, PulsarSourceError> {
    let body = EnumeratorStateV2 {
        appended_partitions: state.appended_partitions.iter().cloned().collect(),
        pending_splits: state.pending_splits.clone(),
        finished_splits: state.finished_splits.iter().cloned().collect(),
    };
    write_versioned(CURRENT_VERSION, &body)
}

pub fn deserialize_enumerator_state(bytes: &[u8]) -> Result<EnumeratorState, PulsarSourceError> {
    match read_version(bytes)? {
        Versioned::Legacy(body) => {
            let state: EnumeratorStateV1 = decode(body)?;
            Ok(EnumeratorState {
                appended_partitions: state
                    .appended_partitions
                    .into_iter()
                    .map(Into::into)
                    .collect(),
                pending_splits: state.pending_splits.into_iter().map(Into::into).collect(),
                finished_splits: BTreeSet::new(),
            })
        }
        Versioned::Current(body) => {
            let state: EnumeratorStateV2 = decode(body)?;
            Ok(EnumeratorState {
                appended_partitions: state.appended_partitions.into_iter().collect(),
                pending_splits: state.pending_splits,
                finished_splits: state.finished_splits.into_iter().collect(),
            })
        }
    }
}
