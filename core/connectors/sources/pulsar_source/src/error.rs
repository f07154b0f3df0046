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

use crate::client::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PulsarSourceError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid topic ranges: {0}")]
    InvalidRanges(String),

    #[error("Key shared mode {0} isn't supported")]
    UnsupportedKeySharedMode(String),

    #[error("The split change type of {0} is not supported")]
    UnsupportedSplitsChange(String),

    #[error("This split reader already has an assigned split: {0}")]
    SplitAlreadyAssigned(String),

    #[error("This split reader only supports one split, received: {0}")]
    InvalidSplitsCount(usize),

    #[error("Split reader is closed")]
    ReaderClosed,

    #[error("Split enumerator is closed")]
    EnumeratorClosed,

    #[error("Failed to query metadata of topic: {topic}")]
    TopicMetadata {
        topic: String,
        #[source]
        source: ClientError,
    },

    #[error("Failed to list topics of namespace: {namespace}")]
    ListTopics {
        namespace: String,
        #[source]
        source: ClientError,
    },

    #[error("Failed to resolve the last message id of topic: {topic}")]
    LastMessageId {
        topic: String,
        #[source]
        source: ClientError,
    },

    #[error("Failed to create consumer for topic: {topic}")]
    CreateConsumer {
        topic: String,
        #[source]
        source: ClientError,
    },

    #[error("Failed to seek consumer of split {split_id} to {position}")]
    Seek {
        split_id: String,
        position: String,
        #[source]
        source: ClientError,
    },

    #[error("Failed to poll message for split: {split_id}")]
    Poll {
        split_id: String,
        #[source]
        source: ClientError,
    },

    #[error("Failed to acknowledge message {message_id} for split: {split_id}")]
    Acknowledge {
        split_id: String,
        message_id: String,
        #[source]
        source: ClientError,
    },

    #[error("Initial position {position} of split {split_id} is beyond the last message {last}")]
    InitialPositionMismatch {
        split_id: String,
        position: String,
        last: String,
    },

    #[error("Unknown checkpoint version: {version}, the latest supported version is {latest}")]
    UnknownCheckpointVersion { version: u32, latest: u32 },

    #[error("Corrupted checkpoint: {0}")]
    CorruptedCheckpoint(String),

    #[error("Failed to encode checkpoint: {0}")]
    CheckpointEncoding(#[from] postcard::Error),
}
