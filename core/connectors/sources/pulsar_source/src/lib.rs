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

pub mod checkpoint;
pub mod client;
pub mod config;
pub mod config_loader;
pub mod cursor;
pub mod enumerator;
pub mod error;
pub mod message;
pub mod range_generator;
pub mod reader;
pub mod source;
pub mod split;
pub mod subscriber;
pub mod topic;

#[cfg(test)]
mod testing;

pub use client::{
    ClientError, ConsumerOptions, CryptoKeyReader, KeySharedPolicy, PulsarAdmin, PulsarClient,
    PulsarConsumer,
};
pub use config::{
    CursorVerification, PulsarSourceConfig, SourceConfiguration, SubscriptionMode,
    SubscriptionType,
};
pub use cursor::{CursorPosition, MessageId, StartCursor, StopCondition, StopCursor};
pub use enumerator::{
    EnumeratorConfig, EnumeratorState, PulsarSourceEnumerator, SplitEnumeratorContext,
    SplitsAssignment,
};
pub use error::PulsarSourceError;
pub use message::PulsarMessage;
pub use range_generator::{
    FixedRangeGenerator, FullRangeGenerator, RangeGenerator, SplitRangeGenerator,
};
pub use reader::{
    PulsarPartitionSplitReader, PulsarSourceReader, ReaderContext, RecordsBySplits, SplitsChange,
    WakeupHandle,
};
pub use source::PulsarSource;
pub use split::PulsarPartitionSplit;
pub use subscriber::TopicSubscriber;
pub use topic::{KeySharedMode, TopicMetadata, TopicPartition, TopicRange};
