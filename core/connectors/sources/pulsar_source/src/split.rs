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

use crate::client::PulsarAdmin;
use crate::cursor::{CursorPosition, MessageId, StopCursor};
use crate::error::PulsarSourceError;
use crate::topic::TopicPartition;
use serde::{Deserialize, Serialize};

/// A partition together with the cursors describing where its consumption starts and ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulsarPartitionSplit {
    partition: TopicPartition,
    start_position: CursorPosition,
    stop_cursor: StopCursor,
    latest_consumed_id: Option<MessageId>,
}

impl PulsarPartitionSplit {
    pub fn new(
        partition: TopicPartition,
        start_position: CursorPosition,
        stop_cursor: StopCursor,
    ) -> Self {
        Self {
            partition,
            start_position,
            stop_cursor,
            latest_consumed_id: None,
        }
    }

    pub(crate) fn restore(
        partition: TopicPartition,
        start_position: CursorPosition,
        stop_cursor: StopCursor,
        latest_consumed_id: Option<MessageId>,
    ) -> Self {
        Self {
            partition,
            start_position,
            stop_cursor,
            latest_consumed_id,
        }
    }

    pub fn split_id(&self) -> String {
        self.partition.to_string()
    }

    pub fn partition(&self) -> &TopicPartition {
        &self.partition
    }

    pub fn start_position(&self) -> CursorPosition {
        self.start_position
    }

    pub fn stop_cursor(&self) -> StopCursor {
        self.stop_cursor
    }

    pub fn latest_consumed_id(&self) -> Option<MessageId> {
        self.latest_consumed_id
    }

    /// Where the consumer has to seek to: right after the last consumed message once the
    /// split made progress, the start position otherwise.
    pub fn seek_position(&self) -> CursorPosition {
        self.latest_consumed_id
            .map(CursorPosition::after)
            .unwrap_or(self.start_position)
    }

    pub fn is_resumed(&self) -> bool {
        self.latest_consumed_id.is_some()
    }

    pub(crate) fn record_consumed(&mut self, id: MessageId) {
        self.latest_consumed_id = Some(id);
    }

    pub async fn open(&mut self, admin: &dyn PulsarAdmin) -> Result<(), PulsarSourceError> {
        self.stop_cursor.open(admin, &self.partition).await
    }
}
