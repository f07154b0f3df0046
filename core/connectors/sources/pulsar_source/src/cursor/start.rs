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

use crate::cursor::{CursorPosition, MessageId};
use crate::topic::TopicPartition;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StartCursor {
    #[default]
    Earliest,
    Latest,
    FromMessageId {
        id: MessageId,
        inclusive: bool,
    },
    FromPublishTime(u64),
}

impl StartCursor {
    /// Resolved once, when the split for the partition is created. Resumed splits seek
    /// after their last consumed message instead.
    pub fn position(&self, _partition: &TopicPartition) -> CursorPosition {
        match *self {
            StartCursor::Earliest => CursorPosition::earliest(),
            StartCursor::Latest => CursorPosition::latest(),
            StartCursor::FromMessageId { id, inclusive } => {
                CursorPosition::MessageId { id, inclusive }
            }
            StartCursor::FromPublishTime(time) => CursorPosition::PublishTime(time),
        }
    }
}
