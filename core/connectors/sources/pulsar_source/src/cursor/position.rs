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

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Position of a message within a topic partition, ordered by ledger, entry and batch index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId {
    pub ledger_id: i64,
    pub entry_id: i64,
    pub batch_index: i32,
}

impl MessageId {
    pub const EARLIEST: MessageId = MessageId {
        ledger_id: -1,
        entry_id: -1,
        batch_index: -1,
    };

    pub const LATEST: MessageId = MessageId {
        ledger_id: i64::MAX,
        entry_id: i64::MAX,
        batch_index: -1,
    };

    pub const fn new(ledger_id: i64, entry_id: i64, batch_index: i32) -> Self {
        Self {
            ledger_id,
            entry_id,
            batch_index,
        }
    }

    /// Whether this id names a concrete message rather than one of the sentinels.
    pub fn is_concrete(&self) -> bool {
        *self != Self::EARLIEST && *self != Self::LATEST
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            MessageId::EARLIEST => write!(f, "earliest"),
            MessageId::LATEST => write!(f, "latest"),
            _ => write!(f, "{}:{}:{}", self.ledger_id, self.entry_id, self.batch_index),
        }
    }
}

/// Where a consumption session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorPosition {
    MessageId { id: MessageId, inclusive: bool },
    PublishTime(u64),
}

impl CursorPosition {
    pub fn earliest() -> Self {
        CursorPosition::MessageId {
            id: MessageId::EARLIEST,
            inclusive: true,
        }
    }

    pub fn latest() -> Self {
        CursorPosition::MessageId {
            id: MessageId::LATEST,
            inclusive: false,
        }
    }

    /// Resumes right after an already consumed message.
    pub fn after(id: MessageId) -> Self {
        CursorPosition::MessageId {
            id,
            inclusive: false,
        }
    }
}

impl Display for CursorPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CursorPosition::MessageId { id, inclusive: true } => write!(f, "[{id}"),
            CursorPosition::MessageId {
                id,
                inclusive: false,
            } => write!(f, "({id}"),
            CursorPosition::PublishTime(time) => write!(f, "publish_time:{time}"),
        }
    }
}
