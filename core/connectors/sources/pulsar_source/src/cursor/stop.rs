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
use crate::cursor::MessageId;
use crate::error::PulsarSourceError;
use crate::message::PulsarMessage;
use crate::topic::TopicPartition;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use strum::Display;
use tracing::debug;

/// The verdict of a stop cursor for a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum StopCondition {
    /// Emit the message and keep polling.
    Continue,
    /// Emit the message, then finish the split.
    Exactly,
    /// Drop the message and finish the split.
    Terminate,
}

impl StopCondition {
    pub fn emits(&self) -> bool {
        matches!(self, StopCondition::Continue | StopCondition::Exactly)
    }

    pub fn finishes(&self) -> bool {
        matches!(self, StopCondition::Exactly | StopCondition::Terminate)
    }

    fn compare<T: Ord>(boundary: &T, current: &T, inclusive: bool) -> Self {
        match current.cmp(boundary) {
            Ordering::Less => StopCondition::Continue,
            Ordering::Equal if inclusive => StopCondition::Exactly,
            _ => StopCondition::Terminate,
        }
    }
}

/// Decides where the consumption of a split ends. "At" boundaries exclude the boundary
/// message, "after" boundaries include it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopCursor {
    #[default]
    Never,
    /// Stops after the last message present when the cursor was opened.
    Latest { last: Option<MessageId> },
    AtMessageId(MessageId),
    AfterMessageId(MessageId),
    AtPublishTime(u64),
    AfterPublishTime(u64),
    /// Messages without an event time are compared by their publish time.
    AtEventTime(u64),
    AfterEventTime(u64),
}

impl StopCursor {
    pub fn latest() -> Self {
        StopCursor::Latest { last: None }
    }

    /// Resolves broker dependent boundaries. Already resolved cursors are kept as they are,
    /// so a restored split never moves its boundary.
    pub async fn open(
        &mut self,
        admin: &dyn PulsarAdmin,
        partition: &TopicPartition,
    ) -> Result<(), PulsarSourceError> {
        if let StopCursor::Latest { last: None } = self {
            let topic = partition.full_topic_name();
            let last = admin
                .get_last_message_id(&topic)
                .await
                .map_err(|source| PulsarSourceError::LastMessageId {
                    topic: topic.clone(),
                    source,
                })?;
            debug!("Resolved latest stop cursor of {topic} to {last}");
            *self = StopCursor::Latest { last: Some(last) };
        }
        Ok(())
    }

    pub fn is_bounded(&self) -> bool {
        !matches!(self, StopCursor::Never)
    }

    /// True when the boundary was resolved against an empty partition: there is nothing to read.
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            StopCursor::Latest {
                last: Some(MessageId::EARLIEST)
            }
        )
    }

    pub fn should_stop(&self, message: &PulsarMessage) -> StopCondition {
        match self {
            StopCursor::Never | StopCursor::Latest { last: None } => StopCondition::Continue,
            StopCursor::Latest { last: Some(last) } => {
                StopCondition::compare(last, &message.id, true)
            }
            StopCursor::AtMessageId(id) => StopCondition::compare(id, &message.id, false),
            StopCursor::AfterMessageId(id) => StopCondition::compare(id, &message.id, true),
            StopCursor::AtPublishTime(time) => {
                StopCondition::compare(time, &message.publish_time, false)
            }
            StopCursor::AfterPublishTime(time) => {
                StopCondition::compare(time, &message.publish_time, true)
            }
            StopCursor::AtEventTime(time) => StopCondition::compare(
                time,
                &message.event_time.unwrap_or(message.publish_time),
                false,
            ),
            StopCursor::AfterEventTime(time) => StopCondition::compare(
                time,
                &message.event_time.unwrap_or(message.publish_time),
                true,
            ),
        }
    }
}
