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

use crate::cursor::MessageId;
use bytes::Bytes;
use std::collections::HashMap;

/// A message received from a broker consumption session.
#[derive(Debug, Clone, PartialEq)]
pub struct PulsarMessage {
    pub id: MessageId,
    /// The fully qualified name of the physical partition the message was read from.
    pub topic: String,
    pub key: Option<String>,
    pub payload: Bytes,
    /// Broker publish time in milliseconds since epoch.
    pub publish_time: u64,
    /// Producer assigned event time in milliseconds since epoch, if any.
    pub event_time: Option<u64>,
    pub properties: HashMap<String, String>,
}

impl PulsarMessage {
    pub fn new(id: MessageId, topic: &str, payload: impl Into<Bytes>, publish_time: u64) -> Self {
        Self {
            id,
            topic: topic.to_owned(),
            key: None,
            payload: payload.into(),
            publish_time,
            event_time: None,
            properties: HashMap::new(),
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_owned());
        self
    }

    pub fn with_event_time(mut self, event_time: u64) -> Self {
        self.event_time = Some(event_time);
        self
    }
}
