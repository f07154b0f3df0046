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

//! In-memory broker and enumerator context used by the unit tests.

use crate::client::{ClientError, ConsumerOptions, PulsarAdmin, PulsarClient, PulsarConsumer};
use crate::cursor::{CursorPosition, MessageId};
use crate::enumerator::{SplitEnumeratorContext, SplitsAssignment};
use crate::message::PulsarMessage;
use crate::split::PulsarPartitionSplit;
use crate::topic::{TopicMetadata, complete_topic_name, topic_name_with_partition};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct BrokerState {
    topics: BTreeMap<String, u32>,
    messages: BTreeMap<String, Vec<PulsarMessage>>,
    admin_failure: Option<ClientError>,
    receive_failures: VecDeque<ClientError>,
    /// Successful acknowledgements left before the failure is returned.
    acknowledge_failure: Option<(usize, ClientError)>,
    close_failure: Option<ClientError>,
    subscriptions: Vec<ConsumerOptions>,
    seeks: Vec<(String, CursorPosition)>,
    acknowledged: Vec<MessageId>,
    acknowledged_cumulative: Vec<MessageId>,
    closed_consumers: usize,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero partitions creates a non-partitioned topic.
    pub fn create_topic(&self, topic: &str, partitions: u32) {
        let topic = complete_topic_name(topic);
        let mut state = self.state.lock().unwrap();
        if partitions == 0 {
            state.messages.entry(topic.clone()).or_default();
        } else {
            for partition in 0..partitions as i32 {
                state
                    .messages
                    .entry(topic_name_with_partition(&topic, partition))
                    .or_default();
            }
        }
        state.topics.insert(topic, partitions);
    }

    /// Appends `count` messages keyed `key-<n>` with publish time `1000 + n`.
    pub fn publish(&self, topic: &str, count: usize) {
        let topic = complete_topic_name(topic);
        let mut state = self.state.lock().unwrap();
        let messages = state.messages.entry(topic.clone()).or_default();
        for _ in 0..count {
            let index = messages.len();
            let message = PulsarMessage::new(
                MessageId::new(0, index as i64, -1),
                &topic,
                format!("message-{index}").into_bytes(),
                1000 + index as u64,
            )
            .with_key(&format!("key-{index}"));
            messages.push(message);
        }
    }

    pub fn fail_admin(&self, error: ClientError) {
        self.state.lock().unwrap().admin_failure = Some(error);
    }

    pub fn clear_admin_failure(&self) {
        self.state.lock().unwrap().admin_failure = None;
    }

    pub fn fail_next_receive(&self, error: ClientError) {
        self.state.lock().unwrap().receive_failures.push_back(error);
    }

    pub fn fail_acknowledge_after(&self, successes: usize, error: ClientError) {
        self.state.lock().unwrap().acknowledge_failure = Some((successes, error));
    }

    pub fn fail_close(&self, error: ClientError) {
        self.state.lock().unwrap().close_failure = Some(error);
    }

    pub fn subscriptions(&self) -> Vec<ConsumerOptions> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    pub fn seeks(&self) -> Vec<(String, CursorPosition)> {
        self.state.lock().unwrap().seeks.clone()
    }

    pub fn acknowledged(&self) -> Vec<MessageId> {
        self.state.lock().unwrap().acknowledged.clone()
    }

    pub fn acknowledged_cumulative(&self) -> Vec<MessageId> {
        self.state.lock().unwrap().acknowledged_cumulative.clone()
    }

    pub fn closed_consumers(&self) -> usize {
        self.state.lock().unwrap().closed_consumers
    }

    fn admin_failure(&self) -> Result<(), ClientError> {
        match &self.state.lock().unwrap().admin_failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PulsarAdmin for InMemoryBroker {
    async fn get_topic_metadata(&self, topic: &str) -> Result<TopicMetadata, ClientError> {
        self.admin_failure()?;
        let topic = complete_topic_name(topic);
        let state = self.state.lock().unwrap();
        state
            .topics
            .get(&topic)
            .map(|partitions| TopicMetadata::new(&topic, *partitions))
            .ok_or_else(|| ClientError::NotFound(topic.clone()))
    }

    async fn get_topics(&self, namespace: &str) -> Result<Vec<String>, ClientError> {
        self.admin_failure()?;
        let prefix = format!("persistent://{namespace}/");
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .keys()
            .filter(|topic| topic.starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn get_last_message_id(&self, topic: &str) -> Result<MessageId, ClientError> {
        self.admin_failure()?;
        let topic = complete_topic_name(topic);
        let state = self.state.lock().unwrap();
        let messages = state
            .messages
            .get(&topic)
            .ok_or_else(|| ClientError::NotFound(topic.clone()))?;
        Ok(messages
            .last()
            .map(|message| message.id)
            .unwrap_or(MessageId::EARLIEST))
    }
}

#[async_trait]
impl PulsarClient for InMemoryBroker {
    async fn subscribe(
        &self,
        options: ConsumerOptions,
    ) -> Result<Box<dyn PulsarConsumer>, ClientError> {
        let topic = complete_topic_name(&options.topic);
        let mut state = self.state.lock().unwrap();
        if !state.messages.contains_key(&topic) {
            return Err(ClientError::NotFound(topic));
        }
        state.subscriptions.push(options);
        Ok(Box::new(InMemoryConsumer {
            state: self.state.clone(),
            topic,
            next: 0,
            closed: false,
        }))
    }
}

/// Blocks for the whole timeout when no message is available.
#[derive(Debug)]
struct InMemoryConsumer {
    state: Arc<Mutex<BrokerState>>,
    topic: String,
    next: usize,
    closed: bool,
}

#[async_trait]
impl PulsarConsumer for InMemoryConsumer {
    async fn receive(&mut self, timeout: Duration) -> Result<Option<PulsarMessage>, ClientError> {
        if self.closed {
            return Err(ClientError::AlreadyClosed);
        }
        let message = {
            let mut state = self.state.lock().unwrap();
            if let Some(error) = state.receive_failures.pop_front() {
                return Err(error);
            }
            state
                .messages
                .get(&self.topic)
                .and_then(|messages| messages.get(self.next))
                .cloned()
        };
        match message {
            Some(message) => {
                self.next += 1;
                Ok(Some(message))
            }
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }

    async fn acknowledge(&mut self, id: &MessageId) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        match state.acknowledge_failure.take() {
            Some((0, error)) => return Err(error),
            Some((successes, error)) => {
                state.acknowledge_failure = Some((successes - 1, error));
            }
            None => {}
        }
        state.acknowledged.push(*id);
        Ok(())
    }

    async fn acknowledge_cumulative(&mut self, id: &MessageId) -> Result<(), ClientError> {
        self.state.lock().unwrap().acknowledged_cumulative.push(*id);
        Ok(())
    }

    async fn seek(&mut self, position: &CursorPosition) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        let messages = state.messages.get(&self.topic).cloned().unwrap_or_default();
        self.next = match *position {
            CursorPosition::MessageId { id, inclusive } => messages
                .iter()
                .position(|message| {
                    if inclusive {
                        message.id >= id
                    } else {
                        message.id > id
                    }
                })
                .unwrap_or(messages.len()),
            CursorPosition::PublishTime(time) => messages
                .iter()
                .position(|message| message.publish_time >= time)
                .unwrap_or(messages.len()),
        };
        state.seeks.push((self.topic.clone(), *position));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.closed = true;
        let mut state = self.state.lock().unwrap();
        state.closed_consumers += 1;
        match &state.close_failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingContext {
    parallelism: u32,
    readers: Mutex<BTreeSet<u32>>,
    assignments: Mutex<Vec<SplitsAssignment>>,
    no_more_splits: Mutex<Vec<u32>>,
}

impl RecordingContext {
    pub fn new(parallelism: u32) -> Self {
        Self {
            parallelism,
            ..Default::default()
        }
    }

    pub fn register_reader(&self, reader_id: u32) {
        self.readers.lock().unwrap().insert(reader_id);
    }

    /// Every split assigned to the reader so far.
    pub fn assigned_to(&self, reader_id: u32) -> Vec<PulsarPartitionSplit> {
        self.assignments
            .lock()
            .unwrap()
            .iter()
            .flat_map(|assignment| assignment.splits_of(reader_id).to_vec())
            .collect()
    }

    pub fn no_more_splits_signalled(&self) -> Vec<u32> {
        self.no_more_splits.lock().unwrap().clone()
    }
}

impl SplitEnumeratorContext for RecordingContext {
    fn current_parallelism(&self) -> u32 {
        self.parallelism
    }

    fn registered_readers(&self) -> BTreeSet<u32> {
        self.readers.lock().unwrap().clone()
    }

    fn assign_splits(&self, assignment: SplitsAssignment) {
        self.assignments.lock().unwrap().push(assignment);
    }

    fn signal_no_more_splits(&self, reader_id: u32) {
        self.no_more_splits.lock().unwrap().push(reader_id);
    }
}
