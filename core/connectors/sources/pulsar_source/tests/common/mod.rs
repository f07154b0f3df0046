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

use async_trait::async_trait;
use iggy_connector_pulsar_source::topic::{complete_topic_name, topic_name_with_partition};
use iggy_connector_pulsar_source::{
    ClientError, ConsumerOptions, CursorPosition, MessageId, PulsarAdmin, PulsarClient,
    PulsarConsumer, PulsarMessage, PulsarPartitionSplit, SplitEnumeratorContext,
    SplitsAssignment, TopicMetadata,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();
    });
}

#[derive(Debug, Default)]
struct Topics {
    partitions: BTreeMap<String, u32>,
    messages: BTreeMap<String, Vec<PulsarMessage>>,
    acknowledged: Vec<MessageId>,
}

/// A broker keeping every partition as an in-memory log, message `n` having entry id `n`.
#[derive(Debug, Clone, Default)]
pub struct TestBroker {
    topics: Arc<Mutex<Topics>>,
}

impl TestBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn create_topic(&self, topic: &str, partitions: u32) {
        let topic = complete_topic_name(topic);
        let mut topics = self.topics.lock().unwrap();
        let names = if partitions == 0 {
            vec![topic.clone()]
        } else {
            (0..partitions as i32)
                .map(|partition| topic_name_with_partition(&topic, partition))
                .collect()
        };
        for name in names {
            topics.messages.entry(name).or_default();
        }
        topics.partitions.insert(topic, partitions);
    }

    pub fn publish(&self, topic: &str, count: usize) {
        let topic = complete_topic_name(topic);
        let mut topics = self.topics.lock().unwrap();
        let log = topics.messages.entry(topic.clone()).or_default();
        for _ in 0..count {
            let entry_id = log.len() as i64;
            log.push(PulsarMessage::new(
                MessageId::new(0, entry_id, -1),
                &topic,
                format!("payload-{entry_id}").into_bytes(),
                entry_id as u64,
            ));
        }
    }

    pub fn acknowledged(&self) -> Vec<MessageId> {
        self.topics.lock().unwrap().acknowledged.clone()
    }
}

#[async_trait]
impl PulsarAdmin for TestBroker {
    async fn get_topic_metadata(&self, topic: &str) -> Result<TopicMetadata, ClientError> {
        let topic = complete_topic_name(topic);
        let topics = self.topics.lock().unwrap();
        match topics.partitions.get(&topic) {
            Some(partitions) => Ok(TopicMetadata::new(&topic, *partitions)),
            None => Err(ClientError::NotFound(topic)),
        }
    }

    async fn get_topics(&self, namespace: &str) -> Result<Vec<String>, ClientError> {
        let prefix = format!("persistent://{namespace}/");
        let topics = self.topics.lock().unwrap();
        Ok(topics
            .messages
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn get_last_message_id(&self, topic: &str) -> Result<MessageId, ClientError> {
        let topics = self.topics.lock().unwrap();
        Ok(topics
            .messages
            .get(&complete_topic_name(topic))
            .and_then(|log| log.last())
            .map(|message| message.id)
            .unwrap_or(MessageId::EARLIEST))
    }
}

#[async_trait]
impl PulsarClient for TestBroker {
    async fn subscribe(
        &self,
        options: ConsumerOptions,
    ) -> Result<Box<dyn PulsarConsumer>, ClientError> {
        Ok(Box::new(TestConsumer {
            topics: self.topics.clone(),
            topic: complete_topic_name(&options.topic),
            next: 0,
        }))
    }
}

#[derive(Debug)]
struct TestConsumer {
    topics: Arc<Mutex<Topics>>,
    topic: String,
    next: usize,
}

#[async_trait]
impl PulsarConsumer for TestConsumer {
    async fn receive(&mut self, timeout: Duration) -> Result<Option<PulsarMessage>, ClientError> {
        let message = self
            .topics
            .lock()
            .unwrap()
            .messages
            .get(&self.topic)
            .and_then(|log| log.get(self.next).cloned());
        if message.is_none() {
            tokio::time::sleep(timeout).await;
            return Ok(None);
        }
        self.next += 1;
        Ok(message)
    }

    async fn acknowledge(&mut self, id: &MessageId) -> Result<(), ClientError> {
        self.topics.lock().unwrap().acknowledged.push(*id);
        Ok(())
    }

    async fn acknowledge_cumulative(&mut self, id: &MessageId) -> Result<(), ClientError> {
        self.topics.lock().unwrap().acknowledged.push(*id);
        Ok(())
    }

    async fn seek(&mut self, position: &CursorPosition) -> Result<(), ClientError> {
        let topics = self.topics.lock().unwrap();
        let log = topics.messages.get(&self.topic).cloned().unwrap_or_default();
        self.next = match *position {
            CursorPosition::MessageId { id, inclusive } => log
                .iter()
                .position(|message| message.id > id || (inclusive && message.id == id))
                .unwrap_or(log.len()),
            CursorPosition::PublishTime(time) => log
                .iter()
                .position(|message| message.publish_time >= time)
                .unwrap_or(log.len()),
        };
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Collects what the enumerator hands out, the way a runtime would deliver it.
#[derive(Debug, Default)]
pub struct TestContext {
    readers: Mutex<BTreeSet<u32>>,
    assigned: Mutex<BTreeMap<u32, Vec<PulsarPartitionSplit>>>,
    no_more_splits: Mutex<BTreeSet<u32>>,
}

impl TestContext {
    pub fn with_readers(readers: &[u32]) -> Arc<Self> {
        let context = Self::default();
        context.readers.lock().unwrap().extend(readers);
        Arc::new(context)
    }

    /// Drains the splits assigned to the reader since the last call.
    pub fn take_assigned(&self, reader_id: u32) -> Vec<PulsarPartitionSplit> {
        self.assigned
            .lock()
            .unwrap()
            .remove(&reader_id)
            .unwrap_or_default()
    }

    pub fn has_no_more_splits(&self, reader_id: u32) -> bool {
        self.no_more_splits.lock().unwrap().contains(&reader_id)
    }
}

impl SplitEnumeratorContext for TestContext {
    fn current_parallelism(&self) -> u32 {
        self.readers.lock().unwrap().len() as u32
    }

    fn registered_readers(&self) -> BTreeSet<u32> {
        self.readers.lock().unwrap().clone()
    }

    fn assign_splits(&self, assignment: SplitsAssignment) {
        let mut assigned = self.assigned.lock().unwrap();
        for (reader_id, splits) in assignment.into_inner() {
            assigned.entry(reader_id).or_default().extend(splits);
        }
    }

    fn signal_no_more_splits(&self, reader_id: u32) {
        self.no_more_splits.lock().unwrap().insert(reader_id);
    }
}
