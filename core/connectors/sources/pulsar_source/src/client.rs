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

//! Broker collaborators consumed by the connector. The wire protocol lives behind these traits.

use crate::config::{SubscriptionMode, SubscriptionType};
use crate::cursor::{CursorPosition, MessageId};
use crate::message::PulsarMessage;
use crate::topic::{TopicMetadata, TopicRange};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Topic not found: {0}")]
    NotFound(String),

    #[error("Operation was interrupted")]
    Interrupted,

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Consumer is already closed")]
    AlreadyClosed,

    #[error("Broker error: {0}")]
    Broker(String),
}

impl ClientError {
    /// Transient errors end the current fetch early and are retried by the next one.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Execution(_))
    }
}

/// Admin and metadata queries.
#[async_trait]
pub trait PulsarAdmin: Send + Sync + Debug {
    /// Returns [`ClientError::NotFound`] when the topic doesn't exist (yet).
    async fn get_topic_metadata(&self, topic: &str) -> Result<TopicMetadata, ClientError>;

    /// Lists the fully qualified topic (and partition) names of a namespace.
    async fn get_topics(&self, namespace: &str) -> Result<Vec<String>, ClientError>;

    /// [`MessageId::EARLIEST`] is returned for an empty topic.
    async fn get_last_message_id(&self, topic: &str) -> Result<MessageId, ClientError>;
}

/// Resolves the keys used for end-to-end message decryption.
pub trait CryptoKeyReader: Send + Sync + Debug {
    fn private_key(
        &self,
        key_name: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<Vec<u8>, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySharedPolicy {
    /// Sticky hash ranges with an inclusive upper bound.
    pub ranges: Vec<(u32, u32)>,
    pub allow_out_of_order_delivery: bool,
}

impl KeySharedPolicy {
    pub fn sticky(ranges: &[TopicRange], allow_out_of_order_delivery: bool) -> Self {
        Self {
            ranges: ranges.iter().map(TopicRange::to_inclusive).collect(),
            allow_out_of_order_delivery,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    pub topic: String,
    pub subscription_name: String,
    pub subscription_type: SubscriptionType,
    pub subscription_mode: SubscriptionMode,
    pub receiver_queue_size: usize,
    pub key_shared_policy: Option<KeySharedPolicy>,
    pub crypto_key_reader: Option<Arc<dyn CryptoKeyReader>>,
    /// Upper bound for acknowledgements held back until a checkpoint completes.
    pub transaction_timeout: Option<Duration>,
}

#[async_trait]
pub trait PulsarClient: Send + Sync + Debug {
    async fn subscribe(
        &self,
        options: ConsumerOptions,
    ) -> Result<Box<dyn PulsarConsumer>, ClientError>;
}

/// One broker consumption session.
#[async_trait]
pub trait PulsarConsumer: Send + Debug {
    /// Waits at most `timeout` for the next message, `None` when nothing arrived.
    async fn receive(&mut self, timeout: Duration) -> Result<Option<PulsarMessage>, ClientError>;

    async fn acknowledge(&mut self, id: &MessageId) -> Result<(), ClientError>;

    async fn acknowledge_cumulative(&mut self, id: &MessageId) -> Result<(), ClientError>;

    async fn seek(&mut self, position: &CursorPosition) -> Result<(), ClientError>;

    async fn close(&mut self) -> Result<(), ClientError>;
}
