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

use crate::client::{CryptoKeyReader, PulsarAdmin, PulsarClient};
use crate::config::{PulsarSourceConfig, SourceConfiguration, SubscriptionType};
use crate::cursor::{StartCursor, StopCursor};
use crate::enumerator::{
    EnumeratorConfig, EnumeratorState, PulsarSourceEnumerator, SplitEnumeratorContext,
};
use crate::error::PulsarSourceError;
use crate::range_generator::{FixedRangeGenerator, FullRangeGenerator, RangeGenerator};
use crate::reader::{PulsarSourceReader, ReaderContext};
use crate::subscriber::TopicSubscriber;
use crate::topic::TopicRange;
use std::sync::Arc;
use tracing::warn;

/// Entry point of the connector: creates (or restores) the enumerator and the readers.
#[derive(Debug)]
pub struct PulsarSource {
    configuration: Arc<SourceConfiguration>,
    subscriber: TopicSubscriber,
    range_generator: Arc<dyn RangeGenerator>,
    start_cursor: StartCursor,
    stop_cursor: StopCursor,
    admin: Arc<dyn PulsarAdmin>,
    client: Arc<dyn PulsarClient>,
    crypto_key_reader: Option<Arc<dyn CryptoKeyReader>>,
}

impl PulsarSource {
    pub fn new(
        config: &PulsarSourceConfig,
        subscriber: TopicSubscriber,
        admin: Arc<dyn PulsarAdmin>,
        client: Arc<dyn PulsarClient>,
    ) -> Result<Self, PulsarSourceError> {
        let configuration = SourceConfiguration::try_from(config)?;
        let range_generator: Arc<dyn RangeGenerator> = match configuration.key_shared_mode {
            Some(mode) if configuration.subscription_type == SubscriptionType::KeyShared => {
                Arc::new(FixedRangeGenerator::with_mode(vec![TopicRange::full()], mode)?)
            }
            _ => Arc::new(FullRangeGenerator),
        };
        Ok(Self {
            configuration: Arc::new(configuration),
            subscriber,
            range_generator,
            start_cursor: StartCursor::default(),
            stop_cursor: StopCursor::default(),
            admin,
            client,
            crypto_key_reader: None,
        })
    }

    /// Only honored by key shared subscriptions, the others always consume the full range.
    pub fn with_range_generator(mut self, range_generator: Arc<dyn RangeGenerator>) -> Self {
        if self.configuration.subscription_type != SubscriptionType::KeyShared {
            warn!(
                "Range generator {range_generator:?} is ignored by {} subscriptions",
                self.configuration.subscription_type
            );
            return self;
        }
        self.range_generator = range_generator;
        self
    }

    pub fn with_start_cursor(mut self, start_cursor: StartCursor) -> Self {
        self.start_cursor = start_cursor;
        self
    }

    pub fn with_stop_cursor(mut self, stop_cursor: StopCursor) -> Self {
        self.stop_cursor = stop_cursor;
        self
    }

    pub fn with_crypto_key_reader(mut self, crypto_key_reader: Arc<dyn CryptoKeyReader>) -> Self {
        self.crypto_key_reader = Some(crypto_key_reader);
        self
    }

    pub fn configuration(&self) -> &SourceConfiguration {
        &self.configuration
    }

    pub fn is_bounded(&self) -> bool {
        self.stop_cursor.is_bounded()
    }

    pub fn create_enumerator(
        &self,
        context: Arc<dyn SplitEnumeratorContext>,
    ) -> PulsarSourceEnumerator {
        self.enumerator(context, EnumeratorState::new())
    }

    pub fn restore_enumerator(
        &self,
        context: Arc<dyn SplitEnumeratorContext>,
        checkpoint: &[u8],
    ) -> Result<PulsarSourceEnumerator, PulsarSourceError> {
        let state = EnumeratorState::from_bytes(checkpoint)?;
        Ok(self.enumerator(context, state))
    }

    pub fn create_reader(&self, reader_id: u32) -> PulsarSourceReader {
        PulsarSourceReader::new(
            reader_id,
            ReaderContext {
                configuration: self.configuration.clone(),
                admin: self.admin.clone(),
                client: self.client.clone(),
                crypto_key_reader: self.crypto_key_reader.clone(),
            },
        )
    }

    fn enumerator(
        &self,
        context: Arc<dyn SplitEnumeratorContext>,
        state: EnumeratorState,
    ) -> PulsarSourceEnumerator {
        let config = EnumeratorConfig {
            configuration: self.configuration.as_ref().clone(),
            subscriber: self.subscriber.clone(),
            range_generator: self.range_generator.clone(),
            start_cursor: self.start_cursor,
            stop_cursor: self.stop_cursor,
        };
        PulsarSourceEnumerator::new(config, self.admin.clone(), context, state)
    }
}
