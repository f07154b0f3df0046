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

use crate::client::PulsarConsumer;
use crate::config::SubscriptionType;
use crate::cursor::MessageId;
use crate::error::PulsarSourceError;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AckStrategy {
    Individual,
    Cumulative,
}

/// Acknowledges consumed messages, either right away (auto acknowledge) or once the
/// checkpoint that covers them completes.
#[derive(Debug)]
pub(crate) struct Acknowledger {
    split_id: String,
    strategy: AckStrategy,
    auto_acknowledge: bool,
    commit_interval: Duration,
    last_commit: Instant,
    uncommitted: Option<MessageId>,
    in_flight: Vec<MessageId>,
    pending_by_checkpoint: BTreeMap<u64, Vec<MessageId>>,
}

impl Acknowledger {
    pub(crate) fn new(
        split_id: &str,
        subscription_type: SubscriptionType,
        auto_acknowledge: bool,
        commit_interval: Duration,
    ) -> Self {
        let strategy = if subscription_type.is_ordered() {
            AckStrategy::Cumulative
        } else {
            AckStrategy::Individual
        };
        Self {
            split_id: split_id.to_owned(),
            strategy,
            auto_acknowledge,
            commit_interval,
            last_commit: Instant::now(),
            uncommitted: None,
            in_flight: Vec::new(),
            pending_by_checkpoint: BTreeMap::new(),
        }
    }

    pub(crate) async fn after_consume(
        &mut self,
        consumer: &mut dyn PulsarConsumer,
        id: MessageId,
    ) -> Result<(), PulsarSourceError> {
        if !self.auto_acknowledge {
            self.in_flight.push(id);
            return Ok(());
        }

        match self.strategy {
            AckStrategy::Individual => self
                .acknowledge(consumer, &[id])
                .await
                .map_err(|(_, error)| error),
            AckStrategy::Cumulative => {
                self.uncommitted = Some(id);
                if self.last_commit.elapsed() >= self.commit_interval {
                    self.commit_uncommitted(consumer).await?;
                }
                Ok(())
            }
        }
    }

    /// Binds the messages consumed since the previous snapshot to this checkpoint.
    pub(crate) fn snapshot(&mut self, checkpoint_id: u64) {
        if self.in_flight.is_empty() {
            return;
        }
        let consumed = std::mem::take(&mut self.in_flight);
        trace!(
            "Split {} binds {} messages to checkpoint {checkpoint_id}",
            self.split_id,
            consumed.len()
        );
        self.pending_by_checkpoint
            .entry(checkpoint_id)
            .or_default()
            .extend(consumed);
    }

    /// Commits everything bound to this checkpoint or to an earlier one.
    pub(crate) async fn checkpoint_complete(
        &mut self,
        consumer: &mut dyn PulsarConsumer,
        checkpoint_id: u64,
    ) -> Result<(), PulsarSourceError> {
        let completed = self
            .pending_by_checkpoint
            .range(..=checkpoint_id)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        let mut ids = Vec::new();
        for id in completed {
            if let Some(consumed) = self.pending_by_checkpoint.remove(&id) {
                ids.extend(consumed);
            }
        }
        if ids.is_empty() {
            return Ok(());
        }

        debug!(
            "Committing {} messages of split {} for checkpoint {checkpoint_id}",
            ids.len(),
            self.split_id
        );
        if let Err((acknowledged, error)) = self.acknowledge(consumer, &ids).await {
            self.pending_by_checkpoint
                .insert(checkpoint_id, ids.split_off(acknowledged));
            return Err(error);
        }
        Ok(())
    }

    /// Commits a throttled cumulative acknowledgement before the consumer goes away.
    pub(crate) async fn flush(
        &mut self,
        consumer: &mut dyn PulsarConsumer,
    ) -> Result<(), PulsarSourceError> {
        self.commit_uncommitted(consumer).await
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.in_flight.is_empty() || !self.pending_by_checkpoint.is_empty()
    }

    async fn commit_uncommitted(
        &mut self,
        consumer: &mut dyn PulsarConsumer,
    ) -> Result<(), PulsarSourceError> {
        if let Some(id) = self.uncommitted.take()
            && let Err((_, error)) = self.acknowledge(consumer, &[id]).await
        {
            self.uncommitted = Some(id);
            return Err(error);
        }
        self.last_commit = Instant::now();
        Ok(())
    }

    /// A failure comes with the number of ids acknowledged before it.
    async fn acknowledge(
        &self,
        consumer: &mut dyn PulsarConsumer,
        ids: &[MessageId],
    ) -> Result<(), (usize, PulsarSourceError)> {
        let error = |id: &MessageId, source| PulsarSourceError::Acknowledge {
            split_id: self.split_id.clone(),
            message_id: id.to_string(),
            source,
        };
        match self.strategy {
            AckStrategy::Individual => {
                for (acknowledged, id) in ids.iter().enumerate() {
                    consumer
                        .acknowledge(id)
                        .await
                        .map_err(|source| (acknowledged, error(id, source)))?;
                }
            }
            AckStrategy::Cumulative => {
                if let Some(id) = ids.iter().max() {
                    consumer
                        .acknowledge_cumulative(id)
                        .await
                        .map_err(|source| (0, error(id, source)))?;
                }
            }
        }
        Ok(())
    }
}
