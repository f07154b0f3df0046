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

use crate::client::{ClientError, ConsumerOptions, KeySharedPolicy, PulsarConsumer};
use crate::config::{CursorVerification, SubscriptionType};
use crate::cursor::CursorPosition;
use crate::error::PulsarSourceError;
use crate::reader::ReaderContext;
use crate::reader::acknowledger::Acknowledger;
use crate::reader::records::RecordsBySplits;
use crate::split::PulsarPartitionSplit;
use crate::topic::KeySharedMode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum SplitsChange {
    Addition(Vec<PulsarPartitionSplit>),
    Removal(Vec<PulsarPartitionSplit>),
}

/// Interrupts an in-flight fetch without closing the reader.
#[derive(Debug, Clone, Default)]
pub struct WakeupHandle {
    inner: Arc<Wakeup>,
}

#[derive(Debug, Default)]
struct Wakeup {
    woken: AtomicBool,
    notify: Notify,
}

impl WakeupHandle {
    pub fn wake_up(&self) {
        self.inner.woken.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    fn is_woken(&self) -> bool {
        self.inner.woken.load(Ordering::SeqCst)
    }

    fn reset(&self) -> bool {
        self.inner.woken.swap(false, Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct ActiveSplit {
    split: PulsarPartitionSplit,
    consumer: Box<dyn PulsarConsumer>,
    acknowledger: Acknowledger,
    finished: bool,
    finish_reported: bool,
}

/// Consumes exactly one split through its own broker consumer.
#[derive(Debug)]
pub struct PulsarPartitionSplitReader {
    context: ReaderContext,
    active: Option<ActiveSplit>,
    wakeup: WakeupHandle,
    closed: bool,
}

impl PulsarPartitionSplitReader {
    pub fn new(context: ReaderContext, wakeup: WakeupHandle) -> Self {
        Self {
            context,
            active: None,
            wakeup,
            closed: false,
        }
    }

    pub fn wakeup_handle(&self) -> WakeupHandle {
        self.wakeup.clone()
    }

    pub fn split_id(&self) -> Option<String> {
        self.active.as_ref().map(|active| active.split.split_id())
    }

    pub fn is_finished(&self) -> bool {
        self.active.as_ref().is_some_and(|active| active.finished)
    }

    pub(crate) fn has_pending_acknowledgements(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.acknowledger.has_pending())
    }

    pub async fn handle_splits_changes(
        &mut self,
        change: SplitsChange,
    ) -> Result<(), PulsarSourceError> {
        let mut splits = match change {
            SplitsChange::Addition(splits) => splits,
            SplitsChange::Removal(_) => {
                return Err(PulsarSourceError::UnsupportedSplitsChange(
                    "removal".to_owned(),
                ));
            }
        };
        if self.closed {
            return Err(PulsarSourceError::ReaderClosed);
        }
        if splits.len() != 1 {
            return Err(PulsarSourceError::InvalidSplitsCount(splits.len()));
        }
        if let Some(active) = &self.active {
            return Err(PulsarSourceError::SplitAlreadyAssigned(
                active.split.split_id(),
            ));
        }

        let split = splits.remove(0);
        debug!("Handling split addition: {}", split.split_id());
        self.active = Some(self.open_split(split).await?);
        Ok(())
    }

    async fn open_split(
        &self,
        mut split: PulsarPartitionSplit,
    ) -> Result<ActiveSplit, PulsarSourceError> {
        let split_id = split.split_id();
        let configuration = &self.context.configuration;
        split.open(self.context.admin.as_ref()).await?;
        self.verify_initial_position(&split).await?;

        let partition = split.partition();
        let key_shared_policy =
            (configuration.subscription_type == SubscriptionType::KeyShared).then(|| {
                KeySharedPolicy::sticky(
                    partition.ranges(),
                    configuration.allow_key_shared_out_of_order_delivery,
                )
            });
        let subscription_type = match configuration.subscription_type {
            SubscriptionType::KeyShared if partition.mode() == KeySharedMode::Join => {
                SubscriptionType::Exclusive
            }
            subscription_type => subscription_type,
        };
        let topic = partition.full_topic_name();
        let options = ConsumerOptions {
            topic: topic.clone(),
            subscription_name: configuration.subscription_name.clone(),
            subscription_type,
            subscription_mode: configuration.subscription_mode,
            receiver_queue_size: configuration.message_queue_capacity,
            key_shared_policy,
            crypto_key_reader: self.context.crypto_key_reader.clone(),
            transaction_timeout: (!configuration.enable_auto_acknowledge_message)
                .then_some(configuration.transaction_timeout),
        };
        let mut consumer = self
            .context
            .client
            .subscribe(options)
            .await
            .map_err(|source| PulsarSourceError::CreateConsumer { topic, source })?;

        let position = split.seek_position();
        if let Err(source) = consumer.seek(&position).await {
            if let Err(error) = consumer.close().await {
                warn!("Failed to close consumer of split {split_id}: {error}");
            }
            return Err(PulsarSourceError::Seek {
                split_id,
                position: position.to_string(),
                source,
            });
        }

        let finished = split.stop_cursor().is_exhausted();
        if finished {
            info!("Split {split_id} has no messages before its stop cursor, finishing it");
        } else {
            info!("Registered split {split_id} at position {position} as {subscription_type}");
        }
        Ok(ActiveSplit {
            acknowledger: Acknowledger::new(
                &split_id,
                subscription_type,
                configuration.enable_auto_acknowledge_message,
                configuration.auto_commit_cursor_interval,
            ),
            split,
            consumer,
            finished,
            finish_reported: false,
        })
    }

    /// A fresh split starting at a concrete message must not start beyond the partition's
    /// last message.
    async fn verify_initial_position(
        &self,
        split: &PulsarPartitionSplit,
    ) -> Result<(), PulsarSourceError> {
        let verification = self.context.configuration.verify_initial_offsets;
        if verification == CursorVerification::Ignore || split.is_resumed() {
            return Ok(());
        }
        let CursorPosition::MessageId { id, .. } = split.start_position() else {
            return Ok(());
        };
        if !id.is_concrete() {
            return Ok(());
        }

        let topic = split.partition().full_topic_name();
        let last = self
            .context
            .admin
            .get_last_message_id(&topic)
            .await
            .map_err(|source| PulsarSourceError::LastMessageId { topic, source })?;
        if last.is_concrete() && id <= last {
            return Ok(());
        }

        let mismatch = PulsarSourceError::InitialPositionMismatch {
            split_id: split.split_id(),
            position: split.start_position().to_string(),
            last: last.to_string(),
        };
        match verification {
            CursorVerification::FailOnMismatch => Err(mismatch),
            _ => {
                warn!("{mismatch}");
                Ok(())
            }
        }
    }

    /// One bounded batch: at most `max_fetch_records` messages within `max_fetch_time`. An
    /// empty poll, an interruption, a transient error or a wake-up ends the batch early.
    pub async fn fetch(&mut self) -> Result<RecordsBySplits, PulsarSourceError> {
        if self.closed {
            return Err(PulsarSourceError::ReaderClosed);
        }
        if self.wakeup.reset() {
            debug!("Ignoring stale wake-up");
        }

        let mut records = RecordsBySplits::new();
        let Some(active) = self.active.as_mut() else {
            return Ok(records);
        };
        let split_id = active.split.split_id();
        if active.finished {
            if !active.finish_reported {
                active.finish_reported = true;
                records.mark_finished(&split_id);
            }
            return Ok(records);
        }

        let configuration = &self.context.configuration;
        let deadline = Instant::now() + configuration.max_fetch_time;
        let stop_cursor = active.split.stop_cursor();
        while records.len() < configuration.max_fetch_records {
            if self.wakeup.is_woken() {
                debug!("Fetch of split {split_id} woken up");
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let timeout = remaining.min(configuration.default_fetch_time);
            let received = tokio::select! {
                _ = self.wakeup.inner.notify.notified() => {
                    debug!("Fetch of split {split_id} woken up");
                    break;
                }
                received = active.consumer.receive(timeout) => received,
            };
            let message = match received {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(ClientError::Interrupted) => {
                    debug!("Poll of split {split_id} was interrupted");
                    break;
                }
                Err(error) if error.is_transient() => {
                    error!("Failed to poll split {split_id}, retrying on next fetch: {error}");
                    break;
                }
                Err(source) => return Err(PulsarSourceError::Poll { split_id, source }),
            };

            let condition = stop_cursor.should_stop(&message);
            if condition.emits() {
                active
                    .acknowledger
                    .after_consume(active.consumer.as_mut(), message.id)
                    .await?;
                active.split.record_consumed(message.id);
                records.add(&split_id, message);
            }
            if condition.finishes() {
                info!("Split {split_id} reached its stop cursor ({condition})");
                active.finished = true;
                active.finish_reported = true;
                records.mark_finished(&split_id);
                break;
            }
        }

        debug!("Fetched {} messages from split {split_id}", records.len());
        Ok(records)
    }

    /// The split's state for the checkpoint, `None` once it's finished.
    pub fn snapshot_state(&mut self, checkpoint_id: u64) -> Option<PulsarPartitionSplit> {
        let active = self.active.as_mut()?;
        active.acknowledger.snapshot(checkpoint_id);
        (!active.finished).then(|| active.split.clone())
    }

    pub async fn notify_checkpoint_complete(
        &mut self,
        checkpoint_id: u64,
    ) -> Result<(), PulsarSourceError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        active
            .acknowledger
            .checkpoint_complete(active.consumer.as_mut(), checkpoint_id)
            .await
    }

    /// Closes the consumer once. Failures are logged, the reader is released anyway.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let Some(mut active) = self.active.take() else {
            return;
        };
        let split_id = active.split.split_id();
        if let Err(error) = active.acknowledger.flush(active.consumer.as_mut()).await {
            warn!("Failed to commit the cursor of split {split_id} on close: {error}");
        }
        if let Err(error) = active.consumer.close().await {
            warn!("Failed to close consumer of split {split_id}: {error}");
        }
        info!("Closed split reader of split {split_id}");
    }
}
