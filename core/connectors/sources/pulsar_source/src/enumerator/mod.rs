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

mod context;
mod state;

pub use context::{SplitEnumeratorContext, SplitsAssignment};
pub use state::EnumeratorState;

use crate::client::PulsarAdmin;
use crate::config::SourceConfiguration;
use crate::cursor::{StartCursor, StopCursor};
use crate::error::PulsarSourceError;
use crate::range_generator::RangeGenerator;
use crate::split::PulsarPartitionSplit;
use crate::subscriber::TopicSubscriber;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use strum::Display;
use tokio::sync::{Mutex, MutexGuard, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info, warn};

const DISCOVERY_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything the enumerator needs to discover partitions and create splits for them.
#[derive(Debug, Clone)]
pub struct EnumeratorConfig {
    pub configuration: SourceConfiguration,
    pub subscriber: TopicSubscriber,
    pub range_generator: Arc<dyn RangeGenerator>,
    pub start_cursor: StartCursor,
    pub stop_cursor: StopCursor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
enum Lifecycle {
    Init,
    Running,
    Closed,
}

#[derive(Debug)]
struct EnumeratorInner {
    lifecycle: Lifecycle,
    state: EnumeratorState,
    /// Split id -> reader id, for splits handed out during this run.
    assigned: BTreeMap<String, u32>,
    next_reader: usize,
    discovery_exhausted: bool,
    no_more_splits_signalled: BTreeSet<u32>,
}

#[derive(Debug)]
struct EnumeratorShared {
    config: EnumeratorConfig,
    admin: Arc<dyn PulsarAdmin>,
    context: Arc<dyn SplitEnumeratorContext>,
    inner: Mutex<EnumeratorInner>,
}

/// Discovers partitions, turns them into splits and hands those out to the readers.
#[derive(Debug)]
pub struct PulsarSourceEnumerator {
    shared: Arc<EnumeratorShared>,
    shutdown_tx: Option<watch::Sender<()>>,
    discovery_task: Option<JoinHandle<()>>,
}

impl PulsarSourceEnumerator {
    pub fn new(
        mut config: EnumeratorConfig,
        admin: Arc<dyn PulsarAdmin>,
        context: Arc<dyn SplitEnumeratorContext>,
        state: EnumeratorState,
    ) -> Self {
        if config.stop_cursor.is_bounded() && config.configuration.is_partition_discovery_enabled()
        {
            warn!(
                "Partition discovery is disabled for subscription: {}, the source is bounded",
                config.configuration.subscription_name
            );
            config.configuration.disable_partition_discovery();
        }

        let inner = EnumeratorInner {
            lifecycle: Lifecycle::Init,
            state,
            assigned: BTreeMap::new(),
            next_reader: 0,
            discovery_exhausted: false,
            no_more_splits_signalled: BTreeSet::new(),
        };

        PulsarSourceEnumerator {
            shared: Arc::new(EnumeratorShared {
                config,
                admin,
                context,
                inner: Mutex::new(inner),
            }),
            shutdown_tx: None,
            discovery_task: None,
        }
    }

    /// Runs the first discovery and schedules the periodic ones. Without periodic discovery
    /// a failing first discovery is returned, as nothing would retry it.
    pub async fn start(&mut self) -> Result<(), PulsarSourceError> {
        {
            let mut inner = self.shared.inner.lock().await;
            match inner.lifecycle {
                Lifecycle::Init => inner.lifecycle = Lifecycle::Running,
                Lifecycle::Running => {
                    warn!("Pulsar source enumerator is already running");
                    return Ok(());
                }
                Lifecycle::Closed => return Err(PulsarSourceError::EnumeratorClosed),
            }
        }

        let configuration = &self.shared.config.configuration;
        info!(
            "Starting pulsar source enumerator for subscription: {}, partition discovery: {}",
            configuration.subscription_name,
            configuration
                .partition_discovery_interval
                .map(|interval| format!("every {interval:?}"))
                .unwrap_or_else(|| "once".to_owned())
        );

        let Some(period) = configuration.partition_discovery_interval else {
            self.shared.discover_and_assign().await?;
            let mut inner = self.shared.inner.lock().await;
            inner.discovery_exhausted = true;
            self.shared.signal_no_more_splits(&mut inner);
            return Ok(());
        };

        if let Err(error) = self.shared.discover_and_assign().await {
            error!("Initial partition discovery failed, retrying in {period:?}: {error}");
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(());
        let shared = self.shared.clone();
        self.discovery_task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        debug!("Partition discovery task received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(error) = shared.discover_and_assign().await {
                            error!("Partition discovery failed, retrying in {period:?}: {error}");
                        }
                    }
                }
            }
        }));
        self.shutdown_tx = Some(shutdown_tx);
        Ok(())
    }

    pub async fn add_reader(&self, reader_id: u32) -> Result<(), PulsarSourceError> {
        let mut inner = self.shared.running().await?;
        info!("Reader {reader_id} registered to pulsar source enumerator");
        inner.no_more_splits_signalled.remove(&reader_id);
        self.shared.assign_pending_splits(&mut inner);
        Ok(())
    }

    pub async fn handle_split_request(&self, reader_id: u32) -> Result<(), PulsarSourceError> {
        let mut inner = self.shared.running().await?;
        debug!("Reader {reader_id} requested splits");
        self.shared.assign_pending_splits(&mut inner);
        Ok(())
    }

    /// Takes back the splits of a failed reader. They are handed out again once a reader
    /// registers or asks for splits.
    pub async fn add_splits_back(
        &self,
        splits: Vec<PulsarPartitionSplit>,
        reader_id: u32,
    ) -> Result<(), PulsarSourceError> {
        let mut inner = self.shared.running().await?;
        info!("Adding back {} splits of reader {reader_id}", splits.len());
        inner.no_more_splits_signalled.remove(&reader_id);
        for split in splits {
            let split_id = split.split_id();
            inner.assigned.remove(&split_id);
            if inner.state.finished_splits.contains(&split_id) {
                debug!("Split {split_id} is already finished, it won't be assigned again");
                continue;
            }
            if inner
                .state
                .pending_splits
                .iter()
                .all(|pending| pending.split_id() != split_id)
            {
                inner.state.pending_splits.push(split);
            }
        }
        Ok(())
    }

    /// Finished splits are discarded for good: never assigned nor discovered again.
    pub async fn handle_splits_finished(
        &self,
        split_ids: &[String],
    ) -> Result<(), PulsarSourceError> {
        let mut inner = self.shared.running().await?;
        for split_id in split_ids {
            if let Some(reader_id) = inner.assigned.remove(split_id) {
                info!("Split {split_id} of reader {reader_id} is finished");
            }
            inner.state.finished_splits.insert(split_id.clone());
        }
        inner
            .state
            .pending_splits
            .retain(|split| !split_ids.contains(&split.split_id()));
        Ok(())
    }

    /// A point in time copy of the state. Discovery talks to the broker without holding the
    /// state, so a snapshot never waits for it.
    pub async fn snapshot_state(&self) -> EnumeratorState {
        self.shared.inner.lock().await.state.clone()
    }

    /// Only a bounded source finishes: discovery ran, nothing is pending and the split of
    /// every discovered partition reported back finished, in this run or before a restore.
    pub async fn is_finished(&self) -> bool {
        let inner = self.shared.inner.lock().await;
        inner.discovery_exhausted && inner.state.all_splits_finished()
    }

    pub async fn close(&mut self) {
        {
            let mut inner = self.shared.inner.lock().await;
            if inner.lifecycle == Lifecycle::Closed {
                return;
            }
            inner.lifecycle = Lifecycle::Closed;
        }

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.discovery_task.take()
            && tokio::time::timeout(DISCOVERY_SHUTDOWN_TIMEOUT, task)
                .await
                .is_err()
        {
            warn!("Partition discovery task didn't stop in {DISCOVERY_SHUTDOWN_TIMEOUT:?}");
        }
        info!(
            "Closed pulsar source enumerator for subscription: {}",
            self.shared.config.configuration.subscription_name
        );
    }
}

impl EnumeratorShared {
    async fn running(&self) -> Result<MutexGuard<'_, EnumeratorInner>, PulsarSourceError> {
        let inner = self.inner.lock().await;
        if inner.lifecycle == Lifecycle::Closed {
            return Err(PulsarSourceError::EnumeratorClosed);
        }
        Ok(inner)
    }

    async fn discover_and_assign(&self) -> Result<(), PulsarSourceError> {
        let partitions = self
            .config
            .subscriber
            .topic_partitions(
                self.admin.as_ref(),
                self.config.range_generator.as_ref(),
                self.context.current_parallelism(),
            )
            .await?;

        let new_partitions = {
            let inner = self.inner.lock().await;
            if inner.lifecycle == Lifecycle::Closed {
                return Ok(());
            }
            partitions
                .into_iter()
                .filter(|partition| !inner.state.appended_partitions.contains(partition))
                .collect::<Vec<_>>()
        };

        let mut splits = Vec::with_capacity(new_partitions.len());
        for partition in new_partitions {
            let start_position = self.config.start_cursor.position(&partition);
            let mut split =
                PulsarPartitionSplit::new(partition, start_position, self.config.stop_cursor);
            if let Err(error) = split.open(self.admin.as_ref()).await {
                warn!(
                    "Failed to resolve the stop cursor of split {}, retrying in reader: {error}",
                    split.split_id()
                );
            }
            splits.push(split);
        }

        let mut inner = self.inner.lock().await;
        if inner.lifecycle == Lifecycle::Closed {
            return Ok(());
        }
        let mut discovered = 0;
        for split in splits {
            if inner
                .state
                .appended_partitions
                .insert(split.partition().clone())
            {
                inner.state.pending_splits.push(split);
                discovered += 1;
            }
        }
        if discovered > 0 {
            info!(
                "Discovered {discovered} new partitions, {} partitions known in total",
                inner.state.appended_partitions.len()
            );
        } else {
            debug!("No new partitions discovered");
        }
        self.assign_pending_splits(&mut inner);
        Ok(())
    }

    /// Round-robin over the registered readers ordered by id. The cursor survives between
    /// calls so consecutive discoveries keep spreading splits evenly.
    fn assign_pending_splits(&self, inner: &mut EnumeratorInner) {
        let readers = self
            .context
            .registered_readers()
            .into_iter()
            .collect::<Vec<_>>();
        if readers.is_empty() || inner.state.pending_splits.is_empty() {
            self.signal_no_more_splits(inner);
            return;
        }

        let mut assignment = SplitsAssignment::default();
        for split in std::mem::take(&mut inner.state.pending_splits) {
            let reader_id = readers[inner.next_reader % readers.len()];
            inner.next_reader = inner.next_reader.wrapping_add(1);
            inner.assigned.insert(split.split_id(), reader_id);
            assignment.add(reader_id, split);
        }

        info!(
            "Assigning {} splits to {} readers",
            assignment.len(),
            readers.len()
        );
        self.context.assign_splits(assignment);
        self.signal_no_more_splits(inner);
    }

    fn signal_no_more_splits(&self, inner: &mut EnumeratorInner) {
        if !inner.discovery_exhausted || !inner.state.pending_splits.is_empty() {
            return;
        }

        for reader_id in self.context.registered_readers() {
            if inner.no_more_splits_signalled.insert(reader_id) {
                debug!("Signalling no more splits to reader {reader_id}");
                self.context.signal_no_more_splits(reader_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::config::PulsarSourceConfig;
    use crate::cursor::MessageId;
    use crate::range_generator::FullRangeGenerator;
    use crate::testing::{InMemoryBroker, RecordingContext};

    fn config(stop_cursor: StopCursor, discovery_interval_ms: i64) -> EnumeratorConfig {
        let mut raw = PulsarSourceConfig::new("sub");
        raw.partition_discovery_interval_ms = discovery_interval_ms;
        EnumeratorConfig {
            configuration: SourceConfiguration::try_from(&raw).unwrap(),
            subscriber: TopicSubscriber::topics(&["t"]),
            range_generator: Arc::new(FullRangeGenerator),
            start_cursor: StartCursor::Earliest,
            stop_cursor,
        }
    }

    fn enumerator(
        broker: &Arc<InMemoryBroker>,
        context: &Arc<RecordingContext>,
        config: EnumeratorConfig,
    ) -> PulsarSourceEnumerator {
        PulsarSourceEnumerator::new(
            config,
            broker.clone(),
            context.clone(),
            EnumeratorState::new(),
        )
    }

    #[tokio::test]
    async fn should_assign_discovered_splits_round_robin() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.create_topic("t", 4);
        let context = Arc::new(RecordingContext::new(2));
        context.register_reader(0);
        context.register_reader(1);
        let mut enumerator = enumerator(&broker, &context, config(StopCursor::Never, 0));

        enumerator.start().await.unwrap();

        let first = context.assigned_to(0);
        let second = context.assigned_to(1);
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert!(enumerator.snapshot_state().await.pending_splits.is_empty());
        assert_eq!(
            enumerator.snapshot_state().await.appended_partitions.len(),
            4
        );
        enumerator.close().await;
    }

    #[tokio::test]
    async fn should_keep_splits_pending_until_a_reader_registers() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.create_topic("t", 2);
        let context = Arc::new(RecordingContext::new(1));
        let mut enumerator = enumerator(&broker, &context, config(StopCursor::Never, 0));

        enumerator.start().await.unwrap();
        assert_eq!(enumerator.snapshot_state().await.pending_splits.len(), 2);

        context.register_reader(7);
        enumerator.add_reader(7).await.unwrap();

        assert_eq!(context.assigned_to(7).len(), 2);
        assert!(enumerator.snapshot_state().await.pending_splits.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_discover_new_partitions_periodically() {
        let broker = Arc::new(InMemoryBroker::new());
        let context = Arc::new(RecordingContext::new(1));
        context.register_reader(0);
        let mut enumerator = enumerator(&broker, &context, config(StopCursor::Never, 1000));

        enumerator.start().await.unwrap();
        assert!(context.assigned_to(0).is_empty());

        broker.create_topic("t", 2);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(context.assigned_to(0).len(), 2);
        enumerator.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn given_failing_admin_should_retry_discovery_on_next_tick() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.create_topic("t", 1);
        broker.fail_admin(ClientError::Broker("unavailable".to_owned()));
        let context = Arc::new(RecordingContext::new(1));
        context.register_reader(0);
        let mut enumerator = enumerator(&broker, &context, config(StopCursor::Never, 1000));

        enumerator.start().await.unwrap();
        assert!(context.assigned_to(0).is_empty());

        broker.clear_admin_failure();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(context.assigned_to(0).len(), 1);
        enumerator.close().await;
    }

    #[tokio::test]
    async fn given_disabled_discovery_should_fail_start_on_admin_error() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.create_topic("t", 1);
        broker.fail_admin(ClientError::Broker("unavailable".to_owned()));
        let context = Arc::new(RecordingContext::new(1));
        let mut enumerator = enumerator(&broker, &context, config(StopCursor::Never, 0));

        assert!(matches!(
            enumerator.start().await,
            Err(PulsarSourceError::TopicMetadata { .. })
        ));
    }

    #[tokio::test]
    async fn should_not_rediscover_or_reassign_finished_splits() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.create_topic("t", 1);
        let context = Arc::new(RecordingContext::new(1));
        context.register_reader(0);
        let mut enumerator = enumerator(&broker, &context, config(StopCursor::Never, 0));
        enumerator.start().await.unwrap();
        let split = context.assigned_to(0).remove(0);

        enumerator
            .handle_splits_finished(&[split.split_id()])
            .await
            .unwrap();
        enumerator.add_splits_back(vec![split], 0).await.unwrap();
        enumerator.shared.discover_and_assign().await.unwrap();

        assert!(enumerator.snapshot_state().await.pending_splits.is_empty());
        assert_eq!(context.assigned_to(0).len(), 1);
    }

    #[tokio::test]
    async fn should_reassign_splits_added_back_after_reader_failure() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.create_topic("t", 2);
        let context = Arc::new(RecordingContext::new(2));
        context.register_reader(0);
        context.register_reader(1);
        let mut enumerator = enumerator(&broker, &context, config(StopCursor::Never, 0));
        enumerator.start().await.unwrap();
        let failed = context.assigned_to(1);
        assert_eq!(failed.len(), 1);

        enumerator.add_splits_back(failed.clone(), 1).await.unwrap();
        assert_eq!(enumerator.snapshot_state().await.pending_splits, failed);

        enumerator.add_reader(1).await.unwrap();
        assert!(enumerator.snapshot_state().await.pending_splits.is_empty());
    }

    #[tokio::test]
    async fn given_bounded_source_should_finish_once_all_splits_are_finished() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.create_topic("t", 2);
        broker.publish("t-partition-0", 3);
        let context = Arc::new(RecordingContext::new(1));
        context.register_reader(0);
        let mut enumerator = enumerator(&broker, &context, config(StopCursor::latest(), 30_000));

        enumerator.start().await.unwrap();

        let splits = context.assigned_to(0);
        assert_eq!(splits.len(), 2);
        assert!(splits.iter().any(|split| {
            split.stop_cursor()
                == StopCursor::Latest {
                    last: Some(MessageId::new(0, 2, -1)),
                }
        }));
        assert_eq!(context.no_more_splits_signalled(), vec![0]);
        assert!(!enumerator.is_finished().await);

        let split_ids = splits.iter().map(PulsarPartitionSplit::split_id).collect::<Vec<_>>();
        enumerator.handle_splits_finished(&split_ids).await.unwrap();
        assert!(enumerator.is_finished().await);
    }

    #[tokio::test]
    async fn given_restored_bounded_source_should_wait_for_splits_assigned_before_restore() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.create_topic("t", 1);
        broker.publish("t-partition-0", 2);
        let context = Arc::new(RecordingContext::new(1));
        context.register_reader(0);
        let mut first = enumerator(&broker, &context, config(StopCursor::latest(), 0));
        first.start().await.unwrap();
        let split_id = context.assigned_to(0)[0].split_id();
        assert!(!first.is_finished().await);
        let checkpoint = first.snapshot_state().await.to_bytes().unwrap();
        first.close().await;

        let restore = |checkpoint: &[u8]| {
            PulsarSourceEnumerator::new(
                config(StopCursor::latest(), 0),
                broker.clone(),
                context.clone(),
                EnumeratorState::from_bytes(checkpoint).unwrap(),
            )
        };
        let mut restored = restore(&checkpoint);
        restored.start().await.unwrap();
        assert!(!restored.is_finished().await);

        restored
            .handle_splits_finished(std::slice::from_ref(&split_id))
            .await
            .unwrap();
        assert!(restored.is_finished().await);
        let checkpoint = restored.snapshot_state().await.to_bytes().unwrap();
        restored.close().await;

        let mut finished = restore(&checkpoint);
        finished.start().await.unwrap();
        assert!(finished.is_finished().await);
        assert_eq!(context.assigned_to(0).len(), 1);
    }

    #[tokio::test]
    async fn given_unbounded_source_should_never_finish() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.create_topic("t", 1);
        let context = Arc::new(RecordingContext::new(1));
        context.register_reader(0);
        let mut enumerator = enumerator(&broker, &context, config(StopCursor::Never, 60_000));

        enumerator.start().await.unwrap();

        assert!(!enumerator.is_finished().await);
        assert!(context.no_more_splits_signalled().is_empty());
        enumerator.close().await;
    }

    #[tokio::test]
    async fn should_restore_pending_splits_from_checkpoint() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.create_topic("t", 3);
        let context = Arc::new(RecordingContext::new(1));
        let mut first = enumerator(&broker, &context, config(StopCursor::Never, 0));
        first.start().await.unwrap();
        let checkpoint = first.snapshot_state().await.to_bytes().unwrap();
        first.close().await;

        context.register_reader(0);
        let mut restored = PulsarSourceEnumerator::new(
            config(StopCursor::Never, 0),
            broker.clone(),
            context.clone(),
            EnumeratorState::from_bytes(&checkpoint).unwrap(),
        );
        restored.start().await.unwrap();

        assert_eq!(context.assigned_to(0).len(), 3);
        assert_eq!(restored.snapshot_state().await.appended_partitions.len(), 3);
    }

    #[tokio::test]
    async fn should_reject_operations_after_close() {
        let broker = Arc::new(InMemoryBroker::new());
        let context = Arc::new(RecordingContext::new(1));
        let mut enumerator = enumerator(&broker, &context, config(StopCursor::Never, 0));
        enumerator.start().await.unwrap();
        enumerator.close().await;

        assert!(matches!(
            enumerator.add_reader(0).await,
            Err(PulsarSourceError::EnumeratorClosed)
        ));
        assert!(matches!(
            enumerator.start().await,
            Err(PulsarSourceError::EnumeratorClosed)
        ));
    }
}
