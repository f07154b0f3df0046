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

use crate::error::PulsarSourceError;
use crate::topic::KeySharedMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::Display;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulsarSourceConfig {
    /// Subscription shared by all the readers of this source
    pub subscription_name: String,

    /// Subscription type shared by all the readers of this source
    #[serde(default)]
    pub subscription_type: SubscriptionType,

    /// Subscription mode shared by all the readers of this source
    #[serde(default)]
    pub subscription_mode: SubscriptionMode,

    /// Capacity of the element queue of a reader, also used as the consumer receiver queue size
    #[serde(default = "default_message_queue_capacity")]
    pub message_queue_capacity: usize,

    /// Interval of partition discovery in milliseconds, zero or negative disables it
    #[serde(default = "default_partition_discovery_interval_ms")]
    pub partition_discovery_interval_ms: i64,

    /// Acknowledge messages right after they are consumed instead of on checkpoint completion
    #[serde(default)]
    pub enable_auto_acknowledge_message: bool,

    /// Deserialize messages with the topic schema instead of raw bytes
    #[serde(default)]
    pub enable_schema_evolution: bool,

    /// Interval of cumulative acknowledgements when auto acknowledge is enabled
    #[serde(default = "default_auto_commit_cursor_interval_ms")]
    pub auto_commit_cursor_interval_ms: u64,

    /// Must be greater than the checkpoint interval
    #[serde(default = "default_transaction_timeout_ms")]
    pub transaction_timeout_ms: u64,

    /// Timeout of polling a single message, e.g. "100ms"
    #[serde(default = "default_fetch_time")]
    pub default_fetch_time: String,

    /// Time budget of a single fetch, e.g. "10s"
    #[serde(default = "default_max_fetch_time")]
    pub max_fetch_time: String,

    /// Record budget of a single fetch
    #[serde(default = "default_max_fetch_records")]
    pub max_fetch_records: usize,

    /// What to do when the initial position doesn't exist on the broker
    #[serde(default)]
    pub verify_initial_offsets: CursorVerification,

    /// Out of order delivery for the Key_Shared subscription
    #[serde(default)]
    pub allow_key_shared_out_of_order_delivery: bool,

    /// How a Key_Shared subscription maps the full key range to splits, "join" or "split"
    #[serde(default)]
    pub key_shared_mode: Option<String>,
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    Exclusive,
    Failover,
    #[default]
    Shared,
    KeyShared,
}

impl SubscriptionType {
    /// Exclusive and failover subscriptions deliver the messages of a partition in order.
    pub fn is_ordered(&self) -> bool {
        matches!(self, SubscriptionType::Exclusive | SubscriptionType::Failover)
    }
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionMode {
    #[default]
    Durable,
    NonDurable,
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum CursorVerification {
    FailOnMismatch,
    #[default]
    WarnOnMismatch,
    Ignore,
}

fn default_message_queue_capacity() -> usize {
    1000
}

fn default_partition_discovery_interval_ms() -> i64 {
    30_000
}

fn default_auto_commit_cursor_interval_ms() -> u64 {
    5_000
}

fn default_transaction_timeout_ms() -> u64 {
    3 * 60 * 60 * 1000
}

fn default_fetch_time() -> String {
    "100ms".to_owned()
}

fn default_max_fetch_time() -> String {
    "10s".to_owned()
}

fn default_max_fetch_records() -> usize {
    100
}

impl PulsarSourceConfig {
    pub fn new(subscription_name: &str) -> Self {
        Self {
            subscription_name: subscription_name.to_owned(),
            subscription_type: SubscriptionType::default(),
            subscription_mode: SubscriptionMode::default(),
            message_queue_capacity: default_message_queue_capacity(),
            partition_discovery_interval_ms: default_partition_discovery_interval_ms(),
            enable_auto_acknowledge_message: false,
            enable_schema_evolution: false,
            auto_commit_cursor_interval_ms: default_auto_commit_cursor_interval_ms(),
            transaction_timeout_ms: default_transaction_timeout_ms(),
            default_fetch_time: default_fetch_time(),
            max_fetch_time: default_max_fetch_time(),
            max_fetch_records: default_max_fetch_records(),
            verify_initial_offsets: CursorVerification::default(),
            allow_key_shared_out_of_order_delivery: false,
            key_shared_mode: None,
        }
    }
}

/// Validated, immutable configuration shared by the enumerator and the readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfiguration {
    pub subscription_name: String,
    pub subscription_type: SubscriptionType,
    pub subscription_mode: SubscriptionMode,
    pub message_queue_capacity: usize,
    /// `None` when partition discovery is disabled.
    pub partition_discovery_interval: Option<Duration>,
    pub enable_auto_acknowledge_message: bool,
    pub enable_schema_evolution: bool,
    pub auto_commit_cursor_interval: Duration,
    pub transaction_timeout: Duration,
    pub default_fetch_time: Duration,
    pub max_fetch_time: Duration,
    pub max_fetch_records: usize,
    pub verify_initial_offsets: CursorVerification,
    pub allow_key_shared_out_of_order_delivery: bool,
    pub key_shared_mode: Option<KeySharedMode>,
}

impl SourceConfiguration {
    pub fn is_partition_discovery_enabled(&self) -> bool {
        self.partition_discovery_interval.is_some()
    }

    pub fn disable_partition_discovery(&mut self) {
        self.partition_discovery_interval = None;
    }
}

impl TryFrom<&PulsarSourceConfig> for SourceConfiguration {
    type Error = PulsarSourceError;

    fn try_from(config: &PulsarSourceConfig) -> Result<Self, Self::Error> {
        if config.subscription_name.trim().is_empty() {
            return Err(PulsarSourceError::InvalidConfig(
                "subscription_name cannot be empty".to_owned(),
            ));
        }
        if config.message_queue_capacity == 0 {
            return Err(PulsarSourceError::InvalidConfig(
                "message_queue_capacity must be greater than 0".to_owned(),
            ));
        }
        if config.max_fetch_records == 0 {
            return Err(PulsarSourceError::InvalidConfig(
                "max_fetch_records must be greater than 0".to_owned(),
            ));
        }
        if config.auto_commit_cursor_interval_ms == 0 {
            return Err(PulsarSourceError::InvalidConfig(
                "auto_commit_cursor_interval_ms must be greater than 0".to_owned(),
            ));
        }

        let default_fetch_time = parse_duration("default_fetch_time", &config.default_fetch_time)?;
        let max_fetch_time = parse_duration("max_fetch_time", &config.max_fetch_time)?;
        if default_fetch_time.is_zero() || max_fetch_time.is_zero() {
            return Err(PulsarSourceError::InvalidConfig(
                "fetch times must be greater than 0".to_owned(),
            ));
        }

        let key_shared_mode = config
            .key_shared_mode
            .as_deref()
            .map(KeySharedMode::parse)
            .transpose()?;

        let partition_discovery_interval = (config.partition_discovery_interval_ms > 0)
            .then(|| Duration::from_millis(config.partition_discovery_interval_ms as u64));

        Ok(SourceConfiguration {
            subscription_name: config.subscription_name.clone(),
            subscription_type: config.subscription_type,
            subscription_mode: config.subscription_mode,
            message_queue_capacity: config.message_queue_capacity,
            partition_discovery_interval,
            enable_auto_acknowledge_message: config.enable_auto_acknowledge_message,
            enable_schema_evolution: config.enable_schema_evolution,
            auto_commit_cursor_interval: Duration::from_millis(
                config.auto_commit_cursor_interval_ms,
            ),
            transaction_timeout: Duration::from_millis(config.transaction_timeout_ms),
            default_fetch_time,
            max_fetch_time,
            max_fetch_records: config.max_fetch_records,
            verify_initial_offsets: config.verify_initial_offsets,
            allow_key_shared_out_of_order_delivery: config.allow_key_shared_out_of_order_delivery,
            key_shared_mode,
        })
    }
}

fn parse_duration(name: &str, value: &str) -> Result<Duration, PulsarSourceError> {
    value
        .parse::<humantime::Duration>()
        .map(Into::into)
        .map_err(|error| {
            PulsarSourceError::InvalidConfig(format!(
                "{name}: '{value}' is not a duration: {error}"
            ))
        })
}
