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
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use strum::{Display as StrumDisplay, EnumString};

/// Lower bound (inclusive) of the hashed key space.
pub const MIN_RANGE: u32 = 0;
/// Upper bound (exclusive) of the hashed key space.
pub const MAX_RANGE: u32 = 65536;
/// Partition id used for non-partitioned topics.
pub const NON_PARTITION_ID: i32 = -1;

const PARTITION_SUFFIX: &str = "-partition-";
const DEFAULT_DOMAIN: &str = "persistent";
const DEFAULT_TENANT: &str = "public";
const DEFAULT_NAMESPACE: &str = "default";

/// A half-open `[start, end)` slice of the hashed key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawTopicRange")]
pub struct TopicRange {
    start: u32,
    end: u32,
}

/// Decoded bounds, checked by [`TopicRange::new`] before they become a range.
#[derive(Deserialize)]
struct RawTopicRange {
    start: u32,
    end: u32,
}

impl TryFrom<RawTopicRange> for TopicRange {
    type Error = PulsarSourceError;

    fn try_from(raw: RawTopicRange) -> Result<Self, Self::Error> {
        TopicRange::new(raw.start, raw.end)
    }
}

impl TopicRange {
    pub fn new(start: u32, end: u32) -> Result<Self, PulsarSourceError> {
        if start >= end || end > MAX_RANGE {
            return Err(PulsarSourceError::InvalidRanges(format!(
                "[{start}, {end}) is not a valid range within [{MIN_RANGE}, {MAX_RANGE})"
            )));
        }
        Ok(Self { start, end })
    }

    pub const fn full() -> Self {
        Self {
            start: MIN_RANGE,
            end: MAX_RANGE,
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// The broker expresses sticky hash ranges with an inclusive upper bound.
    pub fn to_inclusive(&self) -> (u32, u32) {
        (self.start, self.end - 1)
    }
}

impl Display for TopicRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Checks that the ranges are pairwise disjoint and jointly cover the whole key space.
pub fn validate_ranges(ranges: &[TopicRange]) -> Result<(), PulsarSourceError> {
    if ranges.is_empty() {
        return Err(PulsarSourceError::InvalidRanges(
            "at least one range is required".to_owned(),
        ));
    }

    let mut sorted = ranges.to_vec();
    sorted.sort();
    let mut expected_start = MIN_RANGE;
    for range in &sorted {
        if range.start < expected_start {
            return Err(PulsarSourceError::InvalidRanges(format!(
                "range {range} overlaps with a previous range"
            )));
        }
        if range.start > expected_start {
            return Err(PulsarSourceError::InvalidRanges(format!(
                "keys [{expected_start}, {}) are not covered",
                range.start
            )));
        }
        expected_start = range.end;
    }

    if expected_start != MAX_RANGE {
        return Err(PulsarSourceError::InvalidRanges(format!(
            "keys [{expected_start}, {MAX_RANGE}) are not covered"
        )));
    }
    Ok(())
}

/// How the ranges of a physical partition are mapped to splits.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum KeySharedMode {
    /// All the ranges are consumed by one split per physical partition.
    Join,
    /// Every range is consumed by its own split.
    Split,
}

impl KeySharedMode {
    pub fn parse(value: &str) -> Result<Self, PulsarSourceError> {
        value
            .parse()
            .map_err(|_| PulsarSourceError::UnsupportedKeySharedMode(value.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMetadata {
    pub name: String,
    /// Zero for a non-partitioned topic.
    pub partition_count: u32,
}

impl TopicMetadata {
    pub fn new(name: &str, partition_count: u32) -> Self {
        Self {
            name: complete_topic_name(name),
            partition_count,
        }
    }

    pub fn is_partitioned(&self) -> bool {
        self.partition_count > 0
    }
}

/// A logical consumption unit: a physical partition together with a subset of its key ranges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicPartition {
    topic: String,
    partition_id: i32,
    ranges: Vec<TopicRange>,
    mode: KeySharedMode,
}

impl TopicPartition {
    pub fn new(
        topic: &str,
        partition_id: i32,
        mut ranges: Vec<TopicRange>,
        mode: KeySharedMode,
    ) -> Self {
        ranges.sort();
        ranges.dedup();
        Self {
            topic: complete_topic_name(topic),
            partition_id,
            ranges,
            mode,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition_id(&self) -> i32 {
        self.partition_id
    }

    pub fn ranges(&self) -> &[TopicRange] {
        &self.ranges
    }

    pub fn mode(&self) -> KeySharedMode {
        self.mode
    }

    pub fn is_partitioned(&self) -> bool {
        self.partition_id != NON_PARTITION_ID
    }

    /// The name the broker knows this physical partition by.
    pub fn full_topic_name(&self) -> String {
        if self.is_partitioned() {
            topic_name_with_partition(&self.topic, self.partition_id)
        } else {
            self.topic.clone()
        }
    }
}

impl Display for TopicPartition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let ranges = self
            .ranges
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}|{}|{}", self.full_topic_name(), ranges, self.mode)
    }
}

/// Completes a short topic name (`my-topic`, `tenant/ns/my-topic`) into
/// `persistent://tenant/ns/my-topic`.
pub fn complete_topic_name(name: &str) -> String {
    if name.contains("://") {
        return name.to_owned();
    }

    let segments = name.split('/').count();
    if segments >= 3 {
        format!("{DEFAULT_DOMAIN}://{name}")
    } else {
        format!("{DEFAULT_DOMAIN}://{DEFAULT_TENANT}/{DEFAULT_NAMESPACE}/{name}")
    }
}

pub fn topic_name_with_partition(topic: &str, partition_id: i32) -> String {
    format!("{topic}{PARTITION_SUFFIX}{partition_id}")
}

/// Splits `<topic>-partition-<n>` into its parent topic and partition index.
pub fn parse_partition_name(name: &str) -> (String, Option<i32>) {
    let completed = complete_topic_name(name);
    if let Some(position) = completed.rfind(PARTITION_SUFFIX) {
        let (parent, suffix) = completed.split_at(position);
        if let Ok(index) = suffix[PARTITION_SUFFIX.len()..].parse::<i32>()
            && index >= 0
        {
            return (parent.to_owned(), Some(index));
        }
    }
    (completed, None)
}
