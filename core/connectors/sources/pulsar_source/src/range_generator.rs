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

//! Deterministic mapping of a topic's key space into ranges. Re-discovery must always yield the
//! same ranges for the same topic, otherwise checkpointed partitions can't be matched again.

use crate::error::PulsarSourceError;
use crate::topic::{KeySharedMode, MAX_RANGE, MIN_RANGE, TopicMetadata, TopicRange, validate_ranges};
use std::fmt::Debug;

pub trait RangeGenerator: Send + Sync + Debug {
    fn range(&self, metadata: &TopicMetadata, parallelism: u32) -> Vec<TopicRange>;

    fn key_shared_mode(&self, metadata: &TopicMetadata, parallelism: u32) -> KeySharedMode;
}

/// One range covering the whole key space.
#[derive(Debug, Default, Clone, Copy)]
pub struct FullRangeGenerator;

impl RangeGenerator for FullRangeGenerator {
    fn range(&self, _metadata: &TopicMetadata, _parallelism: u32) -> Vec<TopicRange> {
        vec![TopicRange::full()]
    }

    fn key_shared_mode(&self, _metadata: &TopicMetadata, _parallelism: u32) -> KeySharedMode {
        KeySharedMode::Split
    }
}

/// Divides the key space into evenly sized ranges, one split per range.
#[derive(Debug, Default, Clone, Copy)]
pub struct SplitRangeGenerator {
    /// Falls back to the reader parallelism when not set.
    splits: Option<u32>,
}

impl SplitRangeGenerator {
    pub fn new(splits: u32) -> Result<Self, PulsarSourceError> {
        if splits == 0 || splits > MAX_RANGE {
            return Err(PulsarSourceError::InvalidRanges(format!(
                "cannot divide the key space into {splits} ranges"
            )));
        }
        Ok(Self {
            splits: Some(splits),
        })
    }

    pub fn by_parallelism() -> Self {
        Self { splits: None }
    }
}

impl RangeGenerator for SplitRangeGenerator {
    fn range(&self, _metadata: &TopicMetadata, parallelism: u32) -> Vec<TopicRange> {
        let count = self.splits.unwrap_or(parallelism).clamp(1, MAX_RANGE);
        let size = (MAX_RANGE - MIN_RANGE) / count;
        (0..count)
            .map(|index| {
                let start = MIN_RANGE + index * size;
                let end = if index == count - 1 {
                    MAX_RANGE
                } else {
                    start + size
                };
                TopicRange::new(start, end)
            })
            .collect::<Result<Vec<_>, _>>()
            .unwrap_or_else(|_| vec![TopicRange::full()])
    }

    fn key_shared_mode(&self, _metadata: &TopicMetadata, _parallelism: u32) -> KeySharedMode {
        KeySharedMode::Split
    }
}

/// User supplied ranges, validated to be disjoint and to cover the whole key space.
#[derive(Debug, Clone)]
pub struct FixedRangeGenerator {
    ranges: Vec<TopicRange>,
    mode: KeySharedMode,
}

impl FixedRangeGenerator {
    pub fn new(ranges: Vec<TopicRange>) -> Result<Self, PulsarSourceError> {
        Self::with_mode(ranges, KeySharedMode::Join)
    }

    pub fn with_mode(
        mut ranges: Vec<TopicRange>,
        mode: KeySharedMode,
    ) -> Result<Self, PulsarSourceError> {
        validate_ranges(&ranges)?;
        ranges.sort();
        Ok(Self { ranges, mode })
    }
}

impl RangeGenerator for FixedRangeGenerator {
    fn range(&self, _metadata: &TopicMetadata, _parallelism: u32) -> Vec<TopicRange> {
        self.ranges.clone()
    }

    fn key_shared_mode(&self, _metadata: &TopicMetadata, _parallelism: u32) -> KeySharedMode {
        self.mode
    }
}
