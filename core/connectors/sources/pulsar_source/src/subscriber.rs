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

use crate::client::{ClientError, PulsarAdmin};
use crate::error::PulsarSourceError;
use crate::range_generator::RangeGenerator;
use crate::topic::{
    KeySharedMode, NON_PARTITION_ID, TopicMetadata, TopicPartition, TopicRange,
    complete_topic_name, parse_partition_name,
};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Which topics the source consumes.
#[derive(Debug, Clone)]
pub enum TopicSubscriber {
    /// Topic names, or partition names such as `my-topic-partition-2` for a single partition.
    Topics(Vec<String>),
    /// Every topic of the namespace whose fully qualified name matches the pattern.
    Pattern { namespace: String, pattern: Regex },
}

impl TopicSubscriber {
    pub fn topics<S: AsRef<str>>(topics: &[S]) -> Self {
        TopicSubscriber::Topics(
            topics
                .iter()
                .map(|topic| complete_topic_name(topic.as_ref()))
                .collect(),
        )
    }

    pub fn pattern(namespace: &str, pattern: &str) -> Result<Self, PulsarSourceError> {
        let pattern = Regex::new(pattern).map_err(|error| {
            PulsarSourceError::InvalidConfig(format!("invalid topic pattern '{pattern}': {error}"))
        })?;
        Ok(TopicSubscriber::Pattern {
            namespace: namespace.to_owned(),
            pattern,
        })
    }

    /// Queries the broker for the current partitions of the subscribed topics. Topics that
    /// don't exist yet are skipped.
    pub async fn topic_partitions(
        &self,
        admin: &dyn PulsarAdmin,
        generator: &dyn RangeGenerator,
        parallelism: u32,
    ) -> Result<BTreeSet<TopicPartition>, PulsarSourceError> {
        let requested = match self {
            TopicSubscriber::Topics(topics) => {
                requested_partitions(topics.iter().map(String::as_str))
            }
            TopicSubscriber::Pattern { namespace, pattern } => {
                let topics = admin.get_topics(namespace).await.map_err(|source| {
                    PulsarSourceError::ListTopics {
                        namespace: namespace.clone(),
                        source,
                    }
                })?;
                let mut requested = BTreeMap::new();
                for topic in topics {
                    let (parent, _) = parse_partition_name(&topic);
                    if pattern.is_match(&parent) {
                        requested.insert(parent, None);
                    }
                }
                requested
            }
        };

        let mut partitions = BTreeSet::new();
        for (topic, selected) in requested {
            let Some(metadata) = query_topic_metadata(admin, &topic).await? else {
                debug!("Topic {topic} doesn't exist yet, skipping it");
                continue;
            };

            let ranges = generator.range(&metadata, parallelism);
            let mode = generator.key_shared_mode(&metadata, parallelism);
            match selected {
                None => partitions.extend(to_topic_partitions(&metadata, &ranges, mode)),
                Some(indexes) => {
                    for index in indexes {
                        if !metadata.is_partitioned() || index as u32 >= metadata.partition_count {
                            warn!(
                                "Partition {index} of topic {topic} doesn't exist, partitions: {}",
                                metadata.partition_count
                            );
                            continue;
                        }
                        partitions.extend(partitions_of(&metadata.name, index, &ranges, mode));
                    }
                }
            }
        }
        Ok(partitions)
    }
}

/// Groups the configured names by their parent topic, `None` meaning all the partitions.
fn requested_partitions<'a>(
    topics: impl Iterator<Item = &'a str>,
) -> BTreeMap<String, Option<BTreeSet<i32>>> {
    let mut requested: BTreeMap<String, Option<BTreeSet<i32>>> = BTreeMap::new();
    for topic in topics {
        match parse_partition_name(topic) {
            (parent, None) => {
                requested.insert(parent, None);
            }
            (parent, Some(index)) => {
                let entry = requested
                    .entry(parent)
                    .or_insert_with(|| Some(BTreeSet::new()));
                if let Some(indexes) = entry {
                    indexes.insert(index);
                }
            }
        }
    }
    requested
}

/// A missing topic is not an error, it may be created later.
pub async fn query_topic_metadata(
    admin: &dyn PulsarAdmin,
    topic: &str,
) -> Result<Option<TopicMetadata>, PulsarSourceError> {
    match admin.get_topic_metadata(topic).await {
        Ok(metadata) => Ok(Some(metadata)),
        Err(ClientError::NotFound(_)) => Ok(None),
        Err(source) => Err(PulsarSourceError::TopicMetadata {
            topic: topic.to_owned(),
            source,
        }),
    }
}

pub fn to_topic_partitions(
    metadata: &TopicMetadata,
    ranges: &[TopicRange],
    mode: KeySharedMode,
) -> Vec<TopicPartition> {
    if !metadata.is_partitioned() {
        return partitions_of(&metadata.name, NON_PARTITION_ID, ranges, mode);
    }

    (0..metadata.partition_count as i32)
        .flat_map(|partition_id| partitions_of(&metadata.name, partition_id, ranges, mode))
        .collect()
}

fn partitions_of(
    topic: &str,
    partition_id: i32,
    ranges: &[TopicRange],
    mode: KeySharedMode,
) -> Vec<TopicPartition> {
    match mode {
        KeySharedMode::Join => vec![TopicPartition::new(
            topic,
            partition_id,
            ranges.to_vec(),
            mode,
        )],
        KeySharedMode::Split => ranges
            .iter()
            .map(|range| TopicPartition::new(topic, partition_id, vec![*range], mode))
            .collect(),
    }
}
