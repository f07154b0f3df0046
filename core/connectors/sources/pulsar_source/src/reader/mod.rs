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

mod acknowledger;
mod records;
mod source_reader;
mod split_reader;

pub use records::RecordsBySplits;
pub use source_reader::PulsarSourceReader;
pub use split_reader::{PulsarPartitionSplitReader, SplitsChange, WakeupHandle};

use crate::client::{CryptoKeyReader, PulsarAdmin, PulsarClient};
use crate::config::SourceConfiguration;
use std::sync::Arc;

/// The broker collaborators and settings shared by every split reader of a source reader.
#[derive(Debug, Clone)]
pub struct ReaderContext {
    pub configuration: Arc<SourceConfiguration>,
    pub admin: Arc<dyn PulsarAdmin>,
    pub client: Arc<dyn PulsarClient>,
    pub crypto_key_reader: Option<Arc<dyn CryptoKeyReader>>,
}
