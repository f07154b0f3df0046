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

use crate::config::PulsarSourceConfig;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PulsarSourceConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;

    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

    match extension.to_lowercase().as_str() {
        "json" => load_from_json(&content),
        "toml" => load_from_toml(&content),
        _ => {
            if let Ok(config) = load_from_json(&content) {
                return Ok(config);
            }
            if let Ok(config) = load_from_toml(&content) {
                return Ok(config);
            }
            Err(ConfigError::UnsupportedFormat(extension.to_string()))
        }
    }
}

pub fn load_from_json(content: &str) -> Result<PulsarSourceConfig, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

pub fn load_from_toml(content: &str) -> Result<PulsarSourceConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}
