/*
 * SPDX-License-Identifier: MIT
 *
 * Permission is hereby granted, free of charge, to any person obtaining a
 * copy of this software and associated documentation files (the "Software"),
 * to deal in the Software without restriction, including without limitation
 * the rights to use, copy, modify, merge, publish, distribute, sublicense,
 * and/or sell copies of the Software, and to permit persons to whom the
 * Software is furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in
 * all copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL
 * THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
 * FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
 * DEALINGS IN THE SOFTWARE.
 */

// config.rs
// Connection and file server settings. They can come from a TOML file,
// from the command line or both; values given directly win over the file.

use std::{fs, path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::network::{
    AuthMode, Endpoint, DEFAULT_MAX_RETRY, DEFAULT_TIMEOUT, DEFAULT_UPLOAD_TIMEOUT,
};
use crate::RedfishError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connect: ConnectConfig,
    pub file_server: FileServerConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, RedfishError> {
        let text = fs::read_to_string(path).map_err(|e| {
            RedfishError::ConfigError(format!("could not read {}: {e}", path.display()))
        })?;
        Config::from_toml(&text)
            .map_err(|e| RedfishError::ConfigError(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(text: &str) -> Result<Config, RedfishError> {
        toml::from_str(text).map_err(|e| RedfishError::ConfigError(e.to_string()))
    }
}

/// How to reach and log into the BMC, and which instances to manage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    pub bmc_ip: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub system_id: Option<String>,
    pub manager_id: Option<String>,
    pub chassis_id: Option<String>,
    pub cafile: Option<PathBuf>,
    pub auth: Option<String>,
    pub timeout_secs: Option<u64>,
    pub upload_timeout_secs: Option<u64>,
    pub max_retry: Option<u32>,
}

impl ConnectConfig {
    /// Values set in `overrides` replace the ones in `self`.
    pub fn merge(self, overrides: ConnectConfig) -> ConnectConfig {
        ConnectConfig {
            bmc_ip: overrides.bmc_ip.or(self.bmc_ip),
            port: overrides.port.or(self.port),
            username: overrides.username.or(self.username),
            password: overrides.password.or(self.password),
            system_id: overrides.system_id.or(self.system_id),
            manager_id: overrides.manager_id.or(self.manager_id),
            chassis_id: overrides.chassis_id.or(self.chassis_id),
            cafile: overrides.cafile.or(self.cafile),
            auth: overrides.auth.or(self.auth),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            upload_timeout_secs: overrides.upload_timeout_secs.or(self.upload_timeout_secs),
            max_retry: overrides.max_retry.or(self.max_retry),
        }
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth
            .as_deref()
            .and_then(|a| a.parse().ok())
            .unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn upload_timeout(&self) -> Duration {
        self.upload_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_UPLOAD_TIMEOUT)
    }

    pub fn max_retry(&self) -> u32 {
        self.max_retry.unwrap_or(DEFAULT_MAX_RETRY)
    }

    pub fn endpoint(&self) -> Result<Endpoint, RedfishError> {
        let host = non_empty(&self.bmc_ip)
            .ok_or_else(|| RedfishError::ConfigError("BMC address is not set".to_string()))?;
        Ok(Endpoint {
            host: host.to_string(),
            port: self.port,
        })
    }

    pub fn credentials(&self) -> Result<(&str, &str), RedfishError> {
        let user = non_empty(&self.username)
            .ok_or_else(|| RedfishError::ConfigError("BMC username is not set".to_string()))?;
        let password = self
            .password
            .as_deref()
            .ok_or_else(|| RedfishError::ConfigError("BMC password is not set".to_string()))?;
        Ok((user, password))
    }
}

/// Where firmware images live when the BMC pulls them itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileServerConfig {
    pub protocol: Option<String>,
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub dir: Option<String>,
}

impl FileServerConfig {
    pub fn merge(self, overrides: FileServerConfig) -> FileServerConfig {
        FileServerConfig {
            protocol: overrides.protocol.or(self.protocol),
            ip: overrides.ip.or(self.ip),
            port: overrides.port.or(self.port),
            username: overrides.username.or(self.username),
            password: overrides.password.or(self.password),
            dir: overrides.dir.or(self.dir),
        }
    }

    /// The server address as it goes into an image URI, `ip[:port]`.
    pub fn host(&self) -> Option<String> {
        let ip = non_empty(&self.ip)?;
        Some(match self.port {
            Some(port) => format!("{ip}:{port}"),
            None => ip.to_string(),
        })
    }
}

/// The trimmed value, or `None` when it is unset or blank.
pub(crate) fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
