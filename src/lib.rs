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

//! Blocking Redfish client for Lenovo servers, covering both XClarity
//! Controller (XCC) and ThinkSystem System Manager (TSM) BMCs.
//!
//! ```no_run
//! use lenovo_redfish::ConnectConfig;
//!
//! let config = ConnectConfig {
//!     bmc_ip: Some("10.0.0.2".to_string()),
//!     username: Some("USERID".to_string()),
//!     password: Some("PASSW0RD".to_string()),
//!     ..Default::default()
//! };
//! let mut client = lenovo_redfish::new(&config)?;
//! client.login()?;
//! let cpus = client.get_cpu_inventory();
//! client.logout();
//! # Ok::<(), lenovo_redfish::RedfishError>(())
//! ```
mod client;
mod config;
mod error;
mod fixid;
mod inventory;
mod network;
mod task;
mod update;

pub mod filter;
pub mod jsonmap;
pub mod model;

pub use client::Client;
pub use config::{Config, ConnectConfig, FileServerConfig};
pub use error::{extended_error_message, ErrorKind, RedfishError, ResourceKind};
pub use filter::PropertyFilter;
pub use fixid::{firmware_target, FirmwareRole, FixIdInfo, FixIdUpdate};
pub use inventory::BiosAttributeSource;
pub use jsonmap::JsonObject;
pub use model::{SystemPowerControl, TransferProtocol};
pub use network::{
    to_resource_path, AuthMode, Endpoint, PartContent, RawResponse, RedfishHttpClient,
    RedfishHttpClientBuilder, Transport, UploadPart, REDFISH_ENDPOINT,
};
pub use reqwest::StatusCode;
pub use task::{TaskMonitor, DEFAULT_POLL_INTERVAL};
pub use update::{image_uri, BmcFamily, FirmwareUpdate, UpdateOutcome, UPDATE_SERVICE_PATH};

/// Client over HTTPS for the BMC described by `config`.
pub fn new(config: &ConnectConfig) -> Result<Client, RedfishError> {
    Client::connect(config)
}
