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
use std::{cell::RefCell, collections::HashMap, time::Duration};

use tracing::{error, info_span, Span};

use crate::config::{non_empty, ConnectConfig};
use crate::jsonmap::{self, last_segment, JsonObject};
use crate::network::{AuthMode, RedfishHttpClient, Transport, REDFISH_ENDPOINT};
use crate::task::TaskMonitor;
use crate::{RedfishError, ResourceKind};

/// A Redfish client bound to one BMC and one managed node.
///
/// It owns the transport (and so the session), remembers which System,
/// Manager and Chassis resource it operates on, and exposes the domain
/// operations in the `inventory` and `update` modules.
pub struct Client<T: Transport = RedfishHttpClient> {
    transport: T,
    username: String,
    password: String,
    auth: AuthMode,
    system_id: Option<String>,
    manager_id: Option<String>,
    chassis_id: Option<String>,
    long_connection: bool,
    locators: RefCell<HashMap<ResourceKind, String>>,
    pub(crate) task_monitor: TaskMonitor,
    pub(crate) span: Span,
}

impl Client<RedfishHttpClient> {
    /// Builds an HTTPS client from the connection settings. No request is
    /// sent until `login` or the first operation.
    pub fn connect(config: &ConnectConfig) -> Result<Self, RedfishError> {
        let mut builder = RedfishHttpClient::builder()
            .timeout(config.timeout())
            .upload_timeout(config.upload_timeout())
            .max_retry(config.max_retry());
        if let Some(cafile) = &config.cafile {
            builder = builder.ca_file(cafile);
        }
        let transport = builder.build(config.endpoint()?)?;
        Client::with_transport(transport, config)
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(transport: T, config: &ConnectConfig) -> Result<Self, RedfishError> {
        let (username, password) = config.credentials()?;
        let span = info_span!("redfish", bmc = %transport.base_url());
        Ok(Client {
            username: username.to_string(),
            password: password.to_string(),
            auth: config.auth_mode(),
            system_id: non_empty(&config.system_id).map(str::to_string),
            manager_id: non_empty(&config.manager_id).map(str::to_string),
            chassis_id: non_empty(&config.chassis_id).map(str::to_string),
            long_connection: false,
            locators: RefCell::new(HashMap::new()),
            task_monitor: TaskMonitor::default(),
            transport,
            span,
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth
    }

    /// While enabled `logout` keeps the session, so that several operations
    /// can share it. The caller is then responsible for the final logout.
    pub fn set_long_connection(&mut self, enable: bool) {
        self.long_connection = enable;
    }

    pub fn is_long_connection(&self) -> bool {
        self.long_connection
    }

    pub fn set_task_poll_interval(&mut self, interval: Duration) {
        self.task_monitor = TaskMonitor::new(interval);
    }

    pub fn is_logged_in(&self) -> bool {
        self.transport.session_key().is_some() || self.transport.authorization_key().is_some()
    }

    /// Logs in unless a session token or basic auth key is already held.
    pub fn login(&mut self) -> Result<(), RedfishError> {
        let _span = self.span.clone().entered();
        if self.is_logged_in() {
            return Ok(());
        }
        self.transport
            .login(&self.username, &self.password, self.auth)
            .map_err(|e| {
                error!("Failed to login. {e}");
                e
            })
    }

    /// Ends the session. Does nothing with long connection enabled or when
    /// not logged in. A failed logout is logged and the local credentials
    /// are dropped anyway so a new login is always possible.
    pub fn logout(&mut self) {
        let _span = self.span.clone().entered();
        if self.long_connection || !self.is_logged_in() {
            return;
        }
        if let Err(e) = self.transport.logout() {
            error!("Failed to log out. Error message: {e}");
        }
        self.transport.clear_credentials();
    }

    /// GET `path`, expecting 200 and a JSON object.
    pub fn get_url(&self, path: &str) -> Result<JsonObject, RedfishError> {
        let response = self.transport.get(path)?;
        if response.status != reqwest::StatusCode::OK {
            let e = response.into_error(path);
            error!("Failed to get {path}. Error message: {e}");
            return Err(e);
        }
        let body = response.body.ok_or_else(|| RedfishError::NoContent {
            url: path.to_string(),
        })?;
        jsonmap::into_object(body, path)
    }

    /// GET a collection and every one of its members, in order. The first
    /// member that cannot be fetched fails the whole call.
    pub fn get_collection(&self, path: &str) -> Result<Vec<JsonObject>, RedfishError> {
        let collection = self.get_url(path)?;
        jsonmap::get_links(&collection, "Members", path)?
            .iter()
            .map(|member| self.get_url(member))
            .collect()
    }

    pub fn find_system_resource(&self) -> Result<String, RedfishError> {
        self.find_resource(ResourceKind::System)
    }

    pub fn find_manager_resource(&self) -> Result<String, RedfishError> {
        self.find_resource(ResourceKind::Manager)
    }

    /// Without a configured chassis id this is the chassis linked to a
    /// ComputerSystem, never simply the first member.
    pub fn find_chassis_resource(&self) -> Result<String, RedfishError> {
        self.find_resource(ResourceKind::Chassis)
    }

    fn find_resource(&self, kind: ResourceKind) -> Result<String, RedfishError> {
        if let Some(url) = self.locators.borrow().get(&kind) {
            return Ok(url.clone());
        }
        let found = match kind {
            ResourceKind::System => self.select_member("Systems", self.system_id.as_deref()),
            ResourceKind::Manager => self.select_member("Managers", self.manager_id.as_deref()),
            ResourceKind::Chassis => self.select_chassis(),
            _ => Ok(None),
        };
        let id = match kind {
            ResourceKind::System => self.system_id.clone(),
            ResourceKind::Manager => self.manager_id.clone(),
            ResourceKind::Chassis => self.chassis_id.clone(),
            _ => None,
        };
        match found {
            Ok(Some(url)) => {
                self.locators.borrow_mut().insert(kind, url.clone());
                Ok(url)
            }
            Ok(None) => {
                error!(
                    "Failed to find the {} resource. {} id is {}.",
                    kind.to_string().to_lowercase(),
                    kind,
                    id.as_deref().unwrap_or_default()
                );
                Err(RedfishError::ResourceNotFound { kind, id })
            }
            Err(e) => {
                error!("Failed to find the {} resource. {e}", kind.to_string().to_lowercase());
                Err(e)
            }
        }
    }

    // select_member picks the member whose id matches, or the first member
    // when no id is configured.
    fn select_member(
        &self,
        collection: &str,
        id: Option<&str>,
    ) -> Result<Option<String>, RedfishError> {
        let path = format!("{REDFISH_ENDPOINT}/{collection}");
        let members = jsonmap::get_links(&self.get_url(&path)?, "Members", &path)?;
        Ok(match id {
            None => members.into_iter().next(),
            Some(id) => members.into_iter().find(|m| last_segment(m) == id),
        })
    }

    fn select_chassis(&self) -> Result<Option<String>, RedfishError> {
        let path = format!("{REDFISH_ENDPOINT}/Chassis");
        for chassis in self.get_collection(&path)? {
            let Some(url) = chassis.get("@odata.id").and_then(|v| v.as_str()) else {
                continue;
            };
            let matches = match self.chassis_id.as_deref() {
                Some(id) => last_segment(url) == id,
                // Density and high end servers expose several chassis, the
                // one of interest is linked with a system.
                None => chassis
                    .get("Links")
                    .and_then(|l| l.get("ComputerSystems"))
                    .is_some(),
            };
            if matches {
                return Ok(Some(url.to_string()));
            }
        }
        Ok(None)
    }
}
