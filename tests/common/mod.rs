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

//! A scripted BMC for the integration tests.
//!
//! Routes are keyed by method and path and answer from a queue. The last
//! queued response is sticky so that a route can be polled any number of
//! times, unrouted requests get 404. Every request is recorded.
#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    path::Path,
};

use lenovo_redfish::{
    to_resource_path, AuthMode, Client, ConnectConfig, RawResponse, RedfishError, StatusCode,
    Transport, UploadPart,
};
use serde_json::{json, Value};

pub const BASE_URL: &str = "https://bmc.test";

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
    pub etag: Option<String>,
    /// Part names of a multipart upload, or the file of a binary push.
    pub upload: Vec<String>,
}

#[derive(Default)]
pub struct MockTransport {
    routes: RefCell<HashMap<(&'static str, String), VecDeque<RawResponse>>>,
    calls: RefCell<Vec<Call>>,
    session: Option<String>,
    authorization: Option<String>,
    fail_login: bool,
    fail_logout: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport::default()
    }

    pub fn failing_login() -> Self {
        MockTransport {
            fail_login: true,
            ..MockTransport::default()
        }
    }

    pub fn failing_logout() -> Self {
        MockTransport {
            fail_logout: true,
            ..MockTransport::default()
        }
    }

    /// Queues `response` for `method path`.
    pub fn on(&self, method: &'static str, path: &str, response: RawResponse) -> &Self {
        self.routes
            .borrow_mut()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
        self
    }

    pub fn on_get(&self, path: &str, body: Value) -> &Self {
        self.on("GET", path, RawResponse::json(StatusCode::OK, body))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn calls_to(&self, method: &str, path: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    /// Requests other than GET, in order.
    pub fn writes(&self) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.method != "GET")
            .cloned()
            .collect()
    }

    fn answer(
        &self,
        method: &'static str,
        path: &str,
        body: Option<&Value>,
        etag: Option<&str>,
        upload: Vec<String>,
    ) -> Result<RawResponse, RedfishError> {
        let path = to_resource_path(path);
        self.calls.borrow_mut().push(Call {
            method,
            path: path.clone(),
            body: body.cloned(),
            etag: etag.map(str::to_string),
            upload,
        });
        let mut routes = self.routes.borrow_mut();
        let response = match routes.get_mut(&(method, path.clone())) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(response.unwrap_or_else(|| {
            RawResponse::json(
                StatusCode::NOT_FOUND,
                json!({"error": {"code": "Base.1.8.ResourceMissingAtURI", "message": format!("{path} not found")}}),
            )
        }))
    }

    fn record(&self, method: &'static str, path: &str) {
        self.calls.borrow_mut().push(Call {
            method,
            path: path.to_string(),
            body: None,
            etag: None,
            upload: Vec::new(),
        });
    }
}

impl Transport for MockTransport {
    fn base_url(&self) -> &str {
        BASE_URL
    }

    fn get(&self, path: &str) -> Result<RawResponse, RedfishError> {
        self.answer("GET", path, None, None, Vec::new())
    }

    fn post(&self, path: &str, body: &Value) -> Result<RawResponse, RedfishError> {
        self.answer("POST", path, Some(body), None, Vec::new())
    }

    fn patch(
        &self,
        path: &str,
        body: &Value,
        etag: Option<&str>,
    ) -> Result<RawResponse, RedfishError> {
        self.answer("PATCH", path, Some(body), etag, Vec::new())
    }

    fn delete(&self, path: &str) -> Result<RawResponse, RedfishError> {
        self.answer("DELETE", path, None, None, Vec::new())
    }

    fn post_binary(&self, path: &str, image: &Path) -> Result<RawResponse, RedfishError> {
        self.answer("POST", path, None, None, vec![image.display().to_string()])
    }

    fn post_multipart(
        &self,
        path: &str,
        parts: &[UploadPart],
    ) -> Result<RawResponse, RedfishError> {
        let names = parts.iter().map(|p| p.name.clone()).collect();
        self.answer("POST", path, None, None, names)
    }

    fn login(&mut self, username: &str, _password: &str, auth: AuthMode) -> Result<(), RedfishError> {
        self.record("LOGIN", username);
        if self.fail_login {
            return Err(RedfishError::LoginFailed {
                url: format!("{BASE_URL}/redfish/v1/SessionService/Sessions"),
                message: "HTTP 401 Unauthorized".to_string(),
            });
        }
        match auth {
            AuthMode::Session => self.session = Some("token-1".to_string()),
            AuthMode::Basic => self.authorization = Some("Basic dXNlcjpwYXNz".to_string()),
        }
        Ok(())
    }

    fn logout(&mut self) -> Result<(), RedfishError> {
        self.record("LOGOUT", "/redfish/v1/SessionService/Sessions/1");
        if self.fail_logout {
            return Err(RedfishError::NoContent {
                url: "/redfish/v1/SessionService/Sessions/1".to_string(),
            });
        }
        self.session = None;
        self.authorization = None;
        Ok(())
    }

    fn session_key(&self) -> Option<&str> {
        self.session.as_deref()
    }

    fn authorization_key(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    fn clear_credentials(&mut self) {
        self.session = None;
        self.authorization = None;
    }
}

pub fn connect_config() -> ConnectConfig {
    ConnectConfig {
        bmc_ip: Some("bmc.test".to_string()),
        username: Some("USERID".to_string()),
        password: Some("PASSW0RD".to_string()),
        ..Default::default()
    }
}

/// A client over `transport` that polls tasks without sleeping.
pub fn client(transport: MockTransport) -> Client<MockTransport> {
    client_with(transport, &connect_config())
}

pub fn client_with(transport: MockTransport, config: &ConnectConfig) -> Client<MockTransport> {
    let mut client = Client::with_transport(transport, config).expect("valid test config");
    client.set_task_poll_interval(std::time::Duration::ZERO);
    client
}

pub fn collection(members: &[&str]) -> Value {
    let members: Vec<Value> = members.iter().map(|m| json!({ "@odata.id": m })).collect();
    json!({ "Members@odata.count": members.len(), "Members": members })
}

/// Systems/1, Managers/1 and Chassis/1 (linked to the system).
pub fn single_node(mock: &MockTransport) {
    mock.on_get("/redfish/v1/Systems", collection(&["/redfish/v1/Systems/1"]));
    mock.on_get("/redfish/v1/Managers", collection(&["/redfish/v1/Managers/1"]));
    mock.on_get("/redfish/v1/Chassis", collection(&["/redfish/v1/Chassis/1"]));
    mock.on_get(
        "/redfish/v1/Chassis/1",
        json!({
            "@odata.id": "/redfish/v1/Chassis/1",
            "Id": "1",
            "Links": {"ComputerSystems": [{"@odata.id": "/redfish/v1/Systems/1"}]}
        }),
    );
}

pub fn task(state: &str, percent: u32) -> RawResponse {
    RawResponse::json(
        StatusCode::OK,
        json!({
            "@odata.id": "/redfish/v1/TaskService/Tasks/5",
            "Id": "5",
            "Name": "Firmware update",
            "TaskState": state,
            "PercentComplete": percent,
            "Messages": []
        }),
    )
}
