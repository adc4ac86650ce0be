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
use std::fmt;

use reqwest::StatusCode;

/// Coarse classification of a failure, for callers that only need to know
/// which branch of the error taxonomy they are in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Could not reach or authenticate against the BMC.
    Connectivity,
    /// The BMC answered with a status outside the success family.
    UnexpectedStatus,
    /// No System/Manager/Chassis (or member) matched the requested id.
    Resolution,
    /// An asynchronous task was accepted but ended in a failure state.
    TaskFailure,
    /// The caller supplied something unusable (missing file, bad target...).
    InvalidInput,
    /// The BMC payload did not have the expected shape.
    Protocol,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The kinds of resource the client resolves by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    System,
    Manager,
    Chassis,
    Memory,
    Registry,
    FirmwareInventory,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RedfishError {
    #[error("Network error talking to BMC at {url}. {source}")]
    NetworkError { url: String, source: reqwest::Error },

    #[error("Failed to login to {url}. {message}")]
    LoginFailed { url: String, message: String },

    #[error("HTTP {status_code} at {url}. {message}")]
    HTTPErrorCode {
        url: String,
        status_code: StatusCode,
        body: String,
        message: String,
    },

    #[error("Could not deserialize response from {url}. Body: {body}. {source}")]
    JsonDeserializeError {
        url: String,
        body: String,
        source: serde_json::Error,
    },

    #[error("Could not serialize request body for {url}. Obj: {object_debug}. {source}")]
    JsonSerializeError {
        url: String,
        object_debug: String,
        source: serde_json::Error,
    },

    #[error("Remote returned empty body at {url}")]
    NoContent { url: String },

    #[error("Missing key {key} in JSON at {url}")]
    MissingKey { key: String, url: String },

    #[error("Key {key} should be {expected_type} at {url}")]
    InvalidKeyType {
        key: String,
        expected_type: String,
        url: String,
    },

    #[error("Failed to find the {kind} resource{}", with_id(.id))]
    ResourceNotFound {
        kind: ResourceKind,
        id: Option<String>,
    },

    #[error("Task {task_uri} ended in state {state}. {}", .messages.join(" "))]
    TaskFailed {
        task_uri: String,
        state: String,
        messages: Vec<String>,
    },

    #[error("File error: {0}")]
    FileError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Could not parse XML {path}. {message}")]
    XmlError { path: String, message: String },
}

impl RedfishError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RedfishError::NetworkError { .. } | RedfishError::LoginFailed { .. } => {
                ErrorKind::Connectivity
            }
            RedfishError::HTTPErrorCode { .. } => ErrorKind::UnexpectedStatus,
            RedfishError::ResourceNotFound { .. } => ErrorKind::Resolution,
            RedfishError::TaskFailed { .. } => ErrorKind::TaskFailure,
            RedfishError::FileError(_)
            | RedfishError::InvalidArgument(_)
            | RedfishError::NotSupported(_)
            | RedfishError::ConfigError(_) => ErrorKind::InvalidInput,
            RedfishError::JsonDeserializeError { .. }
            | RedfishError::JsonSerializeError { .. }
            | RedfishError::NoContent { .. }
            | RedfishError::MissingKey { .. }
            | RedfishError::InvalidKeyType { .. }
            | RedfishError::XmlError { .. } => ErrorKind::Protocol,
        }
    }

    /// Builds the error for a non-success response, decoding the DMTF
    /// extended error body when there is one.
    pub fn from_status(url: &str, status_code: StatusCode, body: &str) -> RedfishError {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| extended_error_message(&v))
            .unwrap_or_else(|| body.to_string());
        RedfishError::HTTPErrorCode {
            url: url.to_string(),
            status_code,
            body: body.to_string(),
            message,
        }
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            RedfishError::HTTPErrorCode { status_code, .. } => Some(*status_code),
            RedfishError::NetworkError { source, .. } => source.status(),
            _ => None,
        }
    }
}

fn with_id(id: &Option<String>) -> String {
    match id {
        Some(id) => format!(" with id {id}"),
        None => String::new(),
    }
}

// extended_error_message joins error.@Message.ExtendedInfo[*].Message,
// falling back to error.message.
pub fn extended_error_message(body: &serde_json::Value) -> Option<String> {
    let error = body.get("error")?;
    let extended: Vec<&str> = error
        .get("@Message.ExtendedInfo")
        .and_then(|v| v.as_array())
        .map(|infos| {
            infos
                .iter()
                .filter_map(|info| info.get("Message").and_then(|m| m.as_str()))
                .collect()
        })
        .unwrap_or_default();
    if !extended.is_empty() {
        return Some(extended.join(" "));
    }
    error
        .get("message")
        .and_then(|m| m.as_str())
        .map(|m| m.to_string())
}
