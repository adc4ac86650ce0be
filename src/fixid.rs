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

// fixid.rs
// Lenovo UpdateXpress packages ship each firmware payload with a <fixid>.xml
// descriptor: category, version, payload file name, and the fix ids it
// requires to be installed first. This module reads those descriptors,
// checks the prerequisites against the BMC's firmware inventory and runs
// the SimpleUpdate for the payload.

use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use serde::Serialize;
use tracing::{error, info};
use version_compare::Cmp;

use crate::client::Client;
use crate::jsonmap;
use crate::model::update_service::SimpleUpdateRequest;
use crate::model::{InvalidValueError, ServiceRoot, TransferProtocol, UpdateService};
use crate::network::{Transport, REDFISH_ENDPOINT};
use crate::update::{image_uri, task_uri, UpdateOutcome};
use crate::{RedfishError, ResourceKind};

/// What a fix-id descriptor says about its payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixIdInfo {
    pub category: Option<String>,
    pub version: String,
    pub payload: Option<String>,
    pub xml_filename: Option<String>,
    pub build_number: Option<String>,
    pub prereqs: Vec<String>,
    pub machine_types: Vec<String>,
}

impl FixIdInfo {
    /// Reads `<dir>/<fixid>.xml`.
    pub fn from_file(dir: &Path, fixid: &str) -> Result<FixIdInfo, RedfishError> {
        let path = dir.join(format!("{fixid}.xml"));
        if !path.is_file() {
            return Err(RedfishError::FileError(format!(
                "The firmware xml {} doesn't exist, please download the firmware xml file.",
                path.display()
            )));
        }
        let xml = fs::read_to_string(&path)
            .map_err(|e| RedfishError::FileError(format!("{}: {e}", path.display())))?;
        FixIdInfo::parse(&xml, &path.display().to_string())
    }

    /// `origin` only names the document in errors.
    pub fn parse(xml: &str, origin: &str) -> Result<FixIdInfo, RedfishError> {
        let xml_error = |message: String| RedfishError::XmlError {
            path: origin.to_string(),
            message,
        };
        let machine_type_re = Regex::new(r"\[(.*?)\]").map_err(|e| xml_error(e.to_string()))?;

        let mut reader = Reader::from_str(xml);
        let mut properties: HashMap<String, String> = HashMap::new();
        let mut info = FixIdInfo::default();
        // NAME of the enclosing PROPERTY / PROPERTY.ARRAY, text of the open VALUE.
        let mut property: Option<String> = None;
        let mut array: Option<String> = None;
        let mut value: Option<String> = None;

        loop {
            match reader.read_event() {
                Err(e) => {
                    return Err(xml_error(format!(
                        "error at position {}: {e}",
                        reader.buffer_position()
                    )))
                }
                Ok(Event::Eof) => break,
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"PROPERTY" => property = name_attribute(&e),
                    b"PROPERTY.ARRAY" => array = name_attribute(&e),
                    b"VALUE" => value = Some(String::new()),
                    _ => {}
                },
                Ok(Event::Text(t)) => {
                    if let Some(v) = value.as_mut() {
                        let text = t.unescape().map_err(|e| xml_error(e.to_string()))?;
                        v.push_str(&text);
                    }
                }
                Ok(Event::CData(c)) => {
                    if let Some(v) = value.as_mut() {
                        v.push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"VALUE" => {
                        let Some(text) = value.take() else { continue };
                        let text = text.trim();
                        if let Some(name) = &array {
                            if name.contains("preReq") {
                                info.prereqs.push(text.to_string());
                            } else if name.contains("applicableMachineTypes") {
                                info.machine_types.extend(
                                    machine_type_re
                                        .captures_iter(text)
                                        .map(|c| c[1].to_string()),
                                );
                            }
                        } else if let Some(name) = &property {
                            properties.insert(name.clone(), text.to_string());
                        }
                    }
                    b"PROPERTY" => property = None,
                    b"PROPERTY.ARRAY" => array = None,
                    _ => {}
                },
                Ok(_) => {}
            }
        }

        let version = properties
            .remove("Version")
            .ok_or_else(|| xml_error("no Version property".to_string()))?;
        // "<build> <version>", e.g. "TEI3B6M 4.20"
        let mut tokens = version.split_whitespace();
        info.version = match (tokens.next(), tokens.next()) {
            (_, Some(v)) | (Some(v), None) => v.to_string(),
            (None, None) => return Err(xml_error("empty Version property".to_string())),
        };
        info.category = properties.remove("category");
        info.payload = properties.remove("payload");
        info.xml_filename = properties.remove("xmlFilename");
        info.build_number = properties.remove("buildNumber");
        Ok(info)
    }
}

fn name_attribute(e: &BytesStart) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"NAME")
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Which copy of a dual-image firmware to flash.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareRole {
    #[default]
    Primary,
    Backup,
}

impl FromStr for FirmwareRole {
    type Err = InvalidValueError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "backup" => Ok(Self::Backup),
            x => Err(InvalidValueError(format!(
                "Invalid firmware role {x}, use Primary or Backup"
            ))),
        }
    }
}

impl fmt::Display for FirmwareRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// FirmwareInventory member that holds the running version of a payload
/// category.
pub fn firmware_target(category: &str, role: FirmwareRole) -> Option<&'static str> {
    match category.to_uppercase().as_str() {
        "UEFI" => Some("UEFI"),
        "LXPM" => Some("LXPM"),
        "DRVLN" => Some("LXPMLinuxDriver1"),
        "DRVWN" => Some("LXPMWindowsDriver1"),
        "IMM" | "XCC" => Some(match role {
            FirmwareRole::Primary => "BMC-Primary",
            FirmwareRole::Backup => "BMC-Backup",
        }),
        _ => None,
    }
}

/// A fix-id based update: descriptors are read from `local_path`, the
/// payload itself must already be on the file server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixIdUpdate {
    pub fixid: String,
    pub local_path: PathBuf,
    pub firmware_role: FirmwareRole,
    pub protocol: TransferProtocol,
    pub fs_ip: String,
    pub fs_username: Option<String>,
    pub fs_password: Option<String>,
    pub fs_dir: Option<String>,
}

impl<T: Transport> Client<T> {
    fn update_service(&self) -> Result<(String, UpdateService), RedfishError> {
        let root: ServiceRoot = self.get_model(REDFISH_ENDPOINT)?;
        let path = root
            .update_service
            .map(|u| u.odata_id)
            .ok_or_else(|| RedfishError::MissingKey {
                key: "UpdateService".to_string(),
                url: REDFISH_ENDPOINT.to_string(),
            })?;
        let service = self.get_model(&path)?;
        Ok((path, service))
    }

    fn get_model<M: serde::de::DeserializeOwned>(&self, path: &str) -> Result<M, RedfishError> {
        let response = self.transport().get(path)?;
        if response.status != reqwest::StatusCode::OK {
            return Err(response.into_error(path));
        }
        response.deserialize(path)
    }

    /// Version string of one FirmwareInventory member.
    pub fn firmware_version(&self, inventory: &str, target: &str) -> Result<String, RedfishError> {
        let path = format!("{}/{target}", inventory.trim_end_matches('/'));
        let entry = self.get_url(&path).map_err(|e| match e {
            RedfishError::HTTPErrorCode { status_code, .. } if status_code.as_u16() == 404 => {
                RedfishError::ResourceNotFound {
                    kind: ResourceKind::FirmwareInventory,
                    id: Some(target.to_string()),
                }
            }
            e => e,
        })?;
        Ok(jsonmap::get_str(&entry, "Version", &path)?.to_string())
    }

    /// Every prerequisite must already run at least its descriptor version.
    pub fn check_prerequisites(&self, prereqs: &[FixIdInfo]) -> Result<(), RedfishError> {
        if prereqs.is_empty() {
            return Ok(());
        }
        let _span = self.span.enter();
        let (path, service) = self.update_service()?;
        let inventory = service
            .firmware_inventory
            .map(|i| i.odata_id)
            .ok_or_else(|| RedfishError::MissingKey {
                key: "FirmwareInventory".to_string(),
                url: path,
            })?;
        for prereq in prereqs {
            let category = prereq.category.as_deref().unwrap_or_default();
            let target = firmware_target(category, FirmwareRole::Primary).ok_or_else(|| {
                RedfishError::NotSupported(format!(
                    "Cannot check prerequisite of category '{category}'"
                ))
            })?;
            let current = self.firmware_version(&inventory, target)?;
            match version_compare::compare_to(&current, &prereq.version, Cmp::Ge) {
                Ok(true) => {}
                Ok(false) => {
                    return Err(RedfishError::InvalidArgument(format!(
                        "Please update firmware {} to {}",
                        category.to_uppercase(),
                        prereq.version
                    )))
                }
                Err(()) => {
                    return Err(RedfishError::InvalidArgument(format!(
                        "Cannot compare {category} version {current} with {}",
                        prereq.version
                    )))
                }
            }
        }
        Ok(())
    }

    /// Updates the firmware described by `<local_path>/<fixid>.xml` from the
    /// file server, after checking its prerequisites.
    pub fn update_firmware_by_fixid(
        &self,
        request: &FixIdUpdate,
    ) -> Result<UpdateOutcome, RedfishError> {
        if request.protocol == TransferProtocol::HttpPush {
            return Err(RedfishError::InvalidArgument(
                "Fix id updates are pulled by the BMC, use SFTP or TFTP.".to_string(),
            ));
        }
        if !request.local_path.exists() {
            return Err(RedfishError::FileError(
                "The local path doesn't exist.".to_string(),
            ));
        }
        let info = FixIdInfo::from_file(&request.local_path, &request.fixid)?;
        let mut prereqs = Vec::with_capacity(info.prereqs.len());
        for pre_req in &info.prereqs {
            let prereq = FixIdInfo::from_file(&request.local_path, pre_req).map_err(|_| {
                RedfishError::FileError(format!(
                    "The prerequest xml file doesn't exist, please download the {pre_req}."
                ))
            })?;
            prereqs.push(prereq);
        }
        let category = info.category.clone().ok_or_else(|| RedfishError::XmlError {
            path: format!("{}.xml", request.fixid),
            message: "no category property".to_string(),
        })?;
        let payload = info.payload.clone().ok_or_else(|| RedfishError::XmlError {
            path: format!("{}.xml", request.fixid),
            message: "no payload property".to_string(),
        })?;

        let _span = self.span.enter();
        let (service_path, service) = self.update_service()?;
        let action = service
            .simple_update_target()
            .ok_or_else(|| RedfishError::MissingKey {
                key: "Actions.#UpdateService.SimpleUpdate.target".to_string(),
                url: service_path.clone(),
            })?
            .to_string();
        let inventory = service
            .firmware_inventory
            .as_ref()
            .map(|i| i.odata_id.clone())
            .ok_or_else(|| RedfishError::MissingKey {
                key: "FirmwareInventory".to_string(),
                url: service_path.clone(),
            })?;
        let target = firmware_target(&category, request.firmware_role).ok_or_else(|| {
            RedfishError::NotSupported(format!("Unsupported firmware category '{category}'"))
        })?;
        let current_version = self.firmware_version(&inventory, target)?;

        self.check_prerequisites(&prereqs).map_err(|e| {
            error!("Update the firmware failed, please check the pre request version. {e}");
            e
        })?;

        info!(
            "The firmware version will be updated from {current_version} to {}.",
            info.version
        );
        let location = image_uri(&request.fs_ip, request.fs_dir.as_deref(), &payload);
        let credentials = match (&request.fs_username, &request.fs_password) {
            (Some(u), Some(p)) if !u.is_empty() => format!("{u}:{p}@"),
            (Some(u), _) if !u.is_empty() => format!("{u}@"),
            _ => String::new(),
        };
        let body = SimpleUpdateRequest {
            image_uri: format!(
                "{}://{credentials}{location}",
                request.protocol.to_string().to_lowercase()
            ),
            targets: Some(vec![format!(
                "{}{}/{target}",
                self.transport().base_url(),
                inventory.trim_end_matches('/')
            )]),
            transfer_protocol: request.protocol,
            username: None,
            password: None,
        };
        let body = serde_json::to_value(&body).map_err(|e| RedfishError::JsonSerializeError {
            url: action.clone(),
            object_debug: "SimpleUpdateRequest".to_string(),
            source: e,
        })?;
        let response = self.transport().post(&action, &body)?;
        if response.status.as_u16() != 202 {
            return Err(response.into_error(&action));
        }
        let task_uri = task_uri(&response).ok_or_else(|| RedfishError::MissingKey {
            key: "@odata.id".to_string(),
            url: action.clone(),
        })?;
        self.task_monitor.wait_and_delete(self.transport(), &task_uri)?;

        let firmware_type = match request.firmware_role {
            FirmwareRole::Primary => category,
            FirmwareRole::Backup => format!("{category}-{}", request.firmware_role),
        };
        Ok(UpdateOutcome::Completed {
            message: format!(
                "Update firmware({firmware_type}) [{current_version} to {}] successfully",
                info.version
            ),
        })
    }
}
