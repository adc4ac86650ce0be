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

// update.rs
// Firmware inventory and firmware update. Two BMC families are handled:
// XClarity Controller (XCC), which advertises HttpPushUri and also
// accepts SimpleUpdate from a file server, and ThinkSystem System Manager
// (TSM), which only takes a multipart upload.

use std::{
    env,
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::client::Client;
use crate::config::non_empty;
use crate::filter::PropertyFilter;
use crate::jsonmap::{self, JsonObject};
use crate::model::update_service::{
    FlashType, OemParameters, SimpleUpdateRequest, UpdateParameters,
};
use crate::model::{TransferProtocol, UpdateService};
use crate::network::{to_resource_path, PartContent, RawResponse, Transport, UploadPart};
use crate::RedfishError;

pub const UPDATE_SERVICE_PATH: &str = "/redfish/v1/UpdateService";
pub const BMC_BACKUP_TARGET: &str = "/redfish/v1/UpdateService/FirmwareInventory/BMC-Backup";

/// Which firmware update procedure the BMC speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BmcFamily {
    /// XClarity Controller: HttpPushUri and SimpleUpdate.
    Xcc,
    /// ThinkSystem System Manager: MultipartHttpPushUri only.
    Tsm,
}

impl BmcFamily {
    pub fn detect(service: &UpdateService) -> Self {
        if service.http_push_uri.is_some() {
            BmcFamily::Xcc
        } else {
            BmcFamily::Tsm
        }
    }
}

/// Target of a TSM multipart update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TsmTarget {
    Bmc,
    Uefi,
}

/// What to flash and where the image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareUpdate {
    /// Image file name.
    pub image: String,
    /// XCC: "BMC-Backup" or nothing. TSM: "BMC" or "UEFI".
    pub target: Option<String>,
    pub protocol: TransferProtocol,
    pub fs_ip: Option<String>,
    /// Local directory for HTTPPUSH, directory on the file server otherwise.
    pub fs_dir: Option<String>,
    pub fs_username: Option<String>,
    pub fs_password: Option<String>,
}

impl FirmwareUpdate {
    /// Upload of a local image.
    pub fn http_push(image: impl Into<String>, fs_dir: Option<String>) -> Self {
        FirmwareUpdate {
            image: image.into(),
            target: None,
            protocol: TransferProtocol::HttpPush,
            fs_ip: None,
            fs_dir,
            fs_username: None,
            fs_password: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Successful end of a firmware update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UpdateOutcome {
    /// The update finished, synchronously or through a completed task.
    Completed { message: String },
    /// A BMC image was accepted. The BMC restarts to apply it and drops
    /// the session, so the task is not followed.
    AwaitingBmcRestart {
        message: String,
        task_uri: Option<String>,
    },
}

impl UpdateOutcome {
    pub fn message(&self) -> &str {
        match self {
            UpdateOutcome::Completed { message } => message,
            UpdateOutcome::AwaitingBmcRestart { message, .. } => message,
        }
    }
}

impl<T: Transport> Client<T> {
    pub fn get_firmware_inventory(&self) -> Result<Vec<JsonObject>, RedfishError> {
        let _span = self.span.enter();
        let service = self.get_url(UPDATE_SERVICE_PATH)?;
        let inventory = jsonmap::get_link(&service, "FirmwareInventory", UPDATE_SERVICE_PATH)?;
        self.filtered_collection(inventory, &PropertyFilter::common())
    }

    pub fn update_firmware(&self, request: &FirmwareUpdate) -> Result<UpdateOutcome, RedfishError> {
        let _span = self.span.enter();
        let service: UpdateService = self
            .transport()
            .get(UPDATE_SERVICE_PATH)
            .and_then(|r| {
                if r.status == reqwest::StatusCode::OK {
                    r.deserialize(UPDATE_SERVICE_PATH)
                } else {
                    Err(r.into_error(UPDATE_SERVICE_PATH))
                }
            })
            .map_err(|e| {
                error!("Failed to get {UPDATE_SERVICE_PATH}. Error message: {e}");
                e
            })?;
        let result = match BmcFamily::detect(&service) {
            BmcFamily::Xcc => {
                let target = request
                    .target
                    .as_deref()
                    .filter(|t| t.eq_ignore_ascii_case("BMC-Backup"))
                    .map(|_| BMC_BACKUP_TARGET);
                match request.protocol {
                    TransferProtocol::HttpPush => self.xcc_http_push(&service, target, request),
                    TransferProtocol::SFTP | TransferProtocol::TFTP => {
                        self.xcc_simple_update(&service, target, request)
                    }
                }
            }
            BmcFamily::Tsm => self.tsm_multipart(&service, request),
        };
        if let Err(e) = &result {
            error!("Failed to update '{}'. {e}", request.image);
        }
        result
    }

    fn xcc_http_push(
        &self,
        service: &UpdateService,
        target: Option<&str>,
        request: &FirmwareUpdate,
    ) -> Result<UpdateOutcome, RedfishError> {
        let file = local_image(request, true)?;
        let push_uri = service.http_push_uri.as_deref().unwrap_or_default();

        // A non-primary target is selected through HttpPushUriTargets.
        if let Some(t) = target {
            let response = self.transport().patch(
                UPDATE_SERVICE_PATH,
                &json!({"HttpPushUriTargets": [t]}),
                None,
            )?;
            if !matches!(response.status.as_u16(), 200 | 204) {
                return Err(response.into_error(UPDATE_SERVICE_PATH));
            }
        }

        let upload = self.transport().post_binary(push_uri, &file);

        // The target stays set until the BMC restarts and would apply to
        // the next update too, so it is always cleared.
        if target.is_some() {
            match self.transport().patch(
                UPDATE_SERVICE_PATH,
                &json!({"HttpPushUriTargets": []}),
                None,
            ) {
                Ok(r) if matches!(r.status.as_u16(), 200 | 204) => {}
                Ok(r) => error!(
                    "Failed to clear target '{}'. {}",
                    BMC_BACKUP_TARGET,
                    r.into_error(UPDATE_SERVICE_PATH)
                ),
                Err(e) => error!("Failed to clear target '{BMC_BACKUP_TARGET}'. {e}"),
            }
        }

        self.finish_update(upload?, push_uri, &request.image)
    }

    fn xcc_simple_update(
        &self,
        service: &UpdateService,
        target: Option<&str>,
        request: &FirmwareUpdate,
    ) -> Result<UpdateOutcome, RedfishError> {
        let action = service
            .simple_update_target()
            .ok_or_else(|| RedfishError::MissingKey {
                key: "Actions.#UpdateService.SimpleUpdate.target".to_string(),
                url: UPDATE_SERVICE_PATH.to_string(),
            })?;
        let fs_ip = non_empty(&request.fs_ip).ok_or_else(|| {
            RedfishError::InvalidArgument(format!(
                "File server ip is required for {}.",
                request.protocol
            ))
        })?;
        let body = SimpleUpdateRequest {
            image_uri: image_uri(fs_ip, request.fs_dir.as_deref(), &request.image),
            targets: target.map(|t| vec![t.to_string()]),
            transfer_protocol: request.protocol,
            username: non_empty(&request.fs_username).map(str::to_string),
            password: non_empty(&request.fs_password).map(str::to_string),
        };
        let body = serde_json::to_value(&body).map_err(|e| RedfishError::JsonSerializeError {
            url: action.to_string(),
            object_debug: format!("{body:?}"),
            source: e,
        })?;
        let response = self.transport().post(action, &body)?;
        self.finish_update(response, action, &request.image)
    }

    fn tsm_multipart(
        &self,
        service: &UpdateService,
        request: &FirmwareUpdate,
    ) -> Result<UpdateOutcome, RedfishError> {
        let multipart_uri = match (&service.multipart_http_push_uri, request.protocol) {
            (Some(uri), TransferProtocol::HttpPush) => uri.as_str(),
            _ => {
                return Err(RedfishError::NotSupported(
                    "This product only supports HTTPPUSH protocol.".to_string(),
                ))
            }
        };
        let target = match request.target.as_deref().map(str::to_uppercase).as_deref() {
            Some("BMC") => TsmTarget::Bmc,
            Some("UEFI") => TsmTarget::Uefi,
            _ => {
                return Err(RedfishError::InvalidArgument(
                    "You must specify the target: BMC or UEFI.".to_string(),
                ))
            }
        };
        let file = local_image(request, false)?;
        let manager = self.find_manager_resource()?;

        let parameters = UpdateParameters {
            targets: vec![manager],
        };
        let oem_parameters = OemParameters {
            flash_type: match target {
                TsmTarget::Bmc => FlashType::HpmFwUpdate,
                TsmTarget::Uefi => FlashType::UefiUpdate,
            },
            upload_selector: "Default".to_string(),
        };
        let parts = vec![
            json_part("UpdateParameters", "parameters.json", &parameters, multipart_uri)?,
            json_part("OemParameters", "oem_parameters.json", &oem_parameters, multipart_uri)?,
            UploadPart::file("UpdateFile", &file),
        ];
        info!("Start to upload the image, may take about 3~10 minutes...");
        let response = self.transport().post_multipart(multipart_uri, &parts)?;
        if !matches!(response.status.as_u16(), 200 | 202 | 204) {
            return Err(response.into_error(multipart_uri));
        }
        let task_uri = task_uri(&response);
        match target {
            TsmTarget::Bmc => {
                if let Some(uri) = &task_uri {
                    info!("BMC update task is: {uri}.");
                }
                Ok(UpdateOutcome::AwaitingBmcRestart {
                    message: format!(
                        "Succeed to update bmc. Image is '{}'. Wait about 5 minutes for bmc to restart.",
                        request.image
                    ),
                    task_uri,
                })
            }
            TsmTarget::Uefi => {
                let uri = task_uri.ok_or_else(|| RedfishError::MissingKey {
                    key: "Location".to_string(),
                    url: multipart_uri.to_string(),
                })?;
                self.monitor_update(&uri, &request.image)
            }
        }
    }

    // finish_update interprets the answer to an update request: done,
    // running as a task, or rejected.
    fn finish_update(
        &self,
        response: RawResponse,
        url: &str,
        image: &str,
    ) -> Result<UpdateOutcome, RedfishError> {
        match response.status.as_u16() {
            200 | 204 => Ok(UpdateOutcome::Completed {
                message: "Succeed to update the firmware.".to_string(),
            }),
            202 => {
                let uri = task_uri(&response).ok_or_else(|| RedfishError::MissingKey {
                    key: "@odata.id".to_string(),
                    url: url.to_string(),
                })?;
                self.monitor_update(&uri, image)
            }
            _ => Err(response.into_error(url)),
        }
    }

    fn monitor_update(&self, task_uri: &str, image: &str) -> Result<UpdateOutcome, RedfishError> {
        info!("Start to refresh the firmware, please wait about 3~10 minutes...");
        self.task_monitor.wait_and_delete(self.transport(), task_uri)?;
        Ok(UpdateOutcome::Completed {
            message: format!("Succeed to update the firmware. Image is '{image}'."),
        })
    }
}

// task_uri takes the task link from the body, falling back to Location.
pub(crate) fn task_uri(response: &RawResponse) -> Option<String> {
    response
        .body
        .as_ref()
        .and_then(|b| b.get("@odata.id"))
        .and_then(|id| id.as_str())
        .or(response.location.as_deref())
        .map(to_resource_path)
}

// local_image resolves the image in fs_dir, or in the working directory
// when no directory is given.
fn local_image(request: &FirmwareUpdate, check_dir: bool) -> Result<PathBuf, RedfishError> {
    let dir = match non_empty(&request.fs_dir) {
        Some(dir) => {
            let dir = Path::new(dir);
            if check_dir && !dir.is_dir() {
                return Err(RedfishError::InvalidArgument(format!(
                    "The path '{}' doesn't exist, please check if 'fsdir' is correct.",
                    dir.display()
                )));
            }
            dir.to_path_buf()
        }
        None => env::current_dir()
            .map_err(|e| RedfishError::FileError(format!("no working directory: {e}")))?,
    };
    let file = dir.join(&request.image);
    if !file.exists() {
        return Err(RedfishError::FileError(format!(
            "File '{}' does not exist.",
            file.display()
        )));
    }
    Ok(file)
}

// image_uri builds the file server location: ip, directory without
// surrounding slashes, image.
pub fn image_uri(fs_ip: &str, fs_dir: Option<&str>, image: &str) -> String {
    match fs_dir.map(|d| d.trim_matches('/')).filter(|d| !d.is_empty()) {
        Some(dir) => format!("{fs_ip}/{dir}/{image}"),
        None => format!("{fs_ip}/{image}"),
    }
}

fn json_part<S: Serialize + std::fmt::Debug>(
    name: &str,
    file_name: &str,
    value: &S,
    url: &str,
) -> Result<UploadPart, RedfishError> {
    let content: Value =
        serde_json::to_value(value).map_err(|e| RedfishError::JsonSerializeError {
            url: url.to_string(),
            object_debug: format!("{value:?}"),
            source: e,
        })?;
    Ok(UploadPart {
        name: name.to_string(),
        file_name: Some(file_name.to_string()),
        content_type: "application/json".to_string(),
        content: PartContent::Bytes(content.to_string().into_bytes()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_uri() {
        assert_eq!(
            image_uri("10.0.0.2", Some("/fw/xcc/"), "lnvgy_fw_xcc.uxz"),
            "10.0.0.2/fw/xcc/lnvgy_fw_xcc.uxz"
        );
        assert_eq!(image_uri("10.0.0.2", Some("fw"), "a.bin"), "10.0.0.2/fw/a.bin");
        assert_eq!(image_uri("10.0.0.2", None, "a.bin"), "10.0.0.2/a.bin");
        assert_eq!(image_uri("10.0.0.2", Some("/"), "a.bin"), "10.0.0.2/a.bin");
    }

    #[test]
    fn test_detect_family() {
        let xcc = UpdateService {
            http_push_uri: Some("/mfwupdate".to_string()),
            ..Default::default()
        };
        assert_eq!(BmcFamily::detect(&xcc), BmcFamily::Xcc);
        let tsm = UpdateService {
            multipart_http_push_uri: Some("/redfish/v1/UpdateService/upload".to_string()),
            ..Default::default()
        };
        assert_eq!(BmcFamily::detect(&tsm), BmcFamily::Tsm);
    }

    #[test]
    fn test_task_uri_prefers_body() {
        let r = RawResponse::json(
            reqwest::StatusCode::ACCEPTED,
            json!({"@odata.id": "/redfish/v1/TaskService/Tasks/5"}),
        )
        .with_location("https://10.0.0.1/redfish/v1/TaskService/Tasks/6");
        assert_eq!(task_uri(&r).as_deref(), Some("/redfish/v1/TaskService/Tasks/5"));
        let r = RawResponse::empty(reqwest::StatusCode::ACCEPTED)
            .with_location("https://10.0.0.1/redfish/v1/TaskService/Tasks/6");
        assert_eq!(task_uri(&r).as_deref(), Some("/redfish/v1/TaskService/Tasks/6"));
    }

    #[test]
    fn test_local_image_missing_dir() {
        let request = FirmwareUpdate::http_push("a.bin", Some("/does/not/exist".to_string()));
        assert!(matches!(
            local_image(&request, true),
            Err(RedfishError::InvalidArgument(_))
        ));
        assert!(matches!(
            local_image(&request, false),
            Err(RedfishError::FileError(_))
        ));
    }
}
