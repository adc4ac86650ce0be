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
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::model::{InvalidValueError, ODataId};

/// https://redfish.dmtf.org/schemas/v1/UpdateService.v1_14_0.json
/// Service for Software Update
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(rename_all = "PascalCase", default)]
pub struct UpdateService {
    pub http_push_uri: Option<String>,
    pub http_push_uri_targets: Option<Vec<String>>,
    pub multipart_http_push_uri: Option<String>,
    pub max_image_size_bytes: Option<i64>,
    pub firmware_inventory: Option<ODataId>,
    pub actions: Option<UpdateServiceActions>,
}

impl UpdateService {
    pub fn simple_update_target(&self) -> Option<&str> {
        self.actions
            .as_ref()
            .and_then(|a| a.simple_update.as_ref())
            .map(|s| s.target.as_str())
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct UpdateServiceActions {
    #[serde(rename = "#UpdateService.SimpleUpdate")]
    pub simple_update: Option<ActionTarget>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct ActionTarget {
    pub target: String,
    #[serde(
        rename = "TransferProtocol@Redfish.AllowableValues",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub transfer_protocols: Vec<String>,
}

/// How a firmware image reaches the BMC.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TransferProtocol {
    /// The client uploads the image itself.
    #[serde(rename = "HTTPPUSH")]
    HttpPush,
    SFTP,
    TFTP,
}

impl fmt::Display for TransferProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferProtocol::HttpPush => f.write_str("HTTPPUSH"),
            TransferProtocol::SFTP => f.write_str("SFTP"),
            TransferProtocol::TFTP => f.write_str("TFTP"),
        }
    }
}

impl FromStr for TransferProtocol {
    type Err = InvalidValueError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HTTPPUSH" => Ok(Self::HttpPush),
            "SFTP" => Ok(Self::SFTP),
            "TFTP" => Ok(Self::TFTP),
            _ => Err(InvalidValueError(
                "Protocol only supports HTTPPUSH, SFTP and TFTP.".to_string(),
            )),
        }
    }
}

/// Body of #UpdateService.SimpleUpdate.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct SimpleUpdateRequest {
    #[serde(rename = "ImageURI")]
    pub image_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
    pub transfer_protocol: TransferProtocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

// UpdateParameters is what is sent for a multipart firmware upload's metadata.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateParameters {
    pub targets: Vec<String>,
}

/// OEM part of a ThinkSystem System Manager multipart upload.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct OemParameters {
    pub flash_type: FlashType,
    pub upload_selector: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum FlashType {
    #[serde(rename = "HPMFwUpdate")]
    HpmFwUpdate,
    #[serde(rename = "UEFIUpdate")]
    UefiUpdate,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_xcc_update_service() {
        let data = r##"{
            "@odata.id": "/redfish/v1/UpdateService",
            "HttpPushUri": "/mfwupdate",
            "HttpPushUriTargets": [],
            "HttpPushUriTargetsBusy": false,
            "FirmwareInventory": {"@odata.id": "/redfish/v1/UpdateService/FirmwareInventory"},
            "Actions": {
                "#UpdateService.SimpleUpdate": {
                    "target": "/redfish/v1/UpdateService/Actions/UpdateService.SimpleUpdate",
                    "TransferProtocol@Redfish.AllowableValues": ["SFTP", "TFTP"]
                }
            }
        }"##;
        let s: UpdateService = serde_json::from_str(data).unwrap();
        assert_eq!(s.http_push_uri.as_deref(), Some("/mfwupdate"));
        assert!(s.multipart_http_push_uri.is_none());
        assert_eq!(
            s.simple_update_target(),
            Some("/redfish/v1/UpdateService/Actions/UpdateService.SimpleUpdate")
        );
    }

    #[test]
    fn test_simple_update_body() {
        let req = SimpleUpdateRequest {
            image_uri: "10.0.0.2/fw/image.uxz".to_string(),
            targets: None,
            transfer_protocol: TransferProtocol::SFTP,
            username: Some("u".to_string()),
            password: None,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({
                "ImageURI": "10.0.0.2/fw/image.uxz",
                "TransferProtocol": "SFTP",
                "Username": "u"
            })
        );
    }

    #[test]
    fn test_transfer_protocol_parse() {
        assert_eq!("httppush".parse::<TransferProtocol>().unwrap(), TransferProtocol::HttpPush);
        assert_eq!("Sftp".parse::<TransferProtocol>().unwrap(), TransferProtocol::SFTP);
        assert!("FTP".parse::<TransferProtocol>().is_err());
    }

    #[test]
    fn test_oem_parameters() {
        let p = OemParameters {
            flash_type: FlashType::UefiUpdate,
            upload_selector: "Default".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&p).unwrap(),
            serde_json::json!({"FlashType": "UEFIUpdate", "UploadSelector": "Default"})
        );
    }
}
