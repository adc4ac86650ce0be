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
use serde::{Deserialize, Serialize};

use crate::model::ODataId;

/// https://redfish.dmtf.org/schemas/v1/ServiceRoot.v1_16_0.json
/// Only the links the client follows.
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRoot {
    pub product: Option<String>,
    pub vendor: Option<String>,
    pub redfish_version: Option<String>,
    pub chassis: Option<ODataId>,
    pub managers: Option<ODataId>,
    pub registries: Option<ODataId>,
    pub session_service: Option<ODataId>,
    pub systems: Option<ODataId>,
    pub tasks: Option<ODataId>,
    pub update_service: Option<ODataId>,
}

#[cfg(test)]
mod test {
    #[test]
    fn test_lenovo_service_root() {
        let data = r##"{
            "@odata.id": "/redfish/v1/",
            "@odata.type": "#ServiceRoot.v1_5_0.ServiceRoot",
            "Id": "RootService",
            "Name": "Root Service",
            "Vendor": "Lenovo",
            "RedfishVersion": "1.8.0",
            "Chassis": {"@odata.id": "/redfish/v1/Chassis"},
            "Managers": {"@odata.id": "/redfish/v1/Managers"},
            "Systems": {"@odata.id": "/redfish/v1/Systems"},
            "UpdateService": {"@odata.id": "/redfish/v1/UpdateService"},
            "Registries": {"@odata.id": "/redfish/v1/Registries"},
            "Oem": {"Lenovo": {}}
        }"##;
        let root: super::ServiceRoot = serde_json::from_str(data).unwrap();
        assert_eq!(root.vendor.as_deref(), Some("Lenovo"));
        assert_eq!(
            root.update_service.unwrap().odata_id,
            "/redfish/v1/UpdateService"
        );
        assert!(root.tasks.is_none());
    }
}
