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

// filter.rs
// Redfish payloads carry a lot of plumbing (OData annotations, links,
// actions) that callers of the inventory getters do not want to see.
// PropertyFilter strips it before anything is handed back.

use crate::jsonmap::JsonObject;

/// Keys removed from every resource returned to a caller.
pub const COMMON_EXCLUDED_KEYS: [&str; 7] = [
    "@odata.context",
    "@odata.id",
    "@odata.type",
    "@odata.etag",
    "Links",
    "Actions",
    "RelatedItem",
];

/// A set of top-level keys to drop from a resource: exact names plus
/// substrings (any key containing one of them is dropped too).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFilter {
    keys: Vec<String>,
    substrings: Vec<String>,
}

impl Default for PropertyFilter {
    fn default() -> Self {
        Self::common()
    }
}

impl PropertyFilter {
    /// Only the common metadata keys.
    pub fn common() -> Self {
        PropertyFilter {
            keys: COMMON_EXCLUDED_KEYS.iter().map(|k| k.to_string()).collect(),
            substrings: Vec::new(),
        }
    }

    pub fn with_keys(mut self, keys: &[&str]) -> Self {
        self.keys.extend(keys.iter().map(|k| k.to_string()));
        self
    }

    pub fn with_substrings(mut self, substrings: &[&str]) -> Self {
        self.substrings
            .extend(substrings.iter().map(|k| k.to_string()));
        self
    }

    /// ComputerSystem: also drops the links to sub-collections, which are
    /// reported by their own getters.
    pub fn system() -> Self {
        Self::common().with_keys(&[
            "Processors",
            "Memory",
            "SecureBoot",
            "Storage",
            "PCIeDevices",
            "PCIeFunctions",
            "LogServices",
            "PCIeDevices@odata.count",
            "PCIeFunctions@odata.count",
        ])
    }

    pub fn fan() -> Self {
        Self::common().with_keys(&["Oem"])
    }

    pub fn network_adapter() -> Self {
        Self::common().with_substrings(&["@Redfish"])
    }

    pub fn ethernet_interface() -> Self {
        Self::common().with_substrings(&["Redfish.Deprecated"])
    }

    pub fn excludes(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key) || self.substrings.iter().any(|s| key.contains(s.as_str()))
    }

    /// Returns a copy of `resource` without the excluded keys.
    pub fn apply(&self, resource: &JsonObject) -> JsonObject {
        resource
            .iter()
            .filter(|(k, _)| !self.excludes(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Same as `apply`, consuming the resource.
    pub fn apply_owned(&self, mut resource: JsonObject) -> JsonObject {
        resource.retain(|k, _| !self.excludes(k));
        resource
    }

    pub fn apply_all(&self, resources: Vec<JsonObject>) -> Vec<JsonObject> {
        resources.into_iter().map(|r| self.apply_owned(r)).collect()
    }
}

/// true when the resource reports `Status.State == "Absent"`. Resources
/// without a Status are present.
pub fn is_absent(resource: &JsonObject) -> bool {
    resource
        .get("Status")
        .and_then(|s| s.get("State"))
        .and_then(|s| s.as_str())
        == Some("Absent")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn obj(v: Value) -> JsonObject {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_common_filter_strips_metadata() {
        let r = obj(json!({
            "@odata.context": "/redfish/v1/$metadata#Processor.Processor",
            "@odata.id": "/redfish/v1/Systems/1/Processors/1",
            "@odata.type": "#Processor.v1_3_0.Processor",
            "@odata.etag": "\"1\"",
            "Links": {"Chassis": {"@odata.id": "/redfish/v1/Chassis/1"}},
            "Actions": {},
            "RelatedItem": [],
            "Id": "1",
            "Model": "Intel(R) Xeon(R) Gold 6126",
            "TotalCores": 12
        }));
        let f = PropertyFilter::common().apply(&r);
        assert_eq!(
            Value::Object(f),
            json!({"Id": "1", "Model": "Intel(R) Xeon(R) Gold 6126", "TotalCores": 12})
        );
    }

    #[test]
    fn test_filter_is_top_level_only() {
        let r = obj(json!({
            "Id": "1",
            "Status": {"State": "Enabled", "@odata.id": "/x"}
        }));
        let f = PropertyFilter::common().apply_owned(r);
        assert_eq!(f["Status"]["@odata.id"], "/x");
    }

    #[test]
    fn test_substring_filters() {
        let r = obj(json!({
            "Id": "1",
            "Controllers@Redfish.Deprecated": [],
            "Name": "NIC"
        }));
        let f = PropertyFilter::network_adapter().apply(&r);
        assert!(!f.contains_key("Controllers@Redfish.Deprecated"));
        let f = PropertyFilter::ethernet_interface().apply(&r);
        assert!(!f.contains_key("Controllers@Redfish.Deprecated"));
        assert!(f.contains_key("Name"));
    }

    #[test]
    fn test_system_filter() {
        let r = obj(json!({
            "Id": "1",
            "PowerState": "On",
            "Processors": {"@odata.id": "/redfish/v1/Systems/1/Processors"},
            "PCIeDevices@odata.count": 4,
            "Oem": {}
        }));
        let f = PropertyFilter::system().apply(&r);
        assert_eq!(Value::Object(f), json!({"Id": "1", "PowerState": "On", "Oem": {}}));
        assert!(PropertyFilter::fan().excludes("Oem"));
        assert!(!PropertyFilter::common().excludes("Oem"));
    }

    #[test]
    fn test_is_absent() {
        assert!(is_absent(&obj(json!({"Status": {"State": "Absent"}}))));
        assert!(!is_absent(&obj(json!({"Status": {"State": "Enabled"}}))));
        assert!(!is_absent(&obj(json!({"Id": "1"}))));
    }
}
