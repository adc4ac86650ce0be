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

// inventory.rs
// Read-only views of the managed node (system, BIOS, BMC, chassis) plus the
// two small write operations that go with them: a BIOS attribute change
// and a system reset. Every resource returned here went through a
// PropertyFilter.

use std::{fmt, str::FromStr};

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::client::Client;
use crate::filter::{is_absent, PropertyFilter};
use crate::jsonmap::{self, JsonObject};
use crate::model::SystemPowerControl;
use crate::network::{Transport, REDFISH_ENDPOINT};
use crate::{RedfishError, ResourceKind};

/// Which BIOS attribute set to read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BiosAttributeSource {
    /// The values in effect.
    #[default]
    Current,
    /// Only the attributes whose pending value differs from the current one.
    Pending,
}

impl FromStr for BiosAttributeSource {
    type Err = RedfishError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(Self::Current),
            "pending" => Ok(Self::Pending),
            _ => Err(RedfishError::InvalidArgument(
                "Please specify parameter with 'current' or 'pending'.".to_string(),
            )),
        }
    }
}

impl fmt::Display for BiosAttributeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current"),
            Self::Pending => f.write_str("pending"),
        }
    }
}

// Names BIOS firmware levels have used for the boot mode attribute.
const BOOT_MODE_EXACT: [&str; 2] = ["BootMode", "SystemBootMode"];
const BOOT_MODE_FUZZY: [&str; 3] = ["SystemBootMode", "Boot Mode", "Boot_Mode"];

impl<T: Transport> Client<T> {
    fn system_path(&self, child: &str) -> Result<String, RedfishError> {
        Ok(format!("{}/{child}", self.find_system_resource()?))
    }

    fn manager_path(&self, child: &str) -> Result<String, RedfishError> {
        Ok(format!("{}/{child}", self.find_manager_resource()?))
    }

    fn chassis_path(&self, child: &str) -> Result<String, RedfishError> {
        Ok(format!("{}/{child}", self.find_chassis_resource()?))
    }

    pub(crate) fn filtered_collection(
        &self,
        path: &str,
        filter: &PropertyFilter,
    ) -> Result<Vec<JsonObject>, RedfishError> {
        Ok(filter.apply_all(self.get_collection(path)?))
    }

    // expand_collection replaces the link in member[key] with the filtered
    // members of the collection it points to.
    fn expand_collection(
        &self,
        member: &mut JsonObject,
        key: &str,
        filter: &PropertyFilter,
    ) -> Result<(), RedfishError> {
        let Some(link) = linked_path(member, key) else {
            return Ok(());
        };
        let expanded = self.filtered_collection(&link, filter)?;
        member.insert(key.to_string(), to_array(expanded));
        Ok(())
    }

    // expand_link replaces the link in member[key] with the filtered
    // resource it points to.
    fn expand_link(
        &self,
        member: &mut JsonObject,
        key: &str,
        filter: &PropertyFilter,
    ) -> Result<(), RedfishError> {
        let Some(link) = linked_path(member, key) else {
            return Ok(());
        };
        let expanded = filter.apply_owned(self.get_url(&link)?);
        member.insert(key.to_string(), Value::Object(expanded));
        Ok(())
    }

    /// Installed processors.
    pub fn get_cpu_inventory(&self) -> Result<Vec<JsonObject>, RedfishError> {
        let _span = self.span.enter();
        let path = self.system_path("Processors")?;
        let filter = PropertyFilter::common();
        Ok(self
            .get_collection(&path)?
            .into_iter()
            .filter(|cpu| !is_absent(cpu))
            .map(|cpu| filter.apply_owned(cpu))
            .collect())
    }

    /// Installed DIMMs, or exactly the DIMM with `member_id`.
    pub fn get_memory_inventory(
        &self,
        member_id: Option<&str>,
    ) -> Result<Vec<JsonObject>, RedfishError> {
        let _span = self.span.enter();
        let path = self.system_path("Memory")?;
        let members = self.get_collection(&path)?;
        let selected: Vec<JsonObject> = match member_id {
            None => members.into_iter().filter(|m| !is_absent(m)).collect(),
            Some(id) => {
                let dimm = members
                    .into_iter()
                    .find(|m| m.get("Id").and_then(|v| v.as_str()) == Some(id))
                    .ok_or_else(|| RedfishError::ResourceNotFound {
                        kind: ResourceKind::Memory,
                        id: Some(id.to_string()),
                    })?;
                vec![dimm]
            }
        };
        Ok(PropertyFilter::common().apply_all(selected))
    }

    pub fn get_system_ethernet_interfaces(&self) -> Result<Vec<JsonObject>, RedfishError> {
        let _span = self.span.enter();
        let path = self.system_path("EthernetInterfaces")?;
        self.filtered_collection(&path, &PropertyFilter::ethernet_interface())
    }

    /// Storage subsystems with their drives, volumes and controllers.
    pub fn get_system_storage(&self) -> Result<Vec<JsonObject>, RedfishError> {
        let _span = self.span.enter();
        let path = self.system_path("Storage")?;
        let filter = PropertyFilter::common();
        let mut storages = Vec::new();
        for member in self.get_collection(&path)? {
            let mut storage = filter.apply(&member);
            if let Some(drives) = member.get("Drives").and_then(|d| d.as_array()) {
                let mut list = Vec::with_capacity(drives.len());
                for drive in drives {
                    let Some(link) = drive.get("@odata.id").and_then(|l| l.as_str()) else {
                        continue;
                    };
                    list.push(filter.apply_owned(self.get_url(link)?));
                }
                storage.insert("Drives".to_string(), to_array(list));
            }
            self.expand_collection(&mut storage, "Volumes", &filter)?;
            if let Some(controllers) = member.get("StorageControllers").and_then(|c| c.as_array()) {
                let list: Vec<JsonObject> = controllers
                    .iter()
                    .filter_map(|c| c.as_object())
                    .map(|c| filter.apply(c))
                    .collect();
                storage.insert("StorageControllers".to_string(), to_array(list));
            }
            storages.push(storage);
        }
        Ok(storages)
    }

    pub fn get_system_simple_storage(&self) -> Result<Vec<JsonObject>, RedfishError> {
        let _span = self.span.enter();
        let path = self.system_path("SimpleStorage")?;
        self.filtered_collection(&path, &PropertyFilter::common())
    }

    /// Storage and SimpleStorage together. Either half is left out when the
    /// BMC does not provide it.
    pub fn get_storage_inventory(&self) -> Result<JsonObject, RedfishError> {
        self.find_system_resource()?;
        let mut info = JsonObject::new();
        match self.get_system_storage() {
            Ok(storage) => {
                info.insert("Storage".to_string(), to_array(storage));
            }
            Err(e) => debug!("Storage not available: {e}"),
        }
        match self.get_system_simple_storage() {
            Ok(storage) => {
                info.insert("SimpleStorage".to_string(), to_array(storage));
            }
            Err(e) => debug!("SimpleStorage not available: {e}"),
        }
        Ok(info)
    }

    pub fn get_system_power_state(&self) -> Result<JsonObject, RedfishError> {
        let _span = self.span.enter();
        let path = self.find_system_resource()?;
        let system = self.get_url(&path)?;
        let state = jsonmap::get_value(&system, "PowerState", &path)?;
        let mut entries = JsonObject::new();
        entries.insert("PowerState".to_string(), state.clone());
        Ok(entries)
    }

    /// The ComputerSystem resource with its ethernet interfaces.
    pub fn get_system_inventory(&self) -> Result<JsonObject, RedfishError> {
        let path = self.find_system_resource()?;
        let mut system = {
            let _span = self.span.enter();
            PropertyFilter::system().apply_owned(self.get_url(&path)?)
        };
        match self.get_system_ethernet_interfaces() {
            Ok(nics) => {
                system.insert("EthernetInterfaces".to_string(), to_array(nics));
            }
            Err(e) => debug!("EthernetInterfaces not available: {e}"),
        }
        Ok(system)
    }

    pub fn get_all_bios_attributes(
        &self,
        source: BiosAttributeSource,
    ) -> Result<JsonObject, RedfishError> {
        let _span = self.span.enter();
        let path = self.system_path("Bios")?;
        let bios = self.get_url(&path)?;
        let current = jsonmap::get_object(&bios, "Attributes", &path)?;
        if source == BiosAttributeSource::Current {
            return Ok(current.clone());
        }
        let settings = jsonmap::get_object(&bios, "@Redfish.Settings", &path)?;
        let pending_path = jsonmap::get_link(settings, "SettingsObject", &path)?;
        let pending = self.get_url(pending_path)?;
        let pending = jsonmap::get_object(&pending, "Attributes", pending_path)?;
        Ok(pending_changes(current, pending))
    }

    pub fn get_bios_attribute(&self, name: &str) -> Result<JsonObject, RedfishError> {
        let attributes = self.get_all_bios_attributes(BiosAttributeSource::Current)?;
        let value = attributes.get(name).ok_or_else(|| {
            RedfishError::InvalidArgument(format!("No this attribute {name} in the bios attribute"))
        })?;
        let mut entries = JsonObject::new();
        entries.insert(name.to_string(), value.clone());
        Ok(entries)
    }

    /// The boot mode attribute, whatever this BIOS calls it.
    pub fn get_bios_bootmode(&self) -> Result<JsonObject, RedfishError> {
        let attributes = self.get_all_bios_attributes(BiosAttributeSource::Current)?;
        let name = attributes
            .keys()
            .find(|k| BOOT_MODE_EXACT.contains(&k.as_str()))
            .or_else(|| {
                attributes
                    .keys()
                    .find(|k| BOOT_MODE_FUZZY.iter().any(|f| k.contains(*f)))
            })
            .ok_or_else(|| {
                RedfishError::NotSupported(
                    "Failed to find BootMode attribute in BIOS attributes.".to_string(),
                )
            })?;
        let mut entries = JsonObject::new();
        entries.insert(name.clone(), attributes[name].clone());
        Ok(entries)
    }

    /// The attribute registry the BIOS resource refers to, as JSON.
    pub fn get_bios_attribute_registry(&self) -> Result<JsonObject, RedfishError> {
        let _span = self.span.enter();
        let path = self.system_path("Bios")?;
        let bios = self.get_url(&path)?;
        let registry_name = jsonmap::get_str(&bios, "AttributeRegistry", &path)?;

        let registries_path = format!("{REDFISH_ENDPOINT}/Registries");
        let registries = self.get_url(&registries_path)?;
        let registry_path = jsonmap::get_links(&registries, "Members", &registries_path)?
            .into_iter()
            .filter(|m| m.contains(registry_name))
            .last()
            .ok_or_else(|| RedfishError::ResourceNotFound {
                kind: ResourceKind::Registry,
                id: Some(registry_name.to_string()),
            })?;

        let registry = self.get_url(&registry_path)?;
        let location = jsonmap::get_array(&registry, "Location", &registry_path)?
            .first()
            .and_then(|l| l.get("Uri"))
            .and_then(|u| u.as_str())
            .ok_or_else(|| RedfishError::MissingKey {
                key: "Location[0].Uri".to_string(),
                url: registry_path.clone(),
            })?;
        Ok(PropertyFilter::common().apply_owned(self.get_url(location)?))
    }

    /// Stages a BIOS attribute change. It takes effect on the next boot.
    ///
    /// `value` is converted to the type of the attribute's current value.
    pub fn set_bios_attribute(&self, name: &str, value: &str) -> Result<String, RedfishError> {
        let _span = self.span.enter();
        let path = self.system_path("Bios")?;
        let bios = self.get_url(&path)?;
        let current = jsonmap::get_object(&bios, "Attributes", &path)?;
        let existing = current.get(name).ok_or_else(|| {
            RedfishError::InvalidArgument(format!("No this attribute {name} in the bios attribute"))
        })?;
        let new_value = coerce_like(existing, value)?;

        let settings = jsonmap::get_object(&bios, "@Redfish.Settings", &path)?;
        let settings_path = jsonmap::get_link(settings, "SettingsObject", &path)?;
        let pending = self.get_url(settings_path)?;
        let etag = pending
            .get("@odata.etag")
            .or_else(|| bios.get("@odata.etag"))
            .and_then(|e| e.as_str());

        let body = json!({ "Attributes": { name: new_value } });
        let response = self.transport().patch(settings_path, &body, etag)?;
        if !matches!(response.status.as_u16(), 200 | 204) {
            return Err(response.into_error(settings_path));
        }
        info!("BIOS attribute {name} staged");
        Ok(format!(
            "BIOS attribute {name} set to {value}, it takes effect after the system restarts."
        ))
    }

    /// #ComputerSystem.Reset with the given reset type.
    pub fn set_system_power(&self, reset_type: SystemPowerControl) -> Result<String, RedfishError> {
        let _span = self.span.enter();
        let path = self.find_system_resource()?;
        let system = self.get_url(&path)?;
        let actions = jsonmap::get_object(&system, "Actions", &path)?;
        let reset = jsonmap::get_object(actions, "#ComputerSystem.Reset", &path)?;
        let target = jsonmap::get_str(reset, "target", &path)?;
        if let Some(allowed) = reset
            .get("ResetType@Redfish.AllowableValues")
            .and_then(|v| v.as_array())
        {
            let wanted = reset_type.to_string();
            if !allowed.iter().any(|v| v.as_str() == Some(wanted.as_str())) {
                return Err(RedfishError::InvalidArgument(format!(
                    "Reset type {wanted} is not allowed, allowable values are {}",
                    Value::Array(allowed.clone())
                )));
            }
        }
        let response = self
            .transport()
            .post(target, &json!({"ResetType": reset_type.to_string()}))?;
        if !matches!(response.status.as_u16(), 200 | 202 | 204) {
            return Err(response.into_error(target));
        }
        Ok(format!("Reset system with {reset_type} successfully."))
    }

    /// The Manager resource with its network protocol, serial, ethernet and
    /// host interfaces. Parts the BMC does not provide are left out.
    pub fn get_bmc_inventory(&self) -> Result<JsonObject, RedfishError> {
        let path = self.find_manager_resource()?;
        let mut bmc = {
            let _span = self.span.enter();
            PropertyFilter::common().apply_owned(self.get_url(&path)?)
        };
        match self.get_bmc_networkprotocol() {
            Ok(p) => {
                bmc.insert("NetworkProtocol".to_string(), Value::Object(p));
            }
            Err(e) => debug!("NetworkProtocol not available: {e}"),
        }
        let lists = [
            ("SerialInterfaces", self.get_bmc_serialinterfaces()),
            ("EthernetInterfaces", self.get_bmc_ethernet_interfaces()),
            ("HostInterfaces", self.get_bmc_hostinterfaces()),
        ];
        for (key, result) in lists {
            match result {
                Ok(list) => {
                    bmc.insert(key.to_string(), to_array(list));
                }
                Err(e) => debug!("{key} not available: {e}"),
            }
        }
        Ok(bmc)
    }

    pub fn get_bmc_networkprotocol(&self) -> Result<JsonObject, RedfishError> {
        let _span = self.span.enter();
        let path = self.manager_path("NetworkProtocol")?;
        Ok(PropertyFilter::common().apply_owned(self.get_url(&path)?))
    }

    pub fn get_bmc_serialinterfaces(&self) -> Result<Vec<JsonObject>, RedfishError> {
        let _span = self.span.enter();
        let path = self.manager_path("SerialInterfaces")?;
        self.filtered_collection(&path, &PropertyFilter::common())
    }

    pub fn get_bmc_ethernet_interfaces(&self) -> Result<Vec<JsonObject>, RedfishError> {
        let _span = self.span.enter();
        let path = self.manager_path("EthernetInterfaces")?;
        self.filtered_collection(&path, &PropertyFilter::common())
    }

    pub fn get_bmc_virtual_media(&self) -> Result<Vec<JsonObject>, RedfishError> {
        let _span = self.span.enter();
        let path = self.manager_path("VirtualMedia")?;
        self.filtered_collection(&path, &PropertyFilter::common())
    }

    pub fn get_bmc_hostinterfaces(&self) -> Result<Vec<JsonObject>, RedfishError> {
        let _span = self.span.enter();
        let path = self.manager_path("HostInterfaces")?;
        let filter = PropertyFilter::common();
        let mut interfaces = self.filtered_collection(&path, &filter)?;
        for interface in interfaces.iter_mut() {
            self.expand_collection(interface, "HostEthernetInterfaces", &filter)?;
            self.expand_link(interface, "ManagerEthernetInterface", &filter)?;
        }
        Ok(interfaces)
    }

    pub fn get_bmc_ntp(&self) -> Result<Value, RedfishError> {
        let protocol = self.get_bmc_networkprotocol()?;
        protocol
            .get("NTP")
            .cloned()
            .ok_or_else(|| RedfishError::MissingKey {
                key: "NTP".to_string(),
                url: self
                    .manager_path("NetworkProtocol")
                    .unwrap_or_else(|_| "NetworkProtocol".to_string()),
            })
    }

    /// PCIe devices with their functions.
    pub fn get_pci_inventory(&self) -> Result<Vec<JsonObject>, RedfishError> {
        let _span = self.span.enter();
        let path = self.chassis_path("PCIeDevices")?;
        let filter = PropertyFilter::common();
        let mut devices = self.filtered_collection(&path, &filter)?;
        for device in devices.iter_mut() {
            self.expand_collection(device, "PCIeFunctions", &filter)?;
        }
        Ok(devices)
    }

    /// Network adapters with their device functions and ports. When the
    /// chassis has no NetworkAdapters the system ethernet interfaces are
    /// reported instead.
    pub fn get_nic_inventory(&self) -> Result<Vec<JsonObject>, RedfishError> {
        let adapters = {
            let _span = self.span.enter();
            self.chassis_path("NetworkAdapters")
                .and_then(|path| self.filtered_collection(&path, &PropertyFilter::network_adapter()))
        };
        let mut adapters = match adapters {
            Ok(adapters) => adapters,
            Err(e) => {
                debug!("NetworkAdapters not available, using system EthernetInterfaces: {e}");
                return self.get_system_ethernet_interfaces();
            }
        };
        let _span = self.span.enter();
        let filter = PropertyFilter::common();
        for adapter in adapters.iter_mut() {
            self.expand_collection(adapter, "NetworkDeviceFunctions", &filter)?;
            self.expand_collection(adapter, "NetworkPorts", &filter)?;
        }
        Ok(adapters)
    }

    pub fn get_fan_inventory(&self) -> Result<Vec<JsonObject>, RedfishError> {
        self.chassis_list("Thermal", "Fans", &PropertyFilter::fan())
    }

    pub fn get_temperatures_inventory(&self) -> Result<Vec<JsonObject>, RedfishError> {
        self.chassis_list("Thermal", "Temperatures", &PropertyFilter::common())
    }

    pub fn get_psu_inventory(&self) -> Result<Vec<JsonObject>, RedfishError> {
        self.chassis_list("Power", "PowerSupplies", &PropertyFilter::common())
    }

    pub fn get_power_redundancy(&self) -> Result<Vec<JsonObject>, RedfishError> {
        self.chassis_list("Power", "Redundancy", &PropertyFilter::common())
    }

    pub fn get_power_voltages(&self) -> Result<Vec<JsonObject>, RedfishError> {
        self.chassis_list("Power", "Voltages", &PropertyFilter::common())
    }

    /// PowerMetrics of the PowerControl entry covering the whole chassis.
    pub fn get_power_metrics(&self) -> Result<Value, RedfishError> {
        let controls = self.chassis_list("Power", "PowerControl", &PropertyFilter::common())?;
        controls
            .iter()
            .find(|c| {
                c.get("Name")
                    .and_then(|n| n.as_str())
                    .is_some_and(|n| n.contains("Chassis") || n.contains("Server"))
                    && c.contains_key("PowerMetrics")
            })
            .map(|c| c["PowerMetrics"].clone())
            .ok_or_else(|| RedfishError::NotSupported("No suitable power metrics exist.".to_string()))
    }

    pub fn get_power_limit(&self) -> Result<Value, RedfishError> {
        let controls = self.chassis_list("Power", "PowerControl", &PropertyFilter::common())?;
        controls
            .iter()
            .find_map(|c| c.get("PowerLimit").cloned())
            .ok_or_else(|| RedfishError::NotSupported("No power limit exist.".to_string()))
    }

    // chassis_list returns the filtered entries of an array property of a
    // chassis sub resource, e.g. Thermal.Fans. A missing property is an
    // empty list.
    fn chassis_list(
        &self,
        resource: &str,
        property: &str,
        filter: &PropertyFilter,
    ) -> Result<Vec<JsonObject>, RedfishError> {
        let _span = self.span.enter();
        let path = self.chassis_path(resource)?;
        let body = self.get_url(&path)?;
        Ok(body
            .get(property)
            .and_then(|p| p.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.as_object())
                    .map(|e| filter.apply(e))
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn linked_path(member: &JsonObject, key: &str) -> Option<String> {
    member
        .get(key)
        .and_then(|l| l.get("@odata.id"))
        .and_then(|l| l.as_str())
        .map(|l| l.to_string())
}

fn to_array(list: Vec<JsonObject>) -> Value {
    Value::Array(list.into_iter().map(Value::Object).collect())
}

// pending_changes keeps the pending attributes whose value differs from
// the current one.
fn pending_changes(current: &JsonObject, pending: &JsonObject) -> JsonObject {
    pending
        .iter()
        .filter(|(k, v)| current.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

// coerce_like parses `value` into the JSON type of `existing`.
fn coerce_like(existing: &Value, value: &str) -> Result<Value, RedfishError> {
    let invalid = || {
        RedfishError::InvalidArgument(format!("{value} is not a valid value for this attribute"))
    };
    Ok(match existing {
        Value::Bool(_) => Value::Bool(value.parse().map_err(|_| invalid())?),
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            Value::from(value.parse::<i64>().map_err(|_| invalid())?)
        }
        Value::Number(_) => json!(value.parse::<f64>().map_err(|_| invalid())?),
        _ => Value::String(value.to_string()),
    })
}
