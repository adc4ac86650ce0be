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

// jsonmap.rs
// Helpers for pulling values and links out of Redfish JSON objects,
// which as you can imagine happens a lot when walking @odata.id links.

use serde_json::{Map, Value};

use crate::RedfishError;

pub type JsonObject = Map<String, Value>;

// missing_key_error creates a RedfishError::MissingKey error.
fn missing_key_error(key: &str, url: &str) -> RedfishError {
    RedfishError::MissingKey {
        key: key.to_string(),
        url: url.to_string(),
    }
}

// invalid_type_error creates a RedfishError::InvalidKeyType error.
fn invalid_type_error(key: &str, expected_type: &str, url: &str) -> RedfishError {
    RedfishError::InvalidKeyType {
        key: key.to_string(),
        expected_type: expected_type.to_string(),
        url: url.to_string(),
    }
}

// get_value retrieves a JSON value from a map, returning MissingKey
// error if the key is not found.
pub fn get_value<'a>(map: &'a JsonObject, key: &str, url: &str) -> Result<&'a Value, RedfishError> {
    map.get(key).ok_or_else(|| missing_key_error(key, url))
}

// get_str extracts a string value from a JSON map, returning appropriate
// errors if the key is missing or the value is not a string.
pub fn get_str<'a>(map: &'a JsonObject, key: &str, url: &str) -> Result<&'a str, RedfishError> {
    get_value(map, key, url)?
        .as_str()
        .ok_or_else(|| invalid_type_error(key, "string", url))
}

// get_object extracts an object (Map) from a JSON map, returning
// appropriate errors if the key is missing or the value is not an object.
pub fn get_object<'a>(
    map: &'a JsonObject,
    key: &str,
    url: &str,
) -> Result<&'a JsonObject, RedfishError> {
    get_value(map, key, url)?
        .as_object()
        .ok_or_else(|| invalid_type_error(key, "object", url))
}

// get_array extracts an array from a JSON map.
pub fn get_array<'a>(
    map: &'a JsonObject,
    key: &str,
    url: &str,
) -> Result<&'a Vec<Value>, RedfishError> {
    get_value(map, key, url)?
        .as_array()
        .ok_or_else(|| invalid_type_error(key, "array", url))
}

// get_link follows map[key]["@odata.id"], the usual shape of a Redfish
// navigation property.
pub fn get_link<'a>(map: &'a JsonObject, key: &str, url: &str) -> Result<&'a str, RedfishError> {
    let link = get_object(map, key, url)?;
    get_str(link, "@odata.id", url).map_err(|e| match e {
        RedfishError::MissingKey { url, .. } => missing_key_error(&format!("{key}.@odata.id"), &url),
        e => e,
    })
}

// get_links returns the @odata.id of every element of the array map[key].
// Elements that are not links are skipped.
pub fn get_links(map: &JsonObject, key: &str, url: &str) -> Result<Vec<String>, RedfishError> {
    Ok(get_array(map, key, url)?
        .iter()
        .filter_map(|m| m.get("@odata.id").and_then(|id| id.as_str()))
        .map(|id| id.to_string())
        .collect())
}

// into_object turns a response body into an object, or InvalidKeyType
// when the BMC sent something else.
pub fn into_object(value: Value, url: &str) -> Result<JsonObject, RedfishError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_type_error("<body>", "object", url)),
    }
}

// last_segment returns the last path segment of a resource path,
// i.e. the instance id of a collection member.
pub fn last_segment(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // test_get_str_success tests that get_str correctly extracts a string value.
    #[test]
    fn test_get_str_success() {
        let value = json!({
            "Name": "TestName",
            "Id": "123"
        });
        let map = value.as_object().unwrap();

        let result = get_str(map, "Name", "http://test/url");
        assert_eq!(result.unwrap(), "TestName");
    }

    // test_get_str_missing_key tests that get_str returns MissingKey error when key doesn't exist.
    #[test]
    fn test_get_str_missing_key() {
        let value = json!({
            "Name": "TestName"
        });
        let map = value.as_object().unwrap();

        let result = get_str(map, "Missing", "http://test/url");
        assert!(matches!(result, Err(RedfishError::MissingKey { .. })));
    }

    // test_get_str_wrong_type tests that get_str returns InvalidKeyType when value is not a string.
    #[test]
    fn test_get_str_wrong_type() {
        let value = json!({
            "Count": 42
        });
        let map = value.as_object().unwrap();

        let result = get_str(map, "Count", "http://test/url");
        assert!(matches!(result, Err(RedfishError::InvalidKeyType { .. })));
    }

    // test_get_link tests following a navigation property.
    #[test]
    fn test_get_link() {
        let value = json!({
            "Processors": {"@odata.id": "/redfish/v1/Systems/1/Processors"},
            "Broken": {"href": "/x"}
        });
        let map = value.as_object().unwrap();

        assert_eq!(
            get_link(map, "Processors", "/redfish/v1/Systems/1").unwrap(),
            "/redfish/v1/Systems/1/Processors"
        );
        match get_link(map, "Broken", "/redfish/v1/Systems/1") {
            Err(RedfishError::MissingKey { key, .. }) => assert_eq!(key, "Broken.@odata.id"),
            r => panic!("unexpected {r:?}"),
        }
    }

    // test_get_links tests collecting member links.
    #[test]
    fn test_get_links() {
        let value = json!({
            "Members": [
                {"@odata.id": "/redfish/v1/Systems/1"},
                {"@odata.id": "/redfish/v1/Systems/2"},
                "garbage"
            ]
        });
        let map = value.as_object().unwrap();

        assert_eq!(
            get_links(map, "Members", "/redfish/v1/Systems").unwrap(),
            vec!["/redfish/v1/Systems/1", "/redfish/v1/Systems/2"]
        );
    }

    // test_last_segment tests id extraction from paths.
    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("/redfish/v1/Systems/1"), "1");
        assert_eq!(last_segment("/redfish/v1/Managers/bmc/"), "bmc");
        assert_eq!(last_segment("Self"), "Self");
    }

    // test_into_object_rejects_arrays tests body shape checking.
    #[test]
    fn test_into_object_rejects_arrays() {
        assert!(into_object(json!({"a": 1}), "/x").is_ok());
        assert!(matches!(
            into_object(json!([1]), "/x"),
            Err(RedfishError::InvalidKeyType { .. })
        ));
    }
}
