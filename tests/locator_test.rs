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

mod common;

use common::{client, client_with, collection, connect_config, single_node, MockTransport};
use lenovo_redfish::{
    ConnectConfig, ErrorKind, RawResponse, RedfishError, ResourceKind, StatusCode,
};
use serde_json::json;

#[test]
fn test_system_lookup_is_cached() -> Result<(), anyhow::Error> {
    let mock = MockTransport::new();
    mock.on_get(
        "/redfish/v1/Systems",
        collection(&["/redfish/v1/Systems/1", "/redfish/v1/Systems/2"]),
    );
    let redfish = client(mock);
    assert_eq!(redfish.find_system_resource()?, "/redfish/v1/Systems/1");
    assert_eq!(redfish.find_system_resource()?, "/redfish/v1/Systems/1");
    assert_eq!(redfish.transport().calls_to("GET", "/redfish/v1/Systems"), 1);
    Ok(())
}

#[test]
fn test_system_by_id() -> Result<(), anyhow::Error> {
    let mock = MockTransport::new();
    mock.on_get(
        "/redfish/v1/Systems",
        collection(&["/redfish/v1/Systems/1", "/redfish/v1/Systems/2"]),
    );
    let config = ConnectConfig {
        system_id: Some("2".to_string()),
        ..connect_config()
    };
    let redfish = client_with(mock, &config);
    assert_eq!(redfish.find_system_resource()?, "/redfish/v1/Systems/2");
    Ok(())
}

#[test]
fn test_failed_lookup_is_not_cached() {
    let mock = MockTransport::new();
    mock.on_get("/redfish/v1/Managers", collection(&["/redfish/v1/Managers/1"]));
    let config = ConnectConfig {
        manager_id: Some("2".to_string()),
        ..connect_config()
    };
    let redfish = client_with(mock, &config);
    for _ in 0..2 {
        let err = redfish.find_manager_resource().unwrap_err();
        assert_eq!(err.to_string(), "Failed to find the Manager resource with id 2");
    }
    assert_eq!(redfish.transport().calls_to("GET", "/redfish/v1/Managers"), 2);
}

#[test]
fn test_unreachable_collection() {
    let mock = MockTransport::new();
    mock.on(
        "GET",
        "/redfish/v1/Systems",
        RawResponse::json(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": {"@Message.ExtendedInfo": [{"Message": "The service is busy."}]}}),
        ),
    );
    let redfish = client(mock);
    let err = redfish.find_system_resource().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedStatus);
    assert_eq!(err.status_code(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert!(err.to_string().contains("The service is busy."));
}

#[test]
fn test_chassis_linked_to_system() -> Result<(), anyhow::Error> {
    let mock = MockTransport::new();
    mock.on_get(
        "/redfish/v1/Chassis",
        collection(&["/redfish/v1/Chassis/Enclosure", "/redfish/v1/Chassis/1"]),
    );
    mock.on_get(
        "/redfish/v1/Chassis/Enclosure",
        json!({"@odata.id": "/redfish/v1/Chassis/Enclosure", "Id": "Enclosure", "Links": {}}),
    );
    mock.on_get(
        "/redfish/v1/Chassis/1",
        json!({
            "@odata.id": "/redfish/v1/Chassis/1",
            "Id": "1",
            "Links": {"ComputerSystems": [{"@odata.id": "/redfish/v1/Systems/1"}]}
        }),
    );
    let redfish = client(mock);
    assert_eq!(redfish.find_chassis_resource()?, "/redfish/v1/Chassis/1");
    Ok(())
}

#[test]
fn test_get_collection_fails_fast() {
    let mock = MockTransport::new();
    mock.on_get(
        "/redfish/v1/Systems/1/Memory",
        collection(&[
            "/redfish/v1/Systems/1/Memory/1",
            "/redfish/v1/Systems/1/Memory/2",
            "/redfish/v1/Systems/1/Memory/3",
            "/redfish/v1/Systems/1/Memory/4",
        ]),
    );
    mock.on_get("/redfish/v1/Systems/1/Memory/1", json!({"Id": "1"}));
    mock.on_get("/redfish/v1/Systems/1/Memory/2", json!({"Id": "2"}));
    mock.on_get("/redfish/v1/Systems/1/Memory/4", json!({"Id": "4"}));
    let redfish = client(mock);

    // The members fetched before the failure are dropped with it.
    let result = redfish.get_collection("/redfish/v1/Systems/1/Memory");
    let err = match result {
        Ok(members) => panic!("expected an error, got {members:?}"),
        Err(e) => e,
    };
    assert_eq!(err.status_code(), Some(StatusCode::NOT_FOUND));
    assert!(err.to_string().contains("/redfish/v1/Systems/1/Memory/3"));

    let mock = redfish.transport();
    assert_eq!(mock.calls_to("GET", "/redfish/v1/Systems/1/Memory/1"), 1);
    assert_eq!(mock.calls_to("GET", "/redfish/v1/Systems/1/Memory/2"), 1);
    assert_eq!(mock.calls_to("GET", "/redfish/v1/Systems/1/Memory/3"), 1);
    assert_eq!(mock.calls_to("GET", "/redfish/v1/Systems/1/Memory/4"), 0);
}

#[test]
fn test_chassis_without_system_link() {
    let mock = MockTransport::new();
    mock.on_get(
        "/redfish/v1/Chassis",
        collection(&["/redfish/v1/Chassis/Enclosure", "/redfish/v1/Chassis/Backplane"]),
    );
    mock.on_get(
        "/redfish/v1/Chassis/Enclosure",
        json!({"@odata.id": "/redfish/v1/Chassis/Enclosure", "Id": "Enclosure", "Links": {}}),
    );
    mock.on_get(
        "/redfish/v1/Chassis/Backplane",
        json!({
            "@odata.id": "/redfish/v1/Chassis/Backplane",
            "Id": "Backplane",
            "Links": {"ContainedBy": {"@odata.id": "/redfish/v1/Chassis/Enclosure"}}
        }),
    );
    let redfish = client(mock);
    let err = redfish.find_chassis_resource().unwrap_err();
    assert!(matches!(
        err,
        RedfishError::ResourceNotFound {
            kind: ResourceKind::Chassis,
            id: None
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Resolution);
}

#[test]
fn test_manager_and_chassis_lookups_are_cached() -> Result<(), anyhow::Error> {
    let mock = MockTransport::new();
    single_node(&mock);
    let redfish = client(mock);
    for _ in 0..3 {
        assert_eq!(redfish.find_manager_resource()?, "/redfish/v1/Managers/1");
        assert_eq!(redfish.find_chassis_resource()?, "/redfish/v1/Chassis/1");
    }
    let mock = redfish.transport();
    assert_eq!(mock.calls_to("GET", "/redfish/v1/Managers"), 1);
    assert_eq!(mock.calls_to("GET", "/redfish/v1/Chassis"), 1);
    assert_eq!(mock.calls_to("GET", "/redfish/v1/Chassis/1"), 1);
    assert_eq!(mock.calls_to("GET", "/redfish/v1/Systems"), 0);
    Ok(())
}

#[test]
fn test_get_collection_without_members() {
    let mock = MockTransport::new();
    mock.on_get("/redfish/v1/Systems/1", json!({"Id": "1"}));
    let redfish = client(mock);
    assert!(matches!(
        redfish.get_collection("/redfish/v1/Systems/1"),
        Err(RedfishError::MissingKey { .. })
    ));
}

#[test]
fn test_get_url_requires_object() {
    let mock = MockTransport::new();
    mock.on_get("/redfish/v1/odd", json!(["not", "an", "object"]));
    let redfish = client(mock);
    assert_eq!(
        redfish.get_url("/redfish/v1/odd").unwrap_err().kind(),
        ErrorKind::Protocol
    );
}
