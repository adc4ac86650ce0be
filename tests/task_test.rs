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

use std::time::Duration;

use common::{task, MockTransport, BASE_URL};
use lenovo_redfish::{ErrorKind, RawResponse, RedfishError, StatusCode, TaskMonitor};

const TASK: &str = "/redfish/v1/TaskService/Tasks/7";

fn monitor() -> TaskMonitor {
    TaskMonitor::new(Duration::ZERO)
}

#[test]
fn test_ok_state_is_success() -> Result<(), anyhow::Error> {
    let mock = MockTransport::new();
    mock.on("GET", TASK, task("New", 0));
    mock.on("GET", TASK, task("OK", 100));
    let done = monitor().wait(&mock, &format!("{BASE_URL}{TASK}"))?;
    assert!(done.task_state.is_success());
    assert_eq!(mock.calls_to("GET", TASK), 2);
    Ok(())
}

#[test]
fn test_killed_and_cancelled_are_terminal() {
    for state in ["Killed", "Cancelled"] {
        let mock = MockTransport::new();
        mock.on("GET", TASK, task("Running", 30));
        mock.on("GET", TASK, task(state, 30));
        let err = monitor().wait_and_delete(&mock, TASK).unwrap_err();
        assert!(matches!(&err, RedfishError::TaskFailed { state: s, .. } if s == state));
        assert_eq!(mock.calls_to("DELETE", TASK), 0);
    }
}

#[test]
fn test_poll_error_stops_monitoring() {
    let mock = MockTransport::new();
    mock.on("GET", TASK, task("Running", 30));
    mock.on(
        "GET",
        TASK,
        RawResponse::empty(StatusCode::INTERNAL_SERVER_ERROR),
    );
    let err = monitor().wait(&mock, TASK).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedStatus);
    assert_eq!(mock.calls_to("GET", TASK), 2);
}

#[test]
fn test_failed_delete_is_not_an_error() -> Result<(), anyhow::Error> {
    let mock = MockTransport::new();
    mock.on("GET", TASK, task("Completed", 100));
    mock.on("DELETE", TASK, RawResponse::empty(StatusCode::METHOD_NOT_ALLOWED));
    monitor().wait_and_delete(&mock, TASK)?;
    assert_eq!(mock.calls_to("DELETE", TASK), 1);
    Ok(())
}
