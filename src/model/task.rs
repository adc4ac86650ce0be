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

use serde::{Deserialize, Serialize};

use crate::model::Message;

/// https://redfish.dmtf.org/schemas/v1/Task.v1_7_0.json
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct Task {
    #[serde(rename = "@odata.id", default)]
    pub odata_id: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub task_state: TaskState,
    pub task_status: Option<String>,
    pub percent_complete: Option<i64>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Task {
    pub fn message_texts(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter_map(|m| m.message.clone())
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    New,
    Starting,
    Running,
    Suspended,
    Interrupted,
    Pending,
    Stopping,
    Completed,
    Killed,
    Exception,
    Service,
    Cancelling,
    Cancelled,
    // Some XCC firmware levels report OK instead of Completed.
    #[serde(rename = "OK")]
    Ok,
    #[serde(other)]
    Unknown,
}

impl TaskState {
    pub fn is_success(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Ok)
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            TaskState::Exception | TaskState::Killed | TaskState::Cancelled
        )
    }

    pub fn is_terminal(self) -> bool {
        self.is_success() || self.is_failure()
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Ok => f.write_str("OK"),
            s => fmt::Debug::fmt(s, f),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_task_deserialize() {
        let data = r##"{
            "@odata.id": "/redfish/v1/TaskService/Tasks/5",
            "@odata.type": "#Task.v1_4_3.Task",
            "Id": "5",
            "Name": "Firmware update task",
            "PercentComplete": 42,
            "TaskState": "Running",
            "TaskStatus": "OK",
            "Messages": [{"MessageId": "Update.1.0.TransferringToComponent", "Message": "Transferring image."}]
        }"##;
        let task: Task = serde_json::from_str(data).unwrap();
        assert_eq!(task.task_state, TaskState::Running);
        assert!(!task.task_state.is_terminal());
        assert_eq!(task.percent_complete, Some(42));
        assert_eq!(task.message_texts(), vec!["Transferring image.".to_string()]);
    }

    #[test]
    fn test_terminal_states() {
        let ok: TaskState = serde_json::from_str("\"OK\"").unwrap();
        assert!(ok.is_success());
        assert!(TaskState::Completed.is_success());
        assert!(TaskState::Exception.is_failure());
        assert!(TaskState::Cancelled.is_failure());
        let odd: TaskState = serde_json::from_str("\"Verifying\"").unwrap();
        assert_eq!(odd, TaskState::Unknown);
        assert!(!odd.is_terminal());
        assert_eq!(TaskState::Ok.to_string(), "OK");
    }
}
