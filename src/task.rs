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
use std::{thread, time::Duration};

use tracing::{debug, info, warn};

use crate::model::Task;
use crate::network::{to_resource_path, Transport};
use crate::RedfishError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls a Redfish task at a fixed interval until it reaches a terminal
/// state. Blocks the calling thread for the whole duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskMonitor {
    poll_interval: Duration,
}

impl Default for TaskMonitor {
    fn default() -> Self {
        TaskMonitor {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl TaskMonitor {
    pub fn new(poll_interval: Duration) -> Self {
        TaskMonitor { poll_interval }
    }

    /// Returns the final task once it is Completed/OK. A task that ends in
    /// Exception, Killed or Cancelled is a `TaskFailed` error, as is any
    /// non-200 answer while polling.
    pub fn wait<T: Transport>(&self, transport: &T, task_uri: &str) -> Result<Task, RedfishError> {
        let task_uri = to_resource_path(task_uri);
        let mut last_progress = None;
        loop {
            let response = transport.get(&task_uri)?;
            if response.status != reqwest::StatusCode::OK {
                return Err(response.into_error(&task_uri));
            }
            let task: Task = response.deserialize(&task_uri)?;
            let progress = (task.task_state, task.percent_complete);
            if last_progress != Some(progress) {
                match task.percent_complete {
                    Some(p) => info!("Task {task_uri}: {} ({p}%)", task.task_state),
                    None => info!("Task {task_uri}: {}", task.task_state),
                }
                last_progress = Some(progress);
            }
            if task.task_state.is_success() {
                return Ok(task);
            }
            if task.task_state.is_failure() {
                return Err(RedfishError::TaskFailed {
                    task_uri,
                    state: task.task_state.to_string(),
                    messages: task.message_texts(),
                });
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// `wait`, then removes the finished task from the BMC. Failed tasks are
    /// left in place for inspection.
    pub fn wait_and_delete<T: Transport>(
        &self,
        transport: &T,
        task_uri: &str,
    ) -> Result<Task, RedfishError> {
        let task = self.wait(transport, task_uri)?;
        let task_uri = to_resource_path(task_uri);
        match transport.delete(&task_uri) {
            Ok(r) if r.is_success() => debug!("Deleted task {task_uri}"),
            Ok(r) => warn!("Failed to delete task {task_uri}: HTTP {}", r.status),
            Err(e) => warn!("Failed to delete task {task_uri}: {e}"),
        }
        Ok(task)
    }
}
