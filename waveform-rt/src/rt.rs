// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Realtime thread scheduling helper (`spec` §5/§9): spawns a thread and
asks the host to schedule it FIFO at a given realtime priority, falling
back to default scheduling with a logged warning on platforms that
refuse (no `CAP_SYS_NICE`, no realtime scheduler, etc).
*/

use std::thread::JoinHandle;

use log::warn;
use thread_priority::{ThreadPriority, ThreadPriorityValue};

/// A realtime priority level relative to the highest FIFO priority this
/// process can obtain: `0` is highest, larger values are lower priority.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Priority(pub u8);

impl Priority {
    /// The highest realtime FIFO priority available (thread B, `spec` §5).
    pub const MAX: Priority = Priority(0);

    /// Returns a priority `offset` steps below this one (thread C runs at
    /// `MAX.offset(8)`).
    pub fn offset(self, offset: u8) -> Priority {
        Priority(self.0 + offset)
    }
}

/// Spawns `f` on a new OS thread named `name`, requesting realtime FIFO
/// scheduling at `priority`. If the host refuses realtime scheduling, logs
/// a warning and runs `f` at default scheduling instead (`spec` §9's
/// documented fallback requirement).
pub fn spawn_realtime<F>(name: &str, priority: Priority, f: F) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let name = name.to_string();
    std::thread::Builder::new().name(name.clone()).spawn(move || {
        if let Err(e) = apply_realtime_priority(priority) {
            warn!(
                "thread {name}: realtime FIFO scheduling unavailable ({e:?}), falling back to default priority"
            );
        }
        f();
    })
}

/// Highest platform priority value `thread_priority` exposes on the
/// current target; used as the top of our relative scale.
fn platform_max() -> u8 {
    u8::from(ThreadPriorityValue::try_from(99u8).unwrap_or(ThreadPriorityValue::try_from(1u8).unwrap()))
}

fn apply_realtime_priority(priority: Priority) -> Result<(), thread_priority::Error> {
    let level = platform_max().saturating_sub(priority.0).max(1);
    let value = ThreadPriorityValue::try_from(level)?;
    thread_priority::set_current_thread_priority(ThreadPriority::Crossplatform(value))
}
