// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The data-callback worker queue (`spec` §4.3, component C3): a bounded
single-producer/single-consumer FIFO. The consumer wakes on a timed
wait standing in for the source's semaphore-with-timeout (`spec` §9),
polling a stop flag on every timeout and between items.
*/

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::waveform::{DataStream, Waveform};
use crate::wire::VitaPacket;

/// The ~1 second timed wait standing in for the source's semaphore
/// timeout (`spec` §4.3).
const WAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// One unit of work for the worker thread: a classified packet bound
/// for one waveform's data callbacks (`spec` §3).
pub struct WorkItem {
    /// The waveform whose callbacks should run.
    pub waveform: Arc<Waveform>,
    /// Which data stream this packet classified as.
    pub stream: DataStream,
    /// The packet itself.
    pub packet: VitaPacket,
}

/// The single-producer/single-consumer data-callback queue.
pub struct WorkQueue {
    items: Mutex<VecDeque<WorkItem>>,
    not_empty: Condvar,
    running: AtomicBool,
}

impl WorkQueue {
    /// Creates a new, running queue.
    pub fn new() -> Self {
        WorkQueue {
            items: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            running: AtomicBool::new(true),
        }
    }

    /// Enqueues a work item. Called from the data I/O thread (C2).
    pub fn push(&self, item: WorkItem) {
        let mut items = self.items.lock().expect("work queue lock poisoned");
        items.push_back(item);
        self.not_empty.notify_one();
    }

    /// Runs the consumer loop until [`WorkQueue::stop`] is called:
    /// blocks on the condvar with a timeout, pops and invokes one item
    /// at a time, strictly in enqueue order (`spec` §8 property 9).
    pub fn run_consumer(&self) {
        loop {
            let item = {
                let mut items = self.items.lock().expect("work queue lock poisoned");
                loop {
                    if let Some(item) = items.pop_front() {
                        break Some(item);
                    }
                    if !self.running.load(Ordering::Acquire) {
                        break None;
                    }
                    let (guard, timeout) =
                        self.not_empty.wait_timeout(items, WAIT_TIMEOUT).expect("work queue lock poisoned");
                    items = guard;
                    if timeout.timed_out() && !self.running.load(Ordering::Acquire) {
                        break None;
                    }
                }
            };
            match item {
                Some(item) => item.waveform.dispatch_data(item.stream, &item.packet),
                None => return,
            }
        }
    }

    /// Signals the consumer to stop once the queue drains (`spec` §8
    /// property 10: after shutdown, no further work item executes).
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.not_empty.notify_all();
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
