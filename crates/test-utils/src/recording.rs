use std::sync::Arc;

use parking_lot::Mutex;

use hostdag::dag::{ReadyQueue, TaskNode};
use hostdag::events::{EventSink, SchedEvent};

/// Collects every scheduler event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SchedEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SchedEvent> {
        self.events.lock().clone()
    }

    pub fn filter<T>(&self, pick: impl Fn(&SchedEvent) -> Option<T>) -> Vec<T> {
        self.events.lock().iter().filter_map(pick).collect()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &SchedEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Ready queue that just remembers what was pushed, for driving the DAG
/// search by hand.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    pushed: Mutex<Vec<(Arc<TaskNode>, Option<String>)>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names in push order.
    pub fn names(&self) -> Vec<String> {
        self.pushed
            .lock()
            .iter()
            .map(|(n, _)| n.name().to_string())
            .collect()
    }

    /// Take everything pushed so far.
    pub fn drain(&self) -> Vec<Arc<TaskNode>> {
        self.pushed.lock().drain(..).map(|(n, _)| n).collect()
    }

    pub fn origins(&self) -> Vec<Option<String>> {
        self.pushed.lock().iter().map(|(_, o)| o.clone()).collect()
    }
}

impl ReadyQueue for RecordingQueue {
    fn push_ready(&self, ready: Vec<Arc<TaskNode>>, origin: Option<&str>) {
        let mut pushed = self.pushed.lock();
        for node in ready {
            pushed.push((node, origin.map(str::to_string)));
        }
    }
}
