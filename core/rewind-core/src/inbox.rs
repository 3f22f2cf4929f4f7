//! Inbound queue for host buffer events.
//!
//! Hosts push events from whatever thread they fire on; a dispatcher thread
//! drains the queue. Events are stamped with the shared clock on the way in,
//! so queueing delay does not skew the override heuristic.

use crate::clock::Clock;
use crate::feedback::FeedbackSink;
use crate::recorder::TransitionRecorder;
use rewind_daemon_protocol::BufferEvent;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

enum InboxMessage {
    Event {
        event: BufferEvent,
        observed_at: u64,
    },
    Shutdown,
}

/// Cloneable producer side of the inbox.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<InboxMessage>,
    clock: Arc<dyn Clock>,
}

impl EventSender {
    /// Enqueues `event`. Returns false once the inbox has shut down.
    pub fn send(&self, event: BufferEvent) -> bool {
        let observed_at = self.clock.now_micros();
        self.tx
            .send(InboxMessage::Event { event, observed_at })
            .is_ok()
    }
}

pub struct EventInbox {
    sender: EventSender,
    worker: Option<JoinHandle<()>>,
}

impl EventInbox {
    pub fn spawn(
        recorder: Arc<TransitionRecorder>,
        feedback: Arc<dyn FeedbackSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || dispatch(rx, recorder, feedback));
        Self {
            sender: EventSender { tx, clock },
            worker: Some(worker),
        }
    }

    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Delivers everything queued so far, then stops the dispatcher.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = self.sender.tx.send(InboxMessage::Shutdown);
        if worker.join().is_err() {
            tracing::error!("Event dispatcher panicked");
        }
    }
}

impl Drop for EventInbox {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn dispatch(
    rx: Receiver<InboxMessage>,
    recorder: Arc<TransitionRecorder>,
    feedback: Arc<dyn FeedbackSink>,
) {
    for message in rx {
        match message {
            InboxMessage::Event { event, observed_at } => {
                tracing::debug!(event = %event, observed_at, "Buffer event received");
                if event.is_transition_begin() {
                    recorder.record_at(observed_at);
                } else {
                    feedback.on_buffer_event(event);
                }
            }
            InboxMessage::Shutdown => break,
        }
    }
    tracing::debug!("Event dispatcher stopped");
}
