// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job lifecycle events.
//
// The store publishes a `JobReceivedEvent` after every successful artifact
// write.  Delivery is best-effort local dispatch over a tokio broadcast
// channel: subscribers that lag simply miss events, and a channel with no
// subscribers drops them silently.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{DocumentType, JobId};

/// Buffered events per subscriber before lagging ones start losing them.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Published after a job artifact lands in the job directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReceivedEvent {
    /// Absolute path of the persisted artifact.
    pub path: PathBuf,
    /// Artifact size in bytes.
    pub size: u64,
    pub id: JobId,
    /// MIME type derived from the detected format.
    pub mime_type: String,
    pub detected_format: DocumentType,
    /// SHA-256 of the persisted bytes, hex-encoded.
    pub sha256: String,
}

/// Sender half of the job event channel.
pub type JobEventSender = broadcast::Sender<JobReceivedEvent>;

/// Receiver half of the job event channel.
pub type JobEventReceiver = broadcast::Receiver<JobReceivedEvent>;

/// Create a job event channel.
pub fn job_event_channel() -> (JobEventSender, JobEventReceiver) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_subscribers() {
        let (tx, mut rx) = job_event_channel();
        let event = JobReceivedEvent {
            path: PathBuf::from("/tmp/print_job_1.pdf"),
            size: 42,
            id: JobId(1),
            mime_type: "application/pdf".into(),
            detected_format: DocumentType::Pdf,
            sha256: "00".repeat(32),
        };
        tx.send(event.clone()).unwrap();
        let got = rx.recv().await.unwrap();
        assert_eq!(got.id, JobId(1));
        assert_eq!(got.size, 42);
    }

    #[test]
    fn send_without_subscribers_is_best_effort() {
        let (tx, rx) = job_event_channel();
        drop(rx);
        let event = JobReceivedEvent {
            path: PathBuf::from("/tmp/print_job_2.txt"),
            size: 1,
            id: JobId(2),
            mime_type: "text/plain".into(),
            detected_format: DocumentType::PlainText,
            sha256: String::new(),
        };
        // No receivers: the send fails, which callers ignore by contract.
        assert!(tx.send(event).is_err());
    }
}
