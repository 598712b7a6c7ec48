//! Results finalizer backed by an append-only JSONL file.
//!
//! `finalize` only enqueues; a dedicated writer thread does the I/O so the
//! timekeeper loop never waits on disk.

use chrono::Utc;
use fs_err as fs;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use timekeeper_core::{CollaboratorError, ResultsFinalizer};
use timekeeper_protocol::Snapshot;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct ResultRecord<'a> {
    finished_at: String,
    session: &'a Snapshot,
}

pub struct ResultsLog {
    sender: Sender<Snapshot>,
}

impl ResultsLog {
    pub fn spawn(path: PathBuf) -> std::io::Result<(Self, JoinHandle<()>)> {
        let (sender, receiver) = mpsc::channel();
        let join = thread::Builder::new()
            .name("results-writer".to_string())
            .spawn(move || run_writer(&path, receiver))?;
        Ok((Self { sender }, join))
    }
}

impl ResultsFinalizer for ResultsLog {
    fn finalize(&mut self, snapshot: &Snapshot) -> Result<(), CollaboratorError> {
        self.sender
            .send(snapshot.clone())
            .map_err(|_| CollaboratorError::Unavailable("results writer stopped".to_string()))
    }
}

fn run_writer(path: &Path, receiver: Receiver<Snapshot>) {
    for snapshot in receiver {
        match append_result(path, &snapshot) {
            Ok(()) => info!(
                path = %path.display(),
                laps = snapshot.laps.len(),
                "Race result recorded"
            ),
            Err(err) => warn!(
                error = %err,
                path = %path.display(),
                "Failed to record race result"
            ),
        }
    }
}

fn append_result(path: &Path, snapshot: &Snapshot) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("Failed to create results directory: {}", err))?;
    }

    let record = ResultRecord {
        finished_at: Utc::now().to_rfc3339(),
        session: snapshot,
    };
    let mut line = serde_json::to_vec(&record)
        .map_err(|err| format!("Failed to serialize race result: {}", err))?;
    line.push(b'\n');

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| format!("Failed to open results file: {}", err))?;
    file.write_all(&line)
        .map_err(|err| format!("Failed to append race result: {}", err))
}
