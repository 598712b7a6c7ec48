//! File-backed overlay publisher.
//!
//! Each push replaces the overlay file atomically so display processes that
//! poll it never read a half-written document. The `end` document repeats the
//! last published snapshot, so a poller that misses the final update still
//! sees how the race finished.

use chrono::Utc;
use fs_err as fs;
use serde::Serialize;
use std::path::{Path, PathBuf};
use timekeeper_core::{CollaboratorError, OverlayPublisher};
use timekeeper_protocol::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayPhase {
    Begin,
    Update,
    End,
}

#[derive(Debug, Serialize)]
struct OverlayDocument<'a> {
    phase: OverlayPhase,
    published_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<&'a Snapshot>,
}

pub struct OverlayFile {
    path: PathBuf,
    last: Option<Snapshot>,
}

impl OverlayFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path, last: None }
    }

    fn write(&self, phase: OverlayPhase, snapshot: Option<&Snapshot>) -> Result<(), CollaboratorError> {
        let document = OverlayDocument {
            phase,
            published_at: Utc::now().to_rfc3339(),
            snapshot,
        };
        let payload = serde_json::to_vec_pretty(&document)?;
        write_atomic(&self.path, &payload)
    }
}

impl OverlayPublisher for OverlayFile {
    fn begin(&mut self, snapshot: &Snapshot) -> Result<(), CollaboratorError> {
        self.last = Some(snapshot.clone());
        self.write(OverlayPhase::Begin, Some(snapshot))
    }

    fn update(&mut self, snapshot: &Snapshot) -> Result<(), CollaboratorError> {
        self.last = Some(snapshot.clone());
        self.write(OverlayPhase::Update, Some(snapshot))
    }

    fn end(&mut self) -> Result<(), CollaboratorError> {
        self.write(OverlayPhase::End, self.last.as_ref())
    }
}

fn write_atomic(path: &Path, payload: &[u8]) -> Result<(), CollaboratorError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| CollaboratorError::Io {
            context: "creating overlay directory".to_string(),
            source,
        })?;
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, payload).map_err(|source| CollaboratorError::Io {
        context: "writing overlay".to_string(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| CollaboratorError::Io {
        context: "committing overlay".to_string(),
        source,
    })
}
