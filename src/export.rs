//! Non-interactive export of reconstructed sessions.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use opwatch_types::PhaseRecord;
use serde::Serialize;

use crate::data::session::{Session, SessionReconstructor, SessionSummary};

#[derive(Serialize)]
struct Export<'a> {
    summary: &'a SessionSummary,
    sessions: &'a [Session],
}

/// Write sessions and their summary as pretty JSON.
pub fn write_sessions(path: &Path, sessions: &[Session], summary: &SessionSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(&Export { summary, sessions })?;
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

/// Reconstruct sessions from a phases file and export them.
pub fn export_phases_file(
    phases_path: &Path,
    export_path: &Path,
    reconstructor: &SessionReconstructor,
) -> Result<SessionSummary> {
    let content = std::fs::read_to_string(phases_path)
        .with_context(|| format!("failed to read {}", phases_path.display()))?;
    let records: Vec<PhaseRecord> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", phases_path.display()))?;

    let sessions = reconstructor.reconstruct(&records);
    let summary = SessionSummary::from_sessions(&sessions);
    write_sessions(export_path, &sessions, &summary)?;
    Ok(summary)
}
