/// A decision taken while publishing. Reported before the matching action runs,
/// so a failed run's log shows how far it got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    ReadDeclared {
        count: usize,
    },
    FetchedRemote {
        count: usize,
    },
    /// Dry run narrowed the declared set down to a single playlist.
    Sampled {
        name: String,
        skipped: usize,
    },
    Creating {
        name: String,
    },
    UpdatingDescription {
        name: String,
    },
    AddingTracks {
        name: String,
        count: usize,
    },
    RemovingTracks {
        name: String,
        count: usize,
    },
    Deleting {
        name: String,
    },
    /// A declared playlist is now published under different ids than last run.
    Republished {
        source_id: String,
        previous: Vec<String>,
        current: Vec<String>,
    },
    PreviousMappingIgnored {
        reason: String,
    },
    Finished(RunSummary),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub described: usize,
    pub tracks_added: usize,
    pub tracks_removed: usize,
}

/// Sink for publishing decisions.
pub trait Reporter: Send + Sync {
    fn report(&self, event: SyncEvent);
}

/// Writes every event as a structured `tracing` line.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: SyncEvent) {
        match event {
            SyncEvent::ReadDeclared { count } => {
                tracing::info!(count, "Read declared playlists")
            }
            SyncEvent::FetchedRemote { count } => {
                tracing::info!(count, "Fetched remote playlists")
            }
            SyncEvent::Sampled { name, skipped } => {
                tracing::info!(playlist = %name, skipped, "Dry run restricted to one playlist")
            }
            SyncEvent::Creating { name } => {
                tracing::info!(playlist = %name, "Creating playlist")
            }
            SyncEvent::UpdatingDescription { name } => {
                tracing::info!(playlist = %name, "Updating playlist description")
            }
            SyncEvent::AddingTracks { name, count } => {
                tracing::info!(playlist = %name, count, "Adding tracks to playlist")
            }
            SyncEvent::RemovingTracks { name, count } => {
                tracing::info!(playlist = %name, count, "Removing tracks from playlist")
            }
            SyncEvent::Deleting { name } => {
                tracing::info!(playlist = %name, "Unsubscribing from playlist")
            }
            SyncEvent::Republished {
                source_id,
                previous,
                current,
            } => {
                tracing::info!(
                    source_id = %source_id,
                    previous = ?previous,
                    current = ?current,
                    "Published playlist ids changed"
                )
            }
            SyncEvent::PreviousMappingIgnored { reason } => {
                tracing::warn!(%reason, "Ignoring previous playlist mapping")
            }
            SyncEvent::Finished(summary) => {
                tracing::info!(
                    created = summary.created,
                    updated = summary.updated,
                    deleted = summary.deleted,
                    described = summary.described,
                    tracks_added = summary.tracks_added,
                    tracks_removed = summary.tracks_removed,
                    "Publish finished"
                )
            }
        }
    }
}

/// Keeps events in memory, in the order they were reported.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: std::sync::Mutex<Vec<SyncEvent>>,
}

#[cfg(test)]
impl RecordingReporter {
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Reporter for RecordingReporter {
    fn report(&self, event: SyncEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_reporter_keeps_order() {
        let reporter = RecordingReporter::default();
        reporter.report(SyncEvent::Creating { name: "B".into() });
        reporter.report(SyncEvent::Deleting { name: "A".into() });

        assert_eq!(
            reporter.events(),
            vec![
                SyncEvent::Creating { name: "B".into() },
                SyncEvent::Deleting { name: "A".into() },
            ]
        );
    }
}
