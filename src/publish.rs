use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr};

use crate::mapping::IdentityMapping;
use crate::playlist_types::SourcePlaylist;
use crate::ports::spotify::PlaylistService;
use crate::readme::update_readme;
use crate::reconcile::{
    ActionPlan, ReconcileError, Reconciliation, WorkingSet, narrow_to_sample, reconcile,
};
use crate::reporter::{Reporter, RunSummary, SyncEvent};
use crate::source::load_declared_playlists;

/// Dry runs only look at this many remote playlists, to stay clear of rate limits.
const DRY_RUN_SAMPLE_SIZE: usize = 1;
const PLACEHOLDER_ID_PREFIX: &str = "playlist_id:";

/// Stand-in remote id for a playlist a dry run pretends to create.
fn placeholder_id(name: &str) -> String {
    format!("{}{}", PLACEHOLDER_ID_PREFIX, name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// Reconcile a single sampled playlist without mutating the remote account.
    DryRun,
    /// Apply every action to the remote account.
    Production,
}

impl PublishMode {
    pub fn from_prod_flag(prod: bool) -> Self {
        if prod { Self::Production } else { Self::DryRun }
    }
}

#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub plan: ActionPlan,
    pub mapping: IdentityMapping,
    /// Remote id of every declared playlist, keyed by name
    pub published: BTreeMap<String, String>,
    pub summary: RunSummary,
}

pub struct PublishService<C: PlaylistService> {
    client: C,
    reporter: Arc<dyn Reporter>,
    mode: PublishMode,
}

impl<C: PlaylistService> PublishService<C> {
    pub fn new(client: C, reporter: Arc<dyn Reporter>, mode: PublishMode) -> Self {
        Self {
            client,
            reporter,
            mode,
        }
    }

    /// Reads the snapshots in `playlists_dir`, converges the remote account and
    /// writes the resulting mapping to `mapping_path`. In production the
    /// playlist index of `readme_path` is regenerated as well.
    ///
    /// Snapshots are read before any remote call, so a malformed archive never
    /// causes a partial publish.
    pub async fn publish(
        &self,
        playlists_dir: &Path,
        mapping_path: &Path,
        readme_path: Option<&Path>,
    ) -> Result<PublishOutcome> {
        let snapshots_dir = playlists_dir.to_path_buf();
        let declared = tokio::task::spawn_blocking(move || load_declared_playlists(&snapshots_dir))
            .await
            .wrap_err("Snapshot reader panicked")??;
        self.reporter.report(SyncEvent::ReadDeclared {
            count: declared.len(),
        });

        let outcome = self.publish_declared(&declared).await?;

        self.report_republished(mapping_path, &outcome.mapping).await;
        outcome.mapping.write(mapping_path).await?;
        tracing::info!(
            path = %mapping_path.display(),
            playlists = outcome.mapping.len(),
            "Wrote playlist mapping"
        );

        if let Some(readme_path) = readme_path {
            if self.mode == PublishMode::Production {
                update_readme(readme_path, &outcome.published).await?;
                tracing::info!(path = %readme_path.display(), "Updated playlist index");
            }
        }

        Ok(outcome)
    }

    pub async fn publish_declared(&self, declared: &[SourcePlaylist]) -> Result<PublishOutcome> {
        let limit = match self.mode {
            PublishMode::Production => None,
            PublishMode::DryRun => Some(DRY_RUN_SAMPLE_SIZE),
        };
        let remote = self.client.fetch_playlists(limit).await?;
        self.reporter
            .report(SyncEvent::FetchedRemote { count: remote.len() });

        let declared = match self.mode {
            PublishMode::Production => declared,
            PublishMode::DryRun => {
                let sampled = remote.first().ok_or(ReconcileError::EmptyRemoteSample)?;
                let (narrowed, skipped) = narrow_to_sample(declared, &sampled.name)?;
                self.reporter.report(SyncEvent::Sampled {
                    name: sampled.name.clone(),
                    skipped,
                });
                narrowed
            }
        };

        let Reconciliation { plan, mut working } = reconcile(declared, &remote)?;
        let mut summary = RunSummary::default();

        self.create_playlists(&plan, &mut working, &mut summary).await?;
        self.update_descriptions(declared, &plan, &mut working, &mut summary)
            .await?;
        self.sync_tracks(declared, &plan, &mut working, &mut summary).await?;
        self.delete_playlists(&plan, &working, &mut summary).await?;

        let mapping = working.identity_mapping(declared)?;
        let published = working.published_ids(declared)?;
        self.reporter.report(SyncEvent::Finished(summary));

        Ok(PublishOutcome {
            plan,
            mapping,
            published,
            summary,
        })
    }

    async fn create_playlists(
        &self,
        plan: &ActionPlan,
        working: &mut WorkingSet,
        summary: &mut RunSummary,
    ) -> Result<()> {
        for name in &plan.to_create {
            self.reporter
                .report(SyncEvent::Creating { name: name.clone() });
            let playlist_id = match self.mode {
                PublishMode::Production => self.client.create_playlist(name).await?,
                PublishMode::DryRun => placeholder_id(name),
            };
            working.register_created(name, playlist_id);
            summary.created += 1;
        }
        Ok(())
    }

    async fn update_descriptions(
        &self,
        declared: &[SourcePlaylist],
        plan: &ActionPlan,
        working: &mut WorkingSet,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let descriptions: BTreeMap<&str, &str> = declared
            .iter()
            .filter(|playlist| plan.to_describe.contains(&playlist.name))
            .map(|playlist| (playlist.name.as_str(), playlist.description.as_str()))
            .collect();

        for (name, description) in descriptions {
            self.reporter.report(SyncEvent::UpdatingDescription {
                name: name.to_string(),
            });
            if self.mode == PublishMode::Production {
                let playlist_id = working
                    .get(name)
                    .map(|remote| remote.id.clone())
                    .ok_or_else(|| ReconcileError::Unpublished {
                        name: name.to_string(),
                    })?;
                self.client.update_details(&playlist_id, description).await?;
            }
            working.set_description(name, description)?;
            summary.described += 1;
        }
        Ok(())
    }

    async fn sync_tracks(
        &self,
        declared: &[SourcePlaylist],
        plan: &ActionPlan,
        working: &mut WorkingSet,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let mut ordered: Vec<&SourcePlaylist> = declared.iter().collect();
        ordered.sort_by(|a, b| a.name.cmp(&b.name));

        for playlist in ordered {
            let delta = working.track_delta(playlist)?;
            if delta.is_empty() {
                continue;
            }
            let playlist_id = working
                .get(&playlist.name)
                .map(|remote| remote.id.clone())
                .ok_or_else(|| ReconcileError::Unpublished {
                    name: playlist.name.clone(),
                })?;

            if !delta.to_add.is_empty() {
                self.reporter.report(SyncEvent::AddingTracks {
                    name: playlist.name.clone(),
                    count: delta.to_add.len(),
                });
                if self.mode == PublishMode::Production {
                    let track_ids: Vec<String> = delta.to_add.iter().cloned().collect();
                    self.client.add_tracks(&playlist_id, &track_ids).await?;
                }
                summary.tracks_added += delta.to_add.len();
            }

            if !delta.to_remove.is_empty() {
                self.reporter.report(SyncEvent::RemovingTracks {
                    name: playlist.name.clone(),
                    count: delta.to_remove.len(),
                });
                if self.mode == PublishMode::Production {
                    let track_ids: Vec<String> = delta.to_remove.iter().cloned().collect();
                    self.client.remove_tracks(&playlist_id, &track_ids).await?;
                }
                summary.tracks_removed += delta.to_remove.len();
            }

            if plan.to_update.contains_key(&playlist.name) {
                summary.updated += 1;
            }
            working.apply(&playlist.name, &delta)?;
        }
        Ok(())
    }

    async fn delete_playlists(
        &self,
        plan: &ActionPlan,
        working: &WorkingSet,
        summary: &mut RunSummary,
    ) -> Result<()> {
        for name in &plan.to_delete {
            self.reporter
                .report(SyncEvent::Deleting { name: name.clone() });
            if self.mode == PublishMode::Production {
                let remote = working
                    .get(name)
                    .ok_or_else(|| ReconcileError::Unpublished { name: name.clone() })?;
                self.client.delete_playlist(&remote.id).await?;
            }
            summary.deleted += 1;
        }
        Ok(())
    }

    /// Reports declared playlists whose published ids differ from the mapping on disk.
    async fn report_republished(&self, mapping_path: &Path, mapping: &IdentityMapping) {
        let previous = match IdentityMapping::read(mapping_path).await {
            Ok(Some(previous)) => previous,
            Ok(None) => return,
            Err(err) => {
                self.reporter.report(SyncEvent::PreviousMappingIgnored {
                    reason: format!("{:#}", err),
                });
                return;
            }
        };

        for (source_id, current) in mapping.iter() {
            match previous.get(source_id) {
                Some(before) if before != current => {
                    self.reporter.report(SyncEvent::Republished {
                        source_id: source_id.to_string(),
                        previous: before.to_vec(),
                        current: current.to_vec(),
                    });
                }
                _ => {}
            }
        }
    }
}
