//! Candidate acquisition.
//!
//! One pass walks a slot's unresolved candidates best first. Each candidate
//! gets a paused download session with every file disabled; the selected
//! file is only enabled while the disk gate allows it. Completed files are
//! probed, classified and merged into the slot's releases.
//!
//! The pass is sequential on purpose. At most one rank tier is in flight:
//! once a candidate is left pending, the pass stops after preparing the
//! session of the next one.

mod files;
mod inspect;
mod types;

pub use files::{is_media_file, select_episode_files, select_file};
pub use inspect::{inspect, InspectionFailure};
pub use types::{AcquisitionError, AcquisitionReport};

use chrono::Utc;
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::classify::{classify_streams, ClassifyContext};
use crate::config::AcquisitionConfig;
use crate::job::{Deadline, JobError, JobOutcome, JobRequest};
use crate::metrics;
use crate::object_store::{delete_prefix, ObjectStore};
use crate::prober::MediaProber;
use crate::release::{
    compare_release_candidates, CandidateStatus, DiscardReason, MergeOutcome, NewRelease,
    Release, ReleaseCandidate, TorrentLocator,
};
use crate::title::{SlotKey, SlotState, Title, TitleStore};
use crate::torrent_client::{
    AddTorrentRequest, FilePriority, TorrentClient, TorrentClientError, TorrentFile, TorrentInfo,
};

use types::Step;

pub struct AcquisitionJob {
    torrents: Arc<dyn TorrentClient>,
    prober: Arc<dyn MediaProber>,
    objects: Arc<dyn ObjectStore>,
    store: Arc<dyn TitleStore>,
    config: AcquisitionConfig,
}

impl AcquisitionJob {
    pub fn new(
        torrents: Arc<dyn TorrentClient>,
        prober: Arc<dyn MediaProber>,
        objects: Arc<dyn ObjectStore>,
        store: Arc<dyn TitleStore>,
        config: AcquisitionConfig,
    ) -> Self {
        Self {
            torrents,
            prober,
            objects,
            store,
            config,
        }
    }

    /// Load the title, run one pass over the requested slot and persist it.
    ///
    /// Progress is persisted even when the pass stops on a fatal error.
    pub async fn run(
        &self,
        request: &JobRequest,
        deadline: &Deadline,
    ) -> Result<AcquisitionReport, JobError> {
        let started = Instant::now();
        let mut title = self
            .store
            .get(&request.title_id)?
            .ok_or_else(|| JobError::TitleNotFound(request.title_id.clone()))?;
        let key = request.slot_key(&title)?;

        let result = self.acquire(&mut title, &key, deadline).await;
        self.store.put(&title)?;

        let outcome = match &result {
            Ok(report) => report.outcome.as_str(),
            Err(_) => "failed",
        };
        metrics::JOB_DURATION
            .with_label_values(&["acquisition", outcome])
            .observe(started.elapsed().as_secs_f64());

        Ok(result?)
    }

    /// Run one pass over an already loaded title. A season key covers the
    /// whole-season slot followed by each episode. The caller persists.
    pub async fn acquire(
        &self,
        title: &mut Title,
        key: &SlotKey,
        deadline: &Deadline,
    ) -> Result<AcquisitionReport, AcquisitionError> {
        if !title.has_slot(key) {
            return Err(AcquisitionError::SlotNotFound(key.to_string()));
        }
        let mut report = AcquisitionReport::default();

        for slot_key in slots_in_scope(title, key) {
            self.process_slot(title, &slot_key, deadline, &mut report)
                .await?;
            if report.outcome == JobOutcome::Partial {
                break;
            }
        }

        info!(
            slot = %key,
            outcome = %report.outcome,
            promoted = report.promoted,
            ignored = report.ignored,
            pending = report.pending,
            published = report.published,
            "Acquisition pass finished"
        );
        Ok(report)
    }

    async fn process_slot(
        &self,
        title: &mut Title,
        key: &SlotKey,
        deadline: &Deadline,
        report: &mut AcquisitionReport,
    ) -> Result<(), AcquisitionError> {
        let ranked = title
            .slot(key)
            .ok_or_else(|| AcquisitionError::SlotNotFound(key.to_string()))?
            .ranked_candidates();
        let mut previous_pending = false;

        for candidate in ranked.iter().filter(|c| !c.is_resolved()) {
            if deadline.is_expired() {
                info!(slot = %key, "Acquisition budget exhausted, pass left partial");
                report.outcome = JobOutcome::Partial;
                return Ok(());
            }

            let Some(slot) = title.slot(key) else {
                break;
            };
            if let Some(decision) = slot.prior_decision(&candidate.id) {
                debug!(slot = %key, hash = %candidate.id, "Candidate decided in an earlier run");
                resolve(title, key, &candidate.id, decision, report);
                continue;
            }
            if let Some(winner) = same_tracker_winner(slot, candidate) {
                info!(
                    slot = %key,
                    hash = %candidate.id,
                    winner = %winner,
                    tracker = %candidate.tracker,
                    "Better release from the same tracker already promoted"
                );
                self.teardown(title, key, &candidate.id).await;
                resolve(title, key, &candidate.id, CandidateStatus::Ignored, report);
                continue;
            }

            let step = match self.step(title, key, candidate, previous_pending).await {
                Ok(Some(step)) => step,
                Ok(None) => {
                    debug!(slot = %key, hash = %candidate.id, "Higher-ranked candidate still in flight");
                    break;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(slot = %key, hash = %candidate.id, error = %e, "Candidate failed, ignoring it");
                    self.teardown(title, key, &candidate.id).await;
                    Step::Ignored
                }
            };

            match step {
                Step::Pending => {
                    report.pending += 1;
                    previous_pending = true;
                }
                Step::Promoted { published } => {
                    report.published += published;
                    resolve(title, key, &candidate.id, CandidateStatus::Promoted, report);
                }
                Step::Ignored => resolve(title, key, &candidate.id, CandidateStatus::Ignored, report),
            }
        }

        self.reset_if_settled(title, key).await;
        Ok(())
    }

    /// Make sure a session exists, then move the candidate forward unless a
    /// higher-ranked one is still pending.
    async fn step(
        &self,
        title: &mut Title,
        key: &SlotKey,
        candidate: &ReleaseCandidate,
        previous_pending: bool,
    ) -> Result<Option<Step>, AcquisitionError> {
        let info = self.ensure_session(key, candidate).await?;
        if previous_pending {
            return Ok(None);
        }
        self.advance(title, key, candidate, &info).await.map(Some)
    }

    /// Return the candidate's session, adding it (paused, all files
    /// disabled) when the daemon does not know it yet.
    async fn ensure_session(
        &self,
        key: &SlotKey,
        candidate: &ReleaseCandidate,
    ) -> Result<TorrentInfo, AcquisitionError> {
        let hash = candidate.id.as_str();
        let slot_tag = self.slot_tag(key);
        match self.torrents.get_torrent(hash).await {
            Ok(mut info) => {
                if !info.tags.contains(&slot_tag) {
                    match self
                        .torrents
                        .add_tags(hash, std::slice::from_ref(&slot_tag))
                        .await
                    {
                        Ok(()) => info.tags.push(slot_tag),
                        Err(e) => {
                            warn!(slot = %key, hash = %hash, error = %e, "Failed to tag shared session")
                        }
                    }
                }
                return Ok(info);
            }
            Err(TorrentClientError::TorrentNotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let prefix = &self.config.session_tag_prefix;
        let request = match &candidate.torrent().locator {
            TorrentLocator::Magnet { uri } => AddTorrentRequest::magnet(uri.as_str()),
            TorrentLocator::StoredFile { key: object_key } => {
                AddTorrentRequest::torrent_file(self.objects.get(object_key).await?)
                    .with_paused(true)
            }
        }
        .with_tag(prefix.as_str())
        .with_tag(slot_tag);
        let is_magnet = request.is_magnet();

        self.torrents.add_torrent(request).await?;
        info!(slot = %key, hash = %hash, tracker = %candidate.tracker, "Download session added");

        let files = if is_magnet {
            let files = self.wait_for_metadata(hash).await?;
            self.torrents.pause_torrent(hash).await?;
            files
        } else {
            self.torrents.torrent_files(hash).await?
        };
        let indices: Vec<u32> = files.iter().map(|f| f.index).collect();
        if !indices.is_empty() {
            self.torrents
                .set_file_priority(hash, &indices, FilePriority::Skip)
                .await?;
        }

        Ok(self.torrents.get_torrent(hash).await?)
    }

    fn slot_tag(&self, key: &SlotKey) -> String {
        format!("{}:{key}", self.config.session_tag_prefix)
    }

    async fn wait_for_metadata(&self, hash: &str) -> Result<Vec<TorrentFile>, AcquisitionError> {
        let started = Instant::now();
        let timeout = Duration::from_secs(self.config.metadata_timeout_secs);
        let interval = Duration::from_millis(self.config.metadata_poll_interval_ms);
        loop {
            let files = self.torrents.torrent_files(hash).await?;
            if !files.is_empty() {
                return Ok(files);
            }
            if started.elapsed() >= timeout {
                return Err(AcquisitionError::MetadataTimeout(hash.to_string()));
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn advance(
        &self,
        title: &mut Title,
        key: &SlotKey,
        candidate: &ReleaseCandidate,
        info: &TorrentInfo,
    ) -> Result<Step, AcquisitionError> {
        let hash = candidate.id.as_str();
        let files = self.torrents.torrent_files(hash).await?;
        let selection = select_for_slot(title, key, candidate, &files)?;

        if selection.iter().all(|(_, f)| f.is_complete()) {
            return self.finalize(title, key, candidate, info, &selection).await;
        }

        if self.is_stalled(info) {
            metrics::STALL_DETECTIONS.inc();
            warn!(
                slot = %key,
                hash = %hash,
                state = info.state.as_str(),
                eta_secs = ?info.eta_secs,
                "Download stalled, dropping candidate"
            );
            self.teardown(title, key, hash).await;
            return Ok(Step::Ignored);
        }

        let disabled: Vec<&TorrentFile> = selection
            .iter()
            .map(|(_, f)| f)
            .filter(|f| f.priority == FilePriority::Skip)
            .collect();
        if disabled.is_empty() {
            debug!(slot = %key, hash = %hash, progress = info.progress, "Download in progress");
            return Ok(Step::Pending);
        }

        let remaining: u64 = disabled.iter().map(|f| f.remaining_bytes()).sum();
        let free = self.torrents.free_space().await?;
        if free.saturating_sub(remaining) > self.config.disk_safety_margin_bytes {
            let indices: Vec<u32> = disabled.iter().map(|f| f.index).collect();
            self.torrents
                .set_file_priority(hash, &indices, FilePriority::Normal)
                .await?;
            self.torrents.resume_torrent(hash).await?;
            info!(slot = %key, hash = %hash, files = indices.len(), remaining, "Download started");
        } else {
            metrics::DISK_GATE_DEFERRALS.inc();
            info!(
                slot = %key,
                hash = %hash,
                free,
                remaining,
                "Not enough disk space, download deferred"
            );
        }
        Ok(Step::Pending)
    }

    fn is_stalled(&self, info: &TorrentInfo) -> bool {
        let Some(added_at) = info.added_at else {
            return false;
        };
        let age_secs = (Utc::now() - added_at).num_seconds();
        let too_slow = info
            .eta_secs
            .is_some_and(|eta| eta > self.config.max_eta_secs);
        age_secs > self.config.stall_age_secs as i64 && (info.is_stalled() || too_slow)
    }

    /// Inspect and publish every selected file, then drop the session.
    async fn finalize(
        &self,
        title: &mut Title,
        key: &SlotKey,
        candidate: &ReleaseCandidate,
        info: &TorrentInfo,
        selection: &[(SlotKey, TorrentFile)],
    ) -> Result<Step, AcquisitionError> {
        let save_path = info
            .save_path
            .as_deref()
            .ok_or_else(|| AcquisitionError::MissingSavePath(candidate.id.clone()))?;

        let mut published = 0;
        for (target, file) in selection {
            let path = Path::new(save_path).join(&file.name);
            match self
                .publish_file(title, target, candidate, &path, file.size_bytes)
                .await
            {
                Ok(true) => published += 1,
                Ok(false) => {}
                Err(e) if selection.len() == 1 => return Err(e),
                Err(e) => {
                    warn!(slot = %target, hash = %candidate.id, file = %file.name, error = %e, "File rejected");
                }
            }
        }

        self.teardown(title, key, &candidate.id).await;
        if published > 0 {
            Ok(Step::Promoted { published })
        } else {
            Ok(Step::Ignored)
        }
    }

    /// Returns whether a release was published.
    async fn publish_file(
        &self,
        title: &mut Title,
        target: &SlotKey,
        candidate: &ReleaseCandidate,
        path: &Path,
        file_size: u64,
    ) -> Result<bool, AcquisitionError> {
        let probe = self.prober.probe(path).await?;
        inspect(&probe, file_size, title.runtime_secs(target), &self.config)?;

        let classified = classify_streams(
            &probe,
            &ClassifyContext {
                original_language: title.original_language,
                tracker: Some(candidate.tracker),
            },
        );
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mkv")
            .to_lowercase();
        let media_key = target.media_key(&candidate.id, &extension);
        let release = Release::new(NewRelease {
            id: candidate.id.clone(),
            rip_type: candidate.rip_type,
            resolution: candidate.resolution,
            size_bytes: probe.size_bytes.unwrap_or(file_size),
            media_key: media_key.clone(),
            tracker: Some(candidate.tracker),
            audio: classified.audio,
            subtitles: classified.subtitles,
        })?;

        let slot = title
            .slot(target)
            .ok_or_else(|| AcquisitionError::SlotNotFound(target.to_string()))?;
        if slot.releases().contains_key(&release.id) {
            metrics::RELEASES_DISCARDED
                .with_label_values(&["duplicate"])
                .inc();
            return Ok(false);
        }

        self.objects.put_file(&media_key, path).await?;

        let outcome = title
            .slot_mut(target)
            .ok_or_else(|| AcquisitionError::SlotNotFound(target.to_string()))?
            .publish(release);
        match outcome {
            MergeOutcome::Published { replaced } => {
                metrics::RELEASES_PUBLISHED.inc();
                info!(slot = %target, hash = %candidate.id, replaced = replaced.len(), "Release published");
                for entry in replaced {
                    metrics::RELEASES_REPLACED.inc();
                    if entry.release.media_key == media_key {
                        continue;
                    }
                    if let Err(e) = self.objects.delete(&entry.release.media_key).await {
                        warn!(key = %entry.release.media_key, error = %e, "Failed to delete superseded media");
                    }
                }
                Ok(true)
            }
            MergeOutcome::Discarded(DiscardReason::Duplicate) => {
                metrics::RELEASES_DISCARDED
                    .with_label_values(&["duplicate"])
                    .inc();
                Ok(false)
            }
            MergeOutcome::Discarded(DiscardReason::Dominated { by }) => {
                metrics::RELEASES_DISCARDED
                    .with_label_values(&["dominated"])
                    .inc();
                info!(slot = %target, hash = %candidate.id, by = %by, "Release dominated by a published one");
                if let Err(e) = self.objects.delete(&media_key).await {
                    warn!(key = %media_key, error = %e, "Failed to delete discarded media");
                }
                Ok(false)
            }
        }
    }

    /// Best-effort removal of a download session and its data. Sessions
    /// shared with an unresolved candidate of another slot are kept.
    async fn teardown(&self, title: &Title, key: &SlotKey, hash: &str) {
        let shared = title.slot_keys().iter().filter(|k| *k != key).any(|k| {
            title
                .slot(k)
                .and_then(|s| s.candidate(hash))
                .is_some_and(|c| !c.is_resolved())
        });
        if shared {
            debug!(slot = %key, hash = %hash, "Session shared with another slot, keeping it");
            match self.torrents.remove_tags(hash, &[self.slot_tag(key)]).await {
                Ok(()) | Err(TorrentClientError::TorrentNotFound(_)) => {}
                Err(e) => warn!(slot = %key, hash = %hash, error = %e, "Failed to untag shared session"),
            }
            return;
        }
        match self.torrents.remove_torrent(hash, true).await {
            Ok(()) | Err(TorrentClientError::TorrentNotFound(_)) => {}
            Err(e) => warn!(hash = %hash, error = %e, "Failed to remove download session"),
        }
    }

    /// Empty the candidate map once every candidate is terminal. Season
    /// and episode slots additionally wait for their season to be ready.
    async fn reset_if_settled(&self, title: &mut Title, key: &SlotKey) {
        let ready = matches!(key, SlotKey::Movie { .. })
            || title.discovery(key).is_some_and(|d| d.ready_to_process);
        let Some(slot) = title.slot_mut(key) else {
            return;
        };
        if !ready || !slot.has_candidates() || !slot.all_candidates_resolved() {
            return;
        }

        let removed = slot.reset_candidates();
        match delete_prefix(self.objects.as_ref(), &key.torrents_prefix()).await {
            Ok(deleted) => info!(
                slot = %key,
                candidates = removed.len(),
                torrents = deleted,
                "Candidate map reset"
            ),
            Err(e) => warn!(slot = %key, error = %e, "Failed to delete stored torrents"),
        }
    }
}

fn slots_in_scope(title: &Title, key: &SlotKey) -> Vec<SlotKey> {
    match key {
        SlotKey::Season { title_id, season } => {
            let episodes = title
                .season(*season)
                .map(|s| s.episodes.keys().copied().collect::<Vec<_>>())
                .unwrap_or_default();
            std::iter::once(key.clone())
                .chain(
                    episodes
                        .into_iter()
                        .map(|ep| SlotKey::episode(title_id.as_str(), *season, ep)),
                )
                .collect()
        }
        _ => vec![key.clone()],
    }
}

/// Files to download for the slot, paired with the slot each one feeds.
fn select_for_slot(
    title: &Title,
    key: &SlotKey,
    candidate: &ReleaseCandidate,
    files: &[TorrentFile],
) -> Result<Vec<(SlotKey, TorrentFile)>, AcquisitionError> {
    match key {
        SlotKey::Season { title_id, season } => {
            let episodes: Vec<u32> = title
                .season(*season)
                .map(|s| s.episodes.keys().copied().collect())
                .unwrap_or_default();
            Ok(select_episode_files(files, &episodes)?
                .into_iter()
                .map(|(ep, file)| (SlotKey::episode(title_id.as_str(), *season, ep), file))
                .collect())
        }
        SlotKey::Episode { episode, .. } => Ok(vec![(
            key.clone(),
            select_file(files, &title.names, candidate.unknown_title, Some(*episode))?,
        )]),
        SlotKey::Movie { .. } => Ok(vec![(
            key.clone(),
            select_file(files, &title.names, candidate.unknown_title, None)?,
        )]),
    }
}

/// A promoted candidate from the same language-specific tracker that ranks
/// strictly above `candidate`.
fn same_tracker_winner(slot: &SlotState, candidate: &ReleaseCandidate) -> Option<String> {
    if !candidate.tracker.is_language_specific() {
        return None;
    }
    slot.candidates()
        .find(|other| {
            other.id != candidate.id
                && other.status == CandidateStatus::Promoted
                && other.tracker == candidate.tracker
                && compare_release_candidates(Some(other), Some(candidate)) == Ordering::Greater
        })
        .map(|other| other.id.clone())
}

fn resolve(
    title: &mut Title,
    key: &SlotKey,
    id: &str,
    outcome: CandidateStatus,
    report: &mut AcquisitionReport,
) {
    let Some(slot) = title.slot_mut(key) else {
        return;
    };
    if !slot.resolve_candidate(id, outcome) {
        return;
    }
    match outcome {
        CandidateStatus::Promoted => {
            report.promoted += 1;
            metrics::CANDIDATES_RESOLVED
                .with_label_values(&["promoted"])
                .inc();
        }
        CandidateStatus::Ignored => {
            report.ignored += 1;
            metrics::CANDIDATES_RESOLVED
                .with_label_values(&["ignored"])
                .inc();
        }
        CandidateStatus::Unprocessed => {}
    }
}
