//! Treeherder Resolution Pipeline
//!
//! Resolves a revision or an author to downloadable APK artifacts:
//! 1. push lookup (by revision, or recent pushes by author)
//! 2. jobs of the push, keeping signed non-test builds
//! 3. artifacts of every retained job, fetched concurrently
//! 4. the push comment worth showing
//!
//! Stage failures are values: an empty stage ends the lookup with an
//! [`EmptyReason`], and one job's failed artifact fetch only empties that job.

use std::fmt;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use mozbuilds_core::{MozBuildsError, Result};

use crate::client::TreeherderClient;
use crate::models::{ArtifactRecord, JobRecord, PushRecord};

/// Why a lookup produced nothing to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    NoPush,
    NoJobs,
    NoArtifacts,
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EmptyReason::NoPush => "No push found",
            EmptyReason::NoJobs => "No jobs found matching criteria",
            EmptyReason::NoArtifacts => "No APK artifacts found",
        })
    }
}

/// Outcome of a lookup that reached the server
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Found(T),
    Empty(EmptyReason),
}

impl<T> Resolution<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Resolution::Found(value) => Some(value),
            Resolution::Empty(_) => None,
        }
    }
}

/// A retained job with its APK artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobArtifacts {
    pub job: JobRecord,
    pub artifacts: Vec<ArtifactRecord>,
}

/// A push resolved down to its artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResolution {
    pub push: PushRecord,
    pub comment: String,
    pub jobs: Vec<JobArtifacts>,
}

/// Jobs worth downloading from: signed builds that are not tests
pub fn retain_signed_builds(jobs: Vec<JobRecord>) -> Vec<JobRecord> {
    jobs.into_iter()
        .filter(|job| job.is_signed_build() && !job.is_test())
        .collect()
}

pub struct TreeherderPipeline {
    client: TreeherderClient,
    fanout_limit: usize,
    author_push_count: u32,
}

impl TreeherderPipeline {
    pub fn new(client: TreeherderClient, fanout_limit: usize, author_push_count: u32) -> Self {
        Self {
            client,
            fanout_limit: fanout_limit.max(1),
            author_push_count,
        }
    }

    pub fn client(&self) -> &TreeherderClient {
        &self.client
    }

    /// Resolve one revision on a project
    pub async fn resolve_revision(
        &self,
        project: &str,
        revision: &str,
    ) -> Result<Resolution<PushResolution>> {
        info!("Resolving revision {} on {}", revision, project);
        match self.client.push_by_revision(project, revision).await? {
            Some(push) => self.resolve_push(push).await,
            None => {
                info!("No push for revision {}", revision);
                Ok(Resolution::Empty(EmptyReason::NoPush))
            }
        }
    }

    /// Resolve an author's recent try pushes. Pushes that fail or come up
    /// empty are left out; the first error is returned only when no push
    /// resolved and at least one failed.
    pub async fn resolve_author(&self, author: &str) -> Result<Resolution<Vec<PushResolution>>> {
        info!("Resolving pushes by {}", author);
        let pushes = self.client.pushes_by_author(author, self.author_push_count).await?;
        if pushes.is_empty() {
            return Ok(Resolution::Empty(EmptyReason::NoPush));
        }

        let outcomes: Vec<Result<Resolution<PushResolution>>> = stream::iter(pushes)
            .map(|push| self.resolve_push(push))
            .buffered(self.fanout_limit)
            .collect()
            .await;

        let mut resolved = Vec::new();
        let mut first_error: Option<MozBuildsError> = None;
        let mut first_empty: Option<EmptyReason> = None;

        for outcome in outcomes {
            match outcome {
                Ok(Resolution::Found(push)) => resolved.push(push),
                Ok(Resolution::Empty(reason)) => {
                    first_empty.get_or_insert(reason);
                }
                Err(e) => {
                    warn!("Push lookup for {} failed: {}", author, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if !resolved.is_empty() {
            return Ok(Resolution::Found(resolved));
        }
        match (first_empty, first_error) {
            (Some(reason), _) => Ok(Resolution::Empty(reason)),
            (None, Some(e)) => Err(e),
            (None, None) => Ok(Resolution::Empty(EmptyReason::NoJobs)),
        }
    }

    /// Stages 2 to 4 for one push
    pub async fn resolve_push(&self, push: PushRecord) -> Result<Resolution<PushResolution>> {
        let jobs = self.client.jobs_for_push(push.id).await?;
        let total = jobs.len();
        let jobs = retain_signed_builds(jobs);
        debug!("Push {}: {} of {} jobs are signed builds", push.id, jobs.len(), total);

        if jobs.is_empty() {
            return Ok(Resolution::Empty(EmptyReason::NoJobs));
        }

        let jobs = self.fetch_artifacts(jobs).await?;
        if jobs.is_empty() {
            return Ok(Resolution::Empty(EmptyReason::NoArtifacts));
        }

        let comment = push.relevant_comment();
        Ok(Resolution::Found(PushResolution { push, comment, jobs }))
    }

    /// Fetch every job's artifacts concurrently and wait for all of them.
    ///
    /// A failed fetch empties that job only. Jobs left without APKs are
    /// dropped. When every fetch failed the first error is returned.
    pub async fn fetch_artifacts(&self, jobs: Vec<JobRecord>) -> Result<Vec<JobArtifacts>> {
        let outcomes: Vec<(JobRecord, Result<Vec<ArtifactRecord>>)> = stream::iter(jobs)
            .map(|job| async move {
                let artifacts = self.client.artifacts_for_task(&job.task_id).await;
                (job, artifacts)
            })
            .buffered(self.fanout_limit)
            .collect()
            .await;

        let any_succeeded = outcomes.iter().any(|(_, result)| result.is_ok());
        let mut first_error = None;
        let mut resolved = Vec::new();

        for (job, result) in outcomes {
            let artifacts = match result {
                Ok(artifacts) => artifacts,
                Err(e) => {
                    warn!("Artifacts for task {} unavailable: {}", job.task_id, e);
                    first_error.get_or_insert(e);
                    Vec::new()
                }
            };

            let apks: Vec<ArtifactRecord> = artifacts.into_iter().filter(|a| a.is_apk()).collect();
            if apks.is_empty() {
                debug!("Task {} has no APK artifacts", job.task_id);
                continue;
            }
            resolved.push(JobArtifacts { job, artifacts: apks });
        }

        match first_error {
            Some(e) if !any_succeeded => Err(e),
            _ => Ok(resolved),
        }
    }
}
