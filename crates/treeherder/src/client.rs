//! Treeherder / Taskcluster REST client.

use std::sync::Arc;

use tracing::debug;
use url::form_urlencoded::byte_serialize;

use mozbuilds_core::config::EndpointConfig;
use mozbuilds_core::{fetch_json, Result, Transport};

use crate::models::{ArtifactList, ArtifactRecord, JobList, JobRecord, PushList, PushRecord};

/// Project that author lookups search
pub const AUTHOR_PROJECT: &str = "try";

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

pub struct TreeherderClient {
    transport: Arc<dyn Transport>,
    treeherder_base: String,
    taskcluster_base: String,
}

impl TreeherderClient {
    pub fn new(transport: Arc<dyn Transport>, endpoints: &EndpointConfig) -> Self {
        Self {
            transport,
            treeherder_base: endpoints.treeherder_base.clone(),
            taskcluster_base: endpoints.taskcluster_base.clone(),
        }
    }

    pub fn push_by_revision_url(&self, project: &str, revision: &str) -> String {
        format!(
            "{}project/{}/push/?revision={}",
            self.treeherder_base,
            encode(project),
            encode(revision)
        )
    }

    pub fn pushes_by_author_url(&self, author: &str, count: u32) -> String {
        format!(
            "{}project/{}/push/?full=true&count={}&author={}",
            self.treeherder_base,
            AUTHOR_PROJECT,
            count,
            encode(author)
        )
    }

    pub fn jobs_url(&self, push_id: u64) -> String {
        format!("{}jobs/?push_id={}", self.treeherder_base, push_id)
    }

    pub fn artifacts_url(&self, task_id: &str) -> String {
        format!("{}task/{}/runs/0/artifacts", self.taskcluster_base, task_id)
    }

    /// Download URL of one task artifact
    pub fn artifact_download_url(&self, task_id: &str, artifact_name: &str) -> String {
        format!("{}task/{}/runs/0/artifacts/{}", self.taskcluster_base, task_id, artifact_name)
    }

    /// At most one push for a revision
    pub async fn push_by_revision(
        &self,
        project: &str,
        revision: &str,
    ) -> Result<Option<PushRecord>> {
        let url = self.push_by_revision_url(project, revision);
        let pushes: PushList = fetch_json(self.transport.as_ref(), &url).await?;
        Ok(pushes.results.into_iter().next())
    }

    /// Most recent pushes by an author on the try project
    pub async fn pushes_by_author(&self, author: &str, count: u32) -> Result<Vec<PushRecord>> {
        let url = self.pushes_by_author_url(author, count);
        let pushes: PushList = fetch_json(self.transport.as_ref(), &url).await?;
        Ok(pushes.results)
    }

    /// Every decodable job of a push; malformed rows are dropped
    pub async fn jobs_for_push(&self, push_id: u64) -> Result<Vec<JobRecord>> {
        let jobs: JobList = fetch_json(self.transport.as_ref(), &self.jobs_url(push_id)).await?;
        let total = jobs.results.len();
        let decoded: Vec<JobRecord> = jobs.results.iter().filter_map(JobRecord::from_row).collect();

        if decoded.len() < total {
            debug!("Skipped {} malformed job rows for push {}", total - decoded.len(), push_id);
        }
        Ok(decoded)
    }

    pub async fn artifacts_for_task(&self, task_id: &str) -> Result<Vec<ArtifactRecord>> {
        let list: ArtifactList =
            fetch_json(self.transport.as_ref(), &self.artifacts_url(task_id)).await?;
        Ok(list.artifacts)
    }
}
