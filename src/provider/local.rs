//! Local log directory provider
//!
//! Reads CI logs previously downloaded to disk. Layout:
//!
//! ```text
//! <root>/<workflow>/<run_id>/run.yaml     run manifest
//! <root>/<workflow>/<run_id>/<job_id>.log raw job log
//! ```

use super::traits::{CIProvider, CaseListing, FetchError, FetchedContent};
use crate::case::{CaseIdentifier, ExecutionPair, ExecutionRef, IdentifierResolver, JobPair, JobRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

pub const MANIFEST_FILE: &str = "run.yaml";
pub const LOCAL_CONTENT_TYPE: &str = "github_actions";

/// Run manifest stored next to the job logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    #[serde(default)]
    pub run_number: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub jobs: Vec<JobManifest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobManifest {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
}

/// Job ids are numeric on most providers but stored as strings
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdValue {
        Int(i64),
        Str(String),
    }

    Ok(match IdValue::deserialize(deserializer)? {
        IdValue::Int(n) => n.to_string(),
        IdValue::Str(s) => s,
    })
}

/// `CIProvider` over a directory of downloaded logs
pub struct LocalLogProvider {
    root: PathBuf,
}

impl LocalLogProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<workflow>`; the name must stay inside the root
    fn workflow_dir(&self, workflow: &str) -> Result<PathBuf, FetchError> {
        Ok(self.root.join(single_component(workflow)?))
    }

    fn run_dir(&self, workflow: &str, run_id: i64) -> Result<PathBuf, FetchError> {
        Ok(self.workflow_dir(workflow)?.join(run_id.to_string()))
    }

    /// Load one manifest; `Ok(None)` if the run directory has none
    async fn read_manifest(&self, workflow: &str, run_id: i64) -> Result<Option<RunManifest>, FetchError> {
        let path = self.run_dir(workflow, run_id)?.join(MANIFEST_FILE);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_yaml::from_str(&text)
            .map(Some)
            .map_err(|e| FetchError::InvalidManifest(format!("{}: {}", path.display(), e)))
    }

    /// Sub-directory names of `dir`; empty if `dir` does not exist
    async fn child_dirs(dir: &Path) -> Result<Vec<String>, FetchError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Every `(run_id, manifest)` for a workflow
    async fn runs(&self, workflow: &str) -> Result<Vec<(i64, RunManifest)>, FetchError> {
        let mut runs = Vec::new();
        for name in Self::child_dirs(&self.workflow_dir(workflow)?).await? {
            let Ok(run_id) = name.parse::<i64>() else {
                tracing::debug!(workflow, dir = %name, "skipping non-numeric run directory");
                continue;
            };
            if let Some(manifest) = self.read_manifest(workflow, run_id).await? {
                runs.push((run_id, manifest));
            }
        }
        Ok(runs)
    }

    async fn find_run(&self, workflow: &str, execution: ExecutionRef) -> Result<Option<(i64, RunManifest)>, FetchError> {
        match execution {
            ExecutionRef::Id(run_id) => Ok(self
                .read_manifest(workflow, run_id)
                .await?
                .map(|manifest| (run_id, manifest))),
            ExecutionRef::Number(number) => Ok(self
                .runs(workflow)
                .await?
                .into_iter()
                .find(|(_, manifest)| manifest.run_number == Some(number))),
        }
    }
}

/// Workflow names and job ids become path components verbatim
fn single_component(name: &str) -> Result<&str, FetchError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Ok(name),
        _ => Err(FetchError::InvalidName(name.to_string())),
    }
}

fn find_job<'a>(manifest: &'a RunManifest, job: &JobRef) -> Option<&'a JobManifest> {
    manifest.jobs.iter().find(|entry| match job {
        JobRef::Id(id) => &entry.id == id,
        JobRef::Action(name) => entry.name.as_deref() == Some(name.as_str()),
    })
}

#[async_trait]
impl CIProvider for LocalLogProvider {
    fn id(&self) -> &str {
        "local"
    }

    async fn list_cases(&self, workflow: Option<&str>) -> Result<Vec<CaseListing>, FetchError> {
        let workflows = match workflow {
            Some(name) => vec![name.to_string()],
            None => Self::child_dirs(&self.root).await?,
        };

        let mut listings = Vec::new();
        for workflow in &workflows {
            for (run_id, manifest) in self.runs(workflow).await? {
                for job in &manifest.jobs {
                    let case = CaseIdentifier::new(
                        workflow.as_str(),
                        Some(run_id),
                        manifest.run_number,
                        Some(job.id.clone()),
                        job.name.clone(),
                    )
                    .map_err(|e| FetchError::InvalidManifest(format!("{}/{}: {}", workflow, run_id, e)))?;
                    listings.push(CaseListing::new(case, manifest.created_at));
                }
            }
        }

        tracing::debug!(root = %self.root.display(), cases = listings.len(), "listed local cases");
        Ok(listings)
    }

    async fn fetch(&self, case: &CaseIdentifier) -> Result<FetchedContent, FetchError> {
        let workflow = case.workflow_name();
        let (run_id, manifest) = self
            .find_run(workflow, case.execution_ref())
            .await?
            .ok_or_else(|| FetchError::NotFound(format!("no run manifest for {}", case)))?;
        let job = find_job(&manifest, &case.job_ref())
            .ok_or_else(|| FetchError::NotFound(format!("no job entry for {}", case)))?;

        let log_path = self
            .run_dir(workflow, run_id)?
            .join(format!("{}.log", single_component(&job.id)?));
        let raw_content = match tokio::fs::read_to_string(&log_path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FetchError::NotFound(format!("missing log {}", log_path.display())))
            }
            Err(e) => return Err(e.into()),
        };

        let mut content = FetchedContent::new(raw_content, LOCAL_CONTENT_TYPE);
        let status = job.status.as_ref().or(manifest.status.as_ref());
        let conclusion = job.conclusion.as_ref().or(manifest.conclusion.as_ref());
        for (key, value) in [
            ("status", status),
            ("conclusion", conclusion),
            ("branch", manifest.branch.as_ref()),
            ("commit_sha", manifest.commit_sha.as_ref()),
        ] {
            if let Some(value) = value {
                content.metadata.insert(key.to_string(), value.clone());
            }
        }

        Ok(content)
    }
}

#[async_trait]
impl IdentifierResolver for LocalLogProvider {
    async fn lookup_execution(
        &self,
        workflow_name: &str,
        execution: ExecutionRef,
    ) -> Result<Option<ExecutionPair>, FetchError> {
        Ok(self
            .find_run(workflow_name, execution)
            .await?
            .map(|(run_id, manifest)| ExecutionPair {
                run_id,
                run_number: manifest.run_number,
            }))
    }

    async fn lookup_job(
        &self,
        workflow_name: &str,
        run_id: Option<i64>,
        job: &JobRef,
    ) -> Result<Option<JobPair>, FetchError> {
        // job names are only unique within one run
        let Some(run_id) = run_id else {
            return Ok(None);
        };
        let Some(manifest) = self.read_manifest(workflow_name, run_id).await? else {
            return Ok(None);
        };

        Ok(find_job(&manifest, job).map(|entry| JobPair {
            job_id: entry.id.clone(),
            action_name: entry.name.clone(),
        }))
    }
}
