//! Temporary log directories in the layout `LocalLogProvider` reads

use chrono::{DateTime, Utc};
use scout::provider::{JobManifest, RunManifest, MANIFEST_FILE};
use std::path::Path;
use tempfile::TempDir;

pub struct LogDir {
    dir: TempDir,
}

impl LogDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a run manifest plus one log per `(job_id, job_name, log)`
    pub fn add_run(
        &self,
        workflow: &str,
        run_id: i64,
        run_number: i64,
        created_at: DateTime<Utc>,
        jobs: &[(&str, &str, &str)],
    ) {
        let run_dir = self.path().join(workflow).join(run_id.to_string());
        std::fs::create_dir_all(&run_dir).unwrap();

        let manifest = RunManifest {
            run_number: Some(run_number),
            created_at,
            status: Some("completed".into()),
            conclusion: Some("failure".into()),
            branch: Some("main".into()),
            commit_sha: Some(format!("sha-{}", run_id)),
            jobs: jobs
                .iter()
                .map(|(id, name, _)| JobManifest {
                    id: id.to_string(),
                    name: Some(name.to_string()),
                    status: None,
                    conclusion: None,
                })
                .collect(),
        };
        std::fs::write(run_dir.join(MANIFEST_FILE), serde_yaml::to_string(&manifest).unwrap()).unwrap();

        for (id, _, log) in jobs {
            std::fs::write(run_dir.join(format!("{}.log", id)), log).unwrap();
        }
    }
}
