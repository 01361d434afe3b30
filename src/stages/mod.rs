//! The five upload stages and the two maintenance operations.
//!
//! Stages run in a fixed order; each reads its items from the transform
//! output (or from upstream stage results) and writes its own result
//! partitions under the build directory:
//!
//! ```text
//! assets -> authors -> topics -> post-references -> posts
//! ```
//!
//! A stage only starts once its existing-record indexes are built; an
//! index failure aborts the stage before any item is claimed.

pub mod assets;
pub mod authors;
pub mod maintenance;
pub mod posts;
pub mod references;
pub mod topics;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::config::Settings;
use crate::engine::persist::{self, load_results, persist_results};
use crate::engine::{PoolConfig, RateGate, StageContext, Uploader, WorkerPool};
use crate::error::{Error, Result};
use crate::event::{LogObserver, ProgressObserver};
use crate::model::{ResultSet, Summary};
use crate::store::RecordService;

/// One upload stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Assets,
    Authors,
    Topics,
    PostReferences,
    Posts,
}

impl Stage {
    /// Every stage, in dependency order.
    pub const ALL: [Stage; 5] = [
        Stage::Assets,
        Stage::Authors,
        Stage::Topics,
        Stage::PostReferences,
        Stage::Posts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Assets => "assets",
            Stage::Authors => "authors",
            Stage::Topics => "topics",
            Stage::PostReferences => "post-references",
            Stage::Posts => "posts",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| Error::Other(format!("unknown stage: {s}")))
    }
}

/// Paths under the build directory.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    /// Where stage results go; the build directory unless redirected.
    results: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            results: root.clone(),
            root,
        }
    }

    /// Keep reading inputs from the build directory but write (and read
    /// upstream) stage results under `<build>/<name>/`.
    pub fn with_results_in(mut self, name: &str) -> Self {
        self.results = self.root.join(name);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Raw downloaded pages of one source collection.
    pub fn source_dir(&self, collection: &str) -> PathBuf {
        self.root.join("wordpress").join(collection)
    }

    /// A transform output file, e.g. `posts.json`.
    pub fn transformed(&self, file: &str) -> PathBuf {
        self.root.join("transformed").join(file)
    }

    /// Result partitions of one stage.
    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.results.join(stage.as_str())
    }

    /// Result partitions of a maintenance run.
    pub fn maintenance_dir(&self, operation: &str) -> PathBuf {
        self.results.join("maintenance").join(operation)
    }
}

/// Everything a stage run needs besides its items.
#[derive(Clone)]
pub struct Migration {
    pub service: Arc<dyn RecordService>,
    pub settings: Settings,
    pub locale: String,
    pub layout: Layout,
    pub observer: Arc<dyn ProgressObserver>,
    /// Overrides every stage's configured concurrency.
    pub concurrency: Option<usize>,
}

impl Migration {
    pub fn new(
        service: Arc<dyn RecordService>,
        settings: Settings,
        locale: impl Into<String>,
        layout: Layout,
    ) -> Self {
        Self {
            service,
            settings,
            locale: locale.into(),
            layout,
            observer: Arc::new(LogObserver),
            concurrency: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_concurrency(mut self, concurrency: Option<usize>) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Stage context and pool tuning for `name`.
    pub fn context(&self, name: &str) -> (StageContext, PoolConfig) {
        let pool = self.settings.pool_for(name);
        let mut config = PoolConfig::from(&pool);
        if let Some(n) = self.concurrency {
            config.concurrency = n;
        }
        let ctx = StageContext::new(
            Arc::clone(&self.service),
            RateGate::new(pool.api_delay()),
            self.locale.clone(),
        )
        .with_schema(
            self.settings.content_types.clone(),
            self.settings.entries.clone(),
        );
        (ctx, config)
    }

    /// Run one stage. With `retry_failed`, only the items in the stage's
    /// previous `failed.json` are reprocessed and the earlier done and
    /// skipped partitions are kept.
    pub async fn run_stage(&self, stage: Stage, retry_failed: bool) -> Result<Summary> {
        let (ctx, pool) = self.context(stage.as_str());
        let layout = &self.layout;
        match stage {
            Stage::Assets => {
                let uploader = assets::AssetUploader::prepare(ctx).await?;
                let items = fresh(retry_failed, layout.transformed(assets::INPUT)).await?;
                self.execute(stage, uploader, items, pool, retry_failed).await
            }
            Stage::Authors => {
                let uploader = authors::AuthorUploader::prepare(ctx).await?;
                let items = fresh(retry_failed, layout.transformed(authors::INPUT)).await?;
                self.execute(stage, uploader, items, pool, retry_failed).await
            }
            Stage::Topics => {
                let uploader = topics::TopicUploader::prepare(ctx).await?;
                let items = fresh(retry_failed, layout.transformed(topics::INPUT)).await?;
                self.execute(stage, uploader, items, pool, retry_failed).await
            }
            Stage::PostReferences => {
                let uploader = references::ReferenceUploader::prepare(ctx, layout).await?;
                let items = fresh(retry_failed, layout.transformed(references::INPUT)).await?;
                self.execute(stage, uploader, items, pool, retry_failed).await
            }
            Stage::Posts => {
                let uploader = posts::PostUploader::prepare(ctx, layout).await?;
                let items = if retry_failed {
                    Vec::new()
                } else {
                    persist::load_completed(&layout.stage_dir(Stage::PostReferences)).await?
                };
                self.execute(stage, uploader, items, pool, retry_failed).await
            }
        }
    }

    /// Run every stage in order. Stops at the first stage that cannot
    /// start; item failures do not stop later stages.
    pub async fn run_all(&self) -> Result<Vec<(Stage, Summary)>> {
        let mut summaries = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            let summary = self.run_stage(stage, false).await?;
            if summary.failed > 0 {
                warn!(%stage, failed = summary.failed, "stage finished with failures");
            }
            summaries.push((stage, summary));
        }
        Ok(summaries)
    }

    async fn execute<U: Uploader>(
        &self,
        stage: Stage,
        uploader: U,
        items: Vec<U::Item>,
        pool: PoolConfig,
        retry_failed: bool,
    ) -> Result<Summary> {
        let dir = self.layout.stage_dir(stage);
        let (items, previous) = if retry_failed {
            let previous: ResultSet<U::Item, U::Output> = load_results(&dir).await?;
            let items = previous.failed.iter().map(|f| f.item.clone()).collect();
            (items, Some(previous))
        } else {
            (items, None)
        };
        self.drain(stage.as_str(), &dir, uploader, items, pool, previous)
            .await
    }

    /// Run the pool over `items` and persist the partitions into `dir`.
    pub(crate) async fn drain<U: Uploader>(
        &self,
        name: &str,
        dir: &Path,
        uploader: U,
        items: Vec<U::Item>,
        pool: PoolConfig,
        previous: Option<ResultSet<U::Item, U::Output>>,
    ) -> Result<Summary> {
        let mut results = WorkerPool::new(name, items, pool)
            .with_observer(Arc::clone(&self.observer))
            .run(Arc::new(uploader))
            .await;
        let summary = results.summary();
        info!(stage = name, %summary, "stage finished");

        if let Some(previous) = previous {
            let mut done = previous.done;
            done.append(&mut results.done);
            results.done = done;
            let mut skipped = previous.skipped;
            skipped.append(&mut results.skipped);
            results.skipped = skipped;
        }
        persist_results(dir, &results).await?;
        Ok(summary)
    }
}

/// Items from a transform output, unless this is a retry run.
async fn fresh<T: DeserializeOwned>(retry_failed: bool, path: PathBuf) -> Result<Vec<T>> {
    if retry_failed {
        return Ok(Vec::new());
    }
    if !tokio::fs::try_exists(&path).await? {
        return Err(Error::NotFound(format!(
            "{} (has transform run?)",
            path.display()
        )));
    }
    persist::read_json(&path).await
}
