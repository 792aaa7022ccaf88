//! Persisted program feeds.
//!
//! Each program's last good feed lives at
//! `<root>/rss/<strategy>/<program>.rss`. It is read back as the starting
//! point of the next merge and only replaced after a merge fully succeeds.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::cache::HttpCache;
use crate::feed::{Feed, FeedError};
use crate::strategy::StrategyRegistry;

const RSS_DIR: &str = "rss";
const RSS_EXTENSION: &str = "rss";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid program name: {0:?}")]
    InvalidProgram(String),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A program's freshly built feed. Never persisted as such.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub strategy: String,
    pub name: String,
    pub feed: Feed,
}

impl Program {
    pub fn rss(&self) -> Result<String, rss::Error> {
        self.feed.to_rss()
    }
}

pub struct Store<'r> {
    registry: &'r StrategyRegistry,
    cache: HttpCache,
    rss_dir: PathBuf,
}

impl<'r> Store<'r> {
    /// Opens (creating if needed) the store under `root`.
    pub async fn new(
        root: &Path,
        registry: &'r StrategyRegistry,
        cache: HttpCache,
    ) -> Result<Self, StoreError> {
        let rss_dir = root.join(RSS_DIR);
        tokio::fs::create_dir_all(&rss_dir)
            .await
            .map_err(|e| StoreError::io(&rss_dir, e))?;

        Ok(Self {
            registry,
            cache,
            rss_dir,
        })
    }

    pub fn rss_dir(&self) -> &Path {
        &self.rss_dir
    }

    /// Path of the persisted feed of `program`.
    pub fn feed_path(&self, strategy: &str, program: &str) -> PathBuf {
        self.rss_dir
            .join(strategy)
            .join(format!("{}.{}", program, RSS_EXTENSION))
    }

    /// Rebuilds `program` from the live site and persists the result.
    ///
    /// # Errors
    ///
    /// - [`StoreError::UnknownStrategy`] - no strategy registered as `strategy`
    /// - [`StoreError::InvalidProgram`] - `program` is not a plain file name
    /// - [`StoreError::Feed`] - the merge failed; the persisted feed is untouched
    /// - [`StoreError::Io`] - the new feed could not be written
    pub async fn get(&self, strategy: &str, program: &str) -> Result<Program, StoreError> {
        let source = self
            .registry
            .get(strategy)
            .ok_or_else(|| StoreError::UnknownStrategy(strategy.to_owned()))?;
        validate_program(program)?;

        let path = self.feed_path(strategy, program);
        let prior = load_prior(&path).await;

        let feed = source.fetch(&self.cache, program, prior.as_ref()).await?;
        let rss = feed.to_rss().map_err(FeedError::from)?;

        let dir = self.rss_dir.join(strategy);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        atomic_write(&path, rss.as_bytes()).await?;

        tracing::info!(
            strategy = %strategy,
            program = %program,
            items = feed.items.len(),
            "Feed updated"
        );

        Ok(Program {
            strategy: strategy.to_owned(),
            name: program.to_owned(),
            feed,
        })
    }

    /// Rebuilds every persisted program. Failures are logged and skipped.
    pub async fn list(&self) -> Result<Vec<Program>, StoreError> {
        let mut programs = Vec::new();

        for (strategy, program) in self.persisted().await? {
            match self.get(&strategy, &program).await {
                Ok(p) => programs.push(p),
                Err(e) => {
                    tracing::warn!(
                        strategy = %strategy,
                        program = %program,
                        error = %e,
                        "Skipping program"
                    );
                }
            }
        }
        Ok(programs)
    }

    /// `(strategy, program)` pairs with a persisted feed, sorted.
    async fn persisted(&self) -> Result<Vec<(String, String)>, StoreError> {
        let mut found = Vec::new();

        for strategy_dir in read_dir(&self.rss_dir).await? {
            if !strategy_dir.is_dir() {
                continue;
            }
            let Some(strategy) = file_name(&strategy_dir) else {
                continue;
            };

            for file in read_dir(&strategy_dir).await? {
                let is_feed = file.extension().is_some_and(|ext| ext == RSS_EXTENSION);
                if !is_feed {
                    continue;
                }
                if let Some(program) = file.file_stem().and_then(|s| s.to_str()) {
                    found.push((strategy.clone(), program.to_owned()));
                }
            }
        }

        found.sort();
        Ok(found)
    }
}

fn validate_program(program: &str) -> Result<(), StoreError> {
    let invalid = program.is_empty()
        || program.starts_with('.')
        || program.contains(['/', '\\', '?', '#'])
        || program.chars().any(char::is_control);

    if invalid {
        return Err(StoreError::InvalidProgram(program.to_owned()));
    }
    Ok(())
}

/// Previous feed at `path`; missing or unreadable files mean no history.
async fn load_prior(path: &Path) -> Option<Feed> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Cannot read persisted feed, starting over"
            );
            return None;
        }
    };

    match Feed::from_rss(&bytes) {
        Ok(feed) => Some(feed),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Corrupt persisted feed, starting over"
            );
            None
        }
    }
}

/// Replaces `dst` with `content` through a temp file and a rename, so
/// readers never see a half-written feed.
async fn atomic_write(dst: &Path, content: &[u8]) -> Result<(), StoreError> {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", suffix));

    let result = async {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        drop(file);

        // rename fails on Windows when the destination exists
        #[cfg(windows)]
        if tokio::fs::try_exists(dst).await? {
            tokio::fs::remove_file(dst).await?;
        }

        tokio::fs::rename(&temp_path, dst).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(StoreError::io(dst, e));
    }
    Ok(())
}

async fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::io(dir, e))?
    {
        paths.push(entry.path());
    }
    Ok(paths)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()?.to_str().map(str::to_owned)
}
