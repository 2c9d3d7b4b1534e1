use crate::domain::{ValidatorError, ValidatorResult};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};

pub const HITS_DIRECTORY: &str = "hits";
pub const PARTICLES_DIRECTORY: &str = "particles_simulation";
const SHARD_PATTERN: &str = "*.json";
const ENCODED_PATTERN: &str = "*.encoded.json";

/// Input and output files of shard `task_id` (numbered from 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPaths {
    pub task_id: usize,
    pub particles: PathBuf,
    pub hits: PathBuf,
    pub output: PathBuf,
}

impl ShardPaths {
    pub fn new(output_path: &Path, task_id: usize) -> Self {
        let hits_directory = output_path.join(HITS_DIRECTORY);
        Self {
            task_id,
            particles: output_path
                .join(PARTICLES_DIRECTORY)
                .join(format!("{task_id}.json")),
            hits: hits_directory.join(format!("{task_id}.json")),
            output: hits_directory.join(format!("{task_id}.encoded.json")),
        }
    }
}

fn compile(pattern: &str) -> ValidatorResult<GlobSet> {
    let glob = Glob::new(pattern).map_err(|source| {
        ValidatorError::internal(
            "INTERNAL.GLOB",
            format!("invalid glob pattern '{}': {}", pattern, source),
        )
    })?;
    GlobSetBuilder::new().add(glob).build().map_err(|source| {
        ValidatorError::internal(
            "INTERNAL.GLOB",
            format!("invalid glob pattern '{}': {}", pattern, source),
        )
    })
}

/// Number of simulated hit shards under `output_path/hits`; exported
/// artifacts living next to them are not counted.
pub fn discover_shards(output_path: &Path) -> ValidatorResult<usize> {
    let directory = output_path.join(HITS_DIRECTORY);
    let entries = fs::read_dir(&directory).map_err(|source| {
        ValidatorError::io_system(
            "IO.SHARD_DISCOVERY",
            format!("failed to list '{}': {}", directory.display(), source),
        )
    })?;

    let shards = compile(SHARD_PATTERN)?;
    let encoded = compile(ENCODED_PATTERN)?;
    let mut count = 0usize;
    for entry in entries {
        let entry = entry.map_err(|source| {
            ValidatorError::io_system(
                "IO.SHARD_DISCOVERY",
                format!("failed to list '{}': {}", directory.display(), source),
            )
        })?;
        let name = entry.file_name();
        if shards.is_match(&name) && !encoded.is_match(&name) {
            count += 1;
        }
    }
    Ok(count)
}
