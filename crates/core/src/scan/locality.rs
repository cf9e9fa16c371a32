//! Locality hints for scan ranges
//!
//! Storage systems that expose block placement let the scheduler prefer
//! workers on hosts that already hold the bytes of a range. A
//! [`BlockLocator`] reports the block layout of a file; the
//! [`LocalityAssigner`] ranks the hosts of the blocks a range overlaps.
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::ScanRangeDescriptor;

/// Placement of one block of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLocation {
    /// First byte of the block
    pub offset: u64,
    /// Length of the block in bytes
    pub length: u64,
    /// Hosts holding a replica of the block, in storage preference order
    pub hosts: Vec<String>,
}

impl BlockLocation {
    /// Create a block location
    pub fn new(offset: u64, length: u64, hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            offset,
            length,
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }

    fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    fn overlap(&self, start: u64, end: u64) -> u64 {
        self.end().min(end).saturating_sub(self.offset.max(start))
    }

    fn contains(&self, offset: u64) -> bool {
        self.offset <= offset && offset < self.end()
    }
}

/// Source of block placement for data files.
pub trait BlockLocator: Send + Sync + Debug {
    /// Block layout of the file at `path`. Empty when unknown.
    fn block_locations(&self, path: &str) -> Vec<BlockLocation>;
}

/// Locator for storage without locality information.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBlockLocations;

impl BlockLocator for NoBlockLocations {
    fn block_locations(&self, _path: &str) -> Vec<BlockLocation> {
        Vec::new()
    }
}

/// Locator serving a fixed map of block layouts.
#[derive(Debug, Default, Clone)]
pub struct StaticBlockLocations {
    files: HashMap<String, Vec<BlockLocation>>,
}

impl StaticBlockLocations {
    /// Create an empty locator
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the block layout of a file
    pub fn with_file(mut self, path: impl Into<String>, blocks: Vec<BlockLocation>) -> Self {
        self.files.insert(path.into(), blocks);
        self
    }
}

impl BlockLocator for StaticBlockLocations {
    fn block_locations(&self, path: &str) -> Vec<BlockLocation> {
        self.files.get(path).cloned().unwrap_or_default()
    }
}

/// Attaches candidate hosts to scan range descriptors.
#[derive(Debug, Clone)]
pub struct LocalityAssigner {
    locator: Arc<dyn BlockLocator>,
    max_hosts: usize,
}

impl LocalityAssigner {
    /// Create an assigner keeping at most `max_hosts` hosts per range
    pub fn new(locator: Arc<dyn BlockLocator>, max_hosts: usize) -> Self {
        Self { locator, max_hosts }
    }

    /// Attach candidate hosts to `descriptor`.
    ///
    /// Hosts are ordered by the number of bytes of the range they hold, ties
    /// keeping the order in which the storage reports them. Never fails; a
    /// range without locality information gets an empty list.
    pub fn assign_locations(&self, descriptor: ScanRangeDescriptor) -> ScanRangeDescriptor {
        let blocks = self.locator.block_locations(descriptor.path());
        let hosts = self.rank_hosts(&blocks, descriptor.start(), descriptor.end());
        trace!(
            path = descriptor.path(),
            start = descriptor.start(),
            hosts = ?hosts,
            "assigned candidate hosts"
        );
        descriptor.with_candidate_hosts(hosts)
    }

    fn rank_hosts(&self, blocks: &[BlockLocation], start: u64, end: u64) -> Vec<String> {
        // (host, bytes held) in order of first appearance
        let mut ranked: Vec<(&str, u64)> = Vec::new();
        if start == end {
            if let Some(block) = blocks.iter().find(|b| b.contains(start)) {
                for host in &block.hosts {
                    credit(&mut ranked, host, 0);
                }
            }
        } else {
            for block in blocks {
                let bytes = block.overlap(start, end);
                if bytes > 0 {
                    for host in &block.hosts {
                        credit(&mut ranked, host, bytes);
                    }
                }
            }
        }

        // stable, so ties keep their reported order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
            .into_iter()
            .take(self.max_hosts)
            .map(|(host, _)| host.to_string())
            .collect()
    }
}

fn credit<'a>(ranked: &mut Vec<(&'a str, u64)>, host: &'a str, bytes: u64) {
    if host.is_empty() {
        return;
    }
    match ranked.iter_mut().find(|(h, _)| *h == host) {
        Some((_, held)) => *held += bytes,
        None => ranked.push((host, bytes)),
    }
}
