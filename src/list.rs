//! Source-list index.
//!
//! Maps an ordered list of source names to per-source metadata and the
//! prefix-sum table that turns a global feature index into a
//! (source, local index) pair. Metadata is harvested lazily, one source at
//! a time in list order, by opening the file, parsing its header and
//! closing it again; nothing is harvested that the access pattern does not
//! require.

use std::collections::HashMap;

use crate::config::ReaderConfig;
use crate::error::{FeatureError, FeatureResult};
use crate::flags::FeatureFlags;
use crate::format::FormatReader;

/// Memoized metadata of one source.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub vect_size: usize,
    pub sample_rate: f64,
    pub flags: FeatureFlags,
    pub feature_count: u64,
}

/// Ordered list of sources with lazily harvested metadata and prefix sums.
#[derive(Debug)]
pub struct FeatureFileList {
    cfg: ReaderConfig,
    names: Vec<String>,
    name_index: HashMap<String, usize>,
    infos: Vec<SourceInfo>,
    prefix: Vec<u64>,
    total: u64,
}

impl FeatureFileList {
    /// Builds the list over the given names. Duplicate names are allowed;
    /// name lookups resolve to the first occurrence.
    pub fn new(names: Vec<String>, cfg: &ReaderConfig) -> Self {
        let mut name_index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            name_index.entry(name.clone()).or_insert(i);
        }
        // Harvesting only reads headers, never needs write access.
        let cfg = ReaderConfig {
            writable: false,
            ..cfg.clone()
        };
        Self {
            cfg,
            names,
            name_index,
            infos: Vec::new(),
            prefix: Vec::new(),
            total: 0,
        }
    }

    pub fn source_count(&self) -> usize {
        self.names.len()
    }

    /// Name of source `idx`.
    pub fn name(&self, idx: usize) -> FeatureResult<&str> {
        self.names
            .get(idx)
            .map(String::as_str)
            .ok_or(FeatureError::IndexOutOfRange {
                index: idx,
                count: self.names.len(),
            })
    }

    /// Index of the first source with the given name.
    pub fn index_of(&self, name: &str) -> FeatureResult<usize> {
        self.name_index
            .get(name)
            .copied()
            .ok_or_else(|| FeatureError::UnknownSource {
                name: name.to_string(),
            })
    }

    /// Resolved path of source `idx`.
    pub fn path(&self, idx: usize) -> FeatureResult<String> {
        Ok(self.cfg.source_path(self.name(idx)?))
    }

    /// Harvests metadata up to and including source `upto`.
    fn resolve_to(&mut self, upto: usize) -> FeatureResult<()> {
        while self.infos.len() <= upto {
            let idx = self.infos.len();
            let path = self.cfg.source_path(&self.names[idx]);
            let reader = FormatReader::open(&path, &self.cfg, None)?;
            let h = reader.header();
            let info = SourceInfo {
                vect_size: h.vect_size,
                sample_rate: h.sample_rate,
                flags: h.flags,
                feature_count: h.feature_count,
            };
            // Every source must agree with the first one on width.
            if let Some(first) = self.infos.first() {
                if info.vect_size != first.vect_size {
                    return Err(FeatureError::malformed(
                        &path,
                        format!(
                            "vector size {} differs from the stream's {}",
                            info.vect_size, first.vect_size
                        ),
                    ));
                }
            }
            self.prefix.push(self.total);
            self.total += info.feature_count;
            self.infos.push(info);
        }
        Ok(())
    }

    /// Metadata of source `idx`, harvesting it on first access.
    pub fn info(&mut self, idx: usize) -> FeatureResult<&SourceInfo> {
        if idx >= self.names.len() {
            return Err(FeatureError::IndexOutOfRange {
                index: idx,
                count: self.names.len(),
            });
        }
        self.resolve_to(idx)?;
        Ok(&self.infos[idx])
    }

    /// Global index of the first feature of source `idx`.
    pub fn first_index(&mut self, idx: usize) -> FeatureResult<u64> {
        self.info(idx)?;
        Ok(self.prefix[idx])
    }

    /// Total feature count over every source.
    pub fn total_count(&mut self) -> FeatureResult<u64> {
        if !self.names.is_empty() {
            self.resolve_to(self.names.len() - 1)?;
        }
        Ok(self.total)
    }

    /// Maps a global index to its (source, local index) pair, resolving
    /// only as many sources as the index requires. `None` past the end.
    pub fn locate(&mut self, global: u64) -> FeatureResult<Option<(usize, u64)>> {
        while self.total <= global && self.infos.len() < self.names.len() {
            self.resolve_to(self.infos.len())?;
        }
        if global >= self.total {
            return Ok(None);
        }
        // Last source whose first index is <= global; empty sources in
        // between have equal prefix entries and are skipped.
        let idx = self.prefix.partition_point(|&p| p <= global) - 1;
        Ok(Some((idx, global - self.prefix[idx])))
    }
}
