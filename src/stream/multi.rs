//! Multi-source feature stream with a bounded-memory buffer pool.
//!
//! Presents an ordered list of sources as one continuous seekable stream.
//! Each source touched by the access pattern gets a pool entry holding an
//! open reader and an f32 working buffer; entries are evicted
//! oldest-opened-first whenever a new entry would push the pool past the
//! memory budget. A seek-history window bounds how far back (or forward,
//! past the high-water mark) the stream may be repositioned.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::config::{HistoricMode, ReaderConfig};
use crate::error::{FeatureError, FeatureResult};
use crate::feature::Feature;
use crate::flags::FeatureFlags;
use crate::format::FormatReader;
use crate::list::FeatureFileList;

use super::FeatureStream;

/// A deferred seek; resolved on the next read or write.
#[derive(Debug, Clone)]
enum Pending {
    Global(u64),
    Named(String, u64),
}

/// One open source with its working buffer.
#[derive(Debug)]
struct PoolEntry {
    reader: FormatReader,
    buf: Vec<f32>,
    vect_size: usize,
    feature_count: u64,
    /// Window capacity in records; equals `feature_count` unless the
    /// budget forced a clamp.
    cap_records: u64,
    window_start: u64,
    window_len: u64,
    /// Bytes charged against the pool budget.
    bytes: u64,
}

impl PoolEntry {
    fn contains(&self, local: u64) -> bool {
        local >= self.window_start && local < self.window_start + self.window_len
    }

    /// Loads the window that covers `local`. A full-capacity window
    /// always starts at record 0 so a single fill covers the whole
    /// source and in-buffer writes are never dropped by a refill.
    fn fill(&mut self, local: u64) -> FeatureResult<()> {
        let start = if self.cap_records >= self.feature_count {
            0
        } else {
            local
        };
        trace!(start, cap = self.cap_records, "refilling source window");
        let n = self.reader.read_block(start, &mut self.buf)?;
        self.window_start = start;
        self.window_len = n as u64;
        Ok(())
    }

    fn row(&self, local: u64) -> &[f32] {
        let off = (local - self.window_start) as usize * self.vect_size;
        &self.buf[off..off + self.vect_size]
    }

    fn row_mut(&mut self, local: u64) -> &mut [f32] {
        let off = (local - self.window_start) as usize * self.vect_size;
        &mut self.buf[off..off + self.vect_size]
    }
}

/// Stream over the virtual concatenation of many sources.
#[derive(Debug)]
pub struct MultiFileReader {
    list: FeatureFileList,
    cfg: ReaderConfig,
    pool: Vec<Option<PoolEntry>>,
    /// Source indices in the order their entries were opened; eviction
    /// pops the front.
    open_order: VecDeque<usize>,
    mem_used: u64,
    position: u64,
    pending: Option<Pending>,
    high_water: u64,
    exhausted: bool,
    write_fit: Option<bool>,
}

impl MultiFileReader {
    /// Creates the stream without touching the file system.
    pub fn new(names: Vec<String>, cfg: &ReaderConfig) -> Self {
        let count = names.len();
        let mut pool = Vec::with_capacity(count);
        pool.resize_with(count, || None);
        Self {
            list: FeatureFileList::new(names, cfg),
            cfg: cfg.clone(),
            pool,
            open_order: VecDeque::new(),
            mem_used: 0,
            position: 0,
            pending: None,
            high_water: 0,
            exhausted: false,
            write_fit: None,
        }
    }

    /// Bytes currently charged against the memory budget.
    pub fn mem_used(&self) -> u64 {
        self.mem_used
    }

    /// Number of sources with a live pool entry.
    pub fn open_entries(&self) -> usize {
        self.open_order.len()
    }

    fn window_allows(&self, target: u64) -> bool {
        match self.cfg.historic {
            HistoricMode::AllFeatures => true,
            HistoricMode::Limited(h) => {
                target >= self.high_water.saturating_sub(h) && target <= self.high_water
            }
        }
    }

    /// Resolves a pending seek target to a global index; `None` means an
    /// unknown source name, which reads as end of stream.
    fn resolve_target(&mut self, pending: Pending) -> FeatureResult<Option<u64>> {
        match pending {
            Pending::Global(index) => Ok(Some(index)),
            Pending::Named(name, local) => match self.list.index_of(&name) {
                Ok(idx) => Ok(Some(self.list.first_index(idx)? + local)),
                Err(FeatureError::UnknownSource { .. }) => Ok(None),
                Err(e) => Err(e),
            },
        }
    }

    /// Evicts the oldest-opened entry. Returns false when the pool is
    /// empty.
    fn evict_oldest(&mut self) -> bool {
        let Some(oldest) = self.open_order.pop_front() else {
            return false;
        };
        if let Some(entry) = self.pool[oldest].take() {
            self.mem_used -= entry.bytes;
            debug!(
                source = oldest,
                freed = entry.bytes,
                mem_used = self.mem_used,
                "evicted pool entry"
            );
        }
        true
    }

    /// Opens a pool entry for `src` under the memory budget, evicting
    /// oldest-opened entries as needed. When even an empty pool cannot
    /// accommodate the source, the window is clamped to the remaining
    /// budget instead of refusing, one record at minimum.
    fn ensure_entry(&mut self, src: usize) -> FeatureResult<()> {
        if self.pool[src].is_some() {
            return Ok(());
        }
        let info = self.list.info(src)?.clone();
        let row_bytes = (info.vect_size * 4) as u64;
        let mem_needed = info.feature_count * row_bytes;
        let budget = self.cfg.memory_budget;

        let cap_records = if budget == 0 {
            info.feature_count
        } else {
            while self.mem_used + mem_needed > budget && self.evict_oldest() {}
            if self.mem_used + mem_needed > budget && row_bytes > 0 {
                // Degraded but not zero.
                ((budget - self.mem_used) / row_bytes).max(1)
            } else {
                info.feature_count
            }
        };
        let bytes = cap_records * row_bytes;

        let path = self.list.path(src)?;
        // The pool only reads through its buffers; multi-source writes
        // stay in memory, so the file itself is opened read-only.
        let read_cfg = ReaderConfig {
            writable: false,
            ..self.cfg.clone()
        };
        let reader = FormatReader::open(&path, &read_cfg, None)?;
        debug!(
            source = src,
            buffered = bytes,
            mem_used = self.mem_used + bytes,
            "opened pool entry"
        );

        self.pool[src] = Some(PoolEntry {
            reader,
            buf: vec![0.0; (cap_records as usize) * info.vect_size],
            vect_size: info.vect_size,
            feature_count: info.feature_count,
            cap_records,
            window_start: 0,
            window_len: 0,
            bytes,
        });
        self.open_order.push_back(src);
        self.mem_used += bytes;
        Ok(())
    }

    /// Checks once whether every source's buffer can be held
    /// simultaneously, which is what accepting writes requires.
    fn ensure_write_fit(&mut self) -> FeatureResult<()> {
        let fit = match self.write_fit {
            Some(fit) => fit,
            None => {
                let fit = if self.cfg.memory_budget == 0 {
                    true
                } else {
                    let mut total = 0u64;
                    for i in 0..self.list.source_count() {
                        let info = self.list.info(i)?;
                        total += info.feature_count * (info.vect_size * 4) as u64;
                    }
                    total <= self.cfg.memory_budget
                };
                self.write_fit = Some(fit);
                fit
            }
        };
        if fit {
            Ok(())
        } else {
            Err(FeatureError::Capacity {
                reason: "memory budget too small to buffer the whole stream for writing".into(),
            })
        }
    }

    /// Resolves the pending seek, if any. `Ok(None)` means the stream is
    /// exhausted; `Ok(Some(false))` a history violation.
    fn settle_position(&mut self) -> FeatureResult<Option<bool>> {
        if let Some(pending) = self.pending.take() {
            match self.resolve_target(pending)? {
                None => {
                    self.exhausted = true;
                    return Ok(None);
                }
                Some(target) => {
                    if !self.window_allows(target) {
                        self.position = target;
                        return Ok(Some(false));
                    }
                    self.high_water = self.high_water.max(target);
                    self.position = target;
                }
            }
        }
        if self.exhausted {
            return Ok(None);
        }
        Ok(Some(true))
    }
}

impl FeatureStream for MultiFileReader {
    fn read_feature_step(&mut self, out: &mut Feature, step: u64) -> FeatureResult<bool> {
        match self.settle_position()? {
            None => return Ok(false),
            Some(false) => {
                // Too far outside the history window: flag instead of
                // surfacing stale data.
                out.set_valid(false);
                self.position = self.position.saturating_add(step);
                return Ok(true);
            }
            Some(true) => {}
        }
        let global = self.position;
        let Some((src, local)) = self.list.locate(global)? else {
            return Ok(false);
        };
        self.ensure_entry(src)?;
        let entry = self.pool[src].as_mut().expect("entry just ensured");
        if out.vect_size() != entry.vect_size {
            return Err(FeatureError::DimensionMismatch {
                got: out.vect_size(),
                want: entry.vect_size,
            });
        }
        if !entry.contains(local) {
            entry.fill(local)?;
        }
        for (o, &v) in out.values_mut().iter_mut().zip(entry.row(local)) {
            *o = v as f64;
        }
        out.set_valid(true);
        self.high_water = self.high_water.max(global);
        self.position = global + step;
        Ok(true)
    }

    fn write_feature_step(&mut self, f: &Feature, step: u64) -> FeatureResult<bool> {
        if !self.cfg.writable {
            return Err(FeatureError::Capacity {
                reason: "stream not opened with write permission".into(),
            });
        }
        self.ensure_write_fit()?;
        let want = self.vect_size()?;
        if f.vect_size() != want {
            return Err(FeatureError::DimensionMismatch {
                got: f.vect_size(),
                want,
            });
        }
        match self.settle_position()? {
            None => return Ok(false),
            Some(false) => {
                let (low, high) = match self.cfg.historic {
                    HistoricMode::Limited(h) => (self.high_water.saturating_sub(h), self.high_water),
                    HistoricMode::AllFeatures => (0, self.high_water),
                };
                return Err(FeatureError::HistoryViolation {
                    index: self.position,
                    low,
                    high,
                });
            }
            Some(true) => {}
        }
        let global = self.position;
        let Some((src, local)) = self.list.locate(global)? else {
            return Ok(false);
        };
        self.ensure_entry(src)?;
        let entry = self.pool[src].as_mut().expect("entry just ensured");
        if !entry.contains(local) {
            entry.fill(local)?;
        }
        for (slot, &v) in entry.row_mut(local).iter_mut().zip(f.values()) {
            *slot = v as f32;
        }
        self.high_water = self.high_water.max(global);
        self.position = global + step;
        Ok(true)
    }

    fn seek_feature(&mut self, index: u64) {
        self.pending = Some(Pending::Global(index));
        self.exhausted = false;
    }

    fn seek_feature_in(&mut self, source: &str, index: u64) {
        self.pending = Some(Pending::Named(source.to_string(), index));
        self.exhausted = false;
    }

    fn vect_size(&mut self) -> FeatureResult<usize> {
        Ok(self.list.info(0)?.vect_size)
    }

    fn feature_flags(&mut self) -> FeatureResult<FeatureFlags> {
        Ok(self.list.info(0)?.flags)
    }

    fn sample_rate(&mut self) -> FeatureResult<f64> {
        Ok(self.list.info(0)?.sample_rate)
    }

    fn feature_count(&mut self) -> FeatureResult<u64> {
        self.list.total_count()
    }

    fn source_count(&self) -> usize {
        self.list.source_count()
    }

    fn feature_count_of(&mut self, idx: usize) -> FeatureResult<u64> {
        Ok(self.list.info(idx)?.feature_count)
    }

    fn feature_count_of_named(&mut self, name: &str) -> FeatureResult<u64> {
        let idx = self.list.index_of(name)?;
        self.feature_count_of(idx)
    }

    fn first_index_of(&mut self, idx: usize) -> FeatureResult<u64> {
        self.list.first_index(idx)
    }

    fn first_index_of_named(&mut self, name: &str) -> FeatureResult<u64> {
        let idx = self.list.index_of(name)?;
        self.list.first_index(idx)
    }

    fn source_name(&self, idx: usize) -> FeatureResult<String> {
        Ok(self.list.name(idx)?.to_string())
    }

    fn close(&mut self) {
        for entry in &mut self.pool {
            *entry = None;
        }
        self.open_order.clear();
        self.mem_used = 0;
    }
}
