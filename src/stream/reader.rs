//! Stream facade.
//!
//! Picks the right reader composition for an input: a plain name opens
//! one source, a `.lst` file or an explicit name list opens the virtual
//! concatenation. Everything behind the facade speaks the same
//! [`FeatureStream`] contract.

use crate::config::{HistoricMode, ReaderConfig};
use crate::error::{FeatureError, FeatureResult};
use crate::feature::Feature;
use crate::flags::FeatureFlags;

use super::multi::MultiFileReader;
use super::single::SingleFileReader;
use super::FeatureStream;

/// A feature stream over one source or a list of sources.
#[derive(Debug)]
pub enum FeatureReader {
    Single(SingleFileReader),
    Multi(MultiFileReader),
}

impl FeatureReader {
    /// Opens a stream for `name`.
    ///
    /// A name ending in `.lst` is read as a source-list file, one source
    /// name per line (blank lines and surrounding whitespace ignored),
    /// resolved as a plain filesystem path; the listed names then go
    /// through the configured path and extension conventions. Any other
    /// name opens that single source. A limited-history configuration
    /// always takes the multi-source path since that is where the history
    /// window lives.
    pub fn open(name: &str, cfg: &ReaderConfig) -> FeatureResult<Self> {
        if name.ends_with(".lst") {
            let text = std::fs::read_to_string(name)
                .map_err(|e| FeatureError::from_io(name, e))?;
            let names: Vec<String> = text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
            return Ok(Self::open_list(names, cfg));
        }
        if cfg.historic != HistoricMode::AllFeatures {
            return Ok(Self::open_list(vec![name.to_string()], cfg));
        }
        Ok(FeatureReader::Single(SingleFileReader::new(name, cfg)))
    }

    /// Opens the virtual concatenation of the given sources.
    pub fn open_list(names: Vec<String>, cfg: &ReaderConfig) -> Self {
        FeatureReader::Multi(MultiFileReader::new(names, cfg))
    }
}

macro_rules! delegate {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            FeatureReader::Single($inner) => $body,
            FeatureReader::Multi($inner) => $body,
        }
    };
}

impl FeatureStream for FeatureReader {
    fn read_feature_step(&mut self, out: &mut Feature, step: u64) -> FeatureResult<bool> {
        delegate!(self, s => s.read_feature_step(out, step))
    }

    fn write_feature_step(&mut self, f: &Feature, step: u64) -> FeatureResult<bool> {
        delegate!(self, s => s.write_feature_step(f, step))
    }

    fn seek_feature(&mut self, index: u64) {
        delegate!(self, s => s.seek_feature(index))
    }

    fn seek_feature_in(&mut self, source: &str, index: u64) {
        delegate!(self, s => s.seek_feature_in(source, index))
    }

    fn vect_size(&mut self) -> FeatureResult<usize> {
        delegate!(self, s => s.vect_size())
    }

    fn feature_flags(&mut self) -> FeatureResult<FeatureFlags> {
        delegate!(self, s => s.feature_flags())
    }

    fn sample_rate(&mut self) -> FeatureResult<f64> {
        delegate!(self, s => s.sample_rate())
    }

    fn feature_count(&mut self) -> FeatureResult<u64> {
        delegate!(self, s => s.feature_count())
    }

    fn source_count(&self) -> usize {
        delegate!(self, s => s.source_count())
    }

    fn feature_count_of(&mut self, idx: usize) -> FeatureResult<u64> {
        delegate!(self, s => s.feature_count_of(idx))
    }

    fn feature_count_of_named(&mut self, name: &str) -> FeatureResult<u64> {
        delegate!(self, s => s.feature_count_of_named(name))
    }

    fn first_index_of(&mut self, idx: usize) -> FeatureResult<u64> {
        delegate!(self, s => s.first_index_of(idx))
    }

    fn first_index_of_named(&mut self, name: &str) -> FeatureResult<u64> {
        delegate!(self, s => s.first_index_of_named(name))
    }

    fn source_name(&self, idx: usize) -> FeatureResult<String> {
        delegate!(self, s => s.source_name(idx))
    }

    fn close(&mut self) {
        delegate!(self, s => s.close())
    }
}
