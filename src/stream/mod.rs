//! Feature stream abstraction.
//!
//! Every reader presents the same contract: a seekable sequence of
//! fixed-width feature vectors with lazily resolved stream metadata and a
//! source-list view. [`single::SingleFileReader`] serves one backing file,
//! [`multi::MultiFileReader`] a virtual concatenation of many,
//! [`mask::MaskedStream`] projects any stream onto a dimension subset and
//! [`reader::FeatureReader`] picks the right composition for an input
//! name.

pub mod mask;
pub mod multi;
pub mod reader;
pub mod single;

use crate::error::FeatureResult;
use crate::feature::Feature;
use crate::flags::FeatureFlags;

/// Common contract of every feature stream.
///
/// Positions are feature indices, global to the stream. Metadata getters
/// take `&mut self` because the first call may have to open a backing
/// file; the result is memoized.
pub trait FeatureStream {
    /// Fills `out` with the feature at the current position and advances
    /// the position by `step`. Returns `Ok(false)` at end of stream. A
    /// position rejected by the stream's history policy yields `Ok(true)`
    /// with `out` flagged invalid instead of stale data.
    fn read_feature_step(&mut self, out: &mut Feature, step: u64) -> FeatureResult<bool>;

    /// [`read_feature_step`](Self::read_feature_step) with step 1.
    fn read_feature(&mut self, out: &mut Feature) -> FeatureResult<bool> {
        self.read_feature_step(out, 1)
    }

    /// Writes `f` at the current position and advances by `step`.
    /// Returns `Ok(false)` past the end of the stream. Fails when the
    /// stream is not writable, the width does not match, or the position
    /// violates the history policy.
    fn write_feature_step(&mut self, f: &Feature, step: u64) -> FeatureResult<bool>;

    /// [`write_feature_step`](Self::write_feature_step) with step 1.
    fn write_feature(&mut self, f: &Feature) -> FeatureResult<bool> {
        self.write_feature_step(f, 1)
    }

    /// Sets the next read/write position. Never fails: an out-of-range
    /// index surfaces as end-of-stream on the next access.
    fn seek_feature(&mut self, index: u64);

    /// Sets the next position to a local index within the named source.
    /// Never fails: an unknown name surfaces as end-of-stream.
    fn seek_feature_in(&mut self, source: &str, index: u64);

    /// Back to the first feature.
    fn reset(&mut self) {
        self.seek_feature(0);
    }

    /// Width of the stream's vectors.
    fn vect_size(&mut self) -> FeatureResult<usize>;

    /// Acoustic sub-parts carried by the vectors.
    fn feature_flags(&mut self) -> FeatureResult<FeatureFlags>;

    /// Frame rate in Hz.
    fn sample_rate(&mut self) -> FeatureResult<f64>;

    /// Total number of features across all sources.
    fn feature_count(&mut self) -> FeatureResult<u64>;

    /// Number of backing sources.
    fn source_count(&self) -> usize;

    /// Feature count of source `idx`.
    fn feature_count_of(&mut self, idx: usize) -> FeatureResult<u64>;

    /// Feature count of the named source.
    fn feature_count_of_named(&mut self, name: &str) -> FeatureResult<u64>;

    /// Global index of the first feature of source `idx`.
    fn first_index_of(&mut self, idx: usize) -> FeatureResult<u64>;

    /// Global index of the first feature of the named source.
    fn first_index_of_named(&mut self, name: &str) -> FeatureResult<u64>;

    /// Name of source `idx`.
    fn source_name(&self, idx: usize) -> FeatureResult<String>;

    /// Releases every held OS file handle. Metadata stays memoized and
    /// later accesses reopen lazily.
    fn close(&mut self);
}
