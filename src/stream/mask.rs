//! Dimension-selection decorator.
//!
//! Wraps any stream and projects every vector onto an ordered subset of
//! its dimensions on read, scattering back to full width on write. The
//! subset comes from a mask expression: comma-separated zero-based
//! indices or `a-b` ranges, e.g. `"1-2,10-11,24,26,33-35"`. Overlapping
//! ranges collapse; the special expression `"NO_MASK"` disables
//! projection and the empty string selects nothing at all.

use crate::error::{FeatureError, FeatureResult};
use crate::feature::Feature;
use crate::flags::FeatureFlags;

use super::FeatureStream;

/// A parsed dimension selection.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mask {
    /// Pass vectors through untouched.
    None,
    /// Project onto these source dimensions, in ascending order.
    Select(Vec<usize>),
}

fn invalid(reason: impl Into<String>) -> FeatureError {
    FeatureError::InvalidMask {
        reason: reason.into(),
    }
}

fn parse_index(segment: &str, part: &str) -> FeatureResult<usize> {
    if part.is_empty() {
        return Err(invalid(format!("empty index in segment \"{segment}\"")));
    }
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(format!("non-digit in segment \"{segment}\"")));
    }
    part.parse::<usize>()
        .map_err(|_| invalid(format!("index out of range in segment \"{segment}\"")))
}

fn parse_mask(expr: &str) -> FeatureResult<Mask> {
    if expr == "NO_MASK" {
        return Ok(Mask::None);
    }
    if expr.is_empty() {
        // Zero-width projection, explicitly allowed.
        return Ok(Mask::Select(Vec::new()));
    }
    let mut selected: Vec<bool> = Vec::new();
    for segment in expr.split(',') {
        let (a, b) = match segment.split_once('-') {
            Some((lo, hi)) => (parse_index(segment, lo)?, parse_index(segment, hi)?),
            None => {
                let i = parse_index(segment, segment)?;
                (i, i)
            }
        };
        if a > b {
            return Err(invalid(format!("descending range \"{segment}\"")));
        }
        if selected.len() <= b {
            selected.resize(b + 1, false);
        }
        for flag in &mut selected[a..=b] {
            *flag = true;
        }
    }
    let selection: Vec<usize> = selected
        .iter()
        .enumerate()
        .filter_map(|(i, &on)| on.then_some(i))
        .collect();
    Ok(Mask::Select(selection))
}

/// Stream decorator projecting vectors onto a dimension subset.
#[derive(Debug)]
pub struct MaskedStream<S: FeatureStream> {
    inner: S,
    mask: Mask,
    /// Full-width staging vector; keeps its previous values so unselected
    /// dimensions survive a masked write.
    scratch: Option<Feature>,
}

impl<S: FeatureStream> MaskedStream<S> {
    /// Wraps `inner` with no mask (pass-through).
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            mask: Mask::None,
            scratch: None,
        }
    }

    /// Wraps `inner` with the given mask expression.
    pub fn with_mask(inner: S, expr: &str) -> FeatureResult<Self> {
        let mut stream = Self::new(inner);
        stream.set_mask(expr)?;
        Ok(stream)
    }

    /// Replaces the mask. A malformed expression is an error and leaves
    /// the previous mask in place.
    pub fn set_mask(&mut self, expr: &str) -> FeatureResult<()> {
        self.mask = parse_mask(expr)?;
        Ok(())
    }

    /// Number of selected dimensions, or `None` when no mask is active.
    pub fn selection_size(&self) -> Option<usize> {
        match &self.mask {
            Mask::None => None,
            Mask::Select(sel) => Some(sel.len()),
        }
    }

    /// The wrapped stream.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

}

impl<S: FeatureStream> FeatureStream for MaskedStream<S> {
    fn read_feature_step(&mut self, out: &mut Feature, step: u64) -> FeatureResult<bool> {
        let Mask::Select(selection) = &self.mask else {
            return self.inner.read_feature_step(out, step);
        };
        if self.scratch.is_none() {
            self.scratch = Some(Feature::new(self.inner.vect_size()?));
        }
        let scratch = self.scratch.as_mut().expect("scratch just created");
        if !self.inner.read_feature_step(scratch, step)? {
            return Ok(false);
        }
        if out.vect_size() != selection.len() {
            return Err(FeatureError::DimensionMismatch {
                got: out.vect_size(),
                want: selection.len(),
            });
        }
        let full = scratch.values();
        for (slot, &dim) in out.values_mut().iter_mut().zip(selection) {
            *slot = full[dim];
        }
        out.set_valid(scratch.is_valid());
        out.set_label_code(scratch.label_code());
        Ok(true)
    }

    fn write_feature_step(&mut self, f: &Feature, step: u64) -> FeatureResult<bool> {
        let Mask::Select(selection) = &self.mask else {
            return self.inner.write_feature_step(f, step);
        };
        if f.vect_size() != selection.len() {
            return Err(FeatureError::DimensionMismatch {
                got: f.vect_size(),
                want: selection.len(),
            });
        }
        if self.scratch.is_none() {
            self.scratch = Some(Feature::new(self.inner.vect_size()?));
        }
        let scratch = self.scratch.as_mut().expect("scratch just created");
        for (&dim, &v) in selection.iter().zip(f.values()) {
            scratch.values_mut()[dim] = v;
        }
        scratch.set_valid(f.is_valid());
        scratch.set_label_code(f.label_code());
        self.inner.write_feature_step(scratch, step)
    }

    fn seek_feature(&mut self, index: u64) {
        self.inner.seek_feature(index);
    }

    fn seek_feature_in(&mut self, source: &str, index: u64) {
        self.inner.seek_feature_in(source, index);
    }

    /// Selection size while a mask is active, the inner width otherwise.
    fn vect_size(&mut self) -> FeatureResult<usize> {
        match &self.mask {
            Mask::None => self.inner.vect_size(),
            Mask::Select(sel) => Ok(sel.len()),
        }
    }

    fn feature_flags(&mut self) -> FeatureResult<FeatureFlags> {
        self.inner.feature_flags()
    }

    fn sample_rate(&mut self) -> FeatureResult<f64> {
        self.inner.sample_rate()
    }

    fn feature_count(&mut self) -> FeatureResult<u64> {
        self.inner.feature_count()
    }

    fn source_count(&self) -> usize {
        self.inner.source_count()
    }

    fn feature_count_of(&mut self, idx: usize) -> FeatureResult<u64> {
        self.inner.feature_count_of(idx)
    }

    fn feature_count_of_named(&mut self, name: &str) -> FeatureResult<u64> {
        self.inner.feature_count_of_named(name)
    }

    fn first_index_of(&mut self, idx: usize) -> FeatureResult<u64> {
        self.inner.first_index_of(idx)
    }

    fn first_index_of_named(&mut self, name: &str) -> FeatureResult<u64> {
        self.inner.first_index_of_named(name)
    }

    fn source_name(&self, idx: usize) -> FeatureResult<String> {
        self.inner.source_name(idx)
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
