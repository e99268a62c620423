//! Single-source feature stream.

use crate::config::{ByteOrder, ReaderConfig};
use crate::error::{FeatureError, FeatureResult};
use crate::feature::Feature;
use crate::flags::FeatureFlags;
use crate::format::{FormatReader, SourceHeader};

use super::FeatureStream;

/// Stream over one backing feature file.
///
/// The file is opened on first access, its header memoized, and the
/// handle dropped again by [`FeatureStream::close`]; reads after a close
/// reopen transparently.
#[derive(Debug)]
pub struct SingleFileReader {
    name: String,
    path: String,
    cfg: ReaderConfig,
    explicit_order: Option<ByteOrder>,
    reader: Option<FormatReader>,
    header: Option<SourceHeader>,
    position: u64,
    exhausted: bool,
}

impl SingleFileReader {
    /// Creates the stream without touching the file system.
    pub fn new(name: &str, cfg: &ReaderConfig) -> Self {
        Self::with_order(name, cfg, None)
    }

    /// Creates the stream with an explicit byte-order override, which
    /// wins over both the reader and the global configuration.
    pub fn with_order(name: &str, cfg: &ReaderConfig, order: Option<ByteOrder>) -> Self {
        Self {
            name: name.to_string(),
            path: cfg.source_path(name),
            cfg: cfg.clone(),
            explicit_order: order,
            reader: None,
            header: None,
            position: 0,
            exhausted: false,
        }
    }

    fn ensure_open(&mut self) -> FeatureResult<&mut FormatReader> {
        if self.reader.is_none() {
            let reader = FormatReader::open(&self.path, &self.cfg, self.explicit_order)?;
            if self.header.is_none() {
                self.header = Some(reader.header().clone());
            }
            self.reader = Some(reader);
        }
        Ok(self.reader.as_mut().expect("reader just opened"))
    }

    fn ensure_header(&mut self) -> FeatureResult<&SourceHeader> {
        if self.header.is_none() {
            self.ensure_open()?;
        }
        Ok(self.header.as_ref().expect("header just memoized"))
    }
}

impl FeatureStream for SingleFileReader {
    fn read_feature_step(&mut self, out: &mut Feature, step: u64) -> FeatureResult<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let position = self.position;
        let reader = self.ensure_open()?;
        if !reader.read_record(position, out.values_mut())? {
            return Ok(false);
        }
        out.set_valid(true);
        self.position = position + step;
        Ok(true)
    }

    fn write_feature_step(&mut self, f: &Feature, step: u64) -> FeatureResult<bool> {
        if !self.cfg.writable {
            return Err(FeatureError::Capacity {
                reason: "stream not opened with write permission".into(),
            });
        }
        if self.exhausted {
            return Ok(false);
        }
        let want = self.vect_size()?;
        if f.vect_size() != want {
            return Err(FeatureError::DimensionMismatch {
                got: f.vect_size(),
                want,
            });
        }
        let position = self.position;
        let reader = self.ensure_open()?;
        if !reader.write_record(position, f.values())? {
            return Ok(false);
        }
        self.position = position + step;
        Ok(true)
    }

    fn seek_feature(&mut self, index: u64) {
        self.position = index;
        self.exhausted = false;
    }

    fn seek_feature_in(&mut self, source: &str, index: u64) {
        if source == self.name {
            self.seek_feature(index);
        } else {
            // Unknown source: reads report end of stream until re-seeked.
            self.exhausted = true;
        }
    }

    fn vect_size(&mut self) -> FeatureResult<usize> {
        Ok(self.ensure_header()?.vect_size)
    }

    fn feature_flags(&mut self) -> FeatureResult<FeatureFlags> {
        Ok(self.ensure_header()?.flags)
    }

    fn sample_rate(&mut self) -> FeatureResult<f64> {
        Ok(self.ensure_header()?.sample_rate)
    }

    fn feature_count(&mut self) -> FeatureResult<u64> {
        Ok(self.ensure_header()?.feature_count)
    }

    fn source_count(&self) -> usize {
        1
    }

    fn feature_count_of(&mut self, idx: usize) -> FeatureResult<u64> {
        if idx != 0 {
            return Err(FeatureError::IndexOutOfRange {
                index: idx,
                count: 1,
            });
        }
        self.feature_count()
    }

    fn feature_count_of_named(&mut self, name: &str) -> FeatureResult<u64> {
        if name != self.name {
            return Err(FeatureError::UnknownSource {
                name: name.to_string(),
            });
        }
        self.feature_count()
    }

    fn first_index_of(&mut self, idx: usize) -> FeatureResult<u64> {
        if idx != 0 {
            return Err(FeatureError::IndexOutOfRange {
                index: idx,
                count: 1,
            });
        }
        Ok(0)
    }

    fn first_index_of_named(&mut self, name: &str) -> FeatureResult<u64> {
        if name != self.name {
            return Err(FeatureError::UnknownSource {
                name: name.to_string(),
            });
        }
        Ok(0)
    }

    fn source_name(&self, idx: usize) -> FeatureResult<String> {
        if idx != 0 {
            return Err(FeatureError::IndexOutOfRange {
                index: idx,
                count: 1,
            });
        }
        Ok(self.name.clone())
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileFormat;
    use crate::format::spro4::tests::write_spro4;

    fn ramp(records: usize, width: usize) -> Vec<Vec<f32>> {
        (0..records)
            .map(|i| (0..width).map(|k| (i * width + k) as f32).collect())
            .collect()
    }

    fn cfg_for(dir: &std::path::Path, writable: bool) -> ReaderConfig {
        ReaderConfig {
            format: FileFormat::Spro4,
            feature_path: format!("{}/", dir.display()),
            extension: ".prm".into(),
            writable,
            ..ReaderConfig::default()
        }
    }

    #[test]
    fn test_sequential_read() {
        let dir = tempfile::tempdir().unwrap();
        write_spro4(&dir.path().join("a.prm"), 3, 0, 100.0, &ramp(4, 3));

        let mut s = SingleFileReader::new("a", &cfg_for(dir.path(), false));
        assert_eq!(s.vect_size().unwrap(), 3);
        assert_eq!(s.feature_count().unwrap(), 4);

        let mut f = Feature::new(3);
        let mut seen = Vec::new();
        while s.read_feature(&mut f).unwrap() {
            seen.push(f.values()[0]);
        }
        assert_eq!(seen, vec![0.0, 3.0, 6.0, 9.0]);
    }

    #[test]
    fn test_seek_and_step() {
        let dir = tempfile::tempdir().unwrap();
        write_spro4(&dir.path().join("a.prm"), 2, 0, 100.0, &ramp(6, 2));

        let mut s = SingleFileReader::new("a", &cfg_for(dir.path(), false));
        let mut f = Feature::new(2);

        s.seek_feature(4);
        assert!(s.read_feature(&mut f).unwrap());
        assert_eq!(f.values()[0], 8.0);

        // Step 2 skips every other record.
        s.reset();
        let mut seen = Vec::new();
        while s.read_feature_step(&mut f, 2).unwrap() {
            seen.push(f.values()[0]);
        }
        assert_eq!(seen, vec![0.0, 4.0, 8.0]);
    }

    #[test]
    fn test_seek_past_end_reads_false() {
        let dir = tempfile::tempdir().unwrap();
        write_spro4(&dir.path().join("a.prm"), 2, 0, 100.0, &ramp(3, 2));

        let mut s = SingleFileReader::new("a", &cfg_for(dir.path(), false));
        let mut f = Feature::new(2);
        s.seek_feature(3);
        assert!(!s.read_feature(&mut f).unwrap());
        // A later in-range seek recovers.
        s.seek_feature(2);
        assert!(s.read_feature(&mut f).unwrap());
    }

    #[test]
    fn test_named_seek() {
        let dir = tempfile::tempdir().unwrap();
        write_spro4(&dir.path().join("a.prm"), 2, 0, 100.0, &ramp(3, 2));

        let mut s = SingleFileReader::new("a", &cfg_for(dir.path(), false));
        let mut f = Feature::new(2);

        s.seek_feature_in("a", 1);
        assert!(s.read_feature(&mut f).unwrap());
        assert_eq!(f.values()[0], 2.0);

        s.seek_feature_in("unknown", 0);
        assert!(!s.read_feature(&mut f).unwrap());
        s.reset();
        assert!(s.read_feature(&mut f).unwrap());
    }

    #[test]
    fn test_write_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        write_spro4(&dir.path().join("a.prm"), 2, 0, 100.0, &ramp(3, 2));

        let mut s = SingleFileReader::new("a", &cfg_for(dir.path(), true));
        let mut f = Feature::new(2);
        f.values_mut().copy_from_slice(&[7.5, -1.25]);
        s.seek_feature(1);
        assert!(s.write_feature(&f).unwrap());

        let mut g = Feature::new(2);
        s.seek_feature(1);
        assert!(s.read_feature(&mut g).unwrap());
        assert_eq!(g, f);
    }

    #[test]
    fn test_write_without_permission() {
        let dir = tempfile::tempdir().unwrap();
        write_spro4(&dir.path().join("a.prm"), 2, 0, 100.0, &ramp(1, 2));

        let mut s = SingleFileReader::new("a", &cfg_for(dir.path(), false));
        let f = Feature::new(2);
        assert!(matches!(
            s.write_feature(&f).unwrap_err(),
            FeatureError::Capacity { .. }
        ));
    }

    #[test]
    fn test_write_wrong_width() {
        let dir = tempfile::tempdir().unwrap();
        write_spro4(&dir.path().join("a.prm"), 2, 0, 100.0, &ramp(1, 2));

        let mut s = SingleFileReader::new("a", &cfg_for(dir.path(), true));
        let f = Feature::new(5);
        assert!(matches!(
            s.write_feature(&f).unwrap_err(),
            FeatureError::DimensionMismatch { .. }
        ));
    }

    #[test]
    fn test_close_reopens_lazily() {
        let dir = tempfile::tempdir().unwrap();
        write_spro4(&dir.path().join("a.prm"), 2, 0, 100.0, &ramp(3, 2));

        let mut s = SingleFileReader::new("a", &cfg_for(dir.path(), false));
        let mut f = Feature::new(2);
        assert!(s.read_feature(&mut f).unwrap());
        s.close();
        // Metadata survives the close, reads reopen.
        assert_eq!(s.feature_count().unwrap(), 3);
        assert!(s.read_feature(&mut f).unwrap());
        assert_eq!(f.values()[0], 2.0);
    }

    #[test]
    fn test_source_list_view() {
        let dir = tempfile::tempdir().unwrap();
        write_spro4(&dir.path().join("a.prm"), 2, 0, 100.0, &ramp(3, 2));

        let mut s = SingleFileReader::new("a", &cfg_for(dir.path(), false));
        assert_eq!(s.source_count(), 1);
        assert_eq!(s.source_name(0).unwrap(), "a");
        assert_eq!(s.first_index_of(0).unwrap(), 0);
        assert_eq!(s.feature_count_of(0).unwrap(), 3);
        assert_eq!(s.feature_count_of_named("a").unwrap(), 3);
        assert!(matches!(
            s.feature_count_of(1).unwrap_err(),
            FeatureError::IndexOutOfRange { .. }
        ));
        assert!(matches!(
            s.feature_count_of_named("b").unwrap_err(),
            FeatureError::UnknownSource { .. }
        ));
    }
}
