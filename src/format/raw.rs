//! Headerless raw feature file reader.
//!
//! A raw file is nothing but back-to-back f32 records; the vector width
//! and frame rate come from the configuration since the file cannot
//! describe itself. A trailing partial record is ignored rather than
//! rejected for the same reason.

use crate::config::{ByteOrder, ReaderConfig};
use crate::error::{FeatureError, FeatureResult};
use crate::flags::FeatureFlags;

use super::{open_file, RecordFile, ScalarKind, SourceHeader};

/// Reader for headerless raw feature files.
#[derive(Debug)]
pub struct RawReader {
    pub(crate) rec: RecordFile,
}

impl RawReader {
    pub fn open(path: &str, cfg: &ReaderConfig, order: ByteOrder) -> FeatureResult<Self> {
        if cfg.raw_vect_size == 0 {
            return Err(FeatureError::malformed(
                path,
                "raw vector size not configured",
            ));
        }
        let (file, file_len) = open_file(path, cfg.writable)?;
        let resolved = match order {
            ByteOrder::Big => ByteOrder::Big,
            _ => ByteOrder::Little,
        };
        let record_len = (cfg.raw_vect_size * 4) as u64;
        let source = SourceHeader {
            vect_size: cfg.raw_vect_size,
            sample_rate: cfg.raw_sample_rate,
            flags: FeatureFlags::static_only(),
            feature_count: file_len / record_len,
            header_bytes: 0,
            byte_order: resolved,
            scalar: ScalarKind::F32,
        };
        Ok(Self {
            rec: RecordFile::new(path.to_string(), file, source, cfg.writable),
        })
    }
}
