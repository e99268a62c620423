//! SPRO 3.x feature file reader (read-only).
//!
//! Layout:
//!
//! ```text
//! [4B u32 base_dim] [4B u32 stream description bits] [4B f32 frame rate]
//! records of expanded_size(base_dim) f32 values
//! ```
//!
//! Same expansion rule as SPRO 4.x but the 3.x stream description packs
//! its bits in a different order (see [`crate::flags::spro3_bits`]). Kept
//! for reading legacy archives only; 3.x files are never written.

use crate::config::ByteOrder;
use crate::error::{FeatureError, FeatureResult};
use crate::flags::FeatureFlags;

use super::{decode_f32, decode_u32, open_file, RecordFile, ScalarKind, SourceHeader};

const HEADER_LEN: u64 = 12;

/// Reader for SPRO 3.x feature files.
#[derive(Debug)]
pub struct Spro3Reader {
    pub(crate) rec: RecordFile,
}

impl Spro3Reader {
    pub fn open(path: &str, order: ByteOrder) -> FeatureResult<Self> {
        let (mut file, file_len) = open_file(path, false)?;
        if file_len < HEADER_LEN {
            return Err(FeatureError::malformed(path, "truncated SPRO3 header"));
        }
        let resolved = match order {
            ByteOrder::Big => ByteOrder::Big,
            _ => ByteOrder::Little,
        };
        let mut raw = [0u8; 12];
        {
            use std::io::Read;
            file.read_exact(&mut raw)
                .map_err(|e| FeatureError::from_io(path, e))?;
        }
        let base_dim = decode_u32(&raw[0..4], resolved) as usize;
        let bits = decode_u32(&raw[4..8], resolved);
        let rate = decode_f32(&raw[8..12], resolved) as f64;

        if base_dim == 0 {
            return Err(FeatureError::malformed(path, "SPRO3 dimension is zero"));
        }
        if !(rate > 0.0) || !rate.is_finite() {
            return Err(FeatureError::malformed(
                path,
                format!("SPRO3 frame rate {rate} is not positive"),
            ));
        }

        let flags = FeatureFlags::from_spro3_bits(bits);
        let vect_size = flags.expanded_size(base_dim);
        let data_len = file_len - HEADER_LEN;
        let record_len = (vect_size * 4) as u64;
        if data_len % record_len != 0 {
            return Err(FeatureError::malformed(
                path,
                format!("data length {data_len} is not a multiple of the {record_len}-byte record"),
            ));
        }

        let source = SourceHeader {
            vect_size,
            sample_rate: rate,
            flags,
            feature_count: data_len / record_len,
            header_bytes: HEADER_LEN,
            byte_order: resolved,
            scalar: ScalarKind::F32,
        };
        Ok(Self {
            rec: RecordFile::new(path.to_string(), file, source, false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::spro3_bits;
    use std::io::Write;

    fn write_spro3(path: &std::path::Path, base_dim: u32, bits: u32, records: &[Vec<f32>]) {
        let mut buf = Vec::new();
        buf.extend_from_slice(&base_dim.to_le_bytes());
        buf.extend_from_slice(&bits.to_le_bytes());
        buf.extend_from_slice(&100.0f32.to_le_bytes());
        for rec in records {
            for &v in rec {
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        std::fs::File::create(path)
            .unwrap()
            .write_all(&buf)
            .unwrap();
    }

    #[test]
    fn test_open_with_v3_bits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cep");
        // v3 layout: 0x02 is the delta bit.
        let records: Vec<Vec<f32>> = (0..5).map(|_| vec![0.0; 16]).collect();
        write_spro3(&path, 8, spro3_bits::WITH_D, &records);

        let r = Spro3Reader::open(path.to_str().unwrap(), ByteOrder::Auto).unwrap();
        let h = r.rec.header();
        assert_eq!(h.vect_size, 16);
        assert_eq!(h.feature_count, 5);
        assert_eq!(h.flags.to_string(), "101000");
    }

    #[test]
    fn test_writes_always_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cep");
        write_spro3(&path, 2, 0, &[vec![1.0, 2.0]]);

        let mut r = Spro3Reader::open(path.to_str().unwrap(), ByteOrder::Auto).unwrap();
        let err = r.rec.write_record(0, &[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, FeatureError::Capacity { .. }));
    }

    #[test]
    fn test_partial_record_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cep");
        write_spro3(&path, 2, 0, &[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let data = std::fs::read(&path).unwrap();
        std::fs::write(&path, &data[..data.len() - 2]).unwrap();

        let err = Spro3Reader::open(path.to_str().unwrap(), ByteOrder::Auto).unwrap_err();
        assert!(matches!(err, FeatureError::Malformed { .. }));
    }
}
