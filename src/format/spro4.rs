//! SPRO 4.x feature file reader.
//!
//! Layout:
//!
//! ```text
//! [2B u16 base_dim] [4B u32 stream description bits] [4B f32 frame rate]
//! records of expanded_size(base_dim) f32 values
//! ```
//!
//! The header carries the *static* dimension; the record width is expanded
//! from the stream description bits. There is no record count in the
//! header, so the data section must divide evenly into records. SPro
//! writes little endian natively; `Auto` resolves to little.

use crate::config::ByteOrder;
use crate::error::{FeatureError, FeatureResult};
use crate::flags::FeatureFlags;

use super::{decode_f32, decode_u16, decode_u32, open_file, RecordFile, ScalarKind, SourceHeader};

const HEADER_LEN: u64 = 10;

/// Reader for SPRO 4.x feature files.
#[derive(Debug)]
pub struct Spro4Reader {
    pub(crate) rec: RecordFile,
}

impl Spro4Reader {
    pub fn open(path: &str, order: ByteOrder, writable: bool) -> FeatureResult<Self> {
        let (mut file, file_len) = open_file(path, writable)?;
        if file_len < HEADER_LEN {
            return Err(FeatureError::malformed(path, "truncated SPRO4 header"));
        }
        let resolved = match order {
            ByteOrder::Big => ByteOrder::Big,
            _ => ByteOrder::Little,
        };
        let mut raw = [0u8; 10];
        {
            use std::io::Read;
            file.read_exact(&mut raw)
                .map_err(|e| FeatureError::from_io(path, e))?;
        }
        let base_dim = decode_u16(&raw[0..2], resolved) as usize;
        let bits = decode_u32(&raw[2..6], resolved);
        let rate = decode_f32(&raw[6..10], resolved) as f64;

        if base_dim == 0 {
            return Err(FeatureError::malformed(path, "SPRO4 dimension is zero"));
        }
        if !(rate > 0.0) || !rate.is_finite() {
            return Err(FeatureError::malformed(
                path,
                format!("SPRO4 frame rate {rate} is not positive"),
            ));
        }

        let flags = FeatureFlags::from_spro4_bits(bits);
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
            rec: RecordFile::new(path.to_string(), file, source, writable),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::flags::spro4_bits;
    use std::io::Write;

    pub(crate) fn write_spro4(
        path: &std::path::Path,
        base_dim: u16,
        bits: u32,
        rate: f32,
        records: &[Vec<f32>],
    ) {
        let mut buf = Vec::new();
        buf.extend_from_slice(&base_dim.to_le_bytes());
        buf.extend_from_slice(&bits.to_le_bytes());
        buf.extend_from_slice(&rate.to_le_bytes());
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

    fn ramp(records: usize, width: usize) -> Vec<Vec<f32>> {
        (0..records)
            .map(|i| (0..width).map(|k| (i * width + k) as f32).collect())
            .collect()
    }

    #[test]
    fn test_open_static_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.prm");
        write_spro4(&path, 12, 0, 100.0, &ramp(7, 12));

        let r = Spro4Reader::open(path.to_str().unwrap(), ByteOrder::Auto, false).unwrap();
        let h = r.rec.header();
        assert_eq!(h.vect_size, 12);
        assert_eq!(h.feature_count, 7);
        assert_eq!(h.byte_order, ByteOrder::Little);
        assert_eq!(h.flags.to_string(), "100000");
    }

    #[test]
    fn test_vect_size_expanded_from_bits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.prm");
        let bits = spro4_bits::WITH_E | spro4_bits::WITH_D | spro4_bits::WITH_A;
        // 12 static + E, deltas + dE, delta-deltas + ddE: 39 wide.
        write_spro4(&path, 12, bits, 100.0, &ramp(3, 39));

        let r = Spro4Reader::open(path.to_str().unwrap(), ByteOrder::Auto, false).unwrap();
        assert_eq!(r.rec.header().vect_size, 39);
        assert_eq!(r.rec.header().flags.to_string(), "111111");
    }

    #[test]
    fn test_partial_record_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.prm");
        write_spro4(&path, 4, 0, 100.0, &ramp(3, 4));
        let data = std::fs::read(&path).unwrap();
        std::fs::write(&path, &data[..data.len() - 4]).unwrap();

        let err = Spro4Reader::open(path.to_str().unwrap(), ByteOrder::Auto, false).unwrap_err();
        assert!(matches!(err, FeatureError::Malformed { .. }));
    }

    #[test]
    fn test_zero_dim_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.prm");
        write_spro4(&path, 0, 0, 100.0, &[]);

        let err = Spro4Reader::open(path.to_str().unwrap(), ByteOrder::Auto, false).unwrap_err();
        assert!(matches!(err, FeatureError::Malformed { .. }));
    }

    #[test]
    fn test_read_and_write_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.prm");
        write_spro4(&path, 3, 0, 100.0, &ramp(4, 3));

        let mut r = Spro4Reader::open(path.to_str().unwrap(), ByteOrder::Auto, true).unwrap();
        let mut out = vec![0.0; 3];
        assert!(r.rec.read_record(1, &mut out).unwrap());
        assert_eq!(out, vec![3.0, 4.0, 5.0]);

        assert!(r.rec.write_record(1, &[9.0, 8.0, 7.0]).unwrap());
        assert!(r.rec.read_record(1, &mut out).unwrap());
        assert_eq!(out, vec![9.0, 8.0, 7.0]);

        // In-place only: writing past the end does not extend the file.
        assert!(!r.rec.write_record(4, &[0.0, 0.0, 0.0]).unwrap());
    }

    #[test]
    fn test_write_requires_permission() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.prm");
        write_spro4(&path, 3, 0, 100.0, &ramp(2, 3));

        let mut r = Spro4Reader::open(path.to_str().unwrap(), ByteOrder::Auto, false).unwrap();
        let err = r.rec.write_record(0, &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, FeatureError::Capacity { .. }));
    }
}
