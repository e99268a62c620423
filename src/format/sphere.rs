//! NIST SPHERE file reader (read-only).
//!
//! A SPHERE file starts with an ASCII header:
//!
//! ```text
//! NIST_1A
//!    1024
//! sample_count -i 4000
//! channel_count -i 1
//! sample_n_bytes -i 2
//! sample_rate -i 8000
//! sample_byte_format -s2 01
//! end_head
//! ```
//!
//! The second line gives the total header length; records start right
//! after it. Each record is one frame of `channel_count` 16-bit samples,
//! surfaced as raw sample values. Only uncompressed 16-bit PCM is
//! accepted.

use std::collections::HashMap;

use crate::config::ByteOrder;
use crate::error::{FeatureError, FeatureResult};
use crate::flags::FeatureFlags;

use super::{open_file, RecordFile, ScalarKind, SourceHeader};

const MAGIC: &[u8] = b"NIST_1A\n";

/// Reader for NIST SPHERE files.
#[derive(Debug)]
pub struct SphereReader {
    pub(crate) rec: RecordFile,
}

fn get_int(fields: &HashMap<String, String>, path: &str, name: &str) -> FeatureResult<i64> {
    let raw = fields
        .get(name)
        .ok_or_else(|| FeatureError::malformed(path, format!("missing SPHERE field {name}")))?;
    raw.parse::<i64>()
        .map_err(|_| FeatureError::malformed(path, format!("SPHERE field {name} is not an integer")))
}

impl SphereReader {
    pub fn open(path: &str) -> FeatureResult<Self> {
        let (mut file, file_len) = open_file(path, false)?;

        let mut intro = [0u8; 16];
        {
            use std::io::Read;
            file.read_exact(&mut intro)
                .map_err(|e| FeatureError::from_io(path, e))?;
        }
        if &intro[0..8] != MAGIC {
            return Err(FeatureError::malformed(path, "missing NIST_1A magic"));
        }
        let size_line = std::str::from_utf8(&intro[8..16])
            .map_err(|_| FeatureError::malformed(path, "SPHERE header size is not ASCII"))?;
        let header_bytes: u64 = size_line
            .trim()
            .parse()
            .map_err(|_| FeatureError::malformed(path, "SPHERE header size is not a number"))?;
        if header_bytes < 16 || header_bytes > file_len {
            return Err(FeatureError::malformed(
                path,
                format!("implausible SPHERE header size {header_bytes}"),
            ));
        }

        let mut rest = vec![0u8; header_bytes as usize - 16];
        {
            use std::io::Read;
            file.read_exact(&mut rest)
                .map_err(|e| FeatureError::from_io(path, e))?;
        }
        let text = String::from_utf8_lossy(&rest);

        // "name -type value" lines up to end_head.
        let mut fields = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "end_head" {
                break;
            }
            let mut parts = line.splitn(3, ' ');
            let (Some(name), Some(kind), Some(value)) =
                (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            if kind.starts_with('-') {
                fields.insert(name.to_string(), value.trim().to_string());
            }
        }

        let sample_count = get_int(&fields, path, "sample_count")?;
        let channel_count = get_int(&fields, path, "channel_count")?;
        let sample_n_bytes = get_int(&fields, path, "sample_n_bytes")?;
        let sample_rate = get_int(&fields, path, "sample_rate")?;
        if sample_n_bytes != 2 {
            return Err(FeatureError::malformed(
                path,
                format!("only 16-bit SPHERE samples are supported, got {sample_n_bytes} bytes"),
            ));
        }
        if sample_count <= 0 || channel_count <= 0 || sample_rate <= 0 {
            return Err(FeatureError::malformed(path, "non-positive SPHERE field"));
        }
        if let Some(coding) = fields.get("sample_coding") {
            if !coding.starts_with("pcm") {
                return Err(FeatureError::malformed(
                    path,
                    format!("unsupported SPHERE sample coding {coding}"),
                ));
            }
        }
        let byte_order = match fields.get("sample_byte_format").map(String::as_str) {
            Some("01") => ByteOrder::Little,
            Some("10") => ByteOrder::Big,
            Some(other) => {
                return Err(FeatureError::malformed(
                    path,
                    format!("unsupported SPHERE byte format {other}"),
                ));
            }
            None => {
                return Err(FeatureError::malformed(
                    path,
                    "missing SPHERE field sample_byte_format",
                ));
            }
        };

        let expected = header_bytes + sample_count as u64 * channel_count as u64 * 2;
        if expected != file_len {
            return Err(FeatureError::malformed(
                path,
                format!("SPHERE header predicts {expected} bytes, file has {file_len}"),
            ));
        }

        let source = SourceHeader {
            vect_size: channel_count as usize,
            sample_rate: sample_rate as f64,
            flags: FeatureFlags::static_only(),
            feature_count: sample_count as u64,
            header_bytes,
            byte_order,
            scalar: ScalarKind::I16,
        };
        Ok(Self {
            rec: RecordFile::new(path.to_string(), file, source, false),
        })
    }
}
