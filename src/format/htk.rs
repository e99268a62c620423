//! HTK parameter file reader.
//!
//! Layout:
//!
//! ```text
//! [4B i32 n_samples] [4B i32 samp_period (100ns units)]
//! [2B i16 samp_size (bytes per record)] [2B i16 parm_kind]
//! n_samples records of samp_size/4 f32 values
//! ```
//!
//! HTK tools traditionally write big endian but files of either order
//! exist in the wild, so with byte order `Auto` the header is parsed under
//! both hypotheses and cross-checked against the real file length; exactly
//! one hypothesis must predict it.

use crate::config::ByteOrder;
use crate::error::{FeatureError, FeatureResult};
use crate::flags::FeatureFlags;

use super::{decode_i16, decode_i32, open_file, RecordFile, ScalarKind, SourceHeader};

const HEADER_LEN: u64 = 12;

/// Parameter kind qualifier bits.
mod qualifiers {
    /// Energy appended.
    pub const HAS_E: i16 = 0x40;
    /// Absolute energy suppressed.
    pub const HAS_N: i16 = 0x80;
    /// Delta coefficients appended.
    pub const HAS_D: i16 = 0x100;
    /// Acceleration (delta-delta) coefficients appended.
    pub const HAS_A: i16 = 0x200;
    /// Compressed data.
    pub const HAS_C: i16 = 0x400;
    /// CRC appended.
    pub const HAS_K: i16 = 0x1000;
}

/// Reader for HTK parameter files.
#[derive(Debug)]
pub struct HtkReader {
    pub(crate) rec: RecordFile,
    parm_kind: i16,
}

struct ParsedHeader {
    n_samples: i32,
    samp_period: i32,
    samp_size: i16,
    parm_kind: i16,
}

fn parse(raw: &[u8; 12], order: ByteOrder) -> ParsedHeader {
    ParsedHeader {
        n_samples: decode_i32(&raw[0..4], order),
        samp_period: decode_i32(&raw[4..8], order),
        samp_size: decode_i16(&raw[8..10], order),
        parm_kind: decode_i16(&raw[10..12], order),
    }
}

/// A header hypothesis is plausible when its fields are positive and they
/// predict the actual file length exactly.
fn plausible(h: &ParsedHeader, file_len: u64) -> bool {
    h.n_samples > 0
        && h.samp_period > 0
        && h.samp_size > 0
        && HEADER_LEN + h.n_samples as u64 * h.samp_size as u64 == file_len
}

impl HtkReader {
    pub fn open(path: &str, order: ByteOrder, writable: bool) -> FeatureResult<Self> {
        let (mut file, file_len) = open_file(path, writable)?;
        if file_len < HEADER_LEN {
            return Err(FeatureError::malformed(path, "truncated HTK header"));
        }
        let mut raw = [0u8; 12];
        {
            use std::io::Read;
            file.read_exact(&mut raw)
                .map_err(|e| FeatureError::from_io(path, e))?;
        }

        let (header, resolved) = match order {
            ByteOrder::Auto => {
                let big = parse(&raw, ByteOrder::Big);
                let little = parse(&raw, ByteOrder::Little);
                match (plausible(&big, file_len), plausible(&little, file_len)) {
                    (true, false) => (big, ByteOrder::Big),
                    (false, true) => (little, ByteOrder::Little),
                    (true, true) => {
                        return Err(FeatureError::malformed(
                            path,
                            "ambiguous HTK byte order: both hypotheses match the file length",
                        ));
                    }
                    (false, false) => {
                        return Err(FeatureError::malformed(
                            path,
                            "HTK header does not match the file length in either byte order",
                        ));
                    }
                }
            }
            explicit => {
                let h = parse(&raw, explicit);
                if !plausible(&h, file_len) {
                    return Err(FeatureError::malformed(
                        path,
                        "HTK header does not match the file length",
                    ));
                }
                (h, explicit)
            }
        };

        if header.parm_kind & qualifiers::HAS_C != 0 {
            return Err(FeatureError::malformed(
                path,
                "compressed HTK data is not supported",
            ));
        }
        if header.parm_kind & qualifiers::HAS_K != 0 {
            return Err(FeatureError::malformed(
                path,
                "HTK CRC records are not supported",
            ));
        }
        if header.samp_size % 4 != 0 {
            return Err(FeatureError::malformed(
                path,
                format!("HTK sample size {} is not a whole number of f32", header.samp_size),
            ));
        }

        let flags = FeatureFlags::from_presence(
            header.parm_kind & qualifiers::HAS_E != 0,
            header.parm_kind & qualifiers::HAS_D != 0,
            header.parm_kind & qualifiers::HAS_A != 0,
            header.parm_kind & qualifiers::HAS_N != 0,
        );

        let source = SourceHeader {
            // HTK stores the final record width, no flag expansion.
            vect_size: header.samp_size as usize / 4,
            sample_rate: 1e7 / header.samp_period as f64,
            flags,
            feature_count: header.n_samples as u64,
            header_bytes: HEADER_LEN,
            byte_order: resolved,
            scalar: ScalarKind::F32,
        };
        Ok(Self {
            rec: RecordFile::new(path.to_string(), file, source, writable),
            parm_kind: header.parm_kind,
        })
    }

    /// Raw HTK parameter kind word, qualifier bits included.
    pub fn parm_kind(&self) -> i16 {
        self.parm_kind
    }
}
