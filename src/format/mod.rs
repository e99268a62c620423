//! Per-format binary readers.
//!
//! Each backing layout ([`htk`], [`spro3`], [`spro4`], [`raw`], [`sphere`])
//! parses its header exactly once on open, after which record `i` lives at
//! byte offset `header_bytes + i * vect_size * scalar_bytes`. The formats
//! are dispatched through the closed [`FormatReader`] enum so the format
//! set is checked exhaustively at compile time.

pub mod htk;
pub mod raw;
pub mod sphere;
pub mod spro3;
pub mod spro4;

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use crate::config::{ByteOrder, FileFormat, ReaderConfig};
use crate::error::{FeatureError, FeatureResult};
use crate::flags::FeatureFlags;

/// Width of one scalar inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// IEEE-754 single precision (HTK, SPRO, raw).
    F32,
    /// Signed 16-bit integer (Sphere samples).
    I16,
}

impl ScalarKind {
    pub fn bytes(self) -> usize {
        match self {
            ScalarKind::F32 => 4,
            ScalarKind::I16 => 2,
        }
    }
}

/// Parsed header of one source file. Built once on open and never
/// re-parsed.
#[derive(Debug, Clone)]
pub struct SourceHeader {
    /// Number of scalars per record.
    pub vect_size: usize,
    /// Frame rate in Hz.
    pub sample_rate: f64,
    /// Acoustic sub-parts carried by each record.
    pub flags: FeatureFlags,
    /// Number of records in the file.
    pub feature_count: u64,
    /// Byte length of the header preceding the first record.
    pub header_bytes: u64,
    /// Resolved byte order of the records (never `Auto`).
    pub byte_order: ByteOrder,
    /// Scalar width of the records.
    pub scalar: ScalarKind,
}

impl SourceHeader {
    /// Byte length of one record.
    pub fn record_len(&self) -> usize {
        self.vect_size * self.scalar.bytes()
    }
}

/// An open feature file with random record access. Shared by every
/// format; only header parsing differs between them.
#[derive(Debug)]
pub(crate) struct RecordFile {
    path: String,
    file: File,
    header: SourceHeader,
    writable: bool,
    scratch: Vec<u8>,
}

impl RecordFile {
    pub(crate) fn new(path: String, file: File, header: SourceHeader, writable: bool) -> Self {
        Self {
            path,
            file,
            header,
            writable,
            scratch: Vec::new(),
        }
    }

    pub(crate) fn header(&self) -> &SourceHeader {
        &self.header
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    fn record_offset(&self, index: u64) -> u64 {
        self.header.header_bytes + index * self.header.record_len() as u64
    }

    /// Reads record `index` into `out`. Returns `Ok(false)` past the last
    /// record without touching `out`.
    pub(crate) fn read_record(&mut self, index: u64, out: &mut [f64]) -> FeatureResult<bool> {
        if index >= self.header.feature_count {
            return Ok(false);
        }
        if out.len() != self.header.vect_size {
            return Err(FeatureError::DimensionMismatch {
                got: out.len(),
                want: self.header.vect_size,
            });
        }
        let len = self.header.record_len();
        self.scratch.resize(len, 0);
        let offset = self.record_offset(index);
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(&mut self.scratch))
            .map_err(|e| FeatureError::from_io(&self.path, e))?;
        let order = self.header.byte_order;
        match self.header.scalar {
            ScalarKind::F32 => {
                for (k, v) in out.iter_mut().enumerate() {
                    *v = decode_f32(&self.scratch[k * 4..k * 4 + 4], order) as f64;
                }
            }
            ScalarKind::I16 => {
                for (k, v) in out.iter_mut().enumerate() {
                    *v = decode_i16(&self.scratch[k * 2..k * 2 + 2], order) as f64;
                }
            }
        }
        Ok(true)
    }

    /// Reads a run of records starting at `start` into an f32 buffer,
    /// filling at most `out.len() / vect_size` records. Returns the number
    /// of records read.
    pub(crate) fn read_block(&mut self, start: u64, out: &mut [f32]) -> FeatureResult<usize> {
        let vect = self.header.vect_size;
        let want = (out.len() / vect) as u64;
        let avail = self.header.feature_count.saturating_sub(start);
        let n = want.min(avail) as usize;
        if n == 0 {
            return Ok(0);
        }
        let len = n * self.header.record_len();
        self.scratch.resize(len, 0);
        let offset = self.record_offset(start);
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(&mut self.scratch))
            .map_err(|e| FeatureError::from_io(&self.path, e))?;
        let order = self.header.byte_order;
        match self.header.scalar {
            ScalarKind::F32 => {
                for (k, v) in out[..n * vect].iter_mut().enumerate() {
                    *v = decode_f32(&self.scratch[k * 4..k * 4 + 4], order);
                }
            }
            ScalarKind::I16 => {
                for (k, v) in out[..n * vect].iter_mut().enumerate() {
                    *v = decode_i16(&self.scratch[k * 2..k * 2 + 2], order) as f32;
                }
            }
        }
        Ok(n)
    }

    /// Overwrites record `index` in place. Returns `Ok(false)` past the
    /// last record; this layer never extends a backing file.
    pub(crate) fn write_record(&mut self, index: u64, values: &[f64]) -> FeatureResult<bool> {
        if !self.writable {
            return Err(FeatureError::Capacity {
                reason: "stream not opened with write permission".into(),
            });
        }
        if index >= self.header.feature_count {
            return Ok(false);
        }
        if values.len() != self.header.vect_size {
            return Err(FeatureError::DimensionMismatch {
                got: values.len(),
                want: self.header.vect_size,
            });
        }
        let order = self.header.byte_order;
        self.scratch.clear();
        match self.header.scalar {
            ScalarKind::F32 => {
                for &v in values {
                    push_f32(&mut self.scratch, v as f32, order);
                }
            }
            ScalarKind::I16 => {
                return Err(FeatureError::Capacity {
                    reason: "format does not support writes".into(),
                });
            }
        }
        let offset = self.record_offset(index);
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(&self.scratch))
            .map_err(|e| FeatureError::from_io(&self.path, e))?;
        Ok(true)
    }
}

/// Opens a source file and returns it with its byte length. Write access
/// is requested only when the stream is writable.
pub(crate) fn open_file(path: &str, writable: bool) -> FeatureResult<(File, u64)> {
    let file = OpenOptions::new()
        .read(true)
        .write(writable)
        .open(path)
        .map_err(|e| FeatureError::from_io(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| FeatureError::from_io(path, e))?
        .len();
    Ok((file, len))
}

pub(crate) fn decode_f32(bytes: &[u8], order: ByteOrder) -> f32 {
    let raw: [u8; 4] = bytes.try_into().unwrap_or([0; 4]);
    match order {
        ByteOrder::Big => f32::from_be_bytes(raw),
        _ => f32::from_le_bytes(raw),
    }
}

pub(crate) fn decode_i16(bytes: &[u8], order: ByteOrder) -> i16 {
    let raw: [u8; 2] = bytes.try_into().unwrap_or([0; 2]);
    match order {
        ByteOrder::Big => i16::from_be_bytes(raw),
        _ => i16::from_le_bytes(raw),
    }
}

pub(crate) fn decode_u32(bytes: &[u8], order: ByteOrder) -> u32 {
    let raw: [u8; 4] = bytes.try_into().unwrap_or([0; 4]);
    match order {
        ByteOrder::Big => u32::from_be_bytes(raw),
        _ => u32::from_le_bytes(raw),
    }
}

pub(crate) fn decode_i32(bytes: &[u8], order: ByteOrder) -> i32 {
    let raw: [u8; 4] = bytes.try_into().unwrap_or([0; 4]);
    match order {
        ByteOrder::Big => i32::from_be_bytes(raw),
        _ => i32::from_le_bytes(raw),
    }
}

pub(crate) fn decode_u16(bytes: &[u8], order: ByteOrder) -> u16 {
    let raw: [u8; 2] = bytes.try_into().unwrap_or([0; 2]);
    match order {
        ByteOrder::Big => u16::from_be_bytes(raw),
        _ => u16::from_le_bytes(raw),
    }
}

pub(crate) fn push_f32(buf: &mut Vec<u8>, v: f32, order: ByteOrder) {
    match order {
        ByteOrder::Big => buf.extend_from_slice(&v.to_be_bytes()),
        _ => buf.extend_from_slice(&v.to_le_bytes()),
    }
}

/// One open source of any supported format.
#[derive(Debug)]
pub enum FormatReader {
    Htk(htk::HtkReader),
    Spro3(spro3::Spro3Reader),
    Spro4(spro4::Spro4Reader),
    Raw(raw::RawReader),
    Sphere(sphere::SphereReader),
}

impl FormatReader {
    /// Opens `path` as the format selected by the configuration,
    /// resolving the byte order from the explicit argument, the reader
    /// configuration and the global default in that order.
    pub fn open(
        path: &str,
        cfg: &ReaderConfig,
        explicit_order: Option<ByteOrder>,
    ) -> FeatureResult<Self> {
        let order = ByteOrder::resolve(explicit_order, cfg.byte_order, ByteOrder::Auto);
        let writable = cfg.writable;
        let reader = match cfg.format {
            FileFormat::Htk => FormatReader::Htk(htk::HtkReader::open(path, order, writable)?),
            FileFormat::Spro3 => FormatReader::Spro3(spro3::Spro3Reader::open(path, order)?),
            FileFormat::Spro4 => {
                FormatReader::Spro4(spro4::Spro4Reader::open(path, order, writable)?)
            }
            FileFormat::Raw => FormatReader::Raw(raw::RawReader::open(path, cfg, order)?),
            FileFormat::Sphere => FormatReader::Sphere(sphere::SphereReader::open(path)?),
        };
        tracing::debug!(
            path,
            vect_size = reader.header().vect_size,
            feature_count = reader.header().feature_count,
            "opened feature source"
        );
        Ok(reader)
    }

    fn rec(&mut self) -> &mut RecordFile {
        match self {
            FormatReader::Htk(r) => &mut r.rec,
            FormatReader::Spro3(r) => &mut r.rec,
            FormatReader::Spro4(r) => &mut r.rec,
            FormatReader::Raw(r) => &mut r.rec,
            FormatReader::Sphere(r) => &mut r.rec,
        }
    }

    pub fn header(&self) -> &SourceHeader {
        match self {
            FormatReader::Htk(r) => r.rec.header(),
            FormatReader::Spro3(r) => r.rec.header(),
            FormatReader::Spro4(r) => r.rec.header(),
            FormatReader::Raw(r) => r.rec.header(),
            FormatReader::Sphere(r) => r.rec.header(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FormatReader::Htk(r) => r.rec.path(),
            FormatReader::Spro3(r) => r.rec.path(),
            FormatReader::Spro4(r) => r.rec.path(),
            FormatReader::Raw(r) => r.rec.path(),
            FormatReader::Sphere(r) => r.rec.path(),
        }
    }

    /// Whether the format itself supports in-place record writes.
    pub fn format_writable(&self) -> bool {
        match self {
            FormatReader::Htk(_) | FormatReader::Spro4(_) | FormatReader::Raw(_) => true,
            FormatReader::Spro3(_) | FormatReader::Sphere(_) => false,
        }
    }

    /// Reads record `index` into `out`; `Ok(false)` past the end.
    pub fn read_record(&mut self, index: u64, out: &mut [f64]) -> FeatureResult<bool> {
        self.rec().read_record(index, out)
    }

    /// Reads a run of records starting at `start` into an f32 buffer;
    /// returns the number of records read.
    pub fn read_block(&mut self, start: u64, out: &mut [f32]) -> FeatureResult<usize> {
        self.rec().read_block(start, out)
    }

    /// Overwrites record `index` in place; `Ok(false)` past the end.
    pub fn write_record(&mut self, index: u64, values: &[f64]) -> FeatureResult<bool> {
        if !self.format_writable() {
            return Err(FeatureError::Capacity {
                reason: "format does not support writes".into(),
            });
        }
        self.rec().write_record(index, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_bytes() {
        assert_eq!(ScalarKind::F32.bytes(), 4);
        assert_eq!(ScalarKind::I16.bytes(), 2);
    }

    #[test]
    fn test_decode_f32_orders() {
        let v = 1.5f32;
        assert_eq!(decode_f32(&v.to_le_bytes(), ByteOrder::Little), v);
        assert_eq!(decode_f32(&v.to_be_bytes(), ByteOrder::Big), v);
    }

    #[test]
    fn test_decode_i16_orders() {
        let v = -1234i16;
        assert_eq!(decode_i16(&v.to_le_bytes(), ByteOrder::Little), v);
        assert_eq!(decode_i16(&v.to_be_bytes(), ByteOrder::Big), v);
    }

    #[test]
    fn test_push_f32_roundtrip() {
        let mut buf = Vec::new();
        push_f32(&mut buf, 3.25, ByteOrder::Big);
        assert_eq!(decode_f32(&buf, ByteOrder::Big), 3.25);
    }

    #[test]
    fn test_record_len() {
        let header = SourceHeader {
            vect_size: 36,
            sample_rate: 100.0,
            flags: FeatureFlags::static_only(),
            feature_count: 89,
            header_bytes: 12,
            byte_order: ByteOrder::Big,
            scalar: ScalarKind::F32,
        };
        assert_eq!(header.record_len(), 144);
    }
}
