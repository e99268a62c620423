//! Reader configuration.
//!
//! All values arrive pre-validated from the toolkit's configuration
//! layer; this module only defines their shape and defaults.

use serde::{Deserialize, Serialize};

/// Backing binary layout of a feature file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileFormat {
    /// SPRO 4.x (default toolkit format).
    #[default]
    Spro4,
    /// SPRO 3.x, read-only.
    Spro3,
    /// HTK parameter files.
    Htk,
    /// Headerless raw f32 records.
    Raw,
    /// NIST SPHERE audio, read-only.
    Sphere,
}

/// Byte order of multi-byte fields in a feature file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Detect where the format allows it, otherwise the format's native
    /// order (little endian for SPRO and raw files).
    #[default]
    Auto,
    Little,
    Big,
}

impl ByteOrder {
    /// Resolves the effective byte order from the three possible sources:
    /// an explicit call argument wins over the per-reader setting, which
    /// wins over the global setting. `Auto` defers to the next source.
    pub fn resolve(explicit: Option<ByteOrder>, reader: ByteOrder, global: ByteOrder) -> ByteOrder {
        match explicit {
            Some(order) if order != ByteOrder::Auto => order,
            _ => {
                if reader != ByteOrder::Auto {
                    reader
                } else {
                    global
                }
            }
        }
    }
}

/// Seek-history policy of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HistoricMode {
    /// Every already-seen index stays seekable.
    #[default]
    AllFeatures,
    /// Only the given number of indices behind the high-water mark stay
    /// seekable.
    Limited(u64),
}

/// Configuration for feature file readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Backing format of the sources (default: [`FileFormat::Spro4`]).
    pub format: FileFormat,
    /// Global byte-order override (default: [`ByteOrder::Auto`]).
    pub byte_order: ByteOrder,
    /// Directory prefix prepended to every source name (default: empty).
    pub feature_path: String,
    /// Extension appended to every source name (default: empty).
    pub extension: String,
    /// Whether streams accept writes (default: false).
    pub writable: bool,
    /// Memory budget in bytes for the multi-source buffer pool;
    /// 0 means unbounded (default: 0).
    pub memory_budget: u64,
    /// Seek-history policy (default: [`HistoricMode::AllFeatures`]).
    pub historic: HistoricMode,
    /// Vector width of raw sources, which carry no header
    /// (default: 0, must be set before opening a raw file).
    pub raw_vect_size: usize,
    /// Frame rate of raw sources in Hz (default: 100.0).
    pub raw_sample_rate: f64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            format: FileFormat::default(),
            byte_order: ByteOrder::default(),
            feature_path: String::new(),
            extension: String::new(),
            writable: false,
            memory_budget: 0,
            historic: HistoricMode::default(),
            raw_vect_size: 0,
            raw_sample_rate: 100.0,
        }
    }
}

impl ReaderConfig {
    /// Full path of a source: `feature_path + name + extension`.
    pub fn source_path(&self, name: &str) -> String {
        format!("{}{}{}", self.feature_path, name, self.extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ReaderConfig::default();
        assert_eq!(cfg.format, FileFormat::Spro4);
        assert_eq!(cfg.byte_order, ByteOrder::Auto);
        assert!(!cfg.writable);
        assert_eq!(cfg.memory_budget, 0);
        assert_eq!(cfg.historic, HistoricMode::AllFeatures);
        assert_eq!(cfg.raw_sample_rate, 100.0);
    }

    #[test]
    fn test_source_path() {
        let cfg = ReaderConfig {
            feature_path: "/data/prm/".into(),
            extension: ".prm".into(),
            ..ReaderConfig::default()
        };
        assert_eq!(cfg.source_path("spk01"), "/data/prm/spk01.prm");
    }

    #[test]
    fn test_byte_order_resolution() {
        use ByteOrder::*;
        // Explicit wins.
        assert_eq!(ByteOrder::resolve(Some(Big), Little, Little), Big);
        // Explicit Auto defers to the reader setting.
        assert_eq!(ByteOrder::resolve(Some(Auto), Big, Little), Big);
        // No explicit, reader setting wins over global.
        assert_eq!(ByteOrder::resolve(None, Little, Big), Little);
        // Everything Auto stays Auto.
        assert_eq!(ByteOrder::resolve(None, Auto, Auto), Auto);
        // Reader Auto defers to global.
        assert_eq!(ByteOrder::resolve(None, Auto, Big), Big);
    }

    #[test]
    fn test_config_serde() {
        let cfg = ReaderConfig {
            format: FileFormat::Htk,
            historic: HistoricMode::Limited(128),
            ..ReaderConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ReaderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.format, FileFormat::Htk);
        assert_eq!(back.historic, HistoricMode::Limited(128));
    }
}
