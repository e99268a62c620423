//! Acoustic feature file I/O for the voxkit speaker-recognition toolkit.
//!
//! Presents fixed-width feature vectors stored in several incompatible
//! binary layouts as one seekable stream, with bounded memory no matter
//! how many backing files the stream spans.
//!
//! # Architecture
//!
//! Data flows upward through four layers:
//!
//! 1. [`format`]: one binary reader per layout (HTK, SPRO 3.x/4.x, raw,
//!    NIST SPHERE), each parsing its header once and addressing records
//!    by byte offset.
//! 2. [`FeatureFileList`]: lazily harvested per-source metadata plus the
//!    prefix-sum table mapping global indices to (source, local) pairs.
//! 3. [`MultiFileReader`] / [`SingleFileReader`]: the stream itself. The
//!    multi-source reader keeps an f32 working buffer per touched source
//!    under a byte budget, evicting oldest-opened entries, and enforces a
//!    bounded seek-history window.
//! 4. [`MaskedStream`]: optional projection of every vector onto an
//!    ordered dimension subset, with the inverse scatter on write.
//!
//! [`FeatureReader`] is the entry point: it maps a plain name, an
//! explicit name list or a `.lst` file to the right composition.
//!
//! ```no_run
//! use voxkit_features::{Feature, FeatureReader, FeatureStream, ReaderConfig};
//!
//! let cfg = ReaderConfig::default();
//! let mut stream = FeatureReader::open("speaker01", &cfg)?;
//! let mut f = Feature::new(stream.vect_size()?);
//! while stream.read_feature(&mut f)? {
//!     // consume f.values()
//! }
//! # Ok::<(), voxkit_features::FeatureError>(())
//! ```

mod config;
mod error;
mod feature;
mod flags;
pub mod format;
mod list;
mod stream;

pub use config::{ByteOrder, FileFormat, HistoricMode, ReaderConfig};
pub use error::{FeatureError, FeatureResult};
pub use feature::Feature;
pub use flags::FeatureFlags;
pub use format::{FormatReader, SourceHeader};
pub use list::{FeatureFileList, SourceInfo};
pub use stream::mask::MaskedStream;
pub use stream::multi::MultiFileReader;
pub use stream::reader::FeatureReader;
pub use stream::single::SingleFileReader;
pub use stream::FeatureStream;
