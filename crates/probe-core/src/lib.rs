//! probe-core: container-format detection for serialized model files.
//!
//! Tells a zip-based model archive apart from a legacy pickle stream and
//! pulls the version marker out of the latter without unpickling anything.
//! The scan orchestration and reporting used by the CLI live here too.

pub mod compression;
pub mod error;
pub mod format;
pub mod gzip;
pub mod magic;
pub mod pickle;
pub mod position;
pub mod probe;
pub mod report;
pub mod stream;

pub use compression::{is_compressed_file, should_read_directly};
pub use error::{DecodeError, InflateLimitExceeded, InvalidMagicError, ProbeError};
pub use format::{is_zipfile, ContainerFormat};
pub use magic::{get_magic_number, LEGACY_MAGIC_NUMBER};
pub use stream::{HasFileDescriptor, HasModuleIdentity, ProbeStream};
