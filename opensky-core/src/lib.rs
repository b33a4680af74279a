//! opensky-core: decode, resolve and aggregate OpenSky surveillance records.
//!
//! No file or database I/O. The tools crate supplies the record container
//! and the SQLite sink; this crate owns the streaming pipeline between them.

pub mod cache;
pub mod config;
pub mod cpr;
pub mod crc;
pub mod decode;
pub mod extract;
pub mod filter;
pub mod frame;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod resolver;
pub mod sink;
pub mod types;

// Re-export commonly used types at crate root
pub use decode::{decode, decode_hex};
pub use extract::{ExtractOutcome, ExtractStats, Extractor};
pub use filter::{FilterReason, KindFilter, TimeWindow};
pub use frame::{parse_frame, ModeFrame};
pub use normalize::{ResolvedPosition, ResolvedVelocity};
pub use pipeline::{ConvertOptions, ConvertPipeline, ConvertStats, RecordOutcome};
pub use record::{GeoPosition, SurveillanceRecord};
pub use resolver::{CprResolver, PositionResolver};
pub use sink::FactSink;
pub use types::*;
