//! # EDF+ export for Rust
//!
//! Reads EDF+ (European Data Format Plus) recordings and re-emits their
//! signals, annotations and metadata into a segment container.
//!
//! The decoding is split into three layers:
//!
//! - [`header`] parses the fixed-width ASCII header and the per-signal column blocks
//! - [`layout`] locates every data record and splits it into per-signal spans
//! - [`tal`] decodes the Time-stamped Annotation Lists of the "EDF Annotations" signal
//!
//! [`export`] then maps the decoded records onto any [`StorageSink`].
//!
//! ## Quick Start
//!
//! ```rust
//! use edf_export::{EdfReader, SignalData, Result};
//!
//! fn main() -> Result<()> {
//!     # edf_export::doctest_utils::create_simple_test_file("quick_start.edf")?;
//!     let mut reader = EdfReader::open("quick_start.edf")?;
//!
//!     let header = reader.header();
//!     println!("{} recording started {}", header.format, header.start);
//!     println!("{} records of {:.2} s", header.datarecords_in_file,
//!         header.datarecord_duration_seconds());
//!
//!     // Records can be read in any order
//!     let record = reader.read_record(1)?;
//!     for (signal, data) in reader.signals().iter().zip(&record.signals) {
//!         match data {
//!             SignalData::Samples(samples) => println!("{}: {:?}", signal.label, samples),
//!             SignalData::Annotations(events) => println!("{} events", events.len()),
//!             SignalData::Skipped => println!("unreadable annotations"),
//!         }
//!     }
//!     # std::fs::remove_file("quick_start.edf").ok();
//!     Ok(())
//! }
//! ```
//!
//! ## Exporting
//!
//! ```rust
//! use edf_export::{export_recording, ContainerWriter, EdfReader, ExportOptions};
//!
//! # edf_export::doctest_utils::create_simple_test_file("to_container.edf")?;
//! let mut reader = EdfReader::open("to_container.edf")?;
//! let mut writer = ContainerWriter::new(Vec::new())?;
//! let summary = export_recording(&mut reader, &mut writer, &ExportOptions::default())?;
//! let bytes = writer.finish()?;
//!
//! assert_eq!(&bytes[..4], b"SCF1");
//! assert_eq!(summary.channels, 2);
//! # std::fs::remove_file("to_container.edf").ok();
//! # Ok::<(), edf_export::EdfError>(())
//! ```
//!
//! Onsets and durations of annotations are exact decimals
//! ([`bigdecimal::BigDecimal`]), never rounded to floating point.

pub mod container;
pub mod error;
pub mod export;
pub mod header;
pub mod layout;
pub mod reader;
pub mod tal;
pub mod types;
pub mod utils;

#[doc(hidden)]
pub mod doctest_utils; // For internal doctest support

// Re-export main types for convenience
pub use container::{ContainerWriter, MemorySink};
pub use error::{EdfError, Result};
pub use export::{export_recording, ExportOptions, ExportSummary, StorageSink};
pub use layout::RecordLayout;
pub use reader::EdfReader;
pub use types::{
    AnnotationEvent, DataRecord, FileFormat, FileHeader, SignalData, SignalDescriptor, SignalKind,
};

// Important constants
pub const EDFLIB_TIME_DIMENSION: i64 = 10_000_000; // 100 nanoseconds unit
pub const EDFLIB_MAXSIGNALS: usize = 4096;

/// Label that marks a signal as an annotation channel (exact match)
pub const ANNOTATION_LABEL: &str = "EDF Annotations";

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
