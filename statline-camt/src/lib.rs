//! statline-camt: CAMT.053 statement inspection.
//!
//! Answers the two questions the import pipeline asks of a downloaded
//! statement file: does it contain any transaction entries, and what is its
//! statement identifier.

pub mod inspect;

pub use inspect::{inspect, Inspection, InspectError, CAMT053_NS};
