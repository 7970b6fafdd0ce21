//! Inspection and repair of raw NAND dumps captured through a flash
//! controller's page-read interface.
//!
//! A dump is a flat file of fixed-size page records; each record carries the
//! page payload, its per-page metadata, and the two status words the
//! controller returned for the read. [`scan`] classifies every page of one
//! dump; [`merge`] reconciles two dumps of the same media, keeping whichever
//! side read each page successfully.

pub mod dump;
pub mod error;
pub mod merge;
pub mod output;
pub mod report;
pub mod scan;
pub mod spotlist;
