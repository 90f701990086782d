//! Fetch sequencing runs with `fasterq-dump` and lay them out as Casava 1.8
//! single-end and paired-end FASTQ directories.

pub mod app;
pub mod casava;
pub mod config;
pub mod domain;
pub mod error;
pub mod fastq;
pub mod output;
pub mod retrieval;
pub mod scratch;
