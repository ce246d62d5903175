//! har2jmx Core Library
//!
//! This library converts browser HAR captures into JMeter `.jmx` scripts and,
//! optionally, a `testResults` log of the recorded samples.

pub mod annotations;
pub mod builders;
pub mod classify;
pub mod config;
pub mod error;
pub mod filter;
pub mod generate;
pub mod har;
pub mod multipart;
pub mod record;
pub mod render;
pub mod sampler;
pub mod segment;
pub mod tree;
pub mod websocket;

pub use crate::{
    annotations::Annotations,
    config::{AnnotationSourceKind, Config},
    error::{Error, Result},
    generate::{convert, generate, Conversion, Summary},
    har::HarArchive,
    tree::Node,
};
