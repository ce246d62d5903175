//! Tree builders for the documents a conversion writes.
pub mod jmx;

use crate::record::SampleRecord;
use crate::segment::Script;
use crate::tree::Node;

pub use jmx::JmeterTreeBuilder;

/// Trait for turning a segmented capture and its recorded samples into
/// document trees of a load-testing tool.
pub trait ScriptTreeBuilder {
    /// Script document replaying the capture.
    fn build_script(&self, script: &Script) -> crate::Result<Node>;

    /// Results document listing the recorded samples.
    fn build_results(&self, records: &[SampleRecord]) -> crate::Result<Node>;
}
