//! Conversion pipeline for har2jmx

use std::path::PathBuf;

use crate::{
    annotations::Annotations,
    builders::{JmeterTreeBuilder, ScriptTreeBuilder},
    config::Config,
    error::Result,
    filter::ExchangeFilter,
    har::HarArchive,
    record,
    render::XmlRenderer,
    sampler::{Endpoint, SamplerBuilder},
    segment::{SegmentSettings, Script, Segmenter},
    tree::Node,
    websocket::{HarWebSocketDelegate, WebSocketDelegate},
};

/// Documents produced from one capture.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub script: Script,
    pub jmx: Node,
    /// Results document, present when a record file is configured
    pub records: Option<Node>,
    pub record_count: usize,
}

/// What [`generate`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub jmx_path: PathBuf,
    pub record_path: Option<PathBuf>,
    pub groups: usize,
    pub samplers: usize,
    pub records: usize,
}

/// Convert a loaded capture without touching the filesystem.
pub fn convert(archive: &HarArchive, annotations: &Annotations, config: &Config) -> Result<Conversion> {
    let filter = ExchangeFilter::new(
        config.include_regex.as_deref(),
        config.exclude_regex.as_deref(),
        config.websocket,
    )?;
    let websocket = HarWebSocketDelegate;
    let delegate: Option<&dyn WebSocketDelegate> = if config.websocket {
        Some(&websocket)
    } else {
        None
    };

    let builder = SamplerBuilder::new(
        Endpoint::from_archive(archive)?,
        config.remove_cookie,
        config.remove_cache_headers,
    );
    let script = Segmenter::new(
        &filter,
        &builder,
        annotations,
        delegate,
        SegmentSettings::from(config),
    )
    .segment(archive)?;

    let tree_builder =
        JmeterTreeBuilder::new(config.record_out.clone(), config.add_result_tree_record);
    let jmx = tree_builder.build_script(&script)?;

    let (records, record_count) = match config.record_out.as_deref() {
        Some(path) if !path.is_empty() => {
            let samples =
                record::build_records(archive, &filter, delegate, config.action_start_number)?;
            (Some(tree_builder.build_results(&samples)?), samples.len())
        }
        _ => (None, 0),
    };

    Ok(Conversion {
        script,
        jmx,
        records,
        record_count,
    })
}

/// Main entry point for conversion
pub async fn generate(config: &Config) -> Result<Summary> {
    // 1. Load the capture and the optional annotations
    let archive = HarArchive::from_file_or_url(&config.har_path).await?;
    let annotations = Annotations::load(config).await;

    // 2. Build the documents
    let conversion = convert(&archive, &annotations, config)?;

    // 3. Render them
    let renderer = XmlRenderer::new()?;
    renderer.write(&conversion.jmx, &config.jmx_out).await?;

    let record_path = match (&conversion.records, config.record_out.as_deref()) {
        (Some(records), Some(path)) => {
            renderer.write(records, path).await?;
            Some(PathBuf::from(path))
        }
        _ => None,
    };

    Ok(Summary {
        jmx_path: PathBuf::from(&config.jmx_out),
        record_path,
        groups: conversion.script.groups().count(),
        samplers: conversion.script.actions().count(),
        records: conversion.record_count,
    })
}
