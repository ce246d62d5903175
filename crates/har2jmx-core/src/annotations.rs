//! Transaction annotations: named time windows that name and split
//! transaction groups.
//!
//! The external CSV source holds one event per line:
//!
//! ```text
//! 2024-05-07T07:56:40.513Z;TRANSACTION;welcome_page;start
//! 2024-05-07T07:56:44.900Z;TRANSACTION;welcome_page;end
//! ```
//!
//! A `start` line opens a window that the next `end` line with the same name
//! closes.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, FixedOffset};
use tokio::fs;

use crate::config::{AnnotationSourceKind, Config};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionAnnotation {
    pub name: String,
    pub begin: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl TransactionAnnotation {
    fn contains(&self, instant_ms: i64) -> bool {
        self.begin.timestamp_millis() <= instant_ms && instant_ms <= self.end.timestamp_millis()
    }

    fn distance_ms(&self, instant_ms: i64) -> i64 {
        if instant_ms < self.begin.timestamp_millis() {
            self.begin.timestamp_millis() - instant_ms
        } else {
            instant_ms - self.end.timestamp_millis()
        }
    }
}

/// Annotations ordered by begin time.
#[derive(Debug, Clone, Default)]
pub struct Annotations {
    items: Vec<TransactionAnnotation>,
    /// `None` attributes any instant to the nearest window
    tolerance_ms: Option<i64>,
}

impl Annotations {
    pub fn new(mut items: Vec<TransactionAnnotation>, tolerance_ms: Option<u64>) -> Self {
        items.sort_by_key(|a| a.begin);
        Self {
            items,
            tolerance_ms: tolerance_ms.map(|t| i64::try_from(t).unwrap_or(i64::MAX)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Load the annotation source named by the configuration. An unreadable
    /// source is logged and yields no annotations.
    pub async fn load(config: &Config) -> Self {
        match (config.annotation_source, config.annotation_path.as_deref()) {
            (AnnotationSourceKind::None, _) => Self::default(),
            (AnnotationSourceKind::ExternalCsv, None) => {
                log::error!("External annotation source selected without a file, ignoring it");
                Self::default()
            }
            (AnnotationSourceKind::ExternalCsv, Some(path)) => {
                match Self::from_csv_file(path, config.annotation_tolerance_ms).await {
                    Ok(annotations) => {
                        log::info!("Loaded {} transaction annotation(s) from {}", annotations.len(), path);
                        annotations
                    }
                    Err(e) => {
                        log::error!("Can't read annotation file {}: {}, continuing without", path, e);
                        Self::default()
                    }
                }
            }
        }
    }

    pub async fn from_csv_file<P: AsRef<Path>>(
        path: P,
        tolerance_ms: Option<u64>,
    ) -> crate::Result<Self> {
        let content = fs::read_to_string(path).await?;
        Ok(Self::from_csv_str(&content, tolerance_ms))
    }

    /// Parse CSV events; malformed lines and unmatched events are skipped
    /// with a warning.
    pub fn from_csv_str(content: &str, tolerance_ms: Option<u64>) -> Self {
        let mut open: HashMap<String, DateTime<FixedOffset>> = HashMap::new();
        let mut items = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(';').map(str::trim).collect();
            let [timestamp, kind, name, event] = fields[..] else {
                log::warn!("Annotation line {} has not 4 fields: {}", index + 1, line);
                continue;
            };
            if !kind.eq_ignore_ascii_case("TRANSACTION") {
                continue;
            }
            let Ok(instant) = DateTime::parse_from_rfc3339(timestamp) else {
                log::warn!("Annotation line {} has an invalid timestamp: {}", index + 1, timestamp);
                continue;
            };

            if event.eq_ignore_ascii_case("start") {
                open.insert(name.to_string(), instant);
            } else if event.eq_ignore_ascii_case("end") {
                match open.remove(name) {
                    Some(begin) => items.push(TransactionAnnotation {
                        name: name.to_string(),
                        begin,
                        end: instant,
                    }),
                    None => log::warn!("Annotation '{}' ends without a start", name),
                }
            } else {
                log::warn!("Annotation line {} has an unknown event: {}", index + 1, event);
            }
        }
        for name in open.keys() {
            log::warn!("Annotation '{}' starts without an end", name);
        }

        Self::new(items, tolerance_ms)
    }

    /// The annotation covering an instant. Among windows containing it the
    /// one that began last wins; when none contains it, the nearest window
    /// is used, provided it lies within the tolerance when one is set.
    pub fn around(&self, instant: DateTime<FixedOffset>) -> Option<&TransactionAnnotation> {
        let instant_ms = instant.timestamp_millis();
        if let Some(found) = self.items.iter().rev().find(|a| a.contains(instant_ms)) {
            return Some(found);
        }
        self.items
            .iter()
            .map(|a| (a.distance_ms(instant_ms), a))
            .filter(|(d, _)| self.tolerance_ms.map_or(true, |t| *d <= t))
            .min_by_key(|(d, _)| *d)
            .map(|(_, a)| a)
    }
}
