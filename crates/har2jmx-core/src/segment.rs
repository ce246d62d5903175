//! Transaction segmentation.
//!
//! A single pass over the pages of a capture turns its accepted exchanges into
//! an ordered [`Script`] of pauses and named transaction groups. A group is
//! opened at every page start, when an exchange falls into a new annotated
//! transaction, when a single-page capture goes quiet for longer than the
//! configured threshold, and for every delegated WebSocket connection.
//!
//! All counters live in a [`SegmentationCursor`] owned by one run.

use chrono::{DateTime, FixedOffset};

use crate::{
    annotations::Annotations,
    config::{self, Config},
    filter::{Decision, ExchangeFilter},
    har::{HarArchive, HarEntry, HarPage},
    sampler::{self, ActionDescriptor, Endpoint, SamplerBuilder},
    tree::Node,
    websocket::WebSocketDelegate,
};

/// One replayable step of a transaction group.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Http(ActionDescriptor),
    /// Sub-tree produced by the WebSocket delegate
    WebSocket { label: String, nodes: Vec<Node> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionGroup {
    pub number: u32,
    /// Full name, `PAGE_NN - <name>`
    pub name: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptItem {
    Pause { duration_ms: i64 },
    Group(TransactionGroup),
}

/// Segmented capture, ready for a tree builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub endpoint: Endpoint,
    pub items: Vec<ScriptItem>,
}

impl Script {
    pub fn groups(&self) -> impl Iterator<Item = &TransactionGroup> {
        self.items.iter().filter_map(|item| match item {
            ScriptItem::Group(group) => Some(group),
            ScriptItem::Pause { .. } => None,
        })
    }

    pub fn pauses(&self) -> impl Iterator<Item = i64> + '_ {
        self.items.iter().filter_map(|item| match item {
            ScriptItem::Pause { duration_ms } => Some(*duration_ms),
            ScriptItem::Group(_) => None,
        })
    }

    /// HTTP actions in script order.
    pub fn actions(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.groups()
            .flat_map(|group| group.steps.iter())
            .filter_map(|step| match step {
                Step::Http(action) => Some(action),
                Step::WebSocket { .. } => None,
            })
    }
}

/// The part of [`Config`] the segmenter reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSettings {
    pub add_pause: bool,
    pub new_group_after_ms: u64,
    pub page_start_number: u32,
    pub action_start_number: u32,
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            add_pause: true,
            new_group_after_ms: 0,
            page_start_number: 1,
            action_start_number: 1,
        }
    }
}

impl From<&Config> for SegmentSettings {
    fn from(config: &Config) -> Self {
        Self {
            add_pause: config.add_pause,
            new_group_after_ms: config.new_group_after_ms,
            page_start_number: config.page_start_number,
            action_start_number: config.action_start_number,
        }
    }
}

/// Running state of one segmentation pass.
#[derive(Debug)]
pub struct SegmentationCursor {
    items: Vec<ScriptItem>,
    group: Option<TransactionGroup>,
    /// Begin time of the annotation that named the current group
    active_annotation: Option<DateTime<FixedOffset>>,
    last_page_ms: i64,
    /// Start of the last exchange that became an HTTP action
    last_action_ms: i64,
    next_page: u32,
    next_action: u32,
}

impl SegmentationCursor {
    fn new(settings: &SegmentSettings, first_exchange_ms: i64) -> Self {
        Self {
            items: Vec::new(),
            group: None,
            active_annotation: None,
            last_page_ms: 0,
            last_action_ms: first_exchange_ms,
            next_page: config::clamp_start_number("page_start_number", settings.page_start_number),
            next_action: config::clamp_start_number(
                "action_start_number",
                settings.action_start_number,
            ),
        }
    }

    fn flush(&mut self) {
        if let Some(group) = self.group.take() {
            self.items.push(ScriptItem::Group(group));
        }
    }

    fn pause(&mut self, duration_ms: i64) {
        self.flush();
        self.items.push(ScriptItem::Pause { duration_ms });
    }

    fn open_group(&mut self, name: &str) {
        self.flush();
        let number = self.next_page;
        self.next_page += 1;
        log::debug!("Opening transaction group {:02} for '{}'", number, name);
        self.group = Some(TransactionGroup {
            number,
            name: format!("PAGE_{:02} - {}", number, name),
            steps: Vec::new(),
        });
    }

    fn push(&mut self, step: Step) {
        if self.group.is_none() {
            self.open_group("");
        }
        if let Some(group) = self.group.as_mut() {
            group.steps.push(step);
        }
    }

    fn finish(mut self, endpoint: Endpoint) -> Script {
        self.flush();
        Script {
            endpoint,
            items: self.items,
        }
    }
}

/// Name of a page: the path of its title when the title is a URL, else the
/// title itself.
pub fn page_name(title: &str) -> String {
    match url::Url::parse(title) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => title.to_string(),
    }
}

pub struct Segmenter<'a> {
    filter: &'a ExchangeFilter,
    builder: &'a SamplerBuilder,
    annotations: &'a Annotations,
    delegate: Option<&'a dyn WebSocketDelegate>,
    settings: SegmentSettings,
}

impl<'a> Segmenter<'a> {
    pub fn new(
        filter: &'a ExchangeFilter,
        builder: &'a SamplerBuilder,
        annotations: &'a Annotations,
        delegate: Option<&'a dyn WebSocketDelegate>,
        settings: SegmentSettings,
    ) -> Self {
        Self {
            filter,
            builder,
            annotations,
            delegate,
            settings,
        }
    }

    pub fn segment(&self, archive: &HarArchive) -> crate::Result<Script> {
        let pages = archive.pages_or_synthetic()?;
        let synthetic = !archive.has_pages();
        let split_on_gap = pages.len() == 1 && self.settings.new_group_after_ms > 0;
        log::info!("Number of page(s) in the HAR: {}", archive.log.pages.len());

        let first_exchange_ms = archive.entries().first().map_or(0, HarEntry::started_ms);
        let mut cursor = SegmentationCursor::new(&self.settings, first_exchange_ms);

        for (index, page) in pages.iter().enumerate() {
            if index > 0 {
                let gap = page.started_ms() - cursor.last_page_ms;
                if self.settings.add_pause && gap > 0 {
                    cursor.pause(gap);
                }
            }
            cursor.last_page_ms = page.started_ms();
            self.open_page(&mut cursor, page);

            let entries = archive
                .entries()
                .iter()
                .filter(|e| synthetic || e.pageref.as_deref() == Some(page.id.as_str()));
            for entry in entries {
                self.segment_entry(&mut cursor, entry, split_on_gap)?;
            }
        }

        let script = cursor.finish(self.builder.endpoint().clone());
        log::info!(
            "Script contains {} transaction group(s) and {} HTTP sampler(s)",
            script.groups().count(),
            script.actions().count()
        );
        Ok(script)
    }

    fn open_page(&self, cursor: &mut SegmentationCursor, page: &HarPage) {
        match self.annotations.around(page.started_date_time) {
            Some(annotation) => {
                log::info!("Naming page {} after transaction '{}'", page.id, annotation.name);
                cursor.active_annotation = Some(annotation.begin);
                cursor.open_group(&annotation.name);
            }
            None => {
                cursor.active_annotation = None;
                cursor.open_group(&page_name(&page.title));
            }
        }
    }

    fn segment_entry(
        &self,
        cursor: &mut SegmentationCursor,
        entry: &HarEntry,
        split_on_gap: bool,
    ) -> crate::Result<()> {
        match (self.filter.decide_entry(entry), self.delegate) {
            (Decision::Keep, _) => self.add_action(cursor, entry, split_on_gap),
            (Decision::Delegate, Some(delegate)) => self.add_websocket(cursor, entry, delegate),
            _ => Ok(()),
        }
    }

    fn add_action(
        &self,
        cursor: &mut SegmentationCursor,
        entry: &HarEntry,
        split_on_gap: bool,
    ) -> crate::Result<()> {
        let action = self.builder.build(entry, cursor.next_action)?;
        cursor.next_action += 1;

        let mut opened = false;
        if let Some(annotation) = self.annotations.around(entry.started_date_time) {
            if cursor.active_annotation != Some(annotation.begin) {
                log::info!("Opening group for transaction '{}'", annotation.name);
                cursor.active_annotation = Some(annotation.begin);
                cursor.open_group(&annotation.name);
                opened = true;
            }
        }

        let gap = entry.started_ms() - cursor.last_action_ms;
        if split_on_gap && !opened && gap > self.settings.new_group_after_ms as i64 {
            if self.settings.add_pause {
                cursor.pause(gap);
            }
            let url = sampler::parse_url(&entry.request.url)?;
            cursor.open_group(url.path());
        }
        cursor.last_action_ms = entry.started_ms();

        cursor.push(Step::Http(action));
        Ok(())
    }

    fn add_websocket(
        &self,
        cursor: &mut SegmentationCursor,
        entry: &HarEntry,
        delegate: &dyn WebSocketDelegate,
    ) -> crate::Result<()> {
        let url = sampler::parse_url(&entry.request.url)?;
        let label = sampler::label(cursor.next_action, &url);
        cursor.open_group(&format!("WebSocket {}", url.path()));

        let delegated = delegate.script(
            entry,
            &label,
            self.builder.endpoint(),
            cursor.next_action + 1,
        )?;
        log::debug!(
            "WebSocket {} replayed with {} message(s)",
            url,
            entry.web_socket_messages.len()
        );
        cursor.next_action = delegated.next_number + 1;
        cursor.push(Step::WebSocket {
            label,
            nodes: delegated.items,
        });
        Ok(())
    }
}
