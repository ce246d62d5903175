//! Exchange filtering.
//!
//! An [`ExchangeFilter`] is an ordered list of [`FilterRule`]s folded over a
//! running decision. Later rules override earlier ones: an exclude match
//! overrides an include match, and the cache and `data:` rules override
//! both. The WebSocket rule comes last and replaces the decision entirely
//! for `ws:`/`wss:` URLs.

use regex::Regex;

use crate::har::HarEntry;

/// What to do with one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Drop(DropReason),
    /// Hand the exchange to the WebSocket delegate
    Delegate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NotIncluded,
    Excluded,
    FromCache,
    DataUri,
    WebSocketUnsupported,
}

#[derive(Debug, Clone)]
pub enum FilterRule {
    /// Keep only when the pattern is found anywhere in the URL
    Include(Regex),
    /// Drop when the pattern is found anywhere in the URL
    Exclude(Regex),
    SkipCached,
    /// Dropped before numbering, so `data:` URIs leave no gap in labels
    SkipDataUri,
    /// Delegate `ws:`/`wss:` URLs when enabled, drop them otherwise
    WebSocket { delegate: bool },
}

impl FilterRule {
    fn apply(&self, url: &str, from_cache: bool, decision: Decision) -> Decision {
        match self {
            FilterRule::Include(re) => {
                if re.is_match(url) {
                    Decision::Keep
                } else {
                    Decision::Drop(DropReason::NotIncluded)
                }
            }
            FilterRule::Exclude(re) if re.is_match(url) => Decision::Drop(DropReason::Excluded),
            FilterRule::SkipCached if from_cache => Decision::Drop(DropReason::FromCache),
            FilterRule::SkipDataUri if has_scheme(url, &["data"]) => {
                Decision::Drop(DropReason::DataUri)
            }
            FilterRule::WebSocket { delegate } if has_scheme(url, &["ws", "wss"]) => {
                if *delegate {
                    Decision::Delegate
                } else {
                    Decision::Drop(DropReason::WebSocketUnsupported)
                }
            }
            _ => decision,
        }
    }
}

/// Ordered rule list deciding which exchanges become samplers.
#[derive(Debug, Clone)]
pub struct ExchangeFilter {
    rules: Vec<FilterRule>,
}

impl ExchangeFilter {
    /// Build the standard rule list. Empty patterns count as absent.
    pub fn new(
        include: Option<&str>,
        exclude: Option<&str>,
        websocket_delegate: bool,
    ) -> crate::Result<Self> {
        let mut rules = Vec::new();
        if let Some(pattern) = include.filter(|p| !p.is_empty()) {
            rules.push(FilterRule::Include(Regex::new(pattern)?));
        }
        if let Some(pattern) = exclude.filter(|p| !p.is_empty()) {
            rules.push(FilterRule::Exclude(Regex::new(pattern)?));
        }
        rules.push(FilterRule::SkipCached);
        rules.push(FilterRule::SkipDataUri);
        rules.push(FilterRule::WebSocket {
            delegate: websocket_delegate,
        });
        Ok(Self { rules })
    }

    /// Filter with a caller-ordered rule list.
    pub fn from_rules(rules: Vec<FilterRule>) -> Self {
        Self { rules }
    }

    pub fn decide(&self, url: &str, from_cache: bool) -> Decision {
        let decision = self
            .rules
            .iter()
            .fold(Decision::Keep, |d, rule| rule.apply(url, from_cache, d));
        if let Decision::Drop(reason) = decision {
            log::debug!("This url is filtered ({:?}): {}", reason, url);
        }
        decision
    }

    pub fn decide_entry(&self, entry: &HarEntry) -> Decision {
        self.decide(&entry.request.url, entry.is_from_cache())
    }
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    url.split_once(':')
        .map(|(scheme, _)| schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_by_default() -> crate::Result<()> {
        let filter = ExchangeFilter::new(None, None, false)?;
        assert_eq!(filter.decide("https://example.com/a", false), Decision::Keep);
        Ok(())
    }

    #[test]
    fn test_include_is_a_substring_search() -> crate::Result<()> {
        let filter = ExchangeFilter::new(Some("example"), None, false)?;
        assert_eq!(filter.decide("https://example.com/a", false), Decision::Keep);
        assert_eq!(
            filter.decide("https://other.org/a", false),
            Decision::Drop(DropReason::NotIncluded)
        );
        Ok(())
    }

    #[test]
    fn test_exclude_wins_over_include() -> crate::Result<()> {
        let filter = ExchangeFilter::new(Some("example"), Some(r"\.png$"), false)?;
        assert_eq!(
            filter.decide("https://example.com/logo.png", false),
            Decision::Drop(DropReason::Excluded)
        );
        assert_eq!(filter.decide("https://example.com/index", false), Decision::Keep);
        Ok(())
    }

    #[test]
    fn test_cache_and_data_uri_are_dropped() -> crate::Result<()> {
        let filter = ExchangeFilter::new(Some("."), None, false)?;
        assert_eq!(
            filter.decide("https://example.com/a.css", true),
            Decision::Drop(DropReason::FromCache)
        );
        assert_eq!(
            filter.decide("data:image/png;base64,AAAA", false),
            Decision::Drop(DropReason::DataUri)
        );
        Ok(())
    }

    #[test]
    fn test_websocket_delegation() -> crate::Result<()> {
        let without = ExchangeFilter::new(None, None, false)?;
        assert_eq!(
            without.decide("wss://example.com/socket", false),
            Decision::Drop(DropReason::WebSocketUnsupported)
        );

        // an exclude match does not stop delegation once a delegate exists
        let with = ExchangeFilter::new(None, Some("socket"), true)?;
        assert_eq!(with.decide("wss://example.com/socket", false), Decision::Delegate);
        assert_eq!(with.decide("ws://example.com/", false), Decision::Delegate);
        Ok(())
    }

    #[test]
    fn test_custom_rule_order() -> crate::Result<()> {
        // an include placed after the cache rule keeps matching cached URLs
        let filter = ExchangeFilter::from_rules(vec![
            FilterRule::SkipCached,
            FilterRule::Include(Regex::new(r"/api/")?),
        ]);
        assert_eq!(filter.decide("https://example.com/api/items", true), Decision::Keep);
        assert_eq!(
            filter.decide("https://example.com/app.js", true),
            Decision::Drop(DropReason::NotIncluded)
        );
        assert_eq!(
            ExchangeFilter::from_rules(Vec::new()).decide("data:text/plain,hi", false),
            Decision::Keep
        );
        Ok(())
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        assert!(matches!(
            ExchangeFilter::new(Some("("), None, false),
            Err(crate::Error::Pattern(_))
        ));
    }
}
