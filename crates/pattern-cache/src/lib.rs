//! Pattern Cache (C4): stores AI-generated action sequences keyed by a
//! deterministic hash over normalized (task, action, target), with
//! success/failure counters per spec.md §4.4.
//!
//! Keyed, concurrency-safe map shape follows `browser-manager`'s
//! `DashMap`-backed contexts/pages table; counter updates are atomic via the
//! same per-entry lock pattern.

use md5::{Digest, Md5};
use soulbrowser_core_types::Pattern;
use std::sync::Arc;

/// Derives the 16-hex pattern key per spec.md §4.4: case-folding is the only
/// normalization, never stemming/lemmatizing, so keys stay portable.
pub fn pattern_key(task: &str, action_type: &str, target: &str) -> String {
    let normalized = format!(
        "{}|{}|{}",
        task.to_lowercase(),
        action_type.to_lowercase(),
        target.to_lowercase()
    );
    let digest = Md5::digest(normalized.as_bytes());
    let full_hex = format!("{digest:x}");
    full_hex[..16].to_string()
}

/// Concurrency-safe store of `Pattern`s keyed by `pattern_key`.
#[derive(Default)]
pub struct PatternCache {
    entries: dashmap::DashMap<String, Pattern>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Pattern> {
        self.entries.get(key).map(|e| e.clone())
    }

    pub fn put(&self, pattern: Pattern) {
        self.entries.insert(pattern.pattern_id.clone(), pattern);
    }

    /// Touches `last_used` on a cache hit without altering the stored
    /// actions, then returns the (possibly updated) pattern.
    pub fn touch(&self, key: &str) -> Option<Pattern> {
        let mut entry = self.entries.get_mut(key)?;
        entry.last_used = chrono::Utc::now();
        Some(entry.clone())
    }

    /// Records an outcome for `key`, adjusting `success_count`/`failure_count`
    /// (and thus `success_rate`). No-op if the key is unknown.
    pub fn record(&self, key: &str, success: bool) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if success {
                entry.success_count += 1;
            } else {
                entry.failure_count += 1;
            }
            tracing::debug!(
                target: "pattern_cache",
                key,
                success,
                success_rate = entry.success_rate(),
                "recorded pattern outcome"
            );
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Snapshot of all patterns, iteration order success-rate descending
    /// per spec.md §4.4.
    pub fn export_statistics(&self) -> Vec<Pattern> {
        let mut patterns: Vec<Pattern> = self.entries.iter().map(|e| e.value().clone()).collect();
        patterns.sort_by(|a, b| b.success_rate().partial_cmp(&a.success_rate()).unwrap());
        patterns
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type SharedPatternCache = Arc<PatternCache>;
