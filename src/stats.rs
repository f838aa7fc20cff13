use std::collections::HashMap;

/// Rows shown in a report.
///
/// Eleven, not ten: the tool has always printed indices 0 through 10 and
/// downstream scripts rely on that row count.
pub const TOP_ENTRIES: usize = 11;

/// Occurrence counts per aggregation key, remembering the order in which
/// keys were first seen.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    index: HashMap<String, usize>,
    entries: Vec<RankedEntry>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].count += 1,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push(RankedEntry {
                    key: key.to_string(),
                    count: 1,
                });
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.index.get(key).map(|&i| self.entries[i].count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Orders entries by count, highest first. The sort is stable, so keys
    /// with equal counts stay in first-seen order.
    pub fn rank(self) -> Vec<RankedEntry> {
        let mut ranked = self.entries;
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub key: String,
    pub count: u64,
}

/// The slice of a ranked list that gets reported.
pub fn top(ranked: &[RankedEntry]) -> &[RankedEntry] {
    &ranked[..ranked.len().min(TOP_ENTRIES)]
}

/// Per-run line accounting.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineStats {
    pub lines_read: u64,
    pub parse_failures: u64,
    pub filtered: u64,
    pub time_errors: u64,
    pub accepted: u64,
}

#[derive(Debug)]
pub struct AnalysisResult {
    pub table: FrequencyTable,
    pub stats: LineStats,
}
