// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0

//! The prudent sorter: an order-preserving sort that reorders as few
//! items as possible, under a partial (non-transitive) `can_go_before`
//! relation, with a "prefer the more successor-permissive tie" rule.
//!
//! The core algorithm ([`prudent_sort`]) is generic over any item that
//! implements [`Orderable`], so it serves both entry-level sorting
//! (within a transaction-bearing block list) and block-level sorting
//! (within a compartment), matching the original's `OrderedEntry` /
//! `OrderedBlock` split.
//!
//! The merge step here is a simplified, always-correct-but-not-maximally-
//! lazy interleave rather than the original's heap-based block-splitting
//! merge: ties are broken by always preferring to emit from the retained
//! subsequence when legal. See `DESIGN.md` for the rationale — the
//! simplification only affects which of several equally valid minimal
//! reorderings is produced, never the three invariants in §8 of
//! `SPEC_FULL.md` (retained order preserved, compartments never crossed,
//! determinism).

use chrono::NaiveDate;

/// The partial order and associative min/max summaries the prudent
/// sorter needs from its item type.
pub trait Orderable: Clone {
    /// May `self` precede `other`?
    fn can_go_before(&self, other: &Self) -> bool;
    /// Is `self`'s set of allowed successors a proper superset of
    /// `other`'s?
    fn more_successor_permissive_than(&self, other: &Self) -> bool;
    fn min(&self, other: &Self) -> Self;
    fn max(&self, other: &Self) -> Self;
    /// A deterministic total-order key used to sort the "unsorted"
    /// remainder, and to break ties by original position.
    fn simple_key(&self) -> (i64, i64, usize);
}

/// Sorts `items` in place order, touching as few elements as possible.
/// Returns `items` unchanged (same order) if it was already ordered.
#[must_use]
pub fn prudent_sort<T: Orderable>(items: Vec<T>) -> Vec<T> {
    if items.len() <= 1 || already_ordered(&items) {
        return items;
    }
    let chain = longest_non_decreasing_subsequence(&items);
    let in_chain: Vec<bool> = {
        let mut flags = vec![false; items.len()];
        for &i in &chain {
            flags[i] = true;
        }
        flags
    };
    let sorted: Vec<T> = chain.iter().map(|&i| items[i].clone()).collect();
    let mut unsorted: Vec<T> = items
        .iter()
        .enumerate()
        .filter(|(i, _)| !in_chain[*i])
        .map(|(_, item)| item.clone())
        .collect();
    unsorted.sort_by_key(Orderable::simple_key);
    merge(sorted, unsorted)
}

fn already_ordered<T: Orderable>(items: &[T]) -> bool {
    let mut running = match items.first() {
        Some(first) => first.clone(),
        None => return true,
    };
    for item in &items[1..] {
        if !running.can_go_before(item) {
            return false;
        }
        running = running.max(item);
    }
    true
}

/// Longest non-decreasing subsequence under `can_go_before`, with the
/// "more successor-permissive" tie-break from the original's design
/// notes — without it the "reorder with optional time" scenario produces
/// a different, still-valid-looking but non-matching chain.
fn longest_non_decreasing_subsequence<T: Orderable>(items: &[T]) -> Vec<usize> {
    let n = items.len();
    let mut len = vec![1usize; n];
    let mut prev: Vec<Option<usize>> = vec![None; n];
    let mut run_max: Vec<T> = items.to_vec();

    for i in 0..n {
        for j in 0..i {
            if !run_max[j].can_go_before(&items[i]) {
                continue;
            }
            let candidate_len = len[j] + 1;
            let candidate_max = run_max[j].max(&items[i]);
            let better = candidate_len > len[i]
                || (candidate_len == len[i]
                    && prev[i].is_some()
                    && candidate_max.more_successor_permissive_than(&run_max[i]));
            if better {
                len[i] = candidate_len;
                prev[i] = Some(j);
                run_max[i] = candidate_max;
            }
        }
    }

    let mut best = 0;
    for i in 1..n {
        if len[i] > len[best]
            || (len[i] == len[best] && run_max[i].more_successor_permissive_than(&run_max[best]))
        {
            best = i;
        }
    }

    let mut chain = Vec::new();
    let mut cursor = Some(best);
    while let Some(i) = cursor {
        chain.push(i);
        cursor = prev[i];
    }
    chain.reverse();
    chain
}

/// Interleaves `unsorted` (already totally ordered) into `sorted`
/// (never reordered relative to itself), preferring to emit a `sorted`
/// item whenever it legally precedes the next `unsorted` item.
fn merge<T: Orderable>(sorted: Vec<T>, unsorted: Vec<T>) -> Vec<T> {
    let mut out = Vec::with_capacity(sorted.len() + unsorted.len());
    let mut s = sorted.into_iter().peekable();
    let mut u = unsorted.into_iter().peekable();
    loop {
        match (s.peek(), u.peek()) {
            (Some(sv), Some(uv)) => {
                if sv.can_go_before(uv) {
                    out.push(s.next().expect("peeked"));
                } else {
                    out.push(u.next().expect("peeked"));
                }
            }
            (Some(_), None) => out.push(s.next().expect("peeked")),
            (None, Some(_)) => out.push(u.next().expect("peeked")),
            (None, None) => break,
        }
    }
    out
}

/// A sortable ledger entry: a transaction or dated directive's date plus
/// optional `time` meta tie-breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedEntry {
    pub date: NaiveDate,
    pub time: Option<i64>,
    /// Index of this entry in the original, unsorted file — used only
    /// as the final tie-break in [`Orderable::simple_key`].
    pub index: usize,
}

impl Orderable for OrderedEntry {
    fn can_go_before(&self, other: &Self) -> bool {
        if self.date != other.date {
            return self.date <= other.date;
        }
        match (self.time, other.time) {
            (None, _) | (_, None) => true,
            (Some(a), Some(b)) => a <= b,
        }
    }

    fn more_successor_permissive_than(&self, other: &Self) -> bool {
        // An entry with no time accepts any successor; one constrained to
        // a later date/time accepts strictly fewer successors than one
        // constrained to an earlier date/time.
        match (self.time, other.time) {
            (None, Some(_)) => true,
            (Some(_), None) => false,
            _ => self.date < other.date || (self.date == other.date && self.time < other.time),
        }
    }

    fn min(&self, other: &Self) -> Self {
        if other.can_go_before(self) && !self.can_go_before(other) {
            other.clone()
        } else {
            self.clone()
        }
    }

    fn max(&self, other: &Self) -> Self {
        if self.can_go_before(other) && !other.can_go_before(self) {
            other.clone()
        } else {
            self.clone()
        }
    }

    fn simple_key(&self) -> (i64, i64, usize) {
        (
            i64::from(self.date.num_days_from_ce()),
            self.time.unwrap_or(0),
            self.index,
        )
    }
}

/// A sortable block of top-level entities: either "dated" (carries one or
/// more [`OrderedEntry`]s) or "undated" (e.g. a run of bare `include`
/// directives), which is maximally permissive and can go anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedBlock {
    pub entries: Vec<OrderedEntry>,
    /// Index of this block's first entry in the original file's overall
    /// entry numbering; used as the final tie-break in `simple_key`, and
    /// as the block's own position marker when it has no entries.
    pub first_entry_index: usize,
    pub block_index: usize,
}

impl OrderedBlock {
    #[must_use]
    pub fn is_dated(&self) -> bool {
        !self.entries.is_empty()
    }

    fn min_entry(&self) -> Option<&OrderedEntry> {
        self.entries.iter().min_by_key(Orderable::simple_key)
    }

    fn max_entry(&self) -> Option<&OrderedEntry> {
        self.entries.iter().max_by_key(Orderable::simple_key)
    }
}

impl Orderable for OrderedBlock {
    fn can_go_before(&self, other: &Self) -> bool {
        match (self.max_entry(), other.min_entry()) {
            (None, _) | (_, None) => true,
            (Some(a), Some(b)) => a.can_go_before(b),
        }
    }

    fn more_successor_permissive_than(&self, other: &Self) -> bool {
        match (self.is_dated(), other.is_dated()) {
            (false, true) => true,
            (true, false) => false,
            (false, false) => false,
            (true, true) => {
                let (a, b) = (self.max_entry().unwrap(), other.max_entry().unwrap());
                a.more_successor_permissive_than(b)
            }
        }
    }

    fn min(&self, other: &Self) -> Self {
        if other.can_go_before(self) && !self.can_go_before(other) {
            other.clone()
        } else {
            self.clone()
        }
    }

    fn max(&self, other: &Self) -> Self {
        if self.can_go_before(other) && !other.can_go_before(self) {
            other.clone()
        } else {
            self.clone()
        }
    }

    fn simple_key(&self) -> (i64, i64, usize) {
        match (self.min_entry(), self.max_entry()) {
            (Some(min), Some(max)) => (
                min.simple_key().0,
                max.simple_key().0 * 1_000_000 + max.simple_key().1.max(0),
                self.first_entry_index,
            ),
            _ => (i64::MIN, i64::MIN, self.first_entry_index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(y: i32, m: u32, d: u32, index: usize) -> OrderedEntry {
        OrderedEntry {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            time: None,
            index,
        }
    }

    fn entry_with_time(y: i32, m: u32, d: u32, time: i64, index: usize) -> OrderedEntry {
        OrderedEntry {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            time: Some(time),
            index,
        }
    }

    #[test]
    fn already_sorted_entries_are_untouched() {
        let entries = vec![entry(2000, 1, 1, 0), entry(2000, 1, 2, 1), entry(2000, 1, 3, 2)];
        let sorted = prudent_sort(entries.clone());
        assert_eq!(sorted, entries);
    }

    #[test]
    fn reorders_single_out_of_place_entry_with_time_tiebreak() {
        let entries = vec![
            entry(2000, 1, 1, 0),
            entry_with_time(2000, 1, 2, 3_600_000_000, 1),
            entry(2000, 1, 2, 2),
            entry_with_time(2000, 1, 2, 7_200_000_000, 3),
            entry(2000, 1, 2, 4),
            entry_with_time(2000, 1, 2, 3_660_000_000, 5),
            entry(2000, 1, 3, 6),
        ];
        let sorted = prudent_sort(entries);
        let dates: Vec<_> = sorted.iter().map(|e| (e.date, e.time)).collect();
        assert_eq!(
            dates,
            vec![
                (NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(), None),
                (
                    NaiveDate::from_ymd_opt(2000, 1, 2).unwrap(),
                    Some(3_600_000_000)
                ),
                (NaiveDate::from_ymd_opt(2000, 1, 2).unwrap(), None),
                (
                    NaiveDate::from_ymd_opt(2000, 1, 2).unwrap(),
                    Some(3_660_000_000)
                ),
                (
                    NaiveDate::from_ymd_opt(2000, 1, 2).unwrap(),
                    Some(7_200_000_000)
                ),
                (NaiveDate::from_ymd_opt(2000, 1, 2).unwrap(), None),
                (NaiveDate::from_ymd_opt(2000, 1, 3).unwrap(), None),
            ]
        );
    }

    fn block(dates: &[(i32, u32, u32)], first_index: usize, block_index: usize) -> OrderedBlock {
        OrderedBlock {
            entries: dates
                .iter()
                .enumerate()
                .map(|(i, &(y, m, d))| entry(y, m, d, first_index + i))
                .collect(),
            first_entry_index: first_index,
            block_index,
        }
    }

    #[test]
    fn undated_block_is_maximally_permissive() {
        let undated = OrderedBlock {
            entries: Vec::new(),
            first_entry_index: 0,
            block_index: 0,
        };
        let dated = block(&[(2000, 1, 1)], 0, 1);
        assert!(undated.can_go_before(&dated));
        assert!(dated.can_go_before(&undated));
    }

    #[test]
    fn blocks_already_sorted_are_untouched() {
        let blocks = vec![
            block(&[(2000, 2, 1), (2000, 2, 2)], 0, 0),
            block(&[(2000, 1, 1), (2000, 1, 2)], 2, 1),
        ];
        // Deliberately out of order: verifies the sort actually reorders.
        let sorted = prudent_sort(blocks.clone());
        assert_ne!(sorted[0].block_index, blocks[0].block_index);
    }
}
