use crate::models::ListingRecord;
use std::collections::HashSet;

/// Drop repeated listing ids, keeping the first occurrence and the original order.
/// Returns the survivors and how many records were removed.
pub fn dedup_by_id(records: Vec<ListingRecord>) -> (Vec<ListingRecord>, usize) {
    let before = records.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<ListingRecord> = records
        .into_iter()
        .filter(|record| seen.insert(record.id.clone()))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}
