//! Grouping of threads with identical stacks.

use crate::types::{Bucket, Frame, Signature, ThreadRecord};
use std::collections::HashMap;

/// Argument-insensitive identity of one call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CallKey<'a> {
    crate_name: &'a str,
    function: &'a str,
    file: Option<&'a str>,
    line: Option<u32>,
}

impl<'a> CallKey<'a> {
    fn of(frame: &'a Frame) -> Self {
        Self {
            crate_name: &frame.crate_name,
            function: &frame.function,
            file: frame.location.as_ref().map(|l| l.file.as_str()),
            line: frame.location.as_ref().map(|l| l.line),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SignatureKey<'a> {
    state: &'a str,
    calls: Vec<CallKey<'a>>,
    elided: bool,
}

impl<'a> SignatureKey<'a> {
    fn of(record: &'a ThreadRecord) -> Self {
        Self {
            state: &record.state,
            calls: record.stack.calls.iter().map(CallKey::of).collect(),
            elided: record.stack.elided,
        }
    }
}

/// Group `threads` into buckets.
///
/// Threads land in the same bucket when their state, their frames (crate,
/// function, file and line) and their truncation flag all match. Frame
/// arguments are ignored. The bucket holding the first thread comes first;
/// the others follow in the order their first member appeared.
pub fn aggregate(threads: &[ThreadRecord]) -> Vec<Bucket> {
    let mut index: HashMap<SignatureKey<'_>, usize> = HashMap::new();
    let mut buckets: Vec<Bucket> = Vec::new();

    for record in threads {
        let key = SignatureKey::of(record);
        match index.get(&key) {
            Some(&slot) => merge(&mut buckets[slot], record),
            None => {
                index.insert(key, buckets.len());
                buckets.push(Bucket {
                    signature: Signature {
                        state: record.state.clone(),
                        stack: record.stack.clone(),
                        created_by: record.created_by.clone(),
                        locked: record.locked,
                        sleep_min: record.sleep_minutes,
                        sleep_max: record.sleep_minutes,
                    },
                    ids: vec![record.id],
                    first: record.first,
                });
            }
        }
    }

    if let Some(pos) = buckets.iter().position(|b| b.first) {
        if pos > 0 {
            let first = buckets.remove(pos);
            buckets.insert(0, first);
        }
    }

    tracing::trace!(
        target: "scrivener::stack",
        "aggregated {} thread(s) into {} bucket(s)",
        threads.len(),
        buckets.len()
    );
    buckets
}

fn merge(bucket: &mut Bucket, record: &ThreadRecord) {
    bucket.ids.push(record.id);
    bucket.first |= record.first;
    bucket.signature.locked |= record.locked;
    if let Some(minutes) = record.sleep_minutes {
        let sig = &mut bucket.signature;
        sig.sleep_min = Some(sig.sleep_min.map_or(minutes, |m| m.min(minutes)));
        sig.sleep_max = Some(sig.sleep_max.map_or(minutes, |m| m.max(minutes)));
    }
}
