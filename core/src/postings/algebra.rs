use std::cmp::Ordering;

use super::{PostingsEntry, PostingsList, Position};

/// Sorted union of two ascending position sequences; equal values are kept once.
pub fn merge_positions(a: &[Position], b: &[Position]) -> Vec<Position> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

fn merge_by_doc<F>(a: &PostingsList, b: &PostingsList, mut on_equal: F) -> PostingsList
where
    F: FnMut(&PostingsEntry, &PostingsEntry) -> PostingsEntry,
{
    let (a, b) = (a.entries(), b.entries());
    let mut out = Vec::with_capacity(a.len().max(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].doc_id.cmp(&b[j].doc_id) {
            Ordering::Equal => {
                out.push(on_equal(&a[i], &b[j]));
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                out.push(a[i].clone());
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j].clone());
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    PostingsList::from_entries(out)
}

/// Structural merge used by segment compaction: entries for the same
/// document get their positions unioned, everything else is copied through.
pub fn union(a: &PostingsList, b: &PostingsList) -> PostingsList {
    merge_by_doc(a, b, |x, y| {
        PostingsEntry::with_positions(x.doc_id, merge_positions(&x.positions, &y.positions))
    })
}

/// Merge of two scored lists; `combine` decides the score of a document
/// present on both sides.
pub fn union_scored<F>(a: &PostingsList, b: &PostingsList, combine: F) -> PostingsList
where
    F: Fn(f64, f64) -> f64,
{
    merge_by_doc(a, b, |x, y| PostingsEntry::scored(x.doc_id, combine(x.score, y.score)))
}

/// Entries of `a` whose document also appears in `b`.
pub fn intersect(a: &PostingsList, b: &PostingsList) -> PostingsList {
    let (xs, ys) = (a.entries(), b.entries());
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < xs.len() && j < ys.len() {
        match xs[i].doc_id.cmp(&ys[j].doc_id) {
            Ordering::Equal => {
                out.push(xs[i].clone());
                i += 1;
                j += 1;
            }
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
        }
    }
    PostingsList::from_entries(out)
}
