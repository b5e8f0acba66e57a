//! Reconciliation of two endpoint snapshots
//!
//! Both inputs must be sorted by node id (see [`sort_endpoints`]). The merge
//! is linear: matched ids drive updates, ids only in `curr` drive removals and
//! ids only in `next` drive insertions.

use std::cmp::Ordering;

use crate::endpoint::Endpoint;

#[must_use]
pub fn compare_endpoints(a: &Endpoint, b: &Endpoint) -> Ordering {
    a.id.cmp(&b.id)
}

pub fn sort_endpoints(endpoints: &mut [Endpoint]) {
    endpoints.sort_by(compare_endpoints);
}

/// Diff two id-sorted snapshots
///
/// Every callback receives the merge position `(i, j)`: `i` indexes `curr`
/// and `j` indexes `next`. For `del` only `i` is meaningful, for `add` only
/// `j`.
pub fn diff_endpoints<OnEq, OnAdd, OnDel>(
    curr: &[Endpoint],
    next: &[Endpoint],
    eq: OnEq,
    add: OnAdd,
    del: OnDel,
) where
    OnEq: FnMut(usize, usize),
    OnAdd: FnMut(usize, usize),
    OnDel: FnMut(usize, usize),
{
    diff_slice(
        curr.len(),
        next.len(),
        |i, j| compare_endpoints(&curr[i], &next[j]),
        eq,
        add,
        del,
    );
}

/// Two-pointer merge over index spaces `0..a` and `0..b`
pub fn diff_slice<Cmp, OnEq, OnAdd, OnDel>(
    a: usize,
    b: usize,
    mut cmp: Cmp,
    mut eq: OnEq,
    mut add: OnAdd,
    mut del: OnDel,
) where
    Cmp: FnMut(usize, usize) -> Ordering,
    OnEq: FnMut(usize, usize),
    OnAdd: FnMut(usize, usize),
    OnDel: FnMut(usize, usize),
{
    let (mut i, mut j) = (0, 0);
    while i < a && j < b {
        match cmp(i, j) {
            Ordering::Less => {
                del(i, j);
                i += 1;
            }
            Ordering::Greater => {
                add(i, j);
                j += 1;
            }
            Ordering::Equal => {
                eq(i, j);
                i += 1;
                j += 1;
            }
        }
    }
    for i in i..a {
        del(i, j);
    }
    for j in j..b {
        add(i, j);
    }
}
