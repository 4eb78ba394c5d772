// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::BcpError;
use std::ops::Range;

/// Segment id of `time_index` under an ordered break tuple.
///
/// A break is the first index of the segment that follows it, so the result is
/// the number of breaks `<= time_index`. Total over any ordered tuple.
pub fn segment_of(time_index: usize, breaks: &[usize]) -> usize {
    breaks.partition_point(|&b| b <= time_index)
}

/// Contiguous index ranges of the `breaks.len() + 1` segments of an `n`-length series.
pub fn segment_ranges(n: usize, breaks: &[usize]) -> Vec<Range<usize>> {
    let mut ranges = Vec::with_capacity(breaks.len() + 1);
    let mut start = 0usize;
    for &b in breaks {
        ranges.push(start..b);
        start = b;
    }
    ranges.push(start..n);
    ranges
}

/// Smallest and largest admissible break location for an `n`-length series.
///
/// Breaks live in `[max(1, min_segment_len), n - max(2, min_segment_len)]`, so
/// the final segment keeps at least two observations.
pub fn break_bounds(n: usize, min_segment_len: usize) -> Option<(usize, usize)> {
    let lower = min_segment_len.max(1);
    let upper = n.checked_sub(min_segment_len.max(2))?;
    (lower <= upper).then_some((lower, upper))
}

/// Minimum series length that can host `n_breaks` ordered breaks.
pub fn min_series_len(n_breaks: usize, min_segment_len: usize) -> usize {
    let m = min_segment_len.max(1);
    n_breaks
        .saturating_mul(m)
        .saturating_add(min_segment_len.max(2))
}

/// Checks the ordering and bounds invariant of a break tuple.
pub fn validate_breaks(n: usize, breaks: &[usize], min_segment_len: usize) -> Result<(), BcpError> {
    let Some((lower, upper)) = break_bounds(n, min_segment_len) else {
        return Err(BcpError::invalid_input(format!(
            "series of length {n} cannot host a break with min_segment_len={min_segment_len}"
        )));
    };
    let m = min_segment_len.max(1);

    for (k, &b) in breaks.iter().enumerate() {
        if b < lower || b > upper {
            return Err(BcpError::invalid_input(format!(
                "break[{k}]={b} outside admissible range [{lower}, {upper}] (n={n})"
            )));
        }
        if k > 0 {
            let prev = breaks[k - 1];
            if b <= prev {
                return Err(BcpError::invalid_input(format!(
                    "breaks must be strictly increasing: break[{}]={prev}, break[{k}]={b}",
                    k - 1
                )));
            }
            if b - prev < m {
                return Err(BcpError::invalid_input(format!(
                    "segment between break[{}]={prev} and break[{k}]={b} is shorter than min_segment_len={m}",
                    k - 1
                )));
            }
        }
    }
    Ok(())
}
