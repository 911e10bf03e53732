//! Four-group byte deinterleave transform (§4.D, tag 2).
//!
//! This is the "four-group-concatenation" variant, not the older
//! strided-within-block interleave — the two are not wire-compatible, and
//! only this one may be emitted.

/// Split `data` into four groups by striding over aligned 4-byte positions,
/// then distributing the remainder one byte per lower-indexed group.
pub fn apply_byte_grouping(data: &[u8]) -> Vec<u8> {
    let n = data.len();
    let split = n / 4;
    let rem = n % 4;

    let sizes = [
        split + usize::from(rem > 0),
        split + usize::from(rem > 1),
        split + usize::from(rem > 2),
        split,
    ];

    let mut groups: [Vec<u8>; 4] = [
        Vec::with_capacity(sizes[0]),
        Vec::with_capacity(sizes[1]),
        Vec::with_capacity(sizes[2]),
        Vec::with_capacity(sizes[3]),
    ];

    for i in 0..split {
        for (g, group) in groups.iter_mut().enumerate() {
            group.push(data[4 * i + g]);
        }
    }
    for r in 0..rem {
        groups[r].push(data[4 * split + r]);
    }

    let mut out = Vec::with_capacity(n);
    for group in &groups {
        out.extend_from_slice(group);
    }
    out
}

/// Invert [`apply_byte_grouping`].
pub fn reverse_byte_grouping(data: &[u8]) -> Vec<u8> {
    let n = data.len();
    let split = n / 4;
    let rem = n % 4;

    let sizes = [
        split + usize::from(rem > 0),
        split + usize::from(rem > 1),
        split + usize::from(rem > 2),
        split,
    ];

    let mut offsets = [0usize; 4];
    let mut acc = 0usize;
    for (i, size) in sizes.iter().enumerate() {
        offsets[i] = acc;
        acc += size;
    }

    let mut out = vec![0u8; n];
    for i in 0..split {
        for (g, offset) in offsets.iter().enumerate() {
            out[4 * i + g] = data[offset + i];
        }
    }
    for r in 0..rem {
        out[4 * split + r] = data[offsets[r] + split];
    }
    out
}
