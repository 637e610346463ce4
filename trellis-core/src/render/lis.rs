//! Longest increasing subsequence.
//!
//! The diff engine runs this over the old positions of reused children, in
//! new order. Children on the subsequence are already in relative order and
//! stay put; every other reused child gets exactly one move.

/// Positions in `seq` of one longest strictly increasing subsequence, in
/// ascending order. O(n log n).
pub(crate) fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    // tails[k] is the position of the smallest tail of any increasing run
    // of length k + 1 seen so far.
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; seq.len()];

    for (position, &value) in seq.iter().enumerate() {
        let length = tails.partition_point(|&tail| seq[tail] < value);
        if length > 0 {
            previous[position] = Some(tails[length - 1]);
        }
        if length == tails.len() {
            tails.push(position);
        } else {
            tails[length] = position;
        }
    }

    let mut run = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(position) = cursor {
        run.push(position);
        cursor = previous[position];
    }
    run.reverse();
    run
}
