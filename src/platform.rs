//! Seed constants for the additive sequence.
//!
//! Plain configuration with no part in the runtime. Every target uses the
//! values of the native provider.

/// First seed of the additive sequence.
pub const FIRST_ELEMENT: u64 = 5;
/// Second seed of the additive sequence.
pub const SECOND_ELEMENT: u64 = 7;

/// The Fibonacci-style sequence seeded with [`FIRST_ELEMENT`] and [`SECOND_ELEMENT`].
///
/// Each element after the first two is the sum of the previous two. The
/// iterator ends instead of overflowing.
///
/// ```
/// use rivulet::platform::{FIRST_ELEMENT, SECOND_ELEMENT, sequence};
///
/// let first: Vec<u64> = sequence().take(3).collect();
/// assert_eq!(first, vec![FIRST_ELEMENT, SECOND_ELEMENT, FIRST_ELEMENT + SECOND_ELEMENT]);
/// ```
pub fn sequence() -> impl Iterator<Item = u64> {
    seeded(FIRST_ELEMENT, SECOND_ELEMENT)
}

fn seeded(first: u64, second: u64) -> impl Iterator<Item = u64> {
    std::iter::successors(Some((first, second)), |&(a, b)| {
        a.checked_add(b).map(|c| (b, c))
    })
    .map(|(a, _)| a)
}
