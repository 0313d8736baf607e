use std::collections::VecDeque;

use rand::Rng;
use rand::seq::SliceRandom;

use spaced_core::model::{OrderMode, RepeatMode};

/// Queue of indices into a session's fixed card list.
pub(crate) type CardQueue = VecDeque<usize>;

fn ordered(mut indices: Vec<usize>, order: OrderMode, rng: &mut impl Rng) -> CardQueue {
    if order == OrderMode::Random {
        // Uniform Fisher–Yates.
        indices.shuffle(rng);
    }
    indices.into()
}

/// Every card once, in stored order or shuffled.
pub(crate) fn first_round(card_count: usize, order: OrderMode, rng: &mut impl Rng) -> CardQueue {
    ordered((0..card_count).collect(), order, rng)
}

/// Queue for the round after one that ended with unrecovered misses.
///
/// `missed` is in first-miss order; strict repeat replays only those cards,
/// repeat-all replays the whole set.
pub(crate) fn next_round(
    card_count: usize,
    missed: &[usize],
    repeat: RepeatMode,
    order: OrderMode,
    rng: &mut impl Rng,
) -> CardQueue {
    match repeat {
        RepeatMode::StrictRepeat => ordered(missed.to_vec(), order, rng),
        RepeatMode::AllRepeat => first_round(card_count, order, rng),
    }
}

/// Put a missed card back with exactly one other card ahead of it, or at the
/// front when nothing else is left.
pub(crate) fn requeue_after_next(queue: &mut CardQueue, index: usize) {
    let at = queue.len().min(1);
    queue.insert(at, index);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn sequential_round_keeps_stored_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let queue = first_round(4, OrderMode::Sequential, &mut rng);
        assert_eq!(queue, [0, 1, 2, 3]);
    }

    #[test]
    fn random_round_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let queue = first_round(20, OrderMode::Random, &mut rng);
        let mut sorted: Vec<_> = queue.into_iter().collect();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn strict_repeat_replays_only_misses() {
        let mut rng = StdRng::seed_from_u64(1);
        let queue = next_round(5, &[3, 1], RepeatMode::StrictRepeat, OrderMode::Sequential, &mut rng);
        assert_eq!(queue, [3, 1]);
        let queue = next_round(3, &[2], RepeatMode::AllRepeat, OrderMode::Sequential, &mut rng);
        assert_eq!(queue, [0, 1, 2]);
    }

    #[test]
    fn requeue_leaves_one_card_between() {
        let mut queue: CardQueue = [4, 5, 6].into();
        requeue_after_next(&mut queue, 9);
        assert_eq!(queue, [4, 9, 5, 6]);

        let mut queue = CardQueue::new();
        requeue_after_next(&mut queue, 9);
        assert_eq!(queue, [9]);
    }
}
