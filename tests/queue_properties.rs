//! Property tests for the rating queue

use debate_room::matchmaking::{QueueConfig, RatingQueue};
use debate_room::utils::rating_difference;
use proptest::prelude::*;
use std::time::Duration;
use tokio::time::Instant;

fn ratings() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..3000, 0..24)
}

proptest! {
    #[test]
    fn allowed_range_is_monotonic_and_capped(a in 0u64..10_000, b in 0u64..10_000) {
        let config = QueueConfig::default();
        let (short, long) = (a.min(b), a.max(b));
        let short_range = config.allowed_range(Duration::from_secs(short));
        let long_range = config.allowed_range(Duration::from_secs(long));

        prop_assert!(short_range <= long_range);
        prop_assert!(long_range <= config.max_range);
        prop_assert!(short_range >= config.base_range);
    }

    #[test]
    fn best_pair_is_eligible_and_closest(ratings in ratings(), waited in 0u64..400) {
        let config = QueueConfig::default();
        let mut queue = RatingQueue::new(config.clone());
        let start = Instant::now();
        for (index, rating) in ratings.iter().enumerate() {
            queue.enqueue(format!("p{}", index), *rating, start);
        }
        let now = start + Duration::from_secs(waited);
        let range = config.allowed_range(Duration::from_secs(waited));

        let closest = ratings
            .iter()
            .enumerate()
            .flat_map(|(i, a)| ratings[i + 1..].iter().map(move |b| rating_difference(*a, *b)))
            .filter(|difference| *difference <= range)
            .min();

        match queue.find_best_pair(now) {
            Some(pair) => {
                prop_assert_eq!(Some(pair.rating_difference()), closest);
                prop_assert_eq!(queue.len(), ratings.len() - 2);
                prop_assert!(!queue.contains(&pair.first.id));
                prop_assert!(!queue.contains(&pair.second.id));
            }
            None => {
                prop_assert_eq!(closest, None);
                prop_assert_eq!(queue.len(), ratings.len());
            }
        }
    }

    #[test]
    fn repeated_enqueue_keeps_one_entry(rating in 0i64..3000, repeats in 1usize..5) {
        let mut queue = RatingQueue::new(QueueConfig::default());
        let start = Instant::now();
        for n in 0..repeats {
            queue.enqueue("p1".to_string(), rating, start + Duration::from_secs(n as u64));
        }

        prop_assert_eq!(queue.len(), 1);
        prop_assert_eq!(queue.get("p1").map(|p| p.enqueued_at), Some(start));
    }
}
