//! Debate topic supply

use async_trait::async_trait;
use rand::seq::IndexedRandom;

/// Topic used when no other topic is available
pub const FALLBACK_TOPIC: &str = "The importance of education in society";

/// Built-in topic list
pub const DEFAULT_TOPICS: [&str; 10] = [
    "Social media has a positive impact on society",
    "Remote work is better than office work",
    "Artificial intelligence will benefit humanity more than it will harm it",
    "Video games have a positive impact on children",
    "Climate change is the most pressing issue of our time",
    "Free speech should have no limitations",
    "Technology makes us more isolated",
    "Education should be free for everyone",
    "Space exploration is worth the investment",
    "Universal Basic Income should be implemented globally",
];

/// Supplies a topic for each new session; never fails
#[async_trait]
pub trait TopicSupplier: Send + Sync {
    async fn get_topic(&self) -> String;
}

/// Random pick from a fixed list
#[derive(Debug, Clone)]
pub struct StaticTopicSupplier {
    topics: Vec<String>,
}

impl Default for StaticTopicSupplier {
    fn default() -> Self {
        Self::new(DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect())
    }
}

impl StaticTopicSupplier {
    pub fn new(topics: Vec<String>) -> Self {
        Self { topics }
    }

    /// Supplier that always returns the same topic
    pub fn single(topic: &str) -> Self {
        Self::new(vec![topic.to_string()])
    }
}

#[async_trait]
impl TopicSupplier for StaticTopicSupplier {
    async fn get_topic(&self) -> String {
        self.topics
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| FALLBACK_TOPIC.to_string())
    }
}
