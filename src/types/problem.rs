//! Pool domain types: records, allocation keys, difficulty levels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{PoolError, Result};

/// Difficulty level of a generated problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(format!(
                "Unknown difficulty: {}. Valid values: Easy, Medium, Hard",
                s
            )),
        }
    }
}

/// Identifies one sub-pool: all records sharing a topic and difficulty
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllocationKey {
    topic: String,
    difficulty: Difficulty,
}

impl AllocationKey {
    /// Build a key; the topic is trimmed and must not be empty.
    pub fn new(topic: impl Into<String>, difficulty: Difficulty) -> Result<Self> {
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(PoolError::InvalidKey("topic must not be empty".to_string()));
        }
        Ok(Self { topic, difficulty })
    }

    /// Build a key from raw caller strings
    pub fn parse(topic: &str, difficulty: &str) -> Result<Self> {
        let difficulty = difficulty.parse::<Difficulty>().map_err(PoolError::InvalidKey)?;
        Self::new(topic, difficulty)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }
}

impl std::fmt::Display for AllocationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.topic, self.difficulty)
    }
}

/// Parses `topic:difficulty`, the form used on the command line and in config
impl std::str::FromStr for AllocationKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (topic, difficulty) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("Invalid key '{}'. Expected topic:difficulty", s))?;
        AllocationKey::parse(topic, difficulty).map_err(|e| e.to_string())
    }
}

/// One generated problem held in the pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub id: String,
    pub topic: String,
    pub difficulty: Difficulty,
    /// Provider-defined document; only its existence matters here
    pub payload: Value,
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl ProblemRecord {
    pub fn key(&self) -> Result<AllocationKey> {
        AllocationKey::new(self.topic.clone(), self.difficulty)
    }

    /// Problem title, when the provider supplied one
    pub fn title(&self) -> Option<&str> {
        self.payload.get("title").and_then(Value::as_str)
    }
}

/// Ephemeral description of one refill request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub key: AllocationKey,
    pub batch_size: usize,
    pub want_structured: bool,
}

impl GenerationRequest {
    pub fn refill(key: AllocationKey, batch_size: usize) -> Self {
        Self {
            key,
            batch_size,
            want_structured: true,
        }
    }
}

/// Per-key counts reported by the store for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub topic: String,
    pub difficulty: String,
    pub unused: u64,
    pub consumed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_parse() {
        assert_eq!("easy".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert_eq!("Medium".parse::<Difficulty>().unwrap(), Difficulty::Medium);
        assert_eq!(" HARD ".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_key_rejects_empty_topic() {
        assert!(AllocationKey::new("   ", Difficulty::Easy).is_err());
        let key = AllocationKey::new(" Arrays ", Difficulty::Medium).unwrap();
        assert_eq!(key.topic(), "Arrays");
        assert_eq!(key.to_string(), "Arrays/Medium");
    }

    #[test]
    fn test_key_from_str() {
        let key: AllocationKey = "Dynamic Programming:hard".parse().unwrap();
        assert_eq!(key.topic(), "Dynamic Programming");
        assert_eq!(key.difficulty(), Difficulty::Hard);

        assert!("Arrays".parse::<AllocationKey>().is_err());
        assert!(":Easy".parse::<AllocationKey>().is_err());
    }

    #[test]
    fn test_refill_request_is_structured() {
        let key = AllocationKey::new("Graphs", Difficulty::Easy).unwrap();
        let request = GenerationRequest::refill(key, 5);
        assert!(request.want_structured);
        assert_eq!(request.batch_size, 5);
    }
}
