use crate::domain::models::DEFAULT_TRIGGER_PHRASES;

/// Case-insensitive keyword check on model replies.
///
/// Any occurrence fires, including negated or incidental mentions
/// ("I can't schedule that"). Scheduling intent is not parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDetector {
    phrases: Vec<String>,
}

impl Default for TriggerDetector {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_PHRASES.iter().copied())
    }
}

impl TriggerDetector {
    pub fn new<I, P>(phrases: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|phrase| phrase.as_ref().trim().to_lowercase())
                .filter(|phrase| !phrase.is_empty())
                .collect(),
        }
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    pub fn matches(&self, reply: &str) -> bool {
        let reply = reply.to_lowercase();
        self.phrases.iter().any(|phrase| reply.contains(phrase.as_str()))
    }
}
