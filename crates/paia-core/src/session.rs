use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// One outbound instruction paired with the assistant's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub input: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Exchange {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            timestamp: None,
        }
    }

    pub fn recorded_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// The persisted unit of conversational state.
///
/// `session_id` and `created` are fixed at construction. Exchanges can only
/// be appended; there is no way to edit or remove one once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    session_id: String,
    created: DateTime<Utc>,
    exchanges: Vec<Exchange>,
}

impl Session {
    /// Fresh empty session whose id is derived from its creation time.
    pub fn new(created: DateTime<Utc>) -> Self {
        Self {
            session_id: created.timestamp_millis().to_string(),
            created,
            exchanges: Vec::new(),
        }
    }

    pub fn started_now() -> Self {
        Self::new(Utc::now())
    }

    pub(crate) fn from_parts(
        session_id: String,
        created: DateTime<Utc>,
        exchanges: Vec<Exchange>,
    ) -> Self {
        Self {
            session_id,
            created,
            exchanges,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn append(&mut self, exchange: Exchange) {
        self.exchanges.push(exchange);
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn session_id_is_creation_time_in_millis() {
        let session = Session::new(created());
        assert_eq!(session.session_id(), "1741944413000");
        assert_eq!(session.created(), created());
        assert!(session.is_empty());
    }

    #[test]
    fn append_preserves_insertion_order() {
        let mut session = Session::new(created());
        session.append(Exchange::new("first", "one"));
        session.append(Exchange::new("second", "two"));

        let inputs: Vec<&str> = session
            .exchanges()
            .iter()
            .map(|exchange| exchange.input.as_str())
            .collect();
        assert_eq!(inputs, vec!["first", "second"]);
        assert_eq!(session.len(), 2);
    }
}
