use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;
use uuid::Uuid;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerValue {
    pub session: Uuid,
    pub seq: u64,
}

pub fn session_id() -> Uuid {
    static SESSION: OnceLock<Uuid> = OnceLock::new();
    *SESSION.get_or_init(Uuid::new_v4)
}

impl MarkerValue {
    pub fn next() -> Self {
        let marker = Self {
            session: session_id(),
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
        };
        trace!(marker = %marker, "issued history marker");
        marker
    }

    pub fn keeps_open(&self, top: Option<&MarkerValue>) -> bool {
        match top {
            Some(current) => current.session == self.session && current.seq >= self.seq,
            None => false,
        }
    }

    pub fn encode_state(&self, state_key: &str) -> Value {
        let mut state = Map::new();
        state.insert(
            state_key.to_string(),
            serde_json::to_value(self).unwrap_or(Value::Null),
        );
        Value::Object(state)
    }

    pub fn decode_state(state_key: &str, state: &Value) -> Option<Self> {
        let embedded = state.get(state_key)?;
        serde_json::from_value(embedded.clone()).ok()
    }
}

impl fmt::Display for MarkerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.session, self.seq)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use uuid::Uuid;

    use super::MarkerValue;

    #[test]
    fn markers_are_monotonic_within_the_session() {
        let first = MarkerValue::next();
        let second = MarkerValue::next();

        assert_eq!(first.session, second.session);
        assert!(second.seq > first.seq);
    }

    #[test]
    fn state_roundtrip_under_namespaced_key() {
        let marker = MarkerValue::next();
        let state = marker.encode_state("setu.layer");

        assert_eq!(
            MarkerValue::decode_state("setu.layer", &state),
            Some(marker.clone())
        );
        assert_eq!(MarkerValue::decode_state("other.key", &state), None);
        assert_eq!(MarkerValue::decode_state("setu.layer", &Value::Null), None);
    }

    #[test]
    fn keeps_open_tracks_same_session_ordering() {
        let below = MarkerValue::next();
        let above = MarkerValue::next();

        assert!(below.keeps_open(Some(&below)));
        assert!(below.keeps_open(Some(&above)));
        assert!(!above.keeps_open(Some(&below)));
        assert!(!below.keeps_open(None));
    }

    #[test]
    fn foreign_session_reads_as_backed_past() {
        let mine = MarkerValue::next();
        let foreign = MarkerValue {
            session: Uuid::new_v4(),
            seq: mine.seq + 10,
        };

        assert!(!mine.keeps_open(Some(&foreign)));
    }

    #[test]
    fn malformed_state_decodes_to_none() {
        let state = json!({ "setu.layer": { "seq": "not-a-number" } });

        assert_eq!(MarkerValue::decode_state("setu.layer", &state), None);
    }
}
