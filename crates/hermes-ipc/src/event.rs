use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{Binary, IpcError, IpcResult};

/// Typed view of one JSON line emitted by `zend` or `zenc`.
///
/// The discriminant travels in the `event` field. Discriminants this side does
/// not know about decode to [`IpcEvent::Unknown`] and are ignored by consumers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IpcEvent {
    IdentityCreated {
        public_key: String,
        fingerprint: String,
    },
    IdentityLoaded {
        public_key: String,
        fingerprint: String,
    },
    PeerAdded {
        name: String,
        #[serde(default)]
        fingerprint: String,
    },
    PeerRemoved {
        name: String,
    },
    PeerTrustUpdated {
        name: String,
        #[serde(default)]
        trust: String,
    },
    PeerList {
        #[serde(default)]
        peers: Vec<PeerRecord>,
    },
    Connecting {
        #[serde(default)]
        peer: String,
        #[serde(default)]
        address: String,
    },
    Listening {
        #[serde(default, deserialize_with = "lenient_u64")]
        port: u64,
    },
    HandshakeComplete {
        #[serde(default)]
        peer: String,
    },
    TransferStart {
        #[serde(default)]
        file: String,
        #[serde(default, deserialize_with = "lenient_u64")]
        size: u64,
        #[serde(default)]
        peer: String,
    },
    Progress {
        #[serde(default, deserialize_with = "lenient_u64")]
        bytes: u64,
        #[serde(default)]
        percent: f64,
    },
    TransferComplete {
        #[serde(default)]
        file: String,
        #[serde(default)]
        hash: String,
    },
    IncomingRequest {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        peer: String,
        #[serde(default)]
        fingerprint: Option<String>,
        #[serde(default)]
        file: String,
        #[serde(default, deserialize_with = "lenient_u64")]
        size: u64,
    },
    Start {
        #[serde(default)]
        file: String,
        #[serde(default, deserialize_with = "lenient_u64")]
        size: u64,
    },
    Keygen {
        public_key: String,
        secret_key: String,
    },
    Done {
        #[serde(default)]
        output: String,
        #[serde(default)]
        hash: String,
    },
    Error {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeerRecord {
    pub name: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub trust: String,
}

impl IpcEvent {
    /// Decodes one already-parsed JSON value. Values without a string `event`
    /// field are treated as unknown rather than malformed.
    pub fn from_value(binary: Binary, value: &Value) -> IpcResult<Self> {
        if event_kind(value).is_none() {
            return Ok(Self::Unknown);
        }
        Self::deserialize(value).map_err(|error| IpcError::json(binary, value.to_string(), error))
    }

    pub fn from_line(binary: Binary, line: &str) -> IpcResult<Self> {
        let value = serde_json::from_str::<Value>(line)
            .map_err(|error| IpcError::json(binary, line, error))?;
        Self::from_value(binary, &value)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::IdentityCreated { .. } => "identity_created",
            Self::IdentityLoaded { .. } => "identity_loaded",
            Self::PeerAdded { .. } => "peer_added",
            Self::PeerRemoved { .. } => "peer_removed",
            Self::PeerTrustUpdated { .. } => "peer_trust_updated",
            Self::PeerList { .. } => "peer_list",
            Self::Connecting { .. } => "connecting",
            Self::Listening { .. } => "listening",
            Self::HandshakeComplete { .. } => "handshake_complete",
            Self::TransferStart { .. } => "transfer_start",
            Self::Progress { .. } => "progress",
            Self::TransferComplete { .. } => "transfer_complete",
            Self::IncomingRequest { .. } => "incoming_request",
            Self::Start { .. } => "start",
            Self::Keygen { .. } => "keygen",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl PeerRecord {
    pub fn is_blocked(&self) -> bool {
        self.trust == "blocked"
    }
}

/// The `event` discriminant of a raw JSON value.
pub fn event_kind(value: &Value) -> Option<&str> {
    value.get("event").and_then(Value::as_str)
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => number.as_u64().unwrap_or_else(|| {
            number
                .as_f64()
                .filter(|raw| raw.is_finite() && *raw > 0.0)
                .map(|raw| raw.round() as u64)
                .unwrap_or(0)
        }),
        Value::String(raw) => raw.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_transfer_events_with_float_sizes() {
        let event = IpcEvent::from_value(
            Binary::Zend,
            &json!({"event": "transfer_start", "file": "a.txt", "size": 100.0, "peer": "p1"}),
        )
        .expect("decode transfer_start");
        assert_eq!(
            event,
            IpcEvent::TransferStart {
                file: "a.txt".to_owned(),
                size: 100,
                peer: "p1".to_owned(),
            }
        );

        let progress = IpcEvent::from_line(Binary::Zend, r#"{"event":"progress","bytes":50,"percent":50}"#)
            .expect("decode progress");
        assert_eq!(
            progress,
            IpcEvent::Progress {
                bytes: 50,
                percent: 50.0,
            }
        );
    }

    #[test]
    fn unknown_discriminants_and_untagged_values_are_ignored() {
        let unknown = IpcEvent::from_value(Binary::Zend, &json!({"event": "nat_punch", "ttl": 3}))
            .expect("unknown discriminant decodes");
        assert_eq!(unknown, IpcEvent::Unknown);

        let untagged = IpcEvent::from_value(Binary::Zend, &json!({"status": "ok"}))
            .expect("untagged value decodes");
        assert_eq!(untagged, IpcEvent::Unknown);
    }

    #[test]
    fn known_discriminant_with_wrong_shape_is_a_parse_error() {
        let error = IpcEvent::from_value(Binary::Zenc, &json!({"event": "keygen", "public_key": 7}))
            .expect_err("keygen needs string keys");
        assert!(matches!(error, IpcError::JsonParse { binary: Binary::Zenc, .. }));
    }

    #[test]
    fn error_event_fields_are_optional() {
        let event = IpcEvent::from_value(Binary::Zend, &json!({"event": "error"}))
            .expect("bare error event");
        assert_eq!(
            event,
            IpcEvent::Error {
                code: None,
                message: None,
            }
        );
        assert_eq!(event.kind(), "error");
    }

    #[test]
    fn peer_list_records_default_missing_fields() {
        let event = IpcEvent::from_value(
            Binary::Zend,
            &json!({"event": "peer_list", "peers": [{"name": "bob", "trust": "blocked"}]}),
        )
        .expect("decode peer_list");
        let IpcEvent::PeerList { peers } = event else {
            panic!("expected peer_list");
        };
        assert_eq!(peers.len(), 1);
        assert!(peers[0].is_blocked());
        assert!(peers[0].address.is_empty());
    }
}
