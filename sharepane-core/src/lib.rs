use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

mod command;
mod record;
mod view;

pub use command::{OutboundCommand, UserIntent, encode_send, encode_user_action};
pub use record::{
    MergeStrategy, TransferRecord, merge_metadata_fields, merge_records, merge_with,
    normalize_channel_message,
};
pub use view::{
    DEFAULT_VISIBLE_STATES, DisplayRow, TextType, VisibilityFilter, progress_ratio,
    progress_style, reconcile,
};

pub const UNKNOWN_LABEL: &str = "Unknown";

pub type EndpointId = String;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    #[default]
    Unknown,
    Phone,
    Tablet,
    Laptop,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Unknown => UNKNOWN_LABEL,
            DeviceType::Phone => "Phone",
            DeviceType::Tablet => "Tablet",
            DeviceType::Laptop => "Laptop",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferState {
    #[default]
    Initial,
    ReceivedConnectionRequest,
    SentUkeyServerInit,
    SentUkeyClientInit,
    SentUkeyClientFinish,
    SentPairedKeyEncryption,
    ReceivedUkeyClientFinish,
    SentConnectionResponse,
    SentPairedKeyResult,
    SentIntroduction,
    ReceivedPairedKeyResult,
    WaitingForUserConsent,
    ReceivingFiles,
    SendingFiles,
    Disconnected,
    Rejected,
    Cancelled,
    Finished,
}

/// A remote device as reported by discovery. Only `id` is guaranteed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointInfo {
    pub id: EndpointId,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default, rename = "rtype")]
    pub device_type: Option<DeviceType>,
    /// `Some(false)` announces that the endpoint is no longer visible.
    #[serde(default)]
    pub present: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteDeviceInfo {
    pub name: String,
    #[serde(default)]
    pub device_type: DeviceType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WifiSecurity {
    #[default]
    Unknown,
    Open,
    WpaPsk,
    Wep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferPayload {
    Files(Vec<String>),
    Text(String),
    Url(String),
    Wifi {
        ssid: String,
        #[serde(default)]
        password: String,
        #[serde(default)]
        security_type: WifiSecurity,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub source: Option<RemoteDeviceInfo>,
    #[serde(default)]
    pub pin_code: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub payload: Option<TransferPayload>,
    #[serde(default)]
    pub total_bytes: Option<u64>,
    #[serde(default)]
    pub ack_bytes: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferAction {
    ConsentAccept,
    ConsentDecline,
    TransferCancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageClient {
    pub kind: TransferKind,
    #[serde(default)]
    pub state: Option<TransferState>,
    #[serde(default)]
    pub metadata: Option<TransferMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Message {
    Lib { action: TransferAction },
    Client(MessageClient),
}

impl Message {
    pub fn as_client(&self) -> Option<&MessageClient> {
        match self {
            Message::Client(client) => Some(client),
            Message::Lib { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelMessage {
    pub id: EndpointId,
    pub msg: Message,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutboundPayload {
    Files(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendInfo {
    pub id: EndpointId,
    pub name: String,
    pub addr: String,
    pub ob: OutboundPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum BackendEvent {
    Endpoint(EndpointInfo),
    Transfer(ChannelMessage),
}

impl BackendEvent {
    pub fn id(&self) -> &str {
        match self {
            BackendEvent::Endpoint(info) => &info.id,
            BackendEvent::Transfer(message) => &message.id,
        }
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("event identity must not be empty")]
    MissingIdentity,
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("command {0} requires a message argument")]
    MissingArgument(&'static str),
    #[error("unknown user action {0:?}")]
    UnknownIntent(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct InvokeEnvelope {
    cmd: String,
    #[serde(default)]
    args: Option<Value>,
}

pub fn decode_event(text: &str) -> Result<BackendEvent, CoreError> {
    let event: BackendEvent =
        serde_json::from_str(text).map_err(|err| CoreError::Serialization(err.to_string()))?;
    if event.id().trim().is_empty() {
        return Err(CoreError::MissingIdentity);
    }
    Ok(event)
}

pub fn encode_event(event: &BackendEvent) -> Result<String, CoreError> {
    serde_json::to_string(event).map_err(|err| CoreError::Serialization(err.to_string()))
}

/// Encodes a command as `{"cmd": <name>, "args": <args or null>}`.
pub fn encode_command(command: &OutboundCommand) -> Result<String, CoreError> {
    let envelope = InvokeEnvelope {
        cmd: command.name().to_owned(),
        args: command.args()?,
    };
    serde_json::to_string(&envelope).map_err(|err| CoreError::Serialization(err.to_string()))
}

pub fn decode_command(text: &str) -> Result<OutboundCommand, CoreError> {
    let envelope: InvokeEnvelope =
        serde_json::from_str(text).map_err(|err| CoreError::Serialization(err.to_string()))?;
    OutboundCommand::from_parts(&envelope.cmd, envelope.args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_client_transfer_event() {
        let text = r#"{
            "type": "Transfer",
            "data": {
                "id": "abc",
                "msg": {"Client": {
                    "kind": "Inbound",
                    "state": "ReceivingFiles",
                    "metadata": {"id": "abc", "ack_bytes": 10, "total_bytes": 40,
                                 "payload": {"Files": ["/tmp/a.txt"]}}
                }}
            }
        }"#;

        let event = decode_event(text).unwrap();
        let BackendEvent::Transfer(message) = event else {
            panic!("expected transfer event");
        };
        let client = message.msg.as_client().unwrap();
        assert_eq!(client.state, Some(TransferState::ReceivingFiles));
        let meta = client.metadata.as_ref().unwrap();
        assert_eq!(meta.ack_bytes, Some(10));
        assert_eq!(
            meta.payload,
            Some(TransferPayload::Files(vec!["/tmp/a.txt".to_owned()]))
        );
    }

    #[test]
    fn decode_endpoint_with_missing_optionals() {
        let event = decode_event(r#"{"type":"Endpoint","data":{"id":"e1","rtype":"Phone"}}"#)
            .unwrap();
        match event {
            BackendEvent::Endpoint(info) => {
                assert_eq!(info.id, "e1");
                assert_eq!(info.device_type, Some(DeviceType::Phone));
                assert!(info.name.is_none());
                assert!(info.present.is_none());
            }
            BackendEvent::Transfer(_) => panic!("expected endpoint event"),
        }
    }

    #[test]
    fn decode_rejects_empty_identity() {
        let err = decode_event(r#"{"type":"Endpoint","data":{"id":"  "}}"#).unwrap_err();
        assert!(matches!(err, CoreError::MissingIdentity));
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let err = decode_event("{not json").unwrap_err();
        assert!(matches!(err, CoreError::Serialization(_)));
    }

    #[test]
    fn command_envelope_carries_name_and_args() {
        let command = encode_user_action("t-1", UserIntent::Reject);
        let text = encode_command(&command).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["cmd"], "send_to_rs");
        assert_eq!(value["args"]["message"]["id"], "t-1");
        assert_eq!(
            value["args"]["message"]["msg"]["Lib"]["action"],
            "ConsentDecline"
        );

        let stop = encode_command(&OutboundCommand::StopDiscovery).unwrap();
        let value: Value = serde_json::from_str(&stop).unwrap();
        assert_eq!(value["cmd"], "stop_discovery");
        assert!(value["args"].is_null());
    }

    #[test]
    fn decode_command_rejects_unknown_name() {
        let err = decode_command(r#"{"cmd":"format_disk","args":null}"#).unwrap_err();
        assert!(matches!(err, CoreError::UnknownCommand(name) if name == "format_disk"));
    }

    #[test]
    fn discovered_phone_then_consent_request_keeps_position() {
        let endpoints = vec![EndpointInfo {
            id: "A".to_owned(),
            name: Some("Phone".to_owned()),
            ..EndpointInfo::default()
        }];
        let mut requests: Vec<TransferRecord> = Vec::new();
        let visible = VisibilityFilter::default();

        let rows = reconcile(&endpoints, &requests, &visible);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Phone");
        assert_eq!(rows[0].device_type, DeviceType::Unknown);
        assert!(rows[0].endpoint);

        let message = ChannelMessage {
            id: "A".to_owned(),
            msg: Message::Client(MessageClient {
                kind: TransferKind::Inbound,
                state: Some(TransferState::WaitingForUserConsent),
                metadata: Some(TransferMetadata {
                    id: "A".to_owned(),
                    source: Some(RemoteDeviceInfo {
                        name: "Phone".to_owned(),
                        device_type: DeviceType::Phone,
                    }),
                    pin_code: Some("1234".to_owned()),
                    ..TransferMetadata::default()
                }),
            }),
        };
        let next = normalize_channel_message(&message);
        match requests.iter_mut().find(|r| r.id == next.id) {
            Some(prev) => *prev = merge_records(prev, &next),
            None => requests.push(next),
        }

        let rows = reconcile(&endpoints, &requests, &visible);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.id, "A");
        assert!(!row.endpoint);
        assert_eq!(row.state, Some(TransferState::WaitingForUserConsent));
        assert_eq!(row.pin_code.as_deref(), Some("1234"));
        assert_eq!(row.name, "Phone");
        assert_eq!(row.device_type, DeviceType::Phone);
    }
}
