use serde::{Deserialize, Serialize};

use crate::{ChannelMessage, EndpointId, Message, TransferMetadata, TransferState};

/// The minimal, stable-identity view of one transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: EndpointId,
    #[serde(default)]
    pub state: Option<TransferState>,
    #[serde(default)]
    pub metadata: Option<TransferMetadata>,
}

impl TransferRecord {
    pub fn new(id: impl Into<EndpointId>) -> Self {
        Self {
            id: id.into(),
            state: None,
            metadata: None,
        }
    }
}

/// How metadata from a newer event is combined with what is already known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Metadata is one optional unit: a newer `Some` replaces it wholesale.
    #[default]
    Whole,
    /// Each metadata field independently keeps the newer defined value.
    FieldLevel,
}

/// Library-originated messages are control only and carry no state or metadata.
pub fn normalize_channel_message(message: &ChannelMessage) -> TransferRecord {
    match &message.msg {
        Message::Client(client) => TransferRecord {
            id: message.id.clone(),
            state: client.state,
            metadata: client.metadata.clone(),
        },
        Message::Lib { .. } => TransferRecord::new(message.id.clone()),
    }
}

pub fn merge_records(prev: &TransferRecord, next: &TransferRecord) -> TransferRecord {
    TransferRecord {
        id: next.id.clone(),
        state: next.state.or(prev.state),
        metadata: next.metadata.clone().or_else(|| prev.metadata.clone()),
    }
}

pub fn merge_metadata_fields(prev: &TransferMetadata, next: &TransferMetadata) -> TransferMetadata {
    TransferMetadata {
        id: if next.id.is_empty() {
            prev.id.clone()
        } else {
            next.id.clone()
        },
        source: next.source.clone().or_else(|| prev.source.clone()),
        pin_code: next.pin_code.clone().or_else(|| prev.pin_code.clone()),
        destination: next.destination.clone().or_else(|| prev.destination.clone()),
        payload: next.payload.clone().or_else(|| prev.payload.clone()),
        total_bytes: next.total_bytes.or(prev.total_bytes),
        ack_bytes: next.ack_bytes.or(prev.ack_bytes),
    }
}

pub fn merge_with(
    strategy: MergeStrategy,
    prev: &TransferRecord,
    next: &TransferRecord,
) -> TransferRecord {
    match strategy {
        MergeStrategy::Whole => merge_records(prev, next),
        MergeStrategy::FieldLevel => {
            let metadata = match (&prev.metadata, &next.metadata) {
                (Some(prev_meta), Some(next_meta)) => {
                    Some(merge_metadata_fields(prev_meta, next_meta))
                }
                (prev_meta, next_meta) => next_meta.clone().or_else(|| prev_meta.clone()),
            };
            TransferRecord {
                id: next.id.clone(),
                state: next.state.or(prev.state),
                metadata,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DeviceType, MessageClient, RemoteDeviceInfo, TransferAction, TransferKind,
        TransferPayload,
    };

    fn full_record(id: &str) -> TransferRecord {
        TransferRecord {
            id: id.to_owned(),
            state: Some(TransferState::ReceivingFiles),
            metadata: Some(TransferMetadata {
                id: id.to_owned(),
                source: Some(RemoteDeviceInfo {
                    name: "Pixel".to_owned(),
                    device_type: DeviceType::Phone,
                }),
                pin_code: Some("4821".to_owned()),
                destination: Some("/home/me/Downloads".to_owned()),
                payload: Some(TransferPayload::Files(vec!["photo.jpg".to_owned()])),
                total_bytes: Some(2048),
                ack_bytes: Some(512),
            }),
        }
    }

    #[test]
    fn normalize_client_copies_state_and_metadata() {
        let record = full_record("t-1");
        let message = ChannelMessage {
            id: "t-1".to_owned(),
            msg: Message::Client(MessageClient {
                kind: TransferKind::Inbound,
                state: record.state,
                metadata: record.metadata.clone(),
            }),
        };
        assert_eq!(normalize_channel_message(&message), record);
    }

    #[test]
    fn normalize_lib_keeps_identity_only() {
        let message = ChannelMessage {
            id: "t-2".to_owned(),
            msg: Message::Lib {
                action: TransferAction::TransferCancel,
            },
        };
        assert_eq!(normalize_channel_message(&message), TransferRecord::new("t-2"));
    }

    #[test]
    fn merge_is_idempotent() {
        let record = full_record("t-1");
        assert_eq!(merge_records(&record, &record), record);
        assert_eq!(merge_with(MergeStrategy::FieldLevel, &record, &record), record);

        let empty = TransferRecord::new("t-1");
        assert_eq!(merge_records(&empty, &empty), empty);
    }

    #[test]
    fn identity_only_update_contributes_nothing() {
        let full = full_record("t-1");
        let bare = TransferRecord::new("t-1");
        assert_eq!(merge_records(&full, &bare), full);
        assert_eq!(merge_records(&bare, &full), full);
    }

    #[test]
    fn newest_defined_state_wins() {
        let prev = full_record("t-1");
        let next = TransferRecord {
            id: "t-1".to_owned(),
            state: Some(TransferState::Finished),
            metadata: None,
        };
        let merged = merge_records(&prev, &next);
        assert_eq!(merged.state, Some(TransferState::Finished));
        assert_eq!(merged.metadata, prev.metadata);
    }

    #[test]
    fn whole_merge_replaces_metadata_as_a_unit() {
        let prev = full_record("t-1");
        let next = TransferRecord {
            id: "t-1".to_owned(),
            state: None,
            metadata: Some(TransferMetadata {
                ack_bytes: Some(1024),
                ..TransferMetadata::default()
            }),
        };
        let merged = merge_records(&prev, &next);
        let meta = merged.metadata.unwrap();
        assert_eq!(meta.ack_bytes, Some(1024));
        assert!(meta.pin_code.is_none());
        assert!(meta.source.is_none());
    }

    #[test]
    fn field_level_merge_keeps_older_defined_fields() {
        let prev = full_record("t-1");
        let next = TransferRecord {
            id: "t-1".to_owned(),
            state: None,
            metadata: Some(TransferMetadata {
                ack_bytes: Some(1024),
                ..TransferMetadata::default()
            }),
        };
        let merged = merge_with(MergeStrategy::FieldLevel, &prev, &next);
        let meta = merged.metadata.unwrap();
        let prev_meta = prev.metadata.unwrap();
        assert_eq!(meta.ack_bytes, Some(1024));
        assert_eq!(meta.total_bytes, Some(2048));
        assert_eq!(meta.pin_code, prev_meta.pin_code);
        assert_eq!(meta.source, prev_meta.source);
        assert_eq!(meta.id, "t-1");
        assert_eq!(merged.state, Some(TransferState::ReceivingFiles));
    }
}
