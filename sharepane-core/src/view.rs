use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
    DeviceType, EndpointId, EndpointInfo, TransferPayload, TransferRecord, TransferState,
    UNKNOWN_LABEL,
};

pub const TEXT_DESCRIPTION: &str = "Text content";
pub const URL_DESCRIPTION: &str = "URL";

/// States a transfer must be in before it is shown. `Initial` is not listed,
/// so records whose state is still unknown stay hidden.
pub const DEFAULT_VISIBLE_STATES: [TransferState; 9] = [
    TransferState::ReceivedPairedKeyResult,
    TransferState::WaitingForUserConsent,
    TransferState::ReceivingFiles,
    TransferState::Disconnected,
    TransferState::Finished,
    TransferState::SentIntroduction,
    TransferState::SendingFiles,
    TransferState::Cancelled,
    TransferState::Rejected,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextType {
    Text,
    Url,
    Wifi,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityFilter {
    states: HashSet<TransferState>,
}

impl VisibilityFilter {
    pub fn new(states: impl IntoIterator<Item = TransferState>) -> Self {
        Self {
            states: states.into_iter().collect(),
        }
    }

    pub fn contains(&self, state: TransferState) -> bool {
        self.states.contains(&state)
    }

    pub fn admits(&self, record: &TransferRecord) -> bool {
        self.contains(record.state.unwrap_or(TransferState::Initial))
    }
}

impl Default for VisibilityFilter {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBLE_STATES)
    }
}

/// One UI entry per identity. `endpoint` marks a discovery-only placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRow {
    pub id: EndpointId,
    pub name: String,
    pub device_type: DeviceType,
    pub endpoint: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TransferState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_type: Option<TextType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_bytes: Option<u64>,
}

impl DisplayRow {
    pub fn placeholder(endpoint: &EndpointInfo) -> Self {
        Self {
            id: endpoint.id.clone(),
            name: endpoint
                .name
                .clone()
                .unwrap_or_else(|| UNKNOWN_LABEL.to_owned()),
            device_type: endpoint.device_type.unwrap_or_default(),
            endpoint: true,
            state: None,
            pin_code: None,
            files: None,
            text_description: None,
            text_payload: None,
            text_type: None,
            destination: None,
            total_bytes: None,
            ack_bytes: None,
        }
    }

    pub fn from_record(record: &TransferRecord) -> Self {
        let meta = record.metadata.as_ref();
        let source = meta.and_then(|m| m.source.as_ref());

        let mut row = Self {
            id: record.id.clone(),
            name: source.map_or_else(|| UNKNOWN_LABEL.to_owned(), |s| s.name.clone()),
            device_type: source.map(|s| s.device_type).unwrap_or_default(),
            endpoint: false,
            state: record.state,
            pin_code: meta.and_then(|m| m.pin_code.clone()),
            files: None,
            text_description: None,
            text_payload: None,
            text_type: None,
            destination: meta.and_then(|m| m.destination.clone()),
            total_bytes: meta.and_then(|m| m.total_bytes),
            ack_bytes: meta.and_then(|m| m.ack_bytes),
        };

        match meta.and_then(|m| m.payload.as_ref()) {
            Some(TransferPayload::Files(files)) => row.files = Some(files.clone()),
            Some(TransferPayload::Text(text)) => {
                row.set_text(TEXT_DESCRIPTION.to_owned(), text.clone(), TextType::Text);
            }
            Some(TransferPayload::Url(url)) => {
                row.set_text(URL_DESCRIPTION.to_owned(), url.clone(), TextType::Url);
            }
            Some(TransferPayload::Wifi { ssid, .. }) => {
                row.set_text(format!("WiFi: {ssid}"), format!("SSID: {ssid}"), TextType::Wifi);
            }
            None => {}
        }

        row
    }

    fn set_text(&mut self, description: String, payload: String, text_type: TextType) {
        self.text_description = Some(description);
        self.text_payload = Some(payload);
        self.text_type = Some(text_type);
    }
}

/// Builds the display list: endpoint placeholders first in discovery order,
/// then visible transfers. A transfer replaces the placeholder with the same
/// identity in place so rows never move when a peer's transfer shows up.
pub fn reconcile(
    endpoints: &[EndpointInfo],
    requests: &[TransferRecord],
    visible: &VisibilityFilter,
) -> Vec<DisplayRow> {
    let mut rows: Vec<DisplayRow> = Vec::with_capacity(endpoints.len() + requests.len());
    let mut index: HashMap<EndpointId, usize> = HashMap::new();

    for endpoint in endpoints {
        if index.contains_key(&endpoint.id) {
            continue;
        }
        index.insert(endpoint.id.clone(), rows.len());
        rows.push(DisplayRow::placeholder(endpoint));
    }

    for record in requests.iter().filter(|r| visible.admits(r)) {
        let row = DisplayRow::from_record(record);
        match index.get(&record.id) {
            Some(&idx) => rows[idx] = row,
            None => {
                index.insert(record.id.clone(), rows.len());
                rows.push(row);
            }
        }
    }

    rows
}

/// Percentage of acknowledged bytes. Not clamped: inconsistent counters pass
/// through. A missing or zero total counts as 1.
pub fn progress_ratio(row: &DisplayRow) -> f64 {
    let ack = row.ack_bytes.unwrap_or(0);
    let total = match row.total_bytes {
        None | Some(0) => 1,
        Some(total) => total,
    };
    ack as f64 / total as f64 * 100.0
}

pub fn progress_style(row: &DisplayRow) -> String {
    format!("--progress: {}", progress_ratio(row))
}
