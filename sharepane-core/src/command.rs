use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    ChannelMessage, CoreError, EndpointInfo, Message, OutboundPayload, SendInfo, TransferAction,
    UNKNOWN_LABEL,
};

/// What the user asked for on a transfer row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserIntent {
    Accept,
    Reject,
    Cancel,
}

impl UserIntent {
    pub fn action(self) -> TransferAction {
        match self {
            UserIntent::Accept => TransferAction::ConsentAccept,
            UserIntent::Reject => TransferAction::ConsentDecline,
            UserIntent::Cancel => TransferAction::TransferCancel,
        }
    }
}

impl FromStr for UserIntent {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(UserIntent::Accept),
            "reject" | "decline" => Ok(UserIntent::Reject),
            "cancel" => Ok(UserIntent::Cancel),
            other => Err(CoreError::UnknownIntent(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCommand {
    StartDiscovery,
    StopDiscovery,
    SendPayload { message: SendInfo },
    SendToRs { message: ChannelMessage },
}

impl OutboundCommand {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundCommand::StartDiscovery => "start_discovery",
            OutboundCommand::StopDiscovery => "stop_discovery",
            OutboundCommand::SendPayload { .. } => "send_payload",
            OutboundCommand::SendToRs { .. } => "send_to_rs",
        }
    }

    /// Arguments passed alongside [`name`](Self::name), as `{"message": ...}`.
    pub fn args(&self) -> Result<Option<Value>, CoreError> {
        let message = match self {
            OutboundCommand::StartDiscovery | OutboundCommand::StopDiscovery => return Ok(None),
            OutboundCommand::SendPayload { message } => serde_json::to_value(message),
            OutboundCommand::SendToRs { message } => serde_json::to_value(message),
        }
        .map_err(|err| CoreError::Serialization(err.to_string()))?;

        let mut args = Map::new();
        args.insert("message".to_owned(), message);
        Ok(Some(Value::Object(args)))
    }

    pub fn from_parts(name: &str, args: Option<Value>) -> Result<Self, CoreError> {
        match name {
            "start_discovery" => Ok(OutboundCommand::StartDiscovery),
            "stop_discovery" => Ok(OutboundCommand::StopDiscovery),
            "send_payload" => Ok(OutboundCommand::SendPayload {
                message: message_arg(args, "send_payload")?,
            }),
            "send_to_rs" => Ok(OutboundCommand::SendToRs {
                message: message_arg(args, "send_to_rs")?,
            }),
            other => Err(CoreError::UnknownCommand(other.to_owned())),
        }
    }
}

fn message_arg<T: serde::de::DeserializeOwned>(
    args: Option<Value>,
    command: &'static str,
) -> Result<T, CoreError> {
    let message = args
        .and_then(|mut value| value.get_mut("message").map(Value::take))
        .ok_or(CoreError::MissingArgument(command))?;
    serde_json::from_value(message).map_err(|err| CoreError::Serialization(err.to_string()))
}

pub fn encode_user_action(id: &str, intent: UserIntent) -> OutboundCommand {
    OutboundCommand::SendToRs {
        message: ChannelMessage {
            id: id.to_owned(),
            msg: Message::Lib {
                action: intent.action(),
            },
        },
    }
}

/// Returns `None` when nothing is staged or the endpoint has no usable
/// address and port.
pub fn encode_send(
    endpoint: &EndpointInfo,
    payload: Option<&OutboundPayload>,
) -> Option<OutboundCommand> {
    let payload = payload?;
    let ip = endpoint.ip.as_deref().filter(|ip| !ip.is_empty())?;
    let port = endpoint.port.as_deref().filter(|port| !port.is_empty())?;

    Some(OutboundCommand::SendPayload {
        message: SendInfo {
            id: endpoint.id.clone(),
            name: endpoint
                .name
                .clone()
                .unwrap_or_else(|| UNKNOWN_LABEL.to_owned()),
            addr: format!("{ip}:{port}"),
            ob: payload.clone(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addressed(id: &str) -> EndpointInfo {
        EndpointInfo {
            id: id.to_owned(),
            ip: Some("192.168.1.20".to_owned()),
            port: Some("44155".to_owned()),
            ..EndpointInfo::default()
        }
    }

    fn files() -> OutboundPayload {
        OutboundPayload::Files(vec!["/tmp/report.pdf".to_owned()])
    }

    #[test]
    fn intents_map_to_transfer_actions() {
        assert_eq!(UserIntent::Accept.action(), TransferAction::ConsentAccept);
        assert_eq!(UserIntent::Reject.action(), TransferAction::ConsentDecline);
        assert_eq!(UserIntent::Cancel.action(), TransferAction::TransferCancel);
    }

    #[test]
    fn user_action_is_a_lib_control_message() {
        let command = encode_user_action("t-9", UserIntent::Cancel);
        assert_eq!(command.name(), "send_to_rs");
        assert_eq!(
            command,
            OutboundCommand::SendToRs {
                message: ChannelMessage {
                    id: "t-9".to_owned(),
                    msg: Message::Lib {
                        action: TransferAction::TransferCancel,
                    },
                },
            }
        );
    }

    #[test]
    fn send_builds_address_and_default_name() {
        let payload = files();
        let command = encode_send(&addressed("e-1"), Some(&payload)).unwrap();
        match command {
            OutboundCommand::SendPayload { message } => {
                assert_eq!(message.id, "e-1");
                assert_eq!(message.name, "Unknown");
                assert_eq!(message.addr, "192.168.1.20:44155");
                assert_eq!(message.ob, payload);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn send_without_address_or_payload_is_a_no_op() {
        let payload = files();
        let mut no_ip = addressed("e-1");
        no_ip.ip = None;
        assert!(encode_send(&no_ip, Some(&payload)).is_none());

        let mut empty_port = addressed("e-1");
        empty_port.port = Some(String::new());
        assert!(encode_send(&empty_port, Some(&payload)).is_none());

        assert!(encode_send(&addressed("e-1"), None).is_none());
    }

    #[test]
    fn intent_parsing() {
        assert_eq!("Accept".parse::<UserIntent>().unwrap(), UserIntent::Accept);
        assert_eq!("decline".parse::<UserIntent>().unwrap(), UserIntent::Reject);
        assert!(matches!(
            "pause".parse::<UserIntent>(),
            Err(CoreError::UnknownIntent(_))
        ));
    }

    #[test]
    fn from_parts_requires_message() {
        let err = OutboundCommand::from_parts("send_payload", None).unwrap_err();
        assert!(matches!(err, CoreError::MissingArgument("send_payload")));

        let command = encode_user_action("t-1", UserIntent::Accept);
        let rebuilt = OutboundCommand::from_parts(command.name(), command.args().unwrap()).unwrap();
        assert_eq!(rebuilt, command);
    }
}
