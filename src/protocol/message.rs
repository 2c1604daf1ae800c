use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use thiserror::Error;

use crate::membership::types::Role;

/// A node descriptor as it appears in HELLO / ACK HELLO / COORDINATOR
/// payloads. Unknown fields (some peers emit a `priority`) are dropped on
/// ingress; priorities are always recomputed locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireNode {
    pub address: Ipv4Addr,
    pub roles: Vec<Role>,
}

/// The discovery message set.
///
/// `Assign` exists on the wire but has no defined handler anywhere in the
/// protocol; the dispatch loop logs and drops it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Join,
    Hello(Vec<WireNode>),
    AckHello(Vec<WireNode>),
    Election,
    Ok,
    Coordinator(Vec<WireNode>),
    AckCoordinator(Vec<WireNode>),
    Assign,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("datagram is not valid UTF-8")]
    NotUtf8,
    #[error("empty datagram")]
    Empty,
    #[error("unknown message type `{0}`")]
    UnknownType(String),
    #[error("unknown ACK kind `{0}`")]
    UnknownAckKind(String),
    #[error("missing node-list payload for {0}")]
    MissingPayload(&'static str),
    #[error("unexpected payload for {0}")]
    UnexpectedPayload(&'static str),
    #[error("invalid node list: {0}")]
    InvalidNodeList(#[from] serde_json::Error),
}

impl Message {
    /// Parses a raw datagram. A failure here discards the datagram; it never
    /// mutates state.
    pub fn parse(datagram: &[u8]) -> Result<Message, ParseError> {
        let text = std::str::from_utf8(datagram).map_err(|_| ParseError::NotUtf8)?;
        let text = text.trim_end_matches(['\r', '\n']);
        if text.is_empty() {
            return Err(ParseError::Empty);
        }

        let (keyword, rest) = match text.split_once(' ') {
            Some((keyword, rest)) => (keyword, rest),
            None => (text, ""),
        };

        match keyword {
            "JOIN" => Self::without_payload("JOIN", rest, Message::Join),
            "ELECTION" => Self::without_payload("ELECTION", rest, Message::Election),
            "OK" => Self::without_payload("OK", rest, Message::Ok),
            "ASSIGN" => Self::without_payload("ASSIGN", rest, Message::Assign),
            "HELLO" => Ok(Message::Hello(Self::node_list("HELLO", rest)?)),
            "COORDINATOR" => Ok(Message::Coordinator(Self::node_list("COORDINATOR", rest)?)),
            "ACK" => {
                let (kind, payload) = match rest.split_once(' ') {
                    Some((kind, payload)) => (kind, payload),
                    None => (rest, ""),
                };
                match kind {
                    "HELLO" => Ok(Message::AckHello(Self::node_list("ACK HELLO", payload)?)),
                    "COORDINATOR" => Ok(Message::AckCoordinator(Self::node_list(
                        "ACK COORDINATOR",
                        payload,
                    )?)),
                    other => Err(ParseError::UnknownAckKind(other.to_string())),
                }
            }
            other => Err(ParseError::UnknownType(other.to_string())),
        }
    }

    fn without_payload(
        kind: &'static str,
        rest: &str,
        message: Message,
    ) -> Result<Message, ParseError> {
        if rest.is_empty() {
            Ok(message)
        } else {
            Err(ParseError::UnexpectedPayload(kind))
        }
    }

    fn node_list(kind: &'static str, payload: &str) -> Result<Vec<WireNode>, ParseError> {
        if payload.is_empty() {
            return Err(ParseError::MissingPayload(kind));
        }
        Ok(serde_json::from_str(payload)?)
    }

    /// Renders the wire form. Fails only if the node list cannot be
    /// serialized, which the transport logs and drops.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            Message::Join => Ok("JOIN".to_string()),
            Message::Election => Ok("ELECTION".to_string()),
            Message::Ok => Ok("OK".to_string()),
            Message::Assign => Ok("ASSIGN".to_string()),
            Message::Hello(nodes) => Ok(format!("HELLO {}", serde_json::to_string(nodes)?)),
            Message::AckHello(nodes) => {
                Ok(format!("ACK HELLO {}", serde_json::to_string(nodes)?))
            }
            Message::Coordinator(nodes) => {
                Ok(format!("COORDINATOR {}", serde_json::to_string(nodes)?))
            }
            Message::AckCoordinator(nodes) => {
                Ok(format!("ACK COORDINATOR {}", serde_json::to_string(nodes)?))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Join => "JOIN",
            Message::Hello(_) => "HELLO",
            Message::AckHello(_) => "ACK HELLO",
            Message::Election => "ELECTION",
            Message::Ok => "OK",
            Message::Coordinator(_) => "COORDINATOR",
            Message::AckCoordinator(_) => "ACK COORDINATOR",
            Message::Assign => "ASSIGN",
        }
    }
}
