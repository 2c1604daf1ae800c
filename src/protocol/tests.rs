//! Wire Protocol Tests
//!
//! Pins the strict parsing behavior: every malformed shape is rejected, and
//! nothing ambiguous slips through. A parse failure must never be survivable
//! into state.

#[cfg(test)]
mod tests {
    use crate::membership::types::Role;
    use crate::protocol::message::{Message, ParseError, WireNode};
    use std::net::Ipv4Addr;

    fn parse(text: &str) -> Result<Message, ParseError> {
        Message::parse(text.as_bytes())
    }

    // ============================================================
    // WELL-FORMED MESSAGES
    // ============================================================

    #[test]
    fn test_parse_payloadless_messages() {
        assert_eq!(parse("JOIN").unwrap(), Message::Join);
        assert_eq!(parse("ELECTION").unwrap(), Message::Election);
        assert_eq!(parse("OK").unwrap(), Message::Ok);
        assert_eq!(parse("ASSIGN").unwrap(), Message::Assign);
    }

    #[test]
    fn test_parse_hello_with_node_list() {
        let message = parse(r#"HELLO [{"address":"10.0.0.1","roles":[]}]"#).unwrap();
        let Message::Hello(nodes) = message else {
            panic!("wrong message type");
        };
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].address, Ipv4Addr::new(10, 0, 0, 1));
        assert!(nodes[0].roles.is_empty());
    }

    #[test]
    fn test_parse_ack_hello() {
        let message = parse(r#"ACK HELLO [{"address":"10.0.0.2","roles":["EDITING"]}]"#).unwrap();
        let Message::AckHello(nodes) = message else {
            panic!("wrong message type");
        };
        assert_eq!(nodes[0].roles, vec![Role::Editing]);
    }

    #[test]
    fn test_parse_coordinator_with_roles() {
        let message = parse(
            r#"COORDINATOR [{"address":"10.0.0.3","roles":["MESSAGE_BROKER"]},{"address":"10.0.0.1","roles":["GATEWAY"]}]"#,
        )
        .unwrap();
        let Message::Coordinator(nodes) = message else {
            panic!("wrong message type");
        };
        assert_eq!(nodes[0].roles, vec![Role::MessageBroker]);
        assert_eq!(nodes[1].roles, vec![Role::Gateway]);
    }

    #[test]
    fn test_parse_ack_coordinator() {
        let message =
            parse(r#"ACK COORDINATOR [{"address":"10.0.0.3","roles":["MESSAGE_BROKER"]}]"#)
                .unwrap();
        assert!(matches!(message, Message::AckCoordinator(_)));
    }

    #[test]
    fn test_parse_trailing_newline_is_tolerated() {
        assert_eq!(parse("JOIN\n").unwrap(), Message::Join);
    }

    // ============================================================
    // MALFORMED DATAGRAMS
    // ============================================================

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(matches!(parse("PING"), Err(ParseError::UnknownType(_))));
        assert!(matches!(
            parse("COORDINATE []"),
            Err(ParseError::UnknownType(_))
        ));
    }

    #[test]
    fn test_unknown_ack_kind_is_rejected() {
        assert!(matches!(
            parse("ACK ELECTION []"),
            Err(ParseError::UnknownAckKind(_))
        ));
        assert!(matches!(parse("ACK"), Err(ParseError::UnknownAckKind(_))));
    }

    #[test]
    fn test_empty_datagram_is_rejected() {
        assert!(matches!(parse(""), Err(ParseError::Empty)));
    }

    #[test]
    fn test_non_utf8_is_rejected() {
        assert!(matches!(
            Message::parse(&[0xff, 0xfe, 0x00]),
            Err(ParseError::NotUtf8)
        ));
    }

    #[test]
    fn test_missing_payload_is_rejected() {
        assert!(matches!(
            parse("HELLO"),
            Err(ParseError::MissingPayload("HELLO"))
        ));
        assert!(matches!(
            parse("COORDINATOR"),
            Err(ParseError::MissingPayload("COORDINATOR"))
        ));
        assert!(matches!(
            parse("ACK HELLO"),
            Err(ParseError::MissingPayload("ACK HELLO"))
        ));
    }

    #[test]
    fn test_unexpected_payload_is_rejected() {
        assert!(matches!(
            parse("JOIN extra"),
            Err(ParseError::UnexpectedPayload("JOIN"))
        ));
        assert!(matches!(
            parse("OK nope"),
            Err(ParseError::UnexpectedPayload("OK"))
        ));
    }

    #[test]
    fn test_hello_not_json_is_rejected() {
        assert!(matches!(
            parse("HELLO not-json"),
            Err(ParseError::InvalidNodeList(_))
        ));
    }

    #[test]
    fn test_non_array_payload_is_rejected() {
        assert!(matches!(
            parse(r#"HELLO {"address":"10.0.0.1","roles":[]}"#),
            Err(ParseError::InvalidNodeList(_))
        ));
    }

    #[test]
    fn test_missing_address_is_rejected() {
        assert!(parse(r#"HELLO [{"roles":[]}]"#).is_err());
    }

    #[test]
    fn test_null_address_is_rejected() {
        assert!(parse(r#"HELLO [{"address":null,"roles":[]}]"#).is_err());
    }

    #[test]
    fn test_invalid_ipv4_is_rejected() {
        assert!(parse(r#"HELLO [{"address":"10.0.0.999","roles":[]}]"#).is_err());
        assert!(parse(r#"HELLO [{"address":"somewhere","roles":[]}]"#).is_err());
    }

    #[test]
    fn test_roles_not_an_array_is_rejected() {
        assert!(parse(r#"HELLO [{"address":"10.0.0.1","roles":null}]"#).is_err());
        assert!(parse(r#"HELLO [{"address":"10.0.0.1","roles":"EDITING"}]"#).is_err());
        assert!(parse(r#"HELLO [{"address":"10.0.0.1"}]"#).is_err());
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        assert!(parse(r#"HELLO [{"address":"10.0.0.1","roles":["JANITOR"]}]"#).is_err());
    }

    #[test]
    fn test_wire_priority_field_is_dropped() {
        // Some peers include a priority claim; it must be ignored, never
        // parsed into anything.
        let message =
            parse(r#"HELLO [{"address":"10.0.0.1","roles":[],"priority":999}]"#).unwrap();
        let Message::Hello(nodes) = message else {
            panic!("wrong message type");
        };
        assert_eq!(nodes[0].address, Ipv4Addr::new(10, 0, 0, 1));
    }

    // ============================================================
    // ENCODING
    // ============================================================

    #[test]
    fn test_encode_payloadless_messages() {
        assert_eq!(Message::Join.encode().unwrap(), "JOIN");
        assert_eq!(Message::Election.encode().unwrap(), "ELECTION");
        assert_eq!(Message::Ok.encode().unwrap(), "OK");
    }

    #[test]
    fn test_encode_hello_roundtrip() {
        let nodes = vec![
            WireNode {
                address: Ipv4Addr::new(10, 0, 0, 3),
                roles: vec![Role::MessageBroker],
            },
            WireNode {
                address: Ipv4Addr::new(10, 0, 0, 1),
                roles: vec![Role::Gateway],
            },
        ];
        let encoded = Message::Hello(nodes.clone()).encode().unwrap();
        assert!(encoded.starts_with("HELLO ["));
        assert_eq!(parse(&encoded).unwrap(), Message::Hello(nodes));
    }

    #[test]
    fn test_encode_ack_coordinator_keyword_order() {
        let encoded = Message::AckCoordinator(vec![]).encode().unwrap();
        assert_eq!(encoded, "ACK COORDINATOR []");
    }

    #[test]
    fn test_role_wire_names() {
        let json = serde_json::to_string(&vec![
            Role::MessageBroker,
            Role::Gateway,
            Role::Editing,
        ])
        .unwrap();
        assert_eq!(json, r#"["MESSAGE_BROKER","GATEWAY","EDITING"]"#);
    }
}
