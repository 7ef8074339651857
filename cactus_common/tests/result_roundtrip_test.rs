//! Property tests for the Result Envelope wire format.

use cactus_common::{ParsingError, WebTestResult, parser};
use proptest::prelude::*;

fn text() -> impl Strategy<Value = String> {
    // Bias towards the characters the encoding has to protect.
    prop::collection::vec(
        prop_oneof![
            Just("&".to_string()),
            Just("<".to_string()),
            Just(">".to_string()),
            Just("\"".to_string()),
            Just("]]>".to_string()),
            Just("&amp;".to_string()),
            Just("\n\tat ".to_string()),
            "[a-zA-Z0-9 .:_]{0,8}",
            any::<char>().prop_map(|c| c.to_string()),
        ],
        0..12,
    )
    .prop_map(|parts| parts.concat())
}

fn result_strategy() -> impl Strategy<Value = WebTestResult> {
    prop_oneof![
        Just(WebTestResult::Ok),
        (text(), text(), text()).prop_map(|(class_name, message, trace)| {
            WebTestResult::failed(class_name, message, trace)
        }),
    ]
}

proptest! {
    #[test]
    fn encode_then_decode_reproduces_the_result(result in result_strategy()) {
        let encoded = parser::to_xml(&result);
        prop_assert_eq!(parser::parse(&encoded).unwrap(), result);
    }

    #[test]
    fn trailing_line_breaks_are_ignored(result in result_strategy(), breaks in "[\r\n ]{0,4}") {
        let encoded = format!("{}{}", parser::to_xml(&result), breaks);
        prop_assert_eq!(parser::parse(&encoded).unwrap(), result);
    }

    #[test]
    fn diagnostics_quote_the_payload_prefix(payload in "[^<]{0,300}") {
        let err: ParsingError = parser::parse(&payload).unwrap_err();
        let expected: String = payload.chars().take(100).collect();
        prop_assert_eq!(err.snippet(), expected.as_str());
        prop_assert!(err.to_string().contains(&expected));
    }
}
