//! Textual encoding of the Result Envelope.
//!
//! ```text
//! <webresult></webresult>
//! <webresult><exception classname="IllegalStateException"><message><![CDATA[boom]]></message><stacktrace><![CDATA[...]]></stacktrace></exception></webresult>
//! ```
//!
//! Text is entity-escaped before it goes into the CDATA sections, so a `]]>`
//! inside a message can never terminate the section early.

use crate::error::ParsingError;
use crate::result::{FailureDetails, WebTestResult};

const ROOT_START: &str = "<webresult>";
const ROOT_END: &str = "</webresult>";
const EXCEPTION_START: &str = "<exception classname=\"";
const EXCEPTION_END: &str = "</exception>";
const MESSAGE_START: &str = "<message>";
const MESSAGE_END: &str = "</message>";
const STACKTRACE_START: &str = "<stacktrace>";
const STACKTRACE_END: &str = "</stacktrace>";
const CDATA_START: &str = "<![CDATA[";
const CDATA_END: &str = "]]>";

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn xml_unescape(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Serializes a result to its wire text.
pub fn to_xml(result: &WebTestResult) -> String {
    let mut xml = String::from(ROOT_START);
    if let WebTestResult::Failed(details) = result {
        xml.push_str(EXCEPTION_START);
        xml.push_str(&xml_escape(&details.class_name));
        xml.push_str("\">");
        for (start, text, end) in [
            (MESSAGE_START, &details.message, MESSAGE_END),
            (STACKTRACE_START, &details.stack_trace, STACKTRACE_END),
        ] {
            xml.push_str(start);
            xml.push_str(CDATA_START);
            xml.push_str(&xml_escape(text));
            xml.push_str(CDATA_END);
            xml.push_str(end);
        }
        xml.push_str(EXCEPTION_END);
    }
    xml.push_str(ROOT_END);
    xml
}

/// Parses wire text back into a result.
///
/// Leading and trailing whitespace is ignored since transports may append
/// line breaks. Any other deviation fails with a [`ParsingError`] quoting the
/// start of the original payload.
pub fn parse(payload: &str) -> Result<WebTestResult, ParsingError> {
    let error = || ParsingError::for_payload(payload);

    let body = payload
        .trim()
        .strip_prefix(ROOT_START)
        .and_then(|rest| rest.strip_suffix(ROOT_END))
        .ok_or_else(error)?;
    if body.is_empty() {
        return Ok(WebTestResult::Ok);
    }

    let exception = body
        .strip_prefix(EXCEPTION_START)
        .and_then(|rest| rest.strip_suffix(EXCEPTION_END))
        .ok_or_else(error)?;
    let (class_name, rest) = exception.split_once("\">").ok_or_else(error)?;
    if class_name.contains('"') {
        return Err(error());
    }

    let (message, rest) = read_text_element(rest, MESSAGE_START, MESSAGE_END).ok_or_else(error)?;
    let (stack_trace, rest) =
        read_text_element(rest, STACKTRACE_START, STACKTRACE_END).ok_or_else(error)?;
    if !rest.is_empty() {
        return Err(error());
    }

    Ok(WebTestResult::Failed(FailureDetails {
        class_name: xml_unescape(class_name),
        message,
        stack_trace,
    }))
}

/// Reads `<tag>text</tag>` at the start of `input`, where text may be wrapped
/// in a CDATA section. Returns the unescaped text and the remainder.
fn read_text_element<'a>(input: &'a str, start: &str, end: &str) -> Option<(String, &'a str)> {
    let inner = input.strip_prefix(start)?;
    let close = inner.find(end)?;
    let raw = &inner[..close];
    let rest = &inner[close + end.len()..];
    let text = match raw.strip_prefix(CDATA_START) {
        Some(cdata) => cdata.strip_suffix(CDATA_END)?,
        None => raw,
    };
    Some((xml_unescape(text), rest))
}
