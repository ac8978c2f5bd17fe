//! Flat `<xml><field>value</field>...</xml>` wire format.

use crate::domain::error::{GatewayError, Result};
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;

const ROOT: &str = "xml";

fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

pub const MALFORMED_MESSAGE: &str = "malformed response xml";

/// Parser detail is logged here and kept out of the caller-facing message.
fn read_err(position: usize, e: impl std::fmt::Display) -> GatewayError {
    tracing::warn!(position, error = %e, "undecodable processor reply");
    GatewayError::Api(MALFORMED_MESSAGE.to_string())
}

fn write_err(e: impl std::fmt::Display) -> GatewayError {
    GatewayError::Validation(format!("failed to encode request xml: {e}"))
}

/// Digit-only values are written as plain content, everything else inside
/// CDATA. A `]]>` inside a value is split across two sections.
pub fn encode(fields: &BTreeMap<String, String>) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Start(BytesStart::new(ROOT)))
        .map_err(write_err)?;

    for (name, value) in fields {
        writer
            .write_event(Event::Start(BytesStart::new(name.as_str())))
            .map_err(write_err)?;
        if is_numeric(value) {
            writer
                .write_event(Event::Text(BytesText::new(value)))
                .map_err(write_err)?;
        } else {
            let parts: Vec<&str> = value.split("]]>").collect();
            let last = parts.len() - 1;
            for (i, part) in parts.iter().enumerate() {
                let mut chunk = String::with_capacity(part.len() + 3);
                if i > 0 {
                    chunk.push('>');
                }
                chunk.push_str(part);
                if i < last {
                    chunk.push_str("]]");
                }
                writer
                    .write_event(Event::CData(BytesCData::new(chunk)))
                    .map_err(write_err)?;
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(name.as_str())))
            .map_err(write_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(ROOT)))
        .map_err(write_err)?;

    String::from_utf8(writer.into_inner()).map_err(write_err)
}

/// Parses the response body into element name → text content. Only the direct
/// children of the root element are kept.
pub fn decode(body: &str) -> Result<BTreeMap<String, String>> {
    let mut reader = Reader::from_str(body);
    let mut fields = BTreeMap::new();
    let mut depth = 0usize;
    let mut current: Option<(String, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                if depth == 2 {
                    let name = std::str::from_utf8(e.name().as_ref())
                        .map_err(|err| read_err(reader.buffer_position(), err))?
                        .to_string();
                    current = Some((name, String::new()));
                }
            }
            Ok(Event::Empty(e)) if depth == 1 => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                fields.insert(name, String::new());
            }
            Ok(Event::Text(e)) => {
                if let Some((_, value)) = current.as_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| read_err(reader.buffer_position(), err))?;
                    value.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                if depth == 2 {
                    if let Some((name, value)) = current.take() {
                        fields.insert(name, value);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(read_err(reader.buffer_position(), e)),
        }
    }

    if depth != 0 {
        return Err(read_err(reader.buffer_position(), "document ends inside an element"));
    }
    Ok(fields)
}
