//! Canonical wire renderings.
//!
//! JSON and XML are pure serializations of the same ordered
//! `{t, mode, color, text}` records; both directions round-trip without
//! loss. JSON goes through serde directly, XML through quick-xml here.

use quick_xml::Reader;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{Error, Result};
use crate::model::{CanonicalComment, CommentMode};

fn mode_name(mode: CommentMode) -> &'static str {
    match mode {
        CommentMode::Scroll => "scroll",
        CommentMode::Top => "top",
        CommentMode::Bottom => "bottom",
    }
}

fn mode_from_name(name: &str) -> Option<CommentMode> {
    match name {
        "scroll" => Some(CommentMode::Scroll),
        "top" => Some(CommentMode::Top),
        "bottom" => Some(CommentMode::Bottom),
        _ => None,
    }
}

/// Render a comment list as `<comments><d t=... mode=... color=...>text</d></comments>`.
pub fn to_xml(comments: &[CanonicalComment]) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| Error::Other(format!("xml write: {e}")))?;

    let mut root = BytesStart::new("comments");
    root.push_attribute(("count", comments.len().to_string().as_str()));
    writer
        .write_event(Event::Start(root))
        .map_err(|e| Error::Other(format!("xml write: {e}")))?;

    for comment in comments {
        let mut d = BytesStart::new("d");
        d.push_attribute(("t", comment.time_ms.to_string().as_str()));
        d.push_attribute(("mode", mode_name(comment.mode)));
        d.push_attribute(("color", comment.color.to_string().as_str()));
        writer
            .write_event(Event::Start(d))
            .map_err(|e| Error::Other(format!("xml write: {e}")))?;
        writer
            .write_event(Event::Text(BytesText::new(&comment.text)))
            .map_err(|e| Error::Other(format!("xml write: {e}")))?;
        writer
            .write_event(Event::End(BytesEnd::new("d")))
            .map_err(|e| Error::Other(format!("xml write: {e}")))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("comments")))
        .map_err(|e| Error::Other(format!("xml write: {e}")))?;

    String::from_utf8(writer.into_inner()).map_err(|e| Error::Other(format!("xml utf8: {e}")))
}

/// Parse the XML rendering back into canonical comments.
pub fn from_xml(xml: &str) -> Result<Vec<CanonicalComment>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut comments = Vec::new();
    let mut pending: Option<CanonicalComment> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"d" => {
                let mut comment = CanonicalComment::scroll(0, "");
                for attr in e.attributes().flatten() {
                    let value = attr
                        .unescape_value()
                        .map_err(|e| Error::Other(format!("xml attr: {e}")))?;
                    match attr.key.as_ref() {
                        b"t" => {
                            comment.time_ms = value
                                .parse()
                                .map_err(|_| Error::validation("bad t attribute"))?;
                        }
                        b"mode" => {
                            comment.mode = mode_from_name(&value)
                                .ok_or_else(|| Error::validation("bad mode attribute"))?;
                        }
                        b"color" => {
                            comment.color = value
                                .parse()
                                .map_err(|_| Error::validation("bad color attribute"))?;
                        }
                        _ => {}
                    }
                }
                pending = Some(comment);
            }
            Ok(Event::Text(ref t)) => {
                if let Some(comment) = pending.as_mut() {
                    comment.text = t
                        .unescape()
                        .map_err(|e| Error::Other(format!("xml text: {e}")))?
                        .into_owned();
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"d" => {
                if let Some(comment) = pending.take() {
                    comments.push(comment);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Other(format!("xml parse: {e}"))),
            _ => {}
        }
    }

    Ok(comments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::COLOR_WHITE;

    fn sample() -> Vec<CanonicalComment> {
        vec![
            CanonicalComment {
                time_ms: 1_500,
                mode: CommentMode::Scroll,
                color: COLOR_WHITE,
                text: "第一条".to_string(),
            },
            CanonicalComment {
                time_ms: 62_000,
                mode: CommentMode::Top,
                color: 0xFF0000,
                text: "needs <escaping> & \"quotes\"".to_string(),
            },
            CanonicalComment {
                time_ms: 90_000,
                mode: CommentMode::Bottom,
                color: 0x00FF00,
                text: "最后".to_string(),
            },
        ]
    }

    #[test]
    fn test_xml_round_trip() {
        let original = sample();
        let xml = to_xml(&original).unwrap();
        let parsed = from_xml(&xml).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_json_and_xml_agree() {
        let original = sample();

        let json = serde_json::to_string(&original).unwrap();
        let from_json: Vec<CanonicalComment> = serde_json::from_str(&json).unwrap();

        let xml = to_xml(&original).unwrap();
        let from_xml_list = from_xml(&xml).unwrap();

        assert_eq!(from_json, from_xml_list);
    }

    #[test]
    fn test_empty_list() {
        let xml = to_xml(&[]).unwrap();
        assert!(xml.contains(r#"count="0""#));
        assert!(from_xml(&xml).unwrap().is_empty());
    }
}
