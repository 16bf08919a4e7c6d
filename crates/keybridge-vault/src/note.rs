//! Secure note payload decoding.
//!
//! Notes created through the system keychain UI are stored as an XML property
//! list whose top-level dictionary holds the note text under the `NOTE` key:
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <plist version="1.0">
//! <dict>
//!     <key>NOTE</key>
//!     <string>the secret text</string>
//! </dict>
//! </plist>
//! ```
//!
//! Notes written by this crate are stored as raw bytes. [`decode_note`]
//! accepts both, so readers never need to know which encoding was used.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Result, VaultError};

/// Dictionary key holding the note text.
pub const NOTE_KEY: &str = "NOTE";

/// Returns `true` if `data` starts like an XML property list.
pub fn is_property_list(data: &[u8]) -> bool {
    let trimmed = data.trim_ascii_start();
    trimmed.starts_with(b"<?xml")
        || trimmed.starts_with(b"<!DOCTYPE plist")
        || trimmed.starts_with(b"<plist")
}

/// Recover the user-visible note from a stored payload.
///
/// Property lists yield the `NOTE` string. Anything else is returned
/// verbatim.
pub fn decode_note(data: &[u8]) -> Result<Cow<'_, [u8]>> {
    if !is_property_list(data) {
        return Ok(Cow::Borrowed(data));
    }
    let entries = dict_entries(data)?;
    entries
        .windows(2)
        .find(|pair| pair[0].0 == "key" && pair[0].1 == NOTE_KEY && pair[1].0 == "string")
        .map(|pair| Cow::Owned(pair[1].1.clone().into_bytes()))
        .ok_or_else(|| malformed(format!("dictionary has no {NOTE_KEY} string")))
}

fn malformed(reason: impl Into<String>) -> VaultError {
    VaultError::MalformedNote {
        reason: reason.into(),
    }
}

/// Direct children of the first `<dict>` as `(element name, text)` pairs.
fn dict_entries(data: &[u8]) -> Result<Vec<(String, String)>> {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();

    let mut depth = 0usize;
    let mut dict_depth: Option<usize> = None;
    let mut current: Option<(String, String)> = None;
    let mut entries = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| malformed(e.to_string()))?;
        match event {
            Event::Start(e) => {
                depth += 1;
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if dict_depth.is_none() && name == "dict" {
                    dict_depth = Some(depth);
                } else if dict_depth == Some(depth - 1) {
                    current = Some((name, String::new()));
                }
            }
            Event::Empty(e) => {
                if dict_depth == Some(depth) {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    entries.push((name, String::new()));
                }
            }
            Event::Text(t) => {
                if let Some((_, text)) = current.as_mut() {
                    let unescaped = t.unescape().map_err(|e| malformed(e.to_string()))?;
                    text.push_str(&unescaped);
                }
            }
            Event::CData(c) => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                if dict_depth == Some(depth) {
                    return Ok(entries);
                }
                if dict_depth == Some(depth.saturating_sub(1)) {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    match dict_depth {
        Some(_) => Err(malformed("unterminated dictionary")),
        None => Err(malformed("property list has no dictionary")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>RTFD</key>
	<data>AAAA</data>
	<key>NOTE</key>
	<string>top &amp; secret</string>
	<key>Locked</key>
	<true/>
</dict>
</plist>"#;

    #[test]
    fn extracts_note_from_property_list() {
        let note = decode_note(PLIST.as_bytes()).unwrap();
        assert_eq!(note.as_ref(), b"top & secret");
    }

    #[test]
    fn raw_payload_is_returned_verbatim() {
        let raw = b"\x00\x01binary secret";
        let note = decode_note(raw).unwrap();
        assert!(matches!(note, Cow::Borrowed(_)));
        assert_eq!(note.as_ref(), raw);
    }

    #[test]
    fn json_payload_is_raw() {
        let raw = br#"[{"key_id":"a","token":"b"}]"#;
        assert_eq!(decode_note(raw).unwrap().as_ref(), raw);
    }

    #[test]
    fn property_list_without_note_is_malformed() {
        let doc = r#"<plist version="1.0"><dict><key>OTHER</key><string>x</string></dict></plist>"#;
        let err = decode_note(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, VaultError::MalformedNote { .. }));
    }

    #[test]
    fn property_list_without_dict_is_malformed() {
        let doc = r#"<plist version="1.0"><array/></plist>"#;
        assert!(decode_note(doc.as_bytes()).is_err());
    }

    #[test]
    fn detects_leading_whitespace() {
        assert!(is_property_list(b"  \n<plist>"));
        assert!(!is_property_list(b"plist"));
    }
}
