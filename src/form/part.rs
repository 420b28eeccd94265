//! Converted form parts, the elements of the output JSON array.

use serde::{Deserialize, Serialize};

/// Tag distinguishing text fields from base64-encoded files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartKind {
    #[serde(rename = "field/text")]
    Text,
    #[serde(rename = "file/base64")]
    File,
}

impl PartKind {
    /// Wire name of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            PartKind::Text => "field/text",
            PartKind::File => "file/base64",
        }
    }
}

/// One submitted field value or uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: PartKind,

    /// Raw text for fields, standard base64 for files.
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl Part {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PartKind::Text,
            value: value.into(),
            content_type: None,
            file_name: None,
        }
    }

    pub fn file(
        name: impl Into<String>,
        encoded: String,
        content_type: Option<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: PartKind::File,
            value: encoded,
            content_type,
            file_name: Some(file_name.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_part_shape() {
        let part = Part::text("name", "Alice");
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({"name": "name", "type": "field/text", "value": "Alice"})
        );
    }

    #[test]
    fn test_file_part_shape() {
        let part = Part::file("avatar", "UE5HREFUQQ==".into(), Some("image/png".into()), "avatar.png");
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({
                "name": "avatar",
                "type": "file/base64",
                "value": "UE5HREFUQQ==",
                "content_type": "image/png",
                "file_name": "avatar.png"
            })
        );
    }

    #[test]
    fn test_empty_value_is_kept() {
        let value = serde_json::to_value(Part::text("note", "")).unwrap();
        assert_eq!(value["value"], "");
    }

    #[test]
    fn test_kind_wire_names_match_serde() {
        for kind in [PartKind::Text, PartKind::File] {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
        }
    }
}
