//! Reorder request payloads.
//!
//! Drag-and-drop clients post the new order as a JSON list of row ids. Some
//! send numbers, some send the ids as strings read back from the DOM, so both
//! are accepted:
//!
//! ```json
//! { "order": [12, "7", 31] }
//! ```

use crate::error::{OrderingError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRequest {
    #[serde(default)]
    order: Vec<RawId>,
}

/// A parsed reorder request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderRequest<Id> {
    pub order: Vec<Id>,
}

impl<Id: From<i64>> ReorderRequest<Id> {
    /// Parse a JSON request body.
    ///
    /// # Errors
    /// `MalformedInput` if the body is not `{"order": [...]}`, an entry is not
    /// an integer (or an integer string), or the list is longer than `max_len`.
    pub fn from_json(body: &[u8], max_len: usize) -> Result<Self> {
        let raw: RawRequest = serde_json::from_slice(body)
            .map_err(|e| OrderingError::malformed("order", e.to_string()))?;

        if raw.order.len() > max_len {
            return Err(OrderingError::malformed(
                "order",
                format!("{} ids exceeds the maximum of {}", raw.order.len(), max_len),
            ));
        }

        let order = raw
            .order
            .into_iter()
            .enumerate()
            .map(|(index, id)| match id {
                RawId::Int(value) => Ok(Id::from(value)),
                RawId::Text(text) => text.trim().parse::<i64>().map(Id::from).map_err(|_| {
                    OrderingError::malformed(
                        "order",
                        format!("entry {} is not an integer id: {:?}", index, text),
                    )
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { order })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlaylistItemId;

    fn parse(body: &str) -> Result<ReorderRequest<PlaylistItemId>> {
        ReorderRequest::from_json(body.as_bytes(), 10)
    }

    #[test]
    fn test_accepts_numbers_and_numeric_strings() {
        let request = parse(r#"{"order": [3, "1", " 2 "]}"#).unwrap();
        assert_eq!(
            request.order,
            vec![PlaylistItemId(3), PlaylistItemId(1), PlaylistItemId(2)]
        );
    }

    #[test]
    fn test_missing_order_is_empty() {
        let request = parse("{}").unwrap();
        assert!(request.order.is_empty());
    }

    #[test]
    fn test_rejects_non_integer_entries() {
        for body in [
            r#"{"order": ["abc"]}"#,
            r#"{"order": [1.5]}"#,
            r#"{"order": [null]}"#,
            r#"{"order": 5}"#,
            r#"[1, 2]"#,
            r#"{"order": [1], "extra": true}"#,
            "not json",
        ] {
            assert!(
                matches!(parse(body), Err(OrderingError::MalformedInput { .. })),
                "accepted {}",
                body
            );
        }
    }

    #[test]
    fn test_rejects_oversized_request() {
        let ids: Vec<String> = (0..11).map(|i| i.to_string()).collect();
        let body = format!(r#"{{"order": [{}]}}"#, ids.join(","));
        assert!(matches!(
            parse(&body),
            Err(OrderingError::MalformedInput { .. })
        ));
    }
}
