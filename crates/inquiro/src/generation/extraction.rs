//! Parsing of knowledge-extraction replies

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::types::ExtractionResult;

/// First `{` through last `}`; models often wrap JSON in markdown fences
static JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid JSON object regex"));

/// Parse the extraction model's reply into an `ExtractionResult`
pub fn parse_extraction(reply: &str) -> Result<ExtractionResult> {
    let json = JSON_OBJECT
        .find(reply)
        .ok_or_else(|| Error::Extraction("No JSON object in model reply".to_string()))?;

    serde_json::from_str(json.as_str())
        .map_err(|e| Error::Extraction(format!("Invalid extraction JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RelationshipType;

    #[test]
    fn test_parses_fenced_json() {
        let reply = r#"Here is the result:
```json
{
  "knowledgePairs": [
    { "id": "kp_1", "question": "Q?", "answer": "A.", "source_message_ids": ["msg_1"] },
    { "id": "kp_2", "question": "Q2?", "answer": "A2.", "source_message_ids": [] }
  ],
  "knowledgeEdges": [
    { "sourcePairId": "kp_2", "targetPairId": "kp_1", "relationshipType": "CLARIFIES" }
  ]
}
```"#;

        let result = parse_extraction(reply).unwrap();
        assert_eq!(result.knowledge_pairs.len(), 2);
        assert_eq!(
            result.knowledge_edges[0].relationship_type,
            RelationshipType::Clarifies
        );
    }

    #[test]
    fn test_no_json_is_extraction_error() {
        let err = parse_extraction("Sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn test_malformed_json_is_extraction_error() {
        let err = parse_extraction("{ \"knowledgePairs\": [ }").unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }
}
