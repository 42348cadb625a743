//! Canned extraction used when hosted model calls are skipped

use crate::types::{ExtractedEdge, ExtractedPair, ExtractionResult, RelationshipType};

fn pair(id: &str, question: &str, answer: &str, source: &str) -> ExtractedPair {
    ExtractedPair {
        id: id.to_string(),
        question: question.to_string(),
        answer: answer.to_string(),
        source_message_ids: vec![source.to_string()],
    }
}

fn edge(source: &str, target: &str, relationship_type: RelationshipType) -> ExtractedEdge {
    ExtractedEdge {
        source_pair_id: source.to_string(),
        target_pair_id: target.to_string(),
        relationship_type,
    }
}

/// One extraction with four pairs and two edges
pub fn mock_extractions() -> Vec<ExtractionResult> {
    vec![ExtractionResult {
        knowledge_pairs: vec![
            pair(
                "kp_1",
                "What are the tax implications of remote work?",
                "Remote work may affect state tax obligations depending on where you work and live.",
                "msg_1",
            ),
            pair(
                "kp_2",
                "How do I file for a business license?",
                "Contact your local city hall or county clerk's office for business license requirements.",
                "msg_2",
            ),
            pair(
                "kp_3",
                "Is the cost of a new office espresso machine for employee use a deductible business expense?",
                "Yes, an office espresso machine used to boost employee morale and productivity is generally a fully deductible business expense. Keep the receipt for your records.",
                "msg_3",
            ),
            pair(
                "kp_4",
                "What documentation do I need for business expense deductions?",
                "You need receipts, invoices, and proof of business purpose for all deductible expenses. Keep organized records for at least 3 years.",
                "msg_4",
            ),
        ],
        knowledge_edges: vec![
            edge("kp_1", "kp_2", RelationshipType::ExpandsOn),
            edge("kp_3", "kp_4", RelationshipType::Clarifies),
        ],
    }]
}
