//! Source endpoint: the email threads a knowledge pair came from, as HTML

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{KnowledgePair, ThreadWithMessages};

const STYLE: &str = r#"
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background: #f5f5f5; }
    .container { max-width: 800px; margin: 0 auto; background: white; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); overflow: hidden; }
    .header { background: #2563eb; color: white; padding: 20px; }
    .header h1 { margin: 0; font-size: 1.5rem; }
    .header p { margin: 10px 0 0 0; opacity: 0.9; }
    .summary { background: #f8fafc; padding: 20px; border-bottom: 1px solid #e2e8f0; }
    .qa-pair { background: white; padding: 15px; border-radius: 6px; border-left: 4px solid #2563eb; }
    .threads { padding: 20px; }
    .thread { margin-bottom: 30px; border: 1px solid #e2e8f0; border-radius: 8px; overflow: hidden; }
    .thread-header { background: #f1f5f9; padding: 15px; border-bottom: 1px solid #e2e8f0; }
    .thread-header h3 { margin: 0; color: #1e293b; }
    .message { padding: 15px; border-bottom: 1px solid #f1f5f9; }
    .message:last-child { border-bottom: none; }
    .message-header { margin-bottom: 10px; font-size: 0.9rem; color: #64748b; }
    .message-content { line-height: 1.6; color: #1e293b; white-space: pre-wrap; }
"#;

/// GET /api/source/:id - Render the pair and its source threads
pub async fn get_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let Some(pair) = state.db().get_knowledge_pair(&id)? else {
        return Ok((StatusCode::NOT_FOUND, "Knowledge pair not found").into_response());
    };

    let threads = state.db().source_threads_for_pair(&pair.id)?;
    tracing::debug!("Rendering {} source threads for pair {}", threads.len(), pair.id);

    Ok(Html(render_source_page(&pair, &threads)).into_response())
}

/// Escape text for HTML element content and attribute values
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn render_source_page(pair: &KnowledgePair, threads: &[ThreadWithMessages]) -> String {
    let mut threads_html = String::new();

    for entry in threads {
        threads_html.push_str(&format!(
            r#"<div class="thread"><div class="thread-header"><h3>Thread: {}</h3></div>"#,
            escape_html(&entry.thread.subject)
        ));

        for m in &entry.messages {
            threads_html.push_str(&format!(
                r#"<div class="message"><div class="message-header"><strong>From:</strong> {} | <strong>Date:</strong> {} | <strong>Message ID:</strong> {}</div><div class="message-content">{}</div></div>"#,
                escape_html(&m.author_email),
                m.message.sent_at.format("%Y-%m-%d %H:%M UTC"),
                escape_html(&m.message.original_message_id),
                escape_html(&m.message.content),
            ));
        }

        threads_html.push_str("</div>");
    }

    if threads.is_empty() {
        threads_html.push_str("<p>No source messages are linked to this knowledge pair.</p>");
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Original Email Thread - {title}</title>
<style>{style}</style>
</head>
<body>
<div class="container">
<div class="header"><h1>Original Email Thread</h1><p>Knowledge Pair ID: {id}</p></div>
<div class="summary"><h2>Knowledge Extracted</h2><div class="qa-pair"><strong>Question:</strong> {question}<br><strong>Answer:</strong> {answer}</div></div>
<div class="threads">{threads}</div>
</div>
</body>
</html>"#,
        title = escape_html(&pair.question),
        style = STYLE,
        id = escape_html(&pair.id),
        question = escape_html(&pair.question),
        answer = escape_html(&pair.answer),
        threads = threads_html,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x & y's")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; y&#39;s&quot;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    fn pair() -> KnowledgePair {
        KnowledgePair {
            id: "kp-1".to_string(),
            question: "Which form?".to_string(),
            answer: "Form <X>.".to_string(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_page_without_sources_has_note() {
        let html = render_source_page(&pair(), &[]);

        assert!(html.contains("No source messages are linked"));
        assert!(html.contains("<strong>Answer:</strong> Form &lt;X&gt;."));
    }

    #[test]
    fn test_page_lists_every_message_of_a_thread() {
        let thread = crate::types::Thread {
            id: "t-1".to_string(),
            subject: "Forms".to_string(),
        };
        let message = |original: &str, content: &str| crate::types::MessageWithAuthor {
            message: crate::types::Message {
                id: format!("id-{}", original),
                original_message_id: original.to_string(),
                content: content.to_string(),
                sent_at: chrono::Utc::now(),
                author_id: "u-1".to_string(),
                thread_id: thread.id.clone(),
            },
            author_email: "cpa@example.com".to_string(),
        };
        let threads = vec![ThreadWithMessages {
            thread: thread.clone(),
            messages: vec![message("msg_1", "Which form?"), message("msg_2", "Form X.")],
        }];

        let html = render_source_page(&pair(), &threads);

        assert_eq!(html.matches(r#"<div class="thread">"#).count(), 1);
        assert_eq!(html.matches(r#"<div class="message">"#).count(), 2);
        assert!(!html.contains("No source messages are linked"));
    }
}
