//! Email report model.

use crate::commit::CommitEvent;
use crate::staging::Attachment;

/// One email per reviewed commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailReport {
    /// Recipient, the commit author.
    pub to: String,
    /// Subject line including the short commit hash.
    pub subject: String,
    /// Plain-text body.
    pub body_text: String,
    /// HTML body.
    pub body_html: String,
    /// One attachment per analyzed file, in commit order.
    pub attachments: Vec<Attachment>,
}

impl EmailReport {
    /// Subject line for a commit.
    pub fn subject_for(short_id: &str) -> String {
        format!("Code Analysis and Commit Report - {short_id}")
    }

    /// Assembles the report for `commit` from its aggregated analysis text.
    pub fn for_commit(commit: &CommitEvent, analysis: &str, attachments: Vec<Attachment>) -> Self {
        let mut body_text = String::new();
        if analysis.trim().is_empty() {
            body_text.push_str("No file changes to analyze.\n\n");
        } else {
            body_text.push_str(analysis);
        }
        body_text.push_str(&format!("Commit Hash: {}\n", commit.id));
        if let Some(timestamp) = commit.timestamp {
            body_text.push_str(&format!("Committed: {}\n", timestamp.to_rfc3339()));
        }

        Self {
            to: commit.author_email.clone(),
            subject: Self::subject_for(commit.short_id()),
            body_html: text_to_html(&body_text),
            body_text,
            attachments,
        }
    }
}

/// Report section for one file.
pub fn analysis_section(path: &str, explanation: &str) -> String {
    format!("Analysis for {path}:\n{explanation}\n\n")
}

/// Escapes text for HTML and turns newlines into `<br>`.
pub fn text_to_html(text: &str) -> String {
    let mut html = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '&' => html.push_str("&amp;"),
            '<' => html.push_str("&lt;"),
            '>' => html.push_str("&gt;"),
            '"' => html.push_str("&quot;"),
            '\'' => html.push_str("&#39;"),
            '\n' => html.push_str("<br>"),
            _ => html.push(c),
        }
    }
    html
}
