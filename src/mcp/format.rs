//! Formatting helpers for MCP tool output

use crate::mapper::{ContactRecord, EventRecord, MessageRecord};

pub fn format_list(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

pub fn format_message_summary(m: &MessageRecord) -> String {
    let unread = if m.flags.read { "" } else { " [UNREAD]" };
    let attachment = if m.flags.has_attachment {
        " [attachment]"
    } else {
        ""
    };
    let flagged = if m.flags.flagged { " [flagged]" } else { "" };

    format!(
        "{}{}{}\n\
        ID: {}\n\
        From: {}\n\
        Subject: {}\n\
        Date: {}\n\
        Preview: {}",
        unread,
        attachment,
        flagged,
        m.id,
        format_list(&m.from),
        m.subject.as_deref().unwrap_or("(no subject)"),
        m.received_at.as_deref().unwrap_or("unknown"),
        m.preview.as_deref().unwrap_or("")
    )
}

pub fn format_message_full(m: &MessageRecord) -> String {
    format!(
        "ID: {}\n\
        Thread ID: {}\n\
        From: {}\n\
        To: {}\n\
        CC: {}\n\
        Subject: {}\n\
        Date: {}\n\
        Sent: {}\n\
        Read: {}\n\
        Has Attachment: {}\n\n\
        --- Body ---\n\
        {}",
        m.id,
        m.thread_id.as_deref().unwrap_or("(none)"),
        format_list(&m.from),
        format_list(&m.to),
        format_list(&m.cc),
        m.subject.as_deref().unwrap_or("(no subject)"),
        m.received_at.as_deref().unwrap_or("unknown"),
        m.sent_at.as_deref().unwrap_or("unknown"),
        m.flags.read,
        m.flags.has_attachment,
        m.body.as_deref().unwrap_or("")
    )
}

pub fn format_contact(c: &ContactRecord) -> String {
    let mut lines = vec![
        if c.name.is_empty() {
            "(unnamed)".to_string()
        } else {
            c.name.clone()
        },
        format!("ID: {}", c.id),
    ];
    if !c.emails.is_empty() {
        lines.push(format!("Email: {}", c.emails.join(", ")));
    }
    if !c.phones.is_empty() {
        lines.push(format!("Phone: {}", c.phones.join(", ")));
    }
    if !c.organizations.is_empty() {
        lines.push(format!("Organization: {}", c.organizations.join(", ")));
    }
    lines.join("\n")
}

pub fn format_event(e: &EventRecord) -> String {
    let mut title = e.title.clone().unwrap_or_else(|| "(untitled)".to_string());
    if e.flags.all_day {
        title.push_str(" [all day]");
    }
    if e.flags.recurring {
        title.push_str(" [recurring]");
    }

    let mut lines = vec![
        title,
        format!("ID: {}", e.id),
        format!("Start: {}", e.start.as_deref().unwrap_or("unknown")),
    ];
    if let Some(ref end) = e.end {
        lines.push(format!("End: {}", end));
    }
    if let Some(ref location) = e.location {
        lines.push(format!("Location: {}", location));
    }
    if let Some(ref organizer) = e.organizer {
        lines.push(format!("Organizer: {}", organizer));
    }
    lines.join("\n")
}
