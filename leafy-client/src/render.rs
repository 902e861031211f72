//! Plain-text rendering for the terminal front end

use crate::models::{format_percent, title_case, LabelEntry, PredictionResult, TrainingSession};
use crate::transport::Transport;
use crate::workflow::Notice;
use leafy_common::events::{LeafyEvent, Phase};
use std::fmt::Write;

/// Winning class, its confidence and the top alternatives
pub fn prediction_summary(result: &PredictionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Species:    {}", result.display_name());
    let _ = writeln!(out, "Confidence: {}", result.confidence_percent());

    let alternatives = result.top_alternatives();
    if !alternatives.is_empty() {
        let _ = writeln!(out, "Other possibilities:");
        for (name, probability) in alternatives {
            let _ = writeln!(out, "  {:<24} {:>6}", title_case(name), format_percent(probability));
        }
    }
    out
}

/// One-line session status, e.g. `[Training] mango: epoch 3/10`
pub fn phase_line(session: &TrainingSession) -> String {
    let label = if session.label.is_empty() {
        "-"
    } else {
        session.label.as_str()
    };
    if session.status_message.is_empty() {
        format!("[{}] {}", session.phase, label)
    } else {
        format!("[{}] {}: {}", session.phase, label, session.status_message)
    }
}

/// Preview references resolved to displayable URLs, numbered from 1
pub fn preview_list(transport: &Transport, images: &[String]) -> Vec<String> {
    images
        .iter()
        .enumerate()
        .map(|(i, image)| format!("{:>3}. {}", i + 1, transport.resolve_image_url(image)))
        .collect()
}

pub fn labels_list(labels: &[LabelEntry]) -> String {
    if labels.is_empty() {
        return "No trained labels".to_string();
    }
    labels
        .iter()
        .map(|entry| format!("  {}", title_case(&entry.name)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn notice_line(notice: &Notice) -> String {
    match notice {
        Notice::AlreadyTrained { label, message } => format!(
            "Warning: '{}' is already trained ({}). Choose a different name.",
            label, message
        ),
        Notice::Failure(message) => message.clone(),
    }
}

/// Progress line for a workflow event; `None` for events the CLI hides
pub fn event_line(event: &LeafyEvent) -> Option<String> {
    match event {
        LeafyEvent::SessionPhaseChanged {
            new_phase, message, ..
        } if new_phase.is_polling() || new_phase.is_terminal() => Some(progress(*new_phase, message)),
        LeafyEvent::SessionStatusUpdated { phase, message, .. } if !message.is_empty() => {
            Some(progress(*phase, message))
        }
        LeafyEvent::StatusPollFailed { error, .. } => {
            Some(format!("  (status check failed, retrying: {})", error))
        }
        LeafyEvent::LabelsRefreshed { labels, .. } => Some(format!("  {} trained labels", labels.len())),
        _ => None,
    }
}

fn progress(phase: Phase, message: &str) -> String {
    if message.is_empty() {
        format!("{}...", phase)
    } else {
        format!("{}: {}", phase, message)
    }
}
