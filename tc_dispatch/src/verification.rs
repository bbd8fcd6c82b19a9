/*
Telecommand verification tracking.

Every telecommand put on the wire is registered under its request id. As
service 1 reports trickle back, in whatever order the link delivers them,
the tracked status accumulates acceptance / start / step / completion
outcomes. Cleanup is caller driven: entries stay until remove_tc.
*/

use pus_packets::{RequestId, VerificationStage, VerificationTm};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusField {
    #[default]
    Unset,
    Success,
    Failure,
}

/// Accumulated verification outcome for one outstanding telecommand
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VerificationStatus {
    pub accepted: StatusField,
    pub started: StatusField,
    pub step: StatusField,
    pub step_list: Vec<u8>,
    pub completed: StatusField,
}

impl VerificationStatus {
    pub fn all_succeeded(&self) -> bool {
        self.accepted == StatusField::Success
            && self.started == StatusField::Success
            && self.step != StatusField::Failure
            && self.completed == StatusField::Success
    }

    pub fn any_failed(&self) -> bool {
        self.accepted == StatusField::Failure
            || self.started == StatusField::Failure
            || self.step == StatusField::Failure
            || self.completed == StatusField::Failure
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// Two in-flight telecommands with the same request id would make their
    /// reports indistinguishable, so this is treated as a caller bug
    #[error("request id {0} is already being tracked")]
    DuplicateRequestId(RequestId),
}

#[derive(Debug, Default)]
pub struct VerificationTracker {
    tracked: HashMap<RequestId, VerificationStatus>,
}

impl VerificationTracker {
    pub fn new() -> VerificationTracker {
        VerificationTracker {
            tracked: HashMap::new(),
        }
    }

    /// Register a freshly sent telecommand
    pub fn add_tc(&mut self, request_id: RequestId) -> Result<(), VerificationError> {
        if self.tracked.contains_key(&request_id) {
            return Err(VerificationError::DuplicateRequestId(request_id));
        }
        self.tracked.insert(request_id, VerificationStatus::default());
        Ok(())
    }

    /// Fold one verification report into the tracked status. Returns `None`
    /// for reports with no matching outstanding telecommand (stray or late
    /// telemetry, the caller logs and moves on) and never creates an entry
    /// for them.
    pub fn add_tm(&mut self, report: &VerificationTm) -> Option<VerificationStatus> {
        let status = self.tracked.get_mut(&report.request_id)?;
        let outcome = if report.success {
            StatusField::Success
        } else {
            StatusField::Failure
        };
        match report.stage {
            VerificationStage::Acceptance => status.accepted = outcome,
            VerificationStage::Start => status.started = outcome,
            VerificationStage::Step => {
                // A failed step stays failed even if later steps succeed
                if status.step != StatusField::Failure {
                    status.step = outcome;
                }
                if let Some(step_num) = report.step {
                    if !status.step_list.contains(&step_num) {
                        status.step_list.push(step_num);
                    }
                }
            }
            VerificationStage::Completion => status.completed = outcome,
        }
        Some(status.clone())
    }

    pub fn status_of(&self, request_id: RequestId) -> Option<&VerificationStatus> {
        self.tracked.get(&request_id)
    }

    /// Caller driven cleanup, typically once completion has been reported
    pub fn remove_tc(&mut self, request_id: RequestId) -> Option<VerificationStatus> {
        self.tracked.remove(&request_id)
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }
}

const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_RED: &str = "\x1b[31m";
const ANSI_RESET: &str = "\x1b[0m";

fn glyph(field: StatusField, color: bool) -> String {
    let (plain, ansi) = match field {
        StatusField::Unset => ("-", ""),
        StatusField::Success => ("✓", ANSI_GREEN),
        StatusField::Failure => ("✗", ANSI_RED),
    };
    if color && !ansi.is_empty() {
        format!("{}{}{}", ansi, plain, ANSI_RESET)
    } else {
        plain.to_string()
    }
}

/// Render one fixed-width progress line for a tracked telecommand
pub fn format_progress(status: &VerificationStatus, request_id: RequestId, color: bool) -> String {
    let steps = if status.step_list.is_empty() {
        "   ".to_string()
    } else {
        format!("{:3}", status.step_list.last().unwrap())
    };
    let mark = if status.all_succeeded() { " ✔" } else { "" };
    format!(
        "TC {} | acc {} sta {} stp {}{} fin {}{}",
        request_id,
        glyph(status.accepted, color),
        glyph(status.started, color),
        glyph(status.step, color),
        steps,
        glyph(status.completed, color),
        mark
    )
}
