//! Human-readable chat text.

use crate::errors::ApprovalError;
use crate::models::approval::{Approval, ApprovalStatus, Decision};

use super::commands::{APPROVE_ALIAS, APPROVE_KEYWORD, REJECT_KEYWORD};

pub fn approval_request(approval: &Approval) -> String {
    let mut text = format!(
        ":rotating_light: *Approval required* :rotating_light:\n\n\
         Update for `{id}`: {delta}\n",
        id = approval.identifier,
        delta = approval.delta(),
    );
    if !approval.message.is_empty() {
        text.push_str(&format!("> {}\n", approval.message));
    }
    text.push_str(&format!(
        "Votes: {received}/{required}   Deadline: {deadline}\n\n\
         Reply `{approve} {id}` (or `{alias} {id}`) to approve, `{reject} {id}` to block it.",
        received = approval.votes_received,
        required = approval.votes_required,
        deadline = approval.expires_at.format("%Y-%m-%d %H:%M UTC"),
        approve = APPROVE_KEYWORD,
        alias = APPROVE_ALIAS,
        reject = REJECT_KEYWORD,
        id = approval.identifier,
    ));
    text
}

pub fn vote_result(approval: &Approval, voter: &str, decision: Decision) -> String {
    match (approval.status(), decision) {
        (ApprovalStatus::Rejected, _) => format!(
            ":no_entry: `{}` rejected by <@{}>. {} will not be rolled out.",
            approval.identifier,
            voter,
            approval.delta()
        ),
        (ApprovalStatus::Approved, _) => format!(
            ":white_check_mark: `{}` approved ({}/{} votes). Rolling out {}.",
            approval.identifier,
            approval.votes_received,
            approval.votes_required,
            approval.delta()
        ),
        (_, _) => format!(
            ":ballot_box_with_check: <@{}> approved `{}` ({}/{} votes, {} more needed).",
            voter,
            approval.identifier,
            approval.votes_received,
            approval.votes_required,
            approval.votes_required.saturating_sub(approval.votes_received)
        ),
    }
}

pub fn vote_error(err: &ApprovalError, identifier: &str) -> String {
    match err {
        ApprovalError::NotFound(_) => format!(
            ":warning: No pending approval for `{}`. It may have expired.",
            identifier
        ),
        ApprovalError::AlreadyFinalized { status, .. } => format!(
            ":warning: `{}` is already {}; vote ignored.",
            identifier, status
        ),
        ApprovalError::AlreadyVoted { voter, .. } => format!(
            ":warning: <@{}> already voted on `{}`.",
            voter, identifier
        ),
        _ => format!(
            ":x: Could not record vote for `{}`, please try again.",
            identifier
        ),
    }
}

pub fn help(bot_name: &str) -> String {
    format!(
        "*{bot}* collects votes on deployment updates.\n\
         • `{approve} <identifier>` or `{alias} <identifier>`: vote for an update\n\
         • `{reject} <identifier>`: block an update (a single reject is final)\n\
         Identifiers look like `provider/repo:tag`.",
        bot = bot_name,
        approve = APPROVE_KEYWORD,
        alias = APPROVE_ALIAS,
        reject = REJECT_KEYWORD,
    )
}
