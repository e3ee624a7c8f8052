//! Role detection from git authorship.
//!
//! Classifies the configured user into the fixed role taxonomy from the
//! per-author commit distribution. Classification is deterministic given
//! the log; boundary percentages resolve to the more senior role.

use std::collections::HashMap;

use crate::analysis::git::CommitRecord;
use crate::core::config::UserIdentity;
use crate::core::model::Role;

/// Contribution share at or above which the user leads the project.
const LEAD_PCT: f64 = 60.0;

/// Lower bound of the co-lead band.
const CO_LEAD_PCT: f64 = 40.0;

/// Share another author must hold for the user to be a co-lead rather
/// than the de-facto lead.
const CO_LEAD_PARTNER_PCT: f64 = 25.0;

/// Lower bound of the contributor band.
const CONTRIBUTOR_PCT: f64 = 10.0;

/// Outcome of role detection for one project.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleDetection {
    /// Classified role
    pub role: Role,
    /// User contribution percentage, 0..=100
    pub contribution_pct: f64,
    /// One-sentence justification stating the counts used
    pub justification: String,
    /// Two or more distinct authors
    pub is_collaborative: bool,
}

impl RoleDetection {
    /// Detection result for a project without usable git history.
    pub fn unknown() -> Self {
        Self {
            role: Role::Unknown,
            contribution_pct: 0.0,
            justification: "No git history available to attribute contributions.".to_string(),
            is_collaborative: false,
        }
    }
}

/// Classify the user's role from a commit log.
pub fn detect_role(commits: &[CommitRecord], identity: &UserIdentity) -> RoleDetection {
    if commits.is_empty() {
        return RoleDetection::unknown();
    }

    // Distinct authors keyed case-insensitively by (name, email).
    let mut per_author: HashMap<(String, String), usize> = HashMap::new();
    let mut user_commits = 0usize;
    for commit in commits {
        let key = (
            commit.author_name.to_ascii_lowercase(),
            commit.author_email.to_ascii_lowercase(),
        );
        *per_author.entry(key).or_default() += 1;
        if identity.matches(&commit.author_name, &commit.author_email) {
            user_commits += 1;
        }
    }

    let total = commits.len();
    let author_count = per_author.len();
    let is_collaborative = author_count >= 2;
    let contribution_pct = user_commits as f64 / total as f64 * 100.0;

    if user_commits == 0 {
        return RoleDetection {
            role: Role::Unknown,
            contribution_pct: 0.0,
            justification: format!(
                "None of the {total} commits match the configured author identity."
            ),
            is_collaborative,
        };
    }

    let role = if !is_collaborative {
        Role::SoloDeveloper
    } else if contribution_pct >= LEAD_PCT {
        Role::LeadDeveloper
    } else if contribution_pct >= CO_LEAD_PCT {
        // Co-lead while any other author carries a comparable share; once
        // every partner dilutes below the bar the user is the de-facto
        // lead of the band.
        let strong_partners = per_author
            .iter()
            .filter(|(key, _)| !identity.matches(&key.0, &key.1))
            .filter(|(_, count)| **count as f64 / total as f64 * 100.0 >= CO_LEAD_PARTNER_PCT)
            .count();
        if strong_partners == 0 {
            Role::LeadDeveloper
        } else {
            Role::CoLead
        }
    } else if contribution_pct >= CONTRIBUTOR_PCT {
        Role::Contributor
    } else {
        Role::MinorContributor
    };

    let justification = format!(
        "User authored {user_commits}/{total} commits ({contribution_pct:.1}%) among {author_count} author{}.",
        if author_count == 1 { "" } else { "s" }
    );

    RoleDetection {
        role,
        contribution_pct,
        justification,
        is_collaborative,
    }
}
