//! Dashboard exclusion policy

use expocrawl_core::DashboardMetadata;
use std::collections::BTreeSet;
use std::fmt;

/// Why a dashboard produces no exposure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// No project name: the dashboard lives in someone's personal space
    PersonalSpace,

    /// The project is on the ignore list
    IgnoredProject(String),
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PersonalSpace => f.write_str("personal space"),
            Self::IgnoredProject(project) => write!(f, "project '{}' is ignored", project),
        }
    }
}

/// Project-based exclusion
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    ignored_projects: BTreeSet<String>,
}

impl ExclusionPolicy {
    pub fn new(ignored_projects: impl IntoIterator<Item = String>) -> Self {
        Self {
            ignored_projects: ignored_projects.into_iter().collect(),
        }
    }

    pub fn check(&self, dashboard: &DashboardMetadata) -> Option<ExclusionReason> {
        match dashboard.project() {
            None => Some(ExclusionReason::PersonalSpace),
            Some(project) if self.ignored_projects.contains(project) => {
                Some(ExclusionReason::IgnoredProject(project.to_string()))
            }
            Some(_) => None,
        }
    }
}
