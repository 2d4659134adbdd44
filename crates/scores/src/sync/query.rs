//! Logical query descriptors for sync runs

use crate::error::SyncError;

/// Default filter key for the active-scores variant
const DEFAULT_FILTER_KEY: &str = "this_year_score";
/// Default range: any score greater than zero
const DEFAULT_FILTER_VALUE: &str = "1,2147483647";

/// One logical upstream query. The three sync variants all walk the
/// same collection shape; they differ only in endpoint and filters.
#[derive(Debug, Clone)]
pub enum ScoreQuery {
    /// A single user's coalition memberships
    User { user_id: i64 },
    /// Every membership of one coalition
    Coalition {
        coalition_id: i64,
        max_pages: Option<u32>,
    },
    /// Globally-filtered scan of active memberships
    Active {
        filter_key: Option<String>,
        filter_value: Option<String>,
        max_pages: Option<u32>,
    },
}

impl ScoreQuery {
    /// Reject invalid descriptors before any network or storage work.
    pub fn validate(&self) -> Result<(), SyncError> {
        match self {
            Self::User { user_id } if *user_id <= 0 => {
                Err(SyncError::validation("user_id is required"))
            }
            Self::Coalition { coalition_id, .. } if *coalition_id <= 0 => {
                Err(SyncError::validation("coalition_id is required"))
            }
            _ => Ok(()),
        }
    }

    /// Endpoint path for this query.
    pub fn path(&self) -> String {
        match self {
            Self::User { user_id } => format!("/v2/users/{}/coalitions_users", user_id),
            Self::Coalition { .. } | Self::Active { .. } => "/v2/coalitions_users".to_string(),
        }
    }

    /// Filter parameters appended to every page request.
    pub fn params(&self) -> Vec<(String, String)> {
        match self {
            Self::User { .. } => Vec::new(),
            Self::Coalition { coalition_id, .. } => vec![(
                "filter[coalition_id]".to_string(),
                coalition_id.to_string(),
            )],
            Self::Active {
                filter_key,
                filter_value,
                ..
            } => {
                let key = filter_key.as_deref().unwrap_or(DEFAULT_FILTER_KEY);
                let value = filter_value.as_deref().unwrap_or(DEFAULT_FILTER_VALUE);
                vec![(format!("range[{}]", key), value.to_string())]
            }
        }
    }

    /// Page cap, set only for the scan variants.
    pub fn max_pages(&self) -> Option<u32> {
        match self {
            Self::User { .. } => None,
            Self::Coalition { max_pages, .. } | Self::Active { max_pages, .. } => *max_pages,
        }
    }

    /// Short label for logs and sink events.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Coalition { .. } => "coalition",
            Self::Active { .. } => "active",
        }
    }
}
