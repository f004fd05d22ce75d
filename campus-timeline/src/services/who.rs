//! Who-filter
//!
//! Resolves which publishers a timeline shows: the viewer only, the viewer
//! plus everyone they follow, or everyone. The followed set is materialized
//! once per assembly pass as a temporary relation on the pass connection.

use crate::database::{FeedPass, PublisherFilter, Repository, UserId};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of whoever requests a timeline, resolved upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Viewer {
    Anonymous,
    User(UserId),
}

impl Viewer {
    pub fn user_id(self) -> Option<UserId> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(id) => Some(id),
        }
    }

    /// The authenticated user, or `Forbidden` naming the refused action
    pub fn require(self, action: &str) -> Result<UserId> {
        self.user_id()
            .ok_or_else(|| AppError::forbidden(format!("{} requires a logged-in user", action)))
    }
}

/// Publisher set of the global timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum Who {
    Me = 1,
    Followed = 2,
    All = 3,
}

impl Who {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Who::Me),
            2 => Some(Who::Followed),
            3 => Some(Who::All),
            _ => None,
        }
    }
}

impl FromStr for Who {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "me" | "self" => Ok(Who::Me),
            "followed" => Ok(Who::Followed),
            "all" => Ok(Who::All),
            other => Err(AppError::InvalidSetting(format!("unknown who-filter: {}", other))),
        }
    }
}

impl fmt::Display for Who {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Who::Me => write!(f, "me"),
            Who::Followed => write!(f, "followed"),
            Who::All => write!(f, "all"),
        }
    }
}

/// Which timeline is being assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelineScope {
    /// The global timeline filtered by publisher set
    Global(Who),
    /// A user's profile timeline
    User(UserId),
}

#[derive(Clone)]
pub struct WhoFilter {
    repo: Repository,
    default_who: Who,
}

impl WhoFilter {
    pub fn new(repo: Repository, default_who: Who) -> Self {
        Self { repo, default_who }
    }

    /// Last who-filter chosen by a user, or the configured default
    pub async fn preferred(&self, user: UserId) -> Result<Who> {
        let stored = self.repo.get_who_preference(user).await?;

        Ok(stored.and_then(Who::from_code).unwrap_or(self.default_who))
    }

    pub async fn set_preferred(&self, user: UserId, who: Who) -> Result<()> {
        tracing::debug!("User {} prefers the {} timeline", user, who);
        self.repo.set_who_preference(user, who.code()).await
    }

    /// Check the viewer may see `scope` and install its publisher predicate
    /// on the pass. FOLLOWED loads the relation once for the whole pass.
    pub async fn apply(&self, pass: &mut FeedPass, viewer: Viewer, scope: TimelineScope) -> Result<PublisherFilter> {
        let filter = match scope {
            TimelineScope::User(user) => PublisherFilter::Only(user),
            TimelineScope::Global(Who::All) => PublisherFilter::Any,
            TimelineScope::Global(Who::Me) => {
                PublisherFilter::Only(viewer.require("viewing your own timeline")?)
            }
            TimelineScope::Global(Who::Followed) => {
                let user = viewer.require("viewing followed users")?;
                let size = pass.load_followed(user).await?;
                tracing::debug!("Loaded {} publishers for user {}", size, user);
                PublisherFilter::Relation
            }
        };

        pass.set_filter(filter);

        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repository::test_support::create_test_repo;

    #[test]
    fn test_who_parsing() {
        assert_eq!("followed".parse::<Who>().unwrap(), Who::Followed);
        assert_eq!(" ALL ".parse::<Who>().unwrap(), Who::All);
        assert_eq!("self".parse::<Who>().unwrap(), Who::Me);
        assert!("friends".parse::<Who>().is_err());
        assert_eq!(Who::from_code(0), None);
        assert_eq!(Who::from_code(Who::Me.code()), Some(Who::Me));
    }

    #[tokio::test]
    async fn test_preferred_falls_back_to_default() {
        let repo = create_test_repo().await;
        let filter = WhoFilter::new(repo, Who::Followed);

        assert_eq!(filter.preferred(4).await.unwrap(), Who::Followed);

        filter.set_preferred(4, Who::All).await.unwrap();
        assert_eq!(filter.preferred(4).await.unwrap(), Who::All);
    }

    #[tokio::test]
    async fn test_anonymous_viewer_scopes() {
        let repo = create_test_repo().await;
        let filter = WhoFilter::new(repo.clone(), Who::Followed);
        let mut pass = FeedPass::begin(repo.pool()).await.unwrap();

        let denied = filter
            .apply(&mut pass, Viewer::Anonymous, TimelineScope::Global(Who::Followed))
            .await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));

        let denied = filter
            .apply(&mut pass, Viewer::Anonymous, TimelineScope::Global(Who::Me))
            .await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));

        let all = filter
            .apply(&mut pass, Viewer::Anonymous, TimelineScope::Global(Who::All))
            .await
            .unwrap();
        assert_eq!(all, PublisherFilter::Any);

        let profile = filter
            .apply(&mut pass, Viewer::Anonymous, TimelineScope::User(9))
            .await
            .unwrap();
        assert_eq!(profile, PublisherFilter::Only(9));

        pass.finish().await;
    }
}
