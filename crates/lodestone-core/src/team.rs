//! Optional team integration.
//!
//! Team support comes from an unversioned host plugin that may or may not
//! be installed. The directory is bound once at startup; if binding fails
//! the integration stays absent for the life of the process.

use std::fmt;
use std::sync::Arc;

use lodestone_types::ActorId;
use rust_decimal::Decimal;

use crate::collab::{CollaboratorError, Ledger};

/// Opaque team identifier as reported by the team plugin.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TeamId(pub String);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves an actor to their team.
pub trait TeamLookup: Send + Sync {
    /// The actor's team, if they have one.
    fn resolve_team(&self, actor_id: ActorId) -> Option<TeamId>;
}

/// Lists the members of a team.
pub trait TeamMembers: Send + Sync {
    /// Every member of `team`.
    fn members(&self, team: &TeamId) -> Vec<ActorId>;
}

/// Both team capabilities from one plugin.
pub trait TeamProvider: TeamLookup + TeamMembers {}

impl<T: TeamLookup + TeamMembers> TeamProvider for T {}

/// The team plugin binding, resolved once.
#[derive(Clone, Default)]
pub enum TeamDirectory {
    /// The plugin answered the startup probe.
    Bound(Arc<dyn TeamProvider>),
    /// No plugin, or the probe failed.
    #[default]
    Absent,
}

impl fmt::Debug for TeamDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bound(_) => f.write_str("TeamDirectory::Bound"),
            Self::Absent => f.write_str("TeamDirectory::Absent"),
        }
    }
}

impl TeamDirectory {
    /// Run `probe` once. Any error collapses to [`TeamDirectory::Absent`].
    pub fn bind<F, E>(probe: F) -> Self
    where
        F: FnOnce() -> Result<Arc<dyn TeamProvider>, E>,
        E: fmt::Display,
    {
        match probe() {
            Ok(provider) => {
                tracing::info!("Team integration bound");
                Self::Bound(provider)
            }
            Err(e) => {
                tracing::info!(reason = %e, "Team integration absent");
                Self::Absent
            }
        }
    }

    /// Whether a team plugin is bound.
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Bound(_))
    }

    /// The actor's team, or `None` without a plugin.
    pub fn team_of(&self, actor_id: ActorId) -> Option<TeamId> {
        match self {
            Self::Bound(provider) => provider.resolve_team(actor_id),
            Self::Absent => None,
        }
    }

    /// The actor's teammates, themselves included. Without a team this is
    /// just the actor.
    pub fn group_of(&self, actor_id: ActorId) -> Vec<ActorId> {
        let Self::Bound(provider) = self else {
            return vec![actor_id];
        };
        let Some(team) = provider.resolve_team(actor_id) else {
            return vec![actor_id];
        };
        let mut members = provider.members(&team);
        if !members.contains(&actor_id) {
            members.push(actor_id);
        }
        members.sort_unstable();
        members.dedup();
        members
    }
}

/// Combined ledger balance of the actor's team (or the actor alone).
pub fn team_balance(
    directory: &TeamDirectory,
    ledger: &dyn Ledger,
    actor_id: ActorId,
) -> Result<Decimal, CollaboratorError> {
    directory
        .group_of(actor_id)
        .into_iter()
        .try_fold(Decimal::ZERO, |total, member| {
            Ok(total.saturating_add(ledger.balance(member)?))
        })
}
