pub mod browse;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod governor;
pub mod maintenance;
pub mod store;

use std::sync::Arc;

pub use browse::BrowseFilter;
pub use config::{Config, MaintenanceConfig, RateLimitConfig, StoreConfig};
pub use engine::{ActorStats, Engine, InterestOutcome};
pub use error::{CoreError, CoreResult};
pub use events::MatchedEvent;
pub use governor::{ActionKind, Admission, RateGovernor};
pub use maintenance::Maintenance;
pub use store::{Profile, Store, StoreHealth};

pub type ActorId = i64;

/// A quota-consuming request from the front-end, already parsed into a
/// typed value; the core never interprets routing strings.
#[derive(Debug, Clone)]
pub enum Action {
    Browse {
        actor: ActorId,
        filter: Option<BrowseFilter>,
    },
    Like {
        actor: ActorId,
        target: ActorId,
    },
    Pass {
        actor: ActorId,
        target: ActorId,
    },
    Withdraw {
        actor: ActorId,
        target: ActorId,
    },
}

impl Action {
    pub fn actor(&self) -> ActorId {
        match *self {
            Action::Browse { actor, .. }
            | Action::Like { actor, .. }
            | Action::Pass { actor, .. }
            | Action::Withdraw { actor, .. } => actor,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Browse { .. } => ActionKind::Browse,
            Action::Like { .. } => ActionKind::Like,
            Action::Pass { .. } => ActionKind::Pass,
            Action::Withdraw { .. } => ActionKind::Withdraw,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Candidate(Profile),
    NoCandidates,
    Recorded,
    Matched,
    Withdrawn,
    Denied(Admission),
}

/// The assembled core: store, interaction engine and rate governor, built
/// once at startup and shared by handle.
#[derive(Clone)]
pub struct Core {
    store: Store,
    engine: Engine,
    governor: Arc<RateGovernor>,
}

impl Core {
    pub async fn open(cfg: &Config) -> CoreResult<Self> {
        let store = Store::open(&cfg.store).await?;
        let engine = Engine::new(store.clone());
        let governor = Arc::new(RateGovernor::new(cfg.rate.clone()));
        Ok(Self {
            store,
            engine,
            governor,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn governor(&self) -> &RateGovernor {
        &self.governor
    }

    pub fn start_maintenance(&self, cfg: &MaintenanceConfig) -> Maintenance {
        Maintenance::start(self.store.clone(), Arc::clone(&self.governor), cfg.clone())
    }

    /// Admission first, then dispatch: a rejected or banned actor never
    /// reaches the transactional path.
    pub async fn submit(&self, action: Action) -> CoreResult<Outcome> {
        match self.governor.admit(action.actor(), action.kind()) {
            Admission::Allowed => {}
            denied => return Ok(Outcome::Denied(denied)),
        }

        match action {
            Action::Browse { actor, filter } => {
                Ok(
                    match browse::select_candidate(&self.store, actor, filter.as_ref()).await? {
                        Some(profile) => Outcome::Candidate(profile),
                        None => Outcome::NoCandidates,
                    },
                )
            }
            Action::Like { actor, target } => {
                Ok(match self.engine.express_interest(actor, target).await? {
                    InterestOutcome::Recorded => Outcome::Recorded,
                    InterestOutcome::Matched => Outcome::Matched,
                })
            }
            Action::Pass { actor, target } => {
                self.engine.pass(actor, target).await?;
                Ok(Outcome::Recorded)
            }
            Action::Withdraw { actor, target } => {
                self.engine.withdraw(actor, target).await?;
                Ok(Outcome::Withdrawn)
            }
        }
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
