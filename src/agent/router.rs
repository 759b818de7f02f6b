//! Credential routing: which lane backs which agent role.

use super::{Agent, AgentRole, Lane, ToolContext};
use crate::config::{AgentSettings, Prompts, RoutingSettings, Settings};
use crate::error::{Result, StudyError};
use crate::llm::{ChatModel, QuotaSafeInvoker, RequestPacer, RetryPolicy};
use crate::openai::OpenAIChatModel;
use crate::relay::RelaySender;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Roles each lane must carry.
pub const ROLES_PER_LANE: usize = 3;

/// The two shared lane models.
#[derive(Clone)]
pub struct LaneModels {
    pub a: Arc<dyn ChatModel>,
    pub b: Arc<dyn ChatModel>,
}

impl LaneModels {
    /// Connect both lanes from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            a: Arc::new(OpenAIChatModel::from_lane(&settings.lanes.a)?),
            b: Arc::new(OpenAIChatModel::from_lane(&settings.lanes.b)?),
        })
    }

    pub fn get(&self, lane: Lane) -> Arc<dyn ChatModel> {
        match lane {
            Lane::A => self.a.clone(),
            Lane::B => self.b.clone(),
        }
    }
}

/// Static role-to-lane assignment, validated once at startup.
pub struct CredentialRouter {
    routing: RoutingSettings,
    models: LaneModels,
    policy: RetryPolicy,
    agents: AgentSettings,
}

impl CredentialRouter {
    /// Build the router, rejecting an invalid routing table.
    pub fn new(
        routing: RoutingSettings,
        models: LaneModels,
        policy: RetryPolicy,
        agents: AgentSettings,
    ) -> Result<Self> {
        Self::validate(&routing)?;

        for lane in [Lane::A, Lane::B] {
            if models.get(lane).model_name().trim().is_empty() {
                return Err(StudyError::Config(format!("lane {} has no model configured", lane)));
            }
        }

        for lane in [Lane::A, Lane::B] {
            let roles: Vec<_> = routing.roles_on(lane).iter().map(|r| r.title()).collect();
            info!(
                "Lane {} ({}) serves: {}",
                lane,
                models.get(lane).model_name(),
                roles.join(", ")
            );
        }

        Ok(Self {
            routing,
            models,
            policy,
            agents,
        })
    }

    /// Each lane carries three roles, and synthesis runs on the quality lane.
    pub fn validate(routing: &RoutingSettings) -> Result<()> {
        if routing.lane_for(AgentRole::StudyCoordinator) != Lane::B {
            return Err(StudyError::Config(
                "routing.study_coordinator must use lane \"b\" (the quality lane)".to_string(),
            ));
        }
        for lane in [Lane::A, Lane::B] {
            let count = routing.roles_on(lane).len();
            if count != ROLES_PER_LANE {
                return Err(StudyError::Config(format!(
                    "routing assigns {} roles to lane \"{}\"; each lane must carry exactly {}",
                    count,
                    lane.to_string().to_lowercase(),
                    ROLES_PER_LANE
                )));
            }
        }
        Ok(())
    }

    pub fn lane_for(&self, role: AgentRole) -> Lane {
        self.routing.lane_for(role)
    }

    /// Instantiate all six agents for one run.
    ///
    /// Each agent gets its own quota-safe invoker (reporting to this run's
    /// relay) and its own request pacer.
    pub fn agents(
        &self,
        topic: &str,
        prompts: &Prompts,
        tools: Arc<ToolContext>,
        relay: &RelaySender,
    ) -> HashMap<AgentRole, Agent> {
        let mut vars = HashMap::new();
        vars.insert("topic".to_string(), topic.to_string());

        AgentRole::ALL
            .into_iter()
            .map(|role| {
                let lane = self.routing.lane_for(role);
                let profile = prompts.agents.get(role);

                let mut system_vars = vars.clone();
                system_vars.insert("role".to_string(), role.title().to_string());
                system_vars.insert("goal".to_string(), Prompts::render(&profile.goal, &vars));
                system_vars.insert("backstory".to_string(), profile.backstory.clone());
                let system_prompt = Prompts::render(&prompts.agents.system, &system_vars);

                let invoker = QuotaSafeInvoker::new(
                    self.models.get(lane),
                    lane,
                    self.policy.clone(),
                    relay.clone(),
                );

                let max_iterations = match role {
                    AgentRole::StudyCoordinator => self.agents.coordinator_max_iterations,
                    _ => self.agents.max_iterations,
                };

                let agent = Agent::new(role, lane, Arc::new(invoker), tools.clone())
                    .with_system_prompt(&system_prompt)
                    .with_max_iterations(max_iterations)
                    .with_pacer(RequestPacer::new(self.agents.max_requests_per_minute));

                (role, agent)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatRequest, Completion};
    use crate::materials::MaterialStore;
    use crate::relay;
    use crate::search::{Paper, PaperSearch};
    use async_trait::async_trait;

    struct NamedModel(&'static str);

    #[async_trait]
    impl ChatModel for NamedModel {
        async fn complete(&self, _request: &ChatRequest) -> Result<Completion> {
            Ok(Completion::text(self.0))
        }

        fn model_name(&self) -> &str {
            self.0
        }
    }

    struct NoSearch;

    #[async_trait]
    impl PaperSearch for NoSearch {
        async fn search(&self, _query: &str) -> Result<Vec<Paper>> {
            Ok(Vec::new())
        }
    }

    fn models() -> LaneModels {
        LaneModels {
            a: Arc::new(NamedModel("lane-a")),
            b: Arc::new(NamedModel("lane-b")),
        }
    }

    #[test]
    fn test_rejects_coordinator_on_lane_a() {
        let routing = RoutingSettings {
            study_coordinator: Lane::A,
            ..RoutingSettings::default()
        };
        let result = CredentialRouter::new(routing, models(), RetryPolicy::default(), AgentSettings::default());
        assert!(matches!(result, Err(StudyError::Config(_))));
    }

    #[test]
    fn test_rejects_idle_lane() {
        let routing = RoutingSettings {
            note_summarizer: Lane::B,
            resource_finder: Lane::B,
            progress_tracker: Lane::B,
            ..RoutingSettings::default()
        };
        assert!(CredentialRouter::validate(&routing).is_err());
    }

    #[test]
    fn test_rejects_uneven_split() {
        let routing = RoutingSettings {
            study_scheduler: Lane::A,
            quiz_generator: Lane::A,
            ..RoutingSettings::default()
        };
        assert_eq!(routing.roles_on(Lane::A).len(), 5);

        let err = CredentialRouter::validate(&routing).unwrap_err();
        assert!(err.to_string().contains("exactly 3"));
        assert!(CredentialRouter::validate(&RoutingSettings::default()).is_ok());
    }

    #[tokio::test]
    async fn test_agents_bound_to_routed_lanes() {
        let dir = tempfile::tempdir().unwrap();
        let router = CredentialRouter::new(
            RoutingSettings::default(),
            models(),
            RetryPolicy::default(),
            AgentSettings::default(),
        )
        .unwrap();
        let tools = Arc::new(ToolContext::new(
            Arc::new(NoSearch),
            MaterialStore::new(dir.path()).unwrap(),
        ));
        let (tx, _rx) = relay::channel(8);

        let agents = router.agents("Thermodynamics", &Prompts::default(), tools, &tx);

        assert_eq!(agents.len(), 6);
        let summarizer = &agents[&AgentRole::NoteSummarizer];
        assert_eq!(summarizer.lane(), Lane::A);
        assert_eq!(summarizer.max_iterations(), 3);
        assert!(summarizer.system_prompt().contains("Note Summarizer"));
        assert!(summarizer.system_prompt().contains("Thermodynamics"));

        let coordinator = &agents[&AgentRole::StudyCoordinator];
        assert_eq!(coordinator.lane(), Lane::B);
        assert_eq!(coordinator.max_iterations(), 5);
    }
}
