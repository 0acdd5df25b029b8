//! Deterministic analyst panel for Mock mode and tests.
//!
//! Each role pops scripted opinions in order; when the script runs out the
//! panel falls back to a neutral default. Roles can also be made to fail or
//! stall to exercise the orchestrator's timeout handling.

use crate::domain::council::{AnalystOpinion, AnalystRole, CouncilMessage};
use crate::domain::errors::AnalystError;
use crate::domain::ports::{AnalystPanel, AnalystRequest, Clock};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
enum Step {
    Opinion(AnalystOpinion, String),
    Fail(String),
    Stall(Duration),
}

pub struct ScriptedAnalystPanel {
    clock: Arc<dyn Clock>,
    scripts: Mutex<HashMap<AnalystRole, Vec<Step>>>,
    calls: Mutex<Vec<AnalystRole>>,
}

impl ScriptedAnalystPanel {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_opinion(&self, role: AnalystRole, opinion: AnalystOpinion, content: &str) {
        self.scripts
            .lock()
            .unwrap()
            .entry(role)
            .or_default()
            .push(Step::Opinion(opinion, content.to_string()));
    }

    pub fn push_failure(&self, role: AnalystRole, reason: &str) {
        self.scripts
            .lock()
            .unwrap()
            .entry(role)
            .or_default()
            .push(Step::Fail(reason.to_string()));
    }

    /// Next call for this role sleeps longer than any sane timeout.
    pub fn push_stall(&self, role: AnalystRole, duration: Duration) {
        self.scripts
            .lock()
            .unwrap()
            .entry(role)
            .or_default()
            .push(Step::Stall(duration));
    }

    pub fn calls(&self) -> Vec<AnalystRole> {
        self.calls.lock().unwrap().clone()
    }

    fn default_opinion(role: AnalystRole) -> AnalystOpinion {
        match role {
            AnalystRole::GptQuant => AnalystOpinion::Quant {
                score: 6,
                suggested_percent: 15.0,
                target_price: None,
                stop_loss: None,
            },
            AnalystRole::ClaudeFundamental => AnalystOpinion::Fundamental {
                score: 6,
                suggested_percent: 15.0,
            },
            _ => AnalystOpinion::Consensus {
                suggested_percent: 15.0,
                holding_days: 10,
            },
        }
    }
}

#[async_trait]
impl AnalystPanel for ScriptedAnalystPanel {
    async fn analyze(
        &self,
        role: AnalystRole,
        request: AnalystRequest,
    ) -> Result<CouncilMessage, AnalystError> {
        self.calls.lock().unwrap().push(role);

        let step = {
            let mut scripts = self.scripts.lock().unwrap();
            let queue = scripts.entry(role).or_default();
            if queue.is_empty() { None } else { Some(queue.remove(0)) }
        };

        match step {
            Some(Step::Fail(reason)) => Err(AnalystError::Backend { reason }),
            Some(Step::Stall(duration)) => {
                tokio::time::sleep(duration).await;
                Err(AnalystError::Backend {
                    reason: "stalled".to_string(),
                })
            }
            Some(Step::Opinion(opinion, content)) => Ok(CouncilMessage::new(
                role,
                content,
                Some(opinion),
                self.clock.now(),
            )),
            None => Ok(CouncilMessage::new(
                role,
                format!("scripted default analysis for {}", request.symbol),
                Some(Self::default_opinion(role)),
                self.clock.now(),
            )),
        }
    }
}
