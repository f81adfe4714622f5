//! Workload-kind specific health rules
//!
//! [`WorkloadHandler`] is chosen once per component from its declared workload
//! type. Every variant answers the same questions for the phase machine.

use super::pod;
use super::synthesize::SynthesizedComponent;
use crate::consensus::replication;
use crate::model::{ComponentPhase, ConsensusSpec, MessageMap, Object, WorkloadType};

pub const PROBE_TIMEOUT_MESSAGE: &str =
    "Role probe timeout, check whether the application is available";

/// What was observed for one component during this reconcile
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    /// Declared replicas
    pub replicas: i32,
    pub workloads: &'a [Object],
    pub pods: &'a [Object],
    /// A role sync pass has placed every ready pod
    pub role_synced: bool,
}

impl Observation<'_> {
    fn available_replicas(&self) -> i32 {
        self.workloads
            .iter()
            .filter_map(|w| w.as_workload())
            .map(|w| w.status.available_replicas)
            .sum()
    }

    /// The pod is on a revision some workload is still rolling towards
    ///
    /// Workloads that report no update revision accept every pod.
    fn on_latest_revision(&self, p: &Object) -> bool {
        let latest: Vec<&str> = self
            .workloads
            .iter()
            .filter_map(|w| w.as_workload())
            .map(|w| w.status.update_revision.as_str())
            .filter(|r| !r.is_empty())
            .collect();
        latest.is_empty() || pod::revision(p).is_some_and(|r| latest.contains(&r))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkloadHandler {
    Stateless,
    Stateful,
    Consensus(ConsensusSpec),
    Replication,
}

/// Workload controller has caught up with its spec
fn converged(workload: &Object, check_revision: bool) -> bool {
    let Some(data) = workload.as_workload() else {
        return false;
    };
    let replicas = data.spec.replicas;
    let status = &data.status;
    workload.meta.generation == status.observed_generation
        && status.replicas == replicas
        && status.ready_replicas == replicas
        && status.available_replicas == replicas
        && status.updated_replicas == replicas
        && (!check_revision || status.current_revision == status.update_revision)
}

impl WorkloadHandler {
    pub fn for_component(comp: &SynthesizedComponent) -> Self {
        match (comp.workload_type, &comp.consensus) {
            (WorkloadType::Stateless, _) => WorkloadHandler::Stateless,
            (WorkloadType::Stateful, _) => WorkloadHandler::Stateful,
            (WorkloadType::Consensus, Some(spec)) => WorkloadHandler::Consensus(spec.clone()),
            // A consensus definition without roles degrades to plain stateful rules.
            (WorkloadType::Consensus, None) => WorkloadHandler::Stateful,
            (WorkloadType::Replication, _) => WorkloadHandler::Replication,
        }
    }

    pub fn has_roles(&self) -> bool {
        matches!(
            self,
            WorkloadHandler::Consensus(_) | WorkloadHandler::Replication
        )
    }

    fn leader_role(&self) -> Option<&str> {
        match self {
            WorkloadHandler::Consensus(spec) => Some(spec.leader.name.as_str()),
            WorkloadHandler::Replication => Some(replication::PRIMARY),
            _ => None,
        }
    }

    /// Workload-specific convergence
    pub fn is_running(&self, obs: &Observation<'_>) -> bool {
        match self {
            WorkloadHandler::Stateless => match obs.workloads {
                [deploy] => converged(deploy, false) && deploy_replicas(deploy) == obs.replicas,
                _ => false,
            },
            WorkloadHandler::Stateful => match obs.workloads {
                [sts] => converged(sts, true) && deploy_replicas(sts) == obs.replicas,
                _ => false,
            },
            WorkloadHandler::Consensus(_) => match obs.workloads {
                [sts] => {
                    converged(sts, true)
                        && deploy_replicas(sts) == obs.replicas
                        && obs.role_synced
                        && obs.pods.iter().all(pod::is_ready_with_role)
                }
                _ => false,
            },
            WorkloadHandler::Replication => {
                !obs.workloads.is_empty()
                    && obs.workloads.iter().all(|w| converged(w, true))
                    && obs.workloads.iter().map(deploy_replicas).sum::<i32>() == obs.replicas
                    && obs.pods.iter().all(pod::is_ready_with_role)
            }
        }
    }

    /// Every expected pod is available
    pub fn pods_ready(&self, obs: &Observation<'_>) -> bool {
        !obs.workloads.is_empty() && obs.available_replicas() == obs.replicas
    }

    /// Phase once pods stayed ready past the role-probe timeout
    ///
    /// No pod holding the leading role is a failure; a pod without any
    /// role is a partial one.
    pub fn probe_timeout_phase(
        &self,
        obs: &Observation<'_>,
    ) -> (Option<ComponentPhase>, MessageMap) {
        let Some(leader) = self.leader_role() else {
            return (None, MessageMap::new());
        };
        let mut messages = MessageMap::new();
        for p in obs.pods.iter().filter(|p| pod::role(p).is_none()) {
            messages.insert(p.key().message_key(), PROBE_TIMEOUT_MESSAGE.to_string());
        }
        let has_leader = obs.pods.iter().any(|p| pod::role(p) == Some(leader));
        let phase = if !has_leader {
            Some(ComponentPhase::Failed)
        } else if !messages.is_empty() {
            Some(ComponentPhase::Abnormal)
        } else {
            None
        };
        (phase, messages)
    }

    /// Phase while some pod has been failing for longer than allowed
    ///
    /// Returns None when the phase should not change. Unready pods left over
    /// from an older revision are being replaced and do not count.
    pub fn phase_when_pods_not_ready(&self, obs: &Observation<'_>) -> Option<ComponentPhase> {
        if obs.pods.is_empty() || obs.available_replicas() == 0 {
            return (obs.replicas != 0).then_some(ComponentPhase::Failed);
        }
        if obs.pods.iter().any(pod::is_terminating) {
            return None;
        }
        let failing_on_latest = obs
            .pods
            .iter()
            .any(|p| !pod::is_ready(p) && obs.on_latest_revision(p));
        if !failing_on_latest {
            return None;
        }
        if let Some(leader) = self.leader_role() {
            let leader_ready = obs
                .pods
                .iter()
                .any(|p| pod::role(p) == Some(leader) && pod::is_ready(p));
            if !leader_ready {
                return Some(ComponentPhase::Failed);
            }
        }
        if obs.available_replicas() != obs.replicas || obs.pods.len() as i32 != obs.replicas {
            return Some(ComponentPhase::Abnormal);
        }
        None
    }
}

fn deploy_replicas(workload: &Object) -> i32 {
    workload
        .as_workload()
        .map(|w| w.spec.replicas)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        labels, AccessMode, ConsensusMember, Kind, ObjectData, ObjectMeta, PodCondition,
        PodConditionType, PodData, WorkloadData, WorkloadSpec, WorkloadStatus,
    };

    fn sts(replicas: i32, available: i32) -> Object {
        let mut meta = ObjectMeta::new("default", "c-db");
        meta.generation = 2;
        Object::new(
            Kind::StatefulSet,
            meta,
            ObjectData::Workload(WorkloadData {
                spec: WorkloadSpec {
                    replicas,
                    ..Default::default()
                },
                status: WorkloadStatus {
                    observed_generation: 2,
                    replicas,
                    ready_replicas: available,
                    available_replicas: available,
                    updated_replicas: replicas,
                    current_revision: "r1".to_string(),
                    update_revision: "r1".to_string(),
                },
            }),
        )
    }

    fn pod(ordinal: i32, ready: bool, role: Option<&str>) -> Object {
        let data = PodData {
            conditions: vec![PodCondition {
                type_: PodConditionType::Ready,
                status: ready,
                last_transition_time: None,
                message: String::new(),
            }],
            ..Default::default()
        };
        let mut obj = Object::new(
            Kind::Pod,
            ObjectMeta::new("default", format!("c-db-{}", ordinal)),
            ObjectData::Pod(data),
        )
        .with_label(labels::POD_REVISION, "r1");
        if let Some(role) = role {
            obj = obj.with_label(labels::ROLE, role);
        }
        obj
    }

    fn consensus() -> WorkloadHandler {
        WorkloadHandler::Consensus(ConsensusSpec {
            leader: ConsensusMember::new("leader", AccessMode::ReadWrite),
            followers: vec![ConsensusMember::new("follower", AccessMode::Readonly)],
            learner: None,
            update_strategy: Default::default(),
        })
    }

    #[test]
    fn test_consensus_running_requires_roles_and_sync() {
        let workloads = vec![sts(3, 3)];
        let pods = vec![
            pod(0, true, Some("leader")),
            pod(1, true, Some("follower")),
            pod(2, true, None),
        ];
        let mut obs = Observation {
            replicas: 3,
            workloads: &workloads,
            pods: &pods,
            role_synced: true,
        };
        let handler = consensus();
        assert!(handler.pods_ready(&obs));
        assert!(!handler.is_running(&obs));
        assert!(WorkloadHandler::Stateful.is_running(&obs));

        let labeled = vec![
            pod(0, true, Some("leader")),
            pod(1, true, Some("follower")),
            pod(2, true, Some("follower")),
        ];
        obs.pods = &labeled;
        assert!(handler.is_running(&obs));
        obs.role_synced = false;
        assert!(!handler.is_running(&obs));
    }

    #[test]
    fn test_probe_timeout_without_leader_fails() {
        let workloads = vec![sts(3, 3)];
        let pods = vec![pod(0, true, None), pod(1, true, Some("follower")), pod(2, true, None)];
        let obs = Observation {
            replicas: 3,
            workloads: &workloads,
            pods: &pods,
            role_synced: true,
        };
        let (phase, messages) = consensus().probe_timeout_phase(&obs);
        assert_eq!(phase, Some(ComponentPhase::Failed));
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages.get("Pod/c-db-0").map(String::as_str),
            Some(PROBE_TIMEOUT_MESSAGE)
        );
    }

    #[test]
    fn test_probe_timeout_with_leader_and_unlabeled_is_abnormal() {
        let workloads = vec![sts(3, 3)];
        let pods = vec![
            pod(0, true, Some("leader")),
            pod(1, true, Some("follower")),
            pod(2, true, None),
        ];
        let obs = Observation {
            replicas: 3,
            workloads: &workloads,
            pods: &pods,
            role_synced: true,
        };
        let (phase, messages) = consensus().probe_timeout_phase(&obs);
        assert_eq!(phase, Some(ComponentPhase::Abnormal));
        assert_eq!(messages.keys().collect::<Vec<_>>(), vec!["Pod/c-db-2"]);
    }

    #[test]
    fn test_not_ready_phases() {
        let handler = consensus();
        let workloads = vec![sts(3, 2)];

        let leaderless = vec![
            pod(0, false, Some("leader")),
            pod(1, true, Some("follower")),
            pod(2, true, Some("follower")),
        ];
        let obs = Observation {
            replicas: 3,
            workloads: &workloads,
            pods: &leaderless,
            role_synced: true,
        };
        assert_eq!(handler.phase_when_pods_not_ready(&obs), Some(ComponentPhase::Failed));

        let follower_down = vec![
            pod(0, true, Some("leader")),
            pod(1, false, Some("follower")),
            pod(2, true, Some("follower")),
        ];
        let obs = Observation {
            pods: &follower_down,
            ..obs
        };
        assert_eq!(handler.phase_when_pods_not_ready(&obs), Some(ComponentPhase::Abnormal));

        let none_available = vec![sts(3, 0)];
        let obs = Observation {
            workloads: &none_available,
            ..obs
        };
        assert_eq!(handler.phase_when_pods_not_ready(&obs), Some(ComponentPhase::Failed));
    }

    #[test]
    fn test_unready_pods_of_an_older_revision_are_ignored() {
        let handler = consensus();
        let mut rolling = sts(3, 2);
        rolling.as_workload_mut().unwrap().status.update_revision = "r2".to_string();
        let workloads = vec![rolling];

        let outdated = pod(1, false, Some("follower")).with_label(labels::POD_REVISION, "r1");
        let pods = vec![
            pod(0, true, Some("leader")).with_label(labels::POD_REVISION, "r2"),
            outdated,
            pod(2, true, Some("follower")).with_label(labels::POD_REVISION, "r2"),
        ];
        let obs = Observation {
            replicas: 3,
            workloads: &workloads,
            pods: &pods,
            role_synced: true,
        };
        assert_eq!(handler.phase_when_pods_not_ready(&obs), None);

        let pods = vec![
            pods[0].clone(),
            pod(1, false, Some("follower")).with_label(labels::POD_REVISION, "r2"),
            pods[2].clone(),
        ];
        let obs = Observation {
            pods: &pods,
            ..obs
        };
        assert_eq!(handler.phase_when_pods_not_ready(&obs), Some(ComponentPhase::Abnormal));
    }
}
