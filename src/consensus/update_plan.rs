//! Staged, role-aware pod update plans
//!
//! A plan is a tree under an empty start step. Walking it visits one level
//! at a time and stops at the first level that is still in progress, so a
//! later stage never starts before the earlier one finished.

use super::role::{pod_priority, sort_pods, LEADER_PRIORITY, LEARNER_PRIORITY};
use crate::component::pod;
use crate::model::{ConsensusSpec, Object, UpdateStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    InProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkResult {
    Completed,
    InProgress,
}

#[derive(Debug, Clone, Default)]
struct Step {
    pod: Option<Object>,
    next: Vec<Step>,
}

impl Step {
    fn leaf(pod: &Object) -> Self {
        Step {
            pod: Some(pod.clone()),
            next: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePlan {
    start: Step,
}

impl UpdatePlan {
    /// Build a plan for `pods` under the given strategy
    pub fn build(spec: &ConsensusSpec, strategy: UpdateStrategy, pods: &[Object]) -> Self {
        let mut sorted = pods.to_vec();
        sort_pods(spec, &mut sorted);
        match strategy {
            UpdateStrategy::Serial => Self::serial(&sorted),
            UpdateStrategy::Parallel => Self::parallel(&sorted),
            UpdateStrategy::BestEffortParallel => Self::best_effort_parallel(spec, &sorted),
        }
    }

    /// One chain, in the given order
    fn serial(pods: &[Object]) -> Self {
        let mut chain: Option<Step> = None;
        for p in pods.iter().rev() {
            let mut step = Step::leaf(p);
            step.next.extend(chain.take());
            chain = Some(step);
        }
        let mut plan = Self::default();
        plan.start.next.extend(chain);
        plan
    }

    /// Everything at once
    fn parallel(pods: &[Object]) -> Self {
        let mut plan = Self::default();
        plan.start.next = pods.iter().map(Step::leaf).collect();
        plan
    }

    /// Non-voting members, then the lower half of followers, then the rest with the leader
    fn best_effort_parallel(spec: &ConsensusSpec, sorted: &[Object]) -> Self {
        let (non_voting, voting): (Vec<&Object>, Vec<&Object>) = sorted
            .iter()
            .partition(|p| pod_priority(spec, p) <= LEARNER_PRIORITY);
        let (mut followers, leaders): (Vec<&Object>, Vec<&Object>) = voting
            .into_iter()
            .partition(|p| pod_priority(spec, p) < LEADER_PRIORITY);
        let upper = followers.split_off(followers.len() / 2);
        let lower = followers;

        let stages: Vec<Vec<&Object>> = vec![
            non_voting,
            lower,
            upper.into_iter().chain(leaders).collect(),
        ];

        let mut plan = Self::default();
        // Each stage hangs off the first step of the previous non-empty stage.
        let mut path: Vec<usize> = Vec::new();
        for stage in stages.into_iter().filter(|s| !s.is_empty()) {
            let parent = plan.step_at_mut(&path);
            parent.next = stage.into_iter().map(Step::leaf).collect();
            path.push(0);
        }
        plan
    }

    fn step_at_mut(&mut self, path: &[usize]) -> &mut Step {
        let mut step = &mut self.start;
        for index in path {
            step = &mut step.next[*index];
        }
        step
    }

    /// Pod names level by level
    pub fn stages(&self) -> Vec<Vec<String>> {
        let mut stages = Vec::new();
        let mut level: Vec<&Step> = self.start.next.iter().collect();
        while !level.is_empty() {
            stages.push(
                level
                    .iter()
                    .filter_map(|s| s.pod.as_ref())
                    .map(|p| p.name().to_string())
                    .collect(),
            );
            level = level.iter().flat_map(|s| s.next.iter()).collect();
        }
        stages
    }

    /// Evaluate the first unfinished level
    ///
    /// `f` is called for every pod of that level; the walk stops there if any
    /// of them is still in progress.
    pub fn walk_one_step<F>(&self, mut f: F) -> WalkResult
    where
        F: FnMut(&Object) -> StepOutcome,
    {
        let mut level: Vec<&Step> = self.start.next.iter().collect();
        while !level.is_empty() {
            let mut in_progress = false;
            for step in &level {
                if let Some(p) = &step.pod {
                    if f(p) == StepOutcome::InProgress {
                        in_progress = true;
                    }
                }
            }
            if in_progress {
                return WalkResult::InProgress;
            }
            level = level.iter().flat_map(|s| s.next.iter()).collect();
        }
        WalkResult::Completed
    }
}

/// The workload's own rollout has settled and every expected pod exists
pub fn rollout_converged(workload: &Object, pods: &[Object]) -> bool {
    workload.as_workload().is_some_and(|w| {
        workload.meta.generation == w.status.observed_generation
            && pods.len() as i32 == w.spec.replicas
    })
}

/// Pods to delete this round so they come back on `update_revision`
///
/// Terminating pods count as done; pods already on the target revision
/// count as done once ready; any other pod is deleted and holds the walk.
pub fn plan_pod_restarts(plan: &UpdatePlan, update_revision: &str) -> Vec<Object> {
    let mut to_delete = Vec::new();
    plan.walk_one_step(|p| {
        if pod::is_terminating(p) {
            return StepOutcome::Done;
        }
        if pod::revision(p) == Some(update_revision) {
            return if pod::is_ready(p) {
                StepOutcome::Done
            } else {
                StepOutcome::InProgress
            };
        }
        to_delete.push(p.clone());
        StepOutcome::InProgress
    });
    to_delete
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        labels, AccessMode, ConsensusMember, Kind, ObjectData, ObjectMeta, PodCondition,
        PodConditionType, PodData,
    };
    use std::time::SystemTime;

    fn spec() -> ConsensusSpec {
        ConsensusSpec {
            leader: ConsensusMember::new("leader", AccessMode::ReadWrite),
            followers: vec![ConsensusMember::new("follower", AccessMode::ReadWrite)],
            learner: Some(ConsensusMember::new("learner", AccessMode::Readonly)),
            update_strategy: UpdateStrategy::BestEffortParallel,
        }
    }

    fn pod(ordinal: i32, role: Option<&str>, revision: &str, ready: bool) -> Object {
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
        .with_label(labels::POD_REVISION, revision);
        if let Some(role) = role {
            obj = obj.with_label(labels::ROLE, role);
        }
        obj
    }

    fn five_pods(revision: &str) -> Vec<Object> {
        vec![
            pod(0, Some("leader"), revision, true),
            pod(1, Some("follower"), revision, true),
            pod(2, Some("follower"), revision, true),
            pod(3, Some("learner"), revision, true),
            pod(4, Some("mystery"), revision, true),
        ]
    }

    #[test]
    fn test_best_effort_parallel_stages() {
        let plan = UpdatePlan::build(&spec(), UpdateStrategy::BestEffortParallel, &five_pods("r1"));
        assert_eq!(
            plan.stages(),
            vec![
                vec!["c-db-4".to_string(), "c-db-3".to_string()],
                vec!["c-db-1".to_string()],
                vec!["c-db-2".to_string(), "c-db-0".to_string()],
            ]
        );
    }

    #[test]
    fn test_best_effort_parallel_leader_never_early() {
        for followers in 0..6 {
            let mut pods = vec![pod(0, Some("leader"), "r1", true)];
            for i in 0..followers {
                pods.push(pod(i + 1, Some("follower"), "r1", true));
            }
            let plan = UpdatePlan::build(&spec(), UpdateStrategy::BestEffortParallel, &pods);
            let stages = plan.stages();
            let last = stages.last().unwrap();
            assert!(last.contains(&"c-db-0".to_string()));
            for stage in &stages[..stages.len() - 1] {
                assert!(!stage.contains(&"c-db-0".to_string()));
            }
        }
    }

    #[test]
    fn test_serial_plan_is_a_chain() {
        let plan = UpdatePlan::build(&spec(), UpdateStrategy::Serial, &five_pods("r1"));
        let stages = plan.stages();
        assert_eq!(stages.len(), 5);
        assert!(stages.iter().all(|s| s.len() == 1));
        assert_eq!(stages[4], vec!["c-db-0".to_string()]);
    }

    #[test]
    fn test_parallel_plan_is_one_fan_out() {
        let plan = UpdatePlan::build(&spec(), UpdateStrategy::Parallel, &five_pods("r1"));
        let stages = plan.stages();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].len(), 5);
    }

    #[test]
    fn test_serial_restart_touches_one_pod_at_a_time() {
        let spec = spec();
        let mut pods = five_pods("r1");
        let mut deleted_order = Vec::new();

        for _ in 0..10 {
            let plan = UpdatePlan::build(&spec, UpdateStrategy::Serial, &pods);
            let to_delete = plan_pod_restarts(&plan, "r2");
            assert!(to_delete.len() <= 1);
            let Some(victim) = to_delete.first() else { break };
            deleted_order.push(victim.name().to_string());
            // The workload controller recreates the pod on the new revision, ready.
            for p in pods.iter_mut().filter(|p| p.name() == victim.name()) {
                p.meta.labels.insert(labels::POD_REVISION.to_string(), "r2".to_string());
            }
        }
        assert_eq!(
            deleted_order,
            vec!["c-db-4", "c-db-3", "c-db-1", "c-db-2", "c-db-0"]
        );
    }

    #[test]
    fn test_restart_waits_for_updated_pod_to_become_ready() {
        let mut pods = five_pods("r1");
        pods[4] = pod(4, Some("mystery"), "r2", false);
        let plan = UpdatePlan::build(&spec(), UpdateStrategy::Serial, &pods);
        assert!(plan_pod_restarts(&plan, "r2").is_empty());
    }

    #[test]
    fn test_terminating_pod_counts_as_done() {
        let mut pods = five_pods("r1");
        pods[4].meta.deletion_timestamp = Some(SystemTime::now());
        let plan = UpdatePlan::build(&spec(), UpdateStrategy::Serial, &pods);
        let to_delete = plan_pod_restarts(&plan, "r2");
        assert_eq!(to_delete.len(), 1);
        assert_eq!(to_delete[0].name(), "c-db-3");
    }

    #[test]
    fn test_best_effort_stage_gates_next() {
        let plan = UpdatePlan::build(&spec(), UpdateStrategy::BestEffortParallel, &five_pods("r1"));
        let first = plan_pod_restarts(&plan, "r2");
        let names: Vec<&str> = first.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["c-db-4", "c-db-3"]);
        assert_eq!(plan.walk_one_step(|_| StepOutcome::Done), WalkResult::Completed);
    }
}
