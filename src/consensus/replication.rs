//! Primary/secondary roles of replication workloads

use crate::component::pod;
use crate::model::{ComponentStatus, Object, ReplicationMemberStatus, ReplicationSetStatus};

pub const PRIMARY: &str = "primary";
pub const SECONDARY: &str = "secondary";

/// Rebuild the replication set status from pod role labels
///
/// Returns true when the status changed. Without a ready primary the
/// previous status is kept.
pub fn sync_replication_status(status: &mut ComponentStatus, pods: &[Object]) -> bool {
    let ready: Vec<&Object> = pods.iter().filter(|p| pod::is_ready_with_role(p)).collect();
    let Some(primary) = ready.iter().find(|p| pod::role(p) == Some(PRIMARY)) else {
        return false;
    };
    let mut secondaries: Vec<ReplicationMemberStatus> = ready
        .iter()
        .filter(|p| pod::role(p) == Some(SECONDARY))
        .map(|p| ReplicationMemberStatus {
            pod: p.name().to_string(),
        })
        .collect();
    secondaries.sort_by(|a, b| a.pod.cmp(&b.pod));

    let next = ReplicationSetStatus {
        primary: ReplicationMemberStatus {
            pod: primary.name().to_string(),
        },
        secondaries,
    };
    if status.replication_set_status.as_ref() == Some(&next) {
        return false;
    }
    status.replication_set_status = Some(next);
    true
}
