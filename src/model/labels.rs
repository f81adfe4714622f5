//! Well-known labels, annotations and names

pub const INSTANCE: &str = "app.kubernetes.io/instance";
pub const COMPONENT: &str = "app.kubernetes.io/component";
pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "clusterflow";

/// Written by the role probe sidecar, read-only for the engine
pub const ROLE: &str = "clusterflow.io/role";
pub const ACCESS_MODE: &str = "clusterflow.io/access-mode";

/// Revision a pod was created from
pub const POD_REVISION: &str = "controller-revision-hash";

pub const CLUSTER_DEFINITION: &str = "clusterdefinition.clusterflow.io/name";
pub const CLUSTER_VERSION: &str = "clusterversion.clusterflow.io/name";

/// `env` for role-bearing environment config, `template` for rendered config files
pub const CONFIG_TYPE: &str = "clusterflow.io/config-type";
pub const CONFIG_TYPE_ENV: &str = "env";
pub const CONFIG_TYPE_TEMPLATE: &str = "template";

/// Secrets owned by the out-of-band account manager
pub const ACCOUNT_MANAGED: &str = "clusterflow.io/account-managed";

/// Backups labeled `Retain` survive WipeOut
pub const BACKUP_PROTECTION: &str = "clusterflow.io/backup-protection";
pub const BACKUP_RETAIN: &str = "Retain";

/// Marks PVC cleanup jobs scheduled by horizontal scale-in
pub const PVC_CLEANUP: &str = "clusterflow.io/pvc-cleanup";

pub const CLUSTER_GENERATION: &str = "clusterflow.io/cluster-generation";
pub const RESTARTED_AT: &str = "clusterflow.io/restarted-at";

pub const CREDENTIAL_SUFFIX: &str = "conn-credential";
