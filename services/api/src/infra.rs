use metrics_exporter_prometheus::PrometheusHandle;
use revenue_certs::config::{AppConfig, IssuanceConfig, NotificationConfig};
use revenue_certs::error::AppError;
use revenue_certs::workflows::certificates::{
    ConfiguredNotifier, InMemoryNotificationOutbox, InMemoryStore, NotificationDispatcher, Role,
    StaticRoleDirectory, WorkflowEngine, WorkflowError,
};
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type ServiceEngine =
    WorkflowEngine<InMemoryStore, StaticRoleDirectory, ConfiguredNotifier>;

pub(crate) type DemoEngine =
    WorkflowEngine<InMemoryStore, StaticRoleDirectory, InMemoryNotificationOutbox>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// A `user=role` pair granted at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RoleGrant {
    pub(crate) user: String,
    pub(crate) role: Role,
}

pub(crate) fn parse_grant(raw: &str) -> Result<RoleGrant, String> {
    let (user, role) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected USER=ROLE, got '{raw}'"))?;
    let user = user.trim();
    if user.is_empty() {
        return Err(format!("missing user in '{raw}'"));
    }
    let role = Role::from_str(role).map_err(|err| err.to_string())?;
    Ok(RoleGrant {
        user: user.to_string(),
        role,
    })
}

pub(crate) fn role_directory(grants: &[RoleGrant]) -> StaticRoleDirectory {
    let directory = StaticRoleDirectory::default();
    for grant in grants {
        directory.grant(grant.user.clone(), grant.role);
    }
    directory
}

/// One desk per reviewer role plus a single applicant.
pub(crate) fn demo_grants() -> Vec<RoleGrant> {
    [
        ("citizen-demo", Role::Citizen),
        ("clerk-demo", Role::Clerk),
        ("vo1-demo", Role::VerificationOfficer1),
        ("vo2-demo", Role::VerificationOfficer2),
        ("vo3-demo", Role::VerificationOfficer3),
        ("staff-demo", Role::StaffOfficer),
        ("sdo-demo", Role::Sdo),
    ]
    .into_iter()
    .map(|(user, role)| RoleGrant {
        user: user.to_string(),
        role,
    })
    .collect()
}

fn engine_with<N>(
    notifier: Arc<N>,
    roles: StaticRoleDirectory,
    issuance: &IssuanceConfig,
    notifications: &NotificationConfig,
) -> Result<WorkflowEngine<InMemoryStore, StaticRoleDirectory, N>, AppError>
where
    N: NotificationDispatcher + 'static,
{
    WorkflowEngine::new(
        Arc::new(InMemoryStore::default()),
        Arc::new(roles),
        notifier,
        issuance,
        notifications,
    )
    .map_err(|err| AppError::Workflow(WorkflowError::IssuanceFailure(err)))
}

pub(crate) fn service_engine(
    config: &AppConfig,
    grants: &[RoleGrant],
) -> Result<ServiceEngine, AppError> {
    let notifier = ConfiguredNotifier::from_config(&config.notifications)
        .map_err(AppError::Notification)?;
    engine_with(
        Arc::new(notifier),
        role_directory(grants),
        &config.issuance,
        &config.notifications,
    )
}

pub(crate) fn demo_engine(
    outbox: Arc<InMemoryNotificationOutbox>,
) -> Result<DemoEngine, AppError> {
    engine_with(
        outbox,
        role_directory(&demo_grants()),
        &IssuanceConfig::development(),
        &NotificationConfig::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use revenue_certs::workflows::certificates::{RoleAuthority, UserId};

    #[test]
    fn grants_parse_user_and_role() {
        assert_eq!(
            parse_grant("clerk-7=clerk"),
            Ok(RoleGrant {
                user: "clerk-7".to_string(),
                role: Role::Clerk,
            })
        );
        assert!(parse_grant("clerk-7").is_err());
        assert!(parse_grant("=sdo").is_err());
        assert!(parse_grant("anil=collector").is_err());
    }

    #[test]
    fn directory_answers_for_granted_roles() {
        let directory = role_directory(&demo_grants());
        assert!(directory.is_in_role(&UserId("sdo-demo".to_string()), Role::Sdo));
        assert!(!directory.is_in_role(&UserId("sdo-demo".to_string()), Role::Clerk));
    }
}
