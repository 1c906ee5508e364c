//! Directed transition graph and the role permitted to drive each edge.
//!
//! Forward edges are listed explicitly. Information-request edges are derived: any role
//! holding a forward edge out of an active stage may park the application in
//! `additional_info_needed`, and the same roles (plus the owning citizen) may return it.

use std::collections::BTreeSet;

use super::domain::{ApplicationStatus, Role};

use ApplicationStatus::{
    AdditionalInfoNeeded, Approved, AwaitingSdo, DocumentVerification, Pending, Rejected,
    StaffReview, VerificationLevel1, VerificationLevel2, VerificationLevel3,
};

/// A forward edge of the review workflow.
struct Edge {
    from: ApplicationStatus,
    to: ApplicationStatus,
    roles: &'static [Role],
}

const FORWARD_EDGES: &[Edge] = &[
    Edge {
        from: Pending,
        to: DocumentVerification,
        roles: &[Role::Clerk],
    },
    Edge {
        from: Pending,
        to: VerificationLevel1,
        roles: &[Role::VerificationOfficer1],
    },
    Edge {
        from: DocumentVerification,
        to: VerificationLevel1,
        roles: &[Role::VerificationOfficer1],
    },
    Edge {
        from: DocumentVerification,
        to: StaffReview,
        roles: &[Role::Clerk],
    },
    Edge {
        from: DocumentVerification,
        to: Rejected,
        roles: &[Role::Clerk],
    },
    Edge {
        from: VerificationLevel1,
        to: VerificationLevel2,
        roles: &[Role::VerificationOfficer1, Role::VerificationOfficer2],
    },
    Edge {
        from: VerificationLevel2,
        to: VerificationLevel3,
        roles: &[Role::VerificationOfficer2, Role::VerificationOfficer3],
    },
    Edge {
        from: VerificationLevel3,
        to: StaffReview,
        roles: &[Role::VerificationOfficer3],
    },
    Edge {
        from: VerificationLevel3,
        to: AwaitingSdo,
        roles: &[Role::StaffOfficer],
    },
    Edge {
        from: StaffReview,
        to: AwaitingSdo,
        roles: &[Role::StaffOfficer],
    },
    Edge {
        from: StaffReview,
        to: Rejected,
        roles: &[Role::StaffOfficer],
    },
    Edge {
        from: AwaitingSdo,
        to: Approved,
        roles: &[Role::Sdo],
    },
    Edge {
        from: AwaitingSdo,
        to: Rejected,
        roles: &[Role::Sdo],
    },
];

fn forward_roles_from(from: ApplicationStatus) -> BTreeSet<Role> {
    FORWARD_EDGES
        .iter()
        .filter(|edge| edge.from == from)
        .flat_map(|edge| edge.roles.iter().copied())
        .collect()
}

/// Roles allowed to drive `from -> to`. Empty when the edge does not exist.
pub fn permitted_roles(from: ApplicationStatus, to: ApplicationStatus) -> BTreeSet<Role> {
    if to == AdditionalInfoNeeded {
        return if from.is_active() {
            forward_roles_from(from)
        } else {
            BTreeSet::new()
        };
    }

    if from == AdditionalInfoNeeded {
        if !to.is_active() {
            return BTreeSet::new();
        }
        let mut roles = forward_roles_from(to);
        roles.insert(Role::Citizen);
        return roles;
    }

    FORWARD_EDGES
        .iter()
        .find(|edge| edge.from == from && edge.to == to)
        .map(|edge| edge.roles.iter().copied().collect())
        .unwrap_or_default()
}

pub fn is_legal(from: ApplicationStatus, to: ApplicationStatus) -> bool {
    !permitted_roles(from, to).is_empty()
}

pub fn is_permitted(from: ApplicationStatus, to: ApplicationStatus, role: Role) -> bool {
    permitted_roles(from, to).contains(&role)
}

/// Every status reachable in one step from `from`.
pub fn outgoing(from: ApplicationStatus) -> Vec<ApplicationStatus> {
    ApplicationStatus::ALL
        .into_iter()
        .filter(|to| is_legal(from, *to))
        .collect()
}

/// Statuses in which `role` holds at least one forward edge; drives the reviewer queues.
pub fn actionable_statuses(role: Role) -> Vec<ApplicationStatus> {
    ApplicationStatus::ALL
        .into_iter()
        .filter(|from| forward_roles_from(*from).contains(&role))
        .collect()
}
