//! Process-local implementations of the storage, role, and notification seams.
//!
//! All tables sit behind a single mutex so a transition and its certificate are committed
//! under one lock acquisition.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Certificate, DocumentRecord, Role, UserId,
};
use super::repository::{
    ApplicationRepository, CertificateRegistry, DocumentRepository, NotificationDispatcher,
    NotificationError, RepositoryError, RoleAuthority, StatusNotice,
};

#[derive(Default)]
struct StoreState {
    applications: HashMap<ApplicationId, Application>,
    documents: HashMap<ApplicationId, Vec<DocumentRecord>>,
    certificates: HashMap<ApplicationId, Certificate>,
    certificate_numbers: HashMap<String, ApplicationId>,
    serials: HashMap<i32, u64>,
}

impl StoreState {
    fn admit_certificate(&self, certificate: &Certificate) -> Result<(), RepositoryError> {
        if self.certificates.contains_key(&certificate.application_id) {
            return Err(RepositoryError::Duplicate("certificate for application"));
        }
        if self
            .certificate_numbers
            .contains_key(&certificate.certificate_number.0)
        {
            return Err(RepositoryError::Duplicate("certificate number"));
        }
        Ok(())
    }

    fn store_certificate(&mut self, certificate: Certificate) {
        self.certificate_numbers.insert(
            certificate.certificate_number.0.clone(),
            certificate.application_id,
        );
        self.certificates
            .insert(certificate.application_id, certificate);
    }
}

#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    fn state(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    /// Number of certificates held, across all applications.
    pub fn certificate_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.state()?.certificates.len())
    }

    /// All applications currently stored, oldest submission first.
    pub fn all_applications(&self) -> Result<Vec<Application>, RepositoryError> {
        let state = self.state()?;
        let mut applications: Vec<_> = state.applications.values().cloned().collect();
        applications.sort_by_key(|application| application.submitted_at);
        Ok(applications)
    }
}

impl ApplicationRepository for InMemoryStore {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        application.check_invariants()?;
        let mut state = self.state()?;
        if state.applications.contains_key(&application.id) {
            return Err(RepositoryError::Duplicate("application"));
        }
        state.applications.insert(application.id, application.clone());
        Ok(application)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.state()?.applications.get(id).cloned())
    }

    fn commit_transition(
        &self,
        expected: ApplicationStatus,
        application: Application,
        certificate: Option<Certificate>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        let stored = state
            .applications
            .get(&application.id)
            .ok_or(RepositoryError::NotFound)?;

        if stored.status != expected {
            return Err(RepositoryError::StaleStatus {
                expected,
                found: stored.status,
            });
        }
        if stored.status.is_terminal() {
            return Err(RepositoryError::Terminal(stored.status));
        }
        application.check_invariants()?;

        if let Some(certificate) = &certificate {
            state.admit_certificate(certificate)?;
        }
        if let Some(certificate) = certificate {
            state.store_certificate(certificate);
        }
        state.applications.insert(application.id, application);
        Ok(())
    }

    fn list_by_status(
        &self,
        statuses: &[ApplicationStatus],
    ) -> Result<Vec<Application>, RepositoryError> {
        let state = self.state()?;
        let mut matching: Vec<_> = state
            .applications
            .values()
            .filter(|application| statuses.contains(&application.status))
            .cloned()
            .collect();
        matching.sort_by_key(|application| application.submitted_at);
        Ok(matching)
    }

    fn list_for_owner(&self, owner: &UserId) -> Result<Vec<Application>, RepositoryError> {
        let state = self.state()?;
        let mut owned: Vec<_> = state
            .applications
            .values()
            .filter(|application| &application.owner == owner)
            .cloned()
            .collect();
        owned.sort_by(|left, right| right.submitted_at.cmp(&left.submitted_at));
        Ok(owned)
    }
}

impl DocumentRepository for InMemoryStore {
    fn attach(&self, document: DocumentRecord) -> Result<DocumentRecord, RepositoryError> {
        let mut state = self.state()?;
        if !state.applications.contains_key(&document.application_id) {
            return Err(RepositoryError::NotFound);
        }
        state
            .documents
            .entry(document.application_id)
            .or_default()
            .push(document.clone());
        Ok(document)
    }

    fn documents_for(&self, id: &ApplicationId) -> Result<Vec<DocumentRecord>, RepositoryError> {
        Ok(self
            .state()?
            .documents
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    fn count_for(&self, id: &ApplicationId) -> Result<usize, RepositoryError> {
        Ok(self.state()?.documents.get(id).map_or(0, Vec::len))
    }
}

impl CertificateRegistry for InMemoryStore {
    fn next_serial(&self, year: i32) -> Result<u64, RepositoryError> {
        let mut state = self.state()?;
        let counter = state.serials.entry(year).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    fn insert_certificate(&self, certificate: Certificate) -> Result<Certificate, RepositoryError> {
        let mut state = self.state()?;
        state.admit_certificate(&certificate)?;
        state.store_certificate(certificate.clone());
        Ok(certificate)
    }

    fn by_application(&self, id: &ApplicationId) -> Result<Option<Certificate>, RepositoryError> {
        Ok(self.state()?.certificates.get(id).cloned())
    }

    fn by_number(&self, number: &str) -> Result<Option<Certificate>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .certificate_numbers
            .get(number)
            .and_then(|id| state.certificates.get(id))
            .cloned())
    }
}

/// Fixed role grants, standing in for the identity provider.
#[derive(Default, Clone)]
pub struct StaticRoleDirectory {
    grants: Arc<Mutex<HashMap<UserId, BTreeSet<Role>>>>,
}

impl StaticRoleDirectory {
    pub fn grant(&self, user: impl Into<String>, role: Role) {
        if let Ok(mut grants) = self.grants.lock() {
            grants.entry(UserId(user.into())).or_default().insert(role);
        }
    }

    pub fn with_grant(self, user: impl Into<String>, role: Role) -> Self {
        self.grant(user, role);
        self
    }
}

impl RoleAuthority for StaticRoleDirectory {
    fn is_in_role(&self, user: &UserId, role: Role) -> bool {
        self.grants
            .lock()
            .map(|grants| grants.get(user).is_some_and(|roles| roles.contains(&role)))
            .unwrap_or(false)
    }
}

/// Dispatcher that keeps every notice in memory.
#[derive(Default, Clone)]
pub struct InMemoryNotificationOutbox {
    events: Arc<Mutex<Vec<StatusNotice>>>,
}

impl InMemoryNotificationOutbox {
    pub fn events(&self) -> Vec<StatusNotice> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationDispatcher for InMemoryNotificationOutbox {
    async fn notify(&self, notice: StatusNotice) -> Result<(), NotificationError> {
        self.events
            .lock()
            .map_err(|_| NotificationError::Transport("outbox mutex poisoned".to_string()))?
            .push(notice);
        Ok(())
    }
}
