use std::sync::Arc;

use super::domain::{ApplicationId, ApplicationStatus};
use super::repository::{DocumentRepository, RepositoryError};

/// Requires supporting files before an application may leave intake for review.
pub struct DocumentAttachmentGate<D> {
    documents: Arc<D>,
}

impl<D> DocumentAttachmentGate<D>
where
    D: DocumentRepository,
{
    pub fn new(documents: Arc<D>) -> Self {
        Self { documents }
    }

    pub fn has_required_documents(&self, id: &ApplicationId) -> Result<bool, RepositoryError> {
        Ok(self.documents.count_for(id)? > 0)
    }

    /// Only the move out of `pending` into a review stage is gated.
    pub fn applies_to(from: ApplicationStatus, to: ApplicationStatus) -> bool {
        from == ApplicationStatus::Pending && to.is_active()
    }
}
