mod assignments;
mod common;
mod documents;

pub use assignments::{
    AssignmentDetailsResponse, CreateRoleAssignmentRequest, CreatedRoleAssignmentResponse,
    ReasonRequest, RegisterRequest, RequirementsResponse, ResubmitRequest, ReviewQueueQuery,
    ReviewRoleAssignmentRequest, RoleAssignmentResponse,
};
pub use common::{ActorResponse, HealthResponse};
pub use documents::{DocumentResponse, DocumentReviewResponse, DocumentUploadRequest};
