pub mod job;
pub mod token;
pub mod user;

pub use job::{Job, JobDraft, JobFilters, JobPage, JobStatus, PAGE_SIZE};
pub use token::{CredentialPair, LoginCredentials, RefreshGrant, RefreshRequest, Registration};
pub use user::UserProfile;
