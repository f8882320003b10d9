//! Payloads exchanged with the portal backend.

mod course;
mod listing;
mod past_question;
mod user;

pub use course::{Choice, Course, CourseDraft, CourseQuery};
pub use listing::{Listing, Page};
pub use past_question::{
    CourseRef, Download, PastQuestion, PastQuestionQuery, PastQuestionSearch, PastQuestionUpdate,
    PastQuestionUpload, ReviewStatus, UploadFile,
};
pub(crate) use past_question::RejectRequest;
pub use user::{
    ApiMessage, ChangePasswordRequest, LoginRequest, PasswordResetConfirm, ProfileUpdate,
    RegisterRequest, UserProfile,
};
pub(crate) use user::{ActiveFlag, AuthEnvelope, LogoutRequest, PasswordResetRequest};
