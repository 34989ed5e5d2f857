//! Discovery and submission of link-listing forms.

pub mod discovery;
pub mod submitter;

pub use discovery::{FormDiscovery, SubmissionForm};
pub use submitter::{FormSubmitter, SubmitterConfig};

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("browser error: {0}")]
    Browser(String),
}
