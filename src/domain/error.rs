use thiserror::Error;

/// Errors raised while turning user input into a registrable ASCII domain.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain is empty")]
    EmptyDomain,
    #[error("domain IDNA conversion failed")]
    IdnaConversion {
        #[source]
        source: idna::Errors,
    },
    #[error("domain label '{label}' is invalid")]
    InvalidLabel { label: String },
    #[error("'{domain}' has no registrable part below its public suffix")]
    NotRegistrable { domain: String },
}

impl DomainError {
    pub(crate) fn idna(source: idna::Errors) -> Self {
        Self::IdnaConversion { source }
    }

    pub(crate) fn invalid_label(label: impl Into<String>) -> Self {
        Self::InvalidLabel {
            label: label.into(),
        }
    }

    pub(crate) fn not_registrable(domain: impl Into<String>) -> Self {
        Self::NotRegistrable {
            domain: domain.into(),
        }
    }

    /// Message reported in the job result when normalization fails.
    pub fn job_message(&self) -> &'static str {
        match self {
            Self::IdnaConversion { .. } => "Non ASCII or IDN characters in domain.",
            _ => "Domain not OK",
        }
    }
}
