use thiserror::Error;

use crate::phone::PhoneError;

pub const PHONE_FORMAT_MESSAGE: &str = "Не удалось распознать номер телефона. Введите номер в международном формате, например +79991234567.";
pub const CRM_UNAVAILABLE_MESSAGE: &str = "Не удалось подключиться к Bitrix24. Попробуйте позже.";
pub const SYNC_FAILED_MESSAGE: &str =
    "Не удалось синхронизировать данные с Bitrix24. Попробуйте позже.";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CrmError {
    #[error("crm base url is not configured")]
    ConfigMissing,
    #[error("crm http {status}")]
    Http { status: u16, body: String },
    #[error("{code}: {description}")]
    Api { code: String, description: String },
    #[error("unexpected crm response shape: {0}")]
    UnexpectedResponseShape(String),
    #[error("invalid contact id `{0}`")]
    InvalidContactId(String),
    #[error("crm transport failure: {0}")]
    Transport(String),
    #[error("crm sync did not finish within {secs}s")]
    Timeout { secs: u64 },
}

impl CrmError {
    /// Errors that signal a CRM contract change rather than a transient outage.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::UnexpectedResponseShape(_) | Self::InvalidContactId(_))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("phone format invalid: {0}")]
    PhoneFormatInvalid(#[from] PhoneError),
    #[error(transparent)]
    Crm(#[from] CrmError),
}

impl SyncError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PhoneFormatInvalid(_) => PHONE_FORMAT_MESSAGE,
            Self::Crm(CrmError::ConfigMissing) => CRM_UNAVAILABLE_MESSAGE,
            Self::Crm(_) => SYNC_FAILED_MESSAGE,
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::PhoneFormatInvalid(_) => "phone_format_invalid",
            Self::Crm(CrmError::ConfigMissing) => "config_missing",
            Self::Crm(CrmError::Http { .. }) => "http_error",
            Self::Crm(CrmError::Api { .. }) => "api_error",
            Self::Crm(CrmError::UnexpectedResponseShape(_)) => "unexpected_response_shape",
            Self::Crm(CrmError::InvalidContactId(_)) => "invalid_contact_id",
            Self::Crm(CrmError::Transport(_)) => "transport",
            Self::Crm(CrmError::Timeout { .. }) => "timeout",
        }
    }
}
