//! Error kinds surfaced to the user.
use std::io;

use thiserror::Error;

/// Why a position could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum LocationError {
    /// The user or platform refused location access.
    #[error("location permission denied")]
    PermissionDenied,
    /// The platform could not determine a position.
    #[error("position unavailable")]
    PositionUnavailable,
    /// No fix arrived within the source's timeout.
    #[error("location request timed out")]
    Timeout,
}

impl LocationError {
    /// Text shown next to the retry button.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::PermissionDenied => "位置情報の利用が許可されていません",
            Self::PositionUnavailable => "位置情報を取得できませんでした",
            Self::Timeout => "位置情報の取得がタイムアウトしました",
        }
    }
}

/// Hazard store failures, on fetch as well as on save.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("hazard store io failed: {0}")]
    Io(#[from] io::Error),
    /// The stored document is not valid hazard JSON.
    #[error("decode hazards failed: {0}")]
    Decode(#[from] serde_json::Error),
    /// The stored document is valid JSON but not a list.
    #[error("hazard document is not a list")]
    NotAList,
}

impl StoreError {
    /// Generic, retryable save failure text.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        "保存に失敗しました"
    }
}

/// Why a hazard registration was rejected.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// No occurrence date given.
    #[error("occurrence date is required")]
    MissingOccurredAt,
    /// No description given.
    #[error("description is required")]
    MissingDescription,
    /// No location picked.
    #[error("location is required")]
    MissingLocation,
    /// The store rejected the new hazard.
    #[error("{0}")]
    Save(#[from] StoreError),
}

impl RegistrationError {
    /// Text shown on the registration form.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::MissingOccurredAt => "発生日を入力してください",
            Self::MissingDescription => "説明を入力してください",
            Self::MissingLocation => "地図をタップして位置を指定してください",
            Self::Save(e) => e.user_message(),
        }
    }

    /// Whether resubmitting the same form can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Save(_))
    }
}
