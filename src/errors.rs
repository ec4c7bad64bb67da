use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Things a request can point at that may turn out to be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Teacher,
    Booking,
    Draft,
    User,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Teacher => "teacher",
            Resource::Booking => "booking",
            Resource::Draft => "booking draft",
            Resource::User => "user",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Resource::Teacher => "استاد مورد نظر پیدا نشد. لطفاً از فهرست اساتید دوباره انتخاب کنید.",
            Resource::Booking => "رزرو مورد نظر پیدا نشد. لطفاً فهرست را بازخوانی کنید.",
            Resource::Draft => "اطلاعات رزرو پیدا نشد. لطفاً ابتدا استاد و زمان کلاس را انتخاب کنید.",
            Resource::User => "حساب کاربری با این ایمیل پیدا نشد. ابتدا باید با همین ایمیل ثبت‌نام شود.",
        }
    }

    /// Safe page to send the user back to.
    fn redirect(&self) -> Option<&'static str> {
        match self {
            Resource::Teacher | Resource::Draft => Some("/teachers"),
            Resource::Booking | Resource::User => None,
        }
    }
}

/// What a request collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Another admin already approved or rejected the payment.
    PaymentDecided,
    /// Sign-up with an email that already has an account.
    EmailTaken,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::PaymentDecided => "payment already decided",
            ConflictKind::EmailTaken => "email already registered",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ConflictKind::PaymentDecided => {
                "این مورد پیش‌تر توسط مدیر دیگری بررسی شده است. لطفاً صفحه را بازخوانی کنید."
            }
            ConflictKind::EmailTaken => {
                "با این ایمیل قبلاً حساب کاربری ساخته شده است. لطفاً وارد حساب خود شوید."
            }
        }
    }

    fn redirect(&self) -> Option<&'static str> {
        match self {
            ConflictKind::PaymentDecided => None,
            ConflictKind::EmailTaken => Some("/login"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("backend error: {0}")]
    Backend(#[from] anyhow::Error),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("not authorized")]
    NotAuthorized,

    /// Carries the user-facing message.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{} not found", .0.as_str())]
    NotFound(Resource),

    #[error("conflict: {}", .0.as_str())]
    Conflict(ConflictKind),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::NotAuthorized => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Backend(_) => "backend_error",
            AppError::Unauthenticated => "unauthenticated",
            AppError::NotAuthorized => "not_authorized",
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Backend(_) => {
                "خطایی در سرور رخ داد. لطفاً چند لحظه بعد دوباره تلاش کنید.".to_string()
            }
            AppError::Unauthenticated => "لطفاً دوباره وارد حساب کاربری خود شوید.".to_string(),
            AppError::NotAuthorized => {
                "شما به این بخش دسترسی ندارید. در صورت نیاز با پشتیبانی تماس بگیرید.".to_string()
            }
            AppError::Validation(message) => message.clone(),
            AppError::NotFound(resource) => resource.message().to_string(),
            AppError::Conflict(kind) => kind.message().to_string(),
        }
    }

    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            AppError::Unauthenticated => Some("/login"),
            AppError::NotFound(resource) => resource.redirect(),
            AppError::Conflict(kind) => kind.redirect(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, code = self.code(), "request rejected");
        }

        let mut body = serde_json::json!({
            "success": false,
            "error": self.code(),
            "message": self.user_message(),
        });
        if let Some(redirect) = self.redirect() {
            body["redirect"] = serde_json::Value::from(redirect);
        }
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_explain_themselves() {
        let taken = AppError::Conflict(ConflictKind::EmailTaken);
        let decided = AppError::Conflict(ConflictKind::PaymentDecided);

        assert_eq!(taken.status(), StatusCode::CONFLICT);
        assert_eq!(taken.code(), "conflict");
        assert_ne!(taken.user_message(), decided.user_message());
        assert!(taken.user_message().contains("ایمیل"));
        assert_eq!(taken.redirect(), Some("/login"));
        assert_eq!(decided.redirect(), None);
    }
}
