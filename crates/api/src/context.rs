use tenure_core::UserId;

/// Identity of the caller making a request.
///
/// The raw value is kept as received; it is validated where it is used, so a
/// malformed id surfaces as the store's `InvalidIdentifier` error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    user_id: String,
}

impl CallerContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// A caller with a freshly generated id.
    pub fn anonymous() -> Self {
        Self::new(UserId::new().to_string())
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}
