/// Per-call context threaded through every service and repository write.
///
/// Carries the acting user explicitly instead of reading it from ambient
/// request-local storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub actor: Option<String>,
}

impl Context {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn as_actor(actor: impl Into<String>) -> Self {
        Self {
            actor: Some(actor.into()),
        }
    }

    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }
}
