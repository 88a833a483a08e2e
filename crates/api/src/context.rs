use miliki_auth::Session;

/// Session resolved for the current request, if any.
///
/// Inserted by the session middleware for every request; handlers on the
/// public allow-list see `None` for anonymous callers.
#[derive(Debug, Clone, Default)]
pub struct CurrentSession(Option<Session>);

impl CurrentSession {
    pub fn new(session: Option<Session>) -> Self {
        Self(session)
    }

    pub fn session(&self) -> Option<&Session> {
        self.0.as_ref()
    }
}
