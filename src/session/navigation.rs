use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Where a denied view sends the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectTarget {
    Login,
    Home,
}

impl RedirectTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Home => "home",
        }
    }
}

impl std::fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URL paths the redirect targets resolve to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectPaths {
    pub login: String,
    pub home: String,
}

impl Default for RedirectPaths {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            home: "/".to_string(),
        }
    }
}

impl RedirectPaths {
    pub fn resolve(&self, target: RedirectTarget) -> &str {
        match target {
            RedirectTarget::Login => &self.login,
            RedirectTarget::Home => &self.home,
        }
    }
}

/// The navigation collaborator a gate signals on denial.
pub trait Navigator: Send + Sync {
    fn redirect(&self, target: RedirectTarget);
}

/// Navigator that remembers every redirect it was asked to perform.
///
/// The HTTP layer uses it to turn a gate's redirect into a response.
#[derive(Debug, Default)]
pub struct RedirectRecorder {
    targets: Mutex<Vec<RedirectTarget>>,
}

impl RedirectRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(&self) -> Vec<RedirectTarget> {
        match self.targets.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn last(&self) -> Option<RedirectTarget> {
        self.targets().last().copied()
    }
}

impl Navigator for RedirectRecorder {
    fn redirect(&self, target: RedirectTarget) {
        match self.targets.lock() {
            Ok(mut guard) => guard.push(target),
            Err(poisoned) => poisoned.into_inner().push(target),
        }
    }
}
