//! Caller identity binding.
//!
//! Every submitted message is processed on behalf of the token in its path.
//! The identity is resolved once per call, carried explicitly through the
//! handler pipeline as a [`CallerContext`], and released when the
//! [`IdentityGuard`] goes out of scope.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// The caller a message is processed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    /// Session token from the request path.
    pub token: String,
    /// Resolved principal, if the token is known.
    pub principal: Option<String>,
}

impl CallerContext {
    pub fn anonymous(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            principal: None,
        }
    }

    pub fn new(token: impl Into<String>, principal: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            principal: Some(principal.into()),
        }
    }

    /// Principal name for audit fields, falling back to the token.
    pub fn display_name(&self) -> &str {
        self.principal.as_deref().unwrap_or(&self.token)
    }
}

/// Resolves tokens to callers. Callers are assumed to be authenticated
/// upstream; this only attaches who they are.
pub trait IdentityBinder: Send + Sync {
    /// Resolve and bind the caller for `token`.
    fn bind(&self, token: &str) -> CallerContext;

    /// Release whatever `bind` acquired.
    fn unbind(&self, ctx: &CallerContext);
}

/// Binds tokens through a static `token -> principal` table.
#[derive(Debug, Clone, Default)]
pub struct TokenIdentityBinder {
    principals: HashMap<String, String>,
}

impl TokenIdentityBinder {
    pub fn new(principals: HashMap<String, String>) -> Self {
        Self { principals }
    }
}

impl IdentityBinder for TokenIdentityBinder {
    fn bind(&self, token: &str) -> CallerContext {
        match self.principals.get(token) {
            Some(principal) => {
                debug!("Bound token to principal {}", principal);
                CallerContext::new(token, principal.clone())
            }
            None => CallerContext::anonymous(token),
        }
    }

    fn unbind(&self, ctx: &CallerContext) {
        trace!("Released identity for {}", ctx.display_name());
    }
}

/// Scoped identity binding. Unbinds on drop, on every exit path.
pub struct IdentityGuard {
    binder: Arc<dyn IdentityBinder>,
    ctx: CallerContext,
}

impl IdentityGuard {
    pub fn bind(binder: Arc<dyn IdentityBinder>, token: &str) -> Self {
        let ctx = binder.bind(token);
        Self { binder, ctx }
    }

    pub fn context(&self) -> &CallerContext {
        &self.ctx
    }
}

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        self.binder.unbind(&self.ctx);
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::RecordingBinder;
    use super::*;

    #[test]
    fn test_known_token_resolves_principal() {
        let binder = TokenIdentityBinder::new(HashMap::from([(
            "tok-1".to_string(),
            "alice".to_string(),
        )]));
        assert_eq!(binder.bind("tok-1"), CallerContext::new("tok-1", "alice"));
        assert_eq!(binder.bind("other").principal, None);
        assert_eq!(binder.bind("other").display_name(), "other");
    }

    #[test]
    fn test_guard_unbinds_on_drop() {
        let binder = Arc::new(RecordingBinder::default());
        {
            let guard = IdentityGuard::bind(binder.clone(), "t");
            assert_eq!(guard.context().token, "t");
            assert_eq!(binder.calls(), vec!["bind:t"]);
        }
        assert_eq!(binder.calls(), vec!["bind:t", "unbind:t"]);
    }
}
