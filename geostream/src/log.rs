//! Puits de logs injecté dans le pipeline
//!
//! Les événements `tracing` du pipeline (y compris ceux émis paresseusement par
//! les décorateurs pendant l'itération) sont envoyés au `Dispatch` porté par le
//! [`LogSink`] plutôt qu'à un état global implicite.

use std::fmt;

use tracing::subscriber::NoSubscriber;
use tracing::Dispatch;

#[derive(Clone, Default)]
pub struct LogSink {
    dispatch: Option<Dispatch>,
}

impl LogSink {
    /// Utilise le subscriber installé par l'application
    pub fn global() -> Self {
        Self::default()
    }

    pub fn new(dispatch: Dispatch) -> Self {
        Self {
            dispatch: Some(dispatch),
        }
    }

    /// Ignore tous les événements
    pub fn silent() -> Self {
        Self::new(Dispatch::new(NoSubscriber::default()))
    }

    /// Exécute `f` avec ce puits comme destination des événements
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.dispatch.is_some() {
            "injected"
        } else {
            "global"
        };
        f.debug_struct("LogSink").field("dispatch", &kind).finish()
    }
}
