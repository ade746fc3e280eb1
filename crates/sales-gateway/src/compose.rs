//! Middleware composition.
//!
//! Every route gets the same base [`Chain`] and, closest to the handler, the
//! middleware its [`Access`] level needs:
//!
//! ```text
//! values → metrics → errors → panics → authenticate → authorize → handler
//! ```
//!
//! Panic recovery sits outside authentication so a defect while parsing a
//! token is recovered like any other.

use std::sync::Arc;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::MethodRouter;
use axum::Router;

use sales_auth::TokenValidator;
use sales_core::Role;

use crate::mid::{self, Metrics, RequiredRoles};
use crate::shutdown::ShutdownSignal;
use crate::state::GatewayState;

/// One member of the base chain.
#[derive(Debug, Clone)]
pub enum Middleware {
    /// Count requests and errors.
    Metrics(Arc<Metrics>),
    /// Log failures and escalate composition defects.
    Errors(ShutdownSignal),
    /// Recover from panics below.
    Panics,
}

impl Middleware {
    fn wrap<S>(&self, route: MethodRouter<S>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        match self {
            Self::Metrics(metrics) => {
                route.layer(from_fn_with_state(Arc::clone(metrics), mid::metrics))
            }
            Self::Errors(shutdown) => route.layer(from_fn_with_state(shutdown.clone(), mid::errors)),
            Self::Panics => route.layer(from_fn(mid::panics)),
        }
    }
}

/// An ordered list of middleware. The first listed is outermost.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    middleware: Vec<Middleware>,
}

impl Chain {
    /// Create a chain from `middleware`, outermost first.
    #[must_use]
    pub fn new(middleware: Vec<Middleware>) -> Self {
        Self { middleware }
    }

    /// The chain every route runs behind: metrics, errors, panics.
    #[must_use]
    pub fn standard(metrics: Arc<Metrics>, shutdown: ShutdownSignal) -> Self {
        Self::new(vec![
            Middleware::Metrics(metrics),
            Middleware::Errors(shutdown),
            Middleware::Panics,
        ])
    }

    /// Wrap `route` so the first listed middleware runs first.
    #[must_use]
    pub fn apply<S>(&self, route: MethodRouter<S>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        self.middleware
            .iter()
            .rev()
            .fold(route, |route, middleware| middleware.wrap(route))
    }
}

/// Who may call a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// No token needed.
    Public,
    /// Any valid token.
    Authenticated,
    /// A valid token holding at least one of these roles.
    Roles(Vec<Role>),
}

impl Access {
    fn wrap<V>(
        &self,
        route: MethodRouter<Arc<GatewayState<V>>>,
        state: &Arc<GatewayState<V>>,
    ) -> MethodRouter<Arc<GatewayState<V>>>
    where
        V: TokenValidator + 'static,
    {
        let authenticate = from_fn_with_state(Arc::clone(state), mid::authenticate::<V>);
        match self {
            Self::Public => route,
            Self::Authenticated => route.route_layer(authenticate),
            Self::Roles(roles) => route
                .route_layer(from_fn_with_state(
                    RequiredRoles(roles.clone()),
                    mid::authorize,
                ))
                .route_layer(authenticate),
        }
    }
}

/// Builds the router one route at a time, each behind the full chain.
pub struct App<V>
where
    V: TokenValidator,
{
    state: Arc<GatewayState<V>>,
    chain: Chain,
    router: Router<Arc<GatewayState<V>>>,
}

impl<V> App<V>
where
    V: TokenValidator + 'static,
{
    /// Create an app whose routes run behind [`Chain::standard`].
    #[must_use]
    pub fn new(state: GatewayState<V>) -> Self {
        let chain = Chain::standard(Arc::clone(&state.metrics), state.shutdown.clone());
        Self {
            state: Arc::new(state),
            chain,
            router: Router::new(),
        }
    }

    /// Replace the base chain for routes added after this call.
    #[must_use]
    pub fn with_chain(mut self, chain: Chain) -> Self {
        self.chain = chain;
        self
    }

    /// The shared state handed to every route.
    #[must_use]
    pub fn state(&self) -> &Arc<GatewayState<V>> {
        &self.state
    }

    /// Mount `route` at `path` behind the chain and `access` checks.
    #[must_use]
    pub fn handle(
        mut self,
        path: &str,
        route: MethodRouter<Arc<GatewayState<V>>>,
        access: Access,
    ) -> Self {
        let route = access.wrap(route, &self.state);
        let route = self.chain.apply(route).layer(from_fn(mid::values));
        tracing::debug!(path = %path, access = ?access, "Route mounted");
        self.router = self.router.route(path, route);
        self
    }

    /// Finish building and attach the state.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router.with_state(self.state)
    }
}
