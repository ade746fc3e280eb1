//! Panic recovery.
//!
//! [`panics`] turns a panic anywhere below it into an [`ApiError::Panic`]
//! response, so a defect in one request never takes down the worker serving
//! others. A process panic hook keeps the backtrace of the panic site, which
//! is logged with the request's trace id.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::OnceLock;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;

use super::values::RequestValues;
use crate::error::ApiError;

/// Tracing target for recovered panics.
const TRACING_TARGET_PANIC: &str = "sales_gateway::panics";

static HOOK: OnceLock<()> = OnceLock::new();

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

/// Install the hook that records panic-site backtraces.
///
/// Safe to call more than once; the previous hook still runs.
pub fn install_panic_hook() {
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(Backtrace::force_capture()));
            previous(info);
        }));
    });
}

fn take_backtrace() -> Option<Backtrace> {
    LAST_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic type")
        .to_string()
}

/// Recover from panics in the rest of the chain.
///
/// Requires [`RequestValues`] on the request; without them the chain is
/// mis-ordered and the request fails with [`ApiError::ContextMissing`].
pub async fn panics(req: Request, next: Next) -> Response {
    install_panic_hook();

    let Some(values) = req.extensions().get::<RequestValues>().copied() else {
        return ApiError::ContextMissing("request values missing from context").into_response();
    };

    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let message = panic_message(&*payload);
            let backtrace = take_backtrace()
                .map_or_else(|| "unavailable".to_string(), |bt| bt.to_string());

            tracing::error!(
                target: TRACING_TARGET_PANIC,
                trace_id = %values.trace_id,
                message = %message,
                backtrace = %backtrace,
                "Recovered from panic"
            );

            ApiError::Panic(message).into_response()
        }
    }
}
