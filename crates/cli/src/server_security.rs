use crate::http_api::{auth_error_response, HttpState};
use anyhow::{Context as AnyhowContext, Result};
use axum::extract::{OriginalUri, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use scout_auth::{AuthError, SignedRequest};
use std::net::SocketAddr;

/// Rejects requests whose `x-timestamp`/`x-signature` envelope does not verify.
///
/// The signed path is the original request URI (path and query), so the check is unaffected by
/// the router the middleware is attached to being nested.
pub(crate) async fn require_signature(
    State(state): State<HttpState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(verifier) = state.verifier() else {
        log::error!(
            "Rejecting {}: server public key is not configured",
            request.uri().path()
        );
        return auth_error_response(&AuthError::MissingPublicKey);
    };

    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| request.uri().clone());
    let path = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());

    let headers = request.headers();
    let signed = SignedRequest::new(request.method().as_str(), path.as_str())
        .with_headers(|name| headers.get(name).and_then(|value| value.to_str().ok()));

    if let Err(err) = verifier.verify(&signed) {
        log::warn!("Rejected request to {path}: {err}");
        return auth_error_response(&err);
    }
    next.run(request).await
}

pub(crate) async fn resolve_guarded_bind_addrs(
    bind: &str,
    public: bool,
) -> Result<Vec<SocketAddr>> {
    let addrs = resolve_bind_addrs(bind).await?;
    enforce_bind_guard_for_addrs(bind, &addrs, public)?;
    Ok(addrs)
}

pub(crate) fn choose_preferred_bind_addr(addrs: &[SocketAddr]) -> Option<SocketAddr> {
    addrs
        .iter()
        .copied()
        .find(SocketAddr::is_ipv4)
        .or_else(|| addrs.first().copied())
}

async fn resolve_bind_addrs(bind: &str) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host(bind)
        .await
        .with_context(|| format!("Failed to resolve bind address: {bind}"))?
        .collect();

    if addrs.is_empty() {
        anyhow::bail!("Bind address resolved to zero socket addrs: {bind}")
    }
    Ok(addrs)
}

fn enforce_bind_guard_for_addrs(bind: &str, addrs: &[SocketAddr], public: bool) -> Result<()> {
    let any_non_loopback = addrs.iter().any(|addr| !addr.ip().is_loopback());
    if any_non_loopback && !public {
        anyhow::bail!(
            "Refusing to bind to non-loopback address without --public: {bind}. Tool endpoints stay signature-gated either way."
        )
    }
    Ok(())
}
