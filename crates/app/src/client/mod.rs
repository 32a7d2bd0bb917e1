//! HTTP packing solver client.

use std::time::Duration;

use async_trait::async_trait;
use lading::solver::{PackingSolver, PlacementResult, SolveError, SolvePhase, SolveRequest};
use mockall::automock;
use reqwest::{Client, header::AUTHORIZATION};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::SolverConfig;

mod wire;

use wire::{CalculateRequest, CalculateResponse, ErrorBody};

/// Path of the calculate endpoint, relative to the solver base URL.
pub const CALCULATE_PATH: &str = "/api/v1/tools/packing/calculate";

/// Errors raised below the status-code layer.
#[derive(Debug, Error)]
pub enum HttpSolverError {
    /// The request could not be sent or the body could not be read.
    #[error("solver request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The request body could not be encoded.
    #[error("failed to encode solver request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A POST to the solver, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// Absolute endpoint URL
    pub url: String,

    /// Bearer token for the caller's session, if any
    pub token: Option<String>,

    /// JSON body
    pub body: serde_json::Value,
}

/// Raw solver response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,

    /// Response body text
    pub body: String,
}

/// Sends solver requests over the wire.
#[automock]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the raw response.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, HttpSolverError>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Create a transport with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, HttpSolverError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, HttpSolverError> {
        let mut builder = self.http.post(&request.url).json(&request.body);

        if let Some(token) = &request.token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(TransportResponse { status, body })
    }
}

/// Packing solver reached over HTTP.
#[derive(Debug)]
pub struct HttpSolver<T> {
    transport: T,
    url: String,
    token: Option<String>,
}

impl<T: Transport> HttpSolver<T> {
    /// Create a solver that posts to `base_url` through `transport`.
    pub fn new(transport: T, base_url: &str, token: Option<String>) -> Self {
        Self {
            transport,
            url: format!("{}{CALCULATE_PATH}", base_url.trim_end_matches('/')),
            token,
        }
    }

    /// Endpoint URL requests are sent to
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl HttpSolver<ReqwestTransport> {
    /// Build a `reqwest`-backed solver from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &SolverConfig) -> Result<Self, HttpSolverError> {
        let transport = ReqwestTransport::new(config.timeout())?;

        Ok(Self::new(
            transport,
            &config.solver_url,
            config.session_token.clone(),
        ))
    }
}

impl<T: Transport> PackingSolver for HttpSolver<T> {
    #[instrument(
        name = "solver.http.solve",
        skip(self, request),
        fields(
            phase = request.phase.as_str(),
            items = request.items.len(),
            obstacles = request.obstacles.len()
        ),
        err
    )]
    async fn solve(&self, request: &SolveRequest) -> Result<PlacementResult, SolveError> {
        let body = serde_json::to_value(CalculateRequest::from(request))
            .map_err(|error| unreachable_error(&HttpSolverError::from(error)))?;

        let response = self
            .transport
            .send(TransportRequest {
                url: self.url.clone(),
                token: self.token.clone(),
                body,
            })
            .await
            .map_err(|error| unreachable_error(&error))?;

        debug!(status = response.status, "solver responded");

        interpret(&response, request.phase)
    }
}

fn unreachable_error(error: &HttpSolverError) -> SolveError {
    warn!(%error, "solver unreachable");

    SolveError::Unreachable {
        detail: error.to_string(),
    }
}

/// Map a raw response onto a placement result or a [`SolveError`].
///
/// 401 and 402 are decided on the status alone, before the body is read.
fn interpret(response: &TransportResponse, phase: SolvePhase) -> Result<PlacementResult, SolveError> {
    match response.status {
        401 => Err(SolveError::Unauthenticated),
        402 => Err(SolveError::QuotaExceeded),
        200..=299 => {
            let parsed: CalculateResponse =
                serde_json::from_str(&response.body).map_err(|error| SolveError::Unreachable {
                    detail: format!("undecodable solver response: {error}"),
                })?;

            if parsed.status != "success" {
                return Err(SolveError::Rejected {
                    detail: parsed
                        .message
                        .unwrap_or_else(|| format!("solver status {}", parsed.status)),
                });
            }

            Ok(parsed.into_result(phase.origin()))
        }
        400..=499 => {
            let detail = serde_json::from_str::<ErrorBody>(&response.body)
                .map_or_else(|_| response.body.clone(), |body| body.detail);

            Err(SolveError::Rejected { detail })
        }
        status => Err(SolveError::Unreachable {
            detail: format!("solver answered with status {status}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use lading::{
        container::ContainerSpec,
        placements::Origin,
        solver::DemandItem,
    };
    use serde_json::json;
    use testresult::TestResult;

    use super::*;

    fn request(phase: SolvePhase) -> SolveRequest {
        SolveRequest {
            container: ContainerSpec::new(2400, 2600, 12000),
            items: std::iter::once(DemandItem {
                name: "BOX-1#1".to_string(),
                width: 1000,
                height: 1000,
                depth: 1000,
                count: 2,
            })
            .collect(),
            obstacles: Vec::new(),
            phase,
        }
    }

    fn respond(status: u16, body: &str) -> MockTransport {
        let mut transport = MockTransport::new();
        let body = body.to_string();

        transport
            .expect_send()
            .once()
            .return_once(move |_| Ok(TransportResponse { status, body }));

        transport
    }

    #[tokio::test]
    async fn posts_to_calculate_endpoint_with_token() -> TestResult {
        let mut transport = MockTransport::new();

        transport
            .expect_send()
            .once()
            .withf(|sent| {
                sent.url == "http://solver.test/api/v1/tools/packing/calculate"
                    && sent.token.as_deref() == Some("secret")
                    && sent.body["phase"] == json!("auto")
                    && sent.body["bin_size"] == json!([2400, 2600, 12000])
            })
            .return_once(|_| {
                Ok(TransportResponse {
                    status: 200,
                    body: json!({
                        "status": "success",
                        "items": [{"name": "BOX-1#1", "pos": [0, 0, 0], "dim": [1000, 1000, 1000]}],
                        "unpacked": [{"name": "BOX-1#1", "left": 1, "total": 2}],
                    })
                    .to_string(),
                })
            });

        let solver = HttpSolver::new(transport, "http://solver.test/", Some("secret".to_string()));
        let result = solver.solve(&request(SolvePhase::Auto)).await?;

        assert_eq!(result.placements.len(), 1);
        assert_eq!(
            result.placements.first().map(|placed| placed.origin()),
            Some(Origin::Bulk)
        );
        assert_eq!(result.unfulfilled.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_and_payment_required_skip_the_body() {
        let login = HttpSolver::new(respond(401, "<html>"), "http://solver.test", None);
        let upgrade = HttpSolver::new(respond(402, "not json"), "http://solver.test", None);

        assert_eq!(
            login.solve(&request(SolvePhase::Prefill)).await,
            Err(SolveError::Unauthenticated)
        );
        assert_eq!(
            upgrade.solve(&request(SolvePhase::Prefill)).await,
            Err(SolveError::QuotaExceeded)
        );
    }

    #[tokio::test]
    async fn bad_request_surfaces_detail() {
        let solver = HttpSolver::new(
            respond(400, r#"{"detail": "prefilled item outside the container"}"#),
            "http://solver.test",
            None,
        );

        assert_eq!(
            solver.solve(&request(SolvePhase::Prefill)).await,
            Err(SolveError::Rejected {
                detail: "prefilled item outside the container".to_string()
            })
        );
    }

    #[tokio::test]
    async fn non_success_status_surfaces_message() {
        let solver = HttpSolver::new(
            respond(200, r#"{"status": "error", "message": "tool disabled"}"#),
            "http://solver.test",
            None,
        );

        assert_eq!(
            solver.solve(&request(SolvePhase::Auto)).await,
            Err(SolveError::Rejected {
                detail: "tool disabled".to_string()
            })
        );
    }

    #[tokio::test]
    async fn server_errors_and_garbage_are_unreachable() {
        let server_error = HttpSolver::new(respond(503, ""), "http://solver.test", None);
        let garbage = HttpSolver::new(respond(200, "<html>"), "http://solver.test", None);

        assert!(matches!(
            server_error.solve(&request(SolvePhase::Auto)).await,
            Err(SolveError::Unreachable { .. })
        ));
        assert!(matches!(
            garbage.solve(&request(SolvePhase::Auto)).await,
            Err(SolveError::Unreachable { .. })
        ));
    }
}
