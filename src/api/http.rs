// ABOUTME: JSON-over-HTTP/1.1 control-plane client built on hyper.
// ABOUTME: Implements EcsApi and EventsApi against a configured endpoint.

use super::ecs::{
    DescribeServicesRequest, DescribeServicesResponse, DescribeTaskDefinitionRequest,
    DescribeTasksRequest, DescribeTasksResponse, EcsApi, ListTasksRequest, ListTasksResponse,
    RegisterTaskDefinitionRequest, RunTaskRequest, RunTaskResponse, TaskDefinitionResponse,
    UpdateServiceRequest, UpdateServiceResponse,
};
use super::error::ApiError;
use super::events::{
    DescribeRuleRequest, EventsApi, ListTargetsByRuleRequest, ListTargetsByRuleResponse,
    PutTargetsRequest, PutTargetsResponse, Rule,
};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::{ResultExt, Snafu};
use tokio::net::TcpStream;

const ECS_TARGET_PREFIX: &str = "AmazonEC2ContainerServiceV20141113";
const EVENTS_TARGET_PREFIX: &str = "AWSEvents";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Transport-level failures talking to the control-plane endpoint.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HttpError {
    #[snafu(display("invalid endpoint {endpoint}: {reason}"))]
    InvalidEndpoint { endpoint: String, reason: String },

    #[snafu(display("failed to connect to {address}: {source}"))]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[snafu(display("HTTP handshake failed: {source}"))]
    Handshake { source: hyper::Error },

    #[snafu(display("failed to build request: {source}"))]
    BuildRequest { source: hyper::http::Error },

    #[snafu(display("request failed: {source}"))]
    Send { source: hyper::Error },

    #[snafu(display("failed to read response body: {source}"))]
    ReadBody { source: hyper::Error },

    #[snafu(display("failed to encode request: {source}"))]
    Encode { source: serde_json::Error },
}

/// Where and how to reach the control plane.
///
/// `profile` and `region` are carried through opaquely; requests are not signed.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub events_endpoint: Option<String>,
    pub region: Option<String>,
    pub profile: Option<String>,
}

/// A plain `http://host[:port]` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn parse(url: &str) -> Result<Self, HttpError> {
        let invalid = |reason: &str| HttpError::InvalidEndpoint {
            endpoint: url.to_string(),
            reason: reason.to_string(),
        };

        let uri: hyper::Uri = url.parse().map_err(|e: hyper::http::uri::InvalidUri| {
            HttpError::InvalidEndpoint {
                endpoint: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => return Err(invalid(&format!("unsupported scheme {}", other))),
            None => return Err(invalid("missing scheme")),
        }

        let host = uri.host().ok_or_else(|| invalid("missing host"))?;

        Ok(Self {
            host: host.to_string(),
            port: uri.port_u16().unwrap_or(80),
        })
    }

    fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One JSON protocol client for one endpoint and target prefix.
#[derive(Debug, Clone)]
struct JsonClient {
    endpoint: Endpoint,
    target_prefix: &'static str,
}

impl JsonClient {
    async fn call<Req, Resp>(&self, operation: &'static str, request: &Req) -> Result<Resp, ApiError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let (status, body) = self
            .send(operation, request)
            .await
            .map_err(|source| ApiError::Transport { operation, source })?;

        tracing::debug!(operation, status = status.as_u16(), "control-plane response");

        if !status.is_success() {
            return Err(classify_error(operation, status, &body));
        }

        serde_json::from_slice(&body).map_err(|e| ApiError::Decode {
            operation,
            message: e.to_string(),
        })
    }

    async fn send<Req: Serialize>(
        &self,
        operation: &str,
        request: &Req,
    ) -> Result<(StatusCode, Bytes), HttpError> {
        let payload = serde_json::to_vec(request).context(EncodeSnafu)?;
        let address = self.endpoint.authority();

        let stream = TcpStream::connect(&address)
            .await
            .context(ConnectSnafu { address: address.clone() })?;
        let io = TokioIo::new(stream);

        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .context(HandshakeSnafu)?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::warn!("control-plane connection error: {}", e);
            }
        });

        let req = hyper::Request::builder()
            .method("POST")
            .uri("/")
            .header("Host", &address)
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", format!("{}.{}", self.target_prefix, operation))
            .body(Full::new(Bytes::from(payload)))
            .context(BuildRequestSnafu)?;

        let resp = sender.send_request(req).await.context(SendSnafu)?;
        let status = resp.status();
        let body = resp.into_body().collect().await.context(ReadBodySnafu)?;

        Ok((status, body.to_bytes()))
    }
}

/// Map an error response body to an `ApiError`.
///
/// Bodies look like `{"__type": "...#ServiceNotFoundException", "message": "..."}`.
fn classify_error(operation: &'static str, status: StatusCode, body: &[u8]) -> ApiError {
    let parsed: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();

    let code = parsed
        .get("__type")
        .and_then(|v| v.as_str())
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    let message = parsed
        .get("message")
        .or_else(|| parsed.get("Message"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());

    let lowered = message.to_lowercase();
    if code.ends_with("NotFoundException")
        || (code == "ClientException"
            && (lowered.contains("unable to describe") || lowered.contains("not found")))
    {
        return ApiError::NotFound(message);
    }

    ApiError::remote(operation, code, message)
}

/// Control-plane client speaking the JSON protocol over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    ecs: JsonClient,
    events: JsonClient,
}

impl HttpControlPlane {
    pub fn new(config: &ClientConfig) -> Result<Self, HttpError> {
        let ecs_endpoint = Endpoint::parse(&config.endpoint)?;
        let events_endpoint = match config.events_endpoint {
            Some(ref url) => Endpoint::parse(url)?,
            None => ecs_endpoint.clone(),
        };

        tracing::debug!(
            endpoint = %config.endpoint,
            region = config.region.as_deref().unwrap_or("-"),
            profile = config.profile.as_deref().unwrap_or("-"),
            "control-plane client configured"
        );

        Ok(Self {
            ecs: JsonClient {
                endpoint: ecs_endpoint,
                target_prefix: ECS_TARGET_PREFIX,
            },
            events: JsonClient {
                endpoint: events_endpoint,
                target_prefix: EVENTS_TARGET_PREFIX,
            },
        })
    }
}

#[async_trait]
impl EcsApi for HttpControlPlane {
    async fn describe_services(
        &self,
        request: &DescribeServicesRequest,
    ) -> Result<DescribeServicesResponse, ApiError> {
        self.ecs.call("DescribeServices", request).await
    }

    async fn update_service(
        &self,
        request: &UpdateServiceRequest,
    ) -> Result<UpdateServiceResponse, ApiError> {
        self.ecs.call("UpdateService", request).await
    }

    async fn list_tasks(&self, request: &ListTasksRequest) -> Result<ListTasksResponse, ApiError> {
        self.ecs.call("ListTasks", request).await
    }

    async fn describe_tasks(
        &self,
        request: &DescribeTasksRequest,
    ) -> Result<DescribeTasksResponse, ApiError> {
        self.ecs.call("DescribeTasks", request).await
    }

    async fn run_task(&self, request: &RunTaskRequest) -> Result<RunTaskResponse, ApiError> {
        self.ecs.call("RunTask", request).await
    }

    async fn describe_task_definition(
        &self,
        request: &DescribeTaskDefinitionRequest,
    ) -> Result<TaskDefinitionResponse, ApiError> {
        self.ecs.call("DescribeTaskDefinition", request).await
    }

    async fn register_task_definition(
        &self,
        request: &RegisterTaskDefinitionRequest,
    ) -> Result<TaskDefinitionResponse, ApiError> {
        self.ecs.call("RegisterTaskDefinition", request).await
    }
}

#[async_trait]
impl EventsApi for HttpControlPlane {
    async fn describe_rule(&self, request: &DescribeRuleRequest) -> Result<Rule, ApiError> {
        self.events.call("DescribeRule", request).await
    }

    async fn list_targets_by_rule(
        &self,
        request: &ListTargetsByRuleRequest,
    ) -> Result<ListTargetsByRuleResponse, ApiError> {
        self.events.call("ListTargetsByRule", request).await
    }

    async fn put_targets(
        &self,
        request: &PutTargetsRequest,
    ) -> Result<PutTargetsResponse, ApiError> {
        self.events.call("PutTargets", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_defaults_to_port_80() {
        let endpoint = Endpoint::parse("http://localhost").unwrap();
        assert_eq!(endpoint.authority(), "localhost:80");
    }

    #[test]
    fn endpoint_keeps_explicit_port() {
        let endpoint = Endpoint::parse("http://127.0.0.1:4566").unwrap();
        assert_eq!(endpoint.authority(), "127.0.0.1:4566");
    }

    #[test]
    fn endpoint_rejects_https() {
        let err = Endpoint::parse("https://ecs.us-east-1.amazonaws.com").unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn endpoint_rejects_missing_scheme() {
        assert!(Endpoint::parse("localhost:4566").is_err());
    }

    #[test]
    fn service_not_found_maps_to_not_found() {
        let body = br#"{"__type":"com.amazonaws.ecs#ServiceNotFoundException","message":"Service not found."}"#;
        let err = classify_error("UpdateService", StatusCode::BAD_REQUEST, body);
        assert!(err.is_not_found());
    }

    #[test]
    fn missing_task_definition_maps_to_not_found() {
        let body = br#"{"__type":"ClientException","message":"Unable to describe task definition."}"#;
        let err = classify_error("DescribeTaskDefinition", StatusCode::BAD_REQUEST, body);
        assert!(err.is_not_found());
    }

    #[test]
    fn other_errors_keep_code_and_message() {
        let body = br#"{"__type":"ThrottlingException","Message":"Rate exceeded"}"#;
        let err = classify_error("PutTargets", StatusCode::BAD_REQUEST, body);
        assert_eq!(
            err.to_string(),
            "PutTargets failed: ThrottlingException: Rate exceeded"
        );
    }

    #[test]
    fn unparseable_body_uses_status() {
        let err = classify_error("RunTask", StatusCode::INTERNAL_SERVER_ERROR, b"boom");
        assert_eq!(err.to_string(), "RunTask failed: HTTP 500: boom");
    }
}
