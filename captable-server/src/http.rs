//! HTTP API
//!
//! ## Endpoints
//!
//! - `GET /health` - liveness and database counts
//! - `POST /companies/{id}/documents` - upload (file as base64 JSON field)
//! - `GET /companies/{id}/documents` - documents with signature requests
//! - `GET /companies/{id}/cap-table[?as_of=YYYY-MM-DD]` - ownership snapshot
//! - `GET /companies/{id}/transactions` - equity ledger
//! - `GET /companies/{id}/members` - memberships
//! - `POST /companies/{id}/members` - add board member by email
//! - `DELETE /companies/{id}/members/{user_id}` - remove board member
//! - `GET /signatures/pending` - the caller's pending requests
//! - `POST /signatures/{id}/sign` - sign
//! - `POST /signatures/{id}/decline` - decline
//! - `GET /documents/{id}/url[?variant=signed]` - expiring download URL
//! - `GET /documents/{id}/audit` - audit trail
//! - `DELETE /documents/{id}` - delete document and blobs
//! - `POST /documents/{id}/regenerate` - regenerate the signed PDF
//! - `POST /admin/regenerate-signed-pdfs` - repair sweep over owned companies
//! - `POST /instruments/{id}/convert` - convert a SAFE / note
//! - `GET /files/{path}?expires=..&token=..` - download through a signed URL
//!
//! The acting user comes from the `x-principal-id` header, set by the
//! authenticating gateway in front of this server.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use chrono::NaiveDate;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::document_store::{content_type_for, UrlSigner};
use crate::error::CapTableError;
use crate::principal::ActingPrincipal;
use crate::services::response::{self, HttpResponse};
use crate::services::{ConversionRequest, FileVariant, Services, UploadRequest};

/// Header carrying the authenticated user id.
pub const PRINCIPAL_HEADER: &str = "x-principal-id";

const DEFAULT_MAX_BODY_BYTES: usize = 40 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct UploadBody {
    title: String,
    #[serde(default)]
    description: Option<String>,
    file_name: String,
    file_type: String,
    /// Base64 file contents
    file_base64: String,
    #[serde(default)]
    requires_signature: bool,
    #[serde(default)]
    signer_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SignBody {
    signature_data: String,
}

#[derive(Debug, Default, Deserialize)]
struct DeclineBody {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddMemberBody {
    email: String,
}

/// HTTP server for the cap table API
pub struct HttpServer {
    services: Arc<Services>,
    bind_addr: SocketAddr,
    file_signer: Option<UrlSigner>,
    max_body_bytes: usize,
}

impl HttpServer {
    pub fn new(services: Arc<Services>, bind_addr: SocketAddr) -> Self {
        Self {
            services,
            bind_addr,
            file_signer: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Serve `/files/...` for URLs signed by `signer`.
    pub fn with_file_signer(mut self, signer: UrlSigner) -> Self {
        self.file_signer = Some(signer);
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), CapTableError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    async fn handle_request(&self, req: Request<Incoming>) -> Result<HttpResponse, Infallible> {
        let (parts, body) = req.into_parts();
        debug!(method = %parts.method, path = %parts.uri.path(), "HTTP request");

        let body = match Limited::new(body, self.max_body_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<http_body_util::LengthLimitError>().is_some() => {
                return Ok(response::payload_too_large());
            }
            Err(e) => return Ok(response::bad_request(&format!("Failed to read body: {}", e))),
        };

        Ok(self
            .dispatch(&parts.method, parts.uri.path(), parts.uri.query(), &parts.headers, body)
            .await)
    }

    /// Route one request. Separate from the connection handling so routes
    /// can be exercised without a socket.
    pub async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> HttpResponse {
        let segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();

        match (method.clone(), segments.as_slice()) {
            (Method::GET, ["health"]) => return self.health(),
            (Method::GET, ["files", rest @ ..]) if !rest.is_empty() => {
                return self.serve_file(&rest.join("/"), query).await;
            }
            _ => {}
        }

        let Some(principal) = principal_from(headers) else {
            return response::unauthorized("Missing x-principal-id header");
        };
        let p = &principal;
        let svc = &self.services;

        match (method.clone(), segments.as_slice()) {
            (Method::POST, ["companies", company_id, "documents"]) => self.upload(p, company_id, &body).await,
            (Method::GET, ["companies", company_id, "documents"]) => {
                response::from_result(svc.documents.company_documents(p, company_id))
            }
            (Method::GET, ["companies", company_id, "cap-table"]) => {
                let as_of = match query_param(query, "as_of").map(|d| d.parse::<NaiveDate>()).transpose() {
                    Ok(as_of) => as_of,
                    Err(_) => return response::bad_request("as_of must be YYYY-MM-DD"),
                };
                response::from_result(svc.cap_table.snapshot(p, company_id, as_of))
            }
            (Method::GET, ["companies", company_id, "transactions"]) => {
                response::from_result(svc.cap_table.transactions(p, company_id))
            }
            (Method::GET, ["companies", company_id, "members"]) => {
                response::from_result(svc.members.list(p, company_id))
            }
            (Method::POST, ["companies", company_id, "members"]) => match parse_json::<AddMemberBody>(&body) {
                Ok(req) => response::from_create_result(svc.members.add_board_member(p, company_id, &req.email)),
                Err(resp) => resp,
            },
            (Method::DELETE, ["companies", company_id, "members", user_id]) => {
                response::from_result(svc.members.remove_board_member(p, company_id, user_id))
            }
            (Method::GET, ["signatures", "pending"]) => response::from_result(svc.documents.pending_signatures(p)),
            (Method::POST, ["signatures", request_id, "sign"]) => match parse_json::<SignBody>(&body) {
                Ok(req) => response::from_result(svc.documents.sign(p, request_id, &req.signature_data).await),
                Err(resp) => resp,
            },
            (Method::POST, ["signatures", request_id, "decline"]) => {
                let req = if body.is_empty() {
                    DeclineBody::default()
                } else {
                    match parse_json::<DeclineBody>(&body) {
                        Ok(req) => req,
                        Err(resp) => return resp,
                    }
                };
                response::from_result(svc.documents.decline(p, request_id, req.reason.as_deref()))
            }
            (Method::GET, ["documents", document_id, "url"]) => {
                let variant = match query_param(query, "variant").as_deref() {
                    None | Some("original") => FileVariant::Original,
                    Some("signed") => FileVariant::Signed,
                    Some(_) => return response::bad_request("variant must be original or signed"),
                };
                response::from_result(svc.documents.document_url(p, document_id, variant))
            }
            (Method::GET, ["documents", document_id, "audit"]) => {
                response::from_result(svc.documents.audit_log(p, document_id))
            }
            (Method::DELETE, ["documents", document_id]) => {
                response::from_result(svc.documents.delete(p, document_id).await)
            }
            (Method::POST, ["documents", document_id, "regenerate"]) => {
                let result = svc.artifacts.regenerate(p, document_id).await;
                response::from_result(result.map(|path| serde_json::json!({ "signed_file_path": path })))
            }
            (Method::POST, ["admin", "regenerate-signed-pdfs"]) => {
                response::from_result(svc.artifacts.repair_owned(p).await)
            }
            (Method::POST, ["instruments", instrument_id, "convert"]) => {
                match parse_json::<ConversionRequest>(&body) {
                    Ok(req) => response::from_result(svc.cap_table.convert_instrument(p, instrument_id, req)),
                    Err(resp) => resp,
                }
            }
            (_, ["companies", _, "documents" | "cap-table" | "transactions" | "members"])
            | (_, ["companies", _, "members", _])
            | (_, ["signatures", _, _])
            | (_, ["documents", _, ..])
            | (_, ["admin", "regenerate-signed-pdfs"])
            | (_, ["instruments", _, "convert"]) => response::method_not_allowed(),
            _ => response::not_found("Not found"),
        }
    }

    fn health(&self) -> HttpResponse {
        match self.services.db.stats() {
            Ok(stats) => response::ok(&serde_json::json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "stats": stats,
            })),
            Err(e) => response::error_response(e),
        }
    }

    async fn upload(&self, principal: &ActingPrincipal, company_id: &str, body: &Bytes) -> HttpResponse {
        let payload: UploadBody = match parse_json(body) {
            Ok(payload) => payload,
            Err(resp) => return resp,
        };
        let file_bytes = match BASE64.decode(payload.file_base64.trim()) {
            Ok(bytes) => bytes,
            Err(e) => return response::bad_request(&format!("file_base64 is not valid base64: {}", e)),
        };

        let request = UploadRequest {
            company_id: company_id.to_string(),
            title: payload.title,
            description: payload.description,
            file_name: payload.file_name,
            file_type: payload.file_type,
            file_bytes,
            requires_signature: payload.requires_signature,
            signer_ids: payload.signer_ids,
        };
        response::from_create_result(self.services.documents.upload(principal, request).await)
    }

    async fn serve_file(&self, path: &str, query: Option<&str>) -> HttpResponse {
        let Some(signer) = &self.file_signer else {
            return response::not_found("Not found");
        };
        let expires = query_param(query, "expires").and_then(|e| e.parse::<i64>().ok());
        let token = query_param(query, "token");
        let (Some(expires), Some(token)) = (expires, token) else {
            return response::error_message(hyper::StatusCode::FORBIDDEN, "Missing or malformed signature");
        };
        if !signer.verify(path, expires, &token) {
            return response::error_message(hyper::StatusCode::FORBIDDEN, "Invalid or expired link");
        }

        match self.services.store.get(path).await {
            Ok(bytes) => response::binary_response(content_type_for(path), bytes),
            Err(crate::document_store::DocumentStoreError::NotFound(_)) => response::not_found("File not found"),
            Err(e) => response::error_response(e.into()),
        }
    }
}

fn principal_from(headers: &HeaderMap) -> Option<ActingPrincipal> {
    headers
        .get(PRINCIPAL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ActingPrincipal::new)
}

fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, HttpResponse> {
    serde_json::from_slice(body).map_err(|e| response::bad_request(&format!("Invalid JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_query_param() {
        assert_eq!(query_param(Some("variant=signed&x=1"), "variant").as_deref(), Some("signed"));
        assert_eq!(query_param(Some("as_of=2024-01-31"), "as_of").as_deref(), Some("2024-01-31"));
        assert_eq!(query_param(Some("x=1"), "variant"), None);
        assert_eq!(query_param(None, "variant"), None);
    }

    #[test]
    fn test_principal_header() {
        let mut headers = HeaderMap::new();
        assert!(principal_from(&headers).is_none());
        headers.insert(PRINCIPAL_HEADER, HeaderValue::from_static("  "));
        assert!(principal_from(&headers).is_none());
        headers.insert(PRINCIPAL_HEADER, HeaderValue::from_static("user-1"));
        assert_eq!(principal_from(&headers).unwrap().user_id(), "user-1");
    }
}
