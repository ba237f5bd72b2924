use std::collections::HashMap;
use std::io::{self, BufRead, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use hmpi_core::{
    Calculator, IndexError, ReferenceTable, CAUTION_THRESHOLD, UNSAFE_THRESHOLD, WEIGHT_CONSTANT,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::metrics::RequestMetrics;
use crate::protocol::{
    CalculateRequest, CalculateResponse, ErrorBody, RequestError, INTERNAL_CALCULATION_ERROR,
};

const MAX_DRAIN_BYTES: u64 = 8 * 1024 * 1024;
/// Upper bound on the request line plus headers.
const MAX_HEAD_BYTES: u64 = 16 * 1024;

#[derive(Clone)]
pub struct HmpiServer {
    config: Arc<ServerConfig>,
    calculator: Calculator<'static>,
    metrics: Arc<RequestMetrics>,
}

impl HmpiServer {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_reference_table(config, ReferenceTable::builtin())
    }

    pub fn with_reference_table(config: ServerConfig, table: &'static ReferenceTable) -> Self {
        Self {
            config: Arc::new(config),
            calculator: Calculator::new(table),
            metrics: Arc::new(RequestMetrics::new()),
        }
    }

    /// Fails if the reference table cannot produce a sub-index for every metal.
    pub fn validate(&self) -> Result<(), IndexError> {
        self.calculator.table().validate()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }

    pub fn serve_http(&self) -> io::Result<()> {
        let listener = TcpListener::bind(&self.config.addr)?;
        self.serve_listener(&listener)
    }

    /// Accepts connections forever, one handler thread per connection.
    pub fn serve_listener(&self, listener: &TcpListener) -> io::Result<()> {
        info!(addr = %listener.local_addr()?, "hmpi http listening");
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let server = self.clone();
                    let spawned = thread::Builder::new()
                        .name("hmpi-conn".to_string())
                        .spawn(move || {
                            if let Err(err) = server.handle_http_connection(stream) {
                                warn!(error = %err, "hmpi http request error");
                            }
                        });
                    if let Err(err) = spawned {
                        warn!(error = %err, "failed to spawn connection handler");
                    }
                }
                Err(err) => {
                    warn!(error = %err, "hmpi http accept error");
                }
            }
        }
        Ok(())
    }

    fn handle_http_connection(&self, mut stream: TcpStream) -> io::Result<()> {
        stream.set_read_timeout(Some(self.config.read_timeout))?;
        let started = Instant::now();
        let mut reader = io::BufReader::new(stream.try_clone()?);
        let response = match read_http_request(&mut reader, self.config.max_body_bytes) {
            Ok(Some(req)) => {
                let method = req.method.clone();
                let path = req.path.clone();
                let response = self.dispatch(req);
                debug!(
                    %method,
                    %path,
                    status = response.status,
                    latency_ms = started.elapsed().as_secs_f64() * 1000.0,
                    "handled request"
                );
                response
            }
            Ok(None) => return Ok(()),
            Err(RequestError::Io(err)) => return Err(err),
            Err(err) => {
                debug!(error = %err, "rejected request");
                self.metrics.record_request("", err.status());
                self.with_cors(HttpResponse::json(
                    err.status(),
                    &ErrorBody::new(err.to_string()),
                ))
            }
        };
        write_http_response(&mut stream, &response)
    }

    /// Routes one parsed request. Paths are matched without their query string.
    pub fn dispatch(&self, req: HttpRequest) -> HttpResponse {
        let path = req.path.clone();
        let response = self.route(req);
        self.metrics.record_request(&path, response.status);
        if path.starts_with("/api/") {
            self.with_cors(response)
        } else {
            response
        }
    }

    fn route(&self, req: HttpRequest) -> HttpResponse {
        let path = req.path.as_str();

        if req.method == "OPTIONS" && path.starts_with("/api/") {
            return HttpResponse::empty(204)
                .with_header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
                .with_header("Access-Control-Allow-Headers", "Content-Type")
                .with_header("Access-Control-Max-Age", "86400");
        }

        let allowed = match path {
            "/api/health" | "/health" | "/api/hmpi/reference" | "/metrics" => "GET",
            "/api/hmpi/calculate" => "POST",
            _ => {
                return HttpResponse::json(
                    404,
                    &ErrorBody::new(format!("no route for {path}; use POST /api/hmpi/calculate")),
                );
            }
        };
        if req.method != allowed {
            return HttpResponse::json(
                405,
                &ErrorBody::new(format!("{path} only accepts {allowed}")),
            )
            .with_header("Allow", allowed);
        }

        match path {
            "/api/health" | "/health" => HttpResponse::json(200, &json!({"status":"ok"})),
            "/metrics" => HttpResponse::text(
                200,
                "text/plain; version=0.0.4; charset=utf-8",
                self.metrics.render_text(),
            ),
            "/api/hmpi/reference" => HttpResponse::json(200, &self.reference_body()),
            _ => self.calculate(&req),
        }
    }

    fn calculate(&self, req: &HttpRequest) -> HttpResponse {
        let readings = match CalculateRequest::from_body(&req.body).concentrations() {
            Ok(v) => v,
            Err(err) => return HttpResponse::json(err.status(), &ErrorBody::new(err.to_string())),
        };

        match self.calculator.assess(readings) {
            Ok(assessment) => {
                self.metrics.record_calculation(true);
                let detail = req
                    .query
                    .get("detail")
                    .is_some_and(|v| v.is_empty() || v.eq_ignore_ascii_case("true") || v == "1");
                let body = CalculateResponse {
                    result: assessment.result,
                    metals: detail.then_some(assessment.contributions),
                    ignored: detail.then_some(assessment.ignored),
                };
                HttpResponse::json(200, &body)
            }
            Err(IndexError::InvalidInput(message)) => {
                self.metrics.record_calculation(false);
                HttpResponse::json(400, &ErrorBody::new(message))
            }
            Err(err) => {
                self.metrics.record_calculation(false);
                error!(error = %err, "index calculation failed");
                HttpResponse::json(500, &ErrorBody::new(INTERNAL_CALCULATION_ERROR))
            }
        }
    }

    fn reference_body(&self) -> Value {
        reference_json(self.calculator.table())
    }

    fn with_cors(&self, response: HttpResponse) -> HttpResponse {
        response.with_header("Access-Control-Allow-Origin", &self.config.cors_origin)
    }
}

impl Default for HmpiServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

fn reference_json(table: &ReferenceTable) -> Value {
    json!({
        "unit": "mg/L",
        "weight_constant": WEIGHT_CONSTANT,
        "metals": table.entries().iter().map(|e| {
            json!({
                "metal": e.metal.name(),
                "symbol": e.metal.symbol(),
                "standard": e.standard,
                "ideal": e.ideal,
                "weight": e.weight(),
            })
        }).collect::<Vec<_>>(),
        "classification": [
            {"label": "Safe", "hpi_below": CAUTION_THRESHOLD},
            {"label": "Caution", "hpi_from": CAUTION_THRESHOLD, "hpi_below": UNSAFE_THRESHOLD},
            {"label": "Unsafe", "hpi_from": UNSAFE_THRESHOLD},
        ],
    })
}

#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: &str, path_with_query: &str, body: impl Into<Vec<u8>>) -> Self {
        let (path, query) = parse_path_query(path_with_query);
        Self {
            method: method.to_string(),
            path,
            query,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        Self {
            status,
            content_type: "application/json",
            headers: Vec::new(),
            body,
        }
    }

    fn text(status: u16, content_type: &'static str, body: String) -> Self {
        Self {
            status,
            content_type,
            headers: Vec::new(),
            body: body.into_bytes(),
        }
    }

    fn empty(status: u16) -> Self {
        Self::text(status, "text/plain", String::new())
    }

    fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

fn read_http_request<R: BufRead>(
    reader: &mut R,
    max_body_bytes: usize,
) -> Result<Option<HttpRequest>, RequestError> {
    let mut budget = MAX_HEAD_BYTES;
    let Some(line) = read_head_line(reader, &mut budget)? else {
        return Ok(None);
    };
    if line.is_empty() {
        return Ok(None);
    }

    let mut parts = line.split_whitespace();
    let Some(method) = parts.next() else {
        return Err(RequestError::Malformed("missing method"));
    };
    let Some(path_with_query) = parts.next() else {
        return Err(RequestError::Malformed("missing path"));
    };
    let (path, query) = parse_path_query(path_with_query);

    let mut content_length = 0usize;
    while let Some(header) = read_head_line(reader, &mut budget)? {
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| RequestError::Malformed("invalid content-length"))?;
            }
        }
    }

    if content_length > max_body_bytes {
        // Unread input makes the close reset the connection before the client sees the 413.
        let pending = u64::try_from(content_length)
            .unwrap_or(u64::MAX)
            .min(MAX_DRAIN_BYTES);
        let _ = io::copy(&mut (&mut *reader).take(pending), &mut io::sink());
        return Err(RequestError::BodyTooLarge {
            limit: max_body_bytes,
        });
    }
    let mut body = vec![0_u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body)?;
    }
    Ok(Some(HttpRequest {
        method: method.to_ascii_uppercase(),
        path,
        query,
        body,
    }))
}

/// Reads one CRLF-terminated head line, charging its length against `budget`.
/// Returns `None` at end of input.
fn read_head_line<R: BufRead>(
    reader: &mut R,
    budget: &mut u64,
) -> Result<Option<String>, RequestError> {
    let mut line = String::new();
    let read = (&mut *reader).take(*budget).read_line(&mut line)?;
    if read == 0 {
        if *budget == 0 {
            return Err(RequestError::HeadTooLarge {
                limit: MAX_HEAD_BYTES,
            });
        }
        return Ok(None);
    }
    *budget = budget.saturating_sub(u64::try_from(read).unwrap_or(u64::MAX));
    if !line.ends_with('\n') && *budget == 0 {
        return Err(RequestError::HeadTooLarge {
            limit: MAX_HEAD_BYTES,
        });
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn write_http_response(stream: &mut TcpStream, response: &HttpResponse) -> io::Result<()> {
    let reason = http_reason_phrase(response.status);
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        reason,
        response.content_type,
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes())?;
    stream.write_all(&response.body)?;
    stream.flush()
}

fn http_reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

fn parse_path_query(raw: &str) -> (String, HashMap<String, String>) {
    let (path, query) = raw.split_once('?').unwrap_or((raw, ""));
    let query = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.to_string(), value.to_string())
        })
        .collect();
    (path.to_string(), query)
}
