use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

/// A running `hmpid` on a free local port, killed on drop.
struct Daemon {
    addr: String,
    child: Child,
}

impl Daemon {
    fn start(env: &[(&str, &str)]) -> Self {
        let addr = TcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .expect("free port")
            .to_string();
        let child = Command::new(env!("CARGO_BIN_EXE_hmpid"))
            .env("HMPID_TRANSPORT", "http")
            .env("HMPI_HTTP_ADDR", &addr)
            .envs(env.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn hmpid");
        let daemon = Self { addr, child };
        let ready = (0..80).any(|_| {
            let up = TcpStream::connect(&daemon.addr).is_ok();
            if !up {
                thread::sleep(Duration::from_millis(25));
            }
            up
        });
        assert!(ready, "hmpid not listening on {}", daemon.addr);
        daemon
    }

    fn request(&self, method: &str, path: &str, body: &str) -> Reply {
        let mut stream = TcpStream::connect(&self.addr).expect("connect");
        write!(
            stream,
            "{method} {path} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            self.addr,
            body.len()
        )
        .expect("write request");
        let mut raw = String::new();
        stream.read_to_string(&mut raw).expect("read response");
        Reply::parse(&raw)
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

struct Reply {
    status: u16,
    head: String,
    body: String,
}

impl Reply {
    fn parse(raw: &str) -> Self {
        let (head, body) = raw.split_once("\r\n\r\n").unwrap_or((raw, ""));
        let status = head
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
        Self {
            status,
            head: head.to_string(),
            body: body.to_string(),
        }
    }

    fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("json body")
    }
}

#[test]
fn http_health_and_calculate_work() {
    let daemon = Daemon::start(&[]);

    let health = daemon.request("GET", "/api/health", "");
    assert_eq!(health.status, 200);
    assert!(health.body.contains("\"status\":\"ok\""));
    assert!(health.head.contains("Access-Control-Allow-Origin: *"));

    let body = r#"{"heavyMetalConcentrations":{"lead":0.00,"cadmium":0.002,"arsenic":0.010,"mercury":0.001,"chromium":0.002}}"#;
    let calc = daemon.request("POST", "/api/hmpi/calculate", body);
    assert_eq!(calc.status, 200);
    let json = calc.json();
    let hpi = json.get("HPI").and_then(serde_json::Value::as_f64).expect("HPI");
    assert!((hpi - 48.722_222_222_222_23).abs() < 1e-9);
    assert_eq!(
        json.get("classification").and_then(|v| v.as_str()),
        Some("Safe")
    );

    let clean = daemon.request(
        "POST",
        "/api/hmpi/calculate",
        r#"{"heavyMetalConcentrations":{"iron":0.0,"copper":0.01}}"#,
    );
    assert_eq!(clean.status, 200);
    let hpi = clean.json().get("HPI").and_then(serde_json::Value::as_f64).expect("HPI");
    assert!(hpi >= 0.0);

    let bad = daemon.request(
        "POST",
        "/api/hmpi/calculate",
        r#"{"heavyMetalConcentrations":{"lead":"abc"}}"#,
    );
    assert_eq!(bad.status, 400);
    assert!(bad.json().get("error").is_some());
}

#[test]
fn http_preflight_and_body_limit_work() {
    let daemon = Daemon::start(&[
        ("HMPI_CORS_ORIGIN", "https://safesip.example"),
        ("HMPI_MAX_BODY_BYTES", "1024"),
    ]);

    let preflight = daemon.request("OPTIONS", "/api/hmpi/calculate", "");
    assert_eq!(preflight.status, 204);
    assert!(preflight
        .head
        .contains("Access-Control-Allow-Origin: https://safesip.example"));
    assert!(preflight
        .head
        .contains("Access-Control-Allow-Methods: GET, POST, OPTIONS"));

    let padding = "x".repeat(2048);
    let oversized = format!(r#"{{"heavyMetalConcentrations":{{"lead":0.01}},"note":"{padding}"}}"#);
    let too_large = daemon.request("POST", "/api/hmpi/calculate", &oversized);
    assert_eq!(too_large.status, 413);

    let metrics = daemon.request("GET", "/metrics", "");
    assert_eq!(metrics.status, 200);
    assert!(metrics.body.contains("hmpi_http_requests_total"));
}

#[test]
fn unsupported_transport_exits_with_error() {
    let status = Command::new(env!("CARGO_BIN_EXE_hmpid"))
        .env("HMPID_TRANSPORT", "stdio")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("run hmpid");
    assert!(!status.success());
}
