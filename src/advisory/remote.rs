use crate::advisory::{Advice, AdvisoryError, AdvisoryRequest, Advisor};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

const API_VERSION: &str = "1.0";

/// Advisor backed by an external text service reached over plain HTTP.
#[derive(Debug)]
pub struct RemoteAdvisor {
    endpoint: String,
    timeout: Duration,
}

impl RemoteAdvisor {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Advisor for RemoteAdvisor {
    fn advise(&self, request: &AdvisoryRequest) -> Result<Advice, AdvisoryError> {
        let payload = serde_json::to_string(&AdviseRequest::new(request))?;
        let body = send_http_json(&self.endpoint, &payload, self.timeout)?;
        let response: AdviseResponse = serde_json::from_str(&body)?;
        Ok(Advice {
            text: response.text,
            suggested_slots: response.suggested_slots,
        })
    }
}

#[derive(Debug, Serialize)]
struct AdviseRequest<'a> {
    api_version: &'static str,
    service: &'a str,
    crowd_level: u32,
    recommended_slot: &'static str,
    crowd_label: &'static str,
}

impl<'a> AdviseRequest<'a> {
    fn new(request: &'a AdvisoryRequest) -> Self {
        Self {
            api_version: API_VERSION,
            service: &request.service,
            crowd_level: request.average_load_percent,
            recommended_slot: request.recommended_slot.label(),
            crowd_label: request.crowd_label.as_str(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AdviseResponse {
    text: String,
    #[serde(default)]
    suggested_slots: Vec<String>,
}

struct ParsedUrl {
    host: String,
    port: u16,
    path: String,
}

fn parse_http_url(endpoint: &str) -> Result<ParsedUrl, AdvisoryError> {
    let trimmed = endpoint
        .strip_prefix("http://")
        .ok_or_else(|| AdvisoryError::InvalidUrl("only http:// supported".to_string()))?;

    let (host_port, path) = match trimmed.split_once('/') {
        Some((host_port, path)) if !path.is_empty() => (host_port, format!("/{path}")),
        Some((host_port, _)) => (host_port, "/".to_string()),
        None => (trimmed, "/".to_string()),
    };
    if host_port.is_empty() {
        return Err(AdvisoryError::InvalidUrl("missing host".to_string()));
    }

    let (host, port) = match host_port.split_once(':') {
        Some((host, port)) if !port.is_empty() => (
            host,
            port.parse::<u16>()
                .map_err(|_| AdvisoryError::InvalidUrl("invalid port".to_string()))?,
        ),
        Some((host, _)) => (host, 80),
        None => (host_port, 80),
    };
    if host.is_empty() {
        return Err(AdvisoryError::InvalidUrl("missing host".to_string()));
    }

    Ok(ParsedUrl {
        host: host.to_string(),
        port,
        path,
    })
}

/// Status and body of a plain HTTP/1.x reply.
#[derive(Debug, PartialEq, Eq)]
struct Reply<'a> {
    status: u16,
    body: &'a str,
}

impl<'a> Reply<'a> {
    fn parse(raw: &'a str) -> Result<Self, AdvisoryError> {
        let malformed = |reason: &str| AdvisoryError::Http(0, reason.to_string());
        let (head, body) = raw
            .split_once("\r\n\r\n")
            .ok_or_else(|| malformed("reply has no header terminator"))?;
        let status_line = head.lines().next().unwrap_or_default();
        let rest = status_line
            .strip_prefix("HTTP/")
            .ok_or_else(|| malformed("reply is not HTTP"))?;
        let status = rest
            .split(' ')
            .nth(1)
            .and_then(|code| code.parse::<u16>().ok())
            .filter(|code| (100..600).contains(code))
            .ok_or_else(|| malformed("reply has no status code"))?;
        Ok(Self { status, body })
    }

    fn into_body(self) -> Result<&'a str, AdvisoryError> {
        if self.status >= 400 {
            return Err(AdvisoryError::Http(self.status, self.body.trim().to_string()));
        }
        Ok(self.body)
    }
}

fn send_http_json(endpoint: &str, body: &str, timeout: Duration) -> Result<String, AdvisoryError> {
    let target = parse_http_url(endpoint)?;
    let addr = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|err| AdvisoryError::Dns(err.to_string()))?
        .next()
        .ok_or_else(|| AdvisoryError::Dns(format!("{} did not resolve", target.host)))?;

    let mut stream = TcpStream::connect_timeout(&addr, timeout).map_err(AdvisoryError::Connect)?;
    for limit in [stream.set_read_timeout(Some(timeout)), stream.set_write_timeout(Some(timeout))] {
        limit.map_err(AdvisoryError::Io)?;
    }

    let head = format!(
        "POST {path} HTTP/1.1\r\nHost: {host}\r\nContent-Type: application/json\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n",
        path = target.path,
        host = target.host,
        len = body.len(),
    );
    stream
        .write_all(head.as_bytes())
        .and_then(|()| stream.write_all(body.as_bytes()))
        .map_err(AdvisoryError::Io)?;

    let mut raw = String::new();
    stream.read_to_string(&mut raw).map_err(AdvisoryError::Io)?;
    Reply::parse(&raw)?.into_body().map(str::to_string)
}
