use std::path::PathBuf;

/// HTTP status codes the server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use courier::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
        }
    }

    /// Maps a numeric code from a peer's status line.
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            200 => Some(StatusCode::Ok),
            400 => Some(StatusCode::BadRequest),
            404 => Some(StatusCode::NotFound),
            _ => None,
        }
    }
}

/// Identifies the software in the `Server` response header.
pub const SERVER_ID: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

/// Current time formatted for the `Date` header (RFC 7231 IMF-fixdate).
pub fn http_date() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// The response body source: a file streamed from disk, or bytes already
/// in memory. The declared Content-Length always comes from the head, not
/// from the source, so the two must be kept in agreement by the responder.
#[derive(Debug)]
pub enum Body {
    File(PathBuf),
    Bytes(Vec<u8>),
    Empty,
}

/// Status line plus the fixed response header set.
///
/// Every response carries exactly these fields, in this order:
/// Date, Server, Content-Length, Content-Type, Connection.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub content_type: String,
    pub content_length: u64,
    pub keep_alive: bool,
}

impl ResponseHead {
    pub fn new(
        status: StatusCode,
        content_type: impl Into<String>,
        content_length: u64,
        keep_alive: bool,
    ) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            content_length,
            keep_alive,
        }
    }

    /// Serializes the status line and the fixed header set, terminated by
    /// the blank line that separates head from body.
    pub fn serialize(&self) -> Vec<u8> {
        let connection = if self.keep_alive { "keep-alive" } else { "close" };
        let head = format!(
            "HTTP/1.1 {} {}\r\n\
             Date: {}\r\n\
             Server: {}\r\n\
             Content-Length: {}\r\n\
             Content-Type: {}\r\n\
             Connection: {}\r\n\r\n",
            self.status.as_u16(),
            self.status.reason_phrase(),
            http_date(),
            SERVER_ID,
            self.content_length,
            self.content_type,
            connection,
        );
        head.into_bytes()
    }
}

/// A complete outbound response.
#[derive(Debug)]
pub struct Response {
    pub head: ResponseHead,
    pub body: Body,
}

impl Response {
    pub fn new(head: ResponseHead, body: Body) -> Self {
        Self { head, body }
    }
}
