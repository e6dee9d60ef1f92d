use crate::http::parser::{FieldSet, HeaderBlock, ParseError, parse_request_line};

/// HTTP methods the service responds to.
///
/// The wire protocol is deliberately restricted: GET retrieves a file,
/// PUT uploads one. Anything else on a request line is rejected with 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a file under the server root
    GET,
    /// PUT - Upload a file into the saving directory
    PUT,
}

impl Method {
    /// Matches the literal first token of a request line.
    ///
    /// # Example
    ///
    /// ```
    /// # use courier::http::request::Method;
    /// assert_eq!(Method::from_token("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_token("get"), None);
    /// ```
    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "PUT" => Some(Method::PUT),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::PUT => "PUT",
        }
    }
}

/// A parsed inbound request: the validated request line plus header fields.
///
/// Created fresh per message by the connection handler and discarded after
/// its response has been sent. The body, when one is declared, stays on the
/// wire; the PUT responder drains it separately under the declared length.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Request target path, e.g. "/index.html"
    pub target: String,
    /// Version token, "HTTP/1.0" or "HTTP/1.1"
    pub version: String,
    /// Header fields in wire order
    pub fields: FieldSet,
}

impl Request {
    /// Builds a request from a framed header block, validating the request
    /// line. Errors map to a 400 response on the server side.
    pub fn from_block(block: HeaderBlock) -> Result<Self, ParseError> {
        let line = parse_request_line(&block.start_line)?;
        Ok(Request {
            method: line.method,
            target: line.target,
            version: line.version,
            fields: block.fields,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.fields.get(name)
    }

    /// Declared body length, 0 when absent.
    pub fn content_length(&self) -> Result<u64, ParseError> {
        self.fields.content_length()
    }

    /// Whether the connection should serve another request after this one.
    ///
    /// Only an explicit `Connection: keep-alive` keeps the connection open;
    /// an absent field means close, regardless of version.
    pub fn keep_alive(&self) -> bool {
        self.fields.keep_alive()
    }
}
