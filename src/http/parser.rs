use crate::http::request::Method;
use std::fmt;

/// Errors produced while framing or parsing a message head.
///
/// `Incomplete` is not a failure: it tells the connection loop that the
/// accumulation buffer does not yet hold a full header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Header terminator not in the buffer yet; read more.
    Incomplete,
    /// Stream ended before the header terminator was seen.
    IncompleteHeader,
    /// Request line did not split into exactly three tokens.
    MalformedLine,
    /// Version token was neither HTTP/1.0 nor HTTP/1.1.
    UnsupportedVersion,
    /// Method token was not GET or PUT.
    InvalidMethod,
    /// Content-Length field present but not a number.
    InvalidContentLength,
    /// Status line missing a numeric code.
    InvalidStatus,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Incomplete => write!(f, "header block incomplete"),
            ParseError::IncompleteHeader => write!(f, "stream ended inside header block"),
            ParseError::MalformedLine => write!(f, "request line is not three tokens"),
            ParseError::UnsupportedVersion => write!(f, "unsupported HTTP version"),
            ParseError::InvalidMethod => write!(f, "method is not GET or PUT"),
            ParseError::InvalidContentLength => write!(f, "invalid Content-Length value"),
            ParseError::InvalidStatus => write!(f, "invalid status line"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Locates the end of a header block in `buf`.
///
/// Carriage returns are ignored entirely, so both CRLF and bare-LF line
/// endings are accepted; the terminator is an empty line, i.e. two line
/// feeds with nothing but carriage returns between them. Returns the index
/// one past the final line feed.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    let mut newlines = 0;
    for (i, &b) in buf.iter().enumerate() {
        match b {
            b'\r' => {}
            b'\n' => {
                newlines += 1;
                if newlines == 2 {
                    return Some(i + 1);
                }
            }
            _ => newlines = 0,
        }
    }
    None
}

/// An ordered list of header fields.
///
/// Lookup is by ASCII case-insensitive name and the last occurrence wins,
/// matching the scan order of the wire text.
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    fields: Vec<(String, String)>,
}

impl FieldSet {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Declared body length. Absent means 0.
    pub fn content_length(&self) -> Result<u64, ParseError> {
        match self.get("Content-Length") {
            Some(v) => v.parse().map_err(|_| ParseError::InvalidContentLength),
            None => Ok(0),
        }
    }

    /// Connection persistence. Absent means close.
    pub fn keep_alive(&self) -> bool {
        self.get("Connection")
            .map(|v| v.eq_ignore_ascii_case("keep-alive"))
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A framed message head: the literal first line plus its header fields.
#[derive(Debug, Clone)]
pub struct HeaderBlock {
    pub start_line: String,
    pub fields: FieldSet,
}

impl HeaderBlock {
    /// Parses a complete header block from the front of `buf`.
    ///
    /// Returns the block and the number of bytes consumed, or `Incomplete`
    /// if the terminator has not arrived yet. Header bytes are decoded as
    /// single-byte characters, so decoding itself cannot fail. Header lines
    /// without a colon carry no field and are skipped.
    pub fn parse(buf: &[u8]) -> Result<(HeaderBlock, usize), ParseError> {
        let end = find_header_end(buf).ok_or(ParseError::Incomplete)?;

        let text: String = buf[..end]
            .iter()
            .filter(|&&b| b != b'\r')
            .map(|&b| char::from(b))
            .collect();

        let mut lines = text.lines();
        let start_line = lines.next().unwrap_or_default().to_string();

        let mut fields = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                fields.push((name.trim().to_string(), value.trim().to_string()));
            }
        }

        Ok((
            HeaderBlock {
                start_line,
                fields: FieldSet { fields },
            },
            end,
        ))
    }
}

/// A validated request line.
#[derive(Debug, Clone)]
pub struct RequestLine {
    pub method: Method,
    pub target: String,
    pub version: String,
}

/// Splits a request line on whitespace runs into exactly three tokens and
/// validates the version and method tokens.
pub fn parse_request_line(line: &str) -> Result<RequestLine, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 3 {
        return Err(ParseError::MalformedLine);
    }

    let version = tokens[2];
    if version != "HTTP/1.0" && version != "HTTP/1.1" {
        return Err(ParseError::UnsupportedVersion);
    }

    let method = Method::from_token(tokens[0]).ok_or(ParseError::InvalidMethod)?;

    Ok(RequestLine {
        method,
        target: tokens[1].to_string(),
        version: version.to_string(),
    })
}

/// A parsed response status line.
#[derive(Debug, Clone)]
pub struct StatusLine {
    pub version: String,
    pub code: u16,
    pub reason: String,
}

/// Parses `<version> <code> <reason…>`. The reason phrase is the remainder
/// of the line and may contain spaces.
pub fn parse_status_line(line: &str) -> Result<StatusLine, ParseError> {
    let tokens: Vec<&str> = line.splitn(3, ' ').collect();
    if tokens.len() < 2 {
        return Err(ParseError::MalformedLine);
    }

    let version = tokens[0];
    if version != "HTTP/1.0" && version != "HTTP/1.1" {
        return Err(ParseError::UnsupportedVersion);
    }

    let code: u16 = tokens[1]
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidStatus)?;

    let reason = tokens.get(2).map(|r| r.trim()).unwrap_or("").to_string();

    Ok(StatusLine {
        version: version.to_string(),
        code,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get_block() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let (block, consumed) = HeaderBlock::parse(req).unwrap();

        assert_eq!(block.start_line, "GET / HTTP/1.1");
        assert_eq!(block.fields.get("Host"), Some("example.com"));
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn bare_lf_terminator() {
        let req = b"GET / HTTP/1.0\nConnection: close\n\n";
        let (block, consumed) = HeaderBlock::parse(req).unwrap();

        assert_eq!(block.start_line, "GET / HTTP/1.0");
        assert_eq!(block.fields.get("Connection"), Some("close"));
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn trailing_bytes_not_consumed() {
        let req = b"PUT /f HTTP/1.1\r\nContent-Length: 4\r\n\r\nBODY";
        let (_, consumed) = HeaderBlock::parse(req).unwrap();

        assert_eq!(consumed, req.len() - 4);
    }
}
