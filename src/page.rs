//! Generated page

const HEADER_MARKERS : [&str; 5] = ["CONTENT-TYPE: ", "LOCATION: ", "STATUS: ", "X-DB-CONTENT-LENGTH: ", "WWW-AUTHENTICATE: "];

/// Reports whether the page text contains an HTTP header line.
pub fn contains_http_header(text: &str) -> bool {
    let text = text.to_ascii_uppercase();
    HEADER_MARKERS.iter().any(|marker| text.contains(marker))
}

/// HTTP header block of a generated page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub status_code: Option<u16>,
    pub status_description: Option<String>,
    pub redirect_location: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    /// Raw `Set-Cookie` values
    pub cookies: Vec<String>,
    /// Other header lines in the order they appear
    pub other: Vec<(String, String)>,
}

impl Header {
    /// Interprets header lines. Lines that are not `Name: value` pairs are skipped.
    pub fn parse(text: &str) -> Self {
        let mut header = Header::default();
        for line in text.lines().map(|line| line.trim_end_matches('\r')).filter(|line| !line.is_empty()) {
            if let Some(location) = line.strip_prefix("Location: ") {
                header.redirect_location = Some(location.to_string());
            } else if let Some(status) = line.strip_prefix("Status: ") {
                let (code, description) = status.split_once(' ').unwrap_or((status, ""));
                header.status_code = code.parse().ok();
                header.status_description = Some(description.to_string());
            } else if let Some(content_type) = line.strip_prefix("Content-type: ") {
                header.content_type = Some(content_type.to_string());
            } else if let Some(len) = line.strip_prefix("X-DB-Content-length: ") {
                header.content_length = len.trim().parse().ok();
            } else if let Some(cookie) = line.strip_prefix("Set-Cookie: ") {
                header.cookies.push(cookie.to_string());
            } else if let Some((name, value)) = line.split_once(':') {
                header.other.push((name.to_string(), value.trim_start().to_string()));
            }
        }
        header
    }
}

/**
    Page generated by a procedure, split into the header block and the body.

    # Example

    ```
    use plsql_gateway::Page;

    let page = Page::parse("Status: 302 Found\nLocation: /home\n\n<p>moved</p>");
    assert_eq!(page.header.status_code, Some(302));
    assert_eq!(page.header.redirect_location.as_deref(), Some("/home"));
    assert_eq!(page.body, "<p>moved</p>");
    ```
*/
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub header: Header,
    pub body: String,
}

/// Splits the page at the first blank line when it starts with a header block.
pub fn split_header(content: &str) -> (&str, &str) {
    if !contains_http_header(content) {
        return ("", content);
    }
    match content.find("\n\n") {
        Some(pos) => content.split_at(pos + 2),
        None => (content, ""),
    }
}

impl Page {
    pub fn parse(content: &str) -> Self {
        let (header, body) = split_header(content);
        Page { header: Header::parse(header), body: body.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_only() {
        assert!(!contains_http_header("<html>hello</html>"));
        let page = Page::parse("<html>hello</html>");
        assert_eq!(page.header, Header::default());
        assert_eq!(page.body, "<html>hello</html>");
    }

    #[test]
    fn header_lines() {
        let text = "Content-type: text/html; charset=utf-8\nX-DB-Content-length: 5\nSet-Cookie: sid=1; path=/\nSet-Cookie: lang=en\nCache-Control: no-cache\nX-Frame-Options: DENY\n\nhello";
        assert!(contains_http_header("content-type: text/plain\n"));
        let page = Page::parse(text);
        assert_eq!(page.header.content_type.as_deref(), Some("text/html; charset=utf-8"));
        assert_eq!(page.header.content_length, Some(5));
        assert_eq!(page.header.cookies, vec!["sid=1; path=/".to_string(), "lang=en".to_string()]);
        assert_eq!(page.header.other, vec![
            ("Cache-Control".to_string(), "no-cache".to_string()),
            ("X-Frame-Options".to_string(), "DENY".to_string()),
        ]);
        assert_eq!(page.body, "hello");
    }

    #[test]
    fn header_without_body() {
        let (header, body) = split_header("Status: 404 Not Found\n");
        assert_eq!(header, "Status: 404 Not Found\n");
        assert_eq!(body, "");
        let parsed = Header::parse(header);
        assert_eq!(parsed.status_code, Some(404));
        assert_eq!(parsed.status_description.as_deref(), Some("Not Found"));
    }
}
