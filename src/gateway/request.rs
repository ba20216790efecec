use std::time::Duration;

use crate::{Error, Result, stmt::MAX_SCALAR_SIZE};

/// Checks one name or value that reaches the database as bound or embedded text.
fn check_text(what: &str, text: &str) -> Result<()> {
    if text.len() > MAX_SCALAR_SIZE {
        return Err(Error::malformed(format!("{} has {} bytes, more than {}", what, text.len(), MAX_SCALAR_SIZE)));
    }
    if text.contains('\0') {
        return Err(Error::malformed(format!("{} contains NUL", what)));
    }
    Ok(())
}

/**
    A web request for a stored procedure.

    # Example

    ```
    use plsql_gateway::Request;
    use std::time::Duration;

    let req = Request::new("myapp.home")
        .param("id", "42")
        .cgi("REQUEST_METHOD", "GET")
        .timeout(Duration::from_secs(30));
    assert!(req.validate().is_ok());
    assert_eq!(req.procedure(), "myapp.home");
    ```
*/
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    username:  String,
    password:  String,
    procedure: String,
    params:    Vec<(String, String)>,
    cgi:       Vec<(String, String)>,
    timeout:   Option<Duration>,
}

impl Request {
    /**
        Returns a request that calls `procedure`.

        A name that starts with `!` selects the array calling convention: the procedure
        receives the parameters as `name_array` and `value_array`.
    */
    pub fn new(procedure: &str) -> Self {
        Self { procedure: procedure.to_owned(), ..Self::default() }
    }

    /// Sets the session identity. Without one the request runs as the configured user.
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_owned();
        self.password = password.to_owned();
        self
    }

    /// Appends a procedure parameter.
    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.params.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Appends a CGI environment variable.
    pub fn cgi(mut self, name: &str, value: &str) -> Self {
        self.cgi.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Sets the time the whole request may take.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn cgi_vars(&self) -> &[(String, String)] {
        &self.cgi
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /**
        Checks the parts that can be checked without a database.

        Names and values must fit a bind buffer and contain no NUL. Repeated parameter
        names are only accepted by the array calling convention.
    */
    pub fn validate(&self) -> Result<()> {
        let (name, arrays) = match self.procedure.strip_prefix('!') {
            Some(name) => (name, true),
            None => (self.procedure.as_str(), false),
        };
        if name.trim().is_empty() {
            return Err(Error::malformed("procedure name is empty"));
        }
        if self.cgi.is_empty() {
            return Err(Error::malformed("CGI environment is empty"));
        }
        for (name, value) in &self.cgi {
            check_text("CGI variable name", name)?;
            check_text(&format!("CGI variable {}", name), value)?;
        }
        for (name, value) in &self.params {
            check_text("parameter name", name)?;
            check_text(&format!("value of {}", name), value)?;
        }
        if arrays {
            return Ok(());
        }
        for (idx, (name, _)) in self.params.iter().enumerate() {
            if self.params[..idx].iter().any(|(prev, _)| prev.eq_ignore_ascii_case(name)) {
                return Err(Error::malformed(format!("parameter {} is repeated", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed() {
        let res = Request::new("").cgi("REQUEST_METHOD", "GET").validate();
        assert_eq!(res, Err(Error::malformed("procedure name is empty")));
        let res = Request::new("!").cgi("REQUEST_METHOD", "GET").validate();
        assert_eq!(res, Err(Error::malformed("procedure name is empty")));
        let res = Request::new("myapp.home").validate();
        assert_eq!(res, Err(Error::malformed("CGI environment is empty")));
        let res = Request::new("myapp.home").param("a", "1").param("A", "2").cgi("REQUEST_METHOD", "GET").validate();
        assert_eq!(res, Err(Error::malformed("parameter A is repeated")));
        let res = Request::new("!myapp.find").param("a", "1").param("a", "2").cgi("REQUEST_METHOD", "GET").validate();
        assert_eq!(res, Ok(()));
    }

    #[test]
    fn oversized_or_nul_text() {
        let long = "x".repeat(MAX_SCALAR_SIZE + 1);
        let res = Request::new("!myapp.find").param("q", &long).cgi("REQUEST_METHOD", "GET").validate();
        assert_eq!(res, Err(Error::malformed("value of q has 32768 bytes, more than 32767")));
        let res = Request::new("myapp.home").cgi("HTTP_COOKIE", &long).validate();
        assert_eq!(res, Err(Error::malformed("CGI variable HTTP_COOKIE has 32768 bytes, more than 32767")));
        let res = Request::new("myapp.home").cgi("PATH_INFO", "/a\0b").validate();
        assert_eq!(res, Err(Error::malformed("CGI variable PATH_INFO contains NUL")));
        let res = Request::new("myapp.home").param("q", &"x".repeat(MAX_SCALAR_SIZE)).cgi("REQUEST_METHOD", "GET").validate();
        assert_eq!(res, Ok(()));
    }
}
