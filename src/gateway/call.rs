use crate::{Error, Result, stmt::MAX_SCALAR_SIZE};

/**
    Splits name/value pairs into two parallel sequences.

    The names and values at the same index come from the same pair.
*/
pub fn split_properties(props: &[(String, String)]) -> (Vec<&str>, Vec<&str>) {
    props.iter().map(|(name, value)| (name.as_str(), value.as_str())).unzip()
}

/// Reports whether `name` is a plain or a double-quoted PL/SQL identifier.
fn is_identifier(name: &str) -> bool {
    if let Some(quoted) = name.strip_prefix('"') {
        return match quoted.strip_suffix('"') {
            Some(inner) => !inner.is_empty() && !inner.contains('"') && !inner.contains('\0'),
            None => false,
        };
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '#'),
        _ => false,
    }
}

/// Reports whether `name` is an optionally dotted (`schema.package.procedure`) identifier.
fn is_qualified_name(name: &str) -> bool {
    split_qualified(name).map_or(false, |parts| parts.iter().all(|part| is_identifier(part)))
}

/// Splits a dotted name. Dots inside double quotes do not split.
fn split_qualified(name: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (pos, c) in name.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '.' if !quoted => {
                parts.push(&name[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    if quoted {
        return None;
    }
    parts.push(&name[start..]);
    Some(parts)
}

/// Returns `value` as a PL/SQL string literal with embedded quotes doubled.
fn quote_literal(name: &str, value: &str) -> Result<String> {
    if value.len() > MAX_SCALAR_SIZE {
        return Err(Error::malformed(format!("value of {} has {} bytes, more than {}", name, value.len(), MAX_SCALAR_SIZE)));
    }
    if value.contains('\0') {
        return Err(Error::malformed(format!("value of {} contains NUL", name)));
    }
    let mut literal = String::with_capacity(value.len() + 2);
    literal.push('\'');
    for c in value.chars() {
        if c == '\'' {
            literal.push('\'');
        }
        literal.push(c);
    }
    literal.push('\'');
    Ok(literal)
}

/// Procedure call a request makes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `BEGIN proc(name_array=>:n, value_array=>:v); END;` with the parameters bound as two arrays
    Arrays {
        sql: String,
        names: Vec<String>,
        values: Vec<String>,
    },
    /// `BEGIN proc(a=>'x', b=>'y'); END;` with the values embedded as literals
    Literals {
        sql: String,
    },
}

impl Call {
    /**
        Builds the call of `procedure` with `params`.

        # Example

        ```
        use plsql_gateway::Call;

        let params = vec![("name".to_string(), "O'Brien".to_string()), ("id".to_string(), "7".to_string())];
        let call = Call::build("hr.emp.show", &params)?;
        assert_eq!(call.sql(), "BEGIN hr.emp.show(name=>'O''Brien',id=>'7'); END;");

        let call = Call::build("!hr.emp.find", &params)?;
        assert_eq!(call.sql(), "BEGIN hr.emp.find(name_array=>:n, value_array=>:v); END;");
        # Ok::<(),plsql_gateway::Error>(())
        ```
    */
    pub fn build(procedure: &str, params: &[(String, String)]) -> Result<Self> {
        if let Some(name) = procedure.strip_prefix('!') {
            let name = name.trim();
            if !is_qualified_name(name) {
                return Err(Error::malformed(format!("{} is not a procedure name", name)));
            }
            let (names, values) = split_properties(params);
            return Ok(Call::Arrays {
                sql: format!("BEGIN {}(name_array=>:n, value_array=>:v); END;", name),
                names: names.into_iter().map(str::to_owned).collect(),
                values: values.into_iter().map(str::to_owned).collect(),
            });
        }
        let name = procedure.trim();
        if !is_qualified_name(name) {
            return Err(Error::malformed(format!("{} is not a procedure name", name)));
        }
        let mut args = Vec::with_capacity(params.len());
        for (arg, value) in params {
            if !is_identifier(arg) {
                return Err(Error::malformed(format!("{} is not a parameter name", arg)));
            }
            args.push(format!("{}=>{}", arg, quote_literal(arg, value)?));
        }
        Ok(Call::Literals { sql: format!("BEGIN {}({}); END;", name, args.join(",")) })
    }

    /// Statement text of the call.
    pub fn sql(&self) -> &str {
        match self {
            Call::Arrays { sql, .. } | Call::Literals { sql } => sql,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(name, value)| (name.to_string(), value.to_string())).collect()
    }

    #[test]
    fn split_keeps_pairs() {
        let cgi = props(&[("REQUEST_METHOD", "GET"), ("PATH_INFO", "/home"), ("QUERY_STRING", "")]);
        let (names, values) = split_properties(&cgi);
        assert_eq!(names.len(), values.len());
        for (idx, (name, value)) in cgi.iter().enumerate() {
            assert_eq!(names[idx], name);
            assert_eq!(values[idx], value);
        }
    }

    #[test]
    fn array_convention() -> Result<()> {
        let params = props(&[("a", "1"), ("a", "2")]);
        match Call::build("!pkg.proc", &params)? {
            Call::Arrays { sql, names, values } => {
                assert_eq!(sql, "BEGIN pkg.proc(name_array=>:n, value_array=>:v); END;");
                assert_eq!(names, vec!["a", "a"]);
                assert_eq!(values, vec!["1", "2"]);
            }
            call => panic!("unexpected call {:?}", call),
        }
        Ok(())
    }

    #[test]
    fn literal_convention() -> Result<()> {
        let call = Call::build("myapp.home", &[])?;
        assert_eq!(call.sql(), "BEGIN myapp.home(); END;");

        let call = Call::build("\"My App\".home", &props(&[("p1", "v1"), ("\"P 2\"", "it's")]))?;
        assert_eq!(call.sql(), "BEGIN \"My App\".home(p1=>'v1',\"P 2\"=>'it''s'); END;");
        Ok(())
    }

    #[test]
    fn rejects_injection() {
        assert!(matches!(Call::build("x; drop table t", &[]), Err(Error::Malformed(_))));
        assert!(matches!(Call::build("myapp.home", &props(&[("a=>1,b", "x")])), Err(Error::Malformed(_))));
        assert!(matches!(Call::build("!\"open", &[]), Err(Error::Malformed(_))));
        assert!(matches!(Call::build("p", &props(&[("a", "x".repeat(MAX_SCALAR_SIZE + 1).as_str())])), Err(Error::Malformed(_))));
        assert!(matches!(Call::build("1abc", &[]), Err(Error::Malformed(_))));
        assert!(matches!(Call::build("a..b", &[]), Err(Error::Malformed(_))));
    }
}
