//! Gateway configuration

use std::{env, fmt, str::FromStr};

use crate::{Error, Result, client::PoolSizing};

/// Database character set class. It decides how long an output buffer chunk can be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// One byte per character
    SingleByte,
    /// Up to two bytes per character
    DoubleByte,
    /// UTF8 (CESU-8), up to three bytes per character
    Utf8,
    /// AL32UTF8, up to four bytes per character
    Al32Utf8,
}

impl Charset {
    /// Output buffer chunk length (`htp.htbuf_len`) that keeps a chunk within 255 bytes.
    pub fn htbuf_len(self) -> u32 {
        match self {
            Charset::SingleByte | Charset::DoubleByte => 127,
            Charset::Utf8 => 85,
            Charset::Al32Utf8 => 63,
        }
    }
}

impl FromStr for Charset {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SINGLEBYTE" | "US7ASCII" | "WE8ISO8859P1" | "WE8MSWIN1252" | "EE8ISO8859P2" => Ok(Charset::SingleByte),
            "DOUBLEBYTE" | "JA16SJIS" | "ZHS16GBK" | "KO16MSWIN949" | "ZHT16BIG5" => Ok(Charset::DoubleByte),
            "UTF8" => Ok(Charset::Utf8),
            "AL32UTF8" => Ok(Charset::Al32Utf8),
            _ => Err(Error::Config(format!("unknown character set {}", name))),
        }
    }
}

/// Gateway configuration.
///
/// # Example
///
/// ```
/// use plsql_gateway::{Config, Charset};
///
/// let config = Config::new("demo", "demo", "orcl")
///     .with_pool(1, 4, 1)
///     .with_charset(Charset::Utf8);
/// config.validate()?;
/// assert_eq!(config.htbuf_len(), 85);
/// assert_eq!(config.to_string(), "demo/***@orcl pool=1..4+1 htbuf_len=85");
/// # Ok::<(),plsql_gateway::Error>(())
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub username: String,
    pub password: String,
    pub database: String,
    pub pool: PoolSizing,
    pub debug: bool,
    pub charset: Charset,
    /// Explicit output buffer chunk length. Overrides the one derived from `charset`.
    pub htbuf_len: Option<u32>,
}

impl Config {
    /// Returns a configuration with a pool of 1 to 4 sessions and an AL32UTF8 database.
    pub fn new(username: &str, password: &str, database: &str) -> Self {
        Self {
            username: username.to_owned(),
            password: password.to_owned(),
            database: database.to_owned(),
            pool: PoolSizing { min: 1, max: 4, increment: 1 },
            debug: false,
            charset: Charset::Al32Utf8,
            htbuf_len: None,
        }
    }

    pub fn with_pool(mut self, min: u32, max: u32, increment: u32) -> Self {
        self.pool = PoolSizing { min, max, increment };
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    pub fn with_htbuf_len(mut self, len: u32) -> Self {
        self.htbuf_len = Some(len);
        self
    }

    /// Output buffer chunk length the gateway sets for every request.
    pub fn htbuf_len(&self) -> u32 {
        self.htbuf_len.unwrap_or_else(|| self.charset.htbuf_len())
    }

    /// Checks identity and pool sizing.
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(Error::Config("username is empty".to_string()));
        }
        if self.database.is_empty() {
            return Err(Error::Config("database is empty".to_string()));
        }
        let PoolSizing { min, max, increment } = self.pool;
        if max == 0 {
            return Err(Error::Config("pool maximum is 0".to_string()));
        }
        if min > max {
            return Err(Error::Config(format!("pool minimum {} exceeds maximum {}", min, max)));
        }
        if increment == 0 {
            return Err(Error::Config("pool increment is 0".to_string()));
        }
        if let Some(len) = self.htbuf_len {
            if !(1..=255).contains(&len) {
                return Err(Error::Config(format!("output buffer chunk length {} is outside 1..=255", len)));
            }
        }
        Ok(())
    }

    /**
        Reads the configuration from the process environment.

        `DBUSER`, `DBPASS` and `DBNAME` are required. `GATEWAY_POOL_MIN`, `GATEWAY_POOL_MAX`,
        `GATEWAY_POOL_INCR`, `GATEWAY_DEBUG` and `GATEWAY_CHARSET` are optional.
    */
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| lookup(name).ok_or_else(|| Error::Config(format!("{} is not set", name)));
        let number = |name: &str, default: u32| -> Result<u32> {
            match lookup(name) {
                Some(val) => val.trim().parse().map_err(|_| Error::Config(format!("{} is not a number: {}", name, val))),
                None => Ok(default),
            }
        };
        let mut config = Self::new(&required("DBUSER")?, &required("DBPASS")?, &required("DBNAME")?);
        config.pool = PoolSizing {
            min:       number("GATEWAY_POOL_MIN", config.pool.min)?,
            max:       number("GATEWAY_POOL_MAX", config.pool.max)?,
            increment: number("GATEWAY_POOL_INCR", config.pool.increment)?,
        };
        if let Some(val) = lookup("GATEWAY_DEBUG") {
            config.debug = matches!(val.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(val) = lookup("GATEWAY_CHARSET") {
            config.charset = val.trim().parse()?;
        }
        config.validate()?;
        Ok(config)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .field("pool", &self.pool)
            .field("debug", &self.debug)
            .field("charset", &self.charset)
            .field("htbuf_len", &self.htbuf_len)
            .finish()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/***@{} pool={}..{}+{} htbuf_len={}",
            self.username, self.database, self.pool.min, self.pool.max, self.pool.increment, self.htbuf_len()
        )?;
        if self.debug {
            f.write_str(" debug")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn chunk_length() {
        assert_eq!(Config::new("u", "p", "db").htbuf_len(), 63);
        assert_eq!(Config::new("u", "p", "db").with_charset(Charset::DoubleByte).htbuf_len(), 127);
        assert_eq!(Config::new("u", "p", "db").with_charset(Charset::Utf8).with_htbuf_len(100).htbuf_len(), 100);
    }

    #[test]
    fn invalid() {
        let cfg = Config::new("", "p", "db");
        assert_eq!(cfg.validate(), Err(Error::Config("username is empty".to_string())));
        assert!(Config::new("u", "p", "").validate().is_err());
        assert!(Config::new("u", "p", "db").with_pool(0, 0, 1).validate().is_err());
        assert!(Config::new("u", "p", "db").with_pool(5, 4, 1).validate().is_err());
        assert!(Config::new("u", "p", "db").with_pool(1, 4, 0).validate().is_err());
        assert!(Config::new("u", "p", "db").with_htbuf_len(0).validate().is_err());
        assert!(Config::new("u", "p", "db").with_htbuf_len(256).validate().is_err());
        assert!(Config::new("u", "", "db").validate().is_ok());
    }

    #[test]
    fn lookup() -> Result<()> {
        let vars: HashMap<&str, &str> = [
            ("DBUSER", "demo"), ("DBPASS", "secret"), ("DBNAME", "orcl"),
            ("GATEWAY_POOL_MAX", "8"), ("GATEWAY_DEBUG", "true"), ("GATEWAY_CHARSET", "utf8"),
        ].into_iter().collect();
        let cfg = Config::from_lookup(|name| vars.get(name).map(|val| val.to_string()))?;
        assert_eq!(cfg.pool, PoolSizing { min: 1, max: 8, increment: 1 });
        assert!(cfg.debug);
        assert_eq!(cfg.charset, Charset::Utf8);
        assert!(!cfg.to_string().contains("secret"));
        assert!(!format!("{:?}", cfg).contains("secret"));

        let res = Config::from_lookup(|name| if name == "DBUSER" { None } else { vars.get(name).map(|val| val.to_string()) });
        assert_eq!(res, Err(Error::Config("DBUSER is not set".to_string())));

        let res = Config::from_lookup(|name| if name == "GATEWAY_POOL_MIN" { Some("x".to_string()) } else { vars.get(name).map(|val| val.to_string()) });
        assert!(matches!(res, Err(Error::Config(_))));
        Ok(())
    }
}
