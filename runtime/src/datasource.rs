//! Datasource connect-string parsing: `driver:user/password@db(options)`,
//! the shape SQL-binding modules traditionally accept for a single
//! configuration string. Parsing is the only piece this crate owns — the
//! actual connection is an embedder/driver-module concern entirely outside
//! this runtime's scope.

use rune_core::sink::ErrorRecord;
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectString {
    pub driver: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
    pub options: HashMap<String, String>,
}

/// Parse `driver:user/password@database(k1=v1,k2=v2)`. `user/password` and
/// the parenthesized options are both optional; `driver:` and `database`
/// are required.
pub fn parse(connect_string: &str) -> Result<ConnectString, ErrorRecord> {
    let (driver, rest) = connect_string
        .split_once(':')
        .ok_or_else(|| malformed(connect_string, "missing driver prefix before ':'"))?;
    if driver.is_empty() {
        return Err(malformed(connect_string, "empty driver name"));
    }

    let (body, options_str) = match rest.split_once('(') {
        Some((body, tail)) => {
            let options_str = tail
                .strip_suffix(')')
                .ok_or_else(|| malformed(connect_string, "unterminated option list"))?;
            (body, Some(options_str))
        }
        None => (rest, None),
    };

    let (credentials, database) = match body.split_once('@') {
        Some((creds, db)) => (Some(creds), db),
        None => (None, body),
    };
    if database.is_empty() {
        return Err(malformed(connect_string, "empty database name"));
    }

    let (user, password) = match credentials {
        Some(creds) => match creds.split_once('/') {
            Some((u, p)) => (non_empty(u), non_empty(p)),
            None => (non_empty(creds), None),
        },
        None => (None, None),
    };

    let mut options = HashMap::new();
    if let Some(options_str) = options_str {
        if !options_str.is_empty() {
            for pair in options_str.split(',') {
                let (k, v) = pair
                    .split_once('=')
                    .ok_or_else(|| malformed(connect_string, "option is missing '='"))?;
                options.insert(k.trim().to_string(), v.trim().to_string());
            }
        }
    }

    Ok(ConnectString {
        driver: driver.to_string(),
        user,
        password,
        database: database.to_string(),
        options,
    })
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn malformed(input: &str, reason: &str) -> ErrorRecord {
    ErrorRecord::new("DATASOURCE-PARSE-ERROR", format!("malformed connect string '{}': {}", input, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_form() {
        let cs = parse("pgsql:alice/secret@mydb(timeout=30,ssl=true)").unwrap();
        assert_eq!(cs.driver, "pgsql");
        assert_eq!(cs.user.as_deref(), Some("alice"));
        assert_eq!(cs.password.as_deref(), Some("secret"));
        assert_eq!(cs.database, "mydb");
        assert_eq!(cs.options.get("timeout").map(String::as_str), Some("30"));
        assert_eq!(cs.options.get("ssl").map(String::as_str), Some("true"));
    }

    #[test]
    fn parses_minimal_form_with_no_credentials_or_options() {
        let cs = parse("sqlite:data.db").unwrap();
        assert_eq!(cs.driver, "sqlite");
        assert!(cs.user.is_none());
        assert!(cs.password.is_none());
        assert_eq!(cs.database, "data.db");
        assert!(cs.options.is_empty());
    }

    #[test]
    fn user_without_password_parses_password_as_none() {
        let cs = parse("mysql:bob@db").unwrap();
        assert_eq!(cs.user.as_deref(), Some("bob"));
        assert!(cs.password.is_none());
    }

    #[test]
    fn missing_driver_prefix_is_rejected() {
        assert!(parse("nodriverhere").is_err());
    }

    #[test]
    fn empty_database_is_rejected() {
        assert!(parse("pgsql:alice/secret@").is_err());
    }

    #[test]
    fn unterminated_option_list_is_rejected() {
        assert!(parse("pgsql:mydb(timeout=30").is_err());
    }
}
