use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const WORKER_DOMAIN: &str = "org.xnio";

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum MalformedObjectName {
    #[error("object name [{0}] has no domain separator")]
    MissingDomain(String),

    #[error("domain [{0}] contains a pattern character")]
    PatternDomain(String),

    #[error("object name [{0}] has an empty key property list")]
    EmptyPropertyList(String),

    #[error("key property [{0}] has no value")]
    MissingValue(String),

    #[error("key [{0}] is empty or contains an invalid character")]
    InvalidKey(String),

    #[error("value of key [{key}] is invalid: [{value}]")]
    InvalidValue { key: String, value: String },

    #[error("quoted value of key [{0}] is not terminated")]
    UnterminatedQuote(String),

    #[error("key [{0}] is specified more than once")]
    DuplicateKey(String),
}

/// Identifier of a managed object: `domain:key=value[,key=value]*`.
///
/// Key properties are kept sorted, so two names that differ only in the order
/// of their properties are equal and display the same canonical form.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ObjectName {
    domain: String,
    properties: BTreeMap<String, String>,
}

impl ObjectName {
    pub fn parse(name: &str) -> Result<Self, MalformedObjectName> {
        let Some((domain, properties)) = name.split_once(':') else {
            return Err(MalformedObjectName::MissingDomain(name.to_owned()));
        };

        if domain.contains(['*', '?']) {
            return Err(MalformedObjectName::PatternDomain(domain.to_owned()));
        }

        if properties.is_empty() {
            return Err(MalformedObjectName::EmptyPropertyList(name.to_owned()));
        }

        Ok(Self {
            domain: domain.to_owned(),
            properties: parse_properties(properties)?,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The raw value of a key property. Quoted values keep their quotes.
    pub fn key_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Quotes `value` so that it can be used as a key property value.
    pub fn quote(value: &str) -> String {
        let mut quoted = String::with_capacity(value.len() + 2);
        quoted.push('"');
        for c in value.chars() {
            match c {
                '"' | '\\' | '*' | '?' => {
                    quoted.push('\\');
                    quoted.push(c);
                }
                '\n' => quoted.push_str("\\n"),
                _ => quoted.push(c),
            }
        }
        quoted.push('"');
        quoted
    }
}

/// The name under which an I/O worker registers itself:
/// `org.xnio:type=Xnio,provider="nio",worker="<worker>"`.
pub fn worker_object_name(worker: &str) -> ObjectName {
    let mut properties = BTreeMap::new();
    properties.insert("type".to_owned(), "Xnio".to_owned());
    properties.insert("provider".to_owned(), ObjectName::quote("nio"));
    properties.insert("worker".to_owned(), ObjectName::quote(worker));

    ObjectName {
        domain: WORKER_DOMAIN.to_owned(),
        properties,
    }
}

impl FromStr for ObjectName {
    type Err = MalformedObjectName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        for (idx, (key, value)) in self.properties.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

fn parse_properties(input: &str) -> Result<BTreeMap<String, String>, MalformedObjectName> {
    let mut properties = BTreeMap::new();
    let mut rest = input;

    loop {
        let Some((key, after_key)) = rest.split_once('=') else {
            return Err(MalformedObjectName::MissingValue(rest.to_owned()));
        };

        if key.is_empty() || key.contains([',', ':', '*', '?', '"', '\n']) {
            return Err(MalformedObjectName::InvalidKey(key.to_owned()));
        }

        let (value, remainder) = if after_key.starts_with('"') {
            split_quoted(key, after_key)?
        } else {
            let (value, remainder) = match after_key.split_once(',') {
                Some((value, remainder)) => (value, Some(remainder)),
                None => (after_key, None),
            };

            if value.is_empty() || value.contains(['=', ':', '"', '*', '?', '\n']) {
                return Err(MalformedObjectName::InvalidValue {
                    key: key.to_owned(),
                    value: value.to_owned(),
                });
            }

            (value, remainder)
        };

        if properties
            .insert(key.to_owned(), value.to_owned())
            .is_some()
        {
            return Err(MalformedObjectName::DuplicateKey(key.to_owned()));
        }

        match remainder {
            None => return Ok(properties),
            Some(remainder) => rest = remainder,
        }
    }
}

/// Splits a quoted value (quotes included) off the front of `input`.
fn split_quoted<'a>(
    key: &str,
    input: &'a str,
) -> Result<(&'a str, Option<&'a str>), MalformedObjectName> {
    let mut escaped = false;

    for (idx, c) in input.char_indices().skip(1) {
        if escaped {
            if !matches!(c, '"' | '\\' | 'n' | '*' | '?') {
                return Err(MalformedObjectName::InvalidValue {
                    key: key.to_owned(),
                    value: input.to_owned(),
                });
            }
            escaped = false;
            continue;
        }

        match c {
            '\\' => escaped = true,
            '"' => {
                let (value, after) = input.split_at(idx + 1);
                return match after.strip_prefix(',') {
                    Some(remainder) => Ok((value, Some(remainder))),
                    None if after.is_empty() => Ok((value, None)),
                    None => Err(MalformedObjectName::InvalidValue {
                        key: key.to_owned(),
                        value: input.to_owned(),
                    }),
                };
            }
            _ => {}
        }
    }

    Err(MalformedObjectName::UnterminatedQuote(key.to_owned()))
}
