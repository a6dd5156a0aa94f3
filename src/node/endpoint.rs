use crate::{Error, Result};

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Immutable description of one upstream node.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// The logical name, used for diagnostics only.
    pub name: String,
    /// The address of the streaming session.
    pub primary: SocketAddr,
    /// The address of the plain request client, if any.
    pub secondary: Option<SocketAddr>,
}

impl Endpoint {
    pub fn new(name: &str, primary: SocketAddr, secondary: Option<SocketAddr>) -> Self {
        Endpoint { name: name.to_owned(), primary, secondary }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    /// Parses an endpoint description of the form `NAME@PRIMARY` or `NAME@PRIMARY,SECONDARY`.
    fn from_str(s: &str) -> Result<Self> {
        let parse_err = || Error::EndpointParseError(s.to_owned());
        let parts: Vec<&str> = s.split('@').collect();
        if parts.len() != 2 || parts[0].is_empty() {
            return Err(parse_err());
        }
        let addresses: Vec<&str> = parts[1].split(',').collect();
        let primary: SocketAddr = addresses[0].trim().parse().map_err(|_| parse_err())?;
        let secondary = match addresses.len() {
            1 => None,
            2 => Some(addresses[1].trim().parse().map_err(|_| parse_err())?),
            _ => return Err(parse_err()),
        };
        Ok(Endpoint::new(parts[0], primary, secondary))
    }
}
