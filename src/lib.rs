#[macro_use]
extern crate serde_derive;
extern crate colored;

pub mod chain_id;
pub mod channel;
pub mod client;
pub mod node;
pub mod pool;
pub mod protocol;
pub mod server;
pub mod settings;

use chain_id::ChainId;

use std::net::SocketAddr;

#[derive(Debug)]
pub enum Error {
    IO(std::io::Error),
    Actix(actix::MailboxError),
    Config(config::ConfigError),

    // channel errors
    ChannelError(String),

    // session errors
    Timeout,
    EmptyResponse,
    InvalidResponse,
    SessionClosed,
    /// The upstream answered a request with an error of its own
    Upstream(String),

    // dial errors
    /// The transport session to `address` could not be established
    Transport { endpoint: String, address: SocketAddr, cause: Box<Error> },
    /// The session was established but the chain id query failed
    ChainIdQuery { endpoint: String, address: SocketAddr, cause: Box<Error> },
    /// The endpoint serves a different chain than the pool
    ChainIdMismatch { endpoint: String, address: SocketAddr, expected: ChainId, reported: ChainId },
    /// Every verification fault gathered during a dial
    Verification(Vec<Error>),
    /// The initial dial deadline elapsed before these endpoints resolved
    DialTimeout(Vec<String>),

    // pool errors
    NoAliveNode,
    AlreadyDialed,
    PoolClosed,

    /// Error when parsing an endpoint description `NAME@PRIMARY[,SECONDARY]`
    EndpointParseError(String),
}

impl Error {
    /// Whether the error means the endpoint could not be reached at all.
    pub fn is_transport(&self) -> bool {
        match self {
            Error::Transport { .. } => true,
            _ => false,
        }
    }

    /// Whether a request failed because the connection to the upstream failed, rather than
    /// because the upstream answered with an error.
    pub fn is_connection(&self) -> bool {
        match self {
            Error::IO(_) | Error::ChannelError(_) | Error::Timeout => true,
            Error::EmptyResponse | Error::SessionClosed => true,
            _ => false,
        }
    }

    /// Whether the error is (or aggregates) identity verification faults.
    pub fn is_verification(&self) -> bool {
        match self {
            Error::ChainIdQuery { .. } | Error::ChainIdMismatch { .. } => true,
            Error::Verification(_) => true,
            _ => false,
        }
    }

    /// Flattens aggregated errors into their individual faults.
    pub fn errors(&self) -> Vec<&Error> {
        match self {
            Error::Verification(errors) => errors.iter().flat_map(|err| err.errors()).collect(),
            err => vec![err],
        }
    }
}

impl std::error::Error for Error {}

impl std::convert::From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IO(error)
    }
}

impl std::convert::From<actix::MailboxError> for Error {
    fn from(error: actix::MailboxError) -> Self {
        Error::Actix(error)
    }
}

impl std::convert::From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error)
    }
}

impl std::convert::From<channel::Error> for Error {
    fn from(error: channel::Error) -> Self {
        match error {
            channel::Error::IO(io_err) => Error::IO(io_err),
            channel::Error::ReadError(err) => {
                let s = format!("{:?}", err);
                Error::ChannelError(s)
            }
            channel::Error::WriteError(err) => {
                let s = format!("{:?}", err);
                Error::ChannelError(s)
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
