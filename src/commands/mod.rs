//! Command-line verbs (`register`, `addfeed`, `agg`, ...).
//!
//! Every verb is a [`Handler`] looked up by name in a [`Registry`]. Verbs that
//! act on behalf of the current user are wrapped in [`RequiresUser`], which
//! resolves the user before the inner handler runs.

mod agg;
mod browse;
mod feeds;
mod registry;
mod users;

use thiserror::Error;

use crate::config::Config;
use crate::storage::Database;

pub use browse::{format_post, DEFAULT_BROWSE_LIMIT};
pub use registry::{Handler, Plain, PlainFn, Registry, RequiresUser, UserFn};

/// Shared state handed to every handler.
pub struct State {
    pub db: Database,
    pub config: Config,
}

/// A parsed invocation: the verb and its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Positional argument `index`, or a usage error naming what was expected.
    pub fn arg(&self, index: usize, what: &'static str) -> Result<&str, CommandError> {
        self.args
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| CommandError::MissingArgument {
                command: self.name.clone(),
                what,
            })
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Usage: {command} <{what}>")]
    MissingArgument {
        command: String,
        what: &'static str,
    },

    #[error("Invalid value for {command}: {value}")]
    InvalidArgument { command: String, value: String },

    #[error("Not logged in; run `register <name>` or `login <name>` first")]
    NotLoggedIn,
}

/// Registry with every built-in verb.
pub fn builtin() -> Registry {
    let mut registry = Registry::new();

    registry.register("login", Plain(users::login));
    registry.register("register", Plain(users::register));
    registry.register("users", Plain(users::list));
    registry.register("reset", Plain(users::reset));

    registry.register("agg", Plain(agg::agg));

    registry.register("feeds", Plain(feeds::list));
    registry.register("addfeed", RequiresUser(feeds::add));
    registry.register("follow", RequiresUser(feeds::follow));
    registry.register("unfollow", RequiresUser(feeds::unfollow));
    registry.register("following", RequiresUser(feeds::following));

    registry.register("browse", RequiresUser(browse::browse));

    registry
}
