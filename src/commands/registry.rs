use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::collections::HashMap;

use super::{Command, CommandError, State};
use crate::storage::User;

/// Something that can execute a [`Command`].
pub trait Handler: Send + Sync {
    fn run<'a>(&'a self, state: &'a mut State, cmd: &'a Command) -> BoxFuture<'a, Result<()>>;
}

/// Handler that needs no logged-in user
pub type PlainFn = for<'a> fn(&'a mut State, &'a Command) -> BoxFuture<'a, Result<()>>;

/// Handler that acts on behalf of the current user
pub type UserFn = for<'a> fn(&'a mut State, &'a Command, User) -> BoxFuture<'a, Result<()>>;

pub struct Plain(pub PlainFn);

impl Handler for Plain {
    fn run<'a>(&'a self, state: &'a mut State, cmd: &'a Command) -> BoxFuture<'a, Result<()>> {
        (self.0)(state, cmd)
    }
}

/// Resolves `current_user_name` to a stored user before calling the inner handler.
pub struct RequiresUser(pub UserFn);

impl Handler for RequiresUser {
    fn run<'a>(&'a self, state: &'a mut State, cmd: &'a Command) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let name = state
                .config
                .current_user_name
                .clone()
                .ok_or(CommandError::NotLoggedIn)?;
            let user = state
                .db
                .get_user_by_name(&name)
                .await
                .with_context(|| format!("Current user '{name}' is not registered"))?;
            (self.0)(state, cmd, user).await
        })
    }
}

/// Name → handler map.
#[derive(Default)]
pub struct Registry {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`. A second registration replaces the first.
    pub fn register(&mut self, name: &str, handler: impl Handler + 'static) {
        if self
            .handlers
            .insert(name.to_string(), Box::new(handler))
            .is_some()
        {
            tracing::warn!(command = name, "Command registered twice, replacing handler");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub async fn run(&self, state: &mut State, cmd: &Command) -> Result<()> {
        let handler = self
            .handlers
            .get(&cmd.name)
            .ok_or_else(|| CommandError::Unknown(cmd.name.clone()))?;
        tracing::debug!(command = %cmd.name, args = ?cmd.args, "Running command");
        handler.run(state, cmd).await
    }
}
