use anyhow::{Context, Result};
use futures::future::BoxFuture;

use super::{Command, State};

pub(super) fn login<'a>(state: &'a mut State, cmd: &'a Command) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let name = cmd.arg(0, "name")?;
        let user = state
            .db
            .get_user_by_name(name)
            .await
            .with_context(|| format!("User '{name}' does not exist"))?;

        state.config.set_user(&user.name)?;
        println!("Logged in as {}", user.name);
        Ok(())
    })
}

pub(super) fn register<'a>(state: &'a mut State, cmd: &'a Command) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let name = cmd.arg(0, "name")?;
        let user = match state.db.create_user(name).await {
            Ok(user) => user,
            Err(e) if e.is_duplicate() => anyhow::bail!("User '{name}' already exists"),
            Err(e) => return Err(e).context("Failed to create user"),
        };

        state.config.set_user(&user.name)?;
        tracing::info!(user = %user.name, id = %user.id, "Registered user");
        println!("Registered and logged in as {}", user.name);
        Ok(())
    })
}

pub(super) fn list<'a>(state: &'a mut State, _cmd: &'a Command) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let current = state.config.current_user_name.as_deref();
        for user in state.db.list_users().await? {
            if Some(user.name.as_str()) == current {
                println!("* {} (current)", user.name);
            } else {
                println!("* {}", user.name);
            }
        }
        Ok(())
    })
}

/// Delete every user. Feeds, follows and posts go with them.
pub(super) fn reset<'a>(state: &'a mut State, _cmd: &'a Command) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let removed = state.db.reset().await.context("Failed to reset database")?;
        tracing::info!(users = removed, "Database reset");
        println!("Database reset ({removed} users removed)");
        Ok(())
    })
}
