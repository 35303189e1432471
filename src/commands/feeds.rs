use anyhow::{Context, Result};
use futures::future::BoxFuture;

use super::{Command, State};
use crate::storage::{Feed, User};
use crate::util::validate_feed_url;

/// `addfeed <name> <url>`: register a feed and follow it.
pub(super) fn add<'a>(
    state: &'a mut State,
    cmd: &'a Command,
    user: User,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let name = cmd.arg(0, "name")?;
        let url = cmd.arg(1, "url")?.trim();
        validate_feed_url(url)?;

        let feed = match state.db.create_feed(name, url, user.id).await {
            Ok(feed) => feed,
            Err(e) if e.is_duplicate() => {
                anyhow::bail!("Feed {url} is already registered; use `follow {url}`")
            }
            Err(e) => return Err(e).context("Failed to add feed"),
        };
        let follow = state
            .db
            .create_feed_follow(user.id, feed.id)
            .await
            .context("Failed to follow new feed")?;

        tracing::info!(feed = %feed.url, user = %user.name, "Added feed");
        println!("Added {} ({})", feed.name, feed.url);
        println!("{} now follows {}", follow.user_name, follow.feed_name);
        Ok(())
    })
}

pub(super) fn list<'a>(state: &'a mut State, _cmd: &'a Command) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let feeds = state.db.list_feeds().await?;
        if feeds.is_empty() {
            println!("No feeds registered");
        }
        for feed in feeds {
            println!("* {}", feed.name);
            println!("  URL:   {}", feed.url);
            println!("  Owner: {}", feed.user_name);
        }
        Ok(())
    })
}

pub(super) fn follow<'a>(
    state: &'a mut State,
    cmd: &'a Command,
    user: User,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let feed = lookup(state, cmd).await?;
        let follow = match state.db.create_feed_follow(user.id, feed.id).await {
            Ok(follow) => follow,
            Err(e) if e.is_duplicate() => anyhow::bail!("Already following {}", feed.name),
            Err(e) => return Err(e).context("Failed to follow feed"),
        };
        println!("{} now follows {}", follow.user_name, follow.feed_name);
        Ok(())
    })
}

pub(super) fn unfollow<'a>(
    state: &'a mut State,
    cmd: &'a Command,
    user: User,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let feed = lookup(state, cmd).await?;
        match state.db.delete_feed_follow(user.id, feed.id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => anyhow::bail!("Not following {}", feed.name),
            Err(e) => return Err(e).context("Failed to unfollow feed"),
        }
        println!("{} unfollowed {}", user.name, feed.name);
        Ok(())
    })
}

pub(super) fn following<'a>(
    state: &'a mut State,
    _cmd: &'a Command,
    user: User,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let follows = state.db.get_feed_follows_for_user(user.id).await?;
        if follows.is_empty() {
            println!("{} is not following any feeds", user.name);
        }
        for follow in follows {
            println!("* {}", follow.feed_name);
        }
        Ok(())
    })
}

async fn lookup(state: &State, cmd: &Command) -> Result<Feed> {
    let url = cmd.arg(0, "url")?.trim();
    validate_feed_url(url)?;
    state
        .db
        .get_feed_by_url(url)
        .await
        .with_context(|| format!("No feed registered for {url}"))
}
