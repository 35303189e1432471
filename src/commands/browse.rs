use anyhow::Result;
use futures::future::BoxFuture;

use super::{Command, CommandError, State};
use crate::storage::{PostWithFeed, User};
use crate::util::strip_control_chars;

/// Posts shown by `browse` when no limit is given
pub const DEFAULT_BROWSE_LIMIT: u32 = 2;

/// `browse [limit]`: newest posts from the feeds the user follows.
pub(super) fn browse<'a>(
    state: &'a mut State,
    cmd: &'a Command,
    user: User,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        let limit = match cmd.args.first() {
            None => DEFAULT_BROWSE_LIMIT,
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| CommandError::InvalidArgument {
                    command: cmd.name.clone(),
                    value: raw.clone(),
                })?,
        };

        let posts = state.db.get_posts_by_user(user.id, limit).await?;
        if posts.is_empty() {
            println!("No posts yet; follow a feed and run `agg`");
        }
        for post in &posts {
            println!("{}", format_post(post));
        }
        Ok(())
    })
}

/// Render one post for the terminal. Remote text is stripped of control characters.
pub fn format_post(post: &PostWithFeed) -> String {
    let mut out = format!(
        "{} from {}\n--- {} ---\n",
        post.published_at.format("%a %b %e %Y"),
        strip_control_chars(&post.feed_name),
        strip_control_chars(&post.title),
    );
    if let Some(description) = post.description.as_deref() {
        out.push_str("    ");
        out.push_str(&strip_control_chars(description));
        out.push('\n');
    }
    out.push_str("Link: ");
    out.push_str(&strip_control_chars(&post.url));
    out.push_str("\n=====================================");
    out
}
