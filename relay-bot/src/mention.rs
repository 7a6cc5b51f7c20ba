//! Decides whether a message is addressed to the bot and extracts the query text.
//!
//! - Private chats: every message is addressed to the bot.
//! - Groups: the message must @mention the bot or reply to a bot message.
//!
//! The @mention is stripped from the query; a query that is empty afterwards is ignored.

use relay_core::Message;

/// Byte ranges of every `@bot_username` in `text` that is not the prefix of a longer username.
fn mention_spans(text: &str, bot_username: &str) -> Vec<(usize, usize)> {
    let needle = format!("@{}", bot_username);
    text.match_indices(needle.as_str())
        .map(|(start, m)| (start, start + m.len()))
        .filter(|&(_, end)| {
            !text[end..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
        })
        .collect()
}

/// Returns true if `text` contains a @mention of the given bot username.
#[inline]
pub fn is_bot_mentioned(text: &str, bot_username: &str) -> bool {
    !mention_spans(text, bot_username).is_empty()
}

/// Strips the bot @mention from `text` and returns the trimmed remainder.
pub fn extract_query(text: &str, bot_username: &str) -> String {
    let mut query = String::with_capacity(text.len());
    let mut from = 0;
    for (start, end) in mention_spans(text, bot_username) {
        query.push_str(&text[from..start]);
        from = end;
    }
    query.push_str(&text[from..]);
    query.trim().to_string()
}

/// Resolves the query if the message triggers a reply; otherwise `None`.
pub fn get_query(message: &Message, bot_username: Option<&str>) -> Option<String> {
    let replied_to_bot = message.reply_to_message_id.is_some() && message.reply_to_message_from_bot;
    let mentioned = bot_username.is_some_and(|u| is_bot_mentioned(&message.content, u));
    if !(message.chat.is_private() || replied_to_bot || mentioned) {
        return None;
    }
    let query = match bot_username {
        Some(u) => extract_query(&message.content, u),
        None => message.content.trim().to_string(),
    };
    if query.is_empty() {
        None
    } else {
        Some(query)
    }
}

/// True when `text` starts with `/command` or `/command@bot_username`.
///
/// A command addressed to another bot (`/command@other`) does not match; neither does an
/// addressed command when our own username is not known yet.
pub fn is_command(text: &str, command: &str, bot_username: Option<&str>) -> bool {
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    let Some(rest) = first.strip_prefix('/') else {
        return false;
    };
    let (name, target) = match rest.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (rest, None),
    };
    if name != command {
        return false;
    }
    match (target, bot_username) {
        (None, _) => true,
        (Some(target), Some(username)) => target.eq_ignore_ascii_case(username),
        (Some(_), None) => false,
    }
}
