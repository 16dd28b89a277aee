//! Slack ↔ IRC message text translation.
//!
//! Slack delivers messages with markup tokens (`<@U123>`, `<#C123|general>`,
//! `<!channel>`, `:emoji:`, HTML entities); IRC wants plain text. The
//! reverse direction maps shadow nicks back to Slack names and turns member
//! names into Slack highlights.
//!
//! `parse_text` applies its rules in a fixed order; later rules operate on
//! the output of earlier ones. The transformation is idempotent on text
//! that contains no further tokens.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::text::emoji;

/// Lookup data `parse_text` needs: snapshots of the Slack store and the
/// shadow registry. Plain maps so the transform stays a pure function.
#[derive(Debug)]
pub struct TransformContext<'a> {
    /// Slack channel ID -> channel name (without `#`).
    pub channel_names: &'a HashMap<String, String>,
    /// Slack user ID -> display name.
    pub user_names: &'a HashMap<String, String>,
    /// Slack display name -> current shadow nick.
    pub shadow_nicks: &'a HashMap<String, String>,
}

fn channel_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<#(\w+)(?:\|([^>]+))?>").unwrap())
}

fn user_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<@(\w+)(?:\|([^>]+))?>").unwrap())
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // `#`/`@` starts are channel/user tokens rules 4-5 chose to leave alone.
    PATTERN.get_or_init(|| Regex::new(r"<([^!|>#@][^|>]*)>").unwrap())
}

fn command_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<!(\w+)(?:\|([^>]+))?>").unwrap())
}

fn emoji_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r":([\w+-]+):").unwrap())
}

fn mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"@([\w.-]+)").unwrap())
}

fn residual_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<.+?\|(.+?)>").unwrap())
}

/// Translator between Slack markup and IRC plain text.
///
/// Holds the one pattern that depends on runtime configuration (the shadow
/// nick suffix); everything else is static.
#[derive(Debug, Clone)]
pub struct TextTransform {
    /// Matches `@?(\S+<suffix>\d?)` tokens in IRC text.
    shadow_token_pattern: Regex,
}

impl TextTransform {
    pub fn new(nick_suffix: &str) -> Self {
        let pattern = format!(r"@?(\S+{}\d?)", regex::escape(nick_suffix));
        Self {
            shadow_token_pattern: Regex::new(&pattern).unwrap(),
        }
    }

    /// Slack -> IRC. See the module docs for rule ordering.
    pub fn parse_text(&self, text: &str, ctx: &TransformContext) -> String {
        // 1. Newlines collapse to a single space.
        let text = text.replace("\r\n", " ").replace(['\n', '\r'], " ");

        // 2. The three HTML entities Slack escapes.
        let text = text
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">");

        // 3. Broadcast tokens.
        let text = text
            .replace("<!channel>", "@channel")
            .replace("<!group>", "@group")
            .replace("<!everyone>", "@everyone");

        // 4. Channel references: alias verbatim, else `#name` via lookup.
        let text = channel_ref_pattern().replace_all(&text, |caps: &regex::Captures| {
            if let Some(alias) = caps.get(2) {
                alias.as_str().to_string()
            } else if let Some(name) = ctx.channel_names.get(&caps[1]) {
                format!("#{}", name)
            } else {
                caps[0].to_string()
            }
        });

        // 5. User references: alias verbatim, else `@name` via lookup.
        let text = user_ref_pattern().replace_all(&text, |caps: &regex::Captures| {
            if let Some(alias) = caps.get(2) {
                alias.as_str().to_string()
            } else if let Some(name) = ctx.user_names.get(&caps[1]) {
                format!("@{}", name)
            } else {
                caps[0].to_string()
            }
        });

        // 6. Raw links: `<url>` with no pipe and no leading `!`.
        let text = link_pattern().replace_all(&text, "$1");

        // 7. Remaining command tokens keep their label (or name) in angles.
        let text = command_pattern().replace_all(&text, |caps: &regex::Captures| {
            let label = caps.get(2).map_or(&caps[1], |m| m.as_str());
            format!("<{}>", label)
        });

        // 8. Emoji shortcodes; unknown codes stay literal.
        let text = emoji_pattern().replace_all(&text, |caps: &regex::Captures| {
            emoji::lookup(&caps[1])
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        });

        // 9. `@name` mentions of users with a live shadow become the shadow
        //    nick so IRC clients highlight.
        let text = mention_pattern().replace_all(&text, |caps: &regex::Captures| {
            ctx.shadow_nicks
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        });

        // 10. Anything still shaped `<x|readable>` collapses to the label.
        residual_pattern().replace_all(&text, "$1").into_owned()
    }

    /// IRC -> Slack: tokens equal to a live shadow nick (optionally
    /// `@`-prefixed, optionally with a trailing collision digit) become the
    /// owner's Slack display name.
    pub fn replace_usernames(
        &self,
        text: &str,
        nick_to_slack_name: &HashMap<String, String>,
    ) -> String {
        self.shadow_token_pattern
            .replace_all(text, |caps: &regex::Captures| {
                nick_to_slack_name
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Wrap occurrences of channel members' display names with a caller-
    /// supplied highlight form (the bridge supplies `<@UID>`).
    pub fn map_slack_users<F>(&self, text: &str, members: &[(String, String)], highlight: F) -> String
    where
        F: Fn(&str, &str) -> String,
    {
        let mut out = text.to_string();
        for (name, id) in members {
            if name.is_empty() {
                continue;
            }
            let pattern = match Regex::new(&format!(r"\b{}\b", regex::escape(name))) {
                Ok(p) => p,
                Err(_) => continue,
            };
            let replacement = highlight(name, id);
            out = pattern.replace_all(&out, replacement.as_str()).into_owned();
        }
        out
    }
}
