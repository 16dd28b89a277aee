//! Static emoji shortcode table.
//!
//! Maps Slack shortcodes (without the surrounding colons) to unicode.
//! Unknown shortcodes are left untouched by the caller.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Shortcodes Slack commonly emits, with their unicode renderings.
const EMOJI: &[(&str, &str)] = &[
    ("+1", "👍"),
    ("-1", "👎"),
    ("100", "💯"),
    ("angry", "😠"),
    ("arrow_down", "⬇️"),
    ("arrow_up", "⬆️"),
    ("blush", "😊"),
    ("boom", "💥"),
    ("bow", "🙇"),
    ("bulb", "💡"),
    ("cake", "🍰"),
    ("chart_with_upwards_trend", "📈"),
    ("checkered_flag", "🏁"),
    ("clap", "👏"),
    ("coffee", "☕"),
    ("confused", "😕"),
    ("cool", "🆒"),
    ("cry", "😢"),
    ("crying_cat_face", "😿"),
    ("dancer", "💃"),
    ("disappointed", "😞"),
    ("eyes", "👀"),
    ("facepunch", "👊"),
    ("fire", "🔥"),
    ("fireworks", "🎆"),
    ("grimacing", "😬"),
    ("grin", "😁"),
    ("heart", "❤️"),
    ("heavy_check_mark", "✔️"),
    ("hourglass", "⌛"),
    ("joy", "😂"),
    ("laughing", "😆"),
    ("lock", "🔒"),
    ("mag", "🔍"),
    ("muscle", "💪"),
    ("neutral_face", "😐"),
    ("no_entry", "⛔"),
    ("ok_hand", "👌"),
    ("open_mouth", "😮"),
    ("party", "🎉"),
    ("pensive", "😔"),
    ("poop", "💩"),
    ("pray", "🙏"),
    ("question", "❓"),
    ("rage", "😡"),
    ("raised_hands", "🙌"),
    ("relieved", "😌"),
    ("rocket", "🚀"),
    ("rotating_light", "🚨"),
    ("scream", "😱"),
    ("see_no_evil", "🙈"),
    ("ship", "🚢"),
    ("shrug", "🤷"),
    ("skull", "💀"),
    ("sleeping", "😴"),
    ("smile", "😄"),
    ("smiley", "😃"),
    ("smirk", "😏"),
    ("sob", "😭"),
    ("sparkles", "✨"),
    ("star", "⭐"),
    ("stuck_out_tongue", "😛"),
    ("sunglasses", "😎"),
    ("sweat_smile", "😅"),
    ("tada", "🎉"),
    ("thinking_face", "🤔"),
    ("thumbsup", "👍"),
    ("thumbsdown", "👎"),
    ("tophat", "🎩"),
    ("unamused", "😒"),
    ("warning", "⚠️"),
    ("wave", "👋"),
    ("wink", "😉"),
    ("x", "❌"),
    ("zzz", "💤"),
];

fn table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| EMOJI.iter().copied().collect())
}

/// Look up a shortcode (without colons). Returns `None` when unknown.
pub fn lookup(shortcode: &str) -> Option<&'static str> {
    table().get(shortcode).copied()
}
