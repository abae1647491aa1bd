use std::sync::LazyLock;

use regex::Regex;

/// `<script ...>...</script>` blocks, case-insensitive, spanning lines.
static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("script pattern compiles")
});

/// Strip embedded script blocks from message content. Not a general HTML
/// sanitizer: clients still render content as text.
pub fn strip_scripts(content: &str) -> String {
    SCRIPT_BLOCK.replace_all(content, "").into_owned()
}
