//! Classification of the terminal or editor hosting a session.
//!
//! Program names arrive in whatever case the environment reports ("vscode",
//! "Cursor", "iTerm.app"). Matching is a lowercase substring scan over an
//! ordered table; more specific names come first because several editors
//! embed another's name ("cursor" would also match a later "code" rule, and
//! "code-insiders" contains "code").

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    Cursor,
    VSCodeInsiders,
    VSCode,
    Windsurf,
    Zed,
    ITerm,
    Terminal,
    Kitty,
    Ghostty,
    Warp,
    WezTerm,
    Alacritty,
    Tmux,
    Unknown,
}

/// Checked top to bottom; first hit wins.
const HOST_TABLE: &[(&str, HostKind)] = &[
    ("cursor", HostKind::Cursor),
    ("insiders", HostKind::VSCodeInsiders),
    ("vscode", HostKind::VSCode),
    ("code", HostKind::VSCode),
    ("windsurf", HostKind::Windsurf),
    ("zed", HostKind::Zed),
    ("iterm", HostKind::ITerm),
    ("apple_terminal", HostKind::Terminal),
    ("terminal.app", HostKind::Terminal),
    ("kitty", HostKind::Kitty),
    ("ghostty", HostKind::Ghostty),
    ("warp", HostKind::Warp),
    ("wezterm", HostKind::WezTerm),
    ("alacritty", HostKind::Alacritty),
    ("tmux", HostKind::Tmux),
];

impl HostKind {
    pub fn classify(program: &str) -> HostKind {
        let normalized = program.to_lowercase();
        if normalized.is_empty() {
            return HostKind::Unknown;
        }
        HOST_TABLE
            .iter()
            .find(|(needle, _)| normalized.contains(needle))
            .map(|(_, kind)| *kind)
            .unwrap_or(HostKind::Unknown)
    }

    /// Editors can be focused by reopening the project through their CLI.
    pub fn is_editor(&self) -> bool {
        matches!(
            self,
            HostKind::Cursor
                | HostKind::VSCodeInsiders
                | HostKind::VSCode
                | HostKind::Windsurf
                | HostKind::Zed
        )
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            HostKind::Cursor => "Cursor",
            HostKind::VSCodeInsiders => "VS Code Insiders",
            HostKind::VSCode => "VS Code",
            HostKind::Windsurf => "Windsurf",
            HostKind::Zed => "Zed",
            HostKind::ITerm => "iTerm2",
            HostKind::Terminal => "Terminal",
            HostKind::Kitty => "kitty",
            HostKind::Ghostty => "Ghostty",
            HostKind::Warp => "Warp",
            HostKind::WezTerm => "WezTerm",
            HostKind::Alacritty => "Alacritty",
            HostKind::Tmux => "tmux",
            HostKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
