// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal palette for human-readable output and clap help.

use clap::builder::styling::{Ansi256Color, Color, Style, Styles};
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy)]
enum Role {
    /// WU ids, resources, table headers
    Header,
    /// Commands and flags in help
    Literal,
    Muted,
    Good,
    Bad,
}

impl Role {
    fn ansi256(self) -> u8 {
        match self {
            Role::Header => 74,
            Role::Literal => 250,
            Role::Muted => 240,
            Role::Good => 108,
            Role::Bad => 167,
        }
    }

    fn style(self) -> Style {
        Style::new().fg_color(Some(Color::Ansi256(Ansi256Color(self.ansi256()))))
    }
}

/// Any non-empty `NO_COLOR` disables color, `COLOR=1` forces it, otherwise
/// color follows whether stdout is a terminal.
pub fn enabled() -> bool {
    if std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()) {
        return false;
    }
    std::env::var("COLOR").is_ok_and(|v| v == "1") || std::io::stdout().is_terminal()
}

pub fn styles() -> Styles {
    if !enabled() {
        return Styles::plain();
    }
    Styles::styled()
        .header(Role::Header.style())
        .literal(Role::Literal.style())
        .placeholder(Role::Muted.style())
}

fn paint(role: Role, text: &str) -> String {
    if enabled() {
        format!("\x1b[38;5;{}m{text}\x1b[0m", role.ansi256())
    } else {
        text.to_string()
    }
}

pub fn header(text: &str) -> String {
    paint(Role::Header, text)
}

pub fn muted(text: &str) -> String {
    paint(Role::Muted, text)
}

pub fn good(text: &str) -> String {
    paint(Role::Good, text)
}

pub fn bad(text: &str) -> String {
    paint(Role::Bad, text)
}
