//! Extracts role and reply-mode hints from a raw inbound message.
//!
//! Recognised prefixes, checked in this order after the bot mention is
//! removed:
//!
//! | Prefix     | Effect                         |
//! |------------|--------------------------------|
//! | `[system]` | stored as a `system` turn      |
//! | `[images]` | answered by image generation   |
//!
//! Matching is exact and case-sensitive. When a prefix matches, every
//! occurrence of the marker is removed from the text, not only the leading
//! one. Parsing never fails; an empty prompt is the gateway's problem.

use chatrelay_core::{ReplyMode, Role};

pub const SYSTEM_MARKER: &str = "[system]";
pub const IMAGES_MARKER: &str = "[images]";

/// Roles a user may request for their own turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectiveRole {
    #[default]
    User,
    System,
}

impl From<DirectiveRole> for Role {
    fn from(role: DirectiveRole) -> Self {
        match role {
            DirectiveRole::User => Role::User,
            DirectiveRole::System => Role::System,
        }
    }
}

/// Parsed intent of one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub mode: ReplyMode,
    pub role: DirectiveRole,
    pub cleaned_text: String,
}

/// Parse `raw_text`, dropping every occurrence of `mention_token`.
pub fn parse(raw_text: &str, mention_token: &str) -> Directive {
    let mut text = if mention_token.is_empty() {
        raw_text.to_string()
    } else {
        raw_text.replace(mention_token, "")
    };

    text = text.trim().to_string();

    let mut role = DirectiveRole::User;
    if text.starts_with(SYSTEM_MARKER) {
        text = text.replace(SYSTEM_MARKER, "");
        role = DirectiveRole::System;
    }

    text = text.trim().to_string();

    let mut mode = ReplyMode::Chat;
    if text.starts_with(IMAGES_MARKER) {
        text = text.replace(IMAGES_MARKER, "");
        mode = ReplyMode::Image;
    }

    let cleaned_text = text.trim().trim_end_matches('\n').to_string();

    Directive {
        mode,
        role,
        cleaned_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_user_chat() {
        let d = parse("@bot what is rust?", "@bot");
        assert_eq!(d.mode, ReplyMode::Chat);
        assert_eq!(d.role, DirectiveRole::User);
        assert_eq!(d.cleaned_text, "what is rust?");
    }

    #[test]
    fn system_then_images_with_surrounding_whitespace() {
        let d = parse("  [system] [images]  hello  ", "@bot");
        assert_eq!(d.role, DirectiveRole::System);
        assert_eq!(d.mode, ReplyMode::Image);
        assert_eq!(d.cleaned_text, "hello");
    }

    #[test]
    fn mention_before_images_marker() {
        let d = parse("@bot [images] draw a cat", "@bot");
        assert_eq!(d.mode, ReplyMode::Image);
        assert_eq!(d.role, DirectiveRole::User);
        assert_eq!(d.cleaned_text, "draw a cat");
    }

    #[test]
    fn every_mention_occurrence_is_removed() {
        let d = parse("@bot hi @bot there@bot", "@bot");
        assert_eq!(d.cleaned_text, "hi  there");
    }

    #[test]
    fn matched_marker_is_removed_everywhere() {
        let d = parse("[system] be terse [system] always", "@bot");
        assert_eq!(d.role, DirectiveRole::System);
        assert_eq!(d.cleaned_text, "be terse  always");
    }

    #[test]
    fn marker_not_at_start_is_left_alone() {
        let d = parse("please [images] a dog", "@bot");
        assert_eq!(d.mode, ReplyMode::Chat);
        assert_eq!(d.cleaned_text, "please [images] a dog");
    }

    #[test]
    fn images_before_system_only_sets_mode() {
        // Prefix order is fixed: [system] is only recognised first.
        let d = parse("[images] [system] sunset", "@bot");
        assert_eq!(d.mode, ReplyMode::Image);
        assert_eq!(d.role, DirectiveRole::User);
        assert_eq!(d.cleaned_text, "[system] sunset");
    }

    #[test]
    fn markers_are_case_sensitive() {
        let d = parse("[System] hi", "@bot");
        assert_eq!(d.role, DirectiveRole::User);
        assert_eq!(d.cleaned_text, "[System] hi");
    }

    #[test]
    fn empty_after_stripping_is_still_a_directive() {
        let d = parse("@bot [images]\n", "@bot");
        assert_eq!(d.mode, ReplyMode::Image);
        assert_eq!(d.cleaned_text, "");
    }

    #[test]
    fn empty_mention_token_leaves_text_intact() {
        let d = parse(" hello ", "");
        assert_eq!(d.cleaned_text, "hello");
    }

    #[test]
    fn directive_role_maps_to_turn_role() {
        assert_eq!(Role::from(DirectiveRole::System), Role::System);
        assert_eq!(Role::from(DirectiveRole::User), Role::User);
    }
}
