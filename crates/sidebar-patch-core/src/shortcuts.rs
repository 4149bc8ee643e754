/// Modifier state and key of a keydown event.
///
/// Shift is not tracked: it shows up in the case of `key`, and Alt+PageDown
/// matches either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord<'a> {
    pub key: &'a str,
    pub ctrl: bool,
    pub alt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// Ctrl+Shift+L: re-inject and re-apply the persisted visibility.
    Reinitialize,
    /// Ctrl+L
    Toggle,
    /// Ctrl+W
    CloseWindow,
    /// Alt+PageDown, with or without Shift.
    ScrollToBottom,
}

impl Shortcut {
    /// Maps a keydown to a shortcut. Keys are compared case-sensitively, so
    /// Shift is carried by the key itself (`"L"` vs `"l"`).
    #[must_use]
    pub fn from_chord(chord: KeyChord<'_>) -> Option<Self> {
        if chord.ctrl {
            return match chord.key {
                "L" => Some(Self::Reinitialize),
                "l" => Some(Self::Toggle),
                "w" => Some(Self::CloseWindow),
                _ => None,
            };
        }
        if chord.alt && chord.key == "PageDown" {
            return Some(Self::ScrollToBottom);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(key: &str, ctrl: bool, alt: bool) -> KeyChord<'_> {
        KeyChord { key, ctrl, alt }
    }

    #[test]
    fn ctrl_chords_are_case_sensitive() {
        assert_eq!(
            Shortcut::from_chord(chord("L", true, false)),
            Some(Shortcut::Reinitialize)
        );
        assert_eq!(
            Shortcut::from_chord(chord("l", true, false)),
            Some(Shortcut::Toggle)
        );
        assert_eq!(
            Shortcut::from_chord(chord("w", true, false)),
            Some(Shortcut::CloseWindow)
        );
        assert_eq!(Shortcut::from_chord(chord("W", true, false)), None);
        assert_eq!(Shortcut::from_chord(chord("l", false, false)), None);
    }

    #[test]
    fn alt_page_down_scrolls_without_ctrl() {
        assert_eq!(
            Shortcut::from_chord(chord("PageDown", false, true)),
            Some(Shortcut::ScrollToBottom)
        );
        assert_eq!(Shortcut::from_chord(chord("PageDown", false, false)), None);
        assert_eq!(Shortcut::from_chord(chord("PageDown", true, true)), None);
    }
}
