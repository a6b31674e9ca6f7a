use std::fmt::Display;

use owo_colors::{OwoColorize, Style};

/// Colour roles used by the terminal views.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Tone {
    Heading,
    Good,
    Caution,
    Muted,
    Emphasis,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Self::Heading => Style::new().bold().cyan(),
            Self::Good => Style::new().bold().green(),
            Self::Caution => Style::new().bold().yellow(),
            Self::Muted => Style::new().dimmed(),
            Self::Emphasis => Style::new().bold(),
        }
    }
}

/// Applies colour to terminal text when the output stream supports it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Painter {
    use_colour: bool,
}

impl Painter {
    pub(crate) fn new(use_colour: bool) -> Self {
        Self { use_colour }
    }

    pub(crate) fn paint(&self, tone: Tone, text: impl Display) -> String {
        if self.use_colour {
            text.style(tone.style()).to_string()
        } else {
            text.to_string()
        }
    }

    pub(crate) fn heading(&self, text: impl Display) -> String {
        self.paint(Tone::Heading, text)
    }

    pub(crate) fn muted(&self, text: impl Display) -> String {
        self.paint(Tone::Muted, text)
    }

    pub(crate) fn value(&self, text: impl Display) -> String {
        self.paint(Tone::Emphasis, text)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn plain_painter_leaves_text_alone(
        #[values(Tone::Heading, Tone::Good, Tone::Caution, Tone::Muted, Tone::Emphasis)]
        tone: Tone,
    ) {
        assert_eq!("72.45", Painter::new(false).paint(tone, "72.45"));
    }

    #[rstest]
    fn colour_painter_wraps_text(
        #[values(Tone::Heading, Tone::Good, Tone::Caution, Tone::Muted, Tone::Emphasis)]
        tone: Tone,
    ) {
        let styled = Painter::new(true).paint(tone, "kg");
        assert_ne!("kg", styled);
        assert!(styled.contains("kg"));
    }
}
