use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The motion applied to a scene's image over its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    /// Opacity ramps in over the first half of the scene
    Fade,
    /// Image slides in from the right over the first half of the scene
    Slide,
    /// Slow continuous zoom-in
    Zoom,
    /// Static image
    None,
}

/// Transitions assigned to scenes by position, repeating
pub const TRANSITION_CYCLE: [TransitionKind; 3] =
    [TransitionKind::Zoom, TransitionKind::Slide, TransitionKind::Fade];

/// Transition for the scene at `index`
pub fn transition_for(index: usize) -> TransitionKind {
    TRANSITION_CYCLE[index % TRANSITION_CYCLE.len()]
}

impl TransitionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fade => "fade",
            Self::Slide => "slide",
            Self::Zoom => "zoom",
            Self::None => "none",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransitionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fade" => Ok(Self::Fade),
            "slide" => Ok(Self::Slide),
            "zoom" => Ok(Self::Zoom),
            "none" => Ok(Self::None),
            other => Err(format!("unknown transition '{other}' (expected fade, slide, zoom or none)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_starts_with_zoom() {
        let kinds: Vec<_> = (0..7).map(transition_for).collect();
        assert_eq!(
            kinds,
            vec![
                TransitionKind::Zoom,
                TransitionKind::Slide,
                TransitionKind::Fade,
                TransitionKind::Zoom,
                TransitionKind::Slide,
                TransitionKind::Fade,
                TransitionKind::Zoom,
            ]
        );
    }

    #[test]
    fn test_parse_roundtrip() {
        for kind in [TransitionKind::Fade, TransitionKind::Slide, TransitionKind::Zoom, TransitionKind::None] {
            assert_eq!(kind.to_string().parse::<TransitionKind>(), Ok(kind));
        }
        assert_eq!("ZOOM".parse::<TransitionKind>(), Ok(TransitionKind::Zoom));
        assert!("wipe".parse::<TransitionKind>().is_err());
    }
}
