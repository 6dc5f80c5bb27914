use tunestream::player::Player;

pub const HELP: &str = "commands: p play/pause, s stop, l next, h previous, q quit";

/// Commands typed on stdin, one per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCmd {
    Quit,
    PlayPause,
    Stop,
    Next,
    Prev,
}

impl ControlCmd {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "p" | "play" | "pause" => Some(Self::PlayPause),
            "s" | "stop" => Some(Self::Stop),
            "l" | "next" => Some(Self::Next),
            "h" | "prev" | "previous" => Some(Self::Prev),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }

    pub fn apply(self, player: &Player) {
        match self {
            Self::PlayPause => player.play_pause(),
            Self::Stop => player.stop(),
            Self::Next => player.next(),
            Self::Prev => player.previous(),
            // Quitting is handled by the input loop.
            Self::Quit => {}
        }
    }
}
