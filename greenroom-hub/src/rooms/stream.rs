/// The live-stream state of a room.
///
/// `Scheduled` is set through the scheduling collaborator and counts as
/// `Offline` everywhere except the snapshot; the stream itself is an opaque
/// url owned by the video transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamStatus {
    #[default]
    Offline,
    Scheduled,
    Live {
        url: String,
    },
}

impl StreamStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Live { url } => Some(url),
            _ => None,
        }
    }
}
