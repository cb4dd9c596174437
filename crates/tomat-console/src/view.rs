//! Latest-result renderer state.

use tomat_core::FeedMessage;

/// What the presentation layer should currently show. A blocked camera is
/// a distinct persistent state, not just another status string, because it
/// stops all downstream function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display<'a> {
    /// Annotated frame data URL.
    Frame(&'a str),
    /// Camera permission/hardware failure, persistent until restart.
    Blocked(&'a str),
    /// Status or error text from the server.
    Status(&'a str),
    /// Nothing received yet.
    Waiting,
}

/// The renderer holds exactly the latest annotated frame and the latest
/// status text; older results are discarded, never merged. It performs no
/// timing logic — messages arrive complete and atomic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedView {
    pub latest_frame:   Option<String>,
    pub status:         Option<String>,
    pub camera_blocked: Option<String>,
}

impl FeedView {
    /// Fold one inbound result in. Each message updates exactly one field.
    pub fn apply(&mut self, msg: FeedMessage) {
        match msg {
            FeedMessage::Frame(payload) => self.latest_frame = Some(payload),
            FeedMessage::Status(text) => self.status = Some(text),
        }
    }

    /// A frame takes precedence over status text, so a rendered frame
    /// fully supersedes a prior error indicator.
    pub fn display(&self) -> Display<'_> {
        if let Some(reason) = &self.camera_blocked {
            return Display::Blocked(reason);
        }
        if let Some(frame) = &self.latest_frame {
            return Display::Frame(frame);
        }
        if let Some(status) = &self.status {
            return Display::Status(status);
        }
        Display::Waiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_updates_only_the_frame_field() {
        let mut view = FeedView::default();
        view.status = Some("connecting".into());
        view.apply(FeedMessage::Frame("data:image/jpeg;base64,AA".into()));

        assert_eq!(view.latest_frame.as_deref(), Some("data:image/jpeg;base64,AA"));
        // The error field is left untouched by a frame...
        assert_eq!(view.status.as_deref(), Some("connecting"));
    }

    #[test]
    fn status_updates_only_the_status_field() {
        let mut view = FeedView::default();
        view.latest_frame = Some("data:image/jpeg;base64,AA".into());
        view.apply(FeedMessage::Status("error: detector unavailable".into()));

        assert_eq!(view.status.as_deref(), Some("error: detector unavailable"));
        assert_eq!(view.latest_frame.as_deref(), Some("data:image/jpeg;base64,AA"));
    }

    #[test]
    fn newer_results_supersede_older_ones() {
        let mut view = FeedView::default();
        view.apply(FeedMessage::Status("first".into()));
        view.apply(FeedMessage::Status("second".into()));
        assert_eq!(view.status.as_deref(), Some("second"));

        view.apply(FeedMessage::Frame("data:image/jpeg;base64,AA".into()));
        view.apply(FeedMessage::Frame("data:image/jpeg;base64,BB".into()));
        assert_eq!(view.latest_frame.as_deref(), Some("data:image/jpeg;base64,BB"));
    }

    #[test]
    fn error_then_frame_leaves_no_residual_error_indicator() {
        let mut view = FeedView::default();

        view.apply(FeedMessage::Status("error: detector unavailable".into()));
        assert_eq!(view.display(), Display::Status("error: detector unavailable"));

        view.apply(FeedMessage::Frame("data:image/jpeg;base64,AA".into()));
        assert_eq!(view.display(), Display::Frame("data:image/jpeg;base64,AA"));
    }

    #[test]
    fn blocked_camera_is_a_persistent_distinct_state() {
        let mut view = FeedView::default();
        view.camera_blocked = Some("device busy".into());

        view.apply(FeedMessage::Status("connecting".into()));
        assert_eq!(view.display(), Display::Blocked("device busy"));
    }

    #[test]
    fn empty_view_is_waiting() {
        assert_eq!(FeedView::default().display(), Display::Waiting);
    }
}
