//! Per-shopper application state.
//!
//! A [`Session`] is never mutated in place: [`Session::apply`] consumes an
//! [`Action`] and returns the next value, so every state change in the
//! service goes through one function.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::media::SourceImage;
use crate::models::{HistoryItem, ImageOrigin, ProductDescription, RenderedImage};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub original: Option<SourceImage>,
    pub current: Option<SourceImage>,
    pub analysis: Option<ProductDescription>,
    pub origin: Option<ImageOrigin>,
    /// Oldest first; items are only ever appended.
    pub history: Vec<HistoryItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum Action {
    Upload(SourceImage),
    Capture(SourceImage),
    AnalyzeSucceeded(ProductDescription),
    VisualizeSucceeded(RenderedImage),
    RestoreOriginal,
    SelectHistory(Uuid),
    Reset,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            original: None,
            current: None,
            analysis: None,
            origin: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&self, action: Action) -> Session {
        let mut next = self.clone();
        match action {
            Action::Upload(image) => next.load(image, ImageOrigin::Upload),
            Action::Capture(image) => next.load(image, ImageOrigin::Capture),
            Action::AnalyzeSucceeded(description) => next.analysis = Some(description),
            Action::VisualizeSucceeded(rendered) => {
                next.history.push(HistoryItem {
                    id: Uuid::new_v4(),
                    image: rendered.image.clone(),
                    prompt: rendered.prompt,
                    created_at: Utc::now(),
                });
                next.current = Some(rendered.image);
            }
            Action::RestoreOriginal => {
                next.current = next.original.clone();
                next.analysis = None;
            }
            Action::SelectHistory(id) => {
                let selected = next.history.iter().find(|item| item.id == id).map(|item| item.image.clone());
                let Some(image) = selected else {
                    return next;
                };
                next.current = Some(image);
            }
            Action::Reset => {
                next.original = None;
                next.current = None;
                next.analysis = None;
                next.origin = None;
            }
        }
        next.updated_at = Utc::now();
        next
    }

    fn load(&mut self, image: SourceImage, origin: ImageOrigin) {
        self.original = Some(image.clone());
        self.current = Some(image);
        self.analysis = None;
        self.origin = Some(origin);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Action {
    pub fn load(image: SourceImage, origin: ImageOrigin) -> Self {
        match origin {
            ImageOrigin::Upload => Self::Upload(image),
            ImageOrigin::Capture => Self::Capture(image),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::fixtures::{JPEG, PNG};
    use crate::models::fixtures::chair;
    use pretty_assertions::assert_eq;

    fn photo() -> SourceImage {
        SourceImage::new(JPEG.to_vec(), "image/jpeg").unwrap()
    }

    fn render(prompt: &str) -> RenderedImage {
        RenderedImage { image: SourceImage::new(PNG.to_vec(), "image/png").unwrap(), prompt: prompt.into() }
    }

    #[test]
    fn test_apply_leaves_previous_value_untouched() {
        let empty = Session::new();
        let loaded = empty.apply(Action::Upload(photo()));
        assert!(empty.current.is_none());
        assert_eq!(loaded.current, Some(photo()));
        assert_eq!(loaded.original, Some(photo()));
        assert_eq!(loaded.origin, Some(ImageOrigin::Upload));
        assert_eq!(loaded.id, empty.id);
    }

    #[test]
    fn test_loading_clears_analysis_but_keeps_history() {
        let session = Session::new()
            .apply(Action::Capture(photo()))
            .apply(Action::AnalyzeSucceeded(chair()))
            .apply(Action::VisualizeSucceeded(render("studio")))
            .apply(Action::Upload(photo()));
        assert_eq!(session.analysis, None);
        assert_eq!(session.history.len(), 1);
        assert_eq!(session.origin, Some(ImageOrigin::Upload));
    }

    #[test]
    fn test_visualize_appends_history_and_sets_current() {
        let session = Session::new()
            .apply(Action::Upload(photo()))
            .apply(Action::VisualizeSucceeded(render("first")))
            .apply(Action::VisualizeSucceeded(render("second")));
        let prompts: Vec<_> = session.history.iter().map(|h| h.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["first", "second"]);
        assert_eq!(session.current, Some(render("second").image));
        assert_eq!(session.original, Some(photo()));
    }

    #[test]
    fn test_restore_and_select_history() {
        let rendered = Session::new()
            .apply(Action::Upload(photo()))
            .apply(Action::VisualizeSucceeded(render("studio")));
        let item_id = rendered.history[0].id;

        let restored = rendered.apply(Action::RestoreOriginal);
        assert_eq!(restored.current, Some(photo()));

        let selected = restored.apply(Action::SelectHistory(item_id));
        assert_eq!(selected.current, Some(render("studio").image));

        let unknown = restored.apply(Action::SelectHistory(Uuid::new_v4()));
        assert_eq!(unknown, restored);
    }

    #[test]
    fn test_reset_keeps_history() {
        let session = Session::new()
            .apply(Action::Upload(photo()))
            .apply(Action::AnalyzeSucceeded(chair()))
            .apply(Action::VisualizeSucceeded(render("studio")))
            .apply(Action::Reset);
        assert_eq!(session.current, None);
        assert_eq!(session.original, None);
        assert_eq!(session.analysis, None);
        assert_eq!(session.history.len(), 1);
    }
}
