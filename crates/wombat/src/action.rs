//! Edit actions sent as `{"action": ..., "data": ...}` messages

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{Result, WombatError};
use crate::images::ImageAssets;

/// Raw edit message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionMessage {
    pub action: String,
    #[serde(default)]
    pub data: String,
}

/// A decoded edit action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetSynopsis(String),
    SetContent(String),
    /// Flip the published flag
    TogglePublished,
    /// Remove a gallery image by `src`
    DeleteImage(String),
}

impl Action {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let message: ActionMessage =
            serde_json::from_slice(bytes).map_err(|e| WombatError::BadRequest(e.to_string()))?;
        Self::try_from(message)
    }

    pub async fn apply(self, document: &mut Document, assets: &ImageAssets) -> Result<()> {
        match self {
            Action::SetSynopsis(synopsis) => document.set_synopsis(synopsis).await,
            Action::SetContent(content) => document.set_content(content).await,
            Action::TogglePublished => {
                let publish = !document.is_published();
                document.publish(publish).await
            }
            Action::DeleteImage(src) => assets.remove_image(document, &src).await.map(|_| ()),
        }
    }
}

impl TryFrom<ActionMessage> for Action {
    type Error = WombatError;

    fn try_from(message: ActionMessage) -> Result<Self> {
        match message.action.as_str() {
            "setSynopsis" => Ok(Action::SetSynopsis(message.data)),
            "setContent" => Ok(Action::SetContent(message.data)),
            "setActive" => Ok(Action::TogglePublished),
            "deleteImage" => Ok(Action::DeleteImage(message.data)),
            other => Err(WombatError::BadRequest(format!("Invalid Action: {other}"))),
        }
    }
}
