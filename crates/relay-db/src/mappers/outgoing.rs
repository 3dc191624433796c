//! Outgoing message entity <-> model mapper

use relay_core::entities::OutgoingMessage;

use crate::models::OutgoingMessageModel;

/// Convert OutgoingMessageModel to OutgoingMessage entity
impl From<OutgoingMessageModel> for OutgoingMessage {
    fn from(model: OutgoingMessageModel) -> Self {
        OutgoingMessage {
            id: model.id,
            channel_id: model.channel_id,
            payload_json: model.payload_json,
            expires_at: model.expires_at,
        }
    }
}
