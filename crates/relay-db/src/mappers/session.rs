//! Gateway session entity <-> model mapper

use relay_core::entities::GatewaySession;

use crate::models::SessionModel;

/// Convert SessionModel to GatewaySession entity
impl From<SessionModel> for GatewaySession {
    fn from(model: SessionModel) -> Self {
        GatewaySession {
            session_id: model.session_id,
            sequence_number: model.sequence_number,
        }
    }
}
