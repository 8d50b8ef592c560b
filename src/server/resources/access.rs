use log::debug;

use crate::server::operation::Operation;
use crate::server::response::Response;
use crate::server::schema::Schema;

/// Checks a verb against the schema view resolved for the caller. The view
/// already carries only the verbs granted to that identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessControl;

impl AccessControl {
    pub fn can(&self, op: &Operation, schema: &Schema, verb: &str) -> Result<(), Response> {
        if schema.allows(verb) {
            return Ok(());
        }
        debug!(
            "User '{}' cannot {verb} '{}', allowed: {:?}",
            op.user.name, schema.id, schema.verbs
        );
        Err(Response::unauthorized(format!(
            "cannot {verb} resource '{}'",
            schema.id
        )))
    }
}
