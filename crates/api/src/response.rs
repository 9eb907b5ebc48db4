//! Shared response envelope.
//!
//! Retention endpoints answer with `{ "data": ... }`. `/health` is the only
//! route that returns a bare object.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
