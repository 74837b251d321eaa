// Repository layer — each domain lives in its own file with `impl MeetRepository`.

use sqlx::sqlite::SqlitePool;

mod classes;
mod lifters;
mod lifts;
mod meet_state;

#[cfg(test)]
pub(crate) mod test_helpers;

#[derive(Clone)]
pub struct MeetRepository {
    pub(crate) pool: SqlitePool,
}

impl MeetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}
