//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! ss-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Stored in `crates/integrations/migrations/` and embedded at compile time.

use super::{CommandError, connect};

/// Run integration database migrations.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running integration migrations...");
    sqlx::migrate!("../integrations/migrations").run(&pool).await?;

    tracing::info!("Integration migrations complete!");
    Ok(())
}
