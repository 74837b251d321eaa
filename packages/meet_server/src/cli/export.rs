use std::sync::Arc;

use anyhow::Result;

use crate::config::{self, FileConfig, MeetConfig};
use crate::db::Database;
use crate::hub::EventHub;
use crate::metrics::ServerMetrics;
use crate::repository::MeetRepository;
use crate::service::MeetService;

/// `meetd export`: write both CSVs from the local database without a server.
pub async fn export_command(config: &MeetConfig, file_config: &FileConfig) -> Result<()> {
    let db = Database::new(config).await?;
    let service = MeetService::new(
        MeetRepository::new(db.pool.clone()),
        Arc::new(EventHub::new(Arc::new(ServerMetrics::new()))),
        config::judge_panel(&file_config.judges),
        file_config.meet.date,
    );

    let mut export = service.export().await?;
    export.write_to(&config.exports_dir)?;
    for path in &export.files {
        println!("{}", path.display());
    }
    Ok(())
}
