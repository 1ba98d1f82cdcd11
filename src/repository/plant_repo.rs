// ==========================================
// 农场区块生命周期 - 作物参考数据仓储
// ==========================================
// 核心流程只读; upsert 用于同步外部作物数据
// ==========================================

use crate::domain::plant::PlantGrowthProfile;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

const PLANT_COLUMNS: &str = r#"
    plant_id, name, germination_days, vegetative_days, flowering_days,
    fruiting_days, harvest_window_days, predicted_yield_per_plant_kg
"#;

pub struct PlantProfileRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PlantProfileRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, plant_id: &str) -> RepositoryResult<Option<PlantGrowthProfile>> {
        let conn = self.get_conn()?;
        match conn.query_row(
            &format!(
                "SELECT {} FROM plant_growth_profile WHERE plant_id = ?",
                PLANT_COLUMNS
            ),
            params![plant_id],
            map_plant_row,
        ) {
            Ok(p) => Ok(Some(p)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<PlantGrowthProfile>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM plant_growth_profile ORDER BY plant_id",
            PLANT_COLUMNS
        ))?;
        let profiles = stmt
            .query_map([], map_plant_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    /// 插入或覆盖作物数据
    pub fn upsert(&self, p: &PlantGrowthProfile) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                r#"INSERT INTO plant_growth_profile ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT(plant_id) DO UPDATE SET
                       name = excluded.name,
                       germination_days = excluded.germination_days,
                       vegetative_days = excluded.vegetative_days,
                       flowering_days = excluded.flowering_days,
                       fruiting_days = excluded.fruiting_days,
                       harvest_window_days = excluded.harvest_window_days,
                       predicted_yield_per_plant_kg = excluded.predicted_yield_per_plant_kg"#,
                PLANT_COLUMNS
            ),
            params![
                p.plant_id,
                p.name,
                p.germination_days,
                p.vegetative_days,
                p.flowering_days,
                p.fruiting_days,
                p.harvest_window_days,
                p.predicted_yield_per_plant_kg,
            ],
        )?;
        Ok(())
    }
}

fn map_plant_row(row: &rusqlite::Row) -> rusqlite::Result<PlantGrowthProfile> {
    Ok(PlantGrowthProfile {
        plant_id: row.get(0)?,
        name: row.get(1)?,
        germination_days: row.get(2)?,
        vegetative_days: row.get(3)?,
        flowering_days: row.get(4)?,
        fruiting_days: row.get(5)?,
        harvest_window_days: row.get(6)?,
        predicted_yield_per_plant_kg: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    #[test]
    fn test_upsert_and_find() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let repo = PlantProfileRepository::new(Arc::new(Mutex::new(conn)));

        let mut p = PlantGrowthProfile {
            plant_id: "lettuce".into(),
            name: "Lettuce".into(),
            germination_days: 7,
            vegetative_days: 30,
            flowering_days: 0,
            fruiting_days: None,
            harvest_window_days: 14,
            predicted_yield_per_plant_kg: 0.3,
        };
        repo.upsert(&p).unwrap();
        assert_eq!(repo.find_by_id("lettuce").unwrap(), Some(p.clone()));

        p.harvest_window_days = 21;
        repo.upsert(&p).unwrap();
        let all = repo.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].harvest_window_days, 21);
        assert!(repo.find_by_id("kale").unwrap().is_none());
    }
}
