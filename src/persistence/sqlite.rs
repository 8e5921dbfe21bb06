use super::{PersistenceError, PersistenceResult, ScheduleStore};
use crate::config::EngineConfig;
use crate::dependency::Dependency;
use crate::dependency_type::DependencyType;
use crate::task::{TaskElement, TaskId};
use crate::{Schedule, ScheduleMetadata};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

/// Schedule-wide settings stored in the single metadata row.
#[derive(Serialize, Deserialize)]
struct ScheduleHeader {
    metadata: ScheduleMetadata,
    #[serde(default)]
    config: EngineConfig,
    #[serde(default)]
    roots: Vec<TaskId>,
}

pub struct SqliteScheduleStore {
    connection: Mutex<Connection>,
}

impl SqliteScheduleStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS schedule_metadata (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                header_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY,
                task_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS dependencies (
                position INTEGER PRIMARY KEY,
                source INTEGER NOT NULL,
                destination INTEGER NOT NULL,
                type TEXT NOT NULL,
                visible INTEGER NOT NULL
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn lock(&self) -> PersistenceResult<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| PersistenceError::InvalidData("sqlite connection lock poisoned".into()))
    }

    fn save_header(tx: &Transaction, schedule: &Schedule) -> PersistenceResult<()> {
        let header = ScheduleHeader {
            metadata: schedule.metadata().clone(),
            config: schedule.config().clone(),
            roots: schedule.roots().to_vec(),
        };
        let json = serde_json::to_string(&header)?;
        tx.execute("DELETE FROM schedule_metadata", [])?;
        tx.execute(
            "INSERT INTO schedule_metadata (id, header_json) VALUES (1, ?1)",
            params![json],
        )?;
        Ok(())
    }

    fn save_tasks(tx: &Transaction, schedule: &Schedule) -> PersistenceResult<()> {
        tx.execute("DELETE FROM tasks", [])?;
        let mut stmt = tx.prepare("INSERT INTO tasks (id, task_json) VALUES (?1, ?2)")?;
        for element in schedule.tasks() {
            let json = serde_json::to_string(element)?;
            stmt.execute(params![element.id().get(), json])?;
        }
        Ok(())
    }

    fn save_dependencies(tx: &Transaction, schedule: &Schedule) -> PersistenceResult<()> {
        tx.execute("DELETE FROM dependencies", [])?;
        let mut stmt = tx.prepare(
            "INSERT INTO dependencies (position, source, destination, type, visible) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (position, dependency) in schedule.dependencies().iter().enumerate() {
            stmt.execute(params![
                position as i64,
                dependency.source().get(),
                dependency.destination().get(),
                dependency.dependency_type().as_str(),
                dependency.is_visible(),
            ])?;
        }
        Ok(())
    }

    fn load_dependencies(conn: &Connection) -> PersistenceResult<Vec<Dependency>> {
        let mut stmt = conn.prepare(
            "SELECT source, destination, type, visible FROM dependencies ORDER BY position ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?;

        let mut dependencies = Vec::new();
        for row in rows {
            let (source, destination, kind, visible) = row?;
            let dependency_type = kind.parse::<DependencyType>().map_err(|_| {
                PersistenceError::InvalidData(format!("invalid dependency type '{kind}'"))
            })?;
            dependencies.push(Dependency::with_visibility(
                TaskId::new(source),
                TaskId::new(destination),
                dependency_type,
                visible,
            ));
        }
        Ok(dependencies)
    }
}

impl ScheduleStore for SqliteScheduleStore {
    fn save_schedule(&self, schedule: &Schedule) -> PersistenceResult<()> {
        super::ensure_valid(schedule)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::save_header(&tx, schedule)?;
        Self::save_tasks(&tx, schedule)?;
        Self::save_dependencies(&tx, schedule)?;
        tx.commit()?;
        tracing::info!(
            tasks = schedule.len(),
            dependencies = schedule.dependencies().len(),
            "saved schedule to sqlite"
        );
        Ok(())
    }

    fn load_schedule(&self) -> PersistenceResult<Option<Schedule>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT header_json FROM schedule_metadata WHERE id = 1")?;
        let header_json: Option<String> = stmt.query_row([], |row| row.get(0)).optional()?;
        let Some(header_json) = header_json else {
            return Ok(None);
        };
        let header: ScheduleHeader = serde_json::from_str(&header_json)?;

        let mut stmt = conn.prepare("SELECT task_json FROM tasks ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut elements = Vec::new();
        for json in rows {
            let element: TaskElement = serde_json::from_str(&json?)?;
            elements.push(element);
        }

        let dependencies = Self::load_dependencies(&conn)?;
        let schedule = super::assemble(
            header.metadata,
            header.config,
            elements,
            header.roots,
            dependencies,
        )?;
        Ok(Some(schedule))
    }
}
