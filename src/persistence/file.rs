use super::{PersistenceError, PersistenceResult};
use crate::{
    Schedule, ScheduleMetadata,
    config::EngineConfig,
    dependency::{Dependency, DependencyRecord},
    dependency_type::DependencyType,
    resource::ResourceAllocation,
    task::{OrderElement, StartConstraint, Task, TaskElement, TaskGroup, TaskId, TaskKind},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

#[derive(Serialize, Deserialize)]
struct ScheduleSnapshot {
    metadata: ScheduleMetadata,
    #[serde(default)]
    config: EngineConfig,
    #[serde(default)]
    roots: Vec<TaskId>,
    tasks: Vec<TaskElement>,
    #[serde(default)]
    dependencies: Vec<DependencyRecord>,
}

impl ScheduleSnapshot {
    fn from_schedule(schedule: &Schedule) -> PersistenceResult<Self> {
        super::ensure_valid(schedule)?;
        Ok(Self {
            metadata: schedule.metadata().clone(),
            config: schedule.config().clone(),
            roots: schedule.roots().to_vec(),
            tasks: schedule.tasks().cloned().collect(),
            dependencies: schedule
                .dependencies()
                .iter()
                .map(Dependency::to_record)
                .collect(),
        })
    }

    fn into_schedule(self) -> PersistenceResult<Schedule> {
        let dependencies = records_into_dependencies(self.dependencies)?;
        super::assemble(
            self.metadata,
            self.config,
            self.tasks,
            self.roots,
            dependencies,
        )
    }
}

pub(crate) fn records_into_dependencies(
    records: Vec<DependencyRecord>,
) -> PersistenceResult<Vec<Dependency>> {
    records
        .into_iter()
        .map(|record| {
            Dependency::try_from(record)
                .map_err(|err| PersistenceError::InvalidData(err.to_string()))
        })
        .collect()
}

pub fn save_schedule_to_json<P: AsRef<Path>>(
    schedule: &Schedule,
    path: P,
) -> PersistenceResult<()> {
    let snapshot = ScheduleSnapshot::from_schedule(schedule)?;
    let file = File::create(path.as_ref())?;
    serde_json::to_writer_pretty(file, &snapshot)?;
    tracing::info!(
        path = %path.as_ref().display(),
        tasks = snapshot.tasks.len(),
        "saved schedule as json"
    );
    Ok(())
}

pub fn load_schedule_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<Schedule> {
    let file = File::open(path.as_ref())?;
    let snapshot: ScheduleSnapshot = serde_json::from_reader(file)?;
    let schedule = snapshot.into_schedule()?;
    tracing::info!(
        path = %path.as_ref().display(),
        tasks = schedule.len(),
        "loaded schedule from json"
    );
    Ok(schedule)
}

/// One row per element. The first row carries metadata and config instead of a task.
///
/// Incoming dependencies are stored on their destination's row, so the relative order
/// of dependencies sharing a destination survives a round trip.
#[derive(Default, Serialize, Deserialize)]
struct TaskCsvRecord {
    id: u32,
    name: String,
    kind: String,
    root_index: String,
    parent_id: String,
    children: String,
    start_date: String,
    end_date: String,
    notes: String,
    order_code: String,
    order_name: String,
    order_work_hours: String,
    start_constraint: String,
    work_hours: String,
    resource_allocations: String,
    incoming: String,
    #[serde(default)]
    metadata_json: String,
    #[serde(default)]
    config_json: String,
}

impl TaskCsvRecord {
    fn metadata_row(schedule: &Schedule) -> PersistenceResult<Self> {
        Ok(TaskCsvRecord {
            name: "__metadata__".to_string(),
            metadata_json: serde_json::to_string(schedule.metadata())?,
            config_json: serde_json::to_string(schedule.config())?,
            ..TaskCsvRecord::default()
        })
    }

    fn is_metadata_row(&self) -> bool {
        !self.metadata_json.trim().is_empty()
    }

    fn from_element(schedule: &Schedule, element: &TaskElement) -> PersistenceResult<Self> {
        let order = element.order_element();
        let (kind, work_hours) = match element.kind() {
            TaskKind::Task(task) => ("task", task.work_hours),
            TaskKind::Group(_) => ("group", None),
        };
        Ok(TaskCsvRecord {
            id: element.id().get(),
            name: element.name().to_string(),
            kind: kind.to_string(),
            root_index: schedule
                .roots()
                .iter()
                .position(|id| *id == element.id())
                .map(|idx| idx.to_string())
                .unwrap_or_default(),
            parent_id: element.parent().map(|p| p.to_string()).unwrap_or_default(),
            children: join_ids(element.children()),
            start_date: format_date(element.start_date()),
            end_date: format_date(element.end_date()),
            notes: element.notes().unwrap_or_default().to_string(),
            order_code: order.map(|o| o.code.clone()).unwrap_or_default(),
            order_name: order.map(|o| o.name.clone()).unwrap_or_default(),
            order_work_hours: order.map(|o| o.work_hours.to_string()).unwrap_or_default(),
            start_constraint: serde_json::to_string(&element.start_constraint())?,
            work_hours: work_hours.map(|h| h.to_string()).unwrap_or_default(),
            resource_allocations: serde_json::to_string(element.resource_allocations())?,
            incoming: schedule
                .incoming(element.id())
                .into_iter()
                .map(|dep| {
                    format!(
                        "{}:{}:{}",
                        dep.source(),
                        dep.dependency_type(),
                        dep.is_visible()
                    )
                })
                .collect::<Vec<_>>()
                .join(";"),
            ..TaskCsvRecord::default()
        })
    }

    fn into_element(self) -> PersistenceResult<(TaskElement, Option<usize>, Vec<Dependency>)> {
        let id = TaskId::new(self.id);
        let allocations: Vec<ResourceAllocation> = parse_json_or_default(
            &self.resource_allocations,
            "resource_allocations",
        )?;
        let kind = match self.kind.trim() {
            "task" => TaskKind::Task(Task::with_allocations(
                parse_u32(&self.work_hours)?,
                allocations,
            )),
            "group" => {
                let mut group = TaskGroup::default();
                *group.children_mut() = split_ids(&self.children)?;
                TaskKind::Group(group)
            }
            other => {
                return Err(PersistenceError::InvalidData(format!(
                    "invalid kind '{other}' for task {id}"
                )));
            }
        };

        let mut element = TaskElement::new(id, self.name, kind);
        element.set_new_object(false);
        element.set_dates_unchecked(parse_date(&self.start_date)?, parse_date(&self.end_date)?);
        element.set_notes(parse_string_option(self.notes));
        element.set_parent(parse_u32(&self.parent_id)?.map(TaskId::new));
        element.set_start_constraint(parse_json_or_default::<StartConstraint>(
            &self.start_constraint,
            "start_constraint",
        )?);
        if let Some(work_hours) = parse_u32(&self.order_work_hours)? {
            element.set_order_element(Some(OrderElement::new(
                self.order_code,
                self.order_name,
                work_hours,
            )));
        }

        let root_index = parse_u32(&self.root_index)?.map(|idx| idx as usize);
        let incoming = split_incoming(id, &self.incoming)?;
        Ok((element, root_index, incoming))
    }
}

pub fn save_schedule_to_csv<P: AsRef<Path>>(
    schedule: &Schedule,
    path: P,
) -> PersistenceResult<()> {
    super::ensure_valid(schedule)?;
    let file = File::create(path.as_ref())?;
    let mut writer = csv::Writer::from_writer(file);
    writer.serialize(TaskCsvRecord::metadata_row(schedule)?)?;
    for element in schedule.tasks() {
        writer.serialize(TaskCsvRecord::from_element(schedule, element)?)?;
    }
    writer.flush()?;
    tracing::info!(
        path = %path.as_ref().display(),
        tasks = schedule.len(),
        "saved schedule as csv"
    );
    Ok(())
}

pub fn load_schedule_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<Schedule> {
    let file = File::open(path.as_ref())?;
    let mut reader = csv::Reader::from_reader(file);
    let mut metadata: Option<ScheduleMetadata> = None;
    let mut config: Option<EngineConfig> = None;
    let mut elements = Vec::new();
    let mut roots: BTreeMap<usize, TaskId> = BTreeMap::new();
    let mut dependencies = Vec::new();

    for record in reader.deserialize::<TaskCsvRecord>() {
        let record = record?;
        if record.is_metadata_row() {
            if metadata.is_some() {
                return Err(PersistenceError::InvalidData(
                    "CSV file contained multiple metadata rows".into(),
                ));
            }
            metadata = Some(parse_json_or_default(&record.metadata_json, "metadata")?);
            config = Some(parse_json_or_default(&record.config_json, "config")?);
            continue;
        }
        let (element, root_index, incoming) = record.into_element()?;
        if let Some(idx) = root_index {
            if roots.insert(idx, element.id()).is_some() {
                return Err(PersistenceError::InvalidData(format!(
                    "duplicate root index {idx}"
                )));
            }
        }
        dependencies.extend(incoming);
        elements.push(element);
    }

    let schedule = super::assemble(
        metadata.unwrap_or_default(),
        config.unwrap_or_default(),
        elements,
        roots.into_values().collect(),
        dependencies,
    )?;
    tracing::info!(
        path = %path.as_ref().display(),
        tasks = schedule.len(),
        "loaded schedule from csv"
    );
    Ok(schedule)
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn parse_date(input: &str) -> PersistenceResult<Option<NaiveDate>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid date '{input}': {e}")))
}

fn parse_u32(input: &str) -> PersistenceResult<Option<u32>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    input
        .trim()
        .parse::<u32>()
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid integer '{input}': {e}")))
}

fn parse_json_or_default<T>(input: &str, field: &str) -> PersistenceResult<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if input.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(input)
        .map_err(|err| PersistenceError::InvalidData(format!("invalid {field}: {err}")))
}

fn join_ids(values: &[TaskId]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn split_ids(input: &str) -> PersistenceResult<Vec<TaskId>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    input
        .split(',')
        .map(|part| {
            part.parse::<TaskId>().map_err(|e| {
                PersistenceError::InvalidData(format!("invalid task id '{part}': {e}"))
            })
        })
        .collect()
}

/// Parses `source:type:visible` entries separated by `;`.
fn split_incoming(destination: TaskId, input: &str) -> PersistenceResult<Vec<Dependency>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    input
        .split(';')
        .map(|entry| {
            let invalid = || PersistenceError::InvalidData(format!("invalid dependency '{entry}'"));
            let mut parts = entry.trim().split(':');
            let source = parts
                .next()
                .and_then(|p| p.parse::<TaskId>().ok())
                .ok_or_else(invalid)?;
            let dependency_type = parts
                .next()
                .and_then(|p| p.parse::<DependencyType>().ok())
                .ok_or_else(invalid)?;
            let visible = match parts.next().map(str::trim) {
                None | Some("true") => true,
                Some("false") => false,
                Some(_) => return Err(invalid()),
            };
            Ok(Dependency::with_visibility(
                source,
                destination,
                dependency_type,
                visible,
            ))
        })
        .collect()
}

fn parse_string_option(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
