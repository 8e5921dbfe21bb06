use chrono::NaiveDate;
#[cfg(feature = "sqlite")]
use gantt_core::{ScheduleStore, SqliteScheduleStore};
use gantt_core::{
    Dependency, DependencyType, Endpoint, EngineConfig, OrderElement, PropagationPolicy, Schedule,
    StartConstraint, TaskId, TaskKind, load_schedule_from_csv,
    load_schedule_from_json, logging, save_schedule_to_csv, save_schedule_to_json,
};
use std::io::{self, Write};

type CommandResult = Result<(), String>;

fn render_text_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (ci, cell) in row.iter().enumerate() {
            if cell.len() > widths[ci] {
                widths[ci] = cell.len();
            }
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&render_row(header, &widths));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&render_row(&cells, &widths));
        out.push('\n');
    }
    out.push_str(&sep);
    out
}

fn render_row(cells: &[&str], widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (cell, width) in cells.iter().zip(widths) {
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(width.saturating_sub(cell.len())));
        line.push_str(" |");
    }
    line
}

fn render_schedule(schedule: &Schedule) -> String {
    let header = [
        "id", "name", "kind", "parent", "start", "end", "order", "hours", "incoming",
    ];
    let mut rows = Vec::new();
    for root in schedule.roots() {
        let Ok(ids) = schedule.subtree(*root) else {
            continue;
        };
        for id in ids {
            let Some(element) = schedule.task(id) else {
                continue;
            };
            let depth = ancestors(schedule, id);
            let kind = match element.kind() {
                TaskKind::Task(_) => "task",
                TaskKind::Group(_) => "group",
            };
            rows.push(vec![
                id.to_string(),
                format!("{}{}", "  ".repeat(depth), element.name()),
                kind.to_string(),
                element.parent().map(|p| p.to_string()).unwrap_or_default(),
                element.start_date().map(|d| d.to_string()).unwrap_or_default(),
                element.end_date().map(|d| d.to_string()).unwrap_or_default(),
                element
                    .order_element()
                    .map(|o| o.code.clone())
                    .unwrap_or_default(),
                element
                    .default_work_hours()
                    .map(|h| h.to_string())
                    .unwrap_or_default(),
                schedule
                    .incoming(id)
                    .iter()
                    .map(|dep| format!("{}:{}", dep.source(), dep.dependency_type()))
                    .collect::<Vec<_>>()
                    .join(","),
            ]);
        }
    }
    render_text_table(&header, &rows)
}

fn ancestors(schedule: &Schedule, id: TaskId) -> usize {
    let mut depth = 0;
    let mut cursor = schedule.task(id).and_then(|e| e.parent());
    while let Some(parent) = cursor {
        depth += 1;
        cursor = schedule.task(parent).and_then(|e| e.parent());
    }
    depth
}

fn print_help() {
    println!(
        "Commands:\n  help                               Show this help\n  show                               Show current schedule\n  task <name...>                     Create a top-level task\n  group <name> [code hours]          Create a top-level group, optionally with an order element\n  nest <group> <child> [index]       Move child into group (appends without index)\n  unnest <group> <child>             Remove child from group, making it top-level\n  dates <id> <start> <end>           Set dates (YYYY-MM-DD, end exclusive)\n  startcon <id> <asap|snet|fixed> [date]\n                                     Set the task's own start constraint\n  dep <src> <dst> <type>             Add dependency (end_start|start_start|end_end|start_end)\n  undep <src> <dst> <type>           Remove dependency\n  retype <src> <dst> <old> <new>     Change a dependency's type\n  constraints <id> <start|end>       List constraints on an endpoint\n  calc <id> <start|end> <date>       Calculate an endpoint from a candidate date\n  propagate [id]                     Propagate one task or the whole schedule\n  policy [last_wins|tightest]        Show or set the propagation policy\n  config <json_path>                 Load engine configuration from JSON\n  alloc <id> <resource> <units>      Allocate a resource to a task\n  allocations <id>                   List allocations visible at a task\n  hours <id> [hours]                 Show default hours/duration or set a task's hours\n  validate                           Report structural violations\n  save <json|csv|sqlite> <path>      Persist schedule to disk\n  load <json|csv|sqlite> <path>      Load schedule from disk\n  remove <id>                        Delete a task with its subtree\n  quit|exit                          Exit"
    );
}

fn parse_id(s: Option<&str>) -> Result<TaskId, String> {
    let s = s.ok_or("missing task id")?;
    s.parse::<TaskId>().map_err(|_| format!("invalid task id '{s}'"))
}

fn parse_date(s: Option<&str>) -> Result<NaiveDate, String> {
    let s = s.ok_or("missing date")?;
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date '{s}': {e}"))
}

fn parse_type(s: Option<&str>) -> Result<DependencyType, String> {
    let s = s.ok_or("missing dependency type")?;
    s.parse::<DependencyType>()
}

fn parse_endpoint(s: Option<&str>) -> Result<Endpoint, String> {
    match s {
        Some("start") => Ok(Endpoint::Start),
        Some("end") => Ok(Endpoint::End),
        Some(other) => Err(format!("invalid endpoint '{other}', expected start or end")),
        None => Err("missing endpoint".into()),
    }
}

fn parse_dependency<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<Dependency, String> {
    let source = parse_id(parts.next())?;
    let destination = parse_id(parts.next())?;
    let dependency_type = parse_type(parts.next())?;
    Ok(Dependency::new(source, destination, dependency_type))
}

fn rest(parts: impl Iterator<Item = impl AsRef<str>>) -> String {
    parts
        .map(|p| p.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn save(schedule: &mut Schedule, format: &str, path: &str) -> CommandResult {
    match format {
        "json" => save_schedule_to_json(schedule, path).map_err(|e| e.to_string())?,
        "csv" => save_schedule_to_csv(schedule, path).map_err(|e| e.to_string())?,
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let store = SqliteScheduleStore::new(path).map_err(|e| e.to_string())?;
            store.save_schedule(schedule).map_err(|e| e.to_string())?;
        }
        other => return Err(format!("unsupported format '{other}'")),
    }
    schedule.mark_all_persisted();
    Ok(())
}

fn load(format: &str, path: &str) -> Result<Schedule, String> {
    match format {
        "json" => load_schedule_from_json(path).map_err(|e| e.to_string()),
        "csv" => load_schedule_from_csv(path).map_err(|e| e.to_string()),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let store = SqliteScheduleStore::new(path).map_err(|e| e.to_string())?;
            store
                .load_schedule()
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("no schedule stored in {path}"))
        }
        other => Err(format!("unsupported format '{other}'")),
    }
}

fn run_command(schedule: &mut Schedule, cmd: &str, args: &[&str]) -> CommandResult {
    let mut parts = args.iter().copied();
    match cmd {
        "show" => println!("{}", render_schedule(schedule)),
        "task" => {
            let name = rest(parts);
            let id = schedule.add_task(name).map_err(|e| e.to_string())?;
            println!("Added task id={id}");
        }
        "group" => {
            let name = parts.next().ok_or("Usage: group <name> [code hours]")?;
            let order = match (parts.next(), parts.next()) {
                (Some(code), Some(hours)) => {
                    let hours = hours
                        .parse::<u32>()
                        .map_err(|_| format!("invalid hours '{hours}'"))?;
                    Some(OrderElement::new(code, name, hours))
                }
                (None, _) => None,
                (Some(_), None) => return Err("Usage: group <name> [code hours]".into()),
            };
            let id = schedule.add_group(name, order).map_err(|e| e.to_string())?;
            println!("Added group id={id}");
        }
        "nest" => {
            let group = parse_id(parts.next())?;
            let child = parse_id(parts.next())?;
            let nested = match parts.next() {
                Some(index) => {
                    let index = index
                        .parse::<usize>()
                        .map_err(|_| format!("invalid index '{index}'"))?;
                    schedule.insert_task_element(group, index, child)
                }
                None => schedule.add_task_element(group, child),
            };
            nested.map_err(|e| e.to_string())?;
            println!("Task {child} is now a child of {group}.");
        }
        "unnest" => {
            let group = parse_id(parts.next())?;
            let child = parse_id(parts.next())?;
            if schedule.remove_child(group, child).map_err(|e| e.to_string())? {
                println!("Task {child} removed from {group}.");
            } else {
                println!("Task {child} is not a child of {group}.");
            }
        }
        "dates" => {
            let id = parse_id(parts.next())?;
            let start = parse_date(parts.next())?;
            let end = parse_date(parts.next())?;
            schedule
                .set_dates(id, start, end)
                .map_err(|e| e.to_string())?;
            println!("Task {id} scheduled {start} .. {end}.");
        }
        "startcon" => {
            let id = parse_id(parts.next())?;
            let constraint = match parts.next() {
                Some("asap") => StartConstraint::AsSoonAsPossible,
                Some("snet") => StartConstraint::StartNotEarlierThan(parse_date(parts.next())?),
                Some("fixed") => StartConstraint::StartInFixedDate(parse_date(parts.next())?),
                _ => return Err("Usage: startcon <id> <asap|snet|fixed> [date]".into()),
            };
            schedule
                .set_start_constraint(id, constraint)
                .map_err(|e| e.to_string())?;
            println!("Start constraint of task {id} updated.");
        }
        "dep" => {
            let dependency = parse_dependency(&mut parts)?;
            if schedule
                .add_dependency(dependency)
                .map_err(|e| e.to_string())?
            {
                println!("Added dependency {dependency}.");
            } else {
                println!("Dependency {dependency} already exists.");
            }
        }
        "undep" => {
            let dependency = parse_dependency(&mut parts)?;
            if schedule.remove_dependency(&dependency) {
                println!("Removed dependency {dependency}.");
            } else {
                println!("Dependency {dependency} not found.");
            }
        }
        "retype" => {
            let dependency = parse_dependency(&mut parts)?;
            let new_type = parse_type(parts.next())?;
            let replaced = schedule
                .change_dependency_type(&dependency, new_type)
                .map_err(|e| e.to_string())?;
            println!("Dependency is now {replaced}.");
        }
        "constraints" => {
            let id = parse_id(parts.next())?;
            let constraints = match parse_endpoint(parts.next())? {
                Endpoint::Start => schedule.start_constraints_for(id),
                Endpoint::End => schedule.end_constraints_for(id),
            }
            .map_err(|e| e.to_string())?;
            if constraints.is_empty() {
                println!("No constraints.");
            }
            for constraint in constraints {
                println!("  {} {}", constraint.name(), constraint.bound());
            }
        }
        "calc" => {
            let id = parse_id(parts.next())?;
            let endpoint = parse_endpoint(parts.next())?;
            let current = parse_date(parts.next())?;
            let result = match endpoint {
                Endpoint::Start => schedule.calculate_start(id, current),
                Endpoint::End => schedule.calculate_end(id, current),
            }
            .map_err(|e| e.to_string())?;
            println!("{endpoint} of task {id}: {result}");
        }
        "propagate" => match parts.next() {
            Some(id) => {
                let id = parse_id(Some(id))?;
                let moved = schedule.propagate(id).map_err(|e| e.to_string())?;
                println!(
                    "Task {id} {}.",
                    if moved { "moved" } else { "unchanged" }
                );
            }
            None => {
                let summary = schedule.propagate_all().map_err(|e| e.to_string())?;
                println!("Propagation complete: {}", summary.to_cli_summary());
            }
        },
        "policy" => match parts.next() {
            Some(policy) => {
                let policy = policy.parse::<PropagationPolicy>()?;
                let mut config = schedule.config().clone();
                config.propagation_policy = policy;
                schedule.set_config(config);
                println!("Propagation policy set to {}.", policy.as_str());
            }
            None => println!(
                "Propagation policy: {}",
                schedule.config().propagation_policy.as_str()
            ),
        },
        "config" => {
            let path = parts.next().ok_or("Usage: config <json_path>")?;
            let config = EngineConfig::load_from_path(path).map_err(|e| e.to_string())?;
            schedule.set_config(config);
            println!("Configuration loaded from {path}.");
        }
        "alloc" => {
            let id = parse_id(parts.next())?;
            let resource = parts.next().ok_or("Usage: alloc <id> <resource> <units>")?;
            let units = parts
                .next()
                .ok_or("Usage: alloc <id> <resource> <units>")?;
            let units = units
                .parse::<f64>()
                .map_err(|_| format!("invalid units '{units}'"))?;
            let allocation = schedule
                .allocate(id, resource, units)
                .map_err(|e| e.to_string())?;
            println!("Added allocation {allocation} to task {id}.");
        }
        "allocations" => {
            let id = parse_id(parts.next())?;
            let mut allocations: Vec<_> = schedule
                .resource_allocations(id)
                .map_err(|e| e.to_string())?
                .into_iter()
                .collect();
            allocations.sort_by_key(|a| a.id);
            if allocations.is_empty() {
                println!("No allocations.");
            }
            for allocation in allocations {
                println!(
                    "  #{} {} x{}",
                    allocation.id, allocation.resource_id, allocation.allocation_units
                );
            }
        }
        "hours" => {
            let id = parse_id(parts.next())?;
            if let Some(hours) = parts.next() {
                let hours = hours
                    .parse::<u32>()
                    .map_err(|_| format!("invalid hours '{hours}'"))?;
                schedule
                    .set_work_hours(id, hours)
                    .map_err(|e| e.to_string())?;
            }
            let hours = schedule.default_work_hours(id).map_err(|e| e.to_string())?;
            let duration = schedule.default_duration(id).map_err(|e| e.to_string())?;
            println!(
                "Task {id}: {hours} hours, {} working days",
                duration.num_days()
            );
        }
        "validate" => {
            let violations = schedule.validate();
            if violations.is_empty() {
                println!("Schedule is valid.");
            }
            for violation in violations {
                println!("  {violation}");
            }
        }
        "save" => {
            let (Some(format), Some(path)) = (parts.next(), parts.next()) else {
                return Err("Usage: save <json|csv|sqlite> <path>".into());
            };
            save(schedule, format, path)?;
            println!("Saved schedule to {path}.");
        }
        "load" => {
            let (Some(format), Some(path)) = (parts.next(), parts.next()) else {
                return Err("Usage: load <json|csv|sqlite> <path>".into());
            };
            *schedule = load(format, path)?;
            println!("Loaded {} tasks from {path}.", schedule.len());
        }
        "remove" => {
            let id = parse_id(parts.next())?;
            let removed = schedule.remove_task(id).map_err(|e| e.to_string())?;
            println!("Removed {} task(s).", removed.len());
        }
        other => return Err(format!("Unknown command '{other}'. Type 'help'.")),
    }
    Ok(())
}

fn main() {
    logging::init_logging();
    let mut schedule = Schedule::new();

    println!("Gantt dependency engine (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");
        let args: Vec<&str> = parts.collect();

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            _ => {
                if let Err(message) = run_command(&mut schedule, cmd, &args) {
                    println!("Error: {message}");
                }
            }
        }
    }
}
