use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

/// Which backend a command is talking to.
pub fn backend(name: &str, location: &str) {
    let icon = if name == "remote" { Icons::CLOUD } else { Icons::DATABASE };
    println!("{} {} {}", icon, name.style(theme().header.clone()), location.style(theme().dim.clone()));
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn id(text: &str) -> String {
    text.style(theme().id.clone()).to_string()
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn migration_step(version: usize, description: &str) {
    println!(
        "  {} v{} {}",
        Icons::GEAR.style(theme().info.clone()),
        version,
        description.style(theme().dim.clone())
    );
}

pub fn diagram_created(diagram_id: &str, name: &str) {
    println!("{} {} {}", Icons::NEW.style(theme().success.clone()), id(diagram_id), name);
}

pub fn diagram_moved(from: &str, to: &str) {
    println!("{} {} {} {}", Icons::DIAGRAM, id(from), Icons::MOVE, id(to));
}

pub fn diagram_deleted(diagram_id: &str) {
    println!("{} {}", Icons::DEL.style(theme().error.clone()), id(diagram_id));
}
