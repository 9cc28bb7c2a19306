//! Output formatting utilities for markdown and JSON.

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

use crate::types::{ProjectBoard, ProjectSummary, TaskCard};

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "markdown" | "md" => Some(OutputFormat::Markdown),
            _ => None,
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn format_task_line(card: &TaskCard) -> String {
    let task = &card.task;
    let mut line = format!(
        "{}. **{}** `{}` ({})",
        task.position,
        task.title,
        task.id,
        task.priority.as_str()
    );

    if let Some(ref assignee) = card.assignee {
        line.push_str(&format!(" @{}", assignee.name));
    }
    if let Some(due) = task.due_date {
        line.push_str(&format!(" due {}", due.format("%Y-%m-%d")));
    }
    if !card.labels.is_empty() {
        let labels: Vec<&str> = card.labels.iter().map(|l| l.name.as_str()).collect();
        line.push_str(&format!(" [{}]", labels.join(", ")));
    }

    let (done, total) = card
        .checklists
        .iter()
        .flat_map(|c| &c.items)
        .fold((0, 0), |(done, total), item| {
            (done + usize::from(item.completed), total + 1)
        });
    if total > 0 {
        line.push_str(&format!(" checklist {}/{}", done, total));
    }
    if card.logged_hours > 0.0 {
        line.push_str(&format!(" {:.1}h logged", card.logged_hours));
    }
    line
}

/// Format a board as markdown, one section per column in board order.
///
/// Each task line starts with its stored position, so gaps left by deletes
/// stay visible.
pub fn format_board_markdown(board: &ProjectBoard) -> String {
    let mut md = String::new();

    md.push_str(&format!("# {}\n", board.project.name));
    md.push_str(&format!(
        "- **id**: `{}`\n- **type**: {}\n- **owner**: {}\n",
        board.project.id,
        board.project.project_type.as_str(),
        board.owner.name
    ));
    if let Some(ref desc) = board.project.description {
        md.push_str(&format!("\n{}\n", desc));
    }

    for column in &board.columns {
        md.push_str(&format!(
            "\n## {} ({}) `{}`\n",
            column.column.name,
            column.tasks.len(),
            column.column.id
        ));
        if column.tasks.is_empty() {
            md.push_str("_empty_\n");
        }
        for card in &column.tasks {
            md.push_str(&format_task_line(card));
            md.push('\n');
        }
    }

    md
}

/// Format the project list as markdown.
pub fn format_projects_markdown(projects: &[ProjectSummary]) -> String {
    let mut md = format!("# Projects ({})\n\n", projects.len());
    for summary in projects {
        let tasks: i64 = summary.columns.iter().map(|c| c.task_count).sum();
        md.push_str(&format!(
            "- **{}** `{}` ({}, {} tasks, owner {})\n",
            summary.project.name,
            summary.project.id,
            summary.project.project_type.as_str(),
            tasks,
            summary.owner.name
        ));
    }
    md
}

pub fn render_board(board: &ProjectBoard, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(board),
        OutputFormat::Markdown => Ok(format_board_markdown(board)),
    }
}

pub fn render_projects(projects: &[ProjectSummary], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(&projects),
        OutputFormat::Markdown => Ok(format_projects_markdown(projects)),
    }
}
