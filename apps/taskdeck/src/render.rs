use client_core::{Notification, NotificationVariant, TaskPage};
use shared::protocol::{Task, UserProfile};

pub fn task_line(task: &Task) -> String {
    let due = task
        .due_date
        .map(|due| format!("  due {}", due.format("%Y-%m-%d")))
        .unwrap_or_default();
    format!(
        "{:<12} {:<7} {:<26} {}{due}",
        task.status.as_str(),
        task.priority.as_str(),
        task.id.as_str(),
        task.title
    )
}

pub fn print_page(page: &TaskPage) {
    if page.is_empty() {
        println!("No tasks found.");
        return;
    }
    for task in &page.items {
        println!("{}", task_line(task));
    }
    if page.shows_pager() {
        println!(
            "page {}/{} ({} tasks)",
            page.current_page, page.total_pages, page.total
        );
    } else {
        println!("{} tasks", page.total);
    }
}

pub fn notification_line(notification: &Notification) -> String {
    let marker = match notification.variant {
        NotificationVariant::Destructive => "!",
        _ => "*",
    };
    match &notification.description {
        Some(description) => format!("{marker} {}: {description}", notification.title),
        None => format!("{marker} {}", notification.title),
    }
}

pub fn print_profile(profile: &UserProfile) {
    println!("{} <{}>", profile.name, profile.email);
    println!("id {}", profile.user_id);
}
