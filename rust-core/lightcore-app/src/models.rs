//! Application models.

use lightcore_core::Model;

/// Row of the `users` table
#[derive(Debug)]
pub struct User;

impl Model for User {
    const TABLE: &'static str = "users";

    fn fillable() -> &'static [&'static str] {
        &["name", "email"]
    }
}

/// Row of the `tasks` table
#[derive(Debug)]
pub struct Task;

impl Model for Task {
    const TABLE: &'static str = "tasks";

    fn fillable() -> &'static [&'static str] {
        &["user_id", "title"]
    }
}
