//! Seams to the remote task service.
//!
//! Workflows take a gateway generically so tests can drive them with an
//! in-memory fake while the CLI plugs in [`http::HttpGateway`].

pub mod http;

use crate::error::ClientError;
use crate::task::Task;
use crate::wire::{Credentials, LoginResponse, TaskInput, UserDto};

/// Task CRUD. Every call needs the bearer token; callers check for it first.
#[allow(async_fn_in_trait)]
pub trait TaskGateway {
    async fn list_tasks(&self, token: &str) -> Result<Vec<Task>, ClientError>;

    async fn get_task(&self, id: u64, token: &str) -> Result<Task, ClientError>;

    async fn create_task(&self, input: &TaskInput, token: &str) -> Result<Task, ClientError>;

    /// Full replace of the task's fields.
    async fn update_task(&self, task: &Task, token: &str) -> Result<Task, ClientError>;

    async fn delete_task(&self, id: u64, token: &str) -> Result<(), ClientError>;
}

#[allow(async_fn_in_trait)]
pub trait AccountGateway {
    async fn signup(&self, credentials: &Credentials) -> Result<(), ClientError>;

    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ClientError>;

    async fn current_user(&self, token: &str) -> Result<UserDto, ClientError>;
}
