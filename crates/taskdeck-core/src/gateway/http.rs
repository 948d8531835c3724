use std::time::Duration;

use anyhow::Context;
use reqwest::Method;
use reqwest::header::{
  ACCEPT,
  AUTHORIZATION,
  CONTENT_TYPE
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{
  debug,
  error,
  instrument
};
use uuid::Uuid;

use super::{
  AccountGateway,
  TaskGateway
};
use crate::error::ClientError;
use crate::task::Task;
use crate::wire::{
  Credentials,
  LoginResponse,
  TaskDto,
  TaskInput,
  UserDto,
  decode_task_list
};

const JSON: &str = "application/json";
const REQUEST_ID_HEADER: &str =
  "x-request-id";

/// REST client for the task service.
#[derive(Debug, Clone)]
pub struct HttpGateway {
  client:   reqwest::Client,
  base_url: String
}

impl HttpGateway {
  pub fn new(
    base_url: &str,
    timeout: Duration
  ) -> anyhow::Result<Self> {
    let client =
      reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context(
          "failed building HTTP client \
           for task gateway"
        )?;

    Ok(Self {
      client,
      base_url: base_url
        .trim_end_matches('/')
        .to_string()
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  #[instrument(skip(self, body, token), fields(base = %self.base_url))]
  async fn request(
    &self,
    method: Method,
    endpoint: &str,
    body: Option<String>,
    token: Option<&str>
  ) -> Result<String, ClientError> {
    let url = format!(
      "{}{endpoint}",
      self.base_url
    );
    let request_id = Uuid::new_v4();

    let mut request = self
      .client
      .request(method.clone(), url.as_str())
      .header(CONTENT_TYPE, JSON)
      .header(ACCEPT, JSON)
      .header(
        REQUEST_ID_HEADER,
        request_id.to_string()
      );

    if let Some(token) = token {
      request = request.header(
        AUTHORIZATION,
        format!("Bearer {token}")
      );
    }
    if let Some(body) = body {
      request = request.body(body);
    }

    debug!(%method, endpoint, %request_id, "sending gateway request");

    let response =
      match request.send().await {
        | Ok(response) => response,
        | Err(err) => {
          error!(%method, endpoint, %request_id, error = %err, "gateway request failed");
          return Err(
            ClientError::Transport(err)
          );
        }
      };

    let status = response.status();
    let text = response.text().await?;

    debug!(
      %method,
      endpoint,
      %request_id,
      status = status.as_u16(),
      bytes = text.len(),
      "gateway responded"
    );

    if status.is_success() {
      return Ok(text);
    }

    let err = ClientError::from_status(
      status.as_u16(),
      &text
    );
    error!(%method, endpoint, %request_id, error = %err, "gateway rejected request");
    Err(err)
  }

  async fn request_json<T>(
    &self,
    method: Method,
    endpoint: &str,
    body: Option<String>,
    token: Option<&str>
  ) -> Result<T, ClientError>
  where
    T: DeserializeOwned
  {
    let context =
      format!("{method} {endpoint}");
    let text = self
      .request(
        method, endpoint, body, token
      )
      .await?;
    serde_json::from_str(&text).map_err(
      |source| ClientError::Decode {
        context,
        source
      }
    )
  }
}

fn encode<T>(
  value: &T,
  context: &str
) -> Result<String, ClientError>
where
  T: Serialize + ?Sized
{
  serde_json::to_string(value).map_err(
    |source| ClientError::Decode {
      context: context.to_string(),
      source
    }
  )
}

impl TaskGateway for HttpGateway {
  async fn list_tasks(
    &self,
    token: &str
  ) -> Result<Vec<Task>, ClientError> {
    let rows: Vec<serde_json::Value> = self
      .request_json(
        Method::GET,
        "/tasks",
        None,
        Some(token)
      )
      .await?;
    Ok(decode_task_list(rows))
  }

  async fn get_task(
    &self,
    id: u64,
    token: &str
  ) -> Result<Task, ClientError> {
    let dto: TaskDto = self
      .request_json(
        Method::GET,
        &format!("/tasks/{id}"),
        None,
        Some(token)
      )
      .await?;
    dto.into_task()
  }

  async fn create_task(
    &self,
    input: &TaskInput,
    token: &str
  ) -> Result<Task, ClientError> {
    let body = encode(
      &TaskDto::from(input),
      "task body"
    )?;
    let dto: TaskDto = self
      .request_json(
        Method::POST,
        "/tasks",
        Some(body),
        Some(token)
      )
      .await?;
    dto.into_task()
  }

  async fn update_task(
    &self,
    task: &Task,
    token: &str
  ) -> Result<Task, ClientError> {
    let body = encode(
      &TaskDto::from(task),
      "task body"
    )?;
    let dto: TaskDto = self
      .request_json(
        Method::PUT,
        &format!("/tasks/{}", task.id),
        Some(body),
        Some(token)
      )
      .await?;
    dto.into_task()
  }

  async fn delete_task(
    &self,
    id: u64,
    token: &str
  ) -> Result<(), ClientError> {
    self
      .request(
        Method::DELETE,
        &format!("/tasks/{id}"),
        None,
        Some(token)
      )
      .await
      .map(|_| ())
  }
}

impl AccountGateway for HttpGateway {
  async fn signup(
    &self,
    credentials: &Credentials
  ) -> Result<(), ClientError> {
    let body =
      encode(credentials, "signup body")?;
    self
      .request(
        Method::POST,
        "/signup",
        Some(body),
        None
      )
      .await
      .map(|_| ())
  }

  async fn login(
    &self,
    credentials: &Credentials
  ) -> Result<LoginResponse, ClientError>
  {
    let body =
      encode(credentials, "login body")?;
    self
      .request_json(
        Method::POST,
        "/login",
        Some(body),
        None
      )
      .await
  }

  async fn current_user(
    &self,
    token: &str
  ) -> Result<UserDto, ClientError> {
    self
      .request_json(
        Method::GET,
        "/me",
        None,
        Some(token)
      )
      .await
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::HttpGateway;

  #[test]
  fn base_url_trailing_slash_is_trimmed()
  {
    let gateway = HttpGateway::new(
      "http://localhost:3000/",
      Duration::from_secs(5)
    )
    .expect("client builds");
    assert_eq!(
      gateway.base_url(),
      "http://localhost:3000"
    );
  }
}
