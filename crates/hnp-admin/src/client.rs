//! HTTP client for the admin routes, used by `hnp server admin`.

use std::time::Duration;

use hnp_protocol::RoomId;
use hnp_room::RoomSnapshot;
use reqwest::StatusCode;

use crate::action::{AdminAction, AdminResponse};
use crate::{AdminError, AuthError};

pub struct AdminClient {
    http: reqwest::Client,
    base_url: String,
    header: String,
    secret: String,
}

impl AdminClient {
    /// `base_url` is the server root, e.g. `http://localhost:57001`.
    pub fn new(base_url: impl Into<String>, header: impl Into<String>, secret: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            header: header.into(),
            secret: secret.into(),
        }
    }

    pub async fn execute(&self, action: AdminAction) -> Result<AdminResponse, AdminError> {
        let request = match action {
            AdminAction::ListRooms => self.http.get(self.url("/admin/rooms")),
            AdminAction::Shutdown => self.http.post(self.url("/admin/shutdown")),
            AdminAction::ShutdownRoom(RoomId(id)) => {
                self.http.post(self.url(&format!("/admin/rooms/{id}/shutdown")))
            }
        };

        let response = request
            .header(self.header.as_str(), self.secret.as_str())
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::UNAUTHORIZED => Err(AuthError::Unauthorized.into()),
            status => Err(AdminError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    pub async fn list_rooms(&self) -> Result<Vec<RoomSnapshot>, AdminError> {
        match self.execute(AdminAction::ListRooms).await? {
            AdminResponse::Rooms { rooms } => Ok(rooms),
            other => Err(AdminError::Status {
                status: 200,
                body: format!("unexpected response: {other:?}"),
            }),
        }
    }

    pub async fn shutdown(&self) -> Result<(), AdminError> {
        self.execute(AdminAction::Shutdown).await.map(|_| ())
    }

    pub async fn shutdown_room(&self, room: RoomId) -> Result<(), AdminError> {
        self.execute(AdminAction::ShutdownRoom(room)).await.map(|_| ())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
