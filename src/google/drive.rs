use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::collaborators::{BlobStore, DriveFolder};
use crate::error::CollaboratorError;
use crate::google::ServiceAccountAuth;

const SERVICE: &str = "google drive";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Google Drive v3 with shared-drive support on every call.
#[derive(Clone)]
pub struct DriveClient {
    client: reqwest::Client,
    api_base: String,
    upload_base: String,
    auth: ServiceAccountAuth,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    web_view_link: Option<String>,
}

impl DriveClient {
    pub fn new(api_base: String, upload_base: String, auth: ServiceAccountAuth) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            upload_base,
            auth,
        }
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response, CollaboratorError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CollaboratorError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::upstream(SERVICE, status.as_u16(), &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl BlobStore for DriveClient {
    async fn create_folder(
        &self,
        name: &str,
        parent_folder_id: &str,
    ) -> Result<DriveFolder, CollaboratorError> {
        let token = self.auth.access_token().await?;
        let response = self
            .client
            .post(format!("{}/files", self.api_base.trim_end_matches('/')))
            .query(&[("fields", "id,webViewLink"), ("supportsAllDrives", "true")])
            .bearer_auth(token)
            .json(&json!({
                "name": name,
                "parents": [parent_folder_id],
                "mimeType": FOLDER_MIME_TYPE,
            }))
            .send()
            .await
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;

        let response = Self::check(response, &format!("parent folder '{}'", parent_folder_id))
            .await
            .map_err(|err| {
                error!(folder = name, error = %err, "folder creation failed");
                err
            })?;
        let file: DriveFile = response
            .json()
            .await
            .map_err(|err| CollaboratorError::parse(SERVICE, err))?;

        info!(folder = name, id = %file.id, "created Drive folder");
        Ok(DriveFolder {
            link: file.web_view_link.unwrap_or_default(),
            id: file.id,
        })
    }

    async fn upload(
        &self,
        folder_id: &str,
        filename: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<String, CollaboratorError> {
        let token = self.auth.access_token().await?;

        // Resumable upload: one call for the metadata, one for the bytes.
        let session = self
            .client
            .post(format!("{}/files", self.upload_base.trim_end_matches('/')))
            .query(&[
                ("uploadType", "resumable"),
                ("supportsAllDrives", "true"),
                ("fields", "id,webViewLink"),
            ])
            .bearer_auth(&token)
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", data.len().to_string())
            .json(&json!({ "name": filename, "parents": [folder_id] }))
            .send()
            .await
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;
        let session = Self::check(session, &format!("folder '{}'", folder_id)).await?;

        let upload_url = session
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| CollaboratorError::parse(SERVICE, "upload session missing Location header"))?;

        let length = data.len();
        let response = self
            .client
            .put(upload_url)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, mime_type)
            .header(CONTENT_LENGTH, length)
            .body(data)
            .send()
            .await
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;
        let response = Self::check(response, &format!("upload of '{}'", filename)).await?;

        let file: DriveFile = response
            .json()
            .await
            .map_err(|err| CollaboratorError::parse(SERVICE, err))?;
        info!(filename, bytes = length, "uploaded file to Drive");
        Ok(file
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", file.id)))
    }
}
