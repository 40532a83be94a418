use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::collaborators::{CellUpdate, SheetRef, SpreadsheetStore};
use crate::error::CollaboratorError;
use crate::google::ServiceAccountAuth;
use crate::sheet_table::{a1_cell, quote_sheet_name};

const SERVICE: &str = "google sheets";

/// Google Sheets v4 over plain REST calls.
#[derive(Clone)]
pub struct SheetsClient {
    client: reqwest::Client,
    api_base: String,
    auth: ServiceAccountAuth,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RangeData {
    range: String,
    major_dimension: &'static str,
    values: Vec<Vec<Value>>,
}

impl SheetsClient {
    pub fn new(api_base: String, auth: ServiceAccountAuth) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
            auth,
        }
    }

    fn spreadsheet_url(&self, spreadsheet_id: &str) -> String {
        format!(
            "{}/spreadsheets/{}",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(spreadsheet_id)
        )
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/values/{}",
            self.spreadsheet_url(spreadsheet_id),
            urlencoding::encode(range)
        )
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        not_found: impl FnOnce() -> String,
    ) -> Result<reqwest::Response, CollaboratorError> {
        let token = self.auth.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| CollaboratorError::transport(SERVICE, err))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CollaboratorError::NotFound(not_found()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::upstream(SERVICE, status.as_u16(), &body));
        }
        Ok(response)
    }

    async fn sheet_titles(&self, spreadsheet_id: &str) -> Result<Vec<String>, CollaboratorError> {
        let request = self
            .client
            .get(self.spreadsheet_url(spreadsheet_id))
            .query(&[("fields", "sheets.properties.title")]);
        let meta: SpreadsheetMeta = self
            .send(request, || format!("spreadsheet '{}'", spreadsheet_id))
            .await?
            .json()
            .await
            .map_err(|err| CollaboratorError::parse(SERVICE, err))?;
        Ok(meta.sheets.into_iter().map(|sheet| sheet.properties.title).collect())
    }
}

#[async_trait]
impl SpreadsheetStore for SheetsClient {
    async fn get_values(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<Vec<Vec<String>>, CollaboratorError> {
        let titles = self.sheet_titles(spreadsheet_id).await?;
        if !titles.iter().any(|title| title == sheet_name) {
            return Err(CollaboratorError::SheetNotFound(sheet_name.to_string()));
        }

        let request = self
            .client
            .get(self.values_url(spreadsheet_id, &quote_sheet_name(sheet_name)));
        let range: ValueRange = self
            .send(request, || format!("sheet '{}'", sheet_name))
            .await?
            .json()
            .await
            .map_err(|err| CollaboratorError::parse(SERVICE, err))?;

        Ok(range
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    async fn add_sheet(
        &self,
        spreadsheet_id: &str,
        title: &str,
        rows: usize,
        cols: usize,
    ) -> Result<SheetRef, CollaboratorError> {
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": title,
                        "gridProperties": { "rowCount": rows.max(1), "columnCount": cols.max(1) }
                    }
                }
            }]
        });
        let request = self
            .client
            .post(format!("{}:batchUpdate", self.spreadsheet_url(spreadsheet_id)))
            .json(&body);
        let reply: Value = self
            .send(request, || format!("spreadsheet '{}'", spreadsheet_id))
            .await?
            .json()
            .await
            .map_err(|err| CollaboratorError::parse(SERVICE, err))?;

        let sheet_id = reply["replies"][0]["addSheet"]["properties"]["sheetId"]
            .as_i64()
            .ok_or_else(|| CollaboratorError::parse(SERVICE, "addSheet reply missing sheetId"))?;
        info!(title, sheet_id, "created worksheet");
        Ok(SheetRef {
            sheet_id,
            title: title.to_string(),
        })
    }

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        rows: Vec<Vec<Value>>,
    ) -> Result<(), CollaboratorError> {
        if rows.is_empty() {
            return Ok(());
        }
        let range = quote_sheet_name(sheet_name);
        let request = self
            .client
            .post(format!("{}:append", self.values_url(spreadsheet_id, &range)))
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": rows }));
        self.send(request, || format!("sheet '{}'", sheet_name)).await?;
        Ok(())
    }

    async fn update_cells(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        cells: Vec<CellUpdate>,
    ) -> Result<(), CollaboratorError> {
        if cells.is_empty() {
            return Ok(());
        }
        let sheet = quote_sheet_name(sheet_name);
        let data: Vec<RangeData> = cells
            .into_iter()
            .map(|cell| RangeData {
                range: format!("{}!{}", sheet, a1_cell(cell.row, cell.col)),
                major_dimension: "ROWS",
                values: vec![vec![cell.value]],
            })
            .collect();
        let request = self
            .client
            .post(format!("{}/values:batchUpdate", self.spreadsheet_url(spreadsheet_id)))
            .json(&json!({ "valueInputOption": "USER_ENTERED", "data": data }));
        self.send(request, || format!("spreadsheet '{}'", spreadsheet_id)).await?;
        Ok(())
    }

    async fn write_rows(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        start_cell: &str,
        rows: Vec<Vec<Value>>,
    ) -> Result<(), CollaboratorError> {
        let range = format!("{}!{}", quote_sheet_name(sheet_name), start_cell);
        let request = self
            .client
            .put(self.values_url(spreadsheet_id, &range))
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&RangeData {
                range: range.clone(),
                major_dimension: "ROWS",
                values: rows,
            });
        self.send(request, || format!("sheet '{}'", sheet_name)).await?;
        Ok(())
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
