//! Google Sheets v4 REST adapter.
//!
//! Reads use the values API with formatted values, so timestamps and delta
//! formulas arrive exactly as a person sees them in the sheet. Row inserts
//! go through one `batchUpdate` carrying both the `insertDimension` and the
//! cell payload, which the API applies atomically.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{InputMode, TabularStore};
use crate::columns::RangeSpec;
use crate::config::StoreConfig;
use crate::error::{ConfigError, StoreError};
use crate::timestamp;

/// Connected worksheet.
#[derive(Debug)]
pub struct SheetsStore {
    client: Client,
    base_url: Url,
    spreadsheet_id: String,
    worksheet: String,
    sheet_id: i64,
    token: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl SheetsStore {
    /// Resolve the worksheet and verify the credentials work.
    pub async fn connect(config: &StoreConfig) -> crate::Result<Self> {
        let spreadsheet_id = config
            .spreadsheet_id
            .clone()
            .ok_or_else(|| ConfigError::Missing("store.spreadsheet_id".to_string()))?;
        let token = config
            .access_token
            .clone()
            .ok_or_else(|| ConfigError::Missing("store.access_token".to_string()))?;
        let base_url = Url::parse(&config.api_base_url).map_err(|e| ConfigError::Invalid {
            field: "store.api_base_url".to_string(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| StoreError::Connection(format!("failed to create HTTP client: {e}")))?;

        let mut store = Self {
            client,
            base_url,
            spreadsheet_id,
            worksheet: config.worksheet.clone(),
            sheet_id: 0,
            token,
        };

        let mut url = store.url(&[store.spreadsheet_id.as_str()])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        let response = store.send(store.client.get(url)).await?;
        let meta: SpreadsheetMeta = parse_json(response).await?;
        store.sheet_id = find_sheet_id(&meta, &store.worksheet).ok_or_else(|| {
            StoreError::Connection(format!(
                "worksheet '{}' not found in spreadsheet {}",
                store.worksheet, store.spreadsheet_id
            ))
        })?;

        tracing::info!(
            spreadsheet_id = %store.spreadsheet_id,
            worksheet = %store.worksheet,
            sheet_id = store.sheet_id,
            "Connected to Google Sheets"
        );
        Ok(store)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                StoreError::Connection(format!("invalid API base URL: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn values_url(&self, range: &str) -> Result<Url, StoreError> {
        self.url(&[self.spreadsheet_id.as_str(), "values", range])
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, StoreError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::Api { status, body })
        }
    }

    async fn put_values(
        &self,
        range: &RangeSpec,
        values: &[Vec<String>],
        mode: InputMode,
    ) -> Result<(), StoreError> {
        let a1 = range.a1(Some(&self.worksheet));
        let mut url = self.values_url(&a1)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", mode.as_api_str());
        let body = json!({
            "range": a1,
            "majorDimension": "ROWS",
            "values": values,
        });
        self.send(self.client.put(url).json(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl TabularStore for SheetsStore {
    async fn read_all(&self) -> Result<Vec<Vec<String>>, StoreError> {
        let range = format!("'{}'", self.worksheet.replace('\'', "''"));
        let mut url = self.values_url(&range)?;
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "FORMATTED_VALUE");
        let response = self.send(self.client.get(url)).await?;
        let body: ValueRange = parse_json(response).await?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn insert_row(
        &self,
        values: &[String],
        position: usize,
        mode: InputMode,
    ) -> Result<(), StoreError> {
        if position == 0 {
            return Err(StoreError::PositionOutOfRange { position, len: 0 });
        }
        let target = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.url(&[target.as_str()])?;
        let body = insert_request(self.sheet_id, position, values, mode);
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn update_cell(
        &self,
        position: usize,
        column: u32,
        value: &str,
    ) -> Result<(), StoreError> {
        self.put_values(
            &RangeSpec::cell(position, column),
            &[vec![value.to_string()]],
            InputMode::UserEntered,
        )
        .await
    }

    async fn update_range(
        &self,
        range: &RangeSpec,
        values: &[Vec<String>],
        mode: InputMode,
    ) -> Result<(), StoreError> {
        self.put_values(range, values, mode).await
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    response
        .json()
        .await
        .map_err(|e| StoreError::InvalidResponse(e.to_string()))
}

fn find_sheet_id(meta: &SpreadsheetMeta, worksheet: &str) -> Option<i64> {
    meta.sheets
        .iter()
        .find(|entry| entry.properties.title == worksheet)
        .map(|entry| entry.properties.sheet_id)
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `CellData` for one value, typed the way the values API would type it.
fn cell_data(value: &str, mode: InputMode) -> Value {
    if value.is_empty() {
        return json!({});
    }
    let entered = match mode {
        InputMode::Raw => json!({ "stringValue": value }),
        InputMode::UserEntered if value.starts_with('=') => json!({ "formulaValue": value }),
        InputMode::UserEntered => match timestamp::parse_number(value) {
            Some(number) => json!({ "numberValue": number }),
            None => match value {
                "TRUE" | "FALSE" => json!({ "boolValue": value == "TRUE" }),
                _ => json!({ "stringValue": value }),
            },
        },
    };
    json!({ "userEnteredValue": entered })
}

/// One `batchUpdate` body: open a row at `position`, then fill it.
fn insert_request(sheet_id: i64, position: usize, values: &[String], mode: InputMode) -> Value {
    let index = position - 1;
    let cells: Vec<Value> = values.iter().map(|v| cell_data(v, mode)).collect();
    json!({
        "requests": [
            {
                "insertDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": index,
                        "endIndex": index + 1,
                    },
                    "inheritFromBefore": index > 0,
                }
            },
            {
                "updateCells": {
                    "start": { "sheetId": sheet_id, "rowIndex": index, "columnIndex": 0 },
                    "rows": [{ "values": cells }],
                    "fields": "userEnteredValue",
                }
            }
        ]
    })
}
