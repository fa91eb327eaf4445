use std::sync::Arc;

use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::ServiceAccountAuth;
use crate::errors::{SheetsError, SheetsResult};

/// Base URL of the Sheets v4 REST API
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
/// Drive v3 file listing, used to find spreadsheets by name
pub const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
/// Scopes the service account needs to find and append to a spreadsheet
pub const SHEETS_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

#[derive(Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Deserialize)]
struct SpreadsheetMetadata {
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

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ValueRange<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: [&'a [String]; 1],
}

/// Client for locating spreadsheets and opening their worksheets
#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: Client,
    auth: Arc<ServiceAccountAuth>,
}

impl SheetsClient {
    pub fn new(auth: ServiceAccountAuth) -> Self {
        Self {
            http: Client::new(),
            auth: Arc::new(auth),
        }
    }

    /// Find a spreadsheet visible to the service account by its exact name
    pub async fn find_spreadsheet_id(&self, name: &str) -> SheetsResult<String> {
        let token = self.auth.access_token().await?;
        let query = drive_query(name);

        let response = self
            .http
            .get(DRIVE_FILES_URL)
            .bearer_auth(&token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await
            .map_err(|e| SheetsError::RequestError(format!("Drive lookup failed: {}", e)))?;

        let listing: DriveFileList = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| SheetsError::ParsingError(format!("Failed to parse file list: {}", e)))?;

        listing
            .files
            .into_iter()
            .next()
            .map(|file| file.id)
            .ok_or_else(|| SheetsError::SpreadsheetNotFound(name.to_string()))
    }

    /// Titles of every worksheet in a spreadsheet
    pub async fn worksheet_titles(&self, spreadsheet_id: &str) -> SheetsResult<Vec<String>> {
        let token = self.auth.access_token().await?;
        let url = spreadsheet_url(spreadsheet_id, &[])?;

        let response = self
            .http
            .get(url)
            .bearer_auth(&token)
            .query(&[("fields", "sheets.properties.title")])
            .send()
            .await
            .map_err(|e| SheetsError::RequestError(format!("Metadata request failed: {}", e)))?;

        let metadata: SpreadsheetMetadata = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| SheetsError::ParsingError(format!("Failed to parse metadata: {}", e)))?;

        Ok(metadata
            .sheets
            .into_iter()
            .map(|sheet| sheet.properties.title)
            .collect())
    }

    /// Resolve `spreadsheet_name` and check it has a worksheet titled `title`
    pub async fn open_worksheet(
        &self,
        spreadsheet_name: &str,
        title: &str,
    ) -> SheetsResult<Worksheet> {
        let spreadsheet_id = self.find_spreadsheet_id(spreadsheet_name).await?;
        let titles = self.worksheet_titles(&spreadsheet_id).await?;

        if !titles.iter().any(|t| t == title) {
            return Err(SheetsError::WorksheetNotFound {
                spreadsheet: spreadsheet_name.to_string(),
                worksheet: title.to_string(),
            });
        }

        info!(
            spreadsheet = spreadsheet_name,
            spreadsheet_id = %spreadsheet_id,
            worksheet = title,
            "Opened worksheet"
        );

        Ok(Worksheet {
            http: self.http.clone(),
            auth: Arc::clone(&self.auth),
            spreadsheet_id,
            title: title.to_string(),
        })
    }
}

/// A single worksheet rows are appended to
#[derive(Debug, Clone)]
pub struct Worksheet {
    http: Client,
    auth: Arc<ServiceAccountAuth>,
    spreadsheet_id: String,
    title: String,
}

impl Worksheet {
    /// Append `values` as a new row after the last row with data
    pub async fn append_row(&self, values: &[String]) -> SheetsResult<()> {
        let token = self.auth.access_token().await?;
        let range = absolute_range(&self.title);
        let url = append_url(&self.spreadsheet_id, &range)?;

        let body = ValueRange {
            range: &range,
            major_dimension: "ROWS",
            values: [values],
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(&token)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&body)
            .send()
            .await
            .map_err(|e| SheetsError::RequestError(format!("Append request failed: {}", e)))?;

        check_status(response).await?;
        debug!(worksheet = %self.title, columns = values.len(), "Appended row");
        Ok(())
    }
}

async fn check_status(response: Response) -> SheetsResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
    Err(SheetsError::HttpError {
        status_code: status.as_u16(),
        message,
    })
}

/// Drive search expression matching a spreadsheet by exact name
fn drive_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "name = '{}' and mimeType = '{}' and trashed = false",
        escaped, SPREADSHEET_MIME_TYPE
    )
}

/// A1 range covering the whole worksheet, title quoted for the API
fn absolute_range(title: &str) -> String {
    format!("'{}'!A1", title.replace('\'', "''"))
}

fn spreadsheet_url(spreadsheet_id: &str, segments: &[&str]) -> SheetsResult<Url> {
    let mut url = Url::parse(SHEETS_API_BASE)
        .map_err(|e| SheetsError::RequestError(format!("Invalid API base: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| SheetsError::RequestError("API base cannot carry a path".to_string()))?
        .push(spreadsheet_id)
        .extend(segments);
    Ok(url)
}

fn append_url(spreadsheet_id: &str, range: &str) -> SheetsResult<Url> {
    let target = format!("{}:append", range);
    spreadsheet_url(spreadsheet_id, &["values", &target])
}
